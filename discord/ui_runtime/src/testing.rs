//! In-memory platform handles that record every call.

use crate::dispatch::ModalForm;
use crate::error::PlatformError;
use crate::protocol::{MessageBody, MessageFlags, ModalBody, SelectKind};
use crate::responder::{
    ChannelHandle, InteractionData, InteractionHandle, MessageHandle, MessageRef, Outgoing,
    UserHandle,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

const ALREADY_ACKNOWLEDGED: u32 = 40060;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id(prefix: &str) -> String {
    format!("{prefix}-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Reply(MessageFlags, MessageBody),
    Update(MessageFlags, MessageBody),
    EditReply(MessageFlags, MessageBody),
    DeferReply(MessageFlags),
    DeferUpdate,
    ShowModal(ModalBody),
}

#[derive(Debug, Default)]
struct Failures(Mutex<VecDeque<PlatformError>>);

impl Failures {
    fn push(&self, err: PlatformError) {
        self.0.lock().expect("failures lock").push_back(err);
    }

    fn check(&self) -> Result<(), PlatformError> {
        match self.0.lock().expect("failures lock").pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct MockInteraction {
    id: String,
    data: InteractionData,
    replied: AtomicBool,
    deferred: AtomicBool,
    calls: Mutex<Vec<Call>>,
    failures: Failures,
}

impl MockInteraction {
    pub fn new(data: InteractionData) -> Arc<Self> {
        Arc::new(Self {
            id: next_id("interaction"),
            data,
            replied: AtomicBool::new(false),
            deferred: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            failures: Failures::default(),
        })
    }

    pub fn command(name: &str) -> Arc<Self> {
        Self::new(InteractionData::Command {
            name: name.to_string(),
        })
    }

    pub fn button(custom_id: &str) -> Arc<Self> {
        Self::new(InteractionData::Button {
            custom_id: custom_id.to_string(),
        })
    }

    pub fn select(custom_id: &str, kind: SelectKind, values: Vec<String>) -> Arc<Self> {
        Self::new(InteractionData::Select {
            custom_id: custom_id.to_string(),
            kind,
            values,
        })
    }

    pub fn modal_submit(custom_id: &str, from_message: bool, fields: ModalForm) -> Arc<Self> {
        Self::new(InteractionData::ModalSubmit {
            custom_id: custom_id.to_string(),
            from_message,
            fields,
        })
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Makes the next platform call fail with `err`. Failed calls are not
    /// recorded.
    pub fn fail_next(&self, err: PlatformError) {
        self.failures.push(err);
    }

    fn acknowledged(&self) -> bool {
        self.replied.load(Ordering::SeqCst) || self.deferred.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call, needs_ack: bool) -> Result<(), PlatformError> {
        self.failures.check()?;
        if self.acknowledged() != needs_ack {
            let message = if needs_ack {
                "interaction has not been acknowledged"
            } else {
                "interaction has already been acknowledged"
            };
            return Err(PlatformError::from_code(ALREADY_ACKNOWLEDGED, message));
        }
        self.calls.lock().expect("calls lock").push(call);
        Ok(())
    }
}

#[async_trait]
impl InteractionHandle for MockInteraction {
    fn id(&self) -> &str {
        &self.id
    }

    fn data(&self) -> &InteractionData {
        &self.data
    }

    fn replied(&self) -> bool {
        self.replied.load(Ordering::SeqCst)
    }

    fn deferred(&self) -> bool {
        self.deferred.load(Ordering::SeqCst)
    }

    async fn reply(&self, message: Outgoing) -> Result<(), PlatformError> {
        self.record(Call::Reply(message.flags, message.body), false)?;
        self.replied.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn update(&self, message: Outgoing) -> Result<(), PlatformError> {
        self.record(Call::Update(message.flags, message.body), false)?;
        self.replied.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn edit_reply(&self, message: Outgoing) -> Result<(), PlatformError> {
        self.record(Call::EditReply(message.flags, message.body), true)
    }

    async fn defer_reply(&self, flags: MessageFlags) -> Result<(), PlatformError> {
        self.record(Call::DeferReply(flags), false)?;
        self.deferred.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn defer_update(&self) -> Result<(), PlatformError> {
        self.record(Call::DeferUpdate, false)?;
        self.deferred.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn show_modal(&self, modal: ModalBody) -> Result<(), PlatformError> {
        self.record(Call::ShowModal(modal), false)?;
        self.replied.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockMessage {
    id: String,
    edits: Mutex<Vec<(MessageFlags, MessageBody)>>,
    failures: Failures,
}

impl MockMessage {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            edits: Mutex::new(Vec::new()),
            failures: Failures::default(),
        })
    }

    pub fn edits(&self) -> usize {
        self.edits.lock().expect("edits lock").len()
    }

    pub fn last_edit(&self) -> Option<(MessageFlags, MessageBody)> {
        self.edits.lock().expect("edits lock").last().cloned()
    }

    pub fn fail_next(&self, err: PlatformError) {
        self.failures.push(err);
    }
}

#[async_trait]
impl MessageHandle for MockMessage {
    fn id(&self) -> &str {
        &self.id
    }

    async fn edit(&self, message: Outgoing) -> Result<(), PlatformError> {
        self.failures.check()?;
        self.edits
            .lock()
            .expect("edits lock")
            .push((message.flags, message.body));
        Ok(())
    }
}

/// A text channel or a user's direct messages.
#[derive(Debug)]
pub struct MockChannel {
    id: String,
    sent: Mutex<Vec<(MessageFlags, MessageBody, Arc<MockMessage>)>>,
}

impl MockChannel {
    pub fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> usize {
        self.sent.lock().expect("sent lock").len()
    }

    pub fn sent_bodies(&self) -> Vec<MessageBody> {
        self.sent
            .lock()
            .expect("sent lock")
            .iter()
            .map(|(_, body, _)| body.clone())
            .collect()
    }

    pub fn sent_flags(&self) -> Vec<MessageFlags> {
        self.sent
            .lock()
            .expect("sent lock")
            .iter()
            .map(|(flags, _, _)| *flags)
            .collect()
    }

    pub fn last_message(&self) -> Option<Arc<MockMessage>> {
        self.sent
            .lock()
            .expect("sent lock")
            .last()
            .map(|(_, _, message)| message.clone())
    }

    fn deliver(&self, message: Outgoing) -> MessageRef {
        let created = MockMessage::new(&next_id("message"));
        self.sent
            .lock()
            .expect("sent lock")
            .push((message.flags, message.body, created.clone()));
        created
    }
}

#[async_trait]
impl ChannelHandle for MockChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send(&self, message: Outgoing) -> Result<MessageRef, PlatformError> {
        Ok(self.deliver(message))
    }
}

#[async_trait]
impl UserHandle for MockChannel {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_dm(&self, message: Outgoing) -> Result<MessageRef, PlatformError> {
        Ok(self.deliver(message))
    }
}
