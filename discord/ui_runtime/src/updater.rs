//! Keeps one rendered surface in sync with the platform.
//!
//! All protocol state lives in a single task. Application updates, the
//! reply timeout, token expiry, inactivity and responder reassignment are
//! commands or deadlines of that task, so no two platform calls for the same
//! surface ever overlap.

use crate::attachments;
use crate::config::UpdaterConfig;
use crate::error::{Error, Result};
use crate::payload::OutboundMessage;
use crate::payload::color::YELLOW;
use crate::protocol::{Component, MessageBody};
use crate::responder::{Outgoing, ResponseMethod, Target};
use crate::scheduler::{Debounce, wait_for};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdaterState {
    Idle,
    AwaitingInitialReply,
    Replied,
    TokenExpired,
    TimedOut,
}

impl UpdaterState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::TokenExpired | Self::TimedOut)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterEvent {
    TokenExpired,
    Timeout,
    MessageUpdated(ResponseMethod),
}

/// True when an update numbered `rev` is not newer than `last`.
pub fn is_stale(last: Option<u64>, rev: u64) -> bool {
    matches!(last, Some(last) if rev <= last)
}

enum Command {
    Update {
        rev: u64,
        message: OutboundMessage,
        immediate: bool,
        done: Option<oneshot::Sender<Result<()>>>,
    },
    ShowError {
        error: Error,
        done: Option<oneshot::Sender<()>>,
    },
    Disable(oneshot::Sender<()>),
    SetTarget(Target),
    Flush(oneshot::Sender<()>),
    Settle(oneshot::Sender<()>),
}

#[derive(Debug)]
struct Pending {
    rev: u64,
    message: OutboundMessage,
}

/// Handle to the task that owns a surface's responder.
#[derive(Clone)]
pub struct MessageUpdater {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<UpdaterState>,
    events: broadcast::Sender<UpdaterEvent>,
    next_rev: Arc<AtomicU64>,
}

impl MessageUpdater {
    /// Spawns the updater task. Must be called inside a tokio runtime.
    pub fn new(target: Target, config: UpdaterConfig) -> Self {
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(UpdaterState::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let task = UpdaterTask {
            pending: Debounce::new(config.debounce),
            target,
            config,
            state: UpdaterState::Idle,
            state_tx,
            events: events.clone(),
            last_rev: None,
            last_payload: None,
            showing_disabled: false,
            reply_deadline: None,
            token_deadline: None,
            inactivity_deadline: None,
        };
        tokio::spawn(task.run(command_rx));

        Self {
            commands,
            state,
            events,
            next_rev: Arc::new(AtomicU64::new(1)),
        }
    }

    fn send(&self, command: Command) -> bool {
        if self.commands.send(command).is_err() {
            warn!("message updater task has stopped; dropping command");
            return false;
        }
        true
    }

    fn next_rev(&self) -> u64 {
        self.next_rev.fetch_add(1, Ordering::Relaxed)
    }

    /// Queues a payload behind the debounce window. Only the latest queued
    /// payload is applied.
    pub fn update_message(&self, message: OutboundMessage) {
        let rev = self.next_rev();
        self.send(Command::Update {
            rev,
            message,
            immediate: false,
            done: None,
        });
    }

    /// Applies a payload without waiting for the debounce window and
    /// reports the outcome. Queued older payloads are discarded.
    pub async fn update_message_now(&self, message: OutboundMessage) -> Result<()> {
        let (done, rx) = oneshot::channel();
        let rev = self.next_rev();
        if !self.send(Command::Update {
            rev,
            message,
            immediate: true,
            done: Some(done),
        }) {
            return Err(Error::UpdaterClosed);
        }
        rx.await.map_err(|_| Error::UpdaterClosed)?
    }

    /// Shows `error` on the surface, or expires the responder when the error
    /// says its token is gone.
    pub async fn handle_error(&self, error: Error) {
        let (done, rx) = oneshot::channel();
        if self.send(Command::ShowError {
            error,
            done: Some(done),
        }) {
            let _ = rx.await;
        }
    }

    pub fn report_error(&self, error: Error) {
        self.send(Command::ShowError { error, done: None });
    }

    /// Re-applies the last payload with every interactive component
    /// disabled.
    pub async fn disable(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        if !self.send(Command::Disable(done)) {
            return Err(Error::UpdaterClosed);
        }
        rx.await.map_err(|_| Error::UpdaterClosed)
    }

    pub fn set_target(&self, target: Target) {
        self.send(Command::SetTarget(target));
    }

    /// Applies the queued payload now instead of waiting out the debounce.
    pub async fn flush(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        if !self.send(Command::Flush(done)) {
            return Err(Error::UpdaterClosed);
        }
        rx.await.map_err(|_| Error::UpdaterClosed)
    }

    /// Resolves once every command sent before it has been handled.
    pub async fn settle(&self) -> Result<()> {
        let (done, rx) = oneshot::channel();
        if !self.send(Command::Settle(done)) {
            return Err(Error::UpdaterClosed);
        }
        rx.await.map_err(|_| Error::UpdaterClosed)
    }

    pub fn state(&self) -> UpdaterState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UpdaterEvent> {
        self.events.subscribe()
    }
}

struct UpdaterTask {
    target: Target,
    config: UpdaterConfig,
    state: UpdaterState,
    state_tx: watch::Sender<UpdaterState>,
    events: broadcast::Sender<UpdaterEvent>,
    pending: Debounce<Pending>,
    last_rev: Option<u64>,
    last_payload: Option<OutboundMessage>,
    showing_disabled: bool,
    reply_deadline: Option<Instant>,
    token_deadline: Option<Instant>,
    inactivity_deadline: Option<Instant>,
}

impl UpdaterTask {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        self.arm_target_timers();
        debug!(target_kind = self.target.kind(), state = ?self.state, "message updater started");

        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = wait_for(self.reply_deadline) => self.on_reply_timeout().await,
                _ = wait_for(self.pending.deadline()) => self.flush_pending().await,
                _ = wait_for(self.token_deadline) => self.on_token_deadline().await,
                _ = wait_for(self.inactivity_deadline) => self.on_inactivity().await,
            }
        }

        self.flush_pending().await;
        debug!("message updater stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Update {
                rev,
                message,
                immediate,
                done,
            } => {
                let result = self.enqueue(rev, message, immediate).await;
                if let Some(done) = done {
                    let _ = done.send(result);
                }
            }
            Command::ShowError { error, done } => {
                self.handle_error(&error, None).await;
                if let Some(done) = done {
                    let _ = done.send(());
                }
            }
            Command::Disable(done) => {
                self.disable().await;
                let _ = done.send(());
            }
            Command::SetTarget(target) => self.set_target(target).await,
            Command::Flush(done) => {
                self.flush_pending().await;
                let _ = done.send(());
            }
            Command::Settle(done) => {
                let _ = done.send(());
            }
        }
    }

    fn set_state(&mut self, state: UpdaterState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "message updater state change");
            self.state = state;
            self.state_tx.send_replace(state);
        }
    }

    fn emit(&self, event: UpdaterEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn arm_target_timers(&mut self) {
        let now = Instant::now();
        self.token_deadline = self
            .target
            .expires()
            .then(|| now + self.config.token_deadline());

        if self.target.can_defer() {
            self.reply_deadline = Some(now + self.config.defer_after);
            self.set_state(UpdaterState::AwaitingInitialReply);
        } else {
            self.reply_deadline = None;
            let settled = if self.last_payload.is_some() {
                UpdaterState::Replied
            } else {
                UpdaterState::Idle
            };
            self.set_state(settled);
        }
    }

    async fn enqueue(&mut self, rev: u64, message: OutboundMessage, immediate: bool) -> Result<()> {
        if self.state.is_terminal() {
            info!(state = ?self.state, rev, "ignoring update for an expired surface");
            return Ok(());
        }
        if is_stale(self.last_rev, rev) {
            debug!(rev, last_rev = ?self.last_rev, "discarding stale update");
            return Ok(());
        }
        self.last_rev = Some(rev);

        if immediate {
            if let Some(superseded) = self.pending.take() {
                debug!(rev = superseded.rev, "queued update superseded");
            }
            return self.update_message(message).await;
        }

        if let Some(replaced) = self.pending.push(Pending { rev, message }) {
            debug!(rev = replaced.rev, "queued update replaced");
        }
        Ok(())
    }

    async fn flush_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            // Failures are already routed through the error display.
            let _ = self.update_message(pending.message).await;
        }
    }

    async fn update_message(&mut self, message: OutboundMessage) -> Result<()> {
        if self.state.is_terminal() {
            info!(state = ?self.state, "ignoring update for an expired surface");
            return Ok(());
        }

        match self.apply(&message).await {
            Ok(method) => {
                self.last_payload = Some(message);
                self.showing_disabled = false;
                self.on_applied(method, true);
                Ok(())
            }
            Err(err) => {
                self.handle_error(&err, Some(&message)).await;
                Err(err)
            }
        }
    }

    async fn apply(&mut self, message: &OutboundMessage) -> Result<ResponseMethod> {
        let files = attachments::resolve_all(&message.attachments).await?;
        let outgoing = Outgoing {
            body: message.body.clone(),
            flags: message.flags,
            files,
        };
        Ok(self.target.apply(outgoing).await?)
    }

    fn on_applied(&mut self, method: ResponseMethod, touch: bool) {
        debug!(%method, target_kind = self.target.kind(), "message updated");
        self.reply_deadline = None;
        if touch {
            self.inactivity_deadline = self
                .config
                .inactivity
                .map(|inactivity| Instant::now() + inactivity);
        }
        self.set_state(UpdaterState::Replied);
        self.emit(UpdaterEvent::MessageUpdated(method));
    }

    /// `failed` is the payload whose application raised `err`, if any; its
    /// flags decide how the diagnostic is laid out.
    async fn handle_error(&mut self, err: &Error, failed: Option<&OutboundMessage>) {
        if err.is_token_expired() {
            warn!(%err, "interaction token rejected; surface is no longer updatable");
            self.enter_terminal(UpdaterState::TokenExpired, UpdaterEvent::TokenExpired);
            return;
        }
        if self.state.is_terminal() {
            debug!(%err, "not displaying error on an expired surface");
            return;
        }

        warn!(%err, "displaying render error");
        let flags = failed
            .or(self.last_payload.as_ref())
            .map(|message| message.flags)
            .unwrap_or(self.config.default_flags);
        let fallback = OutboundMessage {
            flags,
            body: error_body(&err.to_string(), flags.is_v2()),
            attachments: Default::default(),
        };

        match self.apply(&fallback).await {
            Ok(method) => self.on_applied(method, false),
            Err(fallback_err) => {
                error!(%err, %fallback_err, "failed to display render error");
            }
        }
    }

    async fn on_reply_timeout(&mut self) {
        self.reply_deadline = None;
        if self.state != UpdaterState::AwaitingInitialReply {
            return;
        }

        // Content always wins over a bare acknowledgement.
        if self.pending.is_pending() {
            debug!("reply deadline reached with queued content; applying it now");
            self.flush_pending().await;
            return;
        }

        self.acknowledge().await;
    }

    async fn acknowledge(&mut self) {
        match self.target.acknowledge(self.config.default_flags).await {
            Ok(Some(method)) => {
                debug!(%method, "acknowledged interaction without content");
                self.set_state(UpdaterState::Replied);
                self.emit(UpdaterEvent::MessageUpdated(method));
            }
            Ok(None) => {}
            Err(err) if err.is_token_expired() => {
                warn!(%err, "interaction expired before it could be acknowledged");
                self.enter_terminal(UpdaterState::TokenExpired, UpdaterEvent::TokenExpired);
            }
            Err(err) => warn!(%err, "failed to acknowledge interaction"),
        }
    }

    async fn set_target(&mut self, target: Target) {
        if self.state == UpdaterState::TimedOut {
            debug!(target_kind = target.kind(), "ignoring new responder for a timed out surface");
            return;
        }

        if !self.state.is_terminal() && self.target.can_defer() {
            debug!("acknowledging replaced responder");
            self.acknowledge().await;
        }

        debug!(from = ?self.target, to = ?target, "responder reassigned");
        self.target = target;
        if self.state == UpdaterState::TokenExpired {
            self.set_state(UpdaterState::Idle);
        }
        self.arm_target_timers();
    }

    async fn disable(&mut self) {
        if self.state.is_terminal() || self.showing_disabled {
            return;
        }
        let Some(last) = &self.last_payload else {
            return;
        };

        let disabled = OutboundMessage {
            flags: last.flags,
            body: last.body.with_components_disabled(),
            attachments: last.attachments.clone(),
        };
        self.pending.clear();

        match self.apply(&disabled).await {
            Ok(method) => {
                self.showing_disabled = true;
                self.on_applied(method, false);
            }
            Err(err) => {
                warn!(%err, "failed to disable components");
                if err.is_token_expired() {
                    self.enter_terminal(UpdaterState::TokenExpired, UpdaterEvent::TokenExpired);
                }
            }
        }
    }

    async fn on_token_deadline(&mut self) {
        self.token_deadline = None;
        if self.state.is_terminal() {
            return;
        }
        info!(target_kind = self.target.kind(), "interaction token about to expire");
        self.disable().await;
        self.enter_terminal(UpdaterState::TokenExpired, UpdaterEvent::TokenExpired);
    }

    async fn on_inactivity(&mut self) {
        self.inactivity_deadline = None;
        if self.state.is_terminal() {
            return;
        }
        info!("surface inactive; disabling");
        self.disable().await;
        self.enter_terminal(UpdaterState::TimedOut, UpdaterEvent::Timeout);
    }

    fn enter_terminal(&mut self, state: UpdaterState, event: UpdaterEvent) {
        if self.state == state {
            return;
        }
        self.pending.clear();
        self.reply_deadline = None;
        self.token_deadline = None;
        self.inactivity_deadline = None;
        self.set_state(state);
        self.emit(event);
    }
}

fn error_body(description: &str, v2: bool) -> MessageBody {
    let content = format!(
        "-# `discord_ui_runtime`: failed to render\n### ⚠️ **Error**\n\n```\n{description}\n```"
    );

    if v2 {
        MessageBody {
            content: None,
            components: vec![Component::container(
                vec![Component::text_display(content)],
                Some(YELLOW),
            )],
        }
    } else {
        MessageBody {
            content: Some(format!(">>> {content}")),
            components: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::{AttachmentRegistry, AttachmentSet, BinaryResource};
    use crate::dispatch::SequentialIds;
    use crate::error::{AttachmentError, PlatformError};
    use crate::protocol::{Button, ButtonStyle, ComponentType, MessageFlags, Section, SelectMenu};
    use crate::responder::InteractionHandle;
    use crate::testing::{Call, MockChannel, MockInteraction, MockMessage};
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::time::sleep;

    fn payload(text: &str) -> OutboundMessage {
        OutboundMessage {
            flags: MessageFlags::IS_COMPONENTS_V2,
            body: MessageBody {
                content: None,
                components: vec![Component::text_display(text)],
            },
            attachments: AttachmentSet::default(),
        }
    }

    fn text_of(body: &MessageBody) -> Option<&str> {
        match body.components.first() {
            Some(Component::TextDisplay(text)) => Some(&text.content),
            _ => None,
        }
    }

    fn button(id: &str) -> Component {
        Component::Button(Button {
            kind: ComponentType::Button,
            style: ButtonStyle::Primary,
            label: Some(id.to_string()),
            custom_id: Some(id.to_string()),
            sku_id: None,
            url: None,
            disabled: None,
            emoji: None,
        })
    }

    fn interactive_payload() -> OutboundMessage {
        let select = Component::Select(SelectMenu {
            kind: ComponentType::RoleSelect,
            custom_id: "roles".to_string(),
            placeholder: None,
            min_values: None,
            max_values: None,
            disabled: None,
            options: None,
            default_values: None,
            channel_types: None,
        });
        let section = Component::Section(Section {
            kind: ComponentType::Section,
            components: vec![Component::text_display("side")],
            accessory: Box::new(button("accessory")),
        });
        OutboundMessage {
            flags: MessageFlags::IS_COMPONENTS_V2,
            body: MessageBody {
                content: None,
                components: vec![
                    Component::container(
                        vec![Component::action_row(vec![button("a"), button("b")]), section],
                        None,
                    ),
                    Component::action_row(vec![select]),
                ],
            },
            attachments: AttachmentSet::default(),
        }
    }

    fn interactive_states(value: &Value, out: &mut Vec<bool>) {
        match value {
            Value::Object(map) => {
                if matches!(map.get("type").and_then(Value::as_u64), Some(2 | 3 | 5 | 6 | 7 | 8)) {
                    out.push(map.get("disabled") == Some(&Value::Bool(true)));
                }
                map.values().for_each(|child| interactive_states(child, out));
            }
            Value::Array(items) => items.iter().for_each(|child| interactive_states(child, out)),
            _ => {}
        }
    }

    fn drain(events: &mut broadcast::Receiver<UpdaterEvent>) -> Vec<UpdaterEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    #[test]
    fn stale_revisions_are_detected() {
        assert!(!is_stale(None, 1));
        assert!(!is_stale(Some(1), 2));
        assert!(is_stale(Some(2), 2));
        assert!(is_stale(Some(3), 2));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_updates_sends_only_the_latest() {
        let interaction = MockInteraction::command("ping");
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );

        for i in 1..=5 {
            updater.update_message(payload(&format!("render {i}")));
        }
        sleep(Duration::from_millis(301)).await;
        updater.settle().await.expect("settle");

        let calls = interaction.calls();
        assert_eq!(calls.len(), 1);
        let Call::Reply(_, body) = &calls[0] else {
            panic!("expected reply, got {calls:?}");
        };
        assert_eq!(text_of(body), Some("render 5"));
        assert_eq!(updater.state(), UpdaterState::Replied);
    }

    #[tokio::test(start_paused = true)]
    async fn updates_during_quiet_period_restart_the_window() {
        let interaction = MockInteraction::command("ping");
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );

        updater.update_message(payload("first"));
        sleep(Duration::from_millis(200)).await;
        updater.update_message(payload("second"));
        sleep(Duration::from_millis(200)).await;
        updater.settle().await.expect("settle");
        assert!(interaction.calls().is_empty());

        sleep(Duration::from_millis(101)).await;
        updater.settle().await.expect("settle");
        assert_eq!(interaction.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_command_is_acknowledged_after_defer_window() {
        let interaction = MockInteraction::command("ping");
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );
        assert_eq!(updater.state(), UpdaterState::AwaitingInitialReply);

        sleep(Duration::from_millis(2_001)).await;
        updater.settle().await.expect("settle");

        assert!(interaction.deferred() || interaction.replied());
        assert!(matches!(
            interaction.calls().as_slice(),
            [Call::DeferReply(flags)] if flags.is_empty()
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_component_interaction_defers_update() {
        let interaction = MockInteraction::button("ui:x:1");
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );

        sleep(Duration::from_millis(2_001)).await;
        updater.settle().await.expect("settle");

        assert!(matches!(interaction.calls().as_slice(), [Call::DeferUpdate]));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_content_wins_over_acknowledgement() {
        let interaction = MockInteraction::command("ping");
        let config = UpdaterConfig {
            debounce: Duration::from_secs(5),
            ..UpdaterConfig::default()
        };
        let updater = MessageUpdater::new(Target::Interaction(interaction.clone()), config);

        updater.update_message(payload("content"));
        sleep(Duration::from_millis(2_001)).await;
        updater.settle().await.expect("settle");

        let calls = interaction.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::Reply(_, body) if text_of(body) == Some("content")));

        sleep(Duration::from_secs(5)).await;
        updater.settle().await.expect("settle");
        assert_eq!(interaction.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn token_invalid_error_expires_without_fallback() {
        let interaction = MockInteraction::command("ping");
        interaction.fail_next(PlatformError::UnknownInteraction);
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );
        let mut events = updater.subscribe();

        let err = updater
            .update_message_now(payload("hello"))
            .await
            .expect_err("token rejected");

        assert!(err.is_token_expired());
        assert_eq!(updater.state(), UpdaterState::TokenExpired);
        assert!(interaction.calls().is_empty());
        assert_eq!(drain(&mut events), vec![UpdaterEvent::TokenExpired]);

        updater
            .update_message_now(payload("ignored"))
            .await
            .expect("ignored update");
        assert!(interaction.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_error_displays_diagnostic() {
        let interaction = MockInteraction::command("ping");
        interaction.fail_next(PlatformError::from_code(50035, "Invalid Form Body"));
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );

        updater
            .update_message_now(payload("bad"))
            .await
            .expect_err("first attempt fails");

        let calls = interaction.calls();
        let [Call::Reply(flags, body)] = calls.as_slice() else {
            panic!("expected one fallback reply, got {calls:?}");
        };
        assert!(flags.is_v2());
        let Some(Component::Container(container)) = body.components.first() else {
            panic!("expected container, got {body:?}");
        };
        assert_eq!(container.accent_color, Some(YELLOW));
        let Some(Component::TextDisplay(text)) = container.components.first() else {
            panic!("expected text display");
        };
        assert!(text.content.contains("Invalid Form Body"));
        assert!(text.content.contains("```"));
        assert_eq!(updater.state(), UpdaterState::Replied);
    }

    #[tokio::test(start_paused = true)]
    async fn unreadable_attachment_displays_diagnostic_once() {
        let interaction = MockInteraction::command("ping");
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );
        let mut events = updater.subscribe();
        let mut registry = AttachmentRegistry::new(Arc::new(SequentialIds::new()));
        registry.resolve_media(&BinaryResource::file("/definitely/missing.png").into());
        let message = OutboundMessage {
            attachments: registry.into_set(),
            ..payload("with file")
        };

        let err = updater
            .update_message_now(message)
            .await
            .expect_err("attachment read fails");

        assert!(matches!(err, Error::Attachment(AttachmentError::Read { .. })));
        let calls = interaction.calls();
        let [Call::Reply(_, body)] = calls.as_slice() else {
            panic!("expected one fallback reply, got {calls:?}");
        };
        let Some(Component::Container(container)) = body.components.first() else {
            panic!("expected container, got {body:?}");
        };
        let Some(Component::TextDisplay(text)) = container.components.first() else {
            panic!("expected text display");
        };
        assert!(text.content.contains("missing.png"));
        assert_eq!(updater.state(), UpdaterState::Replied);
        assert_eq!(
            drain(&mut events),
            vec![UpdaterEvent::MessageUpdated(ResponseMethod::Reply)]
        );

        sleep(Duration::from_secs(5)).await;
        updater.settle().await.expect("settle");
        assert_eq!(interaction.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_fallback_is_only_logged() {
        let interaction = MockInteraction::command("ping");
        interaction.fail_next(PlatformError::Transport("reset".to_string()));
        interaction.fail_next(PlatformError::Transport("reset again".to_string()));
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );

        let result = updater.update_message_now(payload("x")).await;

        assert!(result.is_err());
        assert!(interaction.calls().is_empty());
        assert_eq!(updater.state(), UpdaterState::AwaitingInitialReply);
    }

    #[tokio::test(start_paused = true)]
    async fn legacy_fallback_is_block_quoted() {
        let channel = MockChannel::new("c1");
        let updater = MessageUpdater::new(
            Target::Channel(channel.clone()),
            UpdaterConfig::default().with_default_flags(MessageFlags::empty()),
        );

        updater.handle_error(Error::Render("boom".to_string())).await;

        let sent = channel.sent_bodies();
        let content = sent[0].content.as_deref().expect("content");
        assert!(content.starts_with(">>> -# `discord_ui_runtime`: failed to render"));
        assert!(content.contains("render failed: boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn disable_twice_mutates_once_and_disables_everything() {
        let interaction = MockInteraction::command("ping");
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );

        updater
            .update_message_now(interactive_payload())
            .await
            .expect("initial reply");
        updater.disable().await.expect("disable");
        updater.disable().await.expect("disable again");

        let calls = interaction.calls();
        assert_eq!(calls.len(), 2);
        let Call::EditReply(_, body) = &calls[1] else {
            panic!("expected edit, got {calls:?}");
        };
        let mut states = Vec::new();
        interactive_states(&serde_json::to_value(body).expect("json"), &mut states);
        assert_eq!(states, vec![true; 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn disable_without_payload_is_noop() {
        let message = MockMessage::new("m1");
        let updater = MessageUpdater::new(Target::Message(message.clone()), UpdaterConfig::default());

        updater.disable().await.expect("disable");

        assert_eq!(message.edits(), 0);
        assert_eq!(updater.state(), UpdaterState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn token_expiry_disables_then_expires() {
        let interaction = MockInteraction::command("ping");
        let updater = MessageUpdater::new(
            Target::Interaction(interaction.clone()),
            UpdaterConfig::default(),
        );
        updater
            .update_message_now(interactive_payload())
            .await
            .expect("reply");
        let mut events = updater.subscribe();

        sleep(Duration::from_secs(14 * 60 + 31)).await;
        updater.settle().await.expect("settle");

        assert_eq!(updater.state(), UpdaterState::TokenExpired);
        assert!(matches!(interaction.calls().last(), Some(Call::EditReply(..))));
        assert_eq!(
            drain(&mut events),
            vec![
                UpdaterEvent::MessageUpdated(ResponseMethod::EditReply),
                UpdaterEvent::TokenExpired,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn inactivity_times_out_and_ignores_new_responders() {
        let message = MockMessage::new("m1");
        let updater = MessageUpdater::new(
            Target::Message(message.clone()),
            UpdaterConfig::default().with_inactivity(Duration::from_secs(60)),
        );
        let mut events = updater.subscribe();
        updater
            .update_message_now(interactive_payload())
            .await
            .expect("edit");

        sleep(Duration::from_secs(61)).await;
        updater.settle().await.expect("settle");

        assert_eq!(updater.state(), UpdaterState::TimedOut);
        assert_eq!(message.edits(), 2);
        assert_eq!(drain(&mut events).last(), Some(&UpdaterEvent::Timeout));

        updater.set_target(Target::Interaction(MockInteraction::button("ui:x:1")));
        updater.update_message_now(payload("late")).await.expect("ignored");
        assert_eq!(updater.state(), UpdaterState::TimedOut);
        assert_eq!(message.edits(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn reassigned_component_interaction_updates_then_edits() {
        let command = MockInteraction::command("ping");
        let updater = MessageUpdater::new(
            Target::Interaction(command.clone()),
            UpdaterConfig::default(),
        );
        updater.update_message_now(payload("one")).await.expect("reply");

        let click = MockInteraction::button("ui:x:1");
        updater.set_target(Target::Interaction(click.clone()));
        updater.update_message_now(payload("two")).await.expect("update");
        updater.update_message_now(payload("three")).await.expect("edit");

        assert_eq!(command.calls().len(), 1);
        let calls = click.calls();
        assert!(matches!(&calls[0], Call::Update(_, body) if text_of(body) == Some("two")));
        assert!(matches!(&calls[1], Call::EditReply(_, body) if text_of(body) == Some("three")));
    }

    #[tokio::test(start_paused = true)]
    async fn replaced_responder_is_acknowledged_immediately() {
        let command = MockInteraction::command("ping");
        let updater = MessageUpdater::new(
            Target::Interaction(command.clone()),
            UpdaterConfig::default(),
        );

        updater.set_target(Target::Interaction(MockInteraction::button("ui:x:1")));
        updater.settle().await.expect("settle");

        assert!(command.deferred());
    }

    #[tokio::test(start_paused = true)]
    async fn new_responder_revives_expired_surface() {
        let command = MockInteraction::command("ping");
        command.fail_next(PlatformError::InvalidToken);
        let updater = MessageUpdater::new(
            Target::Interaction(command.clone()),
            UpdaterConfig::default(),
        );
        let _ = updater.update_message_now(payload("x")).await;
        assert_eq!(updater.state(), UpdaterState::TokenExpired);

        let click = MockInteraction::button("ui:x:1");
        updater.set_target(Target::Interaction(click.clone()));
        updater.update_message_now(payload("y")).await.expect("update");

        assert_eq!(updater.state(), UpdaterState::Replied);
        assert_eq!(click.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn channel_target_sends_then_edits_created_message() {
        let channel = MockChannel::new("c1");
        let updater = MessageUpdater::new(Target::Channel(channel.clone()), UpdaterConfig::default());
        let mut events = updater.subscribe();
        assert_eq!(updater.state(), UpdaterState::Idle);

        updater.update_message_now(payload("a")).await.expect("send");
        updater.update_message_now(payload("b")).await.expect("edit");

        assert_eq!(channel.sent(), 1);
        assert_eq!(channel.last_message().expect("message").edits(), 1);
        assert_eq!(
            drain(&mut events),
            vec![
                UpdaterEvent::MessageUpdated(ResponseMethod::Send),
                UpdaterEvent::MessageUpdated(ResponseMethod::Edit),
            ]
        );
    }
}
