use crate::attachments::ResolvedFile;
use crate::dispatch::ModalForm;
use crate::error::PlatformError;
use crate::protocol::{MessageBody, MessageFlags, ModalBody, SelectKind};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub type InteractionRef = Arc<dyn InteractionHandle>;
pub type MessageRef = Arc<dyn MessageHandle>;
pub type ChannelRef = Arc<dyn ChannelHandle>;
pub type UserRef = Arc<dyn UserHandle>;

/// What the user did to produce an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionData {
    Command {
        name: String,
    },
    Button {
        custom_id: String,
    },
    Select {
        custom_id: String,
        kind: SelectKind,
        values: Vec<String>,
    },
    ModalSubmit {
        custom_id: String,
        from_message: bool,
        fields: ModalForm,
    },
}

impl InteractionData {
    pub fn custom_id(&self) -> Option<&str> {
        match self {
            Self::Command { .. } => None,
            Self::Button { custom_id }
            | Self::Select { custom_id, .. }
            | Self::ModalSubmit { custom_id, .. } => Some(custom_id),
        }
    }

    /// Component interactions and modal submits raised from a message answer
    /// by updating that message instead of replying.
    pub fn needs_update(&self) -> bool {
        match self {
            Self::Command { .. } => false,
            Self::Button { .. } | Self::Select { .. } => true,
            Self::ModalSubmit { from_message, .. } => *from_message,
        }
    }
}

/// A message body ready for a platform call.
#[derive(Debug, Clone, Default)]
pub struct Outgoing {
    pub body: MessageBody,
    pub flags: MessageFlags,
    pub files: Vec<ResolvedFile>,
}

#[async_trait]
pub trait InteractionHandle: Send + Sync {
    fn id(&self) -> &str;
    fn data(&self) -> &InteractionData;
    fn replied(&self) -> bool;
    fn deferred(&self) -> bool;

    async fn reply(&self, message: Outgoing) -> Result<(), PlatformError>;
    async fn update(&self, message: Outgoing) -> Result<(), PlatformError>;
    async fn edit_reply(&self, message: Outgoing) -> Result<(), PlatformError>;
    async fn defer_reply(&self, flags: MessageFlags) -> Result<(), PlatformError>;
    async fn defer_update(&self) -> Result<(), PlatformError>;
    async fn show_modal(&self, modal: ModalBody) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait MessageHandle: Send + Sync {
    fn id(&self) -> &str;

    async fn edit(&self, message: Outgoing) -> Result<(), PlatformError>;
}

#[async_trait]
pub trait ChannelHandle: Send + Sync {
    fn id(&self) -> &str;

    async fn send(&self, message: Outgoing) -> Result<MessageRef, PlatformError>;
}

#[async_trait]
pub trait UserHandle: Send + Sync {
    fn id(&self) -> &str;

    async fn send_dm(&self, message: Outgoing) -> Result<MessageRef, PlatformError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseMethod {
    Reply,
    Update,
    EditReply,
    Edit,
    Send,
    DeferReply,
    DeferUpdate,
}

impl ResponseMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Update => "update",
            Self::EditReply => "edit_reply",
            Self::Edit => "edit",
            Self::Send => "send",
            Self::DeferReply => "defer_reply",
            Self::DeferUpdate => "defer_update",
        }
    }
}

impl fmt::Display for ResponseMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The handle currently allowed to answer for a rendered surface.
#[derive(Clone)]
pub enum Target {
    Interaction(InteractionRef),
    Message(MessageRef),
    Channel(ChannelRef),
    User(UserRef),
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interaction(handle) => f.debug_tuple("Interaction").field(&handle.id()).finish(),
            Self::Message(handle) => f.debug_tuple("Message").field(&handle.id()).finish(),
            Self::Channel(handle) => f.debug_tuple("Channel").field(&handle.id()).finish(),
            Self::User(handle) => f.debug_tuple("User").field(&handle.id()).finish(),
        }
    }
}

impl Target {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Interaction(_) => "interaction",
            Self::Message(_) => "message",
            Self::Channel(_) => "channel",
            Self::User(_) => "user",
        }
    }

    /// An interaction that has neither replied nor deferred yet.
    pub fn can_defer(&self) -> bool {
        match self {
            Self::Interaction(interaction) => !interaction.replied() && !interaction.deferred(),
            Self::Message(_) | Self::Channel(_) | Self::User(_) => false,
        }
    }

    /// Only interaction tokens expire.
    pub fn expires(&self) -> bool {
        matches!(self, Self::Interaction(_))
    }

    /// Whether the next payload creates the surface rather than editing it.
    fn needs_initial(&self) -> bool {
        match self {
            Self::Interaction(_) => self.can_defer(),
            Self::Message(_) => false,
            Self::Channel(_) | Self::User(_) => true,
        }
    }

    /// Creates the surface. Channel and user sinks are replaced by the
    /// message they produced.
    pub async fn send_initial(&mut self, outgoing: Outgoing) -> Result<ResponseMethod, PlatformError> {
        match self {
            Self::Interaction(interaction) => {
                if interaction.data().needs_update() {
                    interaction
                        .update(masked(outgoing, MessageFlags::EDIT))
                        .await?;
                    Ok(ResponseMethod::Update)
                } else {
                    interaction
                        .reply(masked(outgoing, MessageFlags::REPLY))
                        .await?;
                    Ok(ResponseMethod::Reply)
                }
            }
            Self::Message(message) => {
                message.edit(masked(outgoing, MessageFlags::EDIT)).await?;
                Ok(ResponseMethod::Edit)
            }
            Self::Channel(channel) => {
                let message = channel.send(masked(outgoing, MessageFlags::SEND)).await?;
                *self = Self::Message(message);
                Ok(ResponseMethod::Send)
            }
            Self::User(user) => {
                let message = user.send_dm(masked(outgoing, MessageFlags::SEND)).await?;
                *self = Self::Message(message);
                Ok(ResponseMethod::Send)
            }
        }
    }

    pub async fn edit_existing(&mut self, outgoing: Outgoing) -> Result<ResponseMethod, PlatformError> {
        match self {
            Self::Interaction(interaction) => {
                interaction
                    .edit_reply(masked(outgoing, MessageFlags::EDIT))
                    .await?;
                Ok(ResponseMethod::EditReply)
            }
            Self::Message(message) => {
                message.edit(masked(outgoing, MessageFlags::EDIT)).await?;
                Ok(ResponseMethod::Edit)
            }
            Self::Channel(_) | Self::User(_) => self.send_initial(outgoing).await,
        }
    }

    pub async fn apply(&mut self, outgoing: Outgoing) -> Result<ResponseMethod, PlatformError> {
        if self.needs_initial() {
            self.send_initial(outgoing).await
        } else {
            self.edit_existing(outgoing).await
        }
    }

    /// Acknowledges a pending interaction without content. Returns `None`
    /// when there is nothing left to acknowledge.
    pub async fn acknowledge(
        &self,
        flags: MessageFlags,
    ) -> Result<Option<ResponseMethod>, PlatformError> {
        let Self::Interaction(interaction) = self else {
            return Ok(None);
        };
        if !self.can_defer() {
            return Ok(None);
        }

        if interaction.data().needs_update() {
            interaction.defer_update().await?;
            Ok(Some(ResponseMethod::DeferUpdate))
        } else {
            interaction
                .defer_reply(flags & MessageFlags::EPHEMERAL)
                .await?;
            Ok(Some(ResponseMethod::DeferReply))
        }
    }
}

fn masked(mut outgoing: Outgoing, allowed: MessageFlags) -> Outgoing {
    outgoing.flags &= allowed;
    outgoing
}
