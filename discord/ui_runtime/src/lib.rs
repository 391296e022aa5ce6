pub mod attachments;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod manager;
pub mod node;
pub mod payload;
pub mod protocol;
pub mod renderer;
pub mod responder;
pub mod scheduler;
pub mod updater;

#[cfg(test)]
mod testing;

pub use crate::attachments::{BinaryResource, MediaSource};
pub use crate::config::{RendererOptions, UpdaterConfig};
pub use crate::dispatch::{DispatchTable, ModalForm};
pub use crate::error::{AttachmentError, CompileError, Error, PlatformError, Result};
pub use crate::manager::RendererManager;
pub use crate::node::{Node, NodeKind, PropValue};
pub use crate::payload::{OutboundMessage, PayloadBuilder, compile, compile_modal};
pub use crate::protocol::{Component, MessageBody, MessageFlags, ModalBody};
pub use crate::renderer::{Renderer, RendererEvent};
pub use crate::responder::{
    ChannelHandle, InteractionData, InteractionHandle, InteractionRef, MessageHandle, Outgoing,
    ResponseMethod, Target, UserHandle,
};
pub use crate::updater::{MessageUpdater, UpdaterEvent, UpdaterState};
pub use serde_json;
