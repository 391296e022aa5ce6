use crate::config::RendererOptions;
use crate::dispatch::{DispatchTable, has_prefix};
use crate::error::{Error, Result};
use crate::node::Node;
use crate::payload::PayloadBuilder;
use crate::protocol::MessageFlags;
use crate::responder::{InteractionRef, Target};
use crate::updater::{MessageUpdater, UpdaterEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

const EVENT_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendererEvent {
    /// A commit could not be compiled or applied.
    RenderError(String),
    /// The surface can no longer be updated.
    Inactivity,
}

/// Owns one rendered surface: compiles commits, routes the interactions its
/// components produce and feeds the updater.
#[derive(Clone)]
pub struct Renderer {
    inner: Arc<Inner>,
}

struct Inner {
    key: String,
    prefix: String,
    default_flags: MessageFlags,
    updater: MessageUpdater,
    dispatch: Mutex<Arc<DispatchTable>>,
    events: broadcast::Sender<RendererEvent>,
}

impl Renderer {
    /// Must be called inside a tokio runtime.
    pub fn new(target: Target, options: RendererOptions) -> Self {
        let key = options
            .key
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let prefix = format!("ui:{key}");
        let default_flags = options.updater.default_flags;
        let updater = MessageUpdater::new(target, options.updater);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        tokio::spawn(forward_expiry(key.clone(), updater.subscribe(), events.clone()));

        Self {
            inner: Arc::new(Inner {
                key,
                prefix,
                default_flags,
                updater,
                dispatch: Mutex::new(Arc::default()),
                events,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// Every custom id minted for this surface starts with `{prefix}:`.
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    pub fn updater(&self) -> &MessageUpdater {
        &self.inner.updater
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RendererEvent> {
        self.inner.events.subscribe()
    }

    fn dispatch(&self) -> MutexGuard<'_, Arc<DispatchTable>> {
        self.inner
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a committed tree. An empty commit leaves the surface as it is.
    pub fn on_commit(&self, root: Option<&Node>) {
        let Some(root) = root else {
            return;
        };

        let compiled =
            PayloadBuilder::new(self.prefix()).build_message(root, self.inner.default_flags);
        match compiled {
            Ok(compiled) => {
                let (message, dispatch) = compiled.into_parts();
                debug!(
                    renderer = %self.inner.key,
                    handlers = dispatch.len(),
                    "compiled commit"
                );
                *self.dispatch() = Arc::new(dispatch);
                self.inner.updater.update_message(message);
            }
            Err(err) => self.on_render_error(err.into()),
        }
    }

    /// Shows a render failure on the surface and reports it to subscribers.
    pub fn on_render_error(&self, err: Error) {
        warn!(renderer = %self.inner.key, %err, "render error");
        let _ = self
            .inner
            .events
            .send(RendererEvent::RenderError(err.to_string()));
        self.inner.updater.report_error(err);
    }

    /// Routes an interaction to the handler registered under its custom id.
    /// Returns false when the id belongs to another surface or nothing
    /// handled it.
    pub fn dispatch_interaction(&self, interaction: &InteractionRef) -> bool {
        let data = interaction.data();
        let Some(custom_id) = data.custom_id() else {
            return false;
        };
        if !has_prefix(custom_id, self.prefix()) {
            return false;
        }

        // Renders triggered by the handler must answer this interaction.
        if data.needs_update() {
            self.inner
                .updater
                .set_target(Target::Interaction(interaction.clone()));
        }

        let table = self.dispatch().clone();
        let handled = table.route(interaction);
        if !handled {
            debug!(renderer = %self.inner.key, custom_id, "no handler for interaction");
        }
        handled
    }

    pub async fn disable(&self) -> Result<()> {
        self.inner.updater.disable().await
    }
}

/// Runs for the updater's lifetime: a surface revived by a new responder can
/// expire again.
async fn forward_expiry(
    key: String,
    mut updates: broadcast::Receiver<UpdaterEvent>,
    events: broadcast::Sender<RendererEvent>,
) {
    loop {
        match updates.recv().await {
            Ok(UpdaterEvent::TokenExpired | UpdaterEvent::Timeout) => {
                debug!(renderer = %key, "surface became inactive");
                let _ = events.send(RendererEvent::Inactivity);
            }
            Ok(UpdaterEvent::MessageUpdated(_)) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(renderer = %key, skipped, "updater events lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
