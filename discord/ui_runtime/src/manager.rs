use crate::config::RendererOptions;
use crate::dispatch::SubmitHandler;
use crate::error::Result;
use crate::node::Node;
use crate::payload::compile_modal;
use crate::renderer::{Renderer, RendererEvent};
use crate::responder::{InteractionData, InteractionRef, Target};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

type Registry = Mutex<HashMap<String, Renderer>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routes platform interactions to every live interactive renderer and to
/// modals opened outside of a renderer.
#[derive(Clone, Default)]
pub struct RendererManager {
    renderers: Arc<Registry>,
    modal_listeners: Arc<Mutex<HashMap<String, SubmitHandler>>>,
}

impl RendererManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a renderer for `target`. Interactive renderers are registered
    /// until they report inactivity.
    pub fn create(&self, target: Target, options: RendererOptions) -> Renderer {
        let interactive = options.interactive;
        let renderer = Renderer::new(target, options);
        if interactive {
            tokio::spawn(remove_when_inactive(
                renderer.key().to_string(),
                renderer.subscribe(),
                Arc::downgrade(&self.renderers),
            ));
            self.add(renderer.clone());
        }
        renderer
    }

    pub fn add(&self, renderer: Renderer) {
        let key = renderer.key().to_string();
        if lock(&self.renderers).insert(key.clone(), renderer).is_some() {
            warn!(renderer = %key, "replaced renderer registered under the same key");
        }
    }

    pub fn remove(&self, key: &str) -> Option<Renderer> {
        lock(&self.renderers).remove(key)
    }

    pub fn get(&self, key: &str) -> Option<Renderer> {
        lock(&self.renderers).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.renderers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Renderer> {
        lock(&self.renderers).values().cloned().collect()
    }

    /// Offers the interaction to every registered renderer, then to the
    /// one-shot modal listeners. Returns whether any handler ran.
    pub fn dispatch_interaction(&self, interaction: &InteractionRef) -> bool {
        let mut handled = false;
        for renderer in self.snapshot() {
            handled |= renderer.dispatch_interaction(interaction);
        }

        if let InteractionData::ModalSubmit {
            custom_id, fields, ..
        } = interaction.data()
        {
            let listener = lock(&self.modal_listeners).remove(custom_id);
            if let Some(listener) = listener {
                debug!(custom_id = %custom_id, "modal listener consumed");
                listener(fields, interaction);
                handled = true;
            }
        }
        handled
    }

    /// Disables the components of every registered renderer.
    pub async fn disable_all(&self) {
        for renderer in self.snapshot() {
            if let Err(err) = renderer.disable().await {
                warn!(renderer = %renderer.key(), %err, "failed to disable renderer");
            }
        }
    }

    /// Compiles `modal`, shows it in answer to `interaction` and keeps its
    /// submit handler until the first submission. Returns the modal's
    /// custom id.
    pub async fn open_modal(&self, interaction: &InteractionRef, modal: &Node) -> Result<String> {
        let prefix = format!("ui:{}", uuid::Uuid::new_v4());
        let compiled = compile_modal(modal, &prefix)?;
        if !compiled.attachments.is_empty() {
            debug!(count = compiled.attachments.len(), "modal attachments are not uploaded");
        }

        let custom_id = compiled.body.custom_id.clone();
        let handler = compiled.dispatch.modal_submit(&custom_id).cloned();
        interaction.show_modal(compiled.body).await?;

        if let Some(handler) = handler {
            lock(&self.modal_listeners).insert(custom_id.clone(), handler);
        }
        Ok(custom_id)
    }
}

async fn remove_when_inactive(
    key: String,
    mut events: broadcast::Receiver<RendererEvent>,
    registry: Weak<Registry>,
) {
    loop {
        match events.recv().await {
            Ok(RendererEvent::Inactivity) => break,
            Ok(RendererEvent::RenderError(_)) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }

    if let Some(registry) = registry.upgrade() {
        info!(renderer = %key, "removing inactive renderer");
        lock(&registry).remove(&key);
    }
}
