use crate::responder::{InteractionData, InteractionRef};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Submitted modal fields keyed by text input custom id.
pub type ModalForm = BTreeMap<String, String>;

pub type ButtonHandler = Arc<dyn Fn(&InteractionRef) + Send + Sync>;
pub type SelectHandler = Arc<dyn Fn(&[String], &InteractionRef) + Send + Sync>;
pub type SubmitHandler = Arc<dyn Fn(&ModalForm, &InteractionRef) + Send + Sync>;

pub const DEFAULT_PREFIX: &str = "ui:auto";

/// Produces the random part of minted custom ids and attachment names.
pub trait IdSource: Send + Sync {
    fn next_id(&self) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdSource for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic ids for reproducible payloads.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdSource for SequentialIds {
    fn next_id(&self) -> String {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{id:08}")
    }
}

pub fn custom_id(prefix: &str, suffix: &str) -> String {
    format!("{prefix}:{suffix}")
}

/// True when `custom_id` was minted under `prefix`.
pub fn has_prefix(custom_id: &str, prefix: &str) -> bool {
    custom_id
        .strip_prefix(prefix)
        .is_some_and(|rest| rest.starts_with(':'))
}

/// Callbacks registered while compiling one payload.
#[derive(Clone, Default)]
pub struct DispatchTable {
    buttons: HashMap<String, ButtonHandler>,
    selects: HashMap<String, SelectHandler>,
    modal_submits: HashMap<String, SubmitHandler>,
}

impl fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("buttons", &self.buttons.keys().collect::<Vec<_>>())
            .field("selects", &self.selects.keys().collect::<Vec<_>>())
            .field("modal_submits", &self.modal_submits.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl DispatchTable {
    pub fn insert_button(&mut self, custom_id: impl Into<String>, handler: ButtonHandler) {
        self.buttons.insert(custom_id.into(), handler);
    }

    pub fn insert_select(&mut self, custom_id: impl Into<String>, handler: SelectHandler) {
        self.selects.insert(custom_id.into(), handler);
    }

    pub fn insert_modal_submit(&mut self, custom_id: impl Into<String>, handler: SubmitHandler) {
        self.modal_submits.insert(custom_id.into(), handler);
    }

    pub fn button(&self, custom_id: &str) -> Option<&ButtonHandler> {
        self.buttons.get(custom_id)
    }

    pub fn select(&self, custom_id: &str) -> Option<&SelectHandler> {
        self.selects.get(custom_id)
    }

    pub fn modal_submit(&self, custom_id: &str) -> Option<&SubmitHandler> {
        self.modal_submits.get(custom_id)
    }

    pub fn button_ids(&self) -> impl Iterator<Item = &str> {
        self.buttons.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.buttons.len() + self.selects.len() + self.modal_submits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invokes the handler registered for the interaction's custom id.
    /// Returns false when no handler matched.
    pub fn route(&self, interaction: &InteractionRef) -> bool {
        match interaction.data() {
            InteractionData::Command { .. } => false,
            InteractionData::Button { custom_id } => match self.button(custom_id) {
                Some(handler) => {
                    handler(interaction);
                    true
                }
                None => false,
            },
            InteractionData::Select {
                custom_id, values, ..
            } => match self.select(custom_id) {
                Some(handler) => {
                    handler(values.as_slice(), interaction);
                    true
                }
                None => false,
            },
            InteractionData::ModalSubmit {
                custom_id, fields, ..
            } => match self.modal_submit(custom_id) {
                Some(handler) => {
                    handler(fields, interaction);
                    true
                }
                None => false,
            },
        }
    }
}
