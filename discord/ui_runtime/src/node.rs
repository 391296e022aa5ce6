use crate::attachments::MediaSource;
use crate::dispatch::{ButtonHandler, ModalForm, SelectHandler, SubmitHandler};
use crate::error::CompileError;
use crate::payload::emoji::EmojiSource;
use crate::responder::InteractionRef;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

macro_rules! node_kinds {
    ($($variant:ident => $tag:literal),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NodeKind {
            $($variant),+
        }

        impl NodeKind {
            pub fn as_tag(self) -> &'static str {
                match self {
                    $(Self::$variant => $tag),+
                }
            }
        }

        impl FromStr for NodeKind {
            type Err = CompileError;

            fn from_str(tag: &str) -> Result<Self, Self::Err> {
                match tag {
                    $($tag => Ok(Self::$variant),)+
                    other => Err(CompileError::UnknownKind(other.to_string())),
                }
            }
        }
    };
}

node_kinds! {
    Message => "message",
    Modal => "modal",
    Container => "container",
    Row => "row",
    Section => "section",
    Accessory => "accessory",
    Button => "button",
    Select => "select",
    SelectOption => "option",
    TextInput => "text-input",
    Text => "text",
    Thumbnail => "thumbnail",
    Gallery => "gallery",
    GalleryItem => "gallery-item",
    File => "file",
    Separator => "separator",
    Underline => "u",
    Bold => "b",
    Italic => "i",
    Strike => "s",
    Code => "code",
    Pre => "pre",
    Blockquote => "blockquote",
    UnorderedList => "ul",
    OrderedList => "ol",
    ListItem => "li",
    Heading1 => "h1",
    Heading2 => "h2",
    Heading3 => "h3",
    Subtext => "subtext",
    Spoiler => "spoiler",
    Link => "a",
    LineBreak => "br",
    Emoji => "emoji",
    Timestamp => "timestamp",
    Mention => "mention",
    Literal => "#text",
}

impl NodeKind {
    /// Kinds that compile to wire components rather than markup text.
    pub fn is_component(self) -> bool {
        matches!(
            self,
            Self::Message
                | Self::Modal
                | Self::Container
                | Self::Row
                | Self::Section
                | Self::Accessory
                | Self::Button
                | Self::Select
                | Self::SelectOption
                | Self::TextInput
                | Self::Text
                | Self::Thumbnail
                | Self::Gallery
                | Self::GalleryItem
                | Self::File
                | Self::Separator
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

#[derive(Clone)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
    Json(Value),
    Media(MediaSource),
    Emoji(EmojiSource),
    OnClick(ButtonHandler),
    OnSelect(SelectHandler),
    OnSubmit(SubmitHandler),
}

impl fmt::Debug for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => f.debug_tuple("Bool").field(value).finish(),
            Self::Int(value) => f.debug_tuple("Int").field(value).finish(),
            Self::Str(value) => f.debug_tuple("Str").field(value).finish(),
            Self::List(value) => f.debug_tuple("List").field(value).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Media(value) => f.debug_tuple("Media").field(value).finish(),
            Self::Emoji(value) => f.debug_tuple("Emoji").field(value).finish(),
            Self::OnClick(_) => f.write_str("OnClick(..)"),
            Self::OnSelect(_) => f.write_str("OnSelect(..)"),
            Self::OnSubmit(_) => f.write_str("OnSubmit(..)"),
        }
    }
}

impl From<bool> for PropValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for PropValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for PropValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for PropValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for PropValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<String>> for PropValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<&[&str]> for PropValue {
    fn from(value: &[&str]) -> Self {
        Self::List(value.iter().map(|item| item.to_string()).collect())
    }
}

impl From<Value> for PropValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<MediaSource> for PropValue {
    fn from(value: MediaSource) -> Self {
        Self::Media(value)
    }
}

impl From<EmojiSource> for PropValue {
    fn from(value: EmojiSource) -> Self {
        Self::Emoji(value)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Props(BTreeMap<String, PropValue>);

impl Props {
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(PropValue::Str(value)) => Some(value),
            _ => None,
        }
    }

    /// Reads a string-like prop; integers are formatted so snowflake ids can
    /// be supplied either way.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(PropValue::Str(value)) => Some(value.clone()),
            Some(PropValue::Int(value)) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key) {
            Some(PropValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    /// True only for an explicit `true`.
    pub fn flag(&self, key: &str) -> bool {
        self.get_bool(key).unwrap_or(false)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(PropValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_u32(&self, key: &str) -> Option<u32> {
        self.get_int(key).and_then(|value| u32::try_from(value).ok())
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.get(key) {
            Some(PropValue::List(values)) => Some(values),
            _ => None,
        }
    }

    pub fn get_json(&self, key: &str) -> Option<&Value> {
        match self.get(key) {
            Some(PropValue::Json(value)) => Some(value),
            _ => None,
        }
    }

    pub fn on_click(&self) -> Option<&ButtonHandler> {
        match self.get("onClick") {
            Some(PropValue::OnClick(handler)) => Some(handler),
            _ => None,
        }
    }

    pub fn on_select(&self) -> Option<&SelectHandler> {
        match self.get("onSelect") {
            Some(PropValue::OnSelect(handler)) => Some(handler),
            _ => None,
        }
    }

    pub fn on_submit(&self) -> Option<&SubmitHandler> {
        match self.get("onSubmit") {
            Some(PropValue::OnSubmit(handler)) => Some(handler),
            _ => None,
        }
    }
}

/// One node of the abstract UI tree handed over by the reconciler.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub props: Props,
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            props: Props::default(),
            children: Vec::new(),
        }
    }

    /// Builds a node from its string tag, as a reconciler host config would.
    pub fn tagged(tag: &str) -> Result<Self, CompileError> {
        Ok(Self::new(tag.parse()?))
    }

    /// A raw text leaf.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(NodeKind::Literal).prop("text", value.into())
    }

    pub fn prop(mut self, key: impl Into<String>, value: impl Into<PropValue>) -> Self {
        self.props.insert(key, value);
        self
    }

    pub fn child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn on_click<F>(self, handler: F) -> Self
    where
        F: Fn(&InteractionRef) + Send + Sync + 'static,
    {
        self.prop("onClick", PropValue::OnClick(Arc::new(handler)))
    }

    pub fn on_select<F>(self, handler: F) -> Self
    where
        F: Fn(&[String], &InteractionRef) + Send + Sync + 'static,
    {
        self.prop("onSelect", PropValue::OnSelect(Arc::new(handler)))
    }

    pub fn on_submit<F>(self, handler: F) -> Self
    where
        F: Fn(&ModalForm, &InteractionRef) + Send + Sync + 'static,
    {
        self.prop("onSubmit", PropValue::OnSubmit(Arc::new(handler)))
    }

    pub fn literal(&self) -> Option<&str> {
        match self.kind {
            NodeKind::Literal => self.props.get_str("text"),
            _ => None,
        }
    }

    pub fn first_child(&self, kind: NodeKind) -> Option<&Node> {
        self.children.iter().find(|child| child.kind == kind)
    }
}
