use bitflags::bitflags;
use serde::{Deserialize, Serialize, Serializer};

pub const MAX_ROW_BUTTONS: usize = 5;

bitflags! {
    /// Message-level flag bitset as the platform encodes it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MessageFlags: u32 {
        const SUPPRESS_EMBEDS = 1 << 2;
        const EPHEMERAL = 1 << 6;
        const SUPPRESS_NOTIFICATIONS = 1 << 12;
        const IS_COMPONENTS_V2 = 1 << 15;
    }
}

impl MessageFlags {
    /// Flags honored by an initial interaction reply.
    pub const REPLY: Self = Self::from_bits_retain(
        Self::EPHEMERAL.bits()
            | Self::SUPPRESS_EMBEDS.bits()
            | Self::SUPPRESS_NOTIFICATIONS.bits()
            | Self::IS_COMPONENTS_V2.bits(),
    );

    /// Flags honored when editing or updating an existing message.
    pub const EDIT: Self =
        Self::from_bits_retain(Self::SUPPRESS_EMBEDS.bits() | Self::IS_COMPONENTS_V2.bits());

    /// Flags honored when sending a fresh message to a channel or user.
    pub const SEND: Self = Self::from_bits_retain(
        Self::SUPPRESS_EMBEDS.bits()
            | Self::SUPPRESS_NOTIFICATIONS.bits()
            | Self::IS_COMPONENTS_V2.bits(),
    );

    pub fn is_v2(self) -> bool {
        self.contains(Self::IS_COMPONENTS_V2)
    }
}

impl Serialize for MessageFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ComponentType {
    ActionRow = 1,
    Button = 2,
    StringSelect = 3,
    TextInput = 4,
    UserSelect = 5,
    RoleSelect = 6,
    MentionableSelect = 7,
    ChannelSelect = 8,
    Section = 9,
    TextDisplay = 10,
    Thumbnail = 11,
    MediaGallery = 12,
    File = 13,
    Separator = 14,
    Container = 17,
}

impl Serialize for ComponentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectKind {
    String,
    User,
    Role,
    Mentionable,
    Channel,
}

impl SelectKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "string" => Some(Self::String),
            "user" => Some(Self::User),
            "role" => Some(Self::Role),
            "mentionable" => Some(Self::Mentionable),
            "channel" => Some(Self::Channel),
            _ => None,
        }
    }

    pub fn as_tag(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::User => "user",
            Self::Role => "role",
            Self::Mentionable => "mentionable",
            Self::Channel => "channel",
        }
    }

    pub fn component_type(self) -> ComponentType {
        match self {
            Self::String => ComponentType::StringSelect,
            Self::User => ComponentType::UserSelect,
            Self::Role => ComponentType::RoleSelect,
            Self::Mentionable => ComponentType::MentionableSelect,
            Self::Channel => ComponentType::ChannelSelect,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ButtonStyle {
    Primary = 1,
    Secondary = 2,
    Success = 3,
    Danger = 4,
    Link = 5,
    Premium = 6,
}

impl ButtonStyle {
    /// Maps the four dispatchable styles; link and premium are chosen by the
    /// presence of a url or sku instead.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "primary" => Some(Self::Primary),
            "secondary" => Some(Self::Secondary),
            "success" => Some(Self::Success),
            "danger" => Some(Self::Danger),
            _ => None,
        }
    }
}

impl Serialize for ButtonStyle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Emoji {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
}

/// A media reference as the platform expects it: either a public url or an
/// `attachment://<filename>` pointer into the files sent alongside the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnfurledMedia {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

impl UnfurledMedia {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn attachment(filename: &str) -> Self {
        Self::url(format!("attachment://{filename}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Component {
    ActionRow(ActionRow),
    Button(Button),
    Select(SelectMenu),
    TextInput(TextInput),
    Section(Section),
    TextDisplay(TextDisplay),
    Thumbnail(Thumbnail),
    MediaGallery(MediaGallery),
    File(FileComponent),
    Separator(Separator),
    Container(Container),
}

impl Component {
    pub fn component_type(&self) -> ComponentType {
        match self {
            Self::ActionRow(_) => ComponentType::ActionRow,
            Self::Button(_) => ComponentType::Button,
            Self::Select(select) => select.kind,
            Self::TextInput(_) => ComponentType::TextInput,
            Self::Section(_) => ComponentType::Section,
            Self::TextDisplay(_) => ComponentType::TextDisplay,
            Self::Thumbnail(_) => ComponentType::Thumbnail,
            Self::MediaGallery(_) => ComponentType::MediaGallery,
            Self::File(_) => ComponentType::File,
            Self::Separator(_) => ComponentType::Separator,
            Self::Container(_) => ComponentType::Container,
        }
    }

    /// Components that may only appear inside an action row.
    pub fn is_row_item(&self) -> bool {
        matches!(self, Self::Button(_) | Self::Select(_) | Self::TextInput(_))
    }

    pub fn action_row(components: Vec<Component>) -> Self {
        Self::ActionRow(ActionRow {
            kind: ComponentType::ActionRow,
            components,
        })
    }

    pub fn text_display(content: impl Into<String>) -> Self {
        Self::TextDisplay(TextDisplay {
            kind: ComponentType::TextDisplay,
            content: content.into(),
        })
    }

    pub fn container(components: Vec<Component>, accent_color: Option<u32>) -> Self {
        Self::Container(Container {
            kind: ComponentType::Container,
            components,
            accent_color,
            spoiler: None,
        })
    }

    /// Returns a copy with every button and select forced to `disabled`,
    /// walking rows, containers and section accessories.
    pub fn disabled(&self) -> Self {
        match self {
            Self::Button(button) => Self::Button(Button {
                disabled: Some(true),
                ..button.clone()
            }),
            Self::Select(select) => Self::Select(SelectMenu {
                disabled: Some(true),
                ..select.clone()
            }),
            Self::ActionRow(row) => Self::ActionRow(ActionRow {
                kind: row.kind,
                components: disable_all(&row.components),
            }),
            Self::Container(container) => Self::Container(Container {
                components: disable_all(&container.components),
                ..container.clone()
            }),
            Self::Section(section) => Self::Section(Section {
                kind: section.kind,
                components: section.components.clone(),
                accessory: Box::new(section.accessory.disabled()),
            }),
            other => other.clone(),
        }
    }
}

fn disable_all(components: &[Component]) -> Vec<Component> {
    components.iter().map(Component::disabled).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRow {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Button {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub style: ButtonStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Emoji>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emoji: Option<Emoji>,
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectDefaultValue {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectMenu {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub custom_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_values: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_values: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<SelectOption>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_values: Option<Vec<SelectDefaultValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_types: Option<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextInput {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub custom_id: String,
    /// 1 for a single line, 2 for a paragraph.
    pub style: u8,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub components: Vec<Component>,
    pub accessory: Box<Component>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextDisplay {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Thumbnail {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub media: UnfurledMedia,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaGalleryItem {
    pub media: UnfurledMedia,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaGallery {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub items: Vec<MediaGalleryItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileComponent {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub file: UnfurledMedia,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Separator {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub divider: Option<bool>,
    pub spacing: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Container {
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub components: Vec<Component>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent_color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spoiler: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub components: Vec<Component>,
}

impl MessageBody {
    pub fn with_components_disabled(&self) -> Self {
        Self {
            content: self.content.clone(),
            components: disable_all(&self.components),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModalBody {
    pub title: String,
    pub custom_id: String,
    pub components: Vec<Component>,
}
