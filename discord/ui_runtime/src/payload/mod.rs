pub mod color;
pub mod emoji;
pub mod markdown;

use crate::attachments::{AttachmentRegistry, AttachmentSet};
use crate::dispatch::{DEFAULT_PREFIX, DispatchTable, IdSource, UuidIds, custom_id};
use crate::error::CompileError;
use crate::node::{Node, NodeKind, PropValue, Props};
use crate::protocol::{
    Button, ButtonStyle, Component, ComponentType, Emoji, FileComponent, MAX_ROW_BUTTONS,
    MediaGallery, MediaGalleryItem, MessageBody, MessageFlags, ModalBody, Section,
    SelectDefaultValue, SelectKind, SelectMenu, SelectOption, Separator, TextInput, Thumbnail,
    UnfurledMedia,
};
use emoji::EmojiSource;
use std::slice;
use std::sync::Arc;
use tracing::debug;

const WRAPPED_ROOT_FLAGS: MessageFlags =
    MessageFlags::IS_COMPONENTS_V2.union(MessageFlags::EPHEMERAL);

/// A message body ready for the updater, with the files it references.
#[derive(Debug, Clone, Default)]
pub struct OutboundMessage {
    pub flags: MessageFlags,
    pub body: MessageBody,
    pub attachments: AttachmentSet,
}

#[derive(Debug)]
pub struct CompiledMessage {
    pub flags: MessageFlags,
    pub body: MessageBody,
    pub dispatch: DispatchTable,
    pub attachments: AttachmentSet,
}

impl CompiledMessage {
    pub fn into_parts(self) -> (OutboundMessage, DispatchTable) {
        let message = OutboundMessage {
            flags: self.flags,
            body: self.body,
            attachments: self.attachments,
        };
        (message, self.dispatch)
    }
}

#[derive(Debug)]
pub struct CompiledModal {
    pub body: ModalBody,
    pub dispatch: DispatchTable,
    pub attachments: AttachmentSet,
}

/// Translates one node tree into a wire payload. Single use: the second
/// build call fails with [`CompileError::BuilderReused`].
pub struct PayloadBuilder {
    prefix: String,
    ids: Arc<dyn IdSource>,
    used: bool,
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

impl PayloadBuilder {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_ids(prefix, Arc::new(UuidIds))
    }

    pub fn with_ids(prefix: impl Into<String>, ids: Arc<dyn IdSource>) -> Self {
        Self {
            prefix: prefix.into(),
            ids,
            used: false,
        }
    }

    fn claim(&mut self) -> Result<Compiler<'_>, CompileError> {
        if self.used {
            return Err(CompileError::BuilderReused);
        }
        self.used = true;
        Ok(Compiler {
            prefix: &self.prefix,
            ids: self.ids.as_ref(),
            dispatch: DispatchTable::default(),
            attachments: AttachmentRegistry::new(self.ids.clone()),
        })
    }

    /// Compiles a message. A root that is not `message` is treated as the
    /// only child of one carrying the v2 and ephemeral bits of
    /// `default_flags`.
    pub fn build_message(
        &mut self,
        root: &Node,
        default_flags: MessageFlags,
    ) -> Result<CompiledMessage, CompileError> {
        let mut compiler = self.claim()?;

        let (flags, children) = match root.kind {
            NodeKind::Message => (message_flags(&root.props, default_flags), &root.children[..]),
            NodeKind::Modal => {
                return Err(CompileError::UnexpectedRoot {
                    expected: "message",
                    found: root.kind.to_string(),
                });
            }
            _ => (default_flags & WRAPPED_ROOT_FLAGS, slice::from_ref(root)),
        };

        let mut components = compiler.compile_children(children)?;
        let content = if flags.is_v2() {
            None
        } else {
            components.retain(|component| matches!(component, Component::ActionRow(_)));
            Some(markdown::legacy_content(children)).filter(|content| !content.is_empty())
        };

        Ok(CompiledMessage {
            flags,
            body: MessageBody {
                content,
                components,
            },
            dispatch: compiler.dispatch,
            attachments: compiler.attachments.into_set(),
        })
    }

    pub fn build_modal(&mut self, root: &Node) -> Result<CompiledModal, CompileError> {
        let mut compiler = self.claim()?;
        if root.kind != NodeKind::Modal {
            return Err(CompileError::UnexpectedRoot {
                expected: "modal",
                found: root.kind.to_string(),
            });
        }

        let title = root
            .props
            .get_str("title")
            .ok_or_else(|| missing(root, "title"))?
            .to_string();
        let modal_id = compiler.custom_id(&root.props);
        if let Some(handler) = root.props.on_submit() {
            compiler
                .dispatch
                .insert_modal_submit(modal_id.clone(), handler.clone());
        }
        let components = compiler.compile_children(&root.children)?;

        Ok(CompiledModal {
            body: ModalBody {
                title,
                custom_id: modal_id,
                components,
            },
            dispatch: compiler.dispatch,
            attachments: compiler.attachments.into_set(),
        })
    }
}

pub fn compile(
    root: &Node,
    prefix: &str,
    default_flags: MessageFlags,
) -> Result<CompiledMessage, CompileError> {
    PayloadBuilder::new(prefix).build_message(root, default_flags)
}

pub fn compile_modal(root: &Node, prefix: &str) -> Result<CompiledModal, CompileError> {
    PayloadBuilder::new(prefix).build_modal(root)
}

fn message_flags(props: &Props, defaults: MessageFlags) -> MessageFlags {
    let mut flags = defaults;
    for (prop, flag) in [
        ("v2", MessageFlags::IS_COMPONENTS_V2),
        ("ephemeral", MessageFlags::EPHEMERAL),
        ("suppressEmbeds", MessageFlags::SUPPRESS_EMBEDS),
        ("silent", MessageFlags::SUPPRESS_NOTIFICATIONS),
    ] {
        if let Some(enabled) = props.get_bool(prop) {
            flags.set(flag, enabled);
        }
    }
    flags
}

fn missing(node: &Node, prop: &'static str) -> CompileError {
    CompileError::MissingProp {
        kind: node.kind.to_string(),
        prop,
    }
}

fn invalid(node: &Node, prop: &'static str, value: impl Into<String>) -> CompileError {
    CompileError::InvalidProp {
        kind: node.kind.to_string(),
        prop,
        value: value.into(),
    }
}

struct Compiler<'a> {
    prefix: &'a str,
    ids: &'a dyn IdSource,
    dispatch: DispatchTable,
    attachments: AttachmentRegistry,
}

impl Compiler<'_> {
    fn custom_id(&self, props: &Props) -> String {
        match props.get_str("customId") {
            Some(id) => id.to_string(),
            None => custom_id(self.prefix, &self.ids.next_id()),
        }
    }

    /// Compiles a list of siblings at message, modal or container level.
    fn compile_children(&mut self, children: &[Node]) -> Result<Vec<Component>, CompileError> {
        let mut components = Vec::new();
        for child in children {
            components.extend(self.compile_node(child)?);
        }
        Ok(pack(components))
    }

    fn compile_node(&mut self, node: &Node) -> Result<Vec<Component>, CompileError> {
        let component = match node.kind {
            NodeKind::Row => return self.row(node),
            NodeKind::Button => Some(self.button(node)?),
            NodeKind::Select => Some(self.select(node)?),
            NodeKind::TextInput => Some(self.text_input(node)?),
            NodeKind::Section => self.section(node)?,
            NodeKind::Text => Some(Component::text_display(markdown::render_children(node))),
            NodeKind::Thumbnail => self.thumbnail(node),
            NodeKind::Gallery => self.gallery(node),
            NodeKind::File => self.file(node),
            NodeKind::Separator => Some(separator(node)),
            NodeKind::Container => Some(self.container(node)?),
            _ => None,
        };
        Ok(component.into_iter().collect())
    }

    fn row(&mut self, node: &Node) -> Result<Vec<Component>, CompileError> {
        let mut items = Vec::new();
        for child in &node.children {
            for component in self.compile_node(child)? {
                match component {
                    Component::ActionRow(row) => items.extend(row.components),
                    item if item.is_row_item() => items.push(item),
                    other => debug!(
                        component = ?other.component_type(),
                        "dropping non-interactive component inside a row"
                    ),
                }
            }
        }
        Ok(pack(items))
    }

    fn button(&mut self, node: &Node) -> Result<Component, CompileError> {
        let props = &node.props;
        let sku_id = props.get_string("skuId");
        let url = props.get_str("url").map(str::to_string);

        let (style, custom_id) = if sku_id.is_some() {
            (ButtonStyle::Premium, None)
        } else if url.is_some() {
            (ButtonStyle::Link, None)
        } else {
            let style = match props.get_str("style") {
                None => ButtonStyle::Primary,
                Some(tag) => ButtonStyle::from_tag(tag).ok_or_else(|| invalid(node, "style", tag))?,
            };
            let id = self.custom_id(props);
            if let Some(handler) = props.on_click() {
                self.dispatch.insert_button(id.clone(), handler.clone());
            }
            (style, Some(id))
        };

        let label = markdown::render_children(node);
        Ok(Component::Button(Button {
            kind: ComponentType::Button,
            style,
            label: Some(label).filter(|label| !label.is_empty()),
            custom_id,
            sku_id,
            url,
            disabled: props.get_bool("disabled"),
            emoji: emoji_prop(props),
        }))
    }

    fn select(&mut self, node: &Node) -> Result<Component, CompileError> {
        let props = &node.props;
        let tag = props.get_str("type").unwrap_or("string");
        let kind = SelectKind::from_tag(tag).ok_or_else(|| invalid(node, "type", tag))?;

        let mut options = None;
        let mut default_values = None;
        let mut channel_types = None;
        let defaults = props.get_list("defaultValues").unwrap_or_default();

        match kind {
            SelectKind::String => options = Some(select_options(node, defaults)?),
            SelectKind::User | SelectKind::Role | SelectKind::Channel => {
                if props.contains("defaultValues") {
                    default_values = Some(
                        defaults
                            .iter()
                            .map(|id| SelectDefaultValue {
                                id: id.clone(),
                                kind: kind.as_tag().to_string(),
                            })
                            .collect(),
                    );
                }
                if kind == SelectKind::Channel {
                    channel_types = props
                        .get_json("channelTypes")
                        .map(|value| {
                            serde_json::from_value::<Vec<i64>>(value.clone())
                                .map_err(|err| invalid(node, "channelTypes", err.to_string()))
                        })
                        .transpose()?;
                }
            }
            SelectKind::Mentionable => {
                default_values = props
                    .get_json("defaultValues")
                    .map(|value| {
                        serde_json::from_value::<Vec<SelectDefaultValue>>(value.clone())
                            .map_err(|err| invalid(node, "defaultValues", err.to_string()))
                    })
                    .transpose()?;
            }
        }

        let custom_id = self.custom_id(props);
        if let Some(handler) = props.on_select() {
            self.dispatch.insert_select(custom_id.clone(), handler.clone());
        }

        Ok(Component::Select(SelectMenu {
            kind: kind.component_type(),
            custom_id,
            placeholder: props.get_str("placeholder").map(str::to_string),
            min_values: props.get_u32("min"),
            max_values: props.get_u32("max"),
            disabled: props.get_bool("disabled"),
            options,
            default_values,
            channel_types,
        }))
    }

    fn text_input(&mut self, node: &Node) -> Result<Component, CompileError> {
        let props = &node.props;
        let label = props
            .get_str("label")
            .ok_or_else(|| missing(node, "label"))?
            .to_string();

        Ok(Component::TextInput(TextInput {
            kind: ComponentType::TextInput,
            custom_id: self.custom_id(props),
            style: if props.flag("paragraph") { 2 } else { 1 },
            label,
            required: props.get_bool("required"),
            placeholder: props.get_str("placeholder").map(str::to_string),
            value: props.get_str("value").map(str::to_string),
            min_length: props.get_u32("min"),
            max_length: props.get_u32("max"),
        }))
    }

    fn section(&mut self, node: &Node) -> Result<Option<Component>, CompileError> {
        let Some(accessory_node) = node
            .first_child(NodeKind::Accessory)
            .and_then(|accessory| accessory.children.first())
        else {
            debug!("omitting section without an accessory");
            return Ok(None);
        };
        if !matches!(accessory_node.kind, NodeKind::Button | NodeKind::Thumbnail) {
            debug!(accessory = %accessory_node.kind, "omitting section with an unsupported accessory");
            return Ok(None);
        }

        let texts: Vec<Component> = node
            .children
            .iter()
            .filter(|child| child.kind == NodeKind::Text)
            .map(|child| Component::text_display(markdown::render_children(child)))
            .collect();
        if texts.is_empty() {
            debug!("omitting section without text");
            return Ok(None);
        }

        // A rejected button leaves no handler behind: `button` registers last.
        let accessory = match accessory_node.kind {
            NodeKind::Button => match self.button(accessory_node) {
                Ok(button) => Some(button),
                Err(err) => {
                    debug!(%err, "omitting section with an invalid button accessory");
                    return Ok(None);
                }
            },
            _ => self.thumbnail(accessory_node),
        };
        let Some(accessory) = accessory else {
            debug!("omitting section whose accessory has no media");
            return Ok(None);
        };

        Ok(Some(Component::Section(Section {
            kind: ComponentType::Section,
            components: texts,
            accessory: Box::new(accessory),
        })))
    }

    fn media(&mut self, props: &Props, key: &str) -> Option<UnfurledMedia> {
        match props.get(key)? {
            PropValue::Media(source) => Some(self.attachments.resolve_media(source)),
            PropValue::Str(url) => Some(UnfurledMedia::url(url.clone())),
            _ => None,
        }
    }

    fn thumbnail(&mut self, node: &Node) -> Option<Component> {
        let media = self.media(&node.props, "media")?;
        Some(Component::Thumbnail(Thumbnail {
            kind: ComponentType::Thumbnail,
            media,
            description: node.props.get_str("description").map(str::to_string),
            spoiler: node.props.get_bool("spoiler"),
        }))
    }

    fn gallery(&mut self, node: &Node) -> Option<Component> {
        let items: Vec<MediaGalleryItem> = node
            .children
            .iter()
            .filter(|child| child.kind == NodeKind::GalleryItem)
            .filter_map(|child| {
                let media = self.media(&child.props, "media")?;
                Some(MediaGalleryItem {
                    media,
                    description: child.props.get_str("description").map(str::to_string),
                    spoiler: child.props.get_bool("spoiler"),
                })
            })
            .collect();

        if items.is_empty() {
            debug!("omitting empty gallery");
            return None;
        }
        Some(Component::MediaGallery(MediaGallery {
            kind: ComponentType::MediaGallery,
            items,
        }))
    }

    fn file(&mut self, node: &Node) -> Option<Component> {
        let file = self.media(&node.props, "file")?;
        Some(Component::File(FileComponent {
            kind: ComponentType::File,
            file,
            spoiler: node.props.get_bool("spoiler"),
        }))
    }

    fn container(&mut self, node: &Node) -> Result<Component, CompileError> {
        let components = self.compile_children(&node.children)?;
        let accent_color = node
            .props
            .get("color")
            .and_then(|value| color::resolve(value, self.ids));
        let mut container = Component::container(components, accent_color);
        if let Component::Container(inner) = &mut container {
            inner.spoiler = node.props.get_bool("spoiler");
        }
        Ok(container)
    }
}

fn select_options(node: &Node, defaults: &[String]) -> Result<Vec<SelectOption>, CompileError> {
    let options = node
        .children
        .iter()
        .filter(|child| child.kind == NodeKind::SelectOption)
        .map(|option| -> Result<SelectOption, CompileError> {
            let props = &option.props;
            let label = match props.get_str("label") {
                Some(label) => label.to_string(),
                None => Some(markdown::render_children(option))
                    .filter(|label| !label.is_empty())
                    .ok_or_else(|| missing(option, "label"))?,
            };
            let value = props
                .get_string("value")
                .ok_or_else(|| missing(option, "value"))?;

            Ok(SelectOption {
                label,
                default: defaults.contains(&value),
                value,
                description: props.get_str("description").map(str::to_string),
                emoji: emoji_prop(props),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if options.is_empty() {
        return Err(CompileError::MissingChildren {
            kind: node.kind.to_string(),
            child: "option",
        });
    }
    Ok(options)
}

fn emoji_prop(props: &Props) -> Option<Emoji> {
    match props.get("emoji")? {
        PropValue::Emoji(source) => Some(emoji::resolve(source)),
        PropValue::Str(text) => Some(emoji::resolve(&EmojiSource::Text(text.clone()))),
        _ => None,
    }
}

fn separator(node: &Node) -> Component {
    Component::Separator(Separator {
        kind: ComponentType::Separator,
        divider: node.props.get_bool("divider"),
        spacing: match node.props.get_str("spacing") {
            Some("lg") => 2,
            _ => 1,
        },
    })
}

/// Places loose interactive components into action rows: up to five buttons
/// share a row, selects and text inputs get one each. Bare thumbnails have
/// no legal place outside a section and are dropped.
fn pack(components: Vec<Component>) -> Vec<Component> {
    let mut packed = Vec::with_capacity(components.len());
    let mut buttons = Vec::new();

    for component in components {
        match component {
            Component::Button(_) => {
                if buttons.len() == MAX_ROW_BUTTONS {
                    flush_buttons(&mut buttons, &mut packed);
                }
                buttons.push(component);
            }
            Component::Select(_) | Component::TextInput(_) => {
                flush_buttons(&mut buttons, &mut packed);
                packed.push(Component::action_row(vec![component]));
            }
            Component::Thumbnail(_) => {
                debug!("dropping thumbnail outside a section accessory");
            }
            Component::ActionRow(ref row) if row.components.is_empty() => {}
            other => {
                flush_buttons(&mut buttons, &mut packed);
                packed.push(other);
            }
        }
    }
    flush_buttons(&mut buttons, &mut packed);
    packed
}

fn flush_buttons(buttons: &mut Vec<Component>, packed: &mut Vec<Component>) {
    if !buttons.is_empty() {
        packed.push(Component::action_row(std::mem::take(buttons)));
    }
}
