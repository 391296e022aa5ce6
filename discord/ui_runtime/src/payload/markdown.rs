//! Folds markup nodes into the platform's markdown dialect.

use super::emoji::format_inline;
use crate::node::{Node, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Ordered,
    Unordered,
}

/// Renders a node and everything below it as markdown text.
pub fn render(node: &Node) -> String {
    fold(node, None)
}

/// Renders only the children, ignoring the node's own markup.
pub fn render_children(node: &Node) -> String {
    children(node, None)
}

/// Text content for messages without the v2 component flag: markup and
/// text displays contribute, other components are skipped.
pub fn legacy_content(nodes: &[Node]) -> String {
    nodes
        .iter()
        .filter(|child| child.kind == NodeKind::Text || !child.kind.is_component())
        .map(render)
        .collect()
}

fn children(node: &Node, list: Option<ListKind>) -> String {
    node.children.iter().map(|child| fold(child, list)).collect()
}

fn fold(node: &Node, list: Option<ListKind>) -> String {
    let props = &node.props;
    match node.kind {
        NodeKind::Literal => node.literal().unwrap_or_default().to_string(),
        NodeKind::LineBreak => "\n".to_string(),
        NodeKind::Underline => format!("__{}__", render_children(node)),
        NodeKind::Bold => format!("**{}**", render_children(node)),
        NodeKind::Italic => format!("_{}_", render_children(node)),
        NodeKind::Strike => format!("~~{}~~", render_children(node)),
        NodeKind::Code => format!("`{}`", render_children(node)),
        NodeKind::Pre => format!(
            "```{}\n{}\n```",
            props.get_str("language").unwrap_or_default(),
            render_children(node)
        ),
        NodeKind::Blockquote => format!("\n>>> {}\n", render_children(node)),
        NodeKind::Heading1 => format!("\n# {}\n", render_children(node)),
        NodeKind::Heading2 => format!("\n## {}\n", render_children(node)),
        NodeKind::Heading3 => format!("\n### {}\n", render_children(node)),
        NodeKind::Subtext => format!("\n-# {}\n", render_children(node)),
        NodeKind::Spoiler => format!("||{}||", render_children(node)),
        NodeKind::UnorderedList => render_list(node, ListKind::Unordered),
        NodeKind::OrderedList => render_list(node, ListKind::Ordered),
        NodeKind::ListItem => {
            let marker = match list {
                Some(ListKind::Ordered) => "1. ",
                Some(ListKind::Unordered) | None => "- ",
            };
            format!("{marker}{}", render_children(node))
        }
        NodeKind::Link => render_link(node),
        NodeKind::Timestamp => match props.get_string("time") {
            Some(time) => format!("<t:{time}:{}>", props.get_str("format").unwrap_or("f")),
            None => String::new(),
        },
        NodeKind::Emoji => format_inline(
            props.get_str("name"),
            props.get_string("id").as_deref(),
            props.flag("animated"),
        ),
        NodeKind::Mention => render_mention(node),
        _ => children(node, list),
    }
}

fn render_list(node: &Node, kind: ListKind) -> String {
    let items: Vec<String> = node
        .children
        .iter()
        .map(|child| fold(child, Some(kind)))
        .collect();
    format!("\n{}\n", items.join("\n"))
}

fn render_link(node: &Node) -> String {
    let href = node.props.get_str("href").unwrap_or_default();
    let text = render_children(node);
    if text.is_empty() {
        return format!("<{href}>");
    }
    match node.props.get_str("alt") {
        Some(alt) => format!("[{text}]({href} \"{alt}\")"),
        None => format!("[{text}]({href})"),
    }
}

fn render_mention(node: &Node) -> String {
    let props = &node.props;
    if let Some(id) = props.get_string("user") {
        return format!("<@{id}>");
    }
    if let Some(id) = props.get_string("member") {
        return format!("<@!{id}>");
    }
    if let Some(id) = props.get_string("channel") {
        return format!("<#{id}>");
    }
    if let Some(id) = props.get_string("role") {
        return format!("<@&{id}>");
    }
    let Some(id) = props.get_string("command") else {
        return String::new();
    };

    let mut path = vec![props.get_str("commandName").unwrap_or("_")];
    if let Some(group) = props.get_str("subcommandGroupName") {
        path.push(group);
    }
    if let Some(sub) = props.get_str("subcommandName") {
        path.push(sub);
    }
    format!("</{}:{id}>", path.join(" "))
}
