use crate::protocol::Emoji;
use regex::Regex;
use std::sync::LazyLock;

static CUSTOM_EMOJI_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^<(a?):([A-Za-z0-9_]+):(\d+)>$").expect("custom emoji pattern is valid")
});

/// An emoji prop as written in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmojiSource {
    Text(String),
    Structured(Emoji),
}

impl From<&str> for EmojiSource {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EmojiSource {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Emoji> for EmojiSource {
    fn from(value: Emoji) -> Self {
        Self::Structured(value)
    }
}

/// Custom emoji token first, then a bare snowflake, then unicode.
pub fn resolve(source: &EmojiSource) -> Emoji {
    match source {
        EmojiSource::Structured(emoji) => emoji.clone(),
        EmojiSource::Text(text) => parse(text),
    }
}

fn parse(text: &str) -> Emoji {
    if let Some(captures) = CUSTOM_EMOJI_RE.captures(text) {
        return Emoji {
            id: Some(captures[3].to_string()),
            name: Some(captures[2].to_string()),
            animated: Some(&captures[1] == "a"),
        };
    }

    if is_snowflake(text) {
        return Emoji {
            id: Some(text.to_string()),
            ..Emoji::default()
        };
    }

    Emoji {
        name: Some(text.to_string()),
        ..Emoji::default()
    }
}

pub fn is_snowflake(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit())
}

/// Inline markup form: `<a:name:id>`, `<:name:id>`, or the bare name for
/// unicode emoji.
pub fn format_inline(name: Option<&str>, id: Option<&str>, animated: bool) -> String {
    let name = name.unwrap_or("_");
    match id {
        Some(id) if animated => format!("<a:{name}:{id}>"),
        Some(id) => format!("<:{name}:{id}>"),
        None => name.to_string(),
    }
}
