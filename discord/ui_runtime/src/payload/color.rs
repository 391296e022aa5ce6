use crate::dispatch::IdSource;
use crate::node::PropValue;

pub const YELLOW: u32 = 0xFEE75C;

const NAMED: &[(&str, u32)] = &[
    ("Default", 0x000000),
    ("White", 0xFFFFFF),
    ("Aqua", 0x1ABC9C),
    ("Green", 0x57F287),
    ("Blue", 0x3498DB),
    ("Yellow", YELLOW),
    ("Purple", 0x9B59B6),
    ("LuminousVividPink", 0xE91E63),
    ("Fuchsia", 0xEB459E),
    ("Gold", 0xF1C40F),
    ("Orange", 0xE67E22),
    ("Red", 0xED4245),
    ("Grey", 0x95A5A6),
    ("Navy", 0x34495E),
    ("DarkAqua", 0x11806A),
    ("DarkGreen", 0x1F8B4C),
    ("DarkBlue", 0x206694),
    ("DarkPurple", 0x71368A),
    ("DarkVividPink", 0xAD1457),
    ("DarkGold", 0xC27C0E),
    ("DarkOrange", 0xA84300),
    ("DarkRed", 0x992D22),
    ("DarkGrey", 0x979C9F),
    ("DarkerGrey", 0x7F8C8D),
    ("LightGrey", 0xBCC0C0),
    ("DarkNavy", 0x2C3E50),
    ("Blurple", 0x5865F2),
    ("Greyple", 0x99AAB5),
    ("DarkButNotBlack", 0x2C2F33),
    ("NotQuiteBlack", 0x23272A),
];

/// Resolves a colour prop: an integer, `#rrggbb`, or a palette name.
/// `Random` draws from `ids`, so seeded sources give repeatable colours.
pub fn resolve(value: &PropValue, ids: &dyn IdSource) -> Option<u32> {
    match value {
        PropValue::Int(value) => u32::try_from(*value).ok().filter(|value| *value <= 0xFFFFFF),
        PropValue::Str(text) => parse(text, ids),
        _ => None,
    }
}

fn parse(text: &str, ids: &dyn IdSource) -> Option<u32> {
    if let Some(hex) = text.strip_prefix('#') {
        return u32::from_str_radix(hex, 16).ok().filter(|value| *value <= 0xFFFFFF);
    }
    if text == "Random" {
        return Some(rand_color(&ids.next_id()));
    }
    NAMED
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(text))
        .map(|(_, value)| *value)
}

/// FNV-1a over the id, folded into 24 bits.
fn rand_color(seed: &str) -> u32 {
    let hash = seed
        .bytes()
        .fold(0x811C_9DC5_u32, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193));
    hash & 0xFFFFFF
}
