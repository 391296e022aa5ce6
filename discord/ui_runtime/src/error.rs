use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("payload builder already produced a payload")]
    BuilderReused,

    #[error("unknown node kind `{0}`")]
    UnknownKind(String),

    #[error("expected a `{expected}` root, found `{found}`")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },

    #[error("`{kind}` requires the `{prop}` prop")]
    MissingProp { kind: String, prop: &'static str },

    #[error("`{kind}` has invalid `{prop}`: {value}")]
    InvalidProp {
        kind: String,
        prop: &'static str,
        value: String,
    },

    #[error("`{kind}` requires at least one `{child}` child")]
    MissingChildren { kind: String, child: &'static str },
}

#[derive(Debug, Error)]
pub enum AttachmentError {
    #[error("failed to read attachment {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch attachment {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A failure reported by the chat platform client.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("unknown interaction")]
    UnknownInteraction,

    #[error("invalid webhook token")]
    InvalidToken,

    #[error("platform api error {code}: {message}")]
    Api { code: u32, message: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl PlatformError {
    pub const UNKNOWN_INTERACTION: u32 = 10062;
    pub const INVALID_WEBHOOK_TOKEN: u32 = 50027;

    /// Maps a raw api error code onto the typed variants.
    pub fn from_code(code: u32, message: impl Into<String>) -> Self {
        match code {
            Self::UNKNOWN_INTERACTION => Self::UnknownInteraction,
            Self::INVALID_WEBHOOK_TOKEN => Self::InvalidToken,
            _ => Self::Api {
                code,
                message: message.into(),
            },
        }
    }

    /// True when the interaction token can no longer be used to respond.
    pub fn is_token_expired(&self) -> bool {
        matches!(self, Self::UnknownInteraction | Self::InvalidToken)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("render failed: {0}")]
    Render(String),

    #[error("message updater task is no longer running")]
    UpdaterClosed,
}

impl Error {
    pub fn is_token_expired(&self) -> bool {
        matches!(self, Self::Platform(err) if err.is_token_expired())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_expiry_codes_are_explicit() {
        assert!(PlatformError::from_code(10062, "Unknown interaction").is_token_expired());
        assert!(PlatformError::from_code(50027, "Invalid Webhook Token").is_token_expired());
        assert!(!PlatformError::from_code(50035, "Invalid Form Body").is_token_expired());
        assert!(!PlatformError::Transport("reset".to_string()).is_token_expired());
    }

    #[test]
    fn umbrella_error_keeps_token_classification() {
        let err = Error::from(PlatformError::InvalidToken);
        assert!(err.is_token_expired());
        assert!(!Error::Render("boom".to_string()).is_token_expired());
    }
}
