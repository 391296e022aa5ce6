use crate::protocol::MessageFlags;
use std::time::Duration;

const DEFAULT_DEBOUNCE_MS: u64 = 300;
// Three seconds to answer, minus a second for the round trip.
const DEFAULT_DEFER_AFTER_MS: u64 = 2_000;
const DEFAULT_TOKEN_LIFETIME_MS: u64 = 15 * 60 * 1_000;
const DEFAULT_TOKEN_MARGIN_MS: u64 = 30 * 1_000;

const DEBOUNCE_ENV: &str = "DISCORD_UI_DEBOUNCE_MS";
const DEFER_AFTER_ENV: &str = "DISCORD_UI_DEFER_AFTER_MS";
const TOKEN_LIFETIME_ENV: &str = "DISCORD_UI_TOKEN_LIFETIME_MS";
const TOKEN_MARGIN_ENV: &str = "DISCORD_UI_TOKEN_MARGIN_MS";
const INACTIVITY_ENV: &str = "DISCORD_UI_INACTIVITY_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterConfig {
    /// Quiet period before a queued payload is applied.
    pub debounce: Duration,
    /// How long an unanswered interaction waits before it is acknowledged.
    pub defer_after: Duration,
    pub token_lifetime: Duration,
    pub token_safety_margin: Duration,
    /// Disable the surface after this long without an applied update.
    pub inactivity: Option<Duration>,
    pub default_flags: MessageFlags,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            defer_after: Duration::from_millis(DEFAULT_DEFER_AFTER_MS),
            token_lifetime: Duration::from_millis(DEFAULT_TOKEN_LIFETIME_MS),
            token_safety_margin: Duration::from_millis(DEFAULT_TOKEN_MARGIN_MS),
            inactivity: None,
            default_flags: MessageFlags::IS_COMPONENTS_V2,
        }
    }
}

impl UpdaterConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let millis = |key: &str| {
            lookup(key)
                .and_then(|raw| raw.trim().parse::<u64>().ok())
                .filter(|value| *value > 0)
                .map(Duration::from_millis)
        };

        Self {
            debounce: millis(DEBOUNCE_ENV).unwrap_or(defaults.debounce),
            defer_after: millis(DEFER_AFTER_ENV).unwrap_or(defaults.defer_after),
            token_lifetime: millis(TOKEN_LIFETIME_ENV).unwrap_or(defaults.token_lifetime),
            token_safety_margin: millis(TOKEN_MARGIN_ENV).unwrap_or(defaults.token_safety_margin),
            inactivity: millis(INACTIVITY_ENV).or(defaults.inactivity),
            default_flags: defaults.default_flags,
        }
    }

    pub fn with_inactivity(mut self, inactivity: Duration) -> Self {
        self.inactivity = Some(inactivity);
        self
    }

    pub fn with_default_flags(mut self, flags: MessageFlags) -> Self {
        self.default_flags = flags;
        self
    }

    /// Time after which a fresh interaction token must be considered dead.
    pub fn token_deadline(&self) -> Duration {
        self.token_lifetime.saturating_sub(self.token_safety_margin)
    }
}

#[derive(Debug, Clone)]
pub struct RendererOptions {
    /// Scopes minted custom ids; a random one is used when absent.
    pub key: Option<String>,
    /// Whether the manager routes interactions to this renderer.
    pub interactive: bool,
    pub updater: UpdaterConfig,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            key: None,
            interactive: true,
            updater: UpdaterConfig::default(),
        }
    }
}
