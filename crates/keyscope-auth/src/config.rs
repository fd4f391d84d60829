//! Authentication configuration.

use serde::Deserialize;

/// Default scheme keyword expected in the `Authorization` header.
pub const DEFAULT_KEYWORD: &str = "Api-Key";

/// Configuration for API key authentication.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Scheme keyword preceding the key in the `Authorization` header
    /// (default: `Api-Key`). Matched case-insensitively.
    pub keyword: String,
    /// Record `last_used_at` on successful authentication (default: off;
    /// every tracked request is a write).
    pub track_last_used: bool,
    /// Minimum seconds between two `last_used_at` writes for one key
    /// (default: 60).
    pub last_used_interval_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            keyword: DEFAULT_KEYWORD.into(),
            track_last_used: false,
            last_used_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.keyword, "Api-Key");
        assert!(!config.track_last_used);
        assert_eq!(config.last_used_interval_secs, 60);
    }
}
