use serde::Deserialize;

/// Engine tunables. Loaded from environment variables with the prefix
/// `LANDER__`; every field falls back to its default.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EngineSettings {
    /// Delay before a deferred navigation fires, so tracking beacons can leave.
    #[serde(default = "default_navigation_delay_ms")]
    pub navigation_delay_ms: u64,
    /// Wait entries pushed by the back-trap when the exit has no `count`.
    #[serde(default = "default_back_count")]
    pub back_count: u32,
    /// Autoexit timer when the exit has no `timeToRedirect`.
    #[serde(default = "default_autoexit_secs")]
    pub autoexit_secs: u64,
    #[serde(default = "default_back_page")]
    pub back_page: String,
    #[serde(default = "default_zone_path")]
    pub zone_path: String,
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

fn default_navigation_delay_ms() -> u64 {
    100
}
fn default_back_count() -> u32 {
    10
}
fn default_autoexit_secs() -> u64 {
    90
}
fn default_back_page() -> String {
    "back.html".to_string()
}
fn default_zone_path() -> String {
    "afu.php".to_string()
}
fn default_currency() -> String {
    "usd".to_string()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            navigation_delay_ms: default_navigation_delay_ms(),
            back_count: default_back_count(),
            autoexit_secs: default_autoexit_secs(),
            back_page: default_back_page(),
            zone_path: default_zone_path(),
            default_currency: default_currency(),
        }
    }
}

impl EngineSettings {
    /// Load settings from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("LANDER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Like [`EngineSettings::load`], but never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load engine settings, using defaults");
            Self::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.navigation_delay_ms, 100);
        assert_eq!(settings.back_count, 10);
        assert_eq!(settings.autoexit_secs, 90);
        assert_eq!(settings.back_page, "back.html");
        assert_eq!(settings.zone_path, "afu.php");
        assert_eq!(settings.default_currency, "usd");
    }

    #[test]
    fn test_partial_deserialize_fills_defaults() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{"back_count": 4, "zone_path": "go.php"}"#).unwrap();
        assert_eq!(settings.back_count, 4);
        assert_eq!(settings.zone_path, "go.php");
        assert_eq!(settings.autoexit_secs, 90);
    }
}
