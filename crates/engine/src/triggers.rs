//! Glue options carried in the advertiser configuration, and mini-trigger
//! wiring that forwards trigger activations to [`ExitHooks::run`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use lander_core::types::exit_names;

use crate::engine::ExitHooks;
use crate::normalizer::scalar_text;

/// How page-level clicks are treated by the click map.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClickMapMode {
    Player,
    Reels,
    #[default]
    Off,
}

impl ClickMapMode {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "player" => Self::Player,
            "reels" => Self::Reels,
            _ => Self::Off,
        }
    }

    /// Exit a page-level click runs, if the click map is active.
    pub fn exit_for_click(self) -> Option<&'static str> {
        match self {
            Self::Player | Self::Reels => Some(exit_names::TAB_UNDER_CLICK),
            Self::Off => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GlueOptions {
    pub click_map_mode: ClickMapMode,
    pub disable_mini_triggers: bool,
}

impl GlueOptions {
    pub fn from_config(config: &Value) -> Self {
        let text = |key: &str| config.get(key).and_then(scalar_text);
        Self {
            click_map_mode: text("clickMapMode")
                .map(|s| ClickMapMode::parse(&s))
                .unwrap_or_default(),
            disable_mini_triggers: text("disableMiniTriggers")
                .is_some_and(|s| matches!(s.to_ascii_lowercase().as_str(), "true" | "1")),
        }
    }
}

/// Binds trigger identifiers (buttons, overlay hotspots) to exit names.
#[derive(Debug, Default)]
pub struct MiniTriggers {
    bindings: BTreeMap<String, String>,
    options: GlueOptions,
}

impl MiniTriggers {
    pub fn new(options: GlueOptions) -> Self {
        Self {
            bindings: BTreeMap::new(),
            options,
        }
    }

    pub fn bind(&mut self, trigger: impl Into<String>, exit: impl Into<String>) {
        self.bindings.insert(trigger.into(), exit.into());
    }

    pub fn binding(&self, trigger: &str) -> Option<&str> {
        self.bindings.get(trigger).map(String::as_str)
    }

    /// Forward a trigger activation. Returns the exit that was run.
    pub fn activate<H: ExitHooks>(&self, trigger: &str, hooks: &mut H) -> Option<String> {
        if self.options.disable_mini_triggers {
            debug!(trigger, "mini-triggers disabled");
            return None;
        }
        let exit = self.binding(trigger)?;
        hooks.run(exit);
        Some(exit.to_string())
    }

    /// Forward a page-level click through the click map.
    pub fn page_click<H: ExitHooks>(&self, hooks: &mut H) -> Option<&'static str> {
        let exit = self.options.click_map_mode.exit_for_click()?;
        hooks.run(exit);
        Some(exit)
    }
}
