//! Exit planning — decides which URLs a named exit drives. Execution
//! (tracking, tab opening, trap arming, deferred navigation) lives in
//! [`crate::engine`].

use tracing::debug;
use url::Url;

use lander_core::types::exit_names;
use lander_core::{ExitSpec, ExitTable, Tab};

use crate::url_builder::UrlBuilder;

/// One resolved tab of an exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTab {
    pub tab: Tab,
    pub url: String,
    pub zone_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitMode {
    SingleTab,
    DualTab,
}

/// Everything needed to execute an exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExitPlan {
    /// Exit the plan was resolved from, after aliasing.
    pub name: String,
    pub mode: ExitMode,
    pub current_tab: Option<ResolvedTab>,
    pub new_tab: Option<ResolvedTab>,
}

impl ExitPlan {
    pub fn is_empty(&self) -> bool {
        self.current_tab.is_none() && self.new_tab.is_none()
    }

    /// Resolved tabs in emission order.
    pub fn tabs(&self) -> impl Iterator<Item = &ResolvedTab> {
        self.current_tab.iter().chain(self.new_tab.iter())
    }
}

/// Spec for `name`. `tabUnderClick` without its own entry falls back to
/// `mainExit`.
pub fn lookup<'t>(table: &'t ExitTable, name: &str) -> Option<(&'t str, &'t ExitSpec)> {
    if let Some((key, spec)) = table.exits.get_key_value(name) {
        return Some((key.as_str(), spec));
    }
    if name == exit_names::TAB_UNDER_CLICK {
        return table
            .exits
            .get_key_value(exit_names::MAIN_EXIT)
            .map(|(key, spec)| (key.as_str(), spec));
    }
    None
}

/// Resolve a named exit. `None` when the name is empty or unknown, or when
/// nothing resolves.
pub fn plan_exit(
    table: &ExitTable,
    name: &str,
    builder: &UrlBuilder<'_>,
    page: &Url,
) -> Option<ExitPlan> {
    if name.is_empty() {
        return None;
    }
    let Some((resolved_name, spec)) = lookup(table, name) else {
        debug!(exit = name, "exit not configured");
        return None;
    };

    let resolve = |tab: Tab| {
        let target = spec.target(tab)?;
        let url = builder.resolve(target, &table.domain, page)?;
        Some(ResolvedTab {
            tab,
            url,
            zone_id: target.zone_id().map(str::to_string),
        })
    };

    let mode = if spec.new_tab.is_some() {
        ExitMode::DualTab
    } else {
        ExitMode::SingleTab
    };
    let plan = ExitPlan {
        name: resolved_name.to_string(),
        mode,
        current_tab: resolve(Tab::CurrentTab),
        new_tab: match mode {
            ExitMode::DualTab => resolve(Tab::NewTab),
            ExitMode::SingleTab => None,
        },
    };

    if plan.is_empty() {
        debug!(exit = name, "exit has no resolvable destination");
        return None;
    }
    Some(plan)
}
