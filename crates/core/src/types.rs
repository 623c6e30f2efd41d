use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which browser tab an exit target drives.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    CurrentTab,
    NewTab,
}

impl Tab {
    /// Key segment used by the flat advertiser configuration.
    pub fn config_key(self) -> &'static str {
        match self {
            Tab::CurrentTab => "currentTab",
            Tab::NewTab => "newTab",
        }
    }

    pub fn from_config_key(key: &str) -> Option<Self> {
        [Tab::CurrentTab, Tab::NewTab]
            .into_iter()
            .find(|tab| tab.config_key() == key)
    }
}

/// Destination of one tab of an exit. Either a zone resolved through the
/// ad-serving endpoint, or a direct advertiser URL. When both are present the
/// URL wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExitTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// Borrowed view of what an [`ExitTarget`] actually points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRef<'a> {
    Direct(&'a str),
    Zone {
        zone_id: &'a str,
        domain: Option<&'a str>,
    },
}

impl ExitTarget {
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    pub fn zone(zone_id: impl Into<String>, domain: Option<String>) -> Self {
        Self {
            zone_id: Some(zone_id.into()),
            domain,
            ..Default::default()
        }
    }

    /// The meaningful reference, or `None` when neither field is usable.
    pub fn reference(&self) -> Option<TargetRef<'_>> {
        if let Some(url) = self.url.as_deref().filter(|u| !u.is_empty()) {
            return Some(TargetRef::Direct(url));
        }
        self.zone_id
            .as_deref()
            .filter(|z| !z.is_empty())
            .map(|zone_id| TargetRef::Zone {
                zone_id,
                domain: self.domain.as_deref().filter(|d| !d.is_empty()),
            })
    }

    /// Zone id reported to the tracking sink.
    pub fn zone_id(&self) -> Option<&str> {
        self.zone_id.as_deref().filter(|z| !z.is_empty())
    }
}

/// One named exit. `count`, `time_to_redirect` and `page_url` only matter
/// for the `back` and `autoexit` exits.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tab: Option<ExitTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_tab: Option<ExitTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_redirect: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
}

impl ExitSpec {
    pub fn target(&self, tab: Tab) -> Option<&ExitTarget> {
        match tab {
            Tab::CurrentTab => self.current_tab.as_ref(),
            Tab::NewTab => self.new_tab.as_ref(),
        }
    }

    pub fn target_mut(&mut self, tab: Tab) -> &mut ExitTarget {
        match tab {
            Tab::CurrentTab => self.current_tab.get_or_insert_with(ExitTarget::default),
            Tab::NewTab => self.new_tab.get_or_insert_with(ExitTarget::default),
        }
    }
}

/// Well-known exit names.
pub mod exit_names {
    pub const MAIN_EXIT: &str = "mainExit";
    pub const BACK: &str = "back";
    pub const REVERSE: &str = "reverse";
    pub const AUTOEXIT: &str = "autoexit";
    pub const TAB_UNDER_CLICK: &str = "tabUnderClick";
}

/// Structured exit table keyed by exit name, plus the global domain default.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExitTable {
    pub domain: String,
    pub exits: BTreeMap<String, ExitSpec>,
}

impl ExitTable {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            exits: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ExitSpec> {
        self.exits.get(name)
    }

    /// True when the named exit has a current-tab target configured.
    pub fn has_current_tab(&self, name: &str) -> bool {
        self.get(name).is_some_and(|spec| spec.current_tab.is_some())
    }
}
