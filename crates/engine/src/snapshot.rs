//! Parameter snapshot — tracking-relevant query parameters and environment
//! signals, captured once when the page boots.

use std::cell::OnceCell;
use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::environment::{PageMetadata, TimezoneInfo};

/// Incoming query parameters the engine reads.
pub const INCOMING_PARAMS: &[&str] = &[
    "pz",
    "tb",
    "tb_reverse",
    "ae",
    "z",
    "var",
    "var_1",
    "var_2",
    "var_3",
    "b",
    "campaignid",
    "abtest",
    "rhd",
    "s",
    "ymid",
    "wua",
    "use_full_list_or_browsers",
    "cid",
    "geo",
    "external_id",
    "creative_id",
    "ad_campaign_id",
    "cost",
];

#[derive(Debug, Serialize)]
struct CmetaPayload<'a> {
    url: &'a str,
    title: &'a str,
    referrer: &'a str,
}

/// Immutable view of the tracking parameters. The only late-bound field is
/// the OS version, which is written at most once when the probe answers.
#[derive(Debug, Clone, Default)]
pub struct ParameterSnapshot {
    params: BTreeMap<String, String>,
    timezone: TimezoneInfo,
    cmeta: String,
    os_version: OnceCell<String>,
}

impl ParameterSnapshot {
    pub fn capture(page: &Url, timezone: TimezoneInfo, metadata: &PageMetadata) -> Self {
        let mut params = BTreeMap::new();
        for (key, value) in page.query_pairs() {
            if INCOMING_PARAMS.iter().any(|p| *p == key) && !value.is_empty() {
                // First occurrence wins, as URLSearchParams.get does.
                params
                    .entry(key.into_owned())
                    .or_insert_with(|| value.into_owned());
            }
        }

        let snapshot = Self {
            params,
            timezone,
            cmeta: encode_cmeta(page, metadata),
            os_version: OnceCell::new(),
        };
        debug!(params = snapshot.params.len(), "parameter snapshot captured");
        snapshot
    }

    /// Raw incoming value, empty when absent.
    pub fn get(&self, key: &str) -> &str {
        self.params.get(key).map(String::as_str).unwrap_or("")
    }

    /// First non-empty value among `keys`.
    pub fn first_of(&self, keys: &[&str]) -> &str {
        keys.iter()
            .map(|k| self.get(k))
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }

    pub fn click_id(&self) -> &str {
        self.get("s")
    }

    /// Primary variant, sent as `ymid`.
    pub fn ymid(&self) -> &str {
        self.first_of(&["var_1", "var"])
    }

    /// Secondary variant, sent as `var`.
    pub fn variant(&self) -> &str {
        self.first_of(&["var_2", "z"])
    }

    pub fn timezone(&self) -> &TimezoneInfo {
        &self.timezone
    }

    pub fn cmeta(&self) -> &str {
        &self.cmeta
    }

    pub fn os_version(&self) -> &str {
        self.os_version.get().map(String::as_str).unwrap_or("")
    }

    /// Record the probe answer. Returns false if a value was already set.
    pub fn resolve_os_version(&self, version: String) -> bool {
        self.os_version.set(version).is_ok()
    }
}

fn encode_cmeta(page: &Url, metadata: &PageMetadata) -> String {
    let mut bare = page.clone();
    bare.set_query(None);
    bare.set_fragment(None);
    let payload = CmetaPayload {
        url: bare.as_str(),
        title: &metadata.title,
        referrer: &metadata.referrer,
    };
    match serde_json::to_vec(&payload) {
        Ok(bytes) => STANDARD.encode(bytes),
        Err(_) => String::new(),
    }
}
