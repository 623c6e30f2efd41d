//! URL builder — resolves an [`ExitTarget`] into a tracked destination,
//! either through the zone endpoint or by merging tracking fields onto an
//! advertiser URL.

use tracing::{debug, warn};
use url::form_urlencoded;
use url::Url;

use lander_core::{EngineSettings, ExitError, ExitTarget, TargetRef};

use crate::snapshot::ParameterSnapshot;

/// Builds destination URLs from the boot-time snapshot.
pub struct UrlBuilder<'a> {
    snapshot: &'a ParameterSnapshot,
    settings: &'a EngineSettings,
}

impl<'a> UrlBuilder<'a> {
    pub fn new(snapshot: &'a ParameterSnapshot, settings: &'a EngineSettings) -> Self {
        Self { snapshot, settings }
    }

    /// Ordered tracking fields; empty values are left out entirely.
    pub fn tracking_fields(&self, zone_id: Option<&str>) -> Vec<(&'static str, String)> {
        let s = self.snapshot;
        let tz = s.timezone();
        let offset = tz.offset_minutes.to_string();
        let fields: [(&'static str, &str); 21] = [
            ("ymid", s.ymid()),
            ("var", s.variant()),
            ("var_3", s.get("var_3")),
            ("b", s.get("b")),
            ("campaignid", s.get("campaignid")),
            ("click_id", s.click_id()),
            ("rhd", s.get("rhd")),
            ("os_version", s.os_version()),
            ("btz", tz.name.as_str()),
            ("bto", offset.as_str()),
            ("cmeta", s.cmeta()),
            ("pz", s.get("pz")),
            ("tb", s.get("tb")),
            ("tb_reverse", s.get("tb_reverse")),
            ("ae", s.get("ae")),
            ("ab2r", s.get("abtest")),
            ("external_id", s.get("external_id")),
            ("creative_id", s.get("creative_id")),
            ("ad_campaign_id", s.get("ad_campaign_id")),
            ("cost", s.get("cost")),
            ("zoneid", zone_id.unwrap_or("")),
        ];
        fields
            .into_iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k, v.to_string()))
            .collect()
    }

    /// Tracking fields serialized as a query string.
    pub fn tracking_query(&self, zone_id: Option<&str>) -> String {
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.tracking_fields(zone_id))
            .finish()
    }

    /// Resolve `target` against the current page. `None` means the exit has
    /// no destination and must be a no-op.
    pub fn resolve(&self, target: &ExitTarget, default_domain: &str, page: &Url) -> Option<String> {
        match target.reference()? {
            TargetRef::Direct(url) => Some(self.passthrough(url, page)),
            TargetRef::Zone { zone_id, domain } => {
                let domain = domain.unwrap_or(default_domain);
                if domain.is_empty() {
                    debug!(zone_id, "zone target has no domain");
                    return None;
                }
                Some(self.zone_url(zone_id, domain))
            }
        }
    }

    /// `https://<domain>/<zone_path>?<tracking query with zoneid>`.
    pub fn zone_url(&self, zone_id: &str, domain: &str) -> String {
        format!(
            "{}/{}?{}",
            normalize_domain(domain),
            self.settings.zone_path,
            self.tracking_query(Some(zone_id))
        )
    }

    /// Merge page query parameters and forced tracking fields onto an
    /// advertiser URL. Unparseable URLs come back unchanged.
    pub fn passthrough(&self, raw: &str, page: &Url) -> String {
        let mut target = match page.join(raw) {
            Ok(url) => url,
            Err(e) => {
                let err = ExitError::MalformedUrl {
                    url: raw.to_string(),
                    reason: e.to_string(),
                };
                warn!(error = %err, "passing advertiser URL through unmodified");
                return raw.to_string();
            }
        };

        let mut pairs: Vec<(String, String)> = target.query_pairs().into_owned().collect();
        for (key, value) in page.query_pairs() {
            if !pairs.iter().any(|(k, _)| *k == key) {
                pairs.push((key.into_owned(), value.into_owned()));
            }
        }

        let s = self.snapshot;
        let cost = s.first_of(&["cost", "b"]);
        if !cost.is_empty() {
            force(&mut pairs, "cost", cost);
        }
        if !pairs.iter().any(|(k, _)| k == "currency") {
            pairs.push(("currency".into(), self.settings.default_currency.clone()));
        }
        for (key, value) in [
            ("external_id", s.get("external_id")),
            ("creative_id", s.get("creative_id")),
            ("ad_campaign_id", s.first_of(&["ad_campaign_id", "var_2"])),
        ] {
            if !value.is_empty() {
                force(&mut pairs, key, value);
            }
        }

        target.query_pairs_mut().clear().extend_pairs(&pairs);
        target.to_string()
    }
}

fn force(pairs: &mut Vec<(String, String)>, key: &str, value: &str) {
    pairs.retain(|(k, _)| k != key);
    pairs.push((key.to_string(), value.to_string()));
}

/// Prefix a scheme when missing and strip trailing slashes.
pub fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim();
    let with_scheme = if domain.contains("://") {
        domain.to_string()
    } else if let Some(rest) = domain.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        format!("https://{domain}")
    };
    with_scheme.trim_end_matches('/').to_string()
}
