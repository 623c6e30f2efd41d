//! Config normalizer — turns the flat advertiser configuration into an
//! [`ExitTable`].
//!
//! Key patterns, first match wins:
//! 1. `<name>_<currentTab|newTab>_<zoneId|url>`
//! 2. `<name>_<count|timeToRedirect|pageUrl>`
//! 3. `<name>_<zoneId|url>` (tab: `newTab` for `tabUnderClick`, else `currentTab`)

use serde_json::Value;
use tracing::{debug, warn};

use lander_core::types::exit_names;
use lander_core::{ExitError, ExitResult, ExitSpec, ExitTable, Tab};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetField {
    ZoneId,
    Url,
}

impl TargetField {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "zoneId" => Some(Self::ZoneId),
            "url" => Some(Self::Url),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlatField {
    Count,
    TimeToRedirect,
    PageUrl,
}

impl FlatField {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "count" => Some(Self::Count),
            "timeToRedirect" => Some(Self::TimeToRedirect),
            "pageUrl" => Some(Self::PageUrl),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum KeyPattern<'a> {
    Target {
        name: &'a str,
        tab: Tab,
        field: TargetField,
    },
    Flat {
        name: &'a str,
        field: FlatField,
    },
}

fn classify(key: &str) -> Option<KeyPattern<'_>> {
    let (rest, last) = key.rsplit_once('_')?;
    if rest.is_empty() {
        return None;
    }

    if let Some(field) = TargetField::parse(last) {
        if let Some((name, tab)) = rest.rsplit_once('_') {
            if let Some(tab) = Tab::from_config_key(tab).filter(|_| !name.is_empty()) {
                return Some(KeyPattern::Target { name, tab, field });
            }
        }
    }

    if let Some(field) = FlatField::parse(last) {
        return Some(KeyPattern::Flat { name: rest, field });
    }

    TargetField::parse(last).map(|field| KeyPattern::Target {
        name: rest,
        tab: default_tab(rest),
        field,
    })
}

fn default_tab(name: &str) -> Tab {
    if name == exit_names::TAB_UNDER_CLICK {
        Tab::NewTab
    } else {
        Tab::CurrentTab
    }
}

/// Scalar configuration value as text; `None` for empty or non-scalar values.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn parse_whole<T: TryFrom<u64>>(text: &str) -> Option<T> {
    let whole = match text.parse::<u64>() {
        Ok(n) => n,
        Err(_) => {
            let f = text.parse::<f64>().ok().filter(|f| f.is_finite() && *f >= 0.0)?;
            f as u64
        }
    };
    T::try_from(whole).ok()
}

/// Normalize a flat configuration object. Fails with
/// [`ExitError::MissingConfiguration`] when the object or its `domain` is absent.
pub fn normalize(config: &Value) -> ExitResult<ExitTable> {
    let map = config
        .as_object()
        .ok_or_else(|| ExitError::MissingConfiguration("configuration is not an object".into()))?;

    let domain = map
        .get("domain")
        .and_then(scalar_text)
        .ok_or_else(|| ExitError::MissingConfiguration("'domain' is required".into()))?;

    let mut table = ExitTable::new(domain);

    for (key, value) in map {
        if key == "domain" {
            continue;
        }
        let Some(text) = scalar_text(value) else {
            continue;
        };
        let Some(pattern) = classify(key) else {
            continue;
        };

        match pattern {
            KeyPattern::Target { name, tab, field } => {
                let target = table
                    .exits
                    .entry(name.to_string())
                    .or_default()
                    .target_mut(tab);
                match field {
                    TargetField::Url => target.url = Some(text),
                    TargetField::ZoneId => {
                        target.zone_id = Some(text);
                        if target.domain.is_none() {
                            target.domain = Some(table.domain.clone());
                        }
                    }
                }
            }
            KeyPattern::Flat { name, field } => {
                let spec: &mut ExitSpec = table.exits.entry(name.to_string()).or_default();
                match field {
                    FlatField::PageUrl => spec.page_url = Some(text),
                    FlatField::Count => match parse_whole(&text) {
                        Some(n) => spec.count = Some(n),
                        None => warn!(key = %key, value = %text, "ignoring non-numeric count"),
                    },
                    FlatField::TimeToRedirect => match parse_whole(&text) {
                        Some(n) => spec.time_to_redirect = Some(n),
                        None => {
                            warn!(key = %key, value = %text, "ignoring non-numeric timeToRedirect")
                        }
                    },
                }
            }
        }
    }

    debug!(
        domain = %table.domain,
        exits = table.exits.len(),
        "exit configuration normalized"
    );
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lander_core::ExitTarget;
    use serde_json::json;

    #[test]
    fn test_classify_priority() {
        assert_eq!(
            classify("mainExit_newTab_zoneId"),
            Some(KeyPattern::Target {
                name: "mainExit",
                tab: Tab::NewTab,
                field: TargetField::ZoneId
            })
        );
        assert_eq!(
            classify("back_count"),
            Some(KeyPattern::Flat {
                name: "back",
                field: FlatField::Count
            })
        );
        assert_eq!(
            classify("tabUnderClick_url"),
            Some(KeyPattern::Target {
                name: "tabUnderClick",
                tab: Tab::NewTab,
                field: TargetField::Url
            })
        );
        assert_eq!(
            classify("my_exit_url"),
            Some(KeyPattern::Target {
                name: "my_exit",
                tab: Tab::CurrentTab,
                field: TargetField::Url
            })
        );
        assert_eq!(classify("clickMapMode"), None);
        assert_eq!(classify("_url"), None);
        assert_eq!(classify("mainExit_title"), None);
    }

    #[test]
    fn test_normalize_builds_table() {
        let config = json!({
            "domain": "ads.example",
            "mainExit_currentTab_zoneId": "55",
            "mainExit_newTab_url": "https://adv.example/offer",
            "back_zoneId": 77,
            "back_count": "3",
            "back_pageUrl": "/custom/back.html",
            "autoexit_timeToRedirect": 45,
            "autoexit_url": "https://adv.example/auto",
            "tabUnderClick_zoneId": "88",
            "clickMapMode": "player",
            "unknownField": "x",
            "reverse_zoneId": ""
        });

        let table = normalize(&config).unwrap();
        assert_eq!(table.domain, "ads.example");

        let main = table.get("mainExit").unwrap();
        assert_eq!(
            main.current_tab,
            Some(ExitTarget::zone("55", Some("ads.example".into())))
        );
        assert_eq!(
            main.new_tab,
            Some(ExitTarget::direct("https://adv.example/offer"))
        );

        let back = table.get("back").unwrap();
        assert_eq!(back.count, Some(3));
        assert_eq!(back.page_url.as_deref(), Some("/custom/back.html"));
        assert_eq!(
            back.current_tab.as_ref().and_then(|t| t.zone_id.as_deref()),
            Some("77")
        );

        assert_eq!(table.get("autoexit").unwrap().time_to_redirect, Some(45));

        let tab_under = table.get("tabUnderClick").unwrap();
        assert!(tab_under.current_tab.is_none());
        assert!(tab_under.new_tab.is_some());

        assert!(table.get("reverse").is_none());
        assert!(table.get("clickMapMode").is_none());
        assert_eq!(table.exits.len(), 4);
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let config = json!({
            "domain": "ads.example",
            "a_zoneId": "1",
            "b_newTab_url": "https://x.example",
            "b_currentTab_zoneId": "2",
            "c_count": 4
        });
        assert_eq!(normalize(&config).unwrap(), normalize(&config).unwrap());
    }

    #[test]
    fn test_missing_domain() {
        for config in [json!({}), json!({"domain": ""}), json!("text"), Value::Null] {
            assert!(matches!(
                normalize(&config),
                Err(ExitError::MissingConfiguration(_))
            ));
        }
    }

    #[test]
    fn test_numeric_fields_tolerate_floats_and_reject_text() {
        let config = json!({
            "domain": "ads.example",
            "back_count": "2.0",
            "autoexit_timeToRedirect": "soon"
        });
        let table = normalize(&config).unwrap();
        assert_eq!(table.get("back").unwrap().count, Some(2));
        assert_eq!(table.get("autoexit").unwrap().time_to_redirect, None);
    }
}
