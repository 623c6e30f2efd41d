//! Back-trap — seeds the session history with "wait" entries pointing at a
//! redirect page, so that pressing back reloads that page instead of leaving.

use tracing::{debug, info, warn};
use url::Url;

use lander_core::types::exit_names;
use lander_core::{attempt, EngineSettings, ExitTable, TargetRef};

use crate::environment::{HistoryMarker, PageEnvironment};

/// Redirect page for the `back` exit: the advertiser's `pageUrl`, or the
/// current directory's back page. The back target travels in its query as
/// `url`, or as `z` plus `domain`.
pub fn redirect_page_url(table: &ExitTable, page: &Url, settings: &EngineSettings) -> Option<Url> {
    let spec = table.get(exit_names::BACK)?;
    let reference = spec.current_tab.as_ref()?.reference()?;

    let mut redirect = match spec.page_url.as_deref() {
        Some(custom) => match page.join(custom) {
            Ok(url) => url,
            Err(e) => {
                warn!(page_url = custom, error = %e, "invalid back pageUrl");
                return None;
            }
        },
        None => {
            let mut derived = page.clone();
            let path = page.path();
            let dir = path
                .strip_suffix("index.html")
                .or_else(|| path.strip_suffix(settings.back_page.as_str()))
                .unwrap_or(path);
            let dir = if dir.ends_with('/') {
                dir.to_string()
            } else {
                format!("{dir}/")
            };
            derived.set_path(&format!("{dir}{}", settings.back_page));
            derived.set_query(None);
            derived
        }
    };
    redirect.set_fragment(None);

    let mut pairs: Vec<(String, String)> = redirect.query_pairs().into_owned().collect();
    for (key, value) in page.query_pairs() {
        if !pairs.iter().any(|(k, _)| *k == key) {
            pairs.push((key.into_owned(), value.into_owned()));
        }
    }
    match reference {
        TargetRef::Direct(url) => {
            pairs.retain(|(k, _)| k != "url");
            pairs.push(("url".into(), url.to_string()));
        }
        TargetRef::Zone { zone_id, domain } => {
            pairs.retain(|(k, _)| k != "z" && k != "domain");
            pairs.push(("z".into(), zone_id.to_string()));
            pairs.push(("domain".into(), domain.unwrap_or(&table.domain).to_string()));
        }
    }
    redirect.query_pairs_mut().clear().extend_pairs(&pairs);
    Some(redirect)
}

/// Trap state for one page lifetime. Never torn down once armed.
#[derive(Debug, Default)]
pub struct BackTrap {
    listener_installed: bool,
    reload_fired: bool,
    redirect_path: Option<String>,
}

impl BackTrap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self) -> bool {
        self.listener_installed
    }

    pub fn reload_fired(&self) -> bool {
        self.reload_fired
    }

    /// Push `count` wait entries then the anchor. Returns the number of wait
    /// entries pushed; zero when there is no `back` exit, history refuses, or
    /// the trap is already armed.
    pub fn arm<E: PageEnvironment>(
        &mut self,
        env: &mut E,
        table: &ExitTable,
        settings: &EngineSettings,
    ) -> u32 {
        if self.listener_installed {
            debug!("back trap already armed");
            return 0;
        }
        let original = env.location();
        let Some(redirect) = redirect_page_url(table, &original, settings) else {
            debug!("no back exit configured, trap not armed");
            return 0;
        };
        let count = table
            .get(exit_names::BACK)
            .and_then(|spec| spec.count)
            .unwrap_or(settings.back_count);

        let mut pushed = 0;
        for _ in 0..count {
            if attempt("history push", || {
                env.push_state(Some(HistoryMarker::Wait), redirect.as_str())
            })
            .is_none()
            {
                break;
            }
            pushed += 1;
        }

        let anchored = pushed == count
            && attempt("history push", || env.push_state(None, original.as_str())).is_some();
        if !anchored {
            if pushed > 0 {
                // Keep the address bar on the landing page.
                attempt("history replace", || env.replace_state(None, original.as_str()));
            }
            warn!(pushed, count, "history refused the back trap, continuing without it");
            return 0;
        }

        self.listener_installed = true;
        self.redirect_path = Some(redirect.path().to_string());
        info!(count, redirect = %redirect, "back trap armed");
        pushed
    }

    /// Handle a back/forward navigation. Forces one reload when the landed
    /// entry is a wait entry or the location is the redirect page.
    pub fn on_pop_state<E: PageEnvironment>(
        &mut self,
        env: &mut E,
        marker: Option<HistoryMarker>,
    ) -> bool {
        if !self.listener_installed {
            return false;
        }
        let tagged = marker == Some(HistoryMarker::Wait);
        let on_redirect_page = self
            .redirect_path
            .as_deref()
            .is_some_and(|path| env.location().path() == path);
        if !tagged && !on_redirect_page {
            return false;
        }
        if self.reload_fired {
            debug!("back navigation already handled");
            return false;
        }
        self.reload_fired = true;
        info!(location = %env.location(), "forcing reload of back redirect page");
        env.reload();
        true
    }
}
