//! In-memory page environment — a session-history stack with a cursor, a
//! virtual clock, and records of every side effect. Used by tests and by the
//! `lander simulate` command.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use url::Url;

use lander_core::{ExitError, ExitResult};

use crate::environment::{
    HistoryMarker, PageEnvironment, PageEvent, PageMetadata, TimerId, TimezoneInfo,
};

/// One session-history entry.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HistoryEntry {
    pub url: String,
    pub marker: Option<HistoryMarker>,
}

#[derive(Debug, Clone)]
pub struct MemoryEnvironment {
    location: Url,
    entries: Vec<HistoryEntry>,
    cursor: usize,
    visible: bool,
    clock: Duration,
    timers: BTreeMap<TimerId, Duration>,
    next_timer: u64,
    timezone: TimezoneInfo,
    metadata: PageMetadata,
    fail_history: bool,
    block_tabs: bool,
    os_probe_requested: bool,
    navigations: Vec<String>,
    reloads: Vec<String>,
    opened_tabs: Vec<String>,
    placeholders: Vec<String>,
}

impl MemoryEnvironment {
    /// A visible page at `location` with a single history entry.
    pub fn new(location: Url) -> Self {
        Self {
            entries: vec![HistoryEntry {
                url: location.to_string(),
                marker: None,
            }],
            location,
            cursor: 0,
            visible: true,
            clock: Duration::ZERO,
            timers: BTreeMap::new(),
            next_timer: 1,
            timezone: TimezoneInfo {
                name: "UTC".into(),
                offset_minutes: 0,
            },
            metadata: PageMetadata::default(),
            fail_history: false,
            block_tabs: false,
            os_probe_requested: false,
            navigations: Vec::new(),
            reloads: Vec::new(),
            opened_tabs: Vec::new(),
            placeholders: Vec::new(),
        }
    }

    /// Insert a page visited before this one, so back-navigation can leave.
    pub fn with_prior_page(mut self, url: &str) -> Self {
        self.entries.insert(
            0,
            HistoryEntry {
                url: url.to_string(),
                marker: None,
            },
        );
        self.cursor += 1;
        self
    }

    pub fn with_timezone(mut self, name: &str, offset_minutes: i32) -> Self {
        self.timezone = TimezoneInfo {
            name: name.to_string(),
            offset_minutes,
        };
        self
    }

    pub fn with_metadata(mut self, metadata: PageMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Make every history push/replace fail.
    pub fn with_failing_history(mut self) -> Self {
        self.fail_history = true;
        self
    }

    /// Make every tab open fail, as a popup blocker would.
    pub fn with_blocked_tabs(mut self) -> Self {
        self.block_tabs = true;
        self
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Step back one entry. `None` when the page would leave the session.
    pub fn back(&mut self) -> Option<PageEvent> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.land())
    }

    pub fn forward(&mut self) -> Option<PageEvent> {
        if self.cursor + 1 >= self.entries.len() {
            return None;
        }
        self.cursor += 1;
        Some(self.land())
    }

    fn land(&mut self) -> PageEvent {
        let entry = &self.entries[self.cursor];
        if let Ok(url) = self.location.join(&entry.url) {
            self.location = url;
        }
        PageEvent::PopState {
            marker: entry.marker,
        }
    }

    /// Pop the earliest timer due at or before `until`, moving the clock to
    /// its deadline.
    pub fn next_due(&mut self, until: Duration) -> Option<TimerId> {
        let (id, due) = self
            .timers
            .iter()
            .filter(|(_, due)| **due <= until)
            .min_by_key(|(id, due)| (**due, **id))
            .map(|(id, due)| (*id, *due))?;
        self.timers.remove(&id);
        self.clock = self.clock.max(due);
        Some(id)
    }

    pub fn now(&self) -> Duration {
        self.clock
    }

    pub fn set_now(&mut self, now: Duration) {
        self.clock = self.clock.max(now);
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn navigations(&self) -> &[String] {
        &self.navigations
    }

    pub fn reloads(&self) -> &[String] {
        &self.reloads
    }

    pub fn opened_tabs(&self) -> &[String] {
        &self.opened_tabs
    }

    pub fn placeholders(&self) -> &[String] {
        &self.placeholders
    }

    pub fn os_probe_requested(&self) -> bool {
        self.os_probe_requested
    }

    fn check_history(&self) -> ExitResult<()> {
        if self.fail_history {
            return Err(ExitError::HistoryApi(
                "history state changes are disabled".into(),
            ));
        }
        Ok(())
    }
}

impl PageEnvironment for MemoryEnvironment {
    fn location(&self) -> Url {
        self.location.clone()
    }

    fn replace_location(&mut self, url: &str) {
        debug!(url, "location replaced");
        self.navigations.push(url.to_string());
        if let Ok(parsed) = self.location.join(url) {
            self.entries[self.cursor] = HistoryEntry {
                url: parsed.to_string(),
                marker: None,
            };
            self.location = parsed;
        }
    }

    fn reload(&mut self) {
        self.reloads.push(self.location.to_string());
    }

    fn push_state(&mut self, marker: Option<HistoryMarker>, url: &str) -> ExitResult<()> {
        self.check_history()?;
        let parsed = self.location.join(url).map_err(|e| ExitError::MalformedUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.entries.truncate(self.cursor + 1);
        self.entries.push(HistoryEntry {
            url: parsed.to_string(),
            marker,
        });
        self.cursor += 1;
        self.location = parsed;
        Ok(())
    }

    fn replace_state(&mut self, marker: Option<HistoryMarker>, url: &str) -> ExitResult<()> {
        self.check_history()?;
        let parsed = self.location.join(url).map_err(|e| ExitError::MalformedUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        self.entries[self.cursor] = HistoryEntry {
            url: parsed.to_string(),
            marker,
        };
        self.location = parsed;
        Ok(())
    }

    fn open_tab(&mut self, url: &str) -> ExitResult<()> {
        if self.block_tabs {
            return Err(ExitError::TabBlocked(url.to_string()));
        }
        self.opened_tabs.push(url.to_string());
        Ok(())
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        let id = TimerId(self.next_timer);
        self.next_timer += 1;
        self.timers.insert(id, self.clock + delay);
        id
    }

    fn clear_timeout(&mut self, id: TimerId) {
        self.timers.remove(&id);
    }

    fn timezone(&self) -> TimezoneInfo {
        self.timezone.clone()
    }

    fn page_metadata(&self) -> PageMetadata {
        self.metadata.clone()
    }

    fn probe_os_version(&mut self) {
        self.os_probe_requested = true;
    }

    fn render_placeholder(&mut self, message: &str) {
        self.placeholders.push(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://lp.example/offer/index.html?pz=1").unwrap()
    }

    #[test]
    fn test_push_and_back() {
        let mut env = MemoryEnvironment::new(page());
        env.push_state(Some(HistoryMarker::Wait), "back.html").unwrap();
        env.push_state(None, page().as_str()).unwrap();
        assert_eq!(env.history().len(), 3);
        assert_eq!(env.cursor(), 2);

        match env.back() {
            Some(PageEvent::PopState { marker }) => {
                assert_eq!(marker, Some(HistoryMarker::Wait))
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(env.location().path(), "/offer/back.html");
        assert!(matches!(
            env.back(),
            Some(PageEvent::PopState { marker: None })
        ));
        assert!(env.back().is_none());
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let mut env = MemoryEnvironment::new(page());
        env.push_state(None, "a.html").unwrap();
        env.push_state(None, "b.html").unwrap();
        env.back();
        env.push_state(None, "c.html").unwrap();
        let urls: Vec<_> = env.history().iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls.len(), 3);
        assert!(urls[2].ends_with("/offer/c.html"));
        assert!(env.forward().is_none());
    }

    #[test]
    fn test_timers_fire_in_deadline_order() {
        let mut env = MemoryEnvironment::new(page());
        let slow = env.set_timeout(Duration::from_secs(5));
        let fast = env.set_timeout(Duration::from_millis(100));
        let cleared = env.set_timeout(Duration::from_millis(50));
        env.clear_timeout(cleared);

        let until = Duration::from_secs(10);
        assert_eq!(env.next_due(until), Some(fast));
        assert_eq!(env.now(), Duration::from_millis(100));
        assert_eq!(env.next_due(until), Some(slow));
        assert_eq!(env.next_due(until), None);
    }

    #[test]
    fn test_failing_history_and_blocked_tabs() {
        let mut env = MemoryEnvironment::new(page())
            .with_failing_history()
            .with_blocked_tabs();
        assert!(env.push_state(None, "x.html").is_err());
        assert!(env.open_tab("https://x.example").is_err());
        assert_eq!(env.history().len(), 1);
        assert!(env.opened_tabs().is_empty());
    }

    #[test]
    fn test_prior_page() {
        let mut env = MemoryEnvironment::new(page()).with_prior_page("https://news.example/");
        assert_eq!(env.cursor(), 1);
        env.back();
        assert_eq!(env.location().host_str(), Some("news.example"));
    }
}
