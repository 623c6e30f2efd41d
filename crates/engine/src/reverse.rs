//! Reverse exit: a one-shot catch of the first back-navigation.

use serde::Serialize;
use tracing::{info, warn};

use lander_core::attempt;

use crate::environment::{HistoryMarker, PageEnvironment};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReversePhase {
    Disarmed,
    Waiting,
    Fired,
}

#[derive(Debug)]
pub struct ReverseTrap {
    phase: ReversePhase,
}

impl Default for ReverseTrap {
    fn default() -> Self {
        Self::new()
    }
}

impl ReverseTrap {
    pub fn new() -> Self {
        Self {
            phase: ReversePhase::Disarmed,
        }
    }

    pub fn phase(&self) -> ReversePhase {
        self.phase
    }

    /// Tag the current entry and push a fresh one at the same location, so
    /// the first back-navigation lands on the tagged entry.
    pub fn arm<E: PageEnvironment>(&mut self, env: &mut E) -> bool {
        if self.phase != ReversePhase::Disarmed {
            return false;
        }
        let here = env.location();
        let tagged = attempt("history replace", || {
            env.replace_state(Some(HistoryMarker::Reverse), here.as_str())
        })
        .is_some()
            && attempt("history push", || env.push_state(None, here.as_str())).is_some();
        if !tagged {
            warn!("history refused the reverse entry, reverse exit disabled");
            return false;
        }
        self.phase = ReversePhase::Waiting;
        info!(location = %here, "reverse exit armed");
        true
    }

    /// Returns true exactly once: on the first navigation onto the tagged entry.
    pub fn on_pop_state(&mut self, marker: Option<HistoryMarker>) -> bool {
        if self.phase != ReversePhase::Waiting || marker != Some(HistoryMarker::Reverse) {
            return false;
        }
        self.phase = ReversePhase::Fired;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::PageEvent;
    use crate::memory::MemoryEnvironment;
    use url::Url;

    #[test]
    fn test_first_back_fires_once() {
        let page = Url::parse("https://lp.example/index.html?pz=1").unwrap();
        let mut env = MemoryEnvironment::new(page.clone());
        let mut rev = ReverseTrap::new();
        assert!(rev.arm(&mut env));
        assert!(!rev.arm(&mut env));
        assert_eq!(env.history().len(), 2);
        assert_eq!(env.location(), page);

        let Some(PageEvent::PopState { marker }) = env.back() else {
            panic!("expected a pop state");
        };
        assert!(rev.on_pop_state(marker));
        assert!(!rev.on_pop_state(marker));
        assert_eq!(rev.phase(), ReversePhase::Fired);
    }

    #[test]
    fn test_failing_history_disables() {
        let mut env = MemoryEnvironment::new(Url::parse("https://lp.example/").unwrap())
            .with_failing_history();
        let mut rev = ReverseTrap::new();
        assert!(!rev.arm(&mut env));
        assert_eq!(rev.phase(), ReversePhase::Disarmed);
        assert!(!rev.on_pop_state(Some(HistoryMarker::Reverse)));
    }
}
