//! Autoexit state machine: `Idle -> Armed -> Fired`, frozen at `Idle` by the
//! first user interaction.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::environment::{Interaction, PageEnvironment, TimerId};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutoexitPhase {
    Idle,
    Armed,
    Fired,
}

#[derive(Debug)]
pub struct Autoexit {
    phase: AutoexitPhase,
    cancelled: bool,
    timer: Option<TimerId>,
}

impl Default for Autoexit {
    fn default() -> Self {
        Self::new()
    }
}

impl Autoexit {
    pub fn new() -> Self {
        Self {
            phase: AutoexitPhase::Idle,
            cancelled: false,
            timer: None,
        }
    }

    pub fn phase(&self) -> AutoexitPhase {
        self.phase
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// Start the inactivity timer. Only the first call has any effect.
    pub fn start<E: PageEnvironment>(&mut self, env: &mut E, after: Duration) {
        if self.timer.is_some() || self.cancelled || self.phase != AutoexitPhase::Idle {
            return;
        }
        self.timer = Some(env.set_timeout(after));
        debug!(after_secs = after.as_secs(), "autoexit timer started");
    }

    /// First qualifying interaction before firing cancels the machine for
    /// good, freezing it at `Idle` even when the timer already elapsed.
    pub fn on_interaction<E: PageEnvironment>(&mut self, env: &mut E, interaction: Interaction) {
        if self.cancelled || self.phase == AutoexitPhase::Fired {
            return;
        }
        self.cancelled = true;
        self.phase = AutoexitPhase::Idle;
        if let Some(timer) = self.timer.take() {
            env.clear_timeout(timer);
        }
        info!(?interaction, "autoexit cancelled by user interaction");
    }

    /// Returns true when `timer` was the autoexit timer; the machine is then armed.
    pub fn on_timer(&mut self, timer: TimerId) -> bool {
        if self.timer != Some(timer) {
            return false;
        }
        self.timer = None;
        if self.cancelled || self.phase != AutoexitPhase::Idle {
            return false;
        }
        self.phase = AutoexitPhase::Armed;
        debug!("autoexit armed");
        true
    }

    /// Transition `Armed -> Fired` if the page is visible. Returns true when
    /// the caller must now run the autoexit exit.
    pub fn try_fire(&mut self, visible: bool) -> bool {
        if self.phase != AutoexitPhase::Armed || self.cancelled || !visible {
            return false;
        }
        self.phase = AutoexitPhase::Fired;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEnvironment;
    use url::Url;

    fn env() -> MemoryEnvironment {
        MemoryEnvironment::new(Url::parse("https://lp.example/").unwrap())
    }

    #[test]
    fn test_timer_arms_then_fires_when_visible() {
        let mut env = env();
        let mut ae = Autoexit::new();
        ae.start(&mut env, Duration::from_secs(90));
        let timer = ae.timer().unwrap();

        assert!(!ae.on_timer(TimerId(999)));
        assert!(ae.on_timer(timer));
        assert_eq!(ae.phase(), AutoexitPhase::Armed);
        assert!(!ae.try_fire(false));
        assert!(ae.try_fire(true));
        assert_eq!(ae.phase(), AutoexitPhase::Fired);
        assert!(!ae.try_fire(true));
    }

    #[test]
    fn test_interaction_freezes_idle() {
        let mut env = env();
        let mut ae = Autoexit::new();
        ae.start(&mut env, Duration::from_secs(90));
        let timer = ae.timer().unwrap();

        ae.on_interaction(&mut env, Interaction::Scroll);
        assert!(ae.is_cancelled());
        assert_eq!(env.pending_timers(), 0);
        assert!(!ae.on_timer(timer));
        assert!(!ae.try_fire(true));
        assert_eq!(ae.phase(), AutoexitPhase::Idle);

        ae.start(&mut env, Duration::from_secs(1));
        assert!(ae.timer().is_none());
    }

    #[test]
    fn test_interaction_while_armed_cancels() {
        let mut env = env();
        let mut ae = Autoexit::new();
        ae.start(&mut env, Duration::from_secs(5));
        let timer = ae.timer().unwrap();
        assert!(ae.on_timer(timer));
        assert!(!ae.try_fire(false));

        ae.on_interaction(&mut env, Interaction::PointerMove);
        assert!(ae.is_cancelled());
        assert_eq!(ae.phase(), AutoexitPhase::Idle);
        assert!(!ae.try_fire(true));
    }

    #[test]
    fn test_interaction_after_fire_is_ignored() {
        let mut env = env();
        let mut ae = Autoexit::new();
        ae.start(&mut env, Duration::from_secs(5));
        let timer = ae.timer().unwrap();
        assert!(ae.on_timer(timer));
        assert!(ae.try_fire(true));

        ae.on_interaction(&mut env, Interaction::Click);
        assert!(!ae.is_cancelled());
        assert_eq!(ae.phase(), AutoexitPhase::Fired);
    }
}
