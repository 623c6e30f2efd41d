//! Engine instance — owns the environment, the exit table and every latch,
//! and dispatches page events to the back-trap, autoexit and reverse
//! machines.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use lander_core::event_bus::{make_event, noop_sink};
use lander_core::types::exit_names;
use lander_core::{attempt, EngineSettings, ExitResult, ExitTable, TrackingSink};

use crate::autoexit::{Autoexit, AutoexitPhase};
use crate::back_trap::BackTrap;
use crate::environment::{PageEnvironment, PageEvent, TimerId};
use crate::memory::MemoryEnvironment;
use crate::normalizer::normalize;
use crate::reverse::{ReversePhase, ReverseTrap};
use crate::runner::{plan_exit, ExitPlan};
use crate::snapshot::ParameterSnapshot;
use crate::triggers::GlueOptions;
use crate::url_builder::UrlBuilder;

/// Hooks exposed to external trigger wiring (mini-triggers, custom buttons).
pub trait ExitHooks {
    /// Run a named exit with the back-trap.
    fn run(&mut self, name: &str);

    /// Arm the back-trap without running an exit.
    fn init_back(&mut self);
}

pub struct ExitEngine<E: PageEnvironment> {
    env: E,
    sink: Arc<dyn TrackingSink>,
    settings: EngineSettings,
    table: ExitTable,
    glue: GlueOptions,
    snapshot: ParameterSnapshot,
    back: BackTrap,
    autoexit: Autoexit,
    reverse: ReverseTrap,
    pending_navigations: BTreeMap<TimerId, String>,
}

impl<E: PageEnvironment> std::fmt::Debug for ExitEngine<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitEngine")
            .field("exits", &self.table.exits.len())
            .field("autoexit", &self.autoexit.phase())
            .field("reverse", &self.reverse.phase())
            .field("back_trap", &self.back.is_installed())
            .field("pending_navigations", &self.pending_navigations.len())
            .finish()
    }
}

impl<E: PageEnvironment> ExitEngine<E> {
    /// Boot the engine on a page. A missing configuration or `domain` halts
    /// boot after asking the page to show a placeholder.
    pub fn boot(mut env: E, config: &Value, settings: EngineSettings) -> ExitResult<Self> {
        let table = match normalize(config) {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "exit engine boot halted");
                env.render_placeholder(&e.to_string());
                return Err(e);
            }
        };

        let location = env.location();
        let snapshot = ParameterSnapshot::capture(&location, env.timezone(), &env.page_metadata());
        env.probe_os_version();

        let mut engine = Self {
            env,
            sink: noop_sink(),
            settings,
            table,
            glue: GlueOptions::from_config(config),
            snapshot,
            back: BackTrap::new(),
            autoexit: Autoexit::new(),
            reverse: ReverseTrap::new(),
            pending_navigations: BTreeMap::new(),
        };

        if let Some(spec) = engine
            .table
            .get(exit_names::AUTOEXIT)
            .filter(|spec| spec.current_tab.is_some())
        {
            let secs = spec.time_to_redirect.unwrap_or(engine.settings.autoexit_secs);
            engine
                .autoexit
                .start(&mut engine.env, Duration::from_secs(secs));
        }
        if engine.table.has_current_tab(exit_names::REVERSE) {
            engine.reverse.arm(&mut engine.env);
        }

        info!(
            location = %location,
            exits = engine.table.exits.len(),
            domain = %engine.table.domain,
            "exit engine booted"
        );
        Ok(engine)
    }

    /// Attach the page's tracking hook.
    pub fn with_tracking_sink(mut self, sink: Arc<dyn TrackingSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn table(&self) -> &ExitTable {
        &self.table
    }

    pub fn glue(&self) -> &GlueOptions {
        &self.glue
    }

    pub fn snapshot(&self) -> &ParameterSnapshot {
        &self.snapshot
    }

    pub fn autoexit_phase(&self) -> AutoexitPhase {
        self.autoexit.phase()
    }

    pub fn reverse_phase(&self) -> ReversePhase {
        self.reverse.phase()
    }

    pub fn back_trap(&self) -> &BackTrap {
        &self.back
    }

    /// Resolve a named exit against the current page without executing it.
    pub fn plan(&self, name: &str) -> Option<ExitPlan> {
        let builder = UrlBuilder::new(&self.snapshot, &self.settings);
        plan_exit(&self.table, name, &builder, &self.env.location())
    }

    /// Run a named exit. Unknown or unresolvable exits are silent no-ops.
    pub fn run_exit(&mut self, name: &str, with_back: bool) -> bool {
        let Some(plan) = self.plan(name) else {
            return false;
        };
        info!(
            exit = %plan.name,
            requested = name,
            mode = ?plan.mode,
            with_back,
            "running exit"
        );

        for resolved in plan.tabs() {
            let event = make_event(plan.name.clone(), resolved.zone_id.clone(), resolved.tab);
            attempt("tracking sink", || self.sink.emit(&event));
        }

        // Must happen inside the triggering gesture or the browser blocks it.
        if let Some(new_tab) = &plan.new_tab {
            attempt("open tab", || self.env.open_tab(&new_tab.url));
        }

        if with_back {
            self.init_back();
        }

        if let Some(current) = plan.current_tab {
            let delay = Duration::from_millis(self.settings.navigation_delay_ms);
            let timer = self.env.set_timeout(delay);
            debug!(exit = %plan.name, url = %current.url, "navigation scheduled");
            self.pending_navigations.insert(timer, current.url);
        }
        true
    }

    /// Single dispatch point for page events.
    pub fn handle(&mut self, event: PageEvent) {
        match event {
            PageEvent::TimerElapsed(timer) => self.on_timer(timer),
            PageEvent::UserInteraction(interaction) => {
                self.autoexit.on_interaction(&mut self.env, interaction)
            }
            PageEvent::VisibilityChanged => self.try_fire_autoexit(),
            PageEvent::PopState { marker } => {
                if self.reverse.on_pop_state(marker) {
                    info!("back navigation caught by reverse exit");
                    self.run_exit(exit_names::REVERSE, false);
                    return;
                }
                self.back.on_pop_state(&mut self.env, marker);
            }
            PageEvent::OsVersionResolved(result) => {
                if let Some(version) = attempt("os version probe", || result) {
                    if !self.snapshot.resolve_os_version(version) {
                        debug!("os version already resolved");
                    }
                }
            }
        }
    }

    fn on_timer(&mut self, timer: TimerId) {
        if let Some(url) = self.pending_navigations.remove(&timer) {
            info!(url = %url, "navigating current tab");
            self.env.replace_location(&url);
            return;
        }
        if self.autoexit.on_timer(timer) {
            self.try_fire_autoexit();
        }
    }

    fn try_fire_autoexit(&mut self) {
        if self.autoexit.try_fire(self.env.is_visible()) {
            info!("autoexit firing");
            self.run_exit(exit_names::AUTOEXIT, true);
        }
    }
}

impl<E: PageEnvironment> ExitHooks for ExitEngine<E> {
    fn run(&mut self, name: &str) {
        self.run_exit(name, true);
    }

    fn init_back(&mut self) {
        self.back.arm(&mut self.env, &self.table, &self.settings);
    }
}

impl ExitEngine<MemoryEnvironment> {
    /// Advance the virtual clock, delivering due timers in deadline order.
    pub fn advance(&mut self, by: Duration) {
        let until = self.env.now() + by;
        while let Some(timer) = self.env.next_due(until) {
            self.handle(PageEvent::TimerElapsed(timer));
        }
        self.env.set_now(until);
    }

    /// Press the browser back button once.
    pub fn back(&mut self) -> bool {
        match self.env.back() {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::{HistoryMarker, Interaction};
    use lander_core::event_bus::capture_sink;
    use lander_core::ExitError;
    use serde_json::json;
    use url::Url;

    fn env() -> MemoryEnvironment {
        MemoryEnvironment::new(Url::parse("https://lp.example/offer/index.html?pz=3").unwrap())
    }

    #[test]
    fn test_boot_requires_domain() {
        let result = ExitEngine::boot(env(), &json!({"mainExit_zoneId": "1"}), EngineSettings::default());
        assert!(matches!(result, Err(ExitError::MissingConfiguration(_))));
    }

    #[test]
    fn test_boot_requests_os_probe_and_records_answer() {
        let mut engine =
            ExitEngine::boot(env(), &json!({"domain": "ads.example"}), EngineSettings::default())
                .unwrap();
        assert!(engine.env().os_probe_requested());

        engine.handle(PageEvent::OsVersionResolved(Err(ExitError::Probe(
            "no client hints".into(),
        ))));
        assert_eq!(engine.snapshot().os_version(), "");

        engine.handle(PageEvent::OsVersionResolved(Ok("15.0.0".into())));
        engine.handle(PageEvent::OsVersionResolved(Ok("16.0.0".into())));
        assert_eq!(engine.snapshot().os_version(), "15.0.0");
        let plan = engine.plan("x");
        assert!(plan.is_none());
    }

    #[test]
    fn test_navigation_is_deferred() {
        let sink = capture_sink();
        let mut engine = ExitEngine::boot(
            env(),
            &json!({"domain": "ads.example", "mainExit_zoneId": "55"}),
            EngineSettings::default(),
        )
        .unwrap()
        .with_tracking_sink(sink.clone());

        assert!(engine.run_exit("mainExit", false));
        assert_eq!(sink.count(), 1);
        assert!(engine.env().navigations().is_empty());

        engine.advance(Duration::from_millis(99));
        assert!(engine.env().navigations().is_empty());
        engine.advance(Duration::from_millis(1));
        assert_eq!(engine.env().navigations().len(), 1);
        assert!(engine.env().navigations()[0].ends_with("zoneid=55"));
        // Replaced, not pushed.
        assert_eq!(engine.env().history().len(), 1);
    }

    #[test]
    fn test_reverse_does_not_arm_back_trap() {
        let mut engine = ExitEngine::boot(
            env(),
            &json!({
                "domain": "ads.example",
                "reverse_zoneId": "9",
                "back_zoneId": "7"
            }),
            EngineSettings::default(),
        )
        .unwrap();
        assert_eq!(engine.reverse_phase(), ReversePhase::Waiting);

        engine.handle(PageEvent::PopState {
            marker: Some(HistoryMarker::Reverse),
        });
        assert_eq!(engine.reverse_phase(), ReversePhase::Fired);
        assert!(!engine.back_trap().is_installed());
    }

    #[test]
    fn test_interaction_after_fire_is_harmless() {
        let mut engine = ExitEngine::boot(
            env(),
            &json!({"domain": "ads.example", "autoexit_zoneId": "4", "autoexit_timeToRedirect": 1}),
            EngineSettings::default(),
        )
        .unwrap();
        engine.advance(Duration::from_secs(1));
        assert_eq!(engine.autoexit_phase(), AutoexitPhase::Fired);
        engine.handle(PageEvent::UserInteraction(Interaction::Click));
        assert_eq!(engine.autoexit_phase(), AutoexitPhase::Fired);
    }
}
