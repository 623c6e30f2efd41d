//! Tracking sink — the optional external hook that receives one event per
//! resolved exit tab. Delivery is best effort: callers route every emit
//! through [`crate::error::attempt`] so a failing sink never blocks navigation.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ExitError, ExitResult};
use crate::types::Tab;

/// Payload handed to the tracking sink: `{event, exitZoneId}` plus bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEvent {
    pub event_id: Uuid,
    /// Exit name, e.g. `mainExit`.
    pub event: String,
    pub exit_zone_id: Option<String>,
    pub tab: Tab,
    pub timestamp: DateTime<Utc>,
}

/// Convenience builder for a [`TrackingEvent`].
pub fn make_event(
    event: impl Into<String>,
    exit_zone_id: Option<String>,
    tab: Tab,
) -> TrackingEvent {
    TrackingEvent {
        event_id: Uuid::new_v4(),
        event: event.into(),
        exit_zone_id,
        tab,
        timestamp: Utc::now(),
    }
}

pub trait TrackingSink {
    fn emit(&self, event: &TrackingEvent) -> ExitResult<()>;
}

/// Sink used when the page provides no tracking hook.
pub struct NoOpSink;

impl TrackingSink for NoOpSink {
    fn emit(&self, _event: &TrackingEvent) -> ExitResult<()> {
        Ok(())
    }
}

/// In-memory sink that captures events for testing.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<TrackingEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TrackingEvent> {
        self.events.lock().expect("tracking sink mutex poisoned").clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().expect("tracking sink mutex poisoned").len()
    }

    pub fn count_named(&self, event: &str) -> usize {
        self.events
            .lock()
            .expect("tracking sink mutex poisoned")
            .iter()
            .filter(|e| e.event == event)
            .count()
    }
}

impl TrackingSink for CaptureSink {
    fn emit(&self, event: &TrackingEvent) -> ExitResult<()> {
        self.events
            .lock()
            .expect("tracking sink mutex poisoned")
            .push(event.clone());
        Ok(())
    }
}

/// Sink that rejects every event.
pub struct FailingSink;

impl TrackingSink for FailingSink {
    fn emit(&self, event: &TrackingEvent) -> ExitResult<()> {
        Err(ExitError::TrackingSink(format!(
            "sink rejected event '{}'",
            event.event
        )))
    }
}

/// Adapts a plain closure into a sink.
impl<F> TrackingSink for F
where
    F: Fn(&TrackingEvent) -> ExitResult<()>,
{
    fn emit(&self, event: &TrackingEvent) -> ExitResult<()> {
        self(event)
    }
}

pub fn noop_sink() -> Arc<dyn TrackingSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_sink() {
        let sink = capture_sink();
        assert_eq!(sink.count(), 0);

        sink.emit(&make_event("mainExit", Some("55".into()), Tab::CurrentTab))
            .unwrap();
        sink.emit(&make_event("mainExit", None, Tab::NewTab)).unwrap();
        sink.emit(&make_event("back", Some("7".into()), Tab::CurrentTab))
            .unwrap();

        assert_eq!(sink.count(), 3);
        assert_eq!(sink.count_named("mainExit"), 2);
        assert_eq!(sink.events()[2].exit_zone_id, Some("7".into()));
    }

    #[test]
    fn test_event_wire_shape() {
        let event = make_event("autoexit", Some("12".into()), Tab::CurrentTab);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "autoexit");
        assert_eq!(json["exitZoneId"], "12");
        assert_eq!(json["tab"], "current_tab");
    }

    #[test]
    fn test_failing_and_closure_sinks() {
        let event = make_event("reverse", None, Tab::CurrentTab);
        assert!(FailingSink.emit(&event).is_err());

        let closure = |e: &TrackingEvent| -> ExitResult<()> {
            assert_eq!(e.event, "reverse");
            Ok(())
        };
        assert!(closure.emit(&event).is_ok());
        assert!(noop_sink().emit(&event).is_ok());
    }
}
