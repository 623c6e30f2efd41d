pub mod config;
pub mod error;
pub mod event_bus;
pub mod types;

pub use config::EngineSettings;
pub use error::{attempt, ExitError, ExitResult};
pub use event_bus::{TrackingEvent, TrackingSink};
pub use types::{ExitSpec, ExitTable, ExitTarget, Tab, TargetRef};
