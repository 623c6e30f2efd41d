//! Exit orchestration engine for advertising landing pages.
//!
//! # Modules
//!
//! - [`environment`] — the browser seam: history, timers, tabs, page events
//! - [`memory`] — in-memory [`environment::PageEnvironment`] with a virtual clock
//! - [`snapshot`] — tracking parameters captured once at boot
//! - [`normalizer`] — flat advertiser configuration to [`lander_core::ExitTable`]
//! - [`url_builder`] — zone endpoint and direct-passthrough URL resolution
//! - [`back_trap`] — session-history back-button trap
//! - [`runner`] — exit planning (single-tab and dual-tab)
//! - [`autoexit`] / [`reverse`] — state machines firing exits without a direct click
//! - [`triggers`] — glue options and mini-trigger wiring
//! - [`engine`] — the engine instance and collaborator registry

pub mod autoexit;
pub mod back_trap;
pub mod engine;
pub mod environment;
pub mod memory;
pub mod normalizer;
pub mod reverse;
pub mod runner;
pub mod snapshot;
pub mod triggers;
pub mod url_builder;

pub use engine::{ExitEngine, ExitHooks};
pub use environment::{
    HistoryMarker, Interaction, PageEnvironment, PageEvent, PageMetadata, TimerId,
};
pub use memory::MemoryEnvironment;
pub use normalizer::normalize;
pub use snapshot::ParameterSnapshot;
pub use triggers::{ClickMapMode, GlueOptions, MiniTriggers};
pub use url_builder::UrlBuilder;
