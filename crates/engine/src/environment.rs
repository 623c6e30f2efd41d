//! The browser seam. The engine never touches a DOM directly; every side
//! effect goes through [`PageEnvironment`] and every stimulus arrives as a
//! [`PageEvent`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use lander_core::{ExitError, ExitResult};

/// Handle for a scheduled timeout.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

/// Tag carried in the state of a session-history entry pushed by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HistoryMarker {
    /// Back-trap entry pointing at the redirect page.
    Wait,
    /// Entry armed by the reverse exit.
    Reverse,
}

/// User interactions that cancel the autoexit timer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    PointerMove,
    Click,
    Scroll,
}

/// Timezone signals read from the runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimezoneInfo {
    /// IANA name, e.g. `Europe/Berlin`.
    pub name: String,
    /// Minutes, UTC minus local time.
    pub offset_minutes: i32,
}

/// Descriptive page data packed into the opaque `cmeta` tracking field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageMetadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub referrer: String,
}

/// Discrete events delivered to [`crate::ExitEngine::handle`].
#[derive(Debug)]
pub enum PageEvent {
    TimerElapsed(TimerId),
    UserInteraction(Interaction),
    VisibilityChanged,
    /// Back/forward navigation landed on an entry carrying `marker`.
    PopState { marker: Option<HistoryMarker> },
    /// Result of the asynchronous OS-version probe.
    OsVersionResolved(Result<String, ExitError>),
}

pub trait PageEnvironment {
    fn location(&self) -> Url;

    /// Navigate without adding a history entry.
    fn replace_location(&mut self, url: &str);

    /// Reload the current location, executing its server-rendered logic.
    fn reload(&mut self);

    fn push_state(&mut self, marker: Option<HistoryMarker>, url: &str) -> ExitResult<()>;

    fn replace_state(&mut self, marker: Option<HistoryMarker>, url: &str) -> ExitResult<()>;

    /// Open `url` in a new tab with the opener reference severed. Must be
    /// called synchronously inside the user-gesture handler.
    fn open_tab(&mut self, url: &str) -> ExitResult<()>;

    fn is_visible(&self) -> bool;

    fn set_timeout(&mut self, delay: Duration) -> TimerId;

    fn clear_timeout(&mut self, id: TimerId);

    fn timezone(&self) -> TimezoneInfo;

    fn page_metadata(&self) -> PageMetadata;

    /// Start the OS-version probe; the answer arrives later as
    /// [`PageEvent::OsVersionResolved`].
    fn probe_os_version(&mut self) {}

    /// Show a visible placeholder when boot cannot proceed.
    fn render_placeholder(&mut self, _message: &str) {}
}

impl<E: PageEnvironment + ?Sized> PageEnvironment for &mut E {
    fn location(&self) -> Url {
        (**self).location()
    }

    fn replace_location(&mut self, url: &str) {
        (**self).replace_location(url)
    }

    fn reload(&mut self) {
        (**self).reload()
    }

    fn push_state(&mut self, marker: Option<HistoryMarker>, url: &str) -> ExitResult<()> {
        (**self).push_state(marker, url)
    }

    fn replace_state(&mut self, marker: Option<HistoryMarker>, url: &str) -> ExitResult<()> {
        (**self).replace_state(marker, url)
    }

    fn open_tab(&mut self, url: &str) -> ExitResult<()> {
        (**self).open_tab(url)
    }

    fn is_visible(&self) -> bool {
        (**self).is_visible()
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        (**self).set_timeout(delay)
    }

    fn clear_timeout(&mut self, id: TimerId) {
        (**self).clear_timeout(id)
    }

    fn timezone(&self) -> TimezoneInfo {
        (**self).timezone()
    }

    fn page_metadata(&self) -> PageMetadata {
        (**self).page_metadata()
    }

    fn probe_os_version(&mut self) {
        (**self).probe_os_version()
    }

    fn render_placeholder(&mut self, message: &str) {
        (**self).render_placeholder(message)
    }
}
