//! AXIOM Tab Lifecycle
//!
//! Tabs own a content view, an optional subwindow, a queue of deferred error
//! dialogs and at most one touch-icon download. Background tabs can be frozen
//! into a [`TabSnapshot`] to release their view and thawed again later, also
//! across process restarts. Every mutation goes through [`TabControl`].

mod control;
mod dispatch;
mod error;
mod error_queue;
mod event;
mod host;
mod security;
mod snapshot;
mod state;
mod store;
mod tab;
mod thumbnails;
mod touch_icon;
mod view;

#[cfg(test)]
mod testing;

pub use control::{TabControl, TabPolicy, DEFAULT_MAX_TABS};
pub use error::TabError;
pub use error_queue::{ErrorKind, ErrorPolicy, ErrorQueue, ErrorTitle, QueuedError};
pub use event::{CreatedWindow, EventResponse, SslErrors, ViewEvent};
pub use host::{Alert, BookmarkStore, Capabilities, CookieSync, Host, SettingsRegistry};
pub use security::{LockIcon, LockState};
pub use snapshot::{RestoreOutcome, TabSnapshot};
pub use state::TabState;
pub use store::SnapshotStore;
pub use tab::{PickerData, Tab};
pub use thumbnails::ThumbnailDir;
pub use touch_icon::{TouchIconFetcher, TouchIconTask};
pub use view::{ContentView, Favicon, HistoryBlob, HistoryItem, ViewFactory, ViewId, ViewRole};

/// Tab identity, a UUID v4 string
pub type TabId = String;

pub type Result<T> = std::result::Result<T, TabError>;
