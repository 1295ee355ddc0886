//! AXIOM Core
//!
//! Wires the tab lifecycle core to its SQLite-backed collaborators and owns
//! the browser session.

mod bookmarks;
mod browser;
mod config;
mod error;
mod icons;
mod settings;

pub use bookmarks::SqliteBookmarkStore;
pub use browser::{Browser, Embedder};
pub use config::Config;
pub use error::CoreError;
pub use icons::HttpTouchIconFetcher;
pub use settings::BrowserSettings;

pub use axiom_storage::{Database, StorageError};
pub use axiom_tabs::{
    Alert, ContentView, CookieSync, CreatedWindow, ErrorKind, EventResponse, Host, RestoreOutcome,
    TabControl, TabError, TabId, TabSnapshot, TabState, ViewEvent, ViewFactory, ViewId, ViewRole,
};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
