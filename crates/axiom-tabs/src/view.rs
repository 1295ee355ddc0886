//! Content view capability
//!
//! The rendering engine is opaque to the tab core. A view can load URLs,
//! report lifecycle events (see [`crate::ViewEvent`]) and save/restore its
//! back/forward list.

use serde::{Deserialize, Serialize};

/// Stable identity of a live view, used to route engine events to the tab
/// that currently owns the view.
pub type ViewId = u64;

/// Serialized back/forward list as produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryBlob(pub serde_json::Value);

/// Decoded favicon image bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Favicon(pub Vec<u8>);

/// The current entry of a view's back/forward list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HistoryItem {
    pub url: String,
    pub title: Option<String>,
    pub favicon: Option<Favicon>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewRole {
    /// The tab's main view
    Main,
    /// A transient popup view layered over the main view
    Sub,
}

pub trait ContentView: Send {
    fn id(&self) -> ViewId;

    fn load_url(&mut self, url: &str);

    /// URL of the current page, after redirects
    fn url(&self) -> Option<String>;

    /// URL the current page was originally requested with
    fn original_url(&self) -> Option<String>;

    fn resume(&mut self);

    fn pause(&mut self);

    fn destroy(&mut self);

    fn set_context_menu_enabled(&mut self, enabled: bool);

    fn set_network_available(&mut self, available: bool);

    fn current_entry(&self) -> Option<HistoryItem>;

    /// `None` when the engine has no back/forward list to save.
    fn save_history(&self) -> Option<HistoryBlob>;

    fn restore_history(&mut self, history: &HistoryBlob) -> anyhow::Result<()>;

    /// Screenshot of the current page, encoded by the engine.
    fn capture_picture(&self) -> Option<Vec<u8>>;

    fn restore_picture(&mut self, picture: &[u8]) -> anyhow::Result<()>;

    /// Stored HTTP auth credentials for `host`/`realm`, if any.
    fn http_auth_credentials(&self, _host: &str, _realm: &str) -> Option<(String, String)> {
        None
    }
}

pub trait ViewFactory: Send + Sync {
    fn create_view(&self, role: ViewRole) -> Box<dyn ContentView>;
}
