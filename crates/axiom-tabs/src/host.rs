//! Collaborator contracts
//!
//! Every process-wide service the tab core talks to is passed in explicitly
//! through [`Capabilities`] instead of being reached through a global.

use std::sync::Arc;

use crate::error_queue::QueuedError;
use crate::event::SslErrors;
use crate::touch_icon::TouchIconFetcher;
use crate::view::{Favicon, ViewFactory, ViewId};
use crate::TabId;

/// Alerts the host shows when a window open request is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    TooManySubWindows,
    TooManyWindows,
}

/// The window that owns the tab strip and presents dialogs.
///
/// Methods are invoked while the tab table is locked. Implementations must
/// queue any follow-up call into [`crate::TabControl`] instead of making it
/// synchronously.
pub trait Host: Send + Sync {
    /// Present one queued error. The host reports the dismissal through
    /// [`crate::TabControl::dismiss_error`].
    fn show_error_dialog(&self, _tab: &TabId, _error: &QueuedError) {}

    fn reset_title_and_revert_lock_icon(&self, _tab: &TabId) {}

    fn on_page_started(&self, _tab: &TabId, _url: &str, _favicon: Option<&Favicon>) {}

    fn on_page_finished(&self, _tab: &TabId, _url: &str) {}

    fn on_progress_changed(&self, _tab: &TabId, _progress: u8) {}

    fn set_url_title(&self, _tab: &TabId, _url: Option<&str>, _title: &str) {}

    fn set_favicon(&self, _tab: &TabId, _icon: Option<&Favicon>) {}

    /// Return true to hand the URL to another application.
    fn should_override_url_loading(&self, _tab: &TabId, _url: &str) -> bool {
        false
    }

    fn show_alert(&self, _tab: &TabId, _alert: Alert) {}

    /// Ask the user whether a script may open a window. On approval the host
    /// calls [`crate::TabControl::create_window`].
    fn confirm_popup(&self, _tab: &TabId, _dialog: bool) {}

    fn show_ssl_warning(&self, _tab: &TabId, _errors: SslErrors) {}

    fn show_http_auth(&self, _tab: &TabId, _host: &str, _realm: &str) {}

    fn confirm_redirect(&self, _tab: &TabId) {}

    fn confirm_form_resubmission(&self, _tab: &TabId) {}

    fn show_geolocation_prompt(&self, _tab: &TabId, _origin: &str) {}

    fn hide_geolocation_prompt(&self, _tab: &TabId) {}

    fn attach_sub_window(&self, _tab: &TabId) {}

    fn dismiss_sub_window(&self, _tab: &TabId) {}

    fn switch_to_tab(&self, _tab: &TabId) {}

    fn close_tab(&self, _tab: &TabId) {}

    fn schedule_thumbnail_update(&self, _tab: &TabId) {}

    fn cancel_thumbnail_update(&self, _tab: &TabId) {}

    fn is_network_up(&self) -> bool {
        true
    }

    fn did_user_stop_loading(&self) -> bool {
        false
    }
}

/// Bookmarks and visited-history store.
pub trait BookmarkStore: Send + Sync {
    fn update_favicon(&self, original_url: Option<&str>, url: &str, icon: &Favicon)
        -> anyhow::Result<()>;

    /// Reloads are recorded without counting as a new visit.
    fn record_visit(&self, url: &str, is_reload: bool) -> anyhow::Result<()>;

    /// Ids of bookmark rows whose URL is either the original or the final URL.
    fn find_bookmarks_matching(&self, original_url: Option<&str>, url: &str)
        -> anyhow::Result<Vec<i64>>;

    fn store_touch_icon(&self, original_url: Option<&str>, url: &str, icon: &[u8])
        -> anyhow::Result<()>;

    /// Retitle the first non-bookmark history row whose URL ends with
    /// `url_suffix`.
    fn update_history_title(&self, url_suffix: &str, title: &str) -> anyhow::Result<()>;
}

/// Registry that pushes browser settings to every live view.
pub trait SettingsRegistry: Send + Sync {
    fn register(&self, view: ViewId);

    fn unregister(&self, view: ViewId);

    fn show_security_warnings(&self) -> bool;
}

/// Network-layer cookie synchronization.
pub trait CookieSync: Send + Sync {
    fn reset_sync(&self) {}

    fn sync(&self) {}
}

#[derive(Clone)]
pub struct Capabilities {
    pub host: Arc<dyn Host>,
    pub views: Arc<dyn ViewFactory>,
    pub bookmarks: Arc<dyn BookmarkStore>,
    pub settings: Arc<dyn SettingsRegistry>,
    pub cookies: Arc<dyn CookieSync>,
    pub icons: Arc<dyn TouchIconFetcher>,
}
