//! Engine events and the answers the tab core gives back
//!
//! Events are delivered through [`crate::TabControl::dispatch`] together with
//! the id of the view that raised them.

use crate::view::{Favicon, ViewId};
use crate::TabId;

/// Certificate problems reported with an SSL error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SslErrors {
    pub untrusted: bool,
    pub id_mismatch: bool,
    pub expired: bool,
    pub not_yet_valid: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    PageStarted {
        url: String,
        favicon: Option<Favicon>,
    },
    PageFinished {
        url: String,
    },
    LoadResource {
        url: String,
    },
    ReceivedError {
        code: i32,
        description: String,
        failing_url: String,
    },
    SslError {
        errors: SslErrors,
    },
    HttpAuthRequest {
        host: String,
        realm: String,
        reuse_credentials: bool,
    },
    TooManyRedirects,
    FormResubmission,
    OverrideUrlLoading {
        url: String,
    },
    UpdateVisitedHistory {
        url: String,
        is_reload: bool,
    },
    ReceivedTitle {
        title: String,
    },
    ReceivedIcon {
        icon: Favicon,
    },
    TouchIconUrl {
        url: String,
        precomposed: bool,
    },
    ProgressChanged {
        progress: u8,
    },
    CreateWindow {
        dialog: bool,
        user_gesture: bool,
    },
    CloseWindow,
    RequestFocus,
    GeolocationShowPrompt {
        origin: String,
    },
    GeolocationHidePrompt,
    ConsoleMessage {
        message: String,
        line: u32,
        source: String,
    },
}

impl ViewEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PageStarted { .. } => "page_started",
            Self::PageFinished { .. } => "page_finished",
            Self::LoadResource { .. } => "load_resource",
            Self::ReceivedError { .. } => "received_error",
            Self::SslError { .. } => "ssl_error",
            Self::HttpAuthRequest { .. } => "http_auth_request",
            Self::TooManyRedirects => "too_many_redirects",
            Self::FormResubmission => "form_resubmission",
            Self::OverrideUrlLoading { .. } => "override_url_loading",
            Self::UpdateVisitedHistory { .. } => "update_visited_history",
            Self::ReceivedTitle { .. } => "received_title",
            Self::ReceivedIcon { .. } => "received_icon",
            Self::TouchIconUrl { .. } => "touch_icon_url",
            Self::ProgressChanged { .. } => "progress_changed",
            Self::CreateWindow { .. } => "create_window",
            Self::CloseWindow => "close_window",
            Self::RequestFocus => "request_focus",
            Self::GeolocationShowPrompt { .. } => "geolocation_show_prompt",
            Self::GeolocationHidePrompt => "geolocation_hide_prompt",
            Self::ConsoleMessage { .. } => "console_message",
        }
    }

    /// Events a subwindow hands on to its tab's main handler.
    pub(crate) fn forwarded_from_sub_window(&self) -> bool {
        matches!(
            self,
            Self::ReceivedError { .. }
                | Self::SslError { .. }
                | Self::HttpAuthRequest { .. }
                | Self::FormResubmission
                | Self::OverrideUrlLoading { .. }
                | Self::UpdateVisitedHistory { .. }
                | Self::ProgressChanged { .. }
                | Self::CreateWindow { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResponse {
    /// No tab owns the view, or the event does not apply to it
    Ignored,
    Handled,
    /// Answer to [`ViewEvent::OverrideUrlLoading`]
    Override(bool),
    Proceed,
    Cancel,
    /// The host was asked and will answer the engine itself
    Deferred,
    Credentials { username: String, password: String },
    WindowCreated(CreatedWindow),
}

/// Window opened in answer to a script request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatedWindow {
    SubWindow(ViewId),
    Tab(TabId),
}

/// URL to record in the visited history, or `None` for pages that are never
/// recorded. Strips the `client=ms-` marker from Google URLs.
pub(crate) fn visited_history_url(url: &str) -> Option<String> {
    if url
        .get(..6)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("about:"))
    {
        return None;
    }

    let Some(index) = url.find("client=ms-").filter(|&i| i > 0) else {
        return Some(url.to_string());
    };
    if !url.contains(".google.") {
        return Some(url.to_string());
    }

    let stripped = match url[index..].find('&') {
        Some(offset) => format!("{}{}", &url[..index], &url[index + offset + 1..]),
        // Drop the '?' or '&' that introduced the parameter
        None => {
            let head = &url[..index];
            head.strip_suffix(['?', '&']).unwrap_or(head).to_string()
        }
    };
    Some(stripped)
}

/// Longest pattern the history store accepts in a LIKE clause.
pub(crate) const MAX_LIKE_PATTERN_LENGTH: usize = 50_000;

/// Suffix used to find the history row to retitle.
pub(crate) fn history_title_key(url: &str) -> Option<&str> {
    if url.len() >= MAX_LIKE_PATTERN_LENGTH {
        return None;
    }
    let key = if let Some(rest) = url.strip_prefix("http://www.") {
        rest
    } else if url.starts_with("http://") {
        &url[4..]
    } else {
        url
    };
    Some(key)
}
