//! Engine event handling
//!
//! One handler per tab. Events are looked up by the id of the view that
//! raised them, so a view that was released or replaced no longer reaches
//! its old tab. Subwindow events are either handed on to the main handler or
//! ignored.

use std::sync::Arc;

use crate::control::{close_sub_window, TabControl, TabTable};
use crate::error_queue::ErrorKind;
use crate::event::{history_title_key, visited_history_url, EventResponse, ViewEvent};
use crate::tab::Tab;
use crate::touch_icon::{self, IconDecision, IconRequest};
use crate::view::{Favicon, ViewId, ViewRole};

impl TabControl {
    /// Deliver an engine event raised by `view`.
    pub fn dispatch(&self, view: ViewId, event: ViewEvent) -> EventResponse {
        let mut table = self.table.lock();
        let Some((index, role)) = table.find_view(view) else {
            tracing::debug!(
                view_id = view,
                event = event.name(),
                "No tab owns view; dropping event"
            );
            return EventResponse::Ignored;
        };

        match role {
            ViewRole::Main => self.handle_main(&mut table, index, event),
            ViewRole::Sub => self.handle_sub(&mut table, index, view, event),
        }
    }

    fn handle_sub(
        &self,
        table: &mut TabTable,
        index: usize,
        view: ViewId,
        event: ViewEvent,
    ) -> EventResponse {
        if event.forwarded_from_sub_window() {
            return self.handle_main(table, index, event);
        }
        match event {
            ViewEvent::CloseWindow => {
                if let Some(tab) = table.tab_at_mut(index) {
                    close_sub_window(tab, view, &self.caps);
                }
                EventResponse::Handled
            }
            _ => EventResponse::Ignored,
        }
    }

    fn handle_main(&self, table: &mut TabTable, index: usize, event: ViewEvent) -> EventResponse {
        match event {
            ViewEvent::CreateWindow {
                dialog,
                user_gesture,
            } => return self.on_create_window(table, index, dialog, user_gesture),
            ViewEvent::TouchIconUrl { url, precomposed } => {
                return self.on_touch_icon_url(table, index, url, precomposed)
            }
            _ => {}
        }

        let Some(tab) = table.tab_at_mut(index) else {
            return EventResponse::Ignored;
        };
        let caps = &self.caps;
        let id = tab.id().clone();

        match event {
            ViewEvent::PageStarted { url, favicon } => {
                tab.set_in_load(true);
                tab.reset_lock_icon(&url);
                // A running touch-icon fetch finishes for the page it started on
                tab.detach_touch_icon();
                caps.host.cancel_thumbnail_update(&id);
                caps.cookies.reset_sync();
                if let Some(icon) = favicon.as_ref() {
                    self.persist_favicon(tab, &url, icon);
                }
                if tab.in_foreground() {
                    caps.host.on_page_started(&id, &url, favicon.as_ref());
                }
                EventResponse::Handled
            }
            ViewEvent::PageFinished { url } => {
                tab.set_in_load(false);
                if !(tab.in_foreground() && caps.host.did_user_stop_loading()) {
                    caps.host.schedule_thumbnail_update(&id);
                }
                if tab.in_foreground() {
                    caps.host.on_page_finished(&id, &url);
                }
                EventResponse::Handled
            }
            ViewEvent::LoadResource { url } => {
                tab.lock_mut().on_resource_load(&url);
                EventResponse::Handled
            }
            ViewEvent::ReceivedError {
                code,
                description,
                failing_url,
            } => {
                tracing::error!(tab_id = %id, code, url = %failing_url, "{description}");
                let kind = ErrorKind::from_code(code);
                if !self.policy.errors.is_suppressed(kind) {
                    tab.report_error(kind, &description, caps);
                }
                EventResponse::Handled
            }
            ViewEvent::SslError { errors } => {
                if !tab.in_foreground() {
                    EventResponse::Cancel
                } else if caps.settings.show_security_warnings() {
                    caps.host.show_ssl_warning(&id, errors);
                    EventResponse::Deferred
                } else {
                    EventResponse::Proceed
                }
            }
            ViewEvent::HttpAuthRequest {
                host,
                realm,
                reuse_credentials,
            } => {
                let stored = if reuse_credentials {
                    tab.view()
                        .and_then(|view| view.http_auth_credentials(&host, &realm))
                } else {
                    None
                };
                match stored {
                    Some((username, password)) => EventResponse::Credentials { username, password },
                    None if tab.in_foreground() => {
                        caps.host.show_http_auth(&id, &host, &realm);
                        EventResponse::Deferred
                    }
                    None => EventResponse::Cancel,
                }
            }
            ViewEvent::TooManyRedirects => {
                if !tab.in_foreground() {
                    return EventResponse::Cancel;
                }
                caps.host.confirm_redirect(&id);
                EventResponse::Deferred
            }
            ViewEvent::FormResubmission => {
                if !tab.in_foreground() {
                    return EventResponse::Cancel;
                }
                caps.host.confirm_form_resubmission(&id);
                EventResponse::Deferred
            }
            ViewEvent::OverrideUrlLoading { url } => EventResponse::Override(
                tab.in_foreground() && caps.host.should_override_url_loading(&id, &url),
            ),
            ViewEvent::UpdateVisitedHistory { url, is_reload } => {
                if let Some(url) = visited_history_url(&url) {
                    if let Err(e) = caps.bookmarks.record_visit(&url, is_reload) {
                        tracing::warn!(tab_id = %id, error = %e, "Failed to record visit");
                    }
                }
                EventResponse::Handled
            }
            ViewEvent::ReceivedTitle { title } => {
                let url = tab.view().and_then(|view| view.url());
                if tab.in_foreground() {
                    caps.host.set_url_title(&id, url.as_deref(), &title);
                }
                if let Some(key) = url.as_deref().and_then(history_title_key) {
                    if let Err(e) = caps.bookmarks.update_history_title(key, &title) {
                        tracing::warn!(tab_id = %id, error = %e, "Failed to update history title");
                    }
                }
                EventResponse::Handled
            }
            ViewEvent::ReceivedIcon { icon } => {
                if let Some(url) = tab.view().and_then(|view| view.url()) {
                    self.persist_favicon(tab, &url, &icon);
                }
                if tab.in_foreground() {
                    caps.host.set_favicon(&id, Some(&icon));
                }
                EventResponse::Handled
            }
            ViewEvent::ProgressChanged { progress } => {
                if progress >= 100 {
                    caps.cookies.sync();
                }
                if tab.in_foreground() {
                    caps.host.on_progress_changed(&id, progress.min(100));
                }
                EventResponse::Handled
            }
            ViewEvent::CloseWindow => {
                let Some(parent) = tab.parent().cloned() else {
                    return EventResponse::Ignored;
                };
                if tab.in_foreground() {
                    caps.host.switch_to_tab(&parent);
                }
                caps.host.close_tab(&id);
                EventResponse::Handled
            }
            ViewEvent::RequestFocus => {
                if !tab.in_foreground() {
                    caps.host.switch_to_tab(&id);
                }
                EventResponse::Handled
            }
            ViewEvent::GeolocationShowPrompt { origin } => {
                if !tab.in_foreground() {
                    return EventResponse::Ignored;
                }
                tab.show_geolocation_prompt(&origin, caps);
                EventResponse::Handled
            }
            ViewEvent::GeolocationHidePrompt => {
                if tab.in_foreground() {
                    tab.hide_geolocation_prompt(caps);
                }
                EventResponse::Handled
            }
            ViewEvent::ConsoleMessage {
                message,
                line,
                source,
            } => {
                tracing::info!(tab_id = %id, source = %source, line, "Console: {message}");
                EventResponse::Handled
            }
            ViewEvent::CreateWindow { .. } | ViewEvent::TouchIconUrl { .. } => {
                EventResponse::Ignored
            }
        }
    }

    fn persist_favicon(&self, tab: &Tab, url: &str, icon: &Favicon) {
        let original_url = tab.view().and_then(|view| view.original_url());
        if let Err(e) = self
            .caps
            .bookmarks
            .update_favicon(original_url.as_deref(), url, icon)
        {
            tracing::warn!(tab_id = %tab.id(), error = %e, "Failed to store favicon");
        }
    }

    fn on_create_window(
        &self,
        table: &mut TabTable,
        index: usize,
        dialog: bool,
        user_gesture: bool,
    ) -> EventResponse {
        let Some(tab) = table.tab_at_mut(index) else {
            return EventResponse::Ignored;
        };
        if !tab.in_foreground() {
            return EventResponse::Cancel;
        }
        let id = tab.id().clone();

        if let Some(alert) = self.refuse_window(table, index, dialog) {
            self.caps.host.show_alert(&id, alert);
            return EventResponse::Cancel;
        }

        if !user_gesture {
            self.caps.host.confirm_popup(&id, dialog);
            return EventResponse::Deferred;
        }

        match self.create_window_locked(table, &id, dialog) {
            Ok(window) => EventResponse::WindowCreated(window),
            Err(e) => {
                tracing::warn!(tab_id = %id, error = %e, "Failed to open window");
                EventResponse::Cancel
            }
        }
    }

    fn on_touch_icon_url(
        &self,
        table: &mut TabTable,
        index: usize,
        icon_url: String,
        precomposed: bool,
    ) -> EventResponse {
        let generation = table.next_icon_generation();
        let Some(tab) = table.tab_at_mut(index) else {
            return EventResponse::Ignored;
        };
        let tab_id = tab.id().clone();
        let Some(view) = tab.view() else {
            return EventResponse::Ignored;
        };
        let original_url = view.original_url();
        let Some(page_url) = view.url() else {
            return EventResponse::Ignored;
        };

        match self
            .caps
            .bookmarks
            .find_bookmarks_matching(original_url.as_deref(), &page_url)
        {
            Ok(matches) if matches.is_empty() => {
                tracing::debug!(tab_id = %tab_id, "Page is not bookmarked; skipping touch icon");
                return EventResponse::Ignored;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(tab_id = %tab_id, error = %e, "Bookmark lookup failed");
                return EventResponse::Ignored;
            }
        }

        match touch_icon::decide(tab.touch_icon(), precomposed) {
            IconDecision::Drop => {
                tracing::debug!(
                    tab_id = %tab_id,
                    url = %icon_url,
                    "Touch icon fetch already running"
                );
                return EventResponse::Ignored;
            }
            IconDecision::Replace => tab.cancel_touch_icon(),
            IconDecision::Start => {}
        }

        let Some(runtime) = self.runtime() else {
            tracing::warn!(tab_id = %tab_id, "No async runtime; skipping touch icon");
            return EventResponse::Ignored;
        };

        let task = touch_icon::spawn_fetch(
            &runtime,
            Arc::downgrade(&self.table),
            Arc::clone(&self.caps.icons),
            Arc::clone(&self.caps.bookmarks),
            IconRequest {
                tab_id,
                generation,
                icon_url,
                precomposed,
                original_url,
                page_url,
            },
        );
        tab.set_touch_icon(task);
        EventResponse::Handled
    }
}
