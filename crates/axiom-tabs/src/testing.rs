//! In-memory collaborators for unit tests

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::control::{TabControl, TabPolicy};
use crate::error_queue::{ErrorKind, QueuedError};
use crate::event::SslErrors;
use crate::host::{Alert, BookmarkStore, Capabilities, CookieSync, Host, SettingsRegistry};
use crate::snapshot::TabSnapshot;
use crate::touch_icon::TouchIconFetcher;
use crate::view::{
    ContentView, Favicon, HistoryBlob, HistoryItem, ViewFactory, ViewId, ViewRole,
};
use crate::TabId;

pub(crate) struct Fixture {
    pub host: Arc<RecordingHost>,
    pub views: Arc<FakeViews>,
    pub bookmarks: Arc<FakeBookmarks>,
    pub settings: Arc<FakeSettings>,
    pub cookies: Arc<FakeCookies>,
    pub icons: Arc<GatedFetcher>,
    thumbnails: Arc<tempfile::TempDir>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_thumbnails(Arc::new(tempfile::tempdir().unwrap()))
    }

    /// Fresh collaborators over the same thumbnail directory, as after a
    /// process restart.
    pub fn sharing_disk(other: &Fixture) -> Self {
        Self::with_thumbnails(Arc::clone(&other.thumbnails))
    }

    fn with_thumbnails(thumbnails: Arc<tempfile::TempDir>) -> Self {
        Self {
            host: Arc::new(RecordingHost::default()),
            views: Arc::new(FakeViews::default()),
            bookmarks: Arc::new(FakeBookmarks::default()),
            settings: Arc::new(FakeSettings::default()),
            cookies: Arc::new(FakeCookies::default()),
            icons: Arc::new(GatedFetcher::default()),
            thumbnails,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            host: self.host.clone(),
            views: self.views.clone(),
            bookmarks: self.bookmarks.clone(),
            settings: self.settings.clone(),
            cookies: self.cookies.clone(),
            icons: self.icons.clone(),
        }
    }

    pub fn control(&self) -> TabControl {
        self.control_with(|_| {})
    }

    pub fn control_with(&self, configure: impl FnOnce(&mut TabPolicy)) -> TabControl {
        let mut policy = TabPolicy::new(self.thumbnails.path().join("thumbnails"));
        configure(&mut policy);
        TabControl::new(self.capabilities(), policy)
    }
}

pub(crate) fn snapshot(url: &str) -> TabSnapshot {
    TabSnapshot {
        history: Some(HistoryBlob(serde_json::json!({ "entries": [url], "index": 0 }))),
        picture_file_path: None,
        url: Some(url.to_string()),
        title: Some(url.to_string()),
        close_on_exit: false,
        app_id: None,
        original_url: Some(url.to_string()),
        parent_index: None,
        lock_state: Default::default(),
        saved_at: chrono::Utc::now(),
    }
}

// === Views ===

#[derive(Debug, Clone, Default)]
pub(crate) struct ViewRecord {
    pub url: Option<String>,
    pub original_url: Option<String>,
    pub title: Option<String>,
    pub resumed: usize,
    pub paused: usize,
    pub destroyed: usize,
    pub context_menu: bool,
    pub network_available: bool,
    pub reject_history: bool,
    pub credentials: Option<(String, String)>,
    pub picture: Option<Vec<u8>>,
    /// Back/forward list, oldest first
    pub entries: Vec<String>,
    pub index: usize,
}

impl ViewRecord {
    fn visit(&mut self, url: &str) {
        if !self.entries.is_empty() {
            self.entries.truncate(self.index + 1);
        }
        self.entries.push(url.to_string());
        self.index = self.entries.len() - 1;
        self.url = Some(url.to_string());
        self.original_url = Some(url.to_string());
    }

    fn step(&mut self, delta: isize) -> bool {
        let Some(target) = self.index.checked_add_signed(delta) else {
            return false;
        };
        let Some(url) = self.entries.get(target).cloned() else {
            return false;
        };
        self.index = target;
        self.original_url = Some(url.clone());
        self.url = Some(url);
        true
    }
}

#[derive(Default)]
struct ViewsState {
    next_id: ViewId,
    records: HashMap<ViewId, ViewRecord>,
    reject_next: bool,
}

#[derive(Default)]
pub(crate) struct FakeViews {
    state: Arc<Mutex<ViewsState>>,
}

impl FakeViews {
    pub fn view(&self, id: ViewId) -> ViewRecord {
        self.state.lock().records.get(&id).cloned().unwrap_or_default()
    }

    pub fn reject_history(&self, id: ViewId) {
        self.update(id, |record| record.reject_history = true);
    }

    /// The next main view refuses to restore history.
    pub fn reject_next_history(&self) {
        self.state.lock().reject_next = true;
    }

    pub fn set_credentials(&self, id: ViewId, username: &str, password: &str) {
        self.update(id, |record| {
            record.credentials = Some((username.to_string(), password.to_string()))
        });
    }

    pub fn navigate(&self, id: ViewId, url: &str) {
        self.update(id, |record| record.visit(url));
    }

    pub fn go_back(&self, id: ViewId) -> bool {
        self.update(id, |record| record.step(-1)).unwrap_or(false)
    }

    pub fn go_forward(&self, id: ViewId) -> bool {
        self.update(id, |record| record.step(1)).unwrap_or(false)
    }

    fn update<R>(&self, id: ViewId, f: impl FnOnce(&mut ViewRecord) -> R) -> Option<R> {
        self.state.lock().records.get_mut(&id).map(f)
    }
}

impl ViewFactory for FakeViews {
    fn create_view(&self, role: ViewRole) -> Box<dyn ContentView> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        let mut record = ViewRecord::default();
        if role == ViewRole::Main && state.reject_next {
            record.reject_history = true;
            state.reject_next = false;
        }
        state.records.insert(id, record);
        Box::new(FakeView {
            id,
            state: Arc::clone(&self.state),
        })
    }
}

struct FakeView {
    id: ViewId,
    state: Arc<Mutex<ViewsState>>,
}

impl FakeView {
    fn with<R>(&self, f: impl FnOnce(&mut ViewRecord) -> R) -> R {
        let mut state = self.state.lock();
        let record = state.records.entry(self.id).or_default();
        f(record)
    }
}

impl ContentView for FakeView {
    fn id(&self) -> ViewId {
        self.id
    }

    fn load_url(&mut self, url: &str) {
        self.with(|record| record.visit(url));
    }

    fn url(&self) -> Option<String> {
        self.with(|record| record.url.clone())
    }

    fn original_url(&self) -> Option<String> {
        self.with(|record| record.original_url.clone())
    }

    fn resume(&mut self) {
        self.with(|record| record.resumed += 1);
    }

    fn pause(&mut self) {
        self.with(|record| record.paused += 1);
    }

    fn destroy(&mut self) {
        self.with(|record| record.destroyed += 1);
    }

    fn set_context_menu_enabled(&mut self, enabled: bool) {
        self.with(|record| record.context_menu = enabled);
    }

    fn set_network_available(&mut self, available: bool) {
        self.with(|record| record.network_available = available);
    }

    fn current_entry(&self) -> Option<HistoryItem> {
        self.with(|record| {
            record.url.clone().map(|url| HistoryItem {
                url,
                title: record.title.clone(),
                favicon: None,
            })
        })
    }

    fn save_history(&self) -> Option<HistoryBlob> {
        self.with(|record| {
            if record.entries.is_empty() {
                return None;
            }
            Some(HistoryBlob(serde_json::json!({
                "entries": record.entries,
                "index": record.index,
                "original_url": record.original_url,
            })))
        })
    }

    fn restore_history(&mut self, history: &HistoryBlob) -> anyhow::Result<()> {
        self.with(|record| {
            if record.reject_history {
                anyhow::bail!("corrupt back/forward list");
            }
            let entries: Vec<String> = serde_json::from_value(history.0["entries"].clone())?;
            let index = history.0["index"].as_u64().unwrap_or(0) as usize;
            let url = entries
                .get(index)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("history index out of range"))?;
            record.original_url = history.0["original_url"]
                .as_str()
                .map(str::to_string)
                .or_else(|| Some(url.clone()));
            record.url = Some(url);
            record.entries = entries;
            record.index = index;
            Ok(())
        })
    }

    fn capture_picture(&self) -> Option<Vec<u8>> {
        self.with(|record| record.url.as_ref().map(|url| url.as_bytes().to_vec()))
    }

    fn restore_picture(&mut self, picture: &[u8]) -> anyhow::Result<()> {
        self.with(|record| record.picture = Some(picture.to_vec()));
        Ok(())
    }

    fn http_auth_credentials(&self, _host: &str, _realm: &str) -> Option<(String, String)> {
        self.with(|record| record.credentials.clone())
    }
}

// === Host ===

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HostCall {
    ErrorDialog(TabId, ErrorKind),
    ResetTitle(TabId),
    PageStarted(TabId, String),
    PageFinished(TabId),
    Progress(TabId, u8),
    SetUrlTitle(TabId, String),
    SetFavicon(TabId),
    Alert(TabId, Alert),
    ConfirmPopup(TabId, bool),
    SslWarning(TabId),
    HttpAuth(TabId),
    ConfirmRedirect(TabId),
    ConfirmFormResubmission(TabId),
    ShowGeolocation(TabId, String),
    HideGeolocation(TabId),
    AttachSubWindow(TabId),
    DismissSubWindow(TabId),
    SwitchTo(TabId),
    CloseTab(TabId),
    ScheduleThumbnail(TabId),
    CancelThumbnail(TabId),
}

#[derive(Default)]
pub(crate) struct RecordingHost {
    calls: Mutex<Vec<HostCall>>,
    user_stopped_loading: AtomicBool,
}

impl RecordingHost {
    fn record(&self, call: HostCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    pub fn count(&self, predicate: impl Fn(&HostCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    pub fn error_dialogs(&self) -> Vec<(TabId, ErrorKind)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::ErrorDialog(tab, kind) => Some((tab, kind)),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                HostCall::Alert(_, alert) => Some(alert),
                _ => None,
            })
            .collect()
    }

    pub fn set_user_stopped_loading(&self, stopped: bool) {
        self.user_stopped_loading.store(stopped, Ordering::SeqCst);
    }
}

impl Host for RecordingHost {
    fn show_error_dialog(&self, tab: &TabId, error: &QueuedError) {
        self.record(HostCall::ErrorDialog(tab.clone(), error.kind));
    }

    fn reset_title_and_revert_lock_icon(&self, tab: &TabId) {
        self.record(HostCall::ResetTitle(tab.clone()));
    }

    fn on_page_started(&self, tab: &TabId, url: &str, _favicon: Option<&Favicon>) {
        self.record(HostCall::PageStarted(tab.clone(), url.to_string()));
    }

    fn on_page_finished(&self, tab: &TabId, _url: &str) {
        self.record(HostCall::PageFinished(tab.clone()));
    }

    fn on_progress_changed(&self, tab: &TabId, progress: u8) {
        self.record(HostCall::Progress(tab.clone(), progress));
    }

    fn set_url_title(&self, tab: &TabId, _url: Option<&str>, title: &str) {
        self.record(HostCall::SetUrlTitle(tab.clone(), title.to_string()));
    }

    fn set_favicon(&self, tab: &TabId, _icon: Option<&Favicon>) {
        self.record(HostCall::SetFavicon(tab.clone()));
    }

    fn show_alert(&self, tab: &TabId, alert: Alert) {
        self.record(HostCall::Alert(tab.clone(), alert));
    }

    fn confirm_popup(&self, tab: &TabId, dialog: bool) {
        self.record(HostCall::ConfirmPopup(tab.clone(), dialog));
    }

    fn show_ssl_warning(&self, tab: &TabId, _errors: SslErrors) {
        self.record(HostCall::SslWarning(tab.clone()));
    }

    fn show_http_auth(&self, tab: &TabId, _host: &str, _realm: &str) {
        self.record(HostCall::HttpAuth(tab.clone()));
    }

    fn confirm_redirect(&self, tab: &TabId) {
        self.record(HostCall::ConfirmRedirect(tab.clone()));
    }

    fn confirm_form_resubmission(&self, tab: &TabId) {
        self.record(HostCall::ConfirmFormResubmission(tab.clone()));
    }

    fn show_geolocation_prompt(&self, tab: &TabId, origin: &str) {
        self.record(HostCall::ShowGeolocation(tab.clone(), origin.to_string()));
    }

    fn hide_geolocation_prompt(&self, tab: &TabId) {
        self.record(HostCall::HideGeolocation(tab.clone()));
    }

    fn attach_sub_window(&self, tab: &TabId) {
        self.record(HostCall::AttachSubWindow(tab.clone()));
    }

    fn dismiss_sub_window(&self, tab: &TabId) {
        self.record(HostCall::DismissSubWindow(tab.clone()));
    }

    fn switch_to_tab(&self, tab: &TabId) {
        self.record(HostCall::SwitchTo(tab.clone()));
    }

    fn close_tab(&self, tab: &TabId) {
        self.record(HostCall::CloseTab(tab.clone()));
    }

    fn schedule_thumbnail_update(&self, tab: &TabId) {
        self.record(HostCall::ScheduleThumbnail(tab.clone()));
    }

    fn cancel_thumbnail_update(&self, tab: &TabId) {
        self.record(HostCall::CancelThumbnail(tab.clone()));
    }

    fn did_user_stop_loading(&self) -> bool {
        self.user_stopped_loading.load(Ordering::SeqCst)
    }
}

// === Bookmarks ===

#[derive(Default)]
struct BookmarkState {
    bookmarked: Vec<String>,
    visits: Vec<String>,
    titles: Vec<(String, String)>,
    favicons: usize,
    touch_icons: Vec<(String, Vec<u8>)>,
}

#[derive(Default)]
pub(crate) struct FakeBookmarks {
    state: Mutex<BookmarkState>,
}

impl FakeBookmarks {
    pub fn add_bookmark(&self, url: &str) {
        self.state.lock().bookmarked.push(url.to_string());
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().visits.clone()
    }

    pub fn titles(&self) -> Vec<(String, String)> {
        self.state.lock().titles.clone()
    }

    pub fn favicons(&self) -> usize {
        self.state.lock().favicons
    }

    pub fn touch_icons(&self) -> Vec<(String, Vec<u8>)> {
        self.state.lock().touch_icons.clone()
    }

    /// Wait until at least `count` touch icons were stored.
    pub async fn wait_for_touch_icons(&self, count: usize) -> Vec<(String, Vec<u8>)> {
        for _ in 0..500 {
            if self.state.lock().touch_icons.len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // Give a cancelled fetch the chance to misbehave
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.touch_icons()
    }
}

impl BookmarkStore for FakeBookmarks {
    fn update_favicon(
        &self,
        _original_url: Option<&str>,
        _url: &str,
        _icon: &Favicon,
    ) -> anyhow::Result<()> {
        self.state.lock().favicons += 1;
        Ok(())
    }

    fn record_visit(&self, url: &str, _is_reload: bool) -> anyhow::Result<()> {
        self.state.lock().visits.push(url.to_string());
        Ok(())
    }

    fn find_bookmarks_matching(
        &self,
        original_url: Option<&str>,
        url: &str,
    ) -> anyhow::Result<Vec<i64>> {
        let state = self.state.lock();
        Ok(state
            .bookmarked
            .iter()
            .enumerate()
            .filter(|(_, bookmark)| {
                bookmark.as_str() == url || Some(bookmark.as_str()) == original_url
            })
            .map(|(index, _)| index as i64)
            .collect())
    }

    fn store_touch_icon(
        &self,
        _original_url: Option<&str>,
        url: &str,
        icon: &[u8],
    ) -> anyhow::Result<()> {
        self.state.lock().touch_icons.push((url.to_string(), icon.to_vec()));
        Ok(())
    }

    fn update_history_title(&self, url_suffix: &str, title: &str) -> anyhow::Result<()> {
        self.state
            .lock()
            .titles
            .push((url_suffix.to_string(), title.to_string()));
        Ok(())
    }
}

// === Settings and cookies ===

pub(crate) struct FakeSettings {
    registered: Mutex<HashSet<ViewId>>,
    unregister_calls: AtomicUsize,
    mismatched: AtomicUsize,
    show_security_warnings: AtomicBool,
}

impl Default for FakeSettings {
    fn default() -> Self {
        Self {
            registered: Mutex::new(HashSet::new()),
            unregister_calls: AtomicUsize::new(0),
            mismatched: AtomicUsize::new(0),
            show_security_warnings: AtomicBool::new(true),
        }
    }
}

impl FakeSettings {
    pub fn registered_count(&self) -> usize {
        self.registered.lock().len()
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    /// Double registrations plus unregistrations of unknown views.
    pub fn mismatched(&self) -> usize {
        self.mismatched.load(Ordering::SeqCst)
    }

    pub fn set_show_security_warnings(&self, show: bool) {
        self.show_security_warnings.store(show, Ordering::SeqCst);
    }
}

impl SettingsRegistry for FakeSettings {
    fn register(&self, view: ViewId) {
        if !self.registered.lock().insert(view) {
            self.mismatched.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn unregister(&self, view: ViewId) {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        if !self.registered.lock().remove(&view) {
            self.mismatched.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn show_security_warnings(&self) -> bool {
        self.show_security_warnings.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub(crate) struct FakeCookies {
    resets: AtomicUsize,
    syncs: AtomicUsize,
}

impl FakeCookies {
    /// `(reset_sync calls, sync calls)`
    pub fn syncs(&self) -> (usize, usize) {
        (
            self.resets.load(Ordering::SeqCst),
            self.syncs.load(Ordering::SeqCst),
        )
    }
}

impl CookieSync for FakeCookies {
    fn reset_sync(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
    }

    fn sync(&self) {
        self.syncs.fetch_add(1, Ordering::SeqCst);
    }
}

// === Touch icons ===

/// Fetcher whose downloads complete only when the test says so.
#[derive(Default)]
pub(crate) struct GatedFetcher {
    started: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, oneshot::Sender<Vec<u8>>>>,
}

impl GatedFetcher {
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn complete(&self, url: &str, bytes: Vec<u8>) {
        if let Some(gate) = self.gates.lock().remove(url) {
            let _ = gate.send(bytes);
        }
    }
}

impl TouchIconFetcher for GatedFetcher {
    fn fetch(&self, url: &str) -> BoxFuture<'static, anyhow::Result<Vec<u8>>> {
        let (tx, rx) = oneshot::channel();
        self.started.lock().push(url.to_string());
        self.gates.lock().insert(url.to_string(), tx);
        async move { rx.await.map_err(|_| anyhow::anyhow!("fetch abandoned")) }.boxed()
    }
}
