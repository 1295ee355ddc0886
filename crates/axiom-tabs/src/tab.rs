//! Tab data structure
//!
//! A tab owns its main content view, an optional subwindow view, the
//! security indicator, the pending error dialogs and the touch-icon handle.
//! Links to the parent and child tabs are held by id and resolved against
//! the tab table.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::TabError;
use crate::error_queue::{ErrorKind, ErrorQueue};
use crate::host::Capabilities;
use crate::security::{LockIcon, LockState};
use crate::snapshot::TabSnapshot;
use crate::state::TabState;
use crate::touch_icon::TouchIconTask;
use crate::view::{ContentView, Favicon, HistoryItem, ViewId, ViewRole};
use crate::{Result, TabId};

/// Cached url/title/favicon used by the tab switcher without a live view.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PickerData {
    pub url: Option<String>,
    pub title: Option<String>,
    pub favicon: Option<Favicon>,
}

impl PickerData {
    pub(crate) fn from_entry(item: Option<HistoryItem>) -> Self {
        let Some(item) = item else {
            return Self::default();
        };
        let title = item
            .title
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| item.url.clone());
        Self {
            url: Some(item.url),
            title: Some(title),
            favicon: item.favicon,
        }
    }
}

pub struct Tab {
    id: TabId,
    state: TabState,
    in_load: bool,
    close_on_exit: bool,
    /// Lets another application find and reuse this tab
    app_id: Option<String>,
    /// URL the tab was opened with
    original_url: Option<String>,
    lock: LockIcon,
    picker: Option<PickerData>,
    saved_state: Option<TabSnapshot>,
    /// Bumped on every fresh snapshot, so a late screenshot write can tell
    /// whether it still belongs to the stored snapshot
    snapshot_epoch: u64,
    main_view: Option<Box<dyn ContentView>>,
    sub_view: Option<Box<dyn ContentView>>,
    parent: Option<TabId>,
    children: Vec<TabId>,
    errors: ErrorQueue,
    touch_icon: Option<TouchIconTask>,
    /// Origin of the geolocation prompt currently shown for this tab
    geolocation_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Tab {
    pub(crate) fn new(close_on_exit: bool, app_id: Option<String>, url: Option<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), close_on_exit, app_id, url)
    }

    fn with_id(
        id: TabId,
        close_on_exit: bool,
        app_id: Option<String>,
        original_url: Option<String>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id,
            state: TabState::Background,
            in_load: false,
            close_on_exit,
            app_id,
            original_url,
            lock: LockIcon::default(),
            picker: None,
            saved_state: None,
            snapshot_epoch: 0,
            main_view: None,
            sub_view: None,
            parent: None,
            children: Vec::new(),
            errors: ErrorQueue::default(),
            touch_icon: None,
            geolocation_prompt: None,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
        }
    }

    /// Recreate a frozen tab from a persisted snapshot, keeping its id.
    pub(crate) fn from_snapshot(id: TabId, snapshot: TabSnapshot) -> Self {
        let mut tab = Self::with_id(
            id,
            snapshot.close_on_exit,
            snapshot.app_id.clone(),
            snapshot.original_url.clone(),
        );
        tab.state = TabState::Frozen;
        tab.lock.restore(snapshot.lock_state);
        tab.saved_state = Some(snapshot);
        tab.populate_picker_data_from_saved_state();
        tab
    }

    pub fn id(&self) -> &TabId {
        &self.id
    }

    pub fn state(&self) -> TabState {
        self.state
    }

    pub fn in_foreground(&self) -> bool {
        self.state.is_foreground()
    }

    /// True between page-started and page-finished.
    pub fn in_load(&self) -> bool {
        self.in_load
    }

    /// Force `in_load` off before the tab is closed.
    pub fn clear_in_load(&mut self) {
        self.in_load = false;
    }

    pub(crate) fn set_in_load(&mut self, in_load: bool) {
        self.in_load = in_load;
    }

    /// Whether the tab closes when the user backs out of its first page.
    pub fn close_on_exit(&self) -> bool {
        self.close_on_exit
    }

    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    pub fn set_app_id(&mut self, app_id: Option<String>) {
        self.app_id = app_id;
        self.touch();
    }

    pub fn original_url(&self) -> Option<&str> {
        self.original_url.as_deref()
    }

    pub fn set_original_url(&mut self, url: Option<String>) {
        self.original_url = url;
        self.touch();
    }

    pub fn parent(&self) -> Option<&TabId> {
        self.parent.as_ref()
    }

    pub fn children(&self) -> &[TabId] {
        &self.children
    }

    pub(crate) fn set_parent_link(&mut self, parent: Option<TabId>, parent_index: Option<usize>) {
        self.parent = parent;
        // A frozen tab keeps its parent as a position in the snapshot
        if let Some(saved) = self.saved_state.as_mut() {
            saved.parent_index = parent_index;
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<TabId> {
        &mut self.children
    }

    // === Security indicator ===

    pub fn lock_state(&self) -> LockState {
        self.lock.state()
    }

    pub fn previous_lock_state(&self) -> LockState {
        self.lock.previous()
    }

    pub fn reset_lock_icon(&mut self, url: &str) {
        self.lock.reset_for(url);
    }

    pub fn revert_lock_icon(&mut self) {
        self.lock.revert();
    }

    pub(crate) fn lock_mut(&mut self) -> &mut LockIcon {
        &mut self.lock
    }

    // === Picker data ===

    /// Valid after `populate_picker_data` and before `clear_picker_data`.
    pub fn url(&self) -> Option<&str> {
        self.picker.as_ref().and_then(|p| p.url.as_deref())
    }

    /// Page title, falling back to the url when the page has none.
    pub fn title(&self) -> Option<&str> {
        self.picker.as_ref().and_then(|p| p.title.as_deref())
    }

    pub fn favicon(&self) -> Option<&Favicon> {
        self.picker.as_ref().and_then(|p| p.favicon.as_ref())
    }

    pub fn picker_data(&self) -> Option<&PickerData> {
        self.picker.as_ref()
    }

    pub fn populate_picker_data(&mut self) {
        match self.main_view.as_ref() {
            Some(view) => self.picker = Some(PickerData::from_entry(view.current_entry())),
            None => self.populate_picker_data_from_saved_state(),
        }
    }

    fn populate_picker_data_from_saved_state(&mut self) {
        if let Some(saved) = self.saved_state.as_ref() {
            self.picker = Some(PickerData {
                url: saved.url.clone(),
                title: saved.title.clone(),
                favicon: None,
            });
        }
    }

    pub(crate) fn set_picker_data(&mut self, picker: Option<PickerData>) {
        self.picker = picker;
    }

    pub fn clear_picker_data(&mut self) {
        self.picker = None;
    }

    // === Saved state ===

    pub fn saved_state(&self) -> Option<&TabSnapshot> {
        self.saved_state.as_ref()
    }

    pub(crate) fn store_snapshot(&mut self, snapshot: TabSnapshot) -> u64 {
        self.saved_state = Some(snapshot);
        self.snapshot_epoch += 1;
        self.snapshot_epoch
    }

    pub(crate) fn take_saved_state(&mut self) -> Option<TabSnapshot> {
        self.saved_state.take()
    }

    /// Record a screenshot written after the snapshot was taken. Fails when
    /// the snapshot was replaced or consumed in the meantime.
    pub(crate) fn attach_picture(&mut self, epoch: u64, path: std::path::PathBuf) -> bool {
        match self.saved_state.as_mut() {
            Some(saved) if self.snapshot_epoch == epoch => {
                saved.picture_file_path = Some(path);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn restore_static_fields(&mut self, snapshot: &TabSnapshot) {
        self.close_on_exit = snapshot.close_on_exit;
        self.app_id = snapshot.app_id.clone();
        self.original_url = snapshot.original_url.clone();
        self.lock.restore(snapshot.lock_state);
    }

    // === Views ===

    pub fn has_view(&self) -> bool {
        self.main_view.is_some()
    }

    pub fn view_id(&self) -> Option<ViewId> {
        self.main_view.as_ref().map(|view| view.id())
    }

    pub fn sub_view_id(&self) -> Option<ViewId> {
        self.sub_view.as_ref().map(|view| view.id())
    }

    pub fn has_sub_window(&self) -> bool {
        self.sub_view.is_some()
    }

    /// The subwindow if there is one, otherwise the main view.
    pub fn top_view_id(&self) -> Option<ViewId> {
        self.sub_view_id().or_else(|| self.view_id())
    }

    pub(crate) fn view(&self) -> Option<&dyn ContentView> {
        self.main_view.as_deref()
    }

    pub(crate) fn view_mut(&mut self) -> Option<&mut (dyn ContentView + 'static)> {
        self.main_view.as_deref_mut()
    }

    pub(crate) fn role_of(&self, view: ViewId) -> Option<ViewRole> {
        if self.view_id() == Some(view) {
            Some(ViewRole::Main)
        } else if self.sub_view_id() == Some(view) {
            Some(ViewRole::Sub)
        } else {
            None
        }
    }

    /// Swap the main view, returning the detached old one.
    ///
    /// Any geolocation prompt belongs to the old page and is hidden. Engine
    /// events are routed by view id, so events from the old view stop
    /// reaching this tab as soon as it is detached.
    pub(crate) fn set_view(
        &mut self,
        view: Option<Box<dyn ContentView>>,
        caps: &Capabilities,
    ) -> Option<Box<dyn ContentView>> {
        if self.view_id().is_some() && self.view_id() == view.as_ref().map(|v| v.id()) {
            return None;
        }
        self.hide_geolocation_prompt(caps);
        std::mem::replace(&mut self.main_view, view)
    }

    pub(crate) fn create_sub_window(&mut self, caps: &Capabilities) -> Option<ViewId> {
        if self.sub_view.is_some() {
            return None;
        }
        let view = caps.views.create_view(ViewRole::Sub);
        let id = view.id();
        caps.settings.register(id);
        self.sub_view = Some(view);
        tracing::debug!(tab_id = %self.id, view_id = id, "Created subwindow");
        Some(id)
    }

    pub(crate) fn dismiss_sub_window(&mut self, caps: &Capabilities) {
        if let Some(mut view) = self.sub_view.take() {
            caps.settings.unregister(view.id());
            view.destroy();
            caps.host.dismiss_sub_window(&self.id);
            tracing::debug!(tab_id = %self.id, view_id = view.id(), "Dismissed subwindow");
        }
    }

    /// Release the main view and the subwindow. Used by freeze and destroy.
    pub(crate) fn release_views(&mut self, caps: &Capabilities) {
        self.dismiss_sub_window(caps);
        if let Some(mut view) = self.set_view(None, caps) {
            caps.settings.unregister(view.id());
            view.destroy();
        }
        self.in_load = false;
    }

    // === Visibility ===

    pub(crate) fn transition_to(&mut self, new_state: TabState) -> Result<()> {
        if !self.state.can_transition_to(new_state) {
            return Err(TabError::InvalidTransition {
                from: self.state.to_string(),
                to: new_state.to_string(),
            });
        }

        tracing::debug!(
            tab_id = %self.id,
            from = %self.state,
            to = %new_state,
            "Tab state transition"
        );

        self.state = new_state;
        self.touch();

        if new_state == TabState::Active {
            self.last_accessed_at = Utc::now();
        }

        Ok(())
    }

    pub(crate) fn resume(&mut self) {
        if let Some(view) = self.main_view.as_mut() {
            view.resume();
            if let Some(sub) = self.sub_view.as_mut() {
                sub.resume();
            }
        }
    }

    pub(crate) fn pause(&mut self) {
        if let Some(view) = self.main_view.as_mut() {
            view.pause();
            if let Some(sub) = self.sub_view.as_mut() {
                sub.pause();
            }
        }
    }

    pub(crate) fn put_in_foreground(&mut self, caps: &Capabilities) -> Result<()> {
        if self.state == TabState::Active {
            return Ok(());
        }
        self.transition_to(TabState::Active)?;
        self.resume();
        self.set_context_menus(true);

        if let Some(error) = self.errors.head() {
            caps.host.show_error_dialog(&self.id, error);
        }
        Ok(())
    }

    pub(crate) fn put_in_background(&mut self) -> Result<()> {
        if self.state == TabState::Background {
            return Ok(());
        }
        self.transition_to(TabState::Background)?;
        self.pause();
        self.set_context_menus(false);
        Ok(())
    }

    fn set_context_menus(&mut self, enabled: bool) {
        if let Some(view) = self.main_view.as_mut() {
            view.set_context_menu_enabled(enabled);
        }
        if let Some(sub) = self.sub_view.as_mut() {
            sub.set_context_menu_enabled(enabled);
        }
    }

    /// Tear the tab down. Safe to call more than once.
    pub(crate) fn destroy(&mut self, caps: &Capabilities) {
        if self.state == TabState::Destroyed {
            return;
        }
        self.cancel_touch_icon();
        self.release_views(caps);
        self.errors.clear();
        self.state = TabState::Destroyed;
        self.touch();
    }

    // === Errors ===

    pub fn pending_errors(&self) -> &ErrorQueue {
        &self.errors
    }

    /// Queue a navigation error dialog.
    pub(crate) fn report_error(&mut self, kind: ErrorKind, description: &str, caps: &Capabilities) {
        let in_foreground = self.in_foreground();
        if let Some(error) = self.errors.push(kind, description, in_foreground) {
            caps.host.show_error_dialog(&self.id, error);
        }
        if in_foreground {
            self.lock.revert();
            caps.host.reset_title_and_revert_lock_icon(&self.id);
        }
    }

    pub(crate) fn dismiss_error(&mut self, caps: &Capabilities) {
        let in_foreground = self.in_foreground();
        if let Some(next) = self.errors.dismiss_current(in_foreground) {
            caps.host.show_error_dialog(&self.id, next);
        }
    }

    // === Touch icon ===

    pub fn touch_icon(&self) -> Option<&TouchIconTask> {
        self.touch_icon.as_ref()
    }

    pub(crate) fn set_touch_icon(&mut self, task: TouchIconTask) {
        self.touch_icon = Some(task);
    }

    pub(crate) fn cancel_touch_icon(&mut self) {
        if let Some(task) = self.touch_icon.take() {
            task.cancel();
        }
    }

    /// Forget the running fetch without cancelling it.
    pub(crate) fn detach_touch_icon(&mut self) {
        self.touch_icon = None;
    }

    pub(crate) fn finish_touch_icon(&mut self, generation: u64) {
        if self
            .touch_icon
            .as_ref()
            .is_some_and(|task| task.generation() == generation)
        {
            self.touch_icon = None;
        }
    }

    // === Geolocation ===

    pub fn geolocation_prompt(&self) -> Option<&str> {
        self.geolocation_prompt.as_deref()
    }

    pub(crate) fn show_geolocation_prompt(&mut self, origin: &str, caps: &Capabilities) {
        self.geolocation_prompt = Some(origin.to_string());
        caps.host.show_geolocation_prompt(&self.id, origin);
    }

    pub(crate) fn hide_geolocation_prompt(&mut self, caps: &Capabilities) {
        if self.geolocation_prompt.take().is_some() {
            caps.host.hide_geolocation_prompt(&self.id);
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl std::fmt::Debug for Tab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tab")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("view", &self.view_id())
            .field("sub_view", &self.sub_view_id())
            .field("parent", &self.parent)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
