//! Tab Control
//!
//! Owns the ordered tab table and serializes every lifecycle operation,
//! tree change and engine event behind one lock. Disk I/O for screenshots
//! happens with the lock released.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

use crate::error::TabError;
use crate::error_queue::ErrorPolicy;
use crate::event::CreatedWindow;
use crate::host::{Alert, Capabilities};
use crate::snapshot::{self, PendingPicture, RestoreOutcome, TabSnapshot};
use crate::state::TabState;
use crate::tab::{PickerData, Tab};
use crate::thumbnails::ThumbnailDir;
use crate::view::{ViewId, ViewRole};
use crate::{Result, TabId};

/// Default cap on open tabs
pub const DEFAULT_MAX_TABS: usize = 16;

#[derive(Debug, Clone)]
pub struct TabPolicy {
    pub max_tabs: usize,
    pub errors: ErrorPolicy,
    pub thumbnails: ThumbnailDir,
}

impl TabPolicy {
    pub fn new(thumbnail_dir: impl Into<PathBuf>) -> Self {
        Self {
            max_tabs: DEFAULT_MAX_TABS,
            errors: ErrorPolicy::default(),
            thumbnails: ThumbnailDir::new(thumbnail_dir),
        }
    }
}

/// The ordered tab table. Positions are the tab-strip order and are also
/// what snapshots use to refer to a parent tab.
#[derive(Debug, Default)]
pub struct TabTable {
    tabs: Vec<Tab>,
    current: Option<TabId>,
    icon_generation: u64,
}

impl TabTable {
    pub(crate) fn get(&self, id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id() == id)
    }

    pub(crate) fn get_mut(&mut self, id: &TabId) -> Option<&mut Tab> {
        self.tabs.iter_mut().find(|tab| tab.id() == id)
    }

    pub(crate) fn index_of(&self, id: &TabId) -> Option<usize> {
        self.tabs.iter().position(|tab| tab.id() == id)
    }

    /// Tab owning `view`, and which of its views it is.
    pub(crate) fn find_view(&self, view: ViewId) -> Option<(usize, ViewRole)> {
        self.tabs
            .iter()
            .enumerate()
            .find_map(|(index, tab)| tab.role_of(view).map(|role| (index, role)))
    }

    pub(crate) fn tab_at_mut(&mut self, index: usize) -> Option<&mut Tab> {
        self.tabs.get_mut(index)
    }

    pub(crate) fn next_icon_generation(&mut self) -> u64 {
        self.icon_generation += 1;
        self.icon_generation
    }

    fn parent_index(&self, tab: &Tab) -> Option<usize> {
        tab.parent().and_then(|parent| self.index_of(parent))
    }

    /// True if `ancestor` is on the parent chain of `tab`.
    fn is_ancestor(&self, ancestor: &TabId, tab: &TabId) -> bool {
        let mut cursor = self.get(tab).and_then(|t| t.parent().cloned());
        let mut steps = 0;
        while let Some(id) = cursor {
            if &id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.tabs.len() {
                return false;
            }
            cursor = self.get(&id).and_then(|t| t.parent().cloned());
        }
        false
    }

    fn add_child(&mut self, parent: &TabId, child: &TabId) -> bool {
        if parent == child {
            return false;
        }
        let (Some(parent_index), Some(child_index)) = (self.index_of(parent), self.index_of(child))
        else {
            return false;
        };
        if let Some(existing) = self.tabs[child_index].parent() {
            if existing != parent {
                tracing::debug!(
                    child = %child,
                    parent = %existing,
                    "Tab already has a parent; ignoring add_child"
                );
                return false;
            }
        }
        if self.is_ancestor(child, parent) {
            return false;
        }

        self.tabs[child_index].set_parent_link(Some(parent.clone()), Some(parent_index));
        let children = self.tabs[parent_index].children_mut();
        if !children.contains(child) {
            children.push(child.clone());
        }
        true
    }

    fn unlink_from_parent(&mut self, id: &TabId) {
        let Some(parent) = self.get(id).and_then(|tab| tab.parent().cloned()) else {
            return;
        };
        if let Some(parent) = self.get_mut(&parent) {
            parent.children_mut().retain(|child| child != id);
        }
        if let Some(tab) = self.get_mut(id) {
            tab.set_parent_link(None, None);
        }
    }

    fn detach(&mut self, id: &TabId) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        let children = std::mem::take(self.tabs[index].children_mut());
        for child in &children {
            if let Some(child) = self.get_mut(child) {
                child.set_parent_link(None, None);
            }
        }
        self.unlink_from_parent(id);
    }

    /// Recompute snapshot parent positions after the table was reordered.
    fn refresh_parent_indices(&mut self) {
        let indices: Vec<Option<usize>> =
            self.tabs.iter().map(|tab| self.parent_index(tab)).collect();
        for (tab, index) in self.tabs.iter_mut().zip(indices) {
            let parent = tab.parent().cloned();
            tab.set_parent_link(parent, index);
        }
    }

    fn remove(&mut self, id: &TabId) -> Option<Tab> {
        let index = self.index_of(id)?;
        let tab = self.tabs.remove(index);
        if self.current.as_ref() == Some(id) {
            self.current = None;
        }
        self.refresh_parent_indices();
        Some(tab)
    }
}

pub struct TabControl {
    pub(crate) table: Arc<Mutex<TabTable>>,
    pub(crate) caps: Capabilities,
    pub(crate) policy: Arc<TabPolicy>,
    runtime: Option<Handle>,
}

impl TabControl {
    /// Picks up the ambient tokio runtime if there is one; touch-icon
    /// fetches and screenshot cleanup need it.
    pub fn new(caps: Capabilities, policy: TabPolicy) -> Self {
        Self {
            table: Arc::new(Mutex::new(TabTable::default())),
            caps,
            policy: Arc::new(policy),
            runtime: Handle::try_current().ok(),
        }
    }

    pub fn policy(&self) -> &TabPolicy {
        &self.policy
    }

    pub(crate) fn runtime(&self) -> Option<Handle> {
        self.runtime.clone().or_else(|| Handle::try_current().ok())
    }

    // === Tab table ===

    /// Open a new background tab with a fresh view.
    pub fn open_tab(
        &self,
        url: Option<&str>,
        close_on_exit: bool,
        app_id: Option<String>,
    ) -> Result<TabId> {
        let mut table = self.table.lock();
        self.open_tab_locked(&mut table, url, close_on_exit, app_id)
    }

    fn open_tab_locked(
        &self,
        table: &mut TabTable,
        url: Option<&str>,
        close_on_exit: bool,
        app_id: Option<String>,
    ) -> Result<TabId> {
        if table.tabs.len() >= self.policy.max_tabs {
            return Err(TabError::TooManyTabs(self.policy.max_tabs));
        }

        let mut view = self.caps.views.create_view(ViewRole::Main);
        self.caps.settings.register(view.id());
        view.set_network_available(self.caps.host.is_network_up());
        if let Some(url) = url {
            view.load_url(url);
        }

        let mut tab = Tab::new(close_on_exit, app_id, url.map(str::to_string));
        tab.set_view(Some(view), &self.caps);
        let id = tab.id().clone();
        table.tabs.push(tab);

        tracing::info!(tab_id = %id, url = ?url, "Opened tab");
        Ok(id)
    }

    /// Destroy a tab and drop it from the table. Closing an unknown or
    /// already closed tab is a no-op.
    pub fn close_tab(&self, id: &TabId) -> bool {
        let picture = {
            let mut table = self.table.lock();
            if table.index_of(id).is_none() {
                return false;
            }
            table.detach(id);
            let Some(mut tab) = table.remove(id) else {
                return false;
            };
            tab.clear_in_load();
            tab.destroy(&self.caps);
            tab.saved_state()
                .and_then(|saved| saved.picture_file_path.clone())
        };

        if let (Some(path), Some(runtime)) = (picture, self.runtime()) {
            let thumbnails = self.policy.thumbnails.clone();
            runtime.spawn(async move {
                if let Err(e) = thumbnails.remove(path).await {
                    tracing::warn!(error = %e, "Failed to remove tab picture");
                }
            });
        }

        tracing::info!(tab_id = %id, "Closed tab");
        true
    }

    pub fn tab_count(&self) -> usize {
        self.table.lock().tabs.len()
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        self.table.lock().tabs.iter().map(|tab| tab.id().clone()).collect()
    }

    pub fn can_create_new_tab(&self) -> bool {
        self.tab_count() < self.policy.max_tabs
    }

    pub fn tab_index_of(&self, id: &TabId) -> Option<usize> {
        self.table.lock().index_of(id)
    }

    pub fn tab_at(&self, index: usize) -> Option<TabId> {
        self.table.lock().tabs.get(index).map(|tab| tab.id().clone())
    }

    pub fn current_tab(&self) -> Option<TabId> {
        self.table.lock().current.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        let table = self.table.lock();
        table.current.as_ref().and_then(|id| table.index_of(id))
    }

    /// Run `f` against a tab while the table is locked.
    pub fn with_tab<R>(&self, id: &TabId, f: impl FnOnce(&Tab) -> R) -> Option<R> {
        self.table.lock().get(id).map(f)
    }

    pub fn state_of(&self, id: &TabId) -> Option<TabState> {
        self.with_tab(id, Tab::state)
    }

    /// Refresh and return the tab switcher data for a tab.
    pub fn populate_picker_data(&self, id: &TabId) -> Result<PickerData> {
        self.with_tab_mut(id, |tab| {
            tab.populate_picker_data();
            Ok(tab.picker_data().cloned().unwrap_or_default())
        })
    }

    pub fn clear_picker_data(&self, id: &TabId) {
        if let Some(tab) = self.table.lock().get_mut(id) {
            tab.clear_picker_data();
        }
    }

    pub(crate) fn with_tab_mut<R>(
        &self,
        id: &TabId,
        f: impl FnOnce(&mut Tab) -> Result<R>,
    ) -> Result<R> {
        let mut table = self.table.lock();
        let tab = table
            .get_mut(id)
            .ok_or_else(|| TabError::NotFound(id.clone()))?;
        f(tab)
    }

    /// Tabs to freeze under memory pressure: live tabs other than the
    /// current tab and its parent, least recently accessed first, at most
    /// half of the live tabs.
    pub fn least_used_tabs(&self) -> Vec<TabId> {
        let table = self.table.lock();
        let Some(current) = table.current.as_ref().and_then(|id| table.get(id)) else {
            return Vec::new();
        };
        let current_parent = current.parent();

        let live: Vec<&Tab> = table.tabs.iter().filter(|tab| tab.has_view()).collect();
        let mut candidates: Vec<&Tab> = live
            .iter()
            .copied()
            .filter(|tab| tab.id() != current.id() && Some(tab.id()) != current_parent)
            .collect();
        candidates.sort_by_key(|tab| tab.last_accessed_at);
        candidates.truncate(live.len() / 2);
        candidates.into_iter().map(|tab| tab.id().clone()).collect()
    }

    /// Load `url` into the tab's main view.
    pub fn load_url(&self, id: &TabId, url: &str) -> Result<()> {
        self.with_tab_mut(id, |tab| {
            let view = tab.view_mut().ok_or_else(|| TabError::NoView(id.clone()))?;
            view.load_url(url);
            Ok(())
        })
    }

    // === Ownership tree ===

    /// Make `child` a child of `parent`. Ignored when the child already has
    /// another parent or the link would form a cycle.
    pub fn add_child(&self, parent: &TabId, child: &TabId) -> bool {
        self.table.lock().add_child(parent, child)
    }

    /// Remove a tab from the tree. Its children become roots and stay open.
    pub fn detach(&self, id: &TabId) {
        self.table.lock().detach(id);
    }

    /// Link a tab under `parent`, or unlink it when `parent` is `None`.
    pub fn set_parent(&self, id: &TabId, parent: Option<&TabId>) -> bool {
        let mut table = self.table.lock();
        match parent {
            Some(parent) => table.add_child(parent, id),
            None => {
                table.unlink_from_parent(id);
                true
            }
        }
    }

    pub fn parent_of(&self, id: &TabId) -> Option<TabId> {
        self.table.lock().get(id).and_then(|tab| tab.parent().cloned())
    }

    pub fn children_of(&self, id: &TabId) -> Vec<TabId> {
        self.table
            .lock()
            .get(id)
            .map(|tab| tab.children().to_vec())
            .unwrap_or_default()
    }

    // === Visibility ===

    pub fn put_in_foreground(&self, id: &TabId) -> Result<()> {
        self.with_tab_mut(id, |tab| {
            require_live_view(tab, TabState::Active)?;
            tab.put_in_foreground(&self.caps)
        })
    }

    pub fn put_in_background(&self, id: &TabId) -> Result<()> {
        self.with_tab_mut(id, |tab| {
            require_live_view(tab, TabState::Background)?;
            tab.put_in_background()
        })
    }

    /// Make `id` the current tab: background the previous one, then thaw
    /// the target if needed and bring it to the foreground.
    pub async fn set_current_tab(&self, id: &TabId) -> Result<Option<RestoreOutcome>> {
        let needs_thaw = {
            let mut table = self.table.lock();
            let state = table
                .get(id)
                .map(Tab::state)
                .ok_or_else(|| TabError::NotFound(id.clone()))?;
            if state == TabState::Destroyed {
                return Err(TabError::NotFound(id.clone()));
            }
            if table.current.as_ref() == Some(id) && state == TabState::Active {
                return Ok(None);
            }

            if let Some(previous) = table.current.clone() {
                if let Some(tab) = table.get_mut(&previous) {
                    if tab.state() == TabState::Active {
                        tab.put_in_background()?;
                    }
                }
            }
            table.current = Some(id.clone());

            if state == TabState::Frozen {
                true
            } else {
                if let Some(tab) = table.get_mut(id) {
                    tab.put_in_foreground(&self.caps)?;
                }
                false
            }
        };

        if needs_thaw {
            self.thaw(id, true).await
        } else {
            Ok(None)
        }
    }

    // === Subwindows ===

    pub fn create_sub_window(&self, id: &TabId) -> Result<ViewId> {
        self.with_tab_mut(id, |tab| {
            let view = tab
                .create_sub_window(&self.caps)
                .ok_or_else(|| TabError::SubWindowExists(tab.id().clone()))?;
            if tab.in_foreground() {
                self.caps.host.attach_sub_window(tab.id());
            }
            Ok(view)
        })
    }

    pub fn dismiss_sub_window(&self, id: &TabId) {
        if let Some(tab) = self.table.lock().get_mut(id) {
            tab.dismiss_sub_window(&self.caps);
        }
    }

    /// Close the subwindow `view` of tab `id`. Refuses, with an error log,
    /// when `view` is not that tab's subwindow.
    pub fn close_sub_window(&self, id: &TabId, view: ViewId) {
        if let Some(tab) = self.table.lock().get_mut(id) {
            close_sub_window(tab, view, &self.caps);
        }
    }

    pub fn top_view(&self, id: &TabId) -> Option<ViewId> {
        self.with_tab(id, Tab::top_view_id).flatten()
    }

    /// Open the window a script asked for once the user approved it.
    pub fn create_window(&self, opener: &TabId, dialog: bool) -> Result<CreatedWindow> {
        let mut table = self.table.lock();
        self.create_window_locked(&mut table, opener, dialog)
    }

    pub(crate) fn create_window_locked(
        &self,
        table: &mut TabTable,
        opener: &TabId,
        dialog: bool,
    ) -> Result<CreatedWindow> {
        if table.get(opener).is_none() {
            return Err(TabError::NotFound(opener.clone()));
        }

        if dialog {
            let tab = table
                .get_mut(opener)
                .ok_or_else(|| TabError::NotFound(opener.clone()))?;
            let view = tab
                .create_sub_window(&self.caps)
                .ok_or_else(|| TabError::SubWindowExists(opener.clone()))?;
            self.caps.host.attach_sub_window(opener);
            return Ok(CreatedWindow::SubWindow(view));
        }

        let child = self.open_tab_locked(table, None, false, None)?;
        table.add_child(opener, &child);
        self.caps.host.switch_to_tab(&child);
        Ok(CreatedWindow::Tab(child))
    }

    /// Alert to show instead of opening a window for the tab at `index`.
    pub(crate) fn refuse_window(
        &self,
        table: &TabTable,
        index: usize,
        dialog: bool,
    ) -> Option<Alert> {
        let has_sub_window = table.tabs.get(index).is_some_and(Tab::has_sub_window);
        if dialog && has_sub_window {
            Some(Alert::TooManySubWindows)
        } else if table.tabs.len() >= self.policy.max_tabs {
            Some(Alert::TooManyWindows)
        } else {
            None
        }
    }

    // === Errors and security indicator ===

    /// The host dismissed the error dialog it was showing for `id`.
    pub fn dismiss_error(&self, id: &TabId) {
        if let Some(tab) = self.table.lock().get_mut(id) {
            tab.dismiss_error(&self.caps);
        }
    }

    pub fn revert_lock_icon(&self, id: &TabId) {
        if let Some(tab) = self.table.lock().get_mut(id) {
            tab.revert_lock_icon();
        }
    }

    // === Freeze / thaw ===

    /// Snapshot a tab, then release its views. Freezing a frozen tab is a
    /// no-op.
    pub async fn freeze(&self, id: &TabId) -> Result<()> {
        let pending = {
            let mut table = self.table.lock();
            let index = table
                .index_of(id)
                .ok_or_else(|| TabError::NotFound(id.clone()))?;
            let parent_index = table.parent_index(&table.tabs[index]);
            let tab = &mut table.tabs[index];

            match tab.state() {
                TabState::Frozen => return Ok(()),
                TabState::Destroyed => return Err(TabError::NotFound(id.clone())),
                _ => {}
            }

            let serialized = snapshot::serialize(tab, parent_index, &self.policy.thumbnails)?;
            tab.release_views(&self.caps);
            tab.transition_to(TabState::Frozen)?;
            if table.current.as_ref() == Some(id) {
                table.current = None;
            }
            serialized.picture
        };

        tracing::info!(tab_id = %id, "Froze tab");
        if let Some(picture) = pending {
            self.write_picture(picture).await;
        }
        Ok(())
    }

    /// Snapshot a tab without releasing it. Frozen tabs return their stored
    /// snapshot.
    pub async fn save_state(&self, id: &TabId) -> Result<TabSnapshot> {
        let (snapshot, pending) = {
            let mut table = self.table.lock();
            let index = table
                .index_of(id)
                .ok_or_else(|| TabError::NotFound(id.clone()))?;
            let parent_index = table.parent_index(&table.tabs[index]);
            let serialized = snapshot::serialize(
                &mut table.tabs[index],
                parent_index,
                &self.policy.thumbnails,
            )?;
            (serialized.snapshot, serialized.picture)
        };

        let Some(picture) = pending else {
            return Ok(snapshot);
        };
        let path = picture.path.clone();
        if self.write_picture(picture).await {
            Ok(TabSnapshot {
                picture_file_path: Some(path),
                ..snapshot
            })
        } else {
            Ok(snapshot)
        }
    }

    /// Snapshot every tab in table order. Parent links are re-encoded as
    /// positions in the returned list. Tabs that cannot be snapshotted are
    /// skipped.
    pub async fn save_all(&self) -> Vec<(TabId, TabSnapshot)> {
        let ids = self.tab_ids();
        let mut saved = Vec::with_capacity(ids.len());
        for id in ids {
            match self.save_state(&id).await {
                Ok(snapshot) => saved.push((id, snapshot)),
                Err(e) => tracing::warn!(tab_id = %id, error = %e, "Skipping tab on save"),
            }
        }

        let parents: Vec<Option<TabId>> = saved
            .iter()
            .map(|(id, _)| self.parent_of(id))
            .collect();
        let positions: Vec<Option<usize>> = parents
            .iter()
            .map(|parent| {
                parent
                    .as_ref()
                    .and_then(|parent| saved.iter().position(|(id, _)| id == parent))
            })
            .collect();
        for ((_, snapshot), position) in saved.iter_mut().zip(positions) {
            snapshot.parent_index = position;
        }
        saved
    }

    /// Write a screenshot and record its path on the snapshot it was taken
    /// for. Returns false when the write failed or the snapshot moved on, in
    /// which case no file is left behind.
    async fn write_picture(&self, picture: PendingPicture) -> bool {
        let PendingPicture {
            tab_id,
            epoch,
            path,
            bytes,
        } = picture;

        if let Err(e) = self.policy.thumbnails.write(path.clone(), bytes).await {
            tracing::warn!(tab_id = %tab_id, error = %e, "Failed to write tab picture");
            return false;
        }

        let attached = self
            .table
            .lock()
            .get_mut(&tab_id)
            .is_some_and(|tab| tab.attach_picture(epoch, path.clone()));
        if !attached {
            tracing::debug!(tab_id = %tab_id, "Tab changed during picture write; removing file");
            if let Err(e) = self.policy.thumbnails.remove(path).await {
                tracing::warn!(tab_id = %tab_id, error = %e, "Failed to remove stale picture");
            }
        }
        attached
    }

    /// Install a fresh view into a frozen tab and restore its snapshot.
    /// Returns `None` when the tab was not frozen.
    pub async fn thaw(&self, id: &TabId, foreground: bool) -> Result<Option<RestoreOutcome>> {
        let picture_path = {
            let table = self.table.lock();
            let tab = table
                .get(id)
                .ok_or_else(|| TabError::NotFound(id.clone()))?;
            if tab.state() != TabState::Frozen {
                return Ok(None);
            }
            tab.saved_state()
                .ok_or_else(|| TabError::NoSavedState(id.clone()))?
                .picture_file_path
                .clone()
        };

        let picture = match picture_path.clone() {
            Some(path) => match self.policy.thumbnails.read(path).await {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!(tab_id = %id, error = %e, "Tab picture unavailable");
                    None
                }
            },
            None => None,
        };

        let outcome = {
            let mut table = self.table.lock();
            let tab = table
                .get_mut(id)
                .ok_or_else(|| TabError::NotFound(id.clone()))?;
            if tab.state() != TabState::Frozen {
                return Ok(None);
            }
            let saved = tab
                .take_saved_state()
                .ok_or_else(|| TabError::NoSavedState(id.clone()))?;

            let mut view = self.caps.views.create_view(ViewRole::Main);
            self.caps.settings.register(view.id());
            view.set_network_available(self.caps.host.is_network_up());
            tab.set_view(Some(view), &self.caps);

            let outcome = snapshot::deserialize(tab, &saved, picture.as_deref());
            tab.transition_to(TabState::Background)?;
            if foreground {
                tab.put_in_foreground(&self.caps)?;
            }
            outcome
        };

        // A rejected restore keeps its screenshot on disk
        if let Some(path) = picture_path.filter(|_| !outcome.is_degraded()) {
            if let Err(e) = self.policy.thumbnails.remove(path).await {
                tracing::warn!(tab_id = %id, error = %e, "Failed to remove tab picture");
            }
        }

        if outcome.is_degraded() {
            tracing::warn!(tab_id = %id, "Thawed tab without its history");
        } else {
            tracing::info!(tab_id = %id, "Thawed tab");
        }
        Ok(Some(outcome))
    }

    /// Recreate tabs from a previous process as frozen tabs, in order.
    /// Parent positions refer to `entries`; a parent that was not restored
    /// leaves the child as a root.
    pub fn restore_tabs(&self, entries: Vec<(TabId, TabSnapshot)>) -> Vec<TabId> {
        let mut table = self.table.lock();
        let mut slots: Vec<Option<TabId>> = Vec::with_capacity(entries.len());
        let mut links: Vec<(TabId, usize, usize)> = Vec::new();

        for (position, (id, snapshot)) in entries.into_iter().enumerate() {
            if table.tabs.len() >= self.policy.max_tabs {
                tracing::warn!(tab_id = %id, "Tab limit reached; dropping restored tab");
                slots.push(None);
                continue;
            }
            if table.index_of(&id).is_some() {
                tracing::warn!(tab_id = %id, "Tab already open; skipping restore");
                slots.push(None);
                continue;
            }
            if let Some(parent_index) = snapshot.parent_index {
                links.push((id.clone(), position, parent_index));
            }
            table.tabs.push(Tab::from_snapshot(id.clone(), snapshot));
            slots.push(Some(id));
        }

        for (id, position, parent_index) in links {
            let parent = slots
                .get(parent_index)
                .filter(|_| parent_index != position)
                .cloned()
                .flatten();
            if !parent.is_some_and(|parent| table.add_child(&parent, &id)) {
                tracing::warn!(tab_id = %id, parent_index, "Ignoring invalid parent index");
                if let Some(tab) = table.get_mut(&id) {
                    tab.set_parent_link(None, None);
                }
            }
        }

        let restored: Vec<TabId> = slots.into_iter().flatten().collect();
        tracing::info!(count = restored.len(), "Restored tabs");
        restored
    }
}

impl Clone for TabControl {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            caps: self.caps.clone(),
            policy: Arc::clone(&self.policy),
            runtime: self.runtime.clone(),
        }
    }
}

fn require_live_view(tab: &Tab, target: TabState) -> Result<()> {
    if tab.state().has_live_view() {
        Ok(())
    } else {
        Err(TabError::InvalidTransition {
            from: tab.state().to_string(),
            to: target.to_string(),
        })
    }
}

pub(crate) fn close_sub_window(tab: &mut Tab, view: ViewId, caps: &Capabilities) {
    if tab.sub_view_id() != Some(view) {
        tracing::error!(
            tab_id = %tab.id(),
            view_id = view,
            "Can't close a window that is not this tab's subwindow"
        );
        return;
    }
    tab.dismiss_sub_window(caps);
}
