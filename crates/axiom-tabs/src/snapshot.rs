//! Freeze/thaw codec
//!
//! Captures a tab's back/forward list and static metadata into a
//! [`TabSnapshot`] and rebuilds a tab from one. Screenshot bytes are handed
//! back to the caller, which writes them off-lock and records the path only
//! once the write has succeeded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::TabError;
use crate::security::LockState;
use crate::tab::{PickerData, Tab};
use crate::thumbnails::ThumbnailDir;
use crate::view::HistoryBlob;
use crate::{Result, TabId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub history: Option<HistoryBlob>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_file_path: Option<PathBuf>,
    pub url: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub close_on_exit: bool,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
    /// Position of the parent tab in the tab table when the snapshot was taken
    #[serde(default)]
    pub parent_index: Option<usize>,
    #[serde(default)]
    pub lock_state: LockState,
    pub saved_at: DateTime<Utc>,
}

/// A screenshot that still has to be written to disk.
#[derive(Debug)]
pub(crate) struct PendingPicture {
    pub tab_id: TabId,
    /// Snapshot epoch the picture belongs to
    pub epoch: u64,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
pub(crate) struct Serialized {
    pub snapshot: TabSnapshot,
    pub picture: Option<PendingPicture>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// History was restored; `picture_restored` tells whether a screenshot
    /// was also put back.
    Restored { picture_restored: bool },
    /// The view rejected the saved history. Static fields were restored and
    /// the tab should reload its original URL.
    HistoryRejected,
}

impl RestoreOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::HistoryRejected)
    }
}

/// Snapshot a tab and store the result as the tab's saved state.
///
/// A tab without a live view returns its stored snapshot unchanged.
pub(crate) fn serialize(
    tab: &mut Tab,
    parent_index: Option<usize>,
    thumbnails: &ThumbnailDir,
) -> Result<Serialized> {
    let Some(view) = tab.view() else {
        return match tab.saved_state() {
            Some(saved) => Ok(Serialized {
                snapshot: saved.clone(),
                picture: None,
            }),
            None => Err(TabError::NoSavedState(tab.id().clone())),
        };
    };

    let history = view.save_history();
    let entry = view.current_entry();
    let view_id = view.id();
    let picture = match (&history, &entry) {
        (Some(_), Some(_)) => view.capture_picture(),
        _ => None,
    };

    let picker = PickerData::from_entry(entry);
    let snapshot = TabSnapshot {
        history,
        picture_file_path: None,
        url: picker.url.clone(),
        title: picker.title.clone(),
        close_on_exit: tab.close_on_exit(),
        app_id: tab.app_id().map(str::to_string),
        original_url: tab.original_url().map(str::to_string),
        parent_index,
        lock_state: tab.lock_state(),
        saved_at: Utc::now(),
    };

    tab.set_picker_data(Some(picker));
    let epoch = tab.store_snapshot(snapshot.clone());

    let picture = picture.map(|bytes| PendingPicture {
        tab_id: tab.id().clone(),
        epoch,
        path: thumbnails.picture_path(tab.id(), view_id),
        bytes,
    });

    Ok(Serialized { snapshot, picture })
}

/// Rebuild a tab's navigation state into its freshly installed view.
///
/// Static fields are restored even when the history is rejected.
pub(crate) fn deserialize(
    tab: &mut Tab,
    snapshot: &TabSnapshot,
    picture: Option<&[u8]>,
) -> RestoreOutcome {
    tab.restore_static_fields(snapshot);
    tab.take_saved_state();
    tab.clear_picker_data();

    let tab_id = tab.id().clone();
    let Some(view) = tab.view_mut() else {
        return RestoreOutcome::HistoryRejected;
    };

    let restored = match snapshot.history.as_ref() {
        Some(history) => view.restore_history(history),
        None => Err(anyhow::anyhow!("snapshot has no history")),
    };
    if let Err(e) = restored {
        tracing::warn!(tab_id = %tab_id, error = %e, "Failed to restore tab history");
        return RestoreOutcome::HistoryRejected;
    }

    let picture_restored = match picture {
        Some(bytes) => match view.restore_picture(bytes) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(tab_id = %tab_id, error = %e, "Failed to restore tab picture");
                false
            }
        },
        None => false,
    };

    RestoreOutcome::Restored { picture_restored }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use crate::view::{ContentView, ViewFactory, ViewRole};

    fn live_tab(fixture: &Fixture, url: &str) -> Tab {
        let caps = fixture.capabilities();
        let mut tab = Tab::new(true, Some("app".to_string()), Some(url.to_string()));
        let mut view = fixture.views.create_view(ViewRole::Main);
        view.load_url(url);
        tab.set_view(Some(view), &caps);
        tab.reset_lock_icon(url);
        tab
    }

    #[test]
    fn test_serialize_without_view_or_state_fails() {
        let mut tab = Tab::new(false, None, None);
        let dir = ThumbnailDir::new("/tmp/unused");
        assert!(matches!(
            serialize(&mut tab, None, &dir),
            Err(TabError::NoSavedState(_))
        ));
    }

    #[test]
    fn test_serialize_live_view() {
        let fixture = Fixture::new();
        let mut tab = live_tab(&fixture, "https://example.com/");
        let dir = ThumbnailDir::new("/tmp/thumbs");

        let serialized = serialize(&mut tab, Some(3), &dir).unwrap();
        let snapshot = &serialized.snapshot;

        assert!(snapshot.history.is_some());
        assert_eq!(snapshot.url.as_deref(), Some("https://example.com/"));
        assert_eq!(snapshot.title.as_deref(), Some("https://example.com/"));
        assert!(snapshot.close_on_exit);
        assert_eq!(snapshot.app_id.as_deref(), Some("app"));
        assert_eq!(snapshot.parent_index, Some(3));
        assert_eq!(snapshot.lock_state, LockState::Secure);
        assert!(snapshot.picture_file_path.is_none());

        let picture = serialized.picture.unwrap();
        assert_eq!(picture.epoch, 1);
        assert!(picture.path.starts_with("/tmp/thumbs"));
        assert_eq!(tab.saved_state(), Some(snapshot));
        assert_eq!(tab.url(), Some("https://example.com/"));
    }

    #[test]
    fn test_no_picture_without_current_entry() {
        let fixture = Fixture::new();
        let caps = fixture.capabilities();
        let mut tab = Tab::new(false, None, None);
        tab.set_view(Some(fixture.views.create_view(ViewRole::Main)), &caps);

        let serialized = serialize(&mut tab, None, &ThumbnailDir::new("/tmp")).unwrap();
        assert!(serialized.picture.is_none());
        assert!(serialized.snapshot.url.is_none());
    }

    #[test]
    fn test_snapshot_json_tolerates_missing_fields() {
        let json = r#"{"history": null, "url": "https://a.example/", "title": null,
            "saved_at": "2024-01-01T00:00:00Z"}"#;
        let snapshot: TabSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.lock_state, LockState::Unsecure);
        assert!(snapshot.parent_index.is_none());
        assert!(!snapshot.close_on_exit);
    }

    #[test]
    fn test_deserialize_rejected_history_keeps_statics() {
        let fixture = Fixture::new();
        let mut source = live_tab(&fixture, "https://example.com/");
        let snapshot = serialize(&mut source, None, &ThumbnailDir::new("/tmp"))
            .unwrap()
            .snapshot;

        let caps = fixture.capabilities();
        let mut target = Tab::new(false, None, None);
        let view = fixture.views.create_view(ViewRole::Main);
        fixture.views.reject_history(view.id());
        target.set_view(Some(view), &caps);

        let outcome = deserialize(&mut target, &snapshot, None);
        assert!(outcome.is_degraded());
        assert!(target.close_on_exit());
        assert_eq!(target.app_id(), Some("app"));
        assert_eq!(target.original_url(), Some("https://example.com/"));
        assert_eq!(target.lock_state(), LockState::Secure);
    }
}
