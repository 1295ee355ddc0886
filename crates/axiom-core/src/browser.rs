//! Main browser state container
//!
//! Owns the database, the tab table and the process-wide collaborators the
//! tabs talk to. The embedding UI supplies the window, the rendering engine
//! and cookie sync through [`Embedder`].

use std::sync::Arc;
use std::time::Duration;

use axiom_storage::Database;
use axiom_tabs::{
    Capabilities, CookieSync, Host, RestoreOutcome, SnapshotStore, TabControl, TabId,
    TouchIconFetcher, ViewFactory,
};

use crate::bookmarks::SqliteBookmarkStore;
use crate::config::Config;
use crate::icons::HttpTouchIconFetcher;
use crate::settings::BrowserSettings;
use crate::Result;

const CURRENT_TAB_KEY: &str = "current_tab_index";
const SECURITY_WARNINGS_KEY: &str = "show_security_warnings";

/// Services provided by the embedding UI.
#[derive(Clone)]
pub struct Embedder {
    pub host: Arc<dyn Host>,
    pub views: Arc<dyn ViewFactory>,
    pub cookies: Arc<dyn CookieSync>,
}

/// Main browser instance
pub struct Browser {
    config: Config,
    db: Database,
    tabs: TabControl,
    snapshots: SnapshotStore,
    settings: Arc<BrowserSettings>,
    bookmarks: Arc<SqliteBookmarkStore>,
}

impl Browser {
    pub fn new(config: Config, embedder: Embedder) -> Result<Self> {
        std::fs::create_dir_all(&config.thumbnail_dir)?;

        let db = Database::open(&config.database_path)?;
        Self::with_database(config, db, embedder)
    }

    pub fn with_database(config: Config, db: Database, embedder: Embedder) -> Result<Self> {
        let icons: Arc<dyn TouchIconFetcher> = Arc::new(HttpTouchIconFetcher::new(
            Duration::from_secs(config.touch_icon_timeout_secs),
        )?);

        let show_warnings = db
            .get_setting_as::<bool>(SECURITY_WARNINGS_KEY)?
            .unwrap_or(config.show_security_warnings);
        let settings = Arc::new(BrowserSettings::new(show_warnings));
        let bookmarks = Arc::new(SqliteBookmarkStore::new(db.clone()));

        let caps = Capabilities {
            host: embedder.host,
            views: embedder.views,
            bookmarks: bookmarks.clone(),
            settings: settings.clone(),
            cookies: embedder.cookies,
            icons,
        };
        let tabs = TabControl::new(caps, config.tab_policy());

        tracing::info!(db = %config.database_path.display(), "Browser initialized");

        Ok(Self {
            snapshots: SnapshotStore::new(db.clone()),
            config,
            db,
            tabs,
            settings,
            bookmarks,
        })
    }

    // === Tabs ===

    pub fn tabs(&self) -> &TabControl {
        &self.tabs
    }

    pub fn open_tab(&self, url: &str) -> Result<TabId> {
        Ok(self.tabs.open_tab(Some(url), false, None)?)
    }

    pub fn close_tab(&self, id: &TabId) -> bool {
        self.tabs.close_tab(id)
    }

    /// Switch to a tab, thawing it if it was frozen. When the saved history
    /// could not be restored the tab reloads the URL it was opened with.
    pub async fn activate(&self, id: &TabId) -> Result<Option<RestoreOutcome>> {
        let outcome = self.tabs.set_current_tab(id).await?;
        if outcome.is_some_and(|o| o.is_degraded()) {
            let original = self
                .tabs
                .with_tab(id, |tab| tab.original_url().map(str::to_string))
                .flatten();
            match original {
                Some(url) => self.tabs.load_url(id, &url)?,
                None => tracing::warn!(tab_id = %id, "Thawed tab has nothing to reload"),
            }
        }
        Ok(outcome)
    }

    /// Freeze the least recently used background tabs. Returns how many
    /// were frozen.
    pub async fn on_low_memory(&self) -> usize {
        let mut frozen = 0;
        for id in self.tabs.least_used_tabs() {
            match self.tabs.freeze(&id).await {
                Ok(()) => frozen += 1,
                Err(e) => tracing::warn!(tab_id = %id, error = %e, "Failed to freeze tab"),
            }
        }
        tracing::info!(frozen, "Released tabs on low memory");
        frozen
    }

    // === Session ===

    /// Persist every tab so the session can be restored after a restart.
    pub async fn save_session(&self) -> Result<usize> {
        let saved = self.tabs.save_all().await;
        self.snapshots.save_all(&saved)?;

        let current = self
            .tabs
            .current_tab()
            .and_then(|current| saved.iter().position(|(id, _)| *id == current));
        match current {
            Some(index) => self.db.set_setting(CURRENT_TAB_KEY, &index.to_string())?,
            None => self.db.delete_setting(CURRENT_TAB_KEY)?,
        }

        tracing::info!(tabs = saved.len(), current = ?current, "Saved session");
        Ok(saved.len())
    }

    /// Recreate the tabs of the last saved session as frozen tabs and thaw
    /// the one that was current.
    pub async fn restore_last_session(&self) -> Result<Vec<TabId>> {
        let entries = self.snapshots.load_all()?;
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let restored = self.tabs.restore_tabs(entries);
        let current = self
            .db
            .get_setting_as::<usize>(CURRENT_TAB_KEY)?
            .and_then(|index| restored.get(index).cloned());
        if let Some(id) = current {
            self.activate(&id).await?;
        }
        Ok(restored)
    }

    // === Settings ===

    pub fn settings(&self) -> &BrowserSettings {
        &self.settings
    }

    pub fn set_show_security_warnings(&self, show: bool) -> Result<()> {
        self.settings.set_show_security_warnings(show);
        self.db.set_setting(SECURITY_WARNINGS_KEY, &show.to_string())?;
        Ok(())
    }

    pub fn bookmarks(&self) -> &SqliteBookmarkStore {
        &self.bookmarks
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl Clone for Browser {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            db: self.db.clone(),
            tabs: self.tabs.clone(),
            snapshots: self.snapshots.clone(),
            settings: Arc::clone(&self.settings),
            bookmarks: Arc::clone(&self.bookmarks),
        }
    }
}
