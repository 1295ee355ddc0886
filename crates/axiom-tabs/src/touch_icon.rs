//! Single-flight touch-icon downloads
//!
//! A tab runs at most one touch-icon fetch. Precomposed icons pre-empt a
//! plain one that is still in flight; everything else is dropped while a
//! fetch is running. Completions are merged back into the tab table and only
//! clear the tab's handle when the generation still matches.

use futures_util::future::{AbortHandle, Abortable, BoxFuture};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;

use crate::control::TabTable;
use crate::host::BookmarkStore;
use crate::TabId;

pub trait TouchIconFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> BoxFuture<'static, anyhow::Result<Vec<u8>>>;
}

/// Handle to the fetch a tab is currently waiting on.
#[derive(Debug)]
pub struct TouchIconTask {
    generation: u64,
    url: String,
    precomposed: bool,
    abort: AbortHandle,
}

impl TouchIconTask {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_precomposed(&self) -> bool {
        self.precomposed
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn cancel(&self) {
        self.abort.abort();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IconDecision {
    Start,
    /// Cancel the running fetch, then start
    Replace,
    Drop,
}

pub(crate) fn decide(current: Option<&TouchIconTask>, precomposed: bool) -> IconDecision {
    match current {
        None => IconDecision::Start,
        Some(task) if precomposed && !task.precomposed => IconDecision::Replace,
        Some(_) => IconDecision::Drop,
    }
}

/// Everything a fetch needs once it leaves the tab table.
pub(crate) struct IconRequest {
    pub tab_id: TabId,
    pub generation: u64,
    pub icon_url: String,
    pub precomposed: bool,
    /// Page URLs captured when the fetch started; the icon is stored for
    /// these even if the tab navigates away meanwhile.
    pub original_url: Option<String>,
    pub page_url: String,
}

pub(crate) fn spawn_fetch(
    runtime: &Handle,
    table: Weak<Mutex<TabTable>>,
    fetcher: Arc<dyn TouchIconFetcher>,
    bookmarks: Arc<dyn BookmarkStore>,
    request: IconRequest,
) -> TouchIconTask {
    let (abort, registration) = AbortHandle::new_pair();
    let fetch = Abortable::new(fetcher.fetch(&request.icon_url), registration);

    let task = TouchIconTask {
        generation: request.generation,
        url: request.icon_url.clone(),
        precomposed: request.precomposed,
        abort,
    };

    runtime.spawn(async move {
        let result = match fetch.await {
            Ok(result) => result,
            Err(_aborted) => {
                tracing::debug!(
                    tab_id = %request.tab_id,
                    url = %request.icon_url,
                    "Touch icon fetch cancelled"
                );
                return;
            }
        };

        let Some(table) = table.upgrade() else {
            return;
        };
        let tab_alive = {
            let mut table = table.lock();
            match table.get_mut(&request.tab_id) {
                Some(tab) => {
                    tab.finish_touch_icon(request.generation);
                    true
                }
                None => false,
            }
        };
        if !tab_alive {
            tracing::debug!(tab_id = %request.tab_id, "Discarding touch icon for closed tab");
            return;
        }

        match result {
            Ok(icon) => {
                if let Err(e) = bookmarks.store_touch_icon(
                    request.original_url.as_deref(),
                    &request.page_url,
                    &icon,
                ) {
                    tracing::warn!(
                        tab_id = %request.tab_id,
                        error = %e,
                        "Failed to store touch icon"
                    );
                } else {
                    tracing::debug!(
                        tab_id = %request.tab_id,
                        url = %request.icon_url,
                        bytes = icon.len(),
                        "Stored touch icon"
                    );
                }
            }
            Err(e) => {
                tracing::warn!(
                    tab_id = %request.tab_id,
                    url = %request.icon_url,
                    error = %e,
                    "Touch icon fetch failed"
                );
            }
        }
    });

    task
}
