//! Bookmarks and visited history
//!
//! Bookmarks and history share the `bookmarks` table; the `bookmark` column
//! tells them apart. Pages are matched by both the URL they were requested
//! with and the URL they ended up on, with and without a trailing slash.

use axiom_storage::Database;
use axiom_tabs::{BookmarkStore, Favicon};
use chrono::Utc;
use rusqlite::OptionalExtension;

use crate::Result;

pub struct SqliteBookmarkStore {
    db: Database,
}

impl SqliteBookmarkStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn add_bookmark(&self, url: &str, title: &str) -> Result<i64> {
        let id = self.db.with_connection(|conn| {
            conn.execute(
                "INSERT INTO bookmarks (url, title, bookmark, created_at) VALUES (?1, ?2, 1, ?3)",
                rusqlite::params![url, title, Utc::now().to_rfc3339()],
            )?;
            Ok(conn.last_insert_rowid())
        })?;
        tracing::debug!(id, url, "Added bookmark");
        Ok(id)
    }

    pub fn remove_bookmark(&self, id: i64) -> Result<bool> {
        let removed = self.db.with_connection(|conn| {
            let n = conn.execute("DELETE FROM bookmarks WHERE id = ?1 AND bookmark = 1", [id])?;
            Ok(n > 0)
        })?;
        Ok(removed)
    }

    /// Ids of the bookmark rows for either URL.
    pub fn matching_bookmarks(&self, original_url: Option<&str>, url: &str) -> Result<Vec<i64>> {
        let candidates = url_candidates(original_url, url);
        let mut ids = self.db.with_connection(|conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM bookmarks WHERE bookmark = 1 AND url = ?1")?;
            let mut ids = Vec::new();
            for candidate in &candidates {
                let rows: Vec<i64> = stmt
                    .query_map([candidate], |row| row.get(0))?
                    .filter_map(|r| r.ok())
                    .collect();
                ids.extend(rows);
            }
            Ok(ids)
        })?;
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    /// Count a visit to `url`. Reloads only refresh the visit time.
    pub fn visit(&self, url: &str, is_reload: bool) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.db.with_connection(|conn| {
            let updated = if is_reload {
                conn.execute(
                    "UPDATE bookmarks SET visited_at = ?1 WHERE url = ?2",
                    rusqlite::params![now, url],
                )?
            } else {
                conn.execute(
                    "UPDATE bookmarks SET visits = visits + 1, visited_at = ?1 WHERE url = ?2",
                    rusqlite::params![now, url],
                )?
            };

            if updated == 0 {
                conn.execute(
                    "INSERT INTO bookmarks (url, title, bookmark, visits, created_at, visited_at)
                     VALUES (?1, ?1, 0, 1, ?2, ?2)",
                    rusqlite::params![url, now],
                )?;
            }
            Ok(())
        })?;
        Ok(())
    }

    pub fn set_favicon(&self, original_url: Option<&str>, url: &str, icon: &[u8]) -> Result<usize> {
        self.update_blob("favicon", false, original_url, url, icon)
    }

    pub fn set_touch_icon(
        &self,
        original_url: Option<&str>,
        url: &str,
        icon: &[u8],
    ) -> Result<usize> {
        self.update_blob("touch_icon", true, original_url, url, icon)
    }

    /// Retitle the first history row whose URL ends with `url_suffix`.
    pub fn retitle_history(&self, url_suffix: &str, title: &str) -> Result<bool> {
        let updated = self.db.with_connection(|conn| {
            let id: Option<i64> = conn
                .query_row(
                    "SELECT id FROM bookmarks WHERE bookmark = 0 AND url LIKE '%' || ?1
                     ORDER BY id LIMIT 1",
                    [url_suffix],
                    |row| row.get(0),
                )
                .optional()?;
            match id {
                Some(id) => {
                    conn.execute(
                        "UPDATE bookmarks SET title = ?1 WHERE id = ?2",
                        rusqlite::params![title, id],
                    )?;
                    Ok(true)
                }
                None => Ok(false),
            }
        })?;
        Ok(updated)
    }

    pub fn favicon(&self, url: &str) -> Result<Option<Vec<u8>>> {
        self.blob("favicon", url)
    }

    pub fn touch_icon(&self, url: &str) -> Result<Option<Vec<u8>>> {
        self.blob("touch_icon", url)
    }

    pub fn visits(&self, url: &str) -> Result<Option<i64>> {
        let visits = self.db.with_connection(|conn| {
            let visits = conn
                .query_row(
                    "SELECT SUM(visits) FROM bookmarks WHERE url = ?1 HAVING COUNT(*) > 0",
                    [url],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(visits)
        })?;
        Ok(visits)
    }

    pub fn title(&self, url: &str) -> Result<Option<String>> {
        let title = self.db.with_connection(|conn| {
            let title = conn
                .query_row(
                    "SELECT title FROM bookmarks WHERE url = ?1 ORDER BY bookmark, id LIMIT 1",
                    [url],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(title)
        })?;
        Ok(title)
    }

    fn update_blob(
        &self,
        column: &'static str,
        bookmarks_only: bool,
        original_url: Option<&str>,
        url: &str,
        icon: &[u8],
    ) -> Result<usize> {
        let candidates = url_candidates(original_url, url);
        let filter = if bookmarks_only { " AND bookmark = 1" } else { "" };
        let sql = format!("UPDATE bookmarks SET {column} = ?1 WHERE url = ?2{filter}");

        let updated = self.db.transaction(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut updated = 0;
            for candidate in &candidates {
                updated += stmt.execute(rusqlite::params![icon, candidate])?;
            }
            Ok(updated)
        })?;

        tracing::debug!(column, url, rows = updated, "Stored icon");
        Ok(updated)
    }

    fn blob(&self, column: &'static str, url: &str) -> Result<Option<Vec<u8>>> {
        let sql = format!(
            "SELECT {column} FROM bookmarks WHERE url = ?1 AND {column} IS NOT NULL
             ORDER BY bookmark DESC, id LIMIT 1"
        );
        let blob = self.db.with_connection(|conn| {
            let blob = conn.query_row(&sql, [url], |row| row.get(0)).optional()?;
            Ok(blob)
        })?;
        Ok(blob)
    }
}

impl Clone for SqliteBookmarkStore {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
        }
    }
}

impl BookmarkStore for SqliteBookmarkStore {
    fn update_favicon(
        &self,
        original_url: Option<&str>,
        url: &str,
        icon: &Favicon,
    ) -> anyhow::Result<()> {
        self.set_favicon(original_url, url, &icon.0)?;
        Ok(())
    }

    fn record_visit(&self, url: &str, is_reload: bool) -> anyhow::Result<()> {
        self.visit(url, is_reload)?;
        Ok(())
    }

    fn find_bookmarks_matching(
        &self,
        original_url: Option<&str>,
        url: &str,
    ) -> anyhow::Result<Vec<i64>> {
        Ok(self.matching_bookmarks(original_url, url)?)
    }

    fn store_touch_icon(
        &self,
        original_url: Option<&str>,
        url: &str,
        icon: &[u8],
    ) -> anyhow::Result<()> {
        self.set_touch_icon(original_url, url, icon)?;
        Ok(())
    }

    fn update_history_title(&self, url_suffix: &str, title: &str) -> anyhow::Result<()> {
        self.retitle_history(url_suffix, title)?;
        Ok(())
    }
}

/// Both URLs, each with and without a trailing slash.
fn url_candidates(original_url: Option<&str>, url: &str) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::with_capacity(4);
    for u in original_url.into_iter().chain(std::iter::once(url)) {
        let toggled = match u.strip_suffix('/') {
            Some(stripped) => stripped.to_string(),
            None => format!("{u}/"),
        };
        for candidate in [u.to_string(), toggled] {
            if !candidate.is_empty() && !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteBookmarkStore {
        SqliteBookmarkStore::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_url_candidates() {
        assert_eq!(
            url_candidates(Some("http://a.example"), "https://a.example/"),
            vec![
                "http://a.example".to_string(),
                "http://a.example/".to_string(),
                "https://a.example/".to_string(),
                "https://a.example".to_string(),
            ]
        );
        assert_eq!(url_candidates(Some("https://b/"), "https://b/").len(), 2);
    }

    #[test]
    fn test_visits_and_reloads() {
        let store = store();
        store.visit("https://a.example/", false).unwrap();
        store.visit("https://a.example/", false).unwrap();
        store.visit("https://a.example/", true).unwrap();

        assert_eq!(store.visits("https://a.example/").unwrap(), Some(2));
        assert_eq!(store.visits("https://b.example/").unwrap(), None);
        assert!(store.matching_bookmarks(None, "https://a.example/").unwrap().is_empty());
    }

    #[test]
    fn test_bookmark_matching_uses_both_urls() {
        let store = store();
        let id = store.add_bookmark("http://a.example", "A").unwrap();
        store.visit("http://a.example", false).unwrap();

        let ids = store
            .matching_bookmarks(Some("http://a.example/"), "https://www.a.example/")
            .unwrap();
        assert_eq!(ids, vec![id]);

        assert!(store.remove_bookmark(id).unwrap());
        assert!(store
            .matching_bookmarks(None, "http://a.example")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_touch_icon_only_on_bookmarks() {
        let store = store();
        store.add_bookmark("https://a.example/", "A").unwrap();
        store.visit("https://c.example/", false).unwrap();

        let n = store
            .set_touch_icon(Some("https://a.example"), "https://a.example/home", b"icon")
            .unwrap();
        assert_eq!(n, 1);
        assert_eq!(store.touch_icon("https://a.example/").unwrap(), Some(b"icon".to_vec()));

        assert_eq!(store.set_touch_icon(None, "https://c.example/", b"x").unwrap(), 0);
        assert_eq!(store.touch_icon("https://c.example/").unwrap(), None);
    }

    #[test]
    fn test_favicon_updates_history_too() {
        let store = store();
        store.visit("https://a.example/", false).unwrap();
        store
            .update_favicon(None, "https://a.example", &Favicon(vec![1, 2, 3]))
            .unwrap();
        assert_eq!(store.favicon("https://a.example/").unwrap(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_retitle_first_history_row() {
        let store = store();
        store.visit("http://www.a.example/page", false).unwrap();
        store.add_bookmark("http://www.a.example/page", "Bookmark").unwrap();
        store.visit("https://a.example/page", false).unwrap();

        assert!(store.retitle_history("a.example/page", "Page").unwrap());
        assert_eq!(store.title("http://www.a.example/page").unwrap().as_deref(), Some("Page"));
        assert_eq!(
            store.title("https://a.example/page").unwrap().as_deref(),
            Some("https://a.example/page")
        );
        assert!(!store.retitle_history("nothing.example", "X").unwrap());
    }
}
