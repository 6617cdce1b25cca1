//! Listing store: idempotent, URL-keyed persistence.
//!
//! SQLite-backed, one row per listing keyed by canonical URL. The store is
//! the only resource shared across concurrent crawl tasks, so every
//! operation opens its own connection (WAL + busy timeout) rather than
//! sharing a handle.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection};
use thiserror::Error;
use tracing::debug;

use crate::models::{Listing, ListingStatus};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Outcome of a batch upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub inserted: usize,
    pub updated: usize,
}

/// SQLite-backed repository for normalized listings.
pub struct ListingStore {
    db_path: PathBuf,
}

impl ListingStore {
    /// Open (and initialize) the store at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
        "#,
        )?;
        Ok(conn)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            -- One row per listing; the canonical URL is the identity key.
            CREATE TABLE IF NOT EXISTS listings (
                url TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                price TEXT NOT NULL,
                condition TEXT NOT NULL,
                upload_time TEXT NOT NULL,
                region TEXT NOT NULL,
                image_url TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'on_sale',
                description TEXT,
                platform TEXT NOT NULL,
                category TEXT NOT NULL,
                first_seen_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_listings_platform
                ON listings(platform);
        "#,
        )?;
        Ok(())
    }

    /// Check whether a canonical URL is already persisted.
    ///
    /// Consulted before spending a detail fetch; a known URL is skipped
    /// entirely rather than re-extracted.
    pub fn exists(&self, url: &str) -> Result<bool> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM listings WHERE url = ?",
            params![url],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Upsert a batch of listings, matching solely on `url`.
    ///
    /// An existing row's fields are fully replaced (last-write-wins);
    /// there is no field-level merge. The whole batch commits in one
    /// transaction so a page's worth of results lands atomically.
    pub fn upsert_batch(&self, listings: &[Listing]) -> Result<UpsertOutcome> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();
        let mut outcome = UpsertOutcome::default();

        for listing in listings {
            let existed: i64 = tx.query_row(
                "SELECT COUNT(*) FROM listings WHERE url = ?",
                params![listing.url],
                |row| row.get(0),
            )?;

            tx.execute(
                r#"
                INSERT INTO listings (
                    url, title, price, condition, upload_time, region,
                    image_url, status, description, platform, category,
                    first_seen_at, last_seen_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)
                ON CONFLICT(url) DO UPDATE SET
                    title = excluded.title,
                    price = excluded.price,
                    condition = excluded.condition,
                    upload_time = excluded.upload_time,
                    region = excluded.region,
                    image_url = excluded.image_url,
                    status = excluded.status,
                    description = excluded.description,
                    platform = excluded.platform,
                    category = excluded.category,
                    last_seen_at = excluded.last_seen_at
                "#,
                params![
                    listing.url,
                    listing.title,
                    listing.price,
                    listing.condition,
                    listing.upload_time,
                    listing.region,
                    listing.image_url,
                    listing.status.as_str(),
                    listing.description,
                    listing.platform,
                    listing.category,
                    now,
                ],
            )?;

            if existed > 0 {
                outcome.updated += 1;
            } else {
                outcome.inserted += 1;
            }
        }

        tx.commit()?;
        debug!(
            inserted = outcome.inserted,
            updated = outcome.updated,
            "upserted listing batch"
        );
        Ok(outcome)
    }

    /// Fetch a single listing by canonical URL.
    pub fn get(&self, url: &str) -> Result<Option<Listing>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT url, title, price, condition, upload_time, region,
                   image_url, status, description, platform, category
            FROM listings WHERE url = ?
            "#,
        )?;
        let mut rows = stmt.query(params![url])?;
        match rows.next()? {
            Some(row) => {
                let status_text: String = row.get(7)?;
                Ok(Some(Listing {
                    url: row.get(0)?,
                    title: row.get(1)?,
                    price: row.get(2)?,
                    condition: row.get(3)?,
                    upload_time: row.get(4)?,
                    region: row.get(5)?,
                    image_url: row.get(6)?,
                    status: ListingStatus::from_str(&status_text).unwrap_or_default(),
                    description: row.get(8)?,
                    platform: row.get(9)?,
                    category: row.get(10)?,
                }))
            }
            None => Ok(None),
        }
    }

    /// Stored listing counts per platform, for the status command.
    pub fn counts_by_platform(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT platform, COUNT(*) FROM listings GROUP BY platform ORDER BY platform",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(url: &str, title: &str) -> Listing {
        Listing {
            title: title.to_string(),
            price: "120,000원".to_string(),
            condition: "중고".to_string(),
            upload_time: "2025-06-15 11:00:00".to_string(),
            region: "역삼동".to_string(),
            url: url.to_string(),
            image_url: String::new(),
            status: ListingStatus::OnSale,
            description: None,
            platform: "bunjang".to_string(),
            category: "스마트폰".to_string(),
        }
    }

    fn open_store(dir: &tempfile::TempDir) -> ListingStore {
        ListingStore::open(&dir.path().join("test.db")).expect("open store")
    }

    #[test]
    fn upsert_is_idempotent_and_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        let first = sample("https://site/x/1", "iPhone 13");
        let outcome = store.upsert_batch(&[first]).unwrap();
        assert_eq!(outcome, UpsertOutcome { inserted: 1, updated: 0 });

        let mut second = sample("https://site/x/1", "iPhone 13 Pro");
        second.price = "200,000원".to_string();
        let outcome = store.upsert_batch(&[second.clone()]).unwrap();
        assert_eq!(outcome, UpsertOutcome { inserted: 0, updated: 1 });

        // Exactly one record remains, carrying the second write's fields.
        let stored = store.get("https://site/x/1").unwrap().unwrap();
        assert_eq!(stored, second);
        assert_eq!(store.counts_by_platform().unwrap(), vec![("bunjang".to_string(), 1)]);
    }

    #[test]
    fn exists_reports_known_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        assert!(!store.exists("https://site/x/1").unwrap());
        store.upsert_batch(&[sample("https://site/x/1", "a")]).unwrap();
        assert!(store.exists("https://site/x/1").unwrap());
        assert!(!store.exists("https://site/x/2").unwrap());
    }

    #[test]
    fn batch_counts_mixed_inserts_and_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir);

        store.upsert_batch(&[sample("https://site/x/1", "a")]).unwrap();
        let outcome = store
            .upsert_batch(&[
                sample("https://site/x/1", "a2"),
                sample("https://site/x/2", "b"),
            ])
            .unwrap();
        assert_eq!(outcome, UpsertOutcome { inserted: 1, updated: 1 });
    }
}
