//! SQLite snapshot sink
//!
//! One row per persisted record in an append-only table. The connection is
//! shared behind a mutex that is held only for the single INSERT; row values
//! are prepared before the lock is taken.

use crate::model::ProductRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{RecordSink, SinkError, SinkResult, SinkStage};
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;

/// Row counts read back from the snapshot table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub total: i64,
    pub by_site: Vec<(String, i64)>,
    pub by_availability: Vec<(String, i64)>,
}

/// Relational snapshot store
pub struct SqliteSnapshotSink {
    conn: Mutex<Connection>,
}

impl SqliteSnapshotSink {
    /// Opens or creates the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file; parent directories are created
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSnapshotSink)` - Successfully opened/created database
    /// * `Err(SinkError)` - Failed to open database or create schema
    pub fn new(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        initialize_schema(&conn)?;

        tracing::info!("SQLite snapshot sink ready at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Appends one row for the record and returns its row id
    pub fn insert(&self, record: &ProductRecord) -> SinkResult<i64> {
        let crawled_at = record.crawled_at.to_rfc3339();
        let availability = record.availability.map(|a| a.as_str());
        let specs = serde_json::to_string(&record.specs)?;
        let images = serde_json::to_string(&record.images)?;
        let breadcrumbs = serde_json::to_string(&record.breadcrumbs)?;

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO products (
                source_url, crawled_at, site, brand, product_name, sku, upc, category,
                price, currency, availability, description, specs, images, breadcrumbs, raw_html_path
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                record.source_url,
                crawled_at,
                record.site,
                record.brand,
                record.product_name,
                record.sku,
                record.upc,
                record.category,
                record.price,
                record.currency,
                availability,
                record.description,
                specs,
                images,
                breadcrumbs,
                record.raw_document_ref,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Total number of rows
    pub fn count(&self) -> SinkResult<i64> {
        let conn = self.lock()?;
        let count = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Rows stored for a source URL
    pub fn count_for_url(&self, source_url: &str) -> SinkResult<i64> {
        let conn = self.lock()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM products WHERE source_url = ?1",
            params![source_url],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Row totals grouped by site and by availability
    pub fn stats(&self) -> SinkResult<SnapshotStats> {
        let conn = self.lock()?;
        let total = conn.query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        let by_site = grouped_counts(&conn, "site")?;
        let by_availability = grouped_counts(&conn, "availability")?;

        Ok(SnapshotStats {
            total,
            by_site,
            by_availability,
        })
    }

    /// Loads the most recent row for a source URL
    pub fn latest_for_url(&self, source_url: &str) -> SinkResult<Option<StoredProduct>> {
        use rusqlite::OptionalExtension;

        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT source_url, site, sku, price, currency, availability, specs, images, breadcrumbs, raw_html_path
                 FROM products WHERE source_url = ?1 ORDER BY id DESC LIMIT 1",
                params![source_url],
                |row| {
                    Ok(StoredProduct {
                        source_url: row.get(0)?,
                        site: row.get(1)?,
                        sku: row.get(2)?,
                        price: row.get(3)?,
                        currency: row.get(4)?,
                        availability: row.get(5)?,
                        specs: row.get(6)?,
                        images: row.get(7)?,
                        breadcrumbs: row.get(8)?,
                        raw_html_path: row.get(9)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn lock(&self) -> SinkResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| SinkError::LockPoisoned(e.to_string()))
    }
}

/// Selected columns of a stored row, as stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProduct {
    pub source_url: Option<String>,
    pub site: Option<String>,
    pub sku: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub availability: Option<String>,
    pub specs: Option<String>,
    pub images: Option<String>,
    pub breadcrumbs: Option<String>,
    pub raw_html_path: Option<String>,
}

fn grouped_counts(conn: &Connection, column: &str) -> SinkResult<Vec<(String, i64)>> {
    let sql = format!(
        "SELECT COALESCE({col}, '(none)'), COUNT(*) FROM products GROUP BY {col} ORDER BY COUNT(*) DESC, 1",
        col = column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[async_trait]
impl RecordSink for SqliteSnapshotSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn stage(&self) -> SinkStage {
        SinkStage::Record
    }

    async fn write(&self, record: &mut ProductRecord) -> SinkResult<()> {
        let id = self.insert(record)?;
        tracing::debug!("Stored snapshot row {} for {}", id, record.source_url);
        Ok(())
    }
}
