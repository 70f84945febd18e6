//! Database schema definitions
//!
//! The snapshot store is a single append-only `products` table. Collections
//! are stored as JSON text.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY,
    source_url TEXT,
    crawled_at TEXT,
    site TEXT,
    brand TEXT,
    product_name TEXT,
    sku TEXT,
    upc TEXT,
    category TEXT,
    price TEXT,
    currency TEXT,
    availability TEXT,
    description TEXT,
    specs TEXT,
    images TEXT,
    breadcrumbs TEXT,
    raw_html_path TEXT
);

CREATE INDEX IF NOT EXISTS idx_products_site ON products(site);
CREATE INDEX IF NOT EXISTS idx_products_sku ON products(sku);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
