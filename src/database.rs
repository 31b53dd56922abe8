//! Database operations for catalog sync
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! Product sync writes happen inside one transaction owned by the caller; the
//! helpers here take `&Connection` so they work on a `Transaction` too.

use crate::sync::Candidate;
use rusqlite::{params, Connection, OptionalExtension, Transaction};

/// Result type for database operations
pub type DbResult<T> = rusqlite::Result<T>;

pub const DEFAULT_REPUTATION: f64 = 3.5;
pub const DEFAULT_TIER: &str = "mid-tier";

/// Initialize the database schema
///
/// Enables foreign keys on this connection and creates, if missing:
/// - `products`, `brands`
/// - `product_variations`, `product_features`, `product_images`
/// - `categories` (global) and `product_categories` (per product)
/// - `review_summaries`
pub fn init_schema(conn: &Connection) -> DbResult<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS brands (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            reputation_score REAL NOT NULL DEFAULT 3.5,
            tier TEXT NOT NULL DEFAULT 'mid-tier',
            manufacturer TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS products (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT UNIQUE,
            title TEXT,
            brand_id INTEGER REFERENCES brands(id),
            brand_name TEXT,
            manufacturer TEXT,
            color_code TEXT,
            size_code TEXT,
            price REAL,
            currency TEXT,
            discount_percentage INTEGER,
            condition TEXT,
            merchant_name TEXT,
            availability TEXT,
            material TEXT,
            thread_count INTEGER,
            weave_type TEXT,
            last_synced_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_products_brand ON products(brand_id);
        CREATE INDEX IF NOT EXISTS idx_products_synced ON products(last_synced_at);

        CREATE TABLE IF NOT EXISTS product_variations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            external_id TEXT NOT NULL,
            variation_type TEXT NOT NULL,
            variation_value TEXT NOT NULL,
            variation_code TEXT NOT NULL,
            display_name TEXT,
            condition TEXT,
            price REAL,
            currency TEXT,
            availability TEXT,
            image_url TEXT,
            is_primary INTEGER NOT NULL DEFAULT 0,
            ordinal INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_variations_product ON product_variations(product_id);

        -- Global category catalog; rows are only ever inserted or updated
        CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            context_free_name TEXT,
            parent_external_id TEXT,
            is_root INTEGER NOT NULL DEFAULT 0,
            path TEXT,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS product_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            category_id INTEGER NOT NULL REFERENCES categories(id),
            rank INTEGER NOT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            source TEXT NOT NULL,
            UNIQUE (product_id, category_id)
        );

        CREATE TABLE IF NOT EXISTS product_features (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            feature_text TEXT NOT NULL,
            feature_type TEXT NOT NULL,
            is_highlighted INTEGER NOT NULL DEFAULT 0,
            ordinal INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_features_product ON product_features(product_id);

        -- is_external = 0 marks manually curated images that sync must not touch
        CREATE TABLE IF NOT EXISTS product_images (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id INTEGER NOT NULL REFERENCES products(id) ON DELETE CASCADE,
            url TEXT NOT NULL,
            image_type TEXT NOT NULL,
            size TEXT,
            is_primary INTEGER NOT NULL DEFAULT 0,
            ordinal INTEGER NOT NULL,
            is_external INTEGER NOT NULL DEFAULT 1
        );

        CREATE INDEX IF NOT EXISTS idx_images_product ON product_images(product_id);

        CREATE TABLE IF NOT EXISTS review_summaries (
            product_id INTEGER PRIMARY KEY REFERENCES products(id) ON DELETE CASCADE,
            average_rating REAL,
            review_count INTEGER,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

// ── Products ───────────────────────────────────────────────────────────────

/// Register a product row; this is the only place products are created
pub fn insert_product(conn: &Connection, external_id: &str, title: Option<&str>) -> DbResult<i64> {
    conn.execute(
        "INSERT INTO products (external_id, title) VALUES (?1, ?2)",
        params![external_id, title],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn product_exists(conn: &Connection, product_id: i64) -> DbResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM products WHERE id = ?1",
        params![product_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Stored product state
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    pub id: i64,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub brand_id: Option<i64>,
    pub brand_name: Option<String>,
    pub manufacturer: Option<String>,
    pub color_code: Option<String>,
    pub size_code: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub discount_percentage: Option<i64>,
    pub condition: Option<String>,
    pub merchant_name: Option<String>,
    pub availability: Option<String>,
    pub material: Option<String>,
    pub thread_count: Option<i64>,
    pub weave_type: Option<String>,
    pub last_synced_at: Option<String>,
}

pub fn get_product(conn: &Connection, product_id: i64) -> DbResult<Option<ProductRecord>> {
    conn.query_row(
        "SELECT id, external_id, title, brand_id, brand_name, manufacturer, color_code,
                size_code, price, currency, discount_percentage, condition, merchant_name,
                availability, material, thread_count, weave_type, last_synced_at
         FROM products
         WHERE id = ?1",
        params![product_id],
        |row| {
            Ok(ProductRecord {
                id: row.get(0)?,
                external_id: row.get(1)?,
                title: row.get(2)?,
                brand_id: row.get(3)?,
                brand_name: row.get(4)?,
                manufacturer: row.get(5)?,
                color_code: row.get(6)?,
                size_code: row.get(7)?,
                price: row.get(8)?,
                currency: row.get(9)?,
                discount_percentage: row.get(10)?,
                condition: row.get(11)?,
                merchant_name: row.get(12)?,
                availability: row.get(13)?,
                material: row.get(14)?,
                thread_count: row.get(15)?,
                weave_type: row.get(16)?,
                last_synced_at: row.get(17)?,
            })
        },
    )
    .optional()
}

/// Fields a sync may write onto a product; `None` keeps the stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductUpdate {
    pub title: Option<String>,
    pub brand_id: Option<i64>,
    pub brand_name: Option<String>,
    pub manufacturer: Option<String>,
    pub color_code: Option<String>,
    pub size_code: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub discount_percentage: Option<i64>,
    pub condition: Option<String>,
    pub merchant_name: Option<String>,
    pub availability: Option<String>,
    pub material: Option<String>,
    pub thread_count: Option<i64>,
    pub weave_type: Option<String>,
}

/// Apply a sync snapshot and stamp `last_synced_at`
pub fn update_product(conn: &Connection, product_id: i64, update: &ProductUpdate) -> DbResult<()> {
    let mut stmt = conn.prepare_cached(
        "UPDATE products SET
            title = COALESCE(?2, title),
            brand_id = COALESCE(?3, brand_id),
            brand_name = COALESCE(?4, brand_name),
            manufacturer = COALESCE(?5, manufacturer),
            color_code = COALESCE(?6, color_code),
            size_code = COALESCE(?7, size_code),
            price = COALESCE(?8, price),
            currency = COALESCE(?9, currency),
            discount_percentage = COALESCE(?10, discount_percentage),
            condition = COALESCE(?11, condition),
            merchant_name = COALESCE(?12, merchant_name),
            availability = COALESCE(?13, availability),
            material = COALESCE(?14, material),
            thread_count = COALESCE(?15, thread_count),
            weave_type = COALESCE(?16, weave_type),
            last_synced_at = datetime('now')
         WHERE id = ?1",
    )?;

    let changed = stmt.execute(params![
        product_id,
        update.title,
        update.brand_id,
        update.brand_name,
        update.manufacturer,
        update.color_code,
        update.size_code,
        update.price,
        update.currency,
        update.discount_percentage,
        update.condition,
        update.merchant_name,
        update.availability,
        update.material,
        update.thread_count,
        update.weave_type,
    ])?;

    if changed == 0 {
        return Err(rusqlite::Error::QueryReturnedNoRows);
    }
    Ok(())
}

/// Products with an external id that were never synced or not within
/// `max_age_days`, ordered by id
pub fn stale_candidates(
    conn: &Connection,
    max_age_days: u32,
    limit: Option<usize>,
) -> DbResult<Vec<Candidate>> {
    let age = format!("-{} days", max_age_days);
    let limit = limit.map(|l| l as i64).unwrap_or(-1);

    let mut stmt = conn.prepare(
        "SELECT id, external_id
         FROM products
         WHERE external_id IS NOT NULL
           AND external_id != ''
           AND (last_synced_at IS NULL OR last_synced_at < datetime('now', ?1))
         ORDER BY id
         LIMIT ?2",
    )?;

    let results: DbResult<Vec<Candidate>> = stmt
        .query_map(params![age, limit], |row| {
            Ok(Candidate {
                product_id: row.get(0)?,
                external_id: row.get(1)?,
            })
        })?
        .collect();
    results
}

// ── Brands ─────────────────────────────────────────────────────────────────

/// Look up a brand by exact name, creating it with default reputation and
/// tier on first encounter. Returns the id and whether it was created.
pub fn find_or_create_brand(
    conn: &Connection,
    name: &str,
    manufacturer: Option<&str>,
) -> DbResult<(i64, bool)> {
    let created = conn.execute(
        "INSERT OR IGNORE INTO brands (name, display_name, reputation_score, tier, manufacturer)
         VALUES (?1, ?1, ?2, ?3, ?4)",
        params![name, DEFAULT_REPUTATION, DEFAULT_TIER, manufacturer],
    )? > 0;

    let id = conn.query_row(
        "SELECT id FROM brands WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;

    if created {
        log::info!("Created brand {:?} (id {})", name, id);
    }
    Ok((id, created))
}

// ── Categories ─────────────────────────────────────────────────────────────

/// One node of the global category catalog
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryNode {
    pub external_id: String,
    pub name: String,
    pub context_free_name: Option<String>,
    pub parent_external_id: Option<String>,
    pub is_root: bool,
    pub path: Option<String>,
}

/// Insert or refresh a catalog node by external id, returning its row id
pub fn upsert_category(conn: &Connection, node: &CategoryNode) -> DbResult<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO categories
            (external_id, name, context_free_name, parent_external_id, is_root, path)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(external_id) DO UPDATE SET
            name = excluded.name,
            context_free_name = COALESCE(excluded.context_free_name, context_free_name),
            parent_external_id = COALESCE(excluded.parent_external_id, parent_external_id),
            is_root = excluded.is_root,
            path = COALESCE(excluded.path, path),
            updated_at = datetime('now')",
    )?;
    stmt.execute(params![
        node.external_id,
        node.name,
        node.context_free_name,
        node.parent_external_id,
        node.is_root,
        node.path,
    ])?;

    conn.query_row(
        "SELECT id FROM categories WHERE external_id = ?1",
        params![node.external_id],
        |row| row.get(0),
    )
}

// ── Per-product child tables ───────────────────────────────────────────────

/// Tables whose rows belong to exactly one product
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildTable {
    Variations,
    ProductCategories,
    Features,
    Images,
    ReviewSummaries,
}

impl ChildTable {
    pub fn name(&self) -> &'static str {
        match self {
            ChildTable::Variations => "product_variations",
            ChildTable::ProductCategories => "product_categories",
            ChildTable::Features => "product_features",
            ChildTable::Images => "product_images",
            ChildTable::ReviewSummaries => "review_summaries",
        }
    }

    /// Statement removing the rows a sync owns; only externally hosted
    /// images belong to the sync
    fn delete_sql(&self) -> &'static str {
        match self {
            ChildTable::Variations => "DELETE FROM product_variations WHERE product_id = ?1",
            ChildTable::ProductCategories => "DELETE FROM product_categories WHERE product_id = ?1",
            ChildTable::Features => "DELETE FROM product_features WHERE product_id = ?1",
            ChildTable::Images => {
                "DELETE FROM product_images WHERE product_id = ?1 AND is_external = 1"
            }
            ChildTable::ReviewSummaries => "DELETE FROM review_summaries WHERE product_id = ?1",
        }
    }

    fn count_sql(&self) -> &'static str {
        match self {
            ChildTable::Variations => "SELECT COUNT(*) FROM product_variations WHERE product_id = ?1",
            ChildTable::ProductCategories => {
                "SELECT COUNT(*) FROM product_categories WHERE product_id = ?1"
            }
            ChildTable::Features => "SELECT COUNT(*) FROM product_features WHERE product_id = ?1",
            ChildTable::Images => "SELECT COUNT(*) FROM product_images WHERE product_id = ?1",
            ChildTable::ReviewSummaries => {
                "SELECT COUNT(*) FROM review_summaries WHERE product_id = ?1"
            }
        }
    }
}

/// A row that is fully replaced per product on every sync
pub trait ChildRow {
    const TABLE: ChildTable;

    fn insert(&self, conn: &Connection, product_id: i64) -> DbResult<()>;
}

/// Delete the product's sync-owned rows in `R::TABLE` and insert `rows`
///
/// Returns the number of rows inserted.
pub fn replace_children<R: ChildRow>(
    tx: &Transaction<'_>,
    product_id: i64,
    rows: &[R],
) -> DbResult<usize> {
    let removed = tx.execute(R::TABLE.delete_sql(), params![product_id])?;
    for row in rows {
        row.insert(tx, product_id)?;
    }
    log::debug!(
        "{}: replaced {} row(s) with {} for product {}",
        R::TABLE.name(),
        removed,
        rows.len(),
        product_id
    );
    Ok(rows.len())
}

/// Rows in `table` belonging to `product_id` (all provenances)
pub fn count_rows(conn: &Connection, table: ChildTable, product_id: i64) -> DbResult<i64> {
    conn.query_row(table.count_sql(), params![product_id], |row| row.get(0))
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariationRow {
    pub external_id: String,
    pub variation_type: &'static str,
    pub value: String,
    pub code: String,
    /// Variant title as the catalog shows it
    pub display_name: Option<String>,
    pub condition: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub availability: Option<&'static str>,
    pub image_url: Option<String>,
    pub is_primary: bool,
    pub ordinal: i64,
}

impl ChildRow for VariationRow {
    const TABLE: ChildTable = ChildTable::Variations;

    fn insert(&self, conn: &Connection, product_id: i64) -> DbResult<()> {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO product_variations
                (product_id, external_id, variation_type, variation_value, variation_code,
                 display_name, condition, price, currency, availability, image_url,
                 is_primary, ordinal)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        stmt.execute(params![
            product_id,
            self.external_id,
            self.variation_type,
            self.value,
            self.code,
            self.display_name,
            self.condition,
            self.price,
            self.currency,
            self.availability,
            self.image_url,
            self.is_primary,
            self.ordinal,
        ])?;
        Ok(())
    }
}

/// Association of a product with an already-upserted catalog node
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryLinkRow {
    pub category_id: i64,
    pub rank: i64,
    pub is_primary: bool,
    pub source: &'static str,
}

impl ChildRow for CategoryLinkRow {
    const TABLE: ChildTable = ChildTable::ProductCategories;

    fn insert(&self, conn: &Connection, product_id: i64) -> DbResult<()> {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO product_categories (product_id, category_id, rank, is_primary, source)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![
            product_id,
            self.category_id,
            self.rank,
            self.is_primary,
            self.source,
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub text: String,
    pub feature_type: &'static str,
    pub is_highlighted: bool,
    pub ordinal: i64,
}

impl ChildRow for FeatureRow {
    const TABLE: ChildTable = ChildTable::Features;

    fn insert(&self, conn: &Connection, product_id: i64) -> DbResult<()> {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO product_features (product_id, feature_text, feature_type, is_highlighted, ordinal)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![
            product_id,
            self.text,
            self.feature_type,
            self.is_highlighted,
            self.ordinal,
        ])?;
        Ok(())
    }
}

/// Externally hosted image; sync never writes `is_external = 0` rows
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRow {
    pub url: String,
    pub image_type: &'static str,
    pub size: &'static str,
    pub is_primary: bool,
    pub ordinal: i64,
}

impl ChildRow for ImageRow {
    const TABLE: ChildTable = ChildTable::Images;

    fn insert(&self, conn: &Connection, product_id: i64) -> DbResult<()> {
        let mut stmt = conn.prepare_cached(
            "INSERT INTO product_images (product_id, url, image_type, size, is_primary, ordinal, is_external)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1)",
        )?;
        stmt.execute(params![
            product_id,
            self.url,
            self.image_type,
            self.size,
            self.is_primary,
            self.ordinal,
        ])?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSummaryRow {
    pub average_rating: Option<f64>,
    pub review_count: Option<i64>,
}

impl ChildRow for ReviewSummaryRow {
    const TABLE: ChildTable = ChildTable::ReviewSummaries;

    fn insert(&self, conn: &Connection, product_id: i64) -> DbResult<()> {
        conn.execute(
            "INSERT INTO review_summaries (product_id, average_rating, review_count)
             VALUES (?1, ?2, ?3)",
            params![product_id, self.average_rating, self.review_count],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create an in-memory database for testing
    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn feature(text: &str, ordinal: i64) -> FeatureRow {
        FeatureRow {
            text: text.to_string(),
            feature_type: "bullet_point",
            is_highlighted: ordinal < 3,
            ordinal,
        }
    }

    fn image(url: &str, ordinal: i64) -> ImageRow {
        ImageRow {
            url: url.to_string(),
            image_type: if ordinal == 0 { "primary" } else { "variant" },
            size: "large",
            is_primary: ordinal == 0,
            ordinal,
        }
    }

    fn node(id: &str, name: &str, parent: Option<&str>) -> CategoryNode {
        CategoryNode {
            external_id: id.to_string(),
            name: name.to_string(),
            context_free_name: None,
            parent_external_id: parent.map(str::to_string),
            is_root: parent.is_none(),
            path: None,
        }
    }

    #[test]
    fn init_schema_creates_tables() {
        let conn = test_db();

        for table in [
            "products",
            "brands",
            "product_variations",
            "categories",
            "product_categories",
            "product_features",
            "product_images",
            "review_summaries",
        ] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    params![table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn init_schema_is_idempotent() {
        let conn = test_db();
        init_schema(&conn).unwrap();
    }

    #[test]
    fn file_backed_database_keeps_products_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.db");

        let id = {
            let conn = Connection::open(&path).unwrap();
            init_schema(&conn).unwrap();
            insert_product(&conn, "B000TEST01", Some("Sheets")).unwrap()
        };

        let conn = Connection::open(&path).unwrap();
        init_schema(&conn).unwrap();
        assert!(product_exists(&conn, id).unwrap());
        assert_eq!(stale_candidates(&conn, 7, None).unwrap().len(), 1);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let mut conn = test_db();
        let tx = conn.transaction().unwrap();
        let result = replace_children(&tx, 999, &[feature("orphan", 0)]);
        assert!(result.is_err());
    }

    #[test]
    fn insert_product_and_lookup() {
        let conn = test_db();
        let id = insert_product(&conn, "B000TEST01", Some("Sheets")).unwrap();

        assert!(product_exists(&conn, id).unwrap());
        assert!(!product_exists(&conn, id + 1).unwrap());

        let product = get_product(&conn, id).unwrap().unwrap();
        assert_eq!(product.external_id.as_deref(), Some("B000TEST01"));
        assert_eq!(product.title.as_deref(), Some("Sheets"));
        assert!(product.last_synced_at.is_none());
        assert!(get_product(&conn, id + 1).unwrap().is_none());
    }

    #[test]
    fn insert_product_rejects_duplicate_external_id() {
        let conn = test_db();
        insert_product(&conn, "B000TEST01", None).unwrap();
        assert!(insert_product(&conn, "B000TEST01", None).is_err());
    }

    #[test]
    fn update_product_keeps_absent_fields() {
        let conn = test_db();
        let id = insert_product(&conn, "B000TEST01", Some("Old title")).unwrap();

        let first = ProductUpdate {
            price: Some(49.99),
            currency: Some("USD".to_string()),
            thread_count: Some(1000),
            ..Default::default()
        };
        update_product(&conn, id, &first).unwrap();

        let second = ProductUpdate {
            title: Some("New title".to_string()),
            ..Default::default()
        };
        update_product(&conn, id, &second).unwrap();

        let product = get_product(&conn, id).unwrap().unwrap();
        assert_eq!(product.title.as_deref(), Some("New title"));
        assert_eq!(product.price, Some(49.99));
        assert_eq!(product.thread_count, Some(1000));
        assert!(product.last_synced_at.is_some());
    }

    #[test]
    fn update_product_unknown_id_fails() {
        let conn = test_db();
        let result = update_product(&conn, 42, &ProductUpdate::default());
        assert!(matches!(result, Err(rusqlite::Error::QueryReturnedNoRows)));
    }

    #[test]
    fn find_or_create_brand_dedups_by_name() {
        let conn = test_db();

        let (id1, created1) = find_or_create_brand(&conn, "Acme", Some("Acme Textiles")).unwrap();
        let (id2, created2) = find_or_create_brand(&conn, "Acme", None).unwrap();
        let (id3, created3) = find_or_create_brand(&conn, "Other", None).unwrap();

        assert!(created1);
        assert!(!created2);
        assert!(created3);
        assert_eq!(id1, id2);
        assert_ne!(id1, id3);

        let (display, reputation, tier, manufacturer): (String, f64, String, Option<String>) = conn
            .query_row(
                "SELECT display_name, reputation_score, tier, manufacturer FROM brands WHERE id = ?1",
                params![id1],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();
        assert_eq!(display, "Acme");
        assert!((reputation - 3.5).abs() < f64::EPSILON);
        assert_eq!(tier, "mid-tier");
        assert_eq!(manufacturer.as_deref(), Some("Acme Textiles"));
    }

    #[test]
    fn upsert_category_updates_in_place() {
        let conn = test_db();

        let id = upsert_category(&conn, &node("1063252", "Sheets", Some("1063236"))).unwrap();
        let mut renamed = node("1063252", "Sheets & Pillowcases", Some("1063236"));
        renamed.path = Some("Bedding > Sheets & Pillowcases".to_string());
        let again = upsert_category(&conn, &renamed).unwrap();

        assert_eq!(id, again);
        let (name, path): (String, Option<String>) = conn
            .query_row(
                "SELECT name, path FROM categories WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(name, "Sheets & Pillowcases");
        assert_eq!(path.as_deref(), Some("Bedding > Sheets & Pillowcases"));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn replace_children_replaces_all_rows() {
        let mut conn = test_db();
        let id = insert_product(&conn, "B000TEST01", None).unwrap();

        let tx = conn.transaction().unwrap();
        replace_children(&tx, id, &[feature("a", 0), feature("b", 1), feature("c", 2)]).unwrap();
        tx.commit().unwrap();
        assert_eq!(count_rows(&conn, ChildTable::Features, id).unwrap(), 3);

        let tx = conn.transaction().unwrap();
        let inserted = replace_children(&tx, id, &[feature("d", 0)]).unwrap();
        tx.commit().unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(count_rows(&conn, ChildTable::Features, id).unwrap(), 1);
    }

    #[test]
    fn replace_children_only_touches_own_product() {
        let mut conn = test_db();
        let a = insert_product(&conn, "A", None).unwrap();
        let b = insert_product(&conn, "B", None).unwrap();

        let tx = conn.transaction().unwrap();
        replace_children(&tx, a, &[feature("a", 0)]).unwrap();
        replace_children(&tx, b, &[feature("b", 0), feature("b2", 1)]).unwrap();
        replace_children::<FeatureRow>(&tx, a, &[]).unwrap();
        tx.commit().unwrap();

        assert_eq!(count_rows(&conn, ChildTable::Features, a).unwrap(), 0);
        assert_eq!(count_rows(&conn, ChildTable::Features, b).unwrap(), 2);
    }

    #[test]
    fn image_replace_keeps_manual_images() {
        let mut conn = test_db();
        let id = insert_product(&conn, "B000TEST01", None).unwrap();
        conn.execute(
            "INSERT INTO product_images (product_id, url, image_type, is_primary, ordinal, is_external)
             VALUES (?1, 'https://cdn.example/manual.jpg', 'lifestyle', 0, 9, 0)",
            params![id],
        )
        .unwrap();

        let tx = conn.transaction().unwrap();
        replace_children(&tx, id, &[image("https://img/1.jpg", 0), image("https://img/2.jpg", 1)])
            .unwrap();
        tx.commit().unwrap();

        let tx = conn.transaction().unwrap();
        replace_children(&tx, id, &[image("https://img/1.jpg", 0)]).unwrap();
        tx.commit().unwrap();

        assert_eq!(count_rows(&conn, ChildTable::Images, id).unwrap(), 2);
        let manual: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM product_images WHERE product_id = ?1 AND is_external = 0",
                params![id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(manual, 1);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let mut conn = test_db();
        let id = insert_product(&conn, "B000TEST01", None).unwrap();

        {
            let tx = conn.transaction().unwrap();
            replace_children(&tx, id, &[feature("never committed", 0)]).unwrap();
        }

        assert_eq!(count_rows(&conn, ChildTable::Features, id).unwrap(), 0);
    }

    #[test]
    fn review_summary_is_replaced_or_removed() {
        let mut conn = test_db();
        let id = insert_product(&conn, "B000TEST01", None).unwrap();
        let summary = ReviewSummaryRow {
            average_rating: Some(4.5),
            review_count: Some(1200),
        };

        let tx = conn.transaction().unwrap();
        replace_children(&tx, id, std::slice::from_ref(&summary)).unwrap();
        replace_children(&tx, id, std::slice::from_ref(&summary)).unwrap();
        tx.commit().unwrap();
        assert_eq!(count_rows(&conn, ChildTable::ReviewSummaries, id).unwrap(), 1);

        let tx = conn.transaction().unwrap();
        replace_children::<ReviewSummaryRow>(&tx, id, &[]).unwrap();
        tx.commit().unwrap();
        assert_eq!(count_rows(&conn, ChildTable::ReviewSummaries, id).unwrap(), 0);
    }

    #[test]
    fn stale_candidates_selects_unsynced_and_old() {
        let conn = test_db();
        let fresh = insert_product(&conn, "FRESH", None).unwrap();
        let never = insert_product(&conn, "NEVER", None).unwrap();
        let old = insert_product(&conn, "OLD", None).unwrap();
        let blank = insert_product(&conn, "", None).unwrap();

        conn.execute(
            "UPDATE products SET last_synced_at = datetime('now') WHERE id = ?1",
            params![fresh],
        )
        .unwrap();
        conn.execute(
            "UPDATE products SET last_synced_at = datetime('now', '-30 days') WHERE id = ?1",
            params![old],
        )
        .unwrap();

        let candidates = stale_candidates(&conn, 7, None).unwrap();
        let ids: Vec<i64> = candidates.iter().map(|c| c.product_id).collect();
        assert_eq!(ids, vec![never, old]);
        assert!(!ids.contains(&blank));

        let limited = stale_candidates(&conn, 7, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].external_id, "NEVER");
    }
}
