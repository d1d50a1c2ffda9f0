//! Postgres-backed stock & check store.
//!
//! ## Schema
//!
//! - `stocks`: one row per `(material_code, location_code)` (primary key)
//! - `inventory_check_records`: append-only, indexed by material and by
//!   `(is_processed, check_time)` for the reporting queries
//!
//! ## Concurrency
//!
//! `get_stock` reads with `SELECT ... FOR UPDATE`, so two transactions
//! checking the same existing pair serialize on the row lock. Two first-ever
//! checks of the same pair can both read "absent"; the upsert's
//! `ON CONFLICT` then makes the later writer win.
//!
//! ## Error Mapping
//!
//! | SQLx Error | StoreError |
//! |------------|------------|
//! | Database, SQLSTATE class `23` (integrity) | `Constraint` |
//! | Database, `57014` (query canceled / statement timeout) | `Timeout` |
//! | Database (other) | `Storage` |
//! | PoolTimedOut | `Timeout` |
//! | PoolClosed, Io, Tls | `Unavailable` |
//! | Other | `Storage` |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{instrument, Span};

use stocktake_core::{CheckRecordId, CheckerId, LocationCode, MaterialCode};
use stocktake_inventory::{CheckRecord, StockBalance, StockKey, StockLookup};

use super::query::{CheckRecordPage, CheckRecordQuery, Pagination};
use super::r#trait::{CheckStore, StoreError, StoreTransaction};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stocks (
        material_code VARCHAR(100) NOT NULL,
        location_code VARCHAR(100) NOT NULL,
        quantity      BIGINT       NOT NULL DEFAULT 0,
        created_at    TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
        updated_at    TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
        PRIMARY KEY (material_code, location_code)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS inventory_check_records (
        id              UUID         PRIMARY KEY,
        checker_id      VARCHAR(100) NOT NULL,
        location_code   VARCHAR(100) NOT NULL,
        material_code   VARCHAR(100) NOT NULL,
        actual_quantity BIGINT       NOT NULL,
        stock_quantity  BIGINT       NOT NULL,
        difference      BIGINT       NOT NULL,
        check_time      TIMESTAMPTZ  NOT NULL,
        is_processed    BOOLEAN      NOT NULL DEFAULT FALSE,
        created_at      TIMESTAMPTZ  NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_check_records_material
        ON inventory_check_records (material_code, check_time DESC)
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS idx_check_records_unprocessed
        ON inventory_check_records (is_processed, check_time)
    "#,
];

const RECORD_COLUMNS: &str = "id, checker_id, location_code, material_code, actual_quantity, \
     stock_quantity, difference, check_time, is_processed";

/// Connection pool settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub max_lifetime: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 100,
            min_connections: 10,
            max_lifetime: Duration::from_secs(3600),
        }
    }
}

/// Postgres-backed stock & check store.
///
/// Uses the SQLx connection pool, which is `Send + Sync`; each transaction
/// checks out one connection for its lifetime.
#[derive(Debug, Clone)]
pub struct PostgresCheckStore {
    pool: Arc<PgPool>,
}

impl PostgresCheckStore {
    /// Create a new store over an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Open a pool against `dsn`.
    pub async fn connect(dsn: &str, settings: &PoolSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .min_connections(settings.min_connections)
            .max_lifetime(settings.max_lifetime)
            .connect(dsn)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create tables and indexes if they don't exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    /// Close the pool; later `begin` calls fail with `StoreError::Unavailable`.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl CheckStore for PostgresCheckStore {
    type Tx = PostgresTransaction;

    async fn begin(&self) -> Result<Self::Tx, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PostgresTransaction { tx })
    }
}

/// Open Postgres transaction.
///
/// SQLx rolls an uncommitted transaction back when it is dropped.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    #[instrument(
        skip(self),
        fields(
            material_code = %key.material_code,
            location_code = %key.location_code,
            found = tracing::field::Empty
        ),
        err
    )]
    async fn get_stock(&mut self, key: &StockKey) -> Result<StockLookup, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT material_code, location_code, quantity, created_at, updated_at
            FROM stocks
            WHERE material_code = $1 AND location_code = $2
            FOR UPDATE
            "#,
        )
        .bind(key.material_code.as_str())
        .bind(key.location_code.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_stock", e))?;

        Span::current().record("found", row.is_some());
        match row {
            Some(row) => Ok(StockLookup::Found(stock_from_row(&row)?)),
            None => Ok(StockLookup::NotFound),
        }
    }

    #[instrument(skip(self, stock), fields(stock = %stock.key, quantity = stock.quantity), err)]
    async fn upsert_stock(&mut self, stock: &StockBalance) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO stocks (material_code, location_code, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (material_code, location_code)
            DO UPDATE SET
                quantity = EXCLUDED.quantity,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(stock.key.material_code.as_str())
        .bind(stock.key.location_code.as_str())
        .bind(stock.quantity)
        .bind(stock.created_at)
        .bind(stock.last_updated)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("upsert_stock", e))?;
        Ok(())
    }

    #[instrument(skip(self, record), fields(record_id = %record.id), err)]
    async fn insert_check_record(&mut self, record: &CheckRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO inventory_check_records (
                id,
                checker_id,
                location_code,
                material_code,
                actual_quantity,
                stock_quantity,
                difference,
                check_time,
                is_processed
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.checker_id.as_str())
        .bind(record.location_code.as_str())
        .bind(record.material_code.as_str())
        .bind(record.actual_quantity)
        .bind(record.stock_quantity)
        .bind(record.difference)
        .bind(record.check_time)
        .bind(record.is_processed)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_check_record", e))?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }
}

#[async_trait]
impl CheckRecordQuery for PostgresCheckStore {
    #[instrument(skip(self), fields(material_code = %material_code), err)]
    async fn records_by_material(
        &self,
        material_code: &MaterialCode,
        pagination: Pagination,
    ) -> Result<CheckRecordPage, StoreError> {
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM inventory_check_records WHERE material_code = $1",
        )
        .bind(material_code.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_records_by_material", e))?
        .try_get("total")
        .map_err(|e| map_sqlx_error("count_records_by_material", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_check_records \
             WHERE material_code = $1 \
             ORDER BY check_time DESC, id DESC \
             LIMIT $2 OFFSET $3"
        ))
        .bind(material_code.as_str())
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("records_by_material", e))?;

        page_from_rows(rows, total, pagination)
    }

    #[instrument(skip(self), err)]
    async fn unprocessed_records(&self, pagination: Pagination) -> Result<CheckRecordPage, StoreError> {
        let total: i64 = sqlx::query(
            "SELECT COUNT(*) AS total FROM inventory_check_records WHERE is_processed = FALSE",
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_unprocessed_records", e))?
        .try_get("total")
        .map_err(|e| map_sqlx_error("count_unprocessed_records", e))?;

        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM inventory_check_records \
             WHERE is_processed = FALSE \
             ORDER BY check_time ASC, id ASC \
             LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(pagination.limit))
        .bind(i64::from(pagination.offset))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("unprocessed_records", e))?;

        page_from_rows(rows, total, pagination)
    }
}

fn page_from_rows(
    rows: Vec<PgRow>,
    total: i64,
    pagination: Pagination,
) -> Result<CheckRecordPage, StoreError> {
    let records = rows
        .iter()
        .map(record_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    let total = total.max(0) as u64;
    let has_more = total > u64::from(pagination.offset) + u64::from(pagination.limit);

    Ok(CheckRecordPage {
        records,
        total,
        pagination,
        has_more,
    })
}

fn stock_from_row(row: &PgRow) -> Result<StockBalance, StoreError> {
    let material: String = row.try_get("material_code").map_err(|e| map_sqlx_error("read_stock_row", e))?;
    let location: String = row.try_get("location_code").map_err(|e| map_sqlx_error("read_stock_row", e))?;
    let quantity: i64 = row.try_get("quantity").map_err(|e| map_sqlx_error("read_stock_row", e))?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(|e| map_sqlx_error("read_stock_row", e))?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(|e| map_sqlx_error("read_stock_row", e))?;

    Ok(StockBalance {
        key: StockKey::new(
            MaterialCode::try_from(material).map_err(corrupt_row)?,
            LocationCode::try_from(location).map_err(corrupt_row)?,
        ),
        quantity,
        created_at,
        last_updated: updated_at,
    })
}

fn record_from_row(row: &PgRow) -> Result<CheckRecord, StoreError> {
    let read = |e| map_sqlx_error("read_check_record_row", e);

    let id: uuid::Uuid = row.try_get("id").map_err(read)?;
    let checker_id: String = row.try_get("checker_id").map_err(read)?;
    let location_code: String = row.try_get("location_code").map_err(read)?;
    let material_code: String = row.try_get("material_code").map_err(read)?;

    Ok(CheckRecord {
        id: CheckRecordId::from_uuid(id),
        checker_id: CheckerId::try_from(checker_id).map_err(corrupt_row)?,
        location_code: LocationCode::try_from(location_code).map_err(corrupt_row)?,
        material_code: MaterialCode::try_from(material_code).map_err(corrupt_row)?,
        actual_quantity: row.try_get("actual_quantity").map_err(read)?,
        stock_quantity: row.try_get("stock_quantity").map_err(read)?,
        difference: row.try_get("difference").map_err(read)?,
        check_time: row.try_get("check_time").map_err(read)?,
        is_processed: row.try_get("is_processed").map_err(read)?,
    })
}

fn corrupt_row(err: stocktake_core::DomainError) -> StoreError {
    StoreError::Storage(format!("stored row failed validation: {err}"))
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.starts_with("23") => StoreError::Constraint(msg),
                Some(code) if code.as_ref() == "57014" => StoreError::Timeout(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Timeout(format!("timed out acquiring a connection in {}", operation))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {}: {}", operation, e)),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {}: {}", operation, e)),
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_failures_map_to_unavailable_or_timeout() {
        assert!(matches!(
            map_sqlx_error("begin_transaction", sqlx::Error::PoolClosed),
            StoreError::Unavailable(msg) if msg.contains("begin_transaction")
        ));
        assert!(matches!(
            map_sqlx_error("begin_transaction", sqlx::Error::PoolTimedOut),
            StoreError::Timeout(_)
        ));
    }

    #[test]
    fn io_failure_maps_to_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(matches!(
            map_sqlx_error("get_stock", sqlx::Error::Io(io)),
            StoreError::Unavailable(_)
        ));
    }

    #[test]
    fn other_failures_map_to_storage() {
        assert!(matches!(
            map_sqlx_error("get_stock", sqlx::Error::RowNotFound),
            StoreError::Storage(msg) if msg.contains("get_stock")
        ));
    }

    #[test]
    fn schema_covers_both_tables_and_reporting_indexes() {
        let ddl = SCHEMA.join("\n");
        assert!(ddl.contains("PRIMARY KEY (material_code, location_code)"));
        assert!(ddl.contains("inventory_check_records"));
        assert!(ddl.contains("(is_processed, check_time)"));
    }

    #[test]
    fn default_pool_settings_match_service_defaults() {
        let settings = PoolSettings::default();
        assert_eq!(settings.max_connections, 100);
        assert_eq!(settings.min_connections, 10);
        assert_eq!(settings.max_lifetime, Duration::from_secs(3600));
    }
}
