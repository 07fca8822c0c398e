//! SQL-backed store.
//!
//! Rows live in one table whose layout is derived from an
//! [`OrderingConfig`]: the id column, one column per collection field, the
//! position column and one nullable `BIGINT` per auto-refresh field.
//!
//! ## Available Databases
//!
//! - **SQLite** (feature: `sqlite`)
//! - **PostgreSQL** (feature: `postgres`)
//!
//! ## Architecture
//!
//! sqlx's `AnyPool` carries both dialects. Every [`Store`] call is one SQL
//! statement; in particular a [`Shift`] is a single
//! `UPDATE … SET position = position + $n` over a range predicate, never a
//! read-modify-write loop.
//!
//! [`Store::begin`] opens an sqlx transaction. On SQLite, which allows one
//! writer at a time, transactions of the same store queue behind each other
//! instead of failing with `SQLITE_BUSY`.

mod query;

/// Table and index creation.
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::Result;
use crate::config::OrderingConfig;
use crate::item::{CollectionKey, ItemId, Row};
use crate::store::{PositionRange, Shift, Store, StoreError, StoreTransaction};

/// Extension trait for sqlx Result types to simplify error handling.
pub(crate) trait SqlxResultExt<T> {
    /// Convert sqlx error to StoreError with context message.
    fn sql_context(self, context: &str) -> Result<T>;
}

impl<T> SqlxResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn sql_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            StoreError::SqlxError {
                reason: format!("{context}: {e}"),
                source: Some(e),
            }
            .into()
        })
    }
}

/// Database kind for SQL dialect selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    /// SQLite database
    Sqlite,
    /// PostgreSQL database
    Postgres,
}

/// [`Store`] over a relational table.
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: AnyPool,
    kind: DbKind,
    layout: Arc<OrderingConfig>,
    writer: Arc<Mutex<()>>,
}

impl SqlStore {
    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    /// The table layout this store reads and writes.
    pub fn layout(&self) -> &OrderingConfig {
        &self.layout
    }

    /// Check if this store is using SQLite.
    pub fn is_sqlite(&self) -> bool {
        self.kind == DbKind::Sqlite
    }

    async fn acquire(&self) -> Result<PoolConnection<Any>> {
        self.pool
            .acquire()
            .await
            .sql_context("Failed to acquire connection")
    }

    async fn with_pool(pool: AnyPool, kind: DbKind, config: OrderingConfig) -> Result<Self> {
        config.validate()?;
        let store = Self {
            pool,
            kind,
            layout: Arc::new(config),
            writer: Arc::new(Mutex::new(())),
        };
        schema::initialize(&store).await?;
        Ok(store)
    }
}

#[cfg(feature = "sqlite")]
impl SqlStore {
    /// Open a SQLite database file, creating it and the table if needed.
    pub async fn open_sqlite<P: AsRef<std::path::Path>>(
        path: P,
        config: OrderingConfig,
    ) -> Result<Self> {
        // mode=rwc: read-write-create
        let url = format!("sqlite:{}?mode=rwc", path.as_ref().display());
        Self::connect_sqlite(&url, config).await
    }

    /// Connect to a SQLite database using a connection URL.
    pub async fn connect_sqlite(url: &str, config: OrderingConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let is_in_memory = url.contains("mode=memory");

        // An in-memory database disappears with its last connection, so keep
        // one open for the lifetime of the pool.
        let pool = if is_in_memory {
            AnyPoolOptions::new()
                .max_connections(5)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        } else {
            AnyPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await
                .sql_context("Failed to connect to SQLite")?
        };

        if is_in_memory {
            sqlx::query("PRAGMA busy_timeout = 5000;")
                .execute(&pool)
                .await
                .sql_context("Failed to configure SQLite")?;
        } else {
            sqlx::query(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA busy_timeout = 5000;",
            )
            .execute(&pool)
            .await
            .sql_context("Failed to configure SQLite")?;
        }

        Self::with_pool(pool, DbKind::Sqlite, config).await
    }

    /// Create a private in-memory SQLite database.
    pub async fn sqlite_in_memory(config: OrderingConfig) -> Result<Self> {
        // Shared cache so every pooled connection sees the same database; a
        // unique name so separate stores do not.
        let unique_id = uuid::Uuid::new_v4();
        let url = format!("sqlite:file:mem_{unique_id}?mode=memory&cache=shared");
        Self::connect_sqlite(&url, config).await
    }
}

#[cfg(feature = "postgres")]
impl SqlStore {
    /// Connect to a PostgreSQL database using a connection URL.
    pub async fn connect_postgres(url: &str, config: OrderingConfig) -> Result<Self> {
        sqlx::any::install_default_drivers();

        let pool = AnyPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .sql_context("Failed to connect to PostgreSQL")?;

        Self::with_pool(pool, DbKind::Postgres, config).await
    }
}

#[async_trait]
impl Store for SqlStore {
    async fn count(&self, collection: &CollectionKey) -> Result<u64> {
        let mut conn = self.acquire().await?;
        query::count(&self.layout, &mut conn, collection).await
    }

    async fn read(&self, collection: &CollectionKey, range: PositionRange) -> Result<Vec<Row>> {
        let mut conn = self.acquire().await?;
        query::read(&self.layout, &mut conn, collection, range, None).await
    }

    async fn first(&self, collection: &CollectionKey, range: PositionRange) -> Result<Option<Row>> {
        let mut conn = self.acquire().await?;
        let rows = query::read(&self.layout, &mut conn, collection, range, Some(1)).await?;
        Ok(rows.into_iter().next())
    }

    async fn get(&self, id: &ItemId) -> Result<Row> {
        let mut conn = self.acquire().await?;
        query::get(&self.layout, &mut conn, id).await
    }

    async fn shift(&self, shift: &Shift) -> Result<u64> {
        let mut conn = self.acquire().await?;
        query::shift(&self.layout, &mut conn, shift).await
    }

    async fn put(&self, row: Row) -> Result<()> {
        let mut conn = self.acquire().await?;
        query::put(&self.layout, self.kind, &mut conn, &row).await
    }

    async fn remove(&self, id: &ItemId) -> Result<()> {
        let mut conn = self.acquire().await?;
        query::remove(&self.layout, &mut conn, id).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let writer = if self.is_sqlite() {
            Some(self.writer.clone().lock_owned().await)
        } else {
            None
        };
        let tx = self
            .pool
            .begin()
            .await
            .sql_context("Failed to begin transaction")?;
        Ok(Box::new(SqlTransaction {
            tx: Mutex::new(tx),
            kind: self.kind,
            layout: self.layout.clone(),
            _writer: writer,
        }))
    }
}

/// A transaction on a [`SqlStore`].
///
/// Dropping it without [`commit`](StoreTransaction::commit) rolls back.
pub struct SqlTransaction {
    tx: Mutex<sqlx::Transaction<'static, Any>>,
    kind: DbKind,
    layout: Arc<OrderingConfig>,
    _writer: Option<OwnedMutexGuard<()>>,
}

impl std::fmt::Debug for SqlTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlTransaction")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Store for SqlTransaction {
    async fn count(&self, collection: &CollectionKey) -> Result<u64> {
        let mut tx = self.tx.lock().await;
        query::count(&self.layout, &mut tx, collection).await
    }

    async fn read(&self, collection: &CollectionKey, range: PositionRange) -> Result<Vec<Row>> {
        let mut tx = self.tx.lock().await;
        query::read(&self.layout, &mut tx, collection, range, None).await
    }

    async fn first(&self, collection: &CollectionKey, range: PositionRange) -> Result<Option<Row>> {
        let mut tx = self.tx.lock().await;
        let rows = query::read(&self.layout, &mut tx, collection, range, Some(1)).await?;
        Ok(rows.into_iter().next())
    }

    async fn get(&self, id: &ItemId) -> Result<Row> {
        let mut tx = self.tx.lock().await;
        query::get(&self.layout, &mut tx, id).await
    }

    async fn shift(&self, shift: &Shift) -> Result<u64> {
        let mut tx = self.tx.lock().await;
        query::shift(&self.layout, &mut tx, shift).await
    }

    async fn put(&self, row: Row) -> Result<()> {
        let mut tx = self.tx.lock().await;
        query::put(&self.layout, self.kind, &mut tx, &row).await
    }

    async fn remove(&self, id: &ItemId) -> Result<()> {
        let mut tx = self.tx.lock().await;
        query::remove(&self.layout, &mut tx, id).await
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Err(StoreError::NestedTransaction.into())
    }
}

#[async_trait]
impl StoreTransaction for SqlTransaction {
    fn as_store(&self) -> &dyn Store {
        self
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx
            .into_inner()
            .commit()
            .await
            .sql_context("Failed to commit transaction")
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx
            .into_inner()
            .rollback()
            .await
            .sql_context("Failed to roll back transaction")
    }
}
