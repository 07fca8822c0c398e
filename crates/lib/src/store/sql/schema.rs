//! Table definition for the SQL store.
//!
//! The table is derived from the store's [`OrderingConfig`]. The
//! `(collection..., position)` index is not unique: a bulk shift passes
//! through transient duplicates.

use crate::Result;
use crate::config::{OrderingConfig, ValueKind};
use crate::store::StoreError;

use super::SqlStore;

/// Quote an identifier. Names are validated by [`OrderingConfig::validate`]
/// before they get here.
pub(crate) fn ident(name: &str) -> String {
    format!("\"{name}\"")
}

fn column_type(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Integer => "BIGINT",
        ValueKind::Text => "TEXT",
    }
}

/// `CREATE TABLE` statement for `config`.
pub fn create_table(config: &OrderingConfig) -> String {
    let mut columns = vec![format!("{} TEXT PRIMARY KEY NOT NULL", ident(&config.id_column))];
    for field in &config.collection {
        columns.push(format!("{} {}", ident(&field.name), column_type(field.kind)));
    }
    columns.push(format!("{} BIGINT NOT NULL", ident(&config.field)));
    for field in &config.auto_refresh {
        columns.push(format!("{} BIGINT", ident(field)));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
        ident(&config.table),
        columns.join(",\n    ")
    )
}

/// `CREATE INDEX` statement over the collection columns and position.
pub fn create_index(config: &OrderingConfig) -> String {
    let columns: Vec<String> = config
        .collection
        .iter()
        .map(|f| ident(&f.name))
        .chain(std::iter::once(ident(&config.field)))
        .collect();
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        ident(&format!("idx_{}_{}", config.table, config.field)),
        ident(&config.table),
        columns.join(", ")
    )
}

/// Create the table and index if they don't exist.
pub async fn initialize(store: &SqlStore) -> Result<()> {
    let layout = store.layout();
    for statement in [create_table(layout), create_index(layout)] {
        sqlx::query(&statement)
            .execute(store.pool())
            .await
            .map_err(|e| StoreError::SqlxError {
                reason: format!("Schema creation failed: {e} - SQL: {statement}"),
                source: Some(e),
            })?;
    }
    tracing::info!(table = %layout.table, "SQL store schema ready");
    Ok(())
}
