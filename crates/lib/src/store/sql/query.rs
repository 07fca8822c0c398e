//! Statement building and execution for the SQL store.
//!
//! Identifiers come from the validated layout and are quoted; every value is
//! bound as a parameter. `NULL` collection values turn into `IS NULL` in
//! predicates and a literal `NULL` in inserts.

use std::ops::Bound;

use sqlx::Row as _;
use sqlx::any::{AnyArguments, AnyRow};
use sqlx::{Any, AnyConnection};
use sqlx::query::Query;

use crate::Result;
use crate::config::{CollectionField, OrderingConfig, ValueKind};
use crate::item::{CollectionKey, FieldValue, ItemId, Row};
use crate::store::{PositionRange, Shift, StoreError};

use super::schema::ident;
use super::{DbKind, SqlxResultExt};

#[derive(Debug, Clone)]
enum Bind {
    Int(i64),
    Text(String),
}

/// Parameter list that hands out `$n` placeholders in push order.
#[derive(Debug, Default)]
struct Binds(Vec<Bind>);

impl Binds {
    fn push(&mut self, bind: Bind) -> String {
        self.0.push(bind);
        format!("${}", self.0.len())
    }

    fn apply<'q>(&self, sql: &'q str) -> Query<'q, Any, AnyArguments<'q>> {
        let mut query = sqlx::query(sql);
        for bind in &self.0 {
            query = match bind {
                Bind::Int(v) => query.bind(*v),
                Bind::Text(v) => query.bind(v.clone()),
            };
        }
        query
    }
}

fn value_bind(field: &CollectionField, value: &FieldValue) -> Result<Option<Bind>> {
    match (field.kind, value) {
        (_, FieldValue::Null) => Ok(None),
        (ValueKind::Integer, FieldValue::Integer(v)) => Ok(Some(Bind::Int(*v))),
        (ValueKind::Text, FieldValue::Text(v)) => Ok(Some(Bind::Text(v.clone()))),
        (kind, value) => Err(StoreError::InvalidRow {
            reason: format!(
                "value {value} does not fit {kind:?} column '{}'",
                field.name
            ),
        }
        .into()),
    }
}

fn check_arity(layout: &OrderingConfig, key: &CollectionKey) -> Result<()> {
    if key.len() != layout.collection.len() {
        return Err(StoreError::ArityMismatch {
            expected: layout.collection.len(),
            actual: key.len(),
        }
        .into());
    }
    Ok(())
}

fn collection_conditions(
    layout: &OrderingConfig,
    key: &CollectionKey,
    binds: &mut Binds,
) -> Result<Vec<String>> {
    check_arity(layout, key)?;
    let mut conditions = Vec::with_capacity(key.len());
    for (field, value) in layout.collection.iter().zip(key.values()) {
        let column = ident(&field.name);
        match value_bind(field, value)? {
            None => conditions.push(format!("{column} IS NULL")),
            Some(bind) => conditions.push(format!("{column} = {}", binds.push(bind))),
        }
    }
    Ok(conditions)
}

fn range_conditions(
    layout: &OrderingConfig,
    range: PositionRange,
    binds: &mut Binds,
) -> Vec<String> {
    let column = ident(&layout.field);
    let lower = match range.lower {
        Bound::Included(l) => Some((">=", l)),
        Bound::Excluded(l) => Some((">", l)),
        Bound::Unbounded => None,
    };
    let upper = match range.upper {
        Bound::Included(u) => Some(("<=", u)),
        Bound::Excluded(u) => Some(("<", u)),
        Bound::Unbounded => None,
    };
    lower
        .into_iter()
        .chain(upper)
        .map(|(op, value)| format!("{column} {op} {}", binds.push(Bind::Int(value))))
        .collect()
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    }
}

fn select_list(layout: &OrderingConfig) -> String {
    std::iter::once(ident(&layout.id_column))
        .chain(layout.collection.iter().map(|f| ident(&f.name)))
        .chain(std::iter::once(ident(&layout.field)))
        .chain(layout.auto_refresh.iter().map(|f| ident(f)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn decode(layout: &OrderingConfig, row: &AnyRow) -> Result<Row> {
    let id: String = row.try_get(0).sql_context("Failed to decode id")?;
    let mut index = 1;
    let mut values = Vec::with_capacity(layout.collection.len());
    for field in &layout.collection {
        let value = match field.kind {
            ValueKind::Integer => FieldValue::from(
                row.try_get::<Option<i64>, _>(index)
                    .sql_context("Failed to decode collection column")?,
            ),
            ValueKind::Text => FieldValue::from(
                row.try_get::<Option<String>, _>(index)
                    .sql_context("Failed to decode collection column")?,
            ),
        };
        values.push(value);
        index += 1;
    }
    let position: i64 = row
        .try_get(index)
        .sql_context("Failed to decode position")?;
    index += 1;
    let mut stamps = std::collections::BTreeMap::new();
    for field in &layout.auto_refresh {
        if let Some(millis) = row
            .try_get::<Option<i64>, _>(index)
            .sql_context("Failed to decode auto-refresh column")?
        {
            stamps.insert(field.clone(), millis as u64);
        }
        index += 1;
    }
    Ok(Row {
        id: ItemId::from(id),
        collection: CollectionKey::new(values),
        position,
        stamps,
    })
}

/// Count the rows of a collection.
pub(super) async fn count(
    layout: &OrderingConfig,
    conn: &mut AnyConnection,
    collection: &CollectionKey,
) -> Result<u64> {
    let mut binds = Binds::default();
    let conditions = collection_conditions(layout, collection, &mut binds)?;
    let sql = format!(
        "SELECT COUNT(*) FROM {}{}",
        ident(&layout.table),
        where_clause(&conditions)
    );
    let row = binds
        .apply(&sql)
        .fetch_one(&mut *conn)
        .await
        .sql_context("Failed to count collection")?;
    let count: i64 = row.try_get(0).sql_context("Failed to decode count")?;
    Ok(count as u64)
}

/// Read a position range of a collection in ascending order.
pub(super) async fn read(
    layout: &OrderingConfig,
    conn: &mut AnyConnection,
    collection: &CollectionKey,
    range: PositionRange,
    limit: Option<u32>,
) -> Result<Vec<Row>> {
    let mut binds = Binds::default();
    let mut conditions = collection_conditions(layout, collection, &mut binds)?;
    conditions.extend(range_conditions(layout, range, &mut binds));
    let mut sql = format!(
        "SELECT {} FROM {}{} ORDER BY {} ASC, {} ASC",
        select_list(layout),
        ident(&layout.table),
        where_clause(&conditions),
        ident(&layout.field),
        ident(&layout.id_column),
    );
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    let rows = binds
        .apply(&sql)
        .fetch_all(&mut *conn)
        .await
        .sql_context("Failed to read collection")?;
    rows.iter().map(|row| decode(layout, row)).collect()
}

/// Fetch one row by identity.
pub(super) async fn get(
    layout: &OrderingConfig,
    conn: &mut AnyConnection,
    id: &ItemId,
) -> Result<Row> {
    let mut binds = Binds::default();
    let placeholder = binds.push(Bind::Text(id.to_string()));
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = {placeholder}",
        select_list(layout),
        ident(&layout.table),
        ident(&layout.id_column),
    );
    let row = binds
        .apply(&sql)
        .fetch_optional(&mut *conn)
        .await
        .sql_context("Failed to get row")?;
    match row {
        Some(row) => decode(layout, &row),
        None => Err(StoreError::RowNotFound { id: id.clone() }.into()),
    }
}

/// Apply a bulk shift as a single UPDATE.
pub(super) async fn shift(
    layout: &OrderingConfig,
    conn: &mut AnyConnection,
    shift: &Shift,
) -> Result<u64> {
    let position = ident(&layout.field);
    let mut binds = Binds::default();

    let mut assignments = vec![format!(
        "{position} = {position} + {}",
        binds.push(Bind::Int(shift.delta))
    )];
    if let Some(stamp) = &shift.stamp {
        for field in &stamp.fields {
            assignments.push(format!(
                "{} = {}",
                ident(field),
                binds.push(Bind::Int(stamp.millis as i64))
            ));
        }
    }

    let mut conditions = collection_conditions(layout, &shift.collection, &mut binds)?;
    conditions.extend(range_conditions(layout, shift.range, &mut binds));
    if let Some(exclude) = &shift.exclude {
        conditions.push(format!(
            "{} <> {}",
            ident(&layout.id_column),
            binds.push(Bind::Text(exclude.to_string()))
        ));
    }

    let sql = format!(
        "UPDATE {} SET {}{}",
        ident(&layout.table),
        assignments.join(", "),
        where_clause(&conditions)
    );
    let result = binds
        .apply(&sql)
        .execute(&mut *conn)
        .await
        .sql_context("Failed to shift positions")?;
    Ok(result.rows_affected())
}

/// Insert or replace a row.
pub(super) async fn put(
    layout: &OrderingConfig,
    kind: DbKind,
    conn: &mut AnyConnection,
    row: &Row,
) -> Result<()> {
    check_arity(layout, &row.collection)?;
    let mut binds = Binds::default();
    let mut columns = vec![ident(&layout.id_column)];
    let mut values = vec![binds.push(Bind::Text(row.id.to_string()))];

    for (field, value) in layout.collection.iter().zip(row.collection.values()) {
        columns.push(ident(&field.name));
        values.push(match value_bind(field, value)? {
            Some(bind) => binds.push(bind),
            None => "NULL".to_string(),
        });
    }
    columns.push(ident(&layout.field));
    values.push(binds.push(Bind::Int(row.position)));
    for field in &layout.auto_refresh {
        columns.push(ident(field));
        values.push(match row.stamps.get(field) {
            Some(millis) => binds.push(Bind::Int(*millis as i64)),
            None => "NULL".to_string(),
        });
    }

    let sql = if kind == DbKind::Sqlite {
        format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            ident(&layout.table),
            columns.join(", "),
            values.join(", ")
        )
    } else {
        let updates: Vec<String> = columns
            .iter()
            .skip(1)
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect();
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
            ident(&layout.table),
            columns.join(", "),
            values.join(", "),
            ident(&layout.id_column),
            updates.join(", ")
        )
    };

    binds
        .apply(&sql)
        .execute(&mut *conn)
        .await
        .sql_context("Failed to put row")?;
    Ok(())
}

/// Delete a row by identity.
pub(super) async fn remove(
    layout: &OrderingConfig,
    conn: &mut AnyConnection,
    id: &ItemId,
) -> Result<()> {
    let mut binds = Binds::default();
    let placeholder = binds.push(Bind::Text(id.to_string()));
    let sql = format!(
        "DELETE FROM {} WHERE {} = {placeholder}",
        ident(&layout.table),
        ident(&layout.id_column),
    );
    binds
        .apply(&sql)
        .execute(&mut *conn)
        .await
        .sql_context("Failed to remove row")?;
    Ok(())
}
