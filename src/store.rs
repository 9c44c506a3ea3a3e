//! Generic CRUD over the master collections.
//!
//! Every master screen follows the same contract: list everything, validate
//! required fields before any write, write, and hand back the refreshed
//! list. The per-collection details (table, columns, required fields,
//! ordering, search fields) live on [`MasterRecord`] implementations in
//! [`crate::model`].

use crate::search::Searchable;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Map;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("invalid {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("{collection} {id} not found")]
    NotFound { collection: &'static str, id: String },

    #[error("{field} already in use: {value}")]
    Conflict { field: &'static str, value: String },

    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("{op} failed: {source}")]
    Write {
        op: WriteOp,
        #[source]
        source: rusqlite::Error,
    },

    #[error("invalid document: {0}")]
    Document(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
    Transaction,
}

impl std::fmt::Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WriteOp::Insert => "insert",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
            WriteOp::Transaction => "transaction",
        })
    }
}

impl StoreError {
    pub fn insert(source: rusqlite::Error) -> Self {
        StoreError::Write {
            op: WriteOp::Insert,
            source,
        }
    }

    pub fn update(source: rusqlite::Error) -> Self {
        StoreError::Write {
            op: WriteOp::Update,
            source,
        }
    }

    pub fn delete(source: rusqlite::Error) -> Self {
        StoreError::Write {
            op: WriteOp::Delete,
            source,
        }
    }

    pub fn tx(source: rusqlite::Error) -> Self {
        StoreError::Write {
            op: WriteOp::Transaction,
            source,
        }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        StoreError::InvalidField {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Wire error code, in the vocabulary the UI shell switches on.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::MissingFields(_) => "validation_failed",
            StoreError::InvalidField { .. } | StoreError::Document(_) => "bad_params",
            StoreError::NotFound { .. } => "not_found",
            StoreError::Conflict { .. } => "conflict",
            StoreError::Query(_) => "db_query_failed",
            StoreError::Write { op, .. } => match op {
                WriteOp::Insert => "db_insert_failed",
                WriteOp::Update => "db_update_failed",
                WriteOp::Delete => "db_delete_failed",
                WriteOp::Transaction => "db_tx_failed",
            },
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A document type stored in one table of the workspace database.
pub trait MasterRecord: Searchable + Serialize + DeserializeOwned + Sized {
    /// Collection name used on the wire (`institutions`, `subLocations`, ...).
    const COLLECTION: &'static str;
    const TABLE: &'static str;
    /// Stored columns, `id` excluded, in the order of [`MasterRecord::values`].
    const COLUMNS: &'static [&'static str];
    /// camelCase document fields that must be non-empty on every write.
    const REQUIRED: &'static [&'static str];
    const ORDER_BY: &'static str;

    fn id(&self) -> &str;
    fn assign_id(&mut self, id: String);
    /// Reads `id` from column 0 and the rest in [`MasterRecord::COLUMNS`] order.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
    fn values(&self) -> Vec<Value>;

    /// Normalises and checks field values after deserialisation.
    fn normalize(&mut self) -> StoreResult<()> {
        Ok(())
    }
}

/// Names of the required fields that are absent, null, or blank.
pub fn missing_required(doc: &Map<String, serde_json::Value>, required: &[&str]) -> Vec<String> {
    required
        .iter()
        .filter(|field| match doc.get(**field) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.trim().is_empty(),
            Some(serde_json::Value::Array(a)) => a.is_empty(),
            Some(_) => false,
        })
        .map(|field| field.to_string())
        .collect()
}

fn select_sql<T: MasterRecord>() -> String {
    format!("SELECT id, {} FROM {}", T::COLUMNS.join(", "), T::TABLE)
}

pub fn list<T: MasterRecord>(conn: &Connection) -> StoreResult<Vec<T>> {
    let sql = format!("{} ORDER BY {}", select_sql::<T>(), T::ORDER_BY);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| T::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Lists documents whose `column` equals `value`. `column` must be one of
/// the record's stored columns.
pub fn list_by<T: MasterRecord>(conn: &Connection, column: &str, value: &str) -> StoreResult<Vec<T>> {
    if !T::COLUMNS.contains(&column) {
        return Err(StoreError::invalid(column, "not a stored column"));
    }
    let sql = format!(
        "{} WHERE {} = ? ORDER BY {}",
        select_sql::<T>(),
        column,
        T::ORDER_BY
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([value], |row| T::from_row(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get<T: MasterRecord>(conn: &Connection, id: &str) -> StoreResult<Option<T>> {
    let sql = format!("{} WHERE id = ?", select_sql::<T>());
    let found = conn
        .query_row(&sql, [id], |row| T::from_row(row))
        .optional()?;
    Ok(found)
}

pub fn count<T: MasterRecord>(conn: &Connection) -> StoreResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", T::TABLE);
    Ok(conn.query_row(&sql, [], |r| r.get(0))?)
}

/// Validates `doc`, turns it into a record and assigns a fresh id. Nothing
/// is written.
pub fn prepare_new<T: MasterRecord>(doc: &serde_json::Value) -> StoreResult<T> {
    let mut fields = doc
        .as_object()
        .cloned()
        .ok_or_else(|| StoreError::invalid("document", "must be a JSON object"))?;
    fields.remove("id");

    let missing = missing_required(&fields, T::REQUIRED);
    if !missing.is_empty() {
        return Err(StoreError::MissingFields(missing));
    }

    let mut record: T = serde_json::from_value(serde_json::Value::Object(fields))?;
    record.normalize()?;
    record.assign_id(Uuid::new_v4().to_string());
    Ok(record)
}

pub fn insert<T: MasterRecord>(conn: &Connection, record: &T) -> StoreResult<()> {
    let placeholders = vec!["?"; T::COLUMNS.len() + 1].join(", ");
    let sql = format!(
        "INSERT INTO {}(id, {}) VALUES({})",
        T::TABLE,
        T::COLUMNS.join(", "),
        placeholders
    );
    let mut values = vec![Value::Text(record.id().to_string())];
    values.extend(record.values());
    conn.execute(&sql, params_from_iter(values))
        .map_err(StoreError::insert)?;
    Ok(())
}

pub fn create<T: MasterRecord>(conn: &Connection, doc: &serde_json::Value) -> StoreResult<T> {
    let record = prepare_new::<T>(doc)?;
    insert(conn, &record)?;
    tracing::debug!(collection = T::COLLECTION, id = record.id(), "created");
    Ok(record)
}

/// Merges `patch` over the stored document, revalidates the result, and
/// writes it back.
pub fn update<T: MasterRecord>(
    conn: &Connection,
    id: &str,
    patch: &serde_json::Value,
) -> StoreResult<T> {
    let patch = patch
        .as_object()
        .ok_or_else(|| StoreError::invalid("patch", "must be a JSON object"))?;
    let existing = get::<T>(conn, id)?.ok_or_else(|| StoreError::NotFound {
        collection: T::COLLECTION,
        id: id.to_string(),
    })?;

    let mut merged = match serde_json::to_value(&existing)? {
        serde_json::Value::Object(m) => m,
        _ => return Err(StoreError::invalid("document", "must be a JSON object")),
    };
    for (k, v) in patch {
        if k != "id" {
            merged.insert(k.clone(), v.clone());
        }
    }

    let missing = missing_required(&merged, T::REQUIRED);
    if !missing.is_empty() {
        return Err(StoreError::MissingFields(missing));
    }

    let mut record: T = serde_json::from_value(serde_json::Value::Object(merged))?;
    record.normalize()?;
    record.assign_id(id.to_string());

    let assignments = T::COLUMNS
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE {} SET {} WHERE id = ?", T::TABLE, assignments);
    let mut values = record.values();
    values.push(Value::Text(id.to_string()));
    conn.execute(&sql, params_from_iter(values))
        .map_err(StoreError::update)?;
    tracing::debug!(collection = T::COLLECTION, id, "updated");
    Ok(record)
}

pub fn delete<T: MasterRecord>(conn: &Connection, id: &str) -> StoreResult<()> {
    let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
    let changed = conn.execute(&sql, [id]).map_err(StoreError::delete)?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            collection: T::COLLECTION,
            id: id.to_string(),
        });
    }
    tracing::debug!(collection = T::COLLECTION, id, "deleted");
    Ok(())
}

pub fn search<T: MasterRecord>(conn: &Connection, text: &str) -> StoreResult<Vec<T>> {
    Ok(crate::search::filter(list::<T>(conn)?, text))
}

/// JSON-array text column helpers.
pub fn list_to_value(items: &[String]) -> Value {
    Value::Text(serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string()))
}

pub fn list_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
