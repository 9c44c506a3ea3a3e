//! School-visit data forms. Nested sections are stored as JSON text, one
//! row per submission.

use crate::model::DataForm;
use crate::store::{StoreError, StoreResult};
use rusqlite::{Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

const COLLECTION: &str = "dataForms";

const SELECT: &str = "SELECT id, user_id, school_details, principal_info, graduation_teachers,
        pgt_teachers, strengths, document_urls, selected_region, selected_board, submitted_at
     FROM data_forms";

fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn to_json<T: Serialize>(value: &T) -> StoreResult<String> {
    Ok(serde_json::to_string(value)?)
}

fn form_from_row(row: &Row<'_>) -> rusqlite::Result<DataForm> {
    Ok(DataForm {
        id: row.get(0)?,
        user_id: row.get(1)?,
        school_details: json_col(row, 2)?,
        principal_info: json_col(row, 3)?,
        graduation_teachers: json_col(row, 4)?,
        pgt_teachers: json_col(row, 5)?,
        strengths: json_col(row, 6)?,
        document_urls: json_col(row, 7)?,
        selected_region: row.get(8)?,
        selected_board: row.get(9)?,
        submitted_at: row.get(10)?,
    })
}

/// Required fields of a submission, by wire path.
pub fn missing_fields(form: &DataForm) -> Vec<String> {
    let checks = [
        ("schoolDetails.schoolName", &form.school_details.school_name),
        ("schoolDetails.date", &form.school_details.date),
        ("selectedRegion", &form.selected_region),
        ("selectedBoard", &form.selected_board),
    ];
    checks
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k.to_string())
        .collect()
}

/// Stores `doc` as a new form owned by `user_id`. Any `id`, `userId` or
/// `submittedAt` in the document is replaced.
pub fn submit(conn: &Connection, user_id: &str, doc: &serde_json::Value) -> StoreResult<DataForm> {
    if !doc.is_object() {
        return Err(StoreError::invalid("form", "must be a JSON object"));
    }
    let mut form: DataForm = serde_json::from_value(doc.clone())?;
    let missing = missing_fields(&form);
    if !missing.is_empty() {
        return Err(StoreError::MissingFields(missing));
    }

    form.id = Uuid::new_v4().to_string();
    form.user_id = user_id.to_string();
    form.submitted_at = chrono::Utc::now().to_rfc3339();
    form.document_urls.retain(|u| !u.trim().is_empty());

    conn.execute(
        "INSERT INTO data_forms(id, user_id, school_details, principal_info, graduation_teachers,
            pgt_teachers, strengths, document_urls, selected_region, selected_board, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &form.id,
            &form.user_id,
            to_json(&form.school_details)?,
            to_json(&form.principal_info)?,
            to_json(&form.graduation_teachers)?,
            to_json(&form.pgt_teachers)?,
            to_json(&form.strengths)?,
            to_json(&form.document_urls)?,
            &form.selected_region,
            &form.selected_board,
            &form.submitted_at,
        ),
    )
    .map_err(StoreError::insert)?;
    tracing::info!(
        id = %form.id,
        user = %user_id,
        school = %form.school_details.school_name,
        "data form submitted"
    );
    Ok(form)
}

/// Newest first.
pub fn list_for_user(conn: &Connection, user_id: &str) -> StoreResult<Vec<DataForm>> {
    let sql = format!("{} WHERE user_id = ? ORDER BY submitted_at DESC", SELECT);
    let mut stmt = conn.prepare(&sql)?;
    let forms = stmt
        .query_map([user_id], form_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(forms)
}

pub fn get(conn: &Connection, id: &str) -> StoreResult<DataForm> {
    let sql = format!("{} WHERE id = ?", SELECT);
    conn.query_row(&sql, [id], form_from_row)
        .optional()?
        .ok_or_else(|| StoreError::NotFound {
            collection: COLLECTION,
            id: id.to_string(),
        })
}

pub fn delete(conn: &Connection, id: &str) -> StoreResult<()> {
    let changed = conn
        .execute("DELETE FROM data_forms WHERE id = ?", [id])
        .map_err(StoreError::delete)?;
    if changed == 0 {
        return Err(StoreError::NotFound {
            collection: COLLECTION,
            id: id.to_string(),
        });
    }
    Ok(())
}

pub fn count(conn: &Connection) -> StoreResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM data_forms", [], |r| r.get(0))?)
}
