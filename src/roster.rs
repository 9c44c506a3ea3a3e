//! School roster ingestion: header-keyed CSV or workbook rows in, numbered
//! `school_data` rows out.

use crate::model::SchoolRow;
use crate::store::{self, StoreError, StoreResult};
use crate::uid::UidAllocator;
use anyhow::anyhow;
use calamine::{open_workbook_auto, Reader};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

pub const COL_BOARD: &str = "BOARD";
pub const COL_LOCATION: &str = "LOCATION";
pub const COL_SUB_LOCATION: &str = "SUB LOCATION";
pub const COL_SCHOOL_NAME: &str = "NAME OF SCHOOL";

/// Extensions read through the workbook reader rather than as CSV text.
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// One source row: its 1-based line (or sheet row) number and its cells.
pub type Record = (usize, Vec<String>);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub line_no: usize,
    pub board: String,
    pub location: String,
    pub sub_location: String,
    pub school_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterWarning {
    pub line: usize,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct RosterParse {
    pub rows: Vec<RosterRow>,
    pub warnings: Vec<RosterWarning>,
    pub rows_total: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("roster is empty")]
    Empty,
    #[error("roster header has no {0} column")]
    MissingColumn(&'static str),
}

pub fn parse_csv_record(line: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => out.push(std::mem::take(&mut buf)),
            _ => buf.push(ch),
        }
    }
    out.push(buf);
    out
}

pub fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// `Sub_Location`, `sub-location` and ` SUB  LOCATION ` all become
/// `SUB LOCATION`.
fn normalize_header(h: &str) -> String {
    h.trim_start_matches('\u{feff}')
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

pub fn csv_records(text: &str) -> Vec<Record> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, parse_csv_record(line)))
        .collect()
}

/// The first worksheet of a workbook, one record per sheet row. Cells are
/// taken as displayed, so a numeric `1` reads as `"1"`.
pub fn read_workbook(path: &Path) -> anyhow::Result<Vec<Record>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| anyhow!("failed to open workbook {}: {}", path.display(), e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("workbook {} has no worksheets", path.display()))?
        .map_err(|e| anyhow!("failed to read first sheet of {}: {}", path.display(), e))?;
    let first_row = range.start().map(|(r, _)| r as usize).unwrap_or(0);
    Ok(range
        .rows()
        .enumerate()
        .map(|(i, cells)| {
            (
                first_row + i + 1,
                cells.iter().map(|c| c.to_string()).collect(),
            )
        })
        .collect())
}

pub fn parse_roster(text: &str) -> Result<RosterParse, RosterError> {
    parse_records(csv_records(text))
}

/// Turns records into rows keyed by header name. The first non-blank record
/// is the header. Rows without a board or a school name are skipped with a
/// warning; any `SN` column is ignored since numbering is assigned on
/// upload.
pub fn parse_records(records: Vec<Record>) -> Result<RosterParse, RosterError> {
    let mut records = records
        .into_iter()
        .filter(|(_, cells)| cells.iter().any(|c| !c.trim().is_empty()));

    let (_, header_cells) = records.next().ok_or(RosterError::Empty)?;
    let headers: Vec<String> = header_cells.iter().map(|h| normalize_header(h)).collect();
    let index: HashMap<&str, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.as_str(), i))
        .collect();
    for required in [COL_BOARD, COL_SCHOOL_NAME] {
        if !index.contains_key(required) {
            return Err(RosterError::MissingColumn(required));
        }
    }

    let field = |fields: &[String], col: &str| -> String {
        index
            .get(col)
            .and_then(|i| fields.get(*i))
            .map(|v| v.trim().to_string())
            .unwrap_or_default()
    };

    let mut out = RosterParse::default();
    for (line_no, fields) in records {
        out.rows_total += 1;
        let row = RosterRow {
            line_no,
            board: field(&fields, COL_BOARD),
            location: field(&fields, COL_LOCATION),
            sub_location: field(&fields, COL_SUB_LOCATION),
            school_name: field(&fields, COL_SCHOOL_NAME),
        };
        if row.board.is_empty() {
            out.warnings.push(RosterWarning {
                line: line_no,
                code: "missing_board",
                message: "row has no BOARD; skipped".into(),
            });
            continue;
        }
        if row.school_name.is_empty() {
            out.warnings.push(RosterWarning {
                line: line_no,
                code: "missing_school_name",
                message: "row has no NAME OF SCHOOL; skipped".into(),
            });
            continue;
        }
        out.rows.push(row);
    }
    Ok(out)
}

/// Numbers and stores `rows` in one IMMEDIATE transaction: existing rows are
/// read once, counters run in memory, and the per-board high-water marks
/// are written back with the rows. A second upload blocks on the write
/// lock until the first commits.
pub fn upload(conn: &Connection, rows: &[RosterRow]) -> StoreResult<Vec<SchoolRow>> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(StoreError::tx)?;

    let mut alloc = UidAllocator::load(&tx)?;
    let created_at = chrono::Utc::now().to_rfc3339();
    let mut stored = Vec::with_capacity(rows.len());
    for row in rows {
        let allocation = alloc.allocate(&row.board);
        let record = SchoolRow {
            id: Uuid::new_v4().to_string(),
            sn: allocation.sn,
            board: row.board.clone(),
            location: row.location.clone(),
            sub_location: row.sub_location.clone(),
            school_name: row.school_name.clone(),
            uid: allocation.uid,
            created_at: Some(created_at.clone()),
        };
        store::insert(&tx, &record)?;
        tracing::debug!(line = row.line_no, uid = %record.uid, "school numbered");
        stored.push(record);
    }

    for (key, last_seq) in alloc.counters() {
        tx.execute(
            "INSERT INTO board_counters(board_key, last_seq) VALUES(?, ?)
             ON CONFLICT(board_key) DO UPDATE SET last_seq = MAX(last_seq, excluded.last_seq)",
            (key, last_seq),
        )
        .map_err(StoreError::update)?;
    }
    tx.commit().map_err(StoreError::tx)?;

    tracing::info!(rows = stored.len(), "school roster uploaded");
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        assert_eq!(
            parse_csv_record(r#"1,"Green Valley, Sr. Sec.","say ""hi""",x"#),
            vec!["1", "Green Valley, Sr. Sec.", "say \"hi\"", "x"]
        );
        assert_eq!(csv_quote("a,b"), "\"a,b\"");
    }

    #[test]
    fn rows_are_keyed_by_header_in_any_order() {
        let text = "\u{feff}SN,Name_of_School,board,Sub-Location,LOCATION\n\
                    9,Delhi Public School,CBSE,North,Delhi\n\
                    \n\
                    10,Green Valley Academy,ICSE,,Pune\n";
        let parsed = parse_roster(text).unwrap();
        assert_eq!(parsed.rows_total, 2);
        assert!(parsed.warnings.is_empty());
        assert_eq!(
            parsed.rows[0],
            RosterRow {
                line_no: 2,
                board: "CBSE".into(),
                location: "Delhi".into(),
                sub_location: "North".into(),
                school_name: "Delhi Public School".into(),
            }
        );
        assert_eq!(parsed.rows[1].line_no, 4);
        assert_eq!(parsed.rows[1].sub_location, "");
    }

    #[test]
    fn rows_without_board_are_skipped() {
        let text = "BOARD,NAME OF SCHOOL\n,Orphan School\nCBSE,\nCBSE,Kept\n";
        let parsed = parse_roster(text).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        let codes: Vec<_> = parsed.warnings.iter().map(|w| w.code).collect();
        assert_eq!(codes, vec!["missing_board", "missing_school_name"]);
        assert_eq!(parsed.warnings[0].line, 2);
    }

    #[test]
    fn header_must_name_board_and_school() {
        assert!(matches!(
            parse_roster("LOCATION,NAME OF SCHOOL\nDelhi,DPS\n"),
            Err(RosterError::MissingColumn("BOARD"))
        ));
        assert!(matches!(parse_roster("  \n"), Err(RosterError::Empty)));
        assert!(matches!(parse_roster(",,\n , \n"), Err(RosterError::Empty)));
    }

    #[test]
    fn sheet_records_keep_their_row_numbers() {
        let cell = |v: &str| v.to_string();
        let records = vec![
            (1, vec![cell("SN"), cell("Board"), cell("Name Of School")]),
            (2, vec![cell("1"), cell("CBSE"), cell("Delhi Public School")]),
            (3, vec![cell(""), cell(""), cell("")]),
            (4, vec![cell("2"), cell(""), cell("Orphan")]),
        ];
        let parsed = parse_records(records).unwrap();
        assert_eq!(parsed.rows_total, 2);
        assert_eq!(parsed.rows[0].board, "CBSE");
        assert_eq!(parsed.rows[0].line_no, 2);
        assert_eq!(parsed.warnings[0].line, 4);
    }

    #[test]
    fn workbook_extensions_are_recognised() {
        assert!(is_workbook(Path::new("roster.XLSX")));
        assert!(is_workbook(Path::new("/tmp/roster.ods")));
        assert!(!is_workbook(Path::new("roster.csv")));
        assert!(!is_workbook(Path::new("roster")));
    }

    #[test]
    fn unreadable_workbook_is_an_error() {
        let path = std::env::temp_dir()
            .join(format!("sisd-not-a-workbook-{}.xlsx", Uuid::new_v4()));
        std::fs::write(&path, b"not a zip").unwrap();
        let err = read_workbook(&path).unwrap_err();
        assert!(err.to_string().contains("failed to open workbook"), "{err}");
        let _ = std::fs::remove_file(&path);
    }
}
