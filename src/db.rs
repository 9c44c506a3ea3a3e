use crate::auth;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "sis.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            username TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            role TEXT NOT NULL,
            department TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            password_hash TEXT
        )",
        [],
    )?;
    ensure_users_password_hashed(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS institutions(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            code TEXT NOT NULL,
            address TEXT NOT NULL,
            contact TEXT NOT NULL,
            type TEXT NOT NULL
        )",
        [],
    )?;

    // Sub-locations reference their parent by id only. Deleting a location
    // leaves its children in place.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS locations(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            institution_ids TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sub_locations(
            id TEXT PRIMARY KEY,
            location_id TEXT NOT NULL,
            name TEXT NOT NULL,
            institution_id TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sub_locations_location ON sub_locations(location_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS boards(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            institution_ids TEXT NOT NULL DEFAULT '[]',
            type TEXT NOT NULL DEFAULT 'board'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS designations(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 0,
            institution_ids TEXT NOT NULL DEFAULT '[]'
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS streams(
            id TEXT PRIMARY KEY,
            stream_name TEXT NOT NULL,
            stream_code TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT ''
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS staff(
            id TEXT PRIMARY KEY,
            staff_name TEXT NOT NULL,
            designation TEXT NOT NULL,
            stream TEXT NOT NULL,
            location TEXT NOT NULL,
            employment_status TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS school_data(
            id TEXT PRIMARY KEY,
            sn INTEGER NOT NULL,
            board TEXT NOT NULL,
            board_key TEXT NOT NULL,
            location TEXT NOT NULL,
            sub_location TEXT NOT NULL,
            school_name TEXT NOT NULL,
            uid TEXT NOT NULL UNIQUE,
            created_at TEXT
        )",
        [],
    )?;
    ensure_school_data_board_key(&conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_school_data_board_sn ON school_data(board_key, sn)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS board_counters(
            board_key TEXT PRIMARY KEY,
            last_seq INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS data_forms(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            school_details TEXT NOT NULL,
            principal_info TEXT NOT NULL,
            graduation_teachers TEXT NOT NULL DEFAULT '[]',
            pgt_teachers TEXT NOT NULL DEFAULT '[]',
            strengths TEXT NOT NULL,
            document_urls TEXT NOT NULL DEFAULT '[]',
            selected_region TEXT NOT NULL,
            selected_board TEXT NOT NULL,
            submitted_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_data_forms_user ON data_forms(user_id)",
        [],
    )?;

    Ok(conn)
}

// Older workspaces kept a plaintext `password` column next to the profile.
// Hash whatever is there and drop the column.
fn ensure_users_password_hashed(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "users", "password")? {
        return Ok(());
    }
    if !table_has_column(conn, "users", "password_hash")? {
        conn.execute("ALTER TABLE users ADD COLUMN password_hash TEXT", [])?;
    }

    let mut stmt = conn.prepare(
        "SELECT id, password FROM users
         WHERE password IS NOT NULL AND password_hash IS NULL",
    )?;
    let plain = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let tx = conn.unchecked_transaction()?;
    for (id, password) in &plain {
        let hash = auth::hash_password(password)?;
        tx.execute(
            "UPDATE users SET password_hash = ? WHERE id = ?",
            (&hash, id),
        )?;
    }
    tx.execute("ALTER TABLE users DROP COLUMN password", [])?;
    tx.commit()?;

    tracing::info!(hashed = plain.len(), "migrated plaintext user passwords");
    Ok(())
}

fn ensure_school_data_board_key(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "school_data", "board_key")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE school_data ADD COLUMN board_key TEXT NOT NULL DEFAULT ''",
        [],
    )?;

    // Backfill from the board text; SQLite has no whitespace-class replace.
    let mut stmt = conn.prepare("SELECT id, board FROM school_data")?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (id, board) in rows {
        conn.execute(
            "UPDATE school_data SET board_key = ? WHERE id = ?",
            (crate::uid::board_key(&board), &id),
        )?;
    }
    Ok(())
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
