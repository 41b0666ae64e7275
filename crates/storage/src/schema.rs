use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS sms_parts (
    rowid INTEGER PRIMARY KEY,
    scope TEXT NOT NULL,
    direction TEXT NOT NULL CHECK (direction IN ('received', 'sent')),
    storage_id INTEGER NOT NULL CHECK (storage_id >= 0),
    contact TEXT NOT NULL,
    contact_key TEXT NOT NULL,
    reference INTEGER CHECK (reference IS NULL OR reference BETWEEN 0 AND 65535),
    part_index INTEGER CHECK (part_index IS NULL OR part_index BETWEEN 0 AND 255),
    part_total INTEGER CHECK (part_total IS NULL OR part_total BETWEEN 0 AND 255),
    raw_timestamp INTEGER NOT NULL,
    body TEXT NOT NULL,
    is_read INTEGER NOT NULL DEFAULT 0,
    success INTEGER NOT NULL DEFAULT 1,
    UNIQUE (scope, direction, storage_id)
);
CREATE INDEX IF NOT EXISTS idx_sms_parts_contact ON sms_parts (scope, contact_key);

CREATE TABLE IF NOT EXISTS modem_settings (
    scope TEXT PRIMARY KEY,
    settings BLOB NOT NULL,
    updated_at INTEGER NOT NULL DEFAULT (unixepoch())
);
";
