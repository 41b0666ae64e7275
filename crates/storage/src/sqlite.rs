use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, warn};

use modemsms_core::{
    contact::ContactKey,
    ids::*,
    part::{Direction, PartInfo, RawPart, RawRecord},
};

use crate::error::StorageError;
use crate::traits::{ConfigStore, DeleteReceipt, ModemSettings, ModemTransport, Pdu, SendReceipt};

const SELECT_PARTS: &str = "SELECT storage_id, direction, contact, reference, part_index, part_total, raw_timestamp, body, is_read, success FROM sms_parts";

/// Outcome of a bulk JSON import. Rejected entries are skipped, never fatal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub imported: usize,
    /// Position in the input array and the reason it was rejected.
    pub rejected: Vec<(usize, String)>,
}

/// Modem message storage kept in SQLite. Implements both the transport and
/// the configuration store so an engine can run against it directly.
pub struct SqliteModemStore {
    conn: Connection,
}

impl SqliteModemStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Store a part as the modem would on receive. Re-inserting an existing
    /// storage id updates it in place and keeps its position.
    pub fn insert_part(&mut self, scope: &ModemScope, part: &RawPart) -> Result<(), StorageError> {
        upsert_part(&self.conn, scope, part)
    }

    pub fn insert_parts(&mut self, scope: &ModemScope, parts: &[RawPart]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for part in parts {
            upsert_part(&tx, scope, part)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Load a JSON array of loosely typed records, as modem backends list
    /// them. Malformed entries are reported and skipped.
    pub fn import_json(&mut self, scope: &ModemScope, json: &str) -> Result<ImportReport, StorageError> {
        let values: Vec<serde_json::Value> =
            serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;

        let mut report = ImportReport::default();
        let tx = self.conn.transaction()?;
        for (position, value) in values.into_iter().enumerate() {
            let part = serde_json::from_value::<RawRecord>(value)
                .map_err(|e| e.to_string())
                .and_then(|record| record.into_part().map_err(|e| e.to_string()));
            match part {
                Ok(part) => {
                    upsert_part(&tx, scope, &part)?;
                    report.imported += 1;
                }
                Err(reason) => {
                    warn!(scope = %scope, position, %reason, "rejected sms record");
                    report.rejected.push((position, reason));
                }
            }
        }
        tx.commit()?;
        debug!(scope = %scope, imported = report.imported, rejected = report.rejected.len(), "imported sms records");
        Ok(report)
    }

    pub fn next_storage_id(
        &self,
        scope: &ModemScope,
        direction: Direction,
    ) -> Result<StorageId, StorageError> {
        let next: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(storage_id), -1) + 1 FROM sms_parts WHERE scope = ?1 AND direction = ?2",
            rusqlite::params![scope.as_str(), direction.as_str()],
            |row| row.get(0),
        )?;
        let next = u32::try_from(next)
            .map_err(|_| StorageError::Transport(format!("storage full in {scope}")))?;
        Ok(StorageId::new(next))
    }

    /// Remove every part of one direction, returning how many were removed.
    pub fn clear_history(&mut self, scope: &ModemScope, direction: Direction) -> Result<usize, StorageError> {
        let removed = self.conn.execute(
            "DELETE FROM sms_parts WHERE scope = ?1 AND direction = ?2",
            rusqlite::params![scope.as_str(), direction.as_str()],
        )?;
        Ok(removed)
    }

    pub fn part_count(&self, scope: &ModemScope) -> Result<u64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sms_parts WHERE scope = ?1",
            rusqlite::params![scope.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn query_parts(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<RawPart>, StorageError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, |row| {
            Ok(PartRow {
                storage_id: row.get(0)?,
                direction: row.get(1)?,
                contact: row.get(2)?,
                reference: row.get(3)?,
                part_index: row.get(4)?,
                part_total: row.get(5)?,
                raw_timestamp: row.get(6)?,
                body: row.get(7)?,
                is_read: row.get(8)?,
                success: row.get(9)?,
            })
        })?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?.into_part()?);
        }
        Ok(result)
    }
}

struct PartRow {
    storage_id: i64,
    direction: String,
    contact: String,
    reference: Option<i64>,
    part_index: Option<i64>,
    part_total: Option<i64>,
    raw_timestamp: i64,
    body: String,
    is_read: bool,
    success: bool,
}

fn column<T: TryFrom<i64>>(value: i64, label: &str) -> Result<T, StorageError> {
    T::try_from(value).map_err(|_| StorageError::Serialization(format!("invalid {label}: {value}")))
}

impl PartRow {
    fn into_part(self) -> Result<RawPart, StorageError> {
        let direction = Direction::parse(&self.direction)
            .ok_or_else(|| StorageError::Serialization(format!("invalid direction: {}", self.direction)))?;
        let part = match (self.reference, self.part_index, self.part_total) {
            (Some(reference), Some(index), Some(total)) => PartInfo::Segment {
                reference: Reference::new(column(reference, "reference")?),
                index: column(index, "part_index")?,
                total: column(total, "part_total")?,
            },
            _ => PartInfo::Single,
        };
        Ok(RawPart {
            storage_id: StorageId::new(column(self.storage_id, "storage_id")?),
            part,
            direction,
            contact: self.contact,
            raw_timestamp: self.raw_timestamp,
            text: self.body,
            is_read: self.is_read,
            success: self.success,
        })
    }
}

fn upsert_part(conn: &Connection, scope: &ModemScope, part: &RawPart) -> Result<(), StorageError> {
    let (reference, index, total) = match part.part {
        PartInfo::Single => (None, None, None),
        PartInfo::Segment { reference, index, total } => {
            (Some(reference.get()), Some(index), Some(total))
        }
    };
    conn.execute(
        "INSERT INTO sms_parts (scope, direction, storage_id, contact, contact_key, reference, part_index, part_total, raw_timestamp, body, is_read, success)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT (scope, direction, storage_id) DO UPDATE SET
            contact = excluded.contact,
            contact_key = excluded.contact_key,
            reference = excluded.reference,
            part_index = excluded.part_index,
            part_total = excluded.part_total,
            raw_timestamp = excluded.raw_timestamp,
            body = excluded.body,
            is_read = excluded.is_read,
            success = excluded.success",
        rusqlite::params![
            scope.as_str(),
            part.direction.as_str(),
            part.storage_id.get(),
            part.contact,
            ContactKey::normalize(&part.contact).as_str(),
            reference,
            index,
            total,
            part.raw_timestamp,
            part.text,
            part.is_read,
            part.success,
        ],
    )?;
    Ok(())
}

fn unix_now() -> Result<i64, StorageError> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .map_err(|_| StorageError::Transport("system clock before epoch".into()))
}

impl ModemTransport for SqliteModemStore {
    fn list_parts(&self, scope: &ModemScope) -> Result<Vec<RawPart>, StorageError> {
        self.query_parts(
            &format!("{SELECT_PARTS} WHERE scope = ?1 ORDER BY rowid"),
            rusqlite::params![scope.as_str()],
        )
    }

    fn list_parts_for_contact(
        &self,
        scope: &ModemScope,
        contact: &str,
    ) -> Result<Vec<RawPart>, StorageError> {
        let key = ContactKey::normalize(contact);
        self.query_parts(
            &format!("{SELECT_PARTS} WHERE scope = ?1 AND contact_key = ?2 ORDER BY rowid"),
            rusqlite::params![scope.as_str(), key.as_str()],
        )
    }

    fn send(
        &mut self,
        scope: &ModemScope,
        contact: &str,
        pdus: &[Pdu],
        original_text: &str,
    ) -> Result<SendReceipt, StorageError> {
        if pdus.is_empty() {
            return Err(StorageError::Transport("no PDUs to send".into()));
        }
        let storage_id = self.next_storage_id(scope, Direction::Sent)?;
        let part = RawPart::sent(storage_id.get(), contact, unix_now()?, original_text);
        upsert_part(&self.conn, scope, &part)?;
        debug!(scope = %scope, %storage_id, pdus = pdus.len(), "recorded sent sms");
        Ok(SendReceipt {
            stored_ids: vec![storage_id],
        })
    }

    fn delete(
        &mut self,
        scope: &ModemScope,
        direction: Direction,
        ids: &[StorageId],
    ) -> Result<DeleteReceipt, StorageError> {
        let tx = self.conn.transaction()?;
        let mut confirmed = Vec::new();
        for id in ids {
            let removed = tx.execute(
                "DELETE FROM sms_parts WHERE scope = ?1 AND direction = ?2 AND storage_id = ?3",
                rusqlite::params![scope.as_str(), direction.as_str(), id.get()],
            )?;
            if removed > 0 {
                confirmed.push(*id);
            }
        }
        tx.commit()?;
        Ok(DeleteReceipt { confirmed })
    }

    fn mark_read(&mut self, scope: &ModemScope, ids: &[StorageId]) -> Result<(), StorageError> {
        let tx = self.conn.transaction()?;
        for id in ids {
            tx.execute(
                "UPDATE sms_parts SET is_read = 1 WHERE scope = ?1 AND direction = 'received' AND storage_id = ?2",
                rusqlite::params![scope.as_str(), id.get()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

impl ConfigStore for SqliteModemStore {
    fn load_settings(&self, scope: &ModemScope) -> Result<ModemSettings, StorageError> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT settings FROM modem_settings WHERE scope = ?1",
                rusqlite::params![scope.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match blob {
            Some(bytes) => rmp_serde::from_slice(&bytes)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(ModemSettings::default()),
        }
    }

    fn save_settings(
        &mut self,
        scope: &ModemScope,
        settings: &ModemSettings,
    ) -> Result<(), StorageError> {
        let bytes = rmp_serde::to_vec_named(settings)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.conn.execute(
            "INSERT INTO modem_settings (scope, settings) VALUES (?1, ?2)
             ON CONFLICT (scope) DO UPDATE SET settings = excluded.settings, updated_at = unixepoch()",
            rusqlite::params![scope.as_str(), bytes],
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteModemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteModemStore").finish_non_exhaustive()
    }
}
