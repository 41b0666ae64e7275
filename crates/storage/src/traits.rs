use serde::{Deserialize, Serialize};

use modemsms_core::{
    ids::{ModemScope, StorageId},
    part::{Direction, RawPart},
    segment::Encoding,
    timestamp::TimezoneCorrection,
};

use crate::error::StorageError;

pub const DEFAULT_LIST_POLL_SECS: u64 = 10;
pub const DEFAULT_CONVERSATION_POLL_SECS: u64 = 5;

/// Options persisted per modem scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemSettings {
    pub timezone: TimezoneCorrection,
    pub list_poll_secs: u64,
    pub conversation_poll_secs: u64,
    pub default_encoding: Encoding,
    pub delete_after_forward: bool,
}

impl Default for ModemSettings {
    fn default() -> Self {
        Self {
            timezone: TimezoneCorrection::NONE,
            list_poll_secs: DEFAULT_LIST_POLL_SECS,
            conversation_poll_secs: DEFAULT_CONVERSATION_POLL_SECS,
            default_encoding: Encoding::default(),
            delete_after_forward: false,
        }
    }
}

/// One encoded protocol data unit, as the hex string the modem expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pdu {
    pub hex: String,
    /// Length in octets, excluding the SMSC prefix.
    pub tpdu_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Storage ids the modem recorded the sent message under.
    pub stored_ids: Vec<StorageId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReceipt {
    /// Ids the modem confirmed as removed. May be a subset of the request.
    pub confirmed: Vec<StorageId>,
}

pub trait ModemTransport {
    fn list_parts(&self, scope: &ModemScope) -> Result<Vec<RawPart>, StorageError>;

    /// Parts whose contact normalizes to the same key as `contact`.
    fn list_parts_for_contact(
        &self,
        scope: &ModemScope,
        contact: &str,
    ) -> Result<Vec<RawPart>, StorageError>;

    fn send(
        &mut self,
        scope: &ModemScope,
        contact: &str,
        pdus: &[Pdu],
        original_text: &str,
    ) -> Result<SendReceipt, StorageError>;

    fn delete(
        &mut self,
        scope: &ModemScope,
        direction: Direction,
        ids: &[StorageId],
    ) -> Result<DeleteReceipt, StorageError>;

    fn mark_read(&mut self, scope: &ModemScope, ids: &[StorageId]) -> Result<(), StorageError>;
}

pub trait ConfigStore {
    /// Stored settings, or defaults when the scope has none.
    fn load_settings(&self, scope: &ModemScope) -> Result<ModemSettings, StorageError>;

    fn save_settings(
        &mut self,
        scope: &ModemScope,
        settings: &ModemSettings,
    ) -> Result<(), StorageError>;
}
