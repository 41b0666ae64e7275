use modemsms_core::{Direction, ModemScope, RawPart, StorageId};
use modemsms_engine::{Engine, EngineError};
use modemsms_storage::{ConfigStore, ModemSettings, SqliteModemStore, StorageError};

use crate::codec::FakeCodec;
use crate::flaky::FlakyTransport;

/// A SIM with a scripted inbox, backed by an in-memory store.
pub struct TestModem {
    pub scope: ModemScope,
    pub store: SqliteModemStore,
}

impl TestModem {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_store(SqliteModemStore::open_in_memory()?)
    }

    pub fn with_store(store: SqliteModemStore) -> Result<Self, StorageError> {
        Ok(Self {
            scope: ModemScope::default(),
            store,
        })
    }

    pub fn receive(&mut self, contact: &str, timestamp: i64, text: &str) -> Result<StorageId, StorageError> {
        let id = self.store.next_storage_id(&self.scope, Direction::Received)?;
        self.store
            .insert_part(&self.scope, &RawPart::received(id.get(), contact, timestamp, text))?;
        Ok(id)
    }

    pub fn record_sent(&mut self, contact: &str, timestamp: i64, text: &str) -> Result<StorageId, StorageError> {
        let id = self.store.next_storage_id(&self.scope, Direction::Sent)?;
        self.store
            .insert_part(&self.scope, &RawPart::sent(id.get(), contact, timestamp, text))?;
        Ok(id)
    }

    /// Deliver the listed segments of a concatenated message. `segments`
    /// pairs each 1-based index with its text, so gaps and duplicates can be
    /// scripted.
    pub fn receive_segments(
        &mut self,
        contact: &str,
        timestamp: i64,
        reference: u16,
        total: u8,
        segments: &[(u8, &str)],
    ) -> Result<Vec<StorageId>, StorageError> {
        let mut ids = Vec::with_capacity(segments.len());
        for (index, text) in segments {
            let id = self.store.next_storage_id(&self.scope, Direction::Received)?;
            let part = RawPart::received(id.get(), contact, timestamp, text)
                .with_segment(reference, *index, total);
            self.store.insert_part(&self.scope, &part)?;
            ids.push(id);
        }
        Ok(ids)
    }

    /// Deliver every segment of a concatenated message in order.
    pub fn receive_multipart(
        &mut self,
        contact: &str,
        timestamp: i64,
        reference: u16,
        texts: &[&str],
    ) -> Result<Vec<StorageId>, StorageError> {
        let total = texts.len() as u8;
        let segments: Vec<(u8, &str)> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| (i as u8 + 1, *text))
            .collect();
        self.receive_segments(contact, timestamp, reference, total, &segments)
    }

    pub fn configure(&mut self, settings: &ModemSettings) -> Result<(), StorageError> {
        self.store.save_settings(&self.scope, settings)
    }

    pub fn into_engine(self) -> Result<Engine<SqliteModemStore, FakeCodec>, EngineError> {
        Engine::new(self.scope, self.store, FakeCodec::new())
    }

    pub fn into_flaky_engine(
        self,
    ) -> Result<Engine<FlakyTransport<SqliteModemStore>, FakeCodec>, EngineError> {
        Engine::new(self.scope, FlakyTransport::new(self.store), FakeCodec::new())
    }
}
