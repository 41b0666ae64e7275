use std::collections::BTreeSet;

use modemsms_core::{Conversation, Direction, ModemScope, RawPart, StorageId};
use modemsms_storage::ModemTransport;
use tracing::{debug, info};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkReadOutcome {
    /// Every requested id was already read; the modem was not contacted.
    AlreadyRead,
    Marked(Vec<StorageId>),
}

/// Tracks which received parts are known to be read so repeated requests
/// never reach the modem twice.
#[derive(Debug, Default)]
pub struct DeliveryStateTracker {
    known_read: BTreeSet<StorageId>,
}

impl DeliveryStateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known-read set with what a full snapshot reports. Storage
    /// ids are reused by the SIM after deletion, so stale entries must go.
    pub fn observe(&mut self, parts: &[RawPart]) {
        self.known_read = parts
            .iter()
            .filter(|p| p.direction == Direction::Received && p.is_read)
            .map(|p| p.storage_id)
            .collect();
    }

    /// Fold in a partial snapshot, such as one conversation's parts.
    pub fn note(&mut self, parts: &[RawPart]) {
        for part in parts.iter().filter(|p| p.direction == Direction::Received) {
            if part.is_read {
                self.known_read.insert(part.storage_id);
            } else {
                self.known_read.remove(&part.storage_id);
            }
        }
    }

    pub fn is_known_read(&self, id: StorageId) -> bool {
        self.known_read.contains(&id)
    }

    pub fn mark_read<T: ModemTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        scope: &ModemScope,
        ids: &[StorageId],
    ) -> Result<MarkReadOutcome, EngineError> {
        let batch: Vec<StorageId> = ids
            .iter()
            .copied()
            .filter(|id| !self.known_read.contains(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if batch.is_empty() {
            debug!(requested = ids.len(), "mark read: nothing to do");
            return Ok(MarkReadOutcome::AlreadyRead);
        }

        transport.mark_read(scope, &batch)?;
        self.known_read.extend(batch.iter().copied());
        info!(scope = %scope, parts = batch.len(), "marked parts read");
        Ok(MarkReadOutcome::Marked(batch))
    }

    pub fn mark_conversation_read<T: ModemTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        scope: &ModemScope,
        conversation: &Conversation,
    ) -> Result<MarkReadOutcome, EngineError> {
        self.mark_read(transport, scope, &unread_part_ids(conversation))
    }
}

/// Every part id of every unread received message, whole messages only.
pub fn unread_part_ids(conversation: &Conversation) -> Vec<StorageId> {
    conversation
        .unread()
        .flat_map(|m| m.part_ids.iter().copied())
        .collect()
}
