use std::collections::BTreeSet;

use modemsms_core::{Conversation, Direction, LogicalMessage, ModemScope, StorageId};
use modemsms_storage::ModemTransport;
use tracing::{info, warn};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub direction: Direction,
    pub deleted: Vec<StorageId>,
}

/// Delete every part of a message in one transport call. Succeeds only when
/// the modem confirms all of them.
pub fn delete_message<T: ModemTransport + ?Sized>(
    transport: &mut T,
    scope: &ModemScope,
    message: &LogicalMessage,
) -> Result<DeleteReport, EngineError> {
    delete_parts(transport, scope, message.direction, &message.part_ids)
}

/// Delete a whole conversation, one transport call per direction. Both
/// directions are attempted before a partial result is reported.
pub fn delete_conversation<T: ModemTransport + ?Sized>(
    transport: &mut T,
    scope: &ModemScope,
    conversation: &Conversation,
) -> Result<Vec<DeleteReport>, EngineError> {
    let mut reports = Vec::new();
    let mut requested = Vec::new();
    let mut confirmed = Vec::new();

    for direction in [Direction::Received, Direction::Sent] {
        let ids: Vec<StorageId> = conversation
            .messages
            .iter()
            .filter(|m| m.direction == direction)
            .flat_map(|m| m.part_ids.iter().copied())
            .collect();
        if ids.is_empty() {
            continue;
        }
        match delete_parts(transport, scope, direction, &ids) {
            Ok(report) => {
                requested.extend(report.deleted.iter().copied());
                confirmed.extend(report.deleted.iter().copied());
                reports.push(report);
            }
            Err(EngineError::PartialDelete {
                requested: asked,
                confirmed: got,
            }) => {
                requested.extend(asked);
                confirmed.extend(got);
            }
            Err(e) => return Err(e),
        }
    }

    if requested.len() != confirmed.len() {
        return Err(EngineError::PartialDelete { requested, confirmed });
    }
    Ok(reports)
}

fn delete_parts<T: ModemTransport + ?Sized>(
    transport: &mut T,
    scope: &ModemScope,
    direction: Direction,
    ids: &[StorageId],
) -> Result<DeleteReport, EngineError> {
    let requested: Vec<StorageId> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    let receipt = transport.delete(scope, direction, &requested)?;

    let confirmed: BTreeSet<StorageId> = receipt.confirmed.into_iter().collect();
    let confirmed: Vec<StorageId> = requested
        .iter()
        .copied()
        .filter(|id| confirmed.contains(id))
        .collect();

    if confirmed.len() != requested.len() {
        warn!(
            scope = %scope,
            direction = direction.as_str(),
            requested = ?requested,
            confirmed = ?confirmed,
            "modem confirmed only part of a delete"
        );
        return Err(EngineError::PartialDelete { requested, confirmed });
    }

    info!(scope = %scope, direction = direction.as_str(), parts = requested.len(), "deleted parts");
    Ok(DeleteReport {
        direction,
        deleted: requested,
    })
}
