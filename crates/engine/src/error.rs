use modemsms_core::{CoreError, StorageId, ValidationError};
use modemsms_storage::StorageError;
use thiserror::Error;

use crate::codec::CodecError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("pdu encoding failed: {0}")]
    Codec(#[from] CodecError),

    #[error("partial delete: {} of {} parts confirmed", .confirmed.len(), .requested.len())]
    PartialDelete {
        requested: Vec<StorageId>,
        confirmed: Vec<StorageId>,
    },

    #[error("message not found: {0}")]
    MessageNotFound(StorageId),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),
}
