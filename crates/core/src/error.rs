use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Outgoing message rejected before any transport call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("recipient is empty")]
    EmptyRecipient,

    #[error("message body is empty")]
    EmptyMessage,
}
