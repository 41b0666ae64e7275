use serde::{Deserialize, Serialize};

use crate::contact::ContactKey;
use crate::ids::{Reference, StorageId};
use crate::part::Direction;

/// Data-quality findings attached to a reassembled message. Never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntegrityWarning {
    MissingParts { missing: Vec<u8> },
    /// Parts of one reference disagree on the declared total.
    TotalMismatch { totals: Vec<u8> },
    DuplicatePart { index: u8 },
    PartOutOfRange { index: u8, total: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completeness {
    Complete,
    Incomplete {
        /// Distinct in-range part indexes present.
        received: usize,
        total: u8,
        missing: Vec<u8>,
    },
}

/// One user-visible SMS, built from one or more raw parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalMessage {
    /// Storage id of the first part in index order.
    pub id: StorageId,
    /// Every underlying part, in part-index order. Never empty.
    pub part_ids: Vec<StorageId>,
    pub contact: String,
    pub contact_key: ContactKey,
    pub direction: Direction,
    pub reference: Option<Reference>,
    pub raw_timestamp: i64,
    /// Timestamp after timezone correction. Equal to `raw_timestamp` until
    /// a correction pass runs.
    pub timestamp: i64,
    pub content: String,
    pub is_multipart: bool,
    pub completeness: Completeness,
    pub is_read: bool,
    pub is_success: bool,
    pub warnings: Vec<IntegrityWarning>,
}

impl LogicalMessage {
    pub fn is_complete(&self) -> bool {
        matches!(self.completeness, Completeness::Complete)
    }

    pub fn is_unread(&self) -> bool {
        self.direction == Direction::Received && !self.is_read
    }

    pub fn contains_part(&self, id: StorageId) -> bool {
        self.part_ids.contains(&id)
    }

    pub fn shares_parts_with(&self, other: &LogicalMessage) -> bool {
        self.part_ids.iter().any(|id| other.part_ids.contains(id))
    }

    /// `Incomplete (part 2/3)` style marker for incomplete messages.
    pub fn incomplete_label(&self) -> Option<String> {
        match &self.completeness {
            Completeness::Complete => None,
            Completeness::Incomplete { received, total, .. } => {
                Some(format!("Incomplete (part {received}/{total})"))
            }
        }
    }
}
