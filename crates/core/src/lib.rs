pub mod contact;
pub mod conversation;
pub mod digest;
pub mod error;
pub mod ids;
pub mod message;
pub mod part;
pub mod reassembly;
pub mod segment;
pub mod timestamp;

pub use contact::ContactKey;
pub use conversation::Conversation;
pub use digest::SnapshotDigest;
pub use error::{CoreError, ValidationError};
pub use ids::*;
pub use message::{Completeness, IntegrityWarning, LogicalMessage};
pub use part::{Direction, PartInfo, RawPart, RawRecord};
pub use segment::{Encoding, PlanLevel, SegmentPlan};
pub use timestamp::TimezoneCorrection;
