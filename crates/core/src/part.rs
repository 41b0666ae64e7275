use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{Reference, StorageId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Direction {
    Received,
    Sent,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Sent => "sent",
        }
    }

    /// Accepts the spellings modem backends use for inbox/outbox records.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "received" | "recv" | "inbox" | "in" => Some(Self::Received),
            "sent" | "send" | "outbox" | "out" => Some(Self::Sent),
            _ => None,
        }
    }
}

/// Position of a raw part inside its logical message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartInfo {
    Single,
    Segment {
        reference: Reference,
        index: u8,
        total: u8,
    },
}

impl PartInfo {
    pub fn reference(&self) -> Option<Reference> {
        match self {
            Self::Single => None,
            Self::Segment { reference, .. } => Some(*reference),
        }
    }

    /// 1-based index; a single part is part 1 of 1.
    pub fn index(&self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Segment { index, .. } => *index,
        }
    }

    pub fn total(&self) -> u8 {
        match self {
            Self::Single => 1,
            Self::Segment { total, .. } => *total,
        }
    }
}

/// One record as stored by the modem. A multi-part SMS is several of these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPart {
    pub storage_id: StorageId,
    pub part: PartInfo,
    pub direction: Direction,
    pub contact: String,
    pub raw_timestamp: i64,
    pub text: String,
    pub is_read: bool,
    /// Delivery outcome of a sent part. Always true for received parts.
    pub success: bool,
}

impl RawPart {
    pub fn received(storage_id: u32, contact: &str, raw_timestamp: i64, text: &str) -> Self {
        Self {
            storage_id: StorageId::new(storage_id),
            part: PartInfo::Single,
            direction: Direction::Received,
            contact: contact.to_string(),
            raw_timestamp,
            text: text.to_string(),
            is_read: false,
            success: true,
        }
    }

    pub fn sent(storage_id: u32, contact: &str, raw_timestamp: i64, text: &str) -> Self {
        Self {
            direction: Direction::Sent,
            is_read: true,
            ..Self::received(storage_id, contact, raw_timestamp, text)
        }
    }

    pub fn with_segment(mut self, reference: u16, index: u8, total: u8) -> Self {
        self.part = PartInfo::Segment {
            reference: Reference::new(reference),
            index,
            total,
        };
        self
    }

    pub fn with_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = success;
        self
    }

    /// Short label for raw storage listings, e.g. `Part 2/3`.
    pub fn label(&self) -> String {
        match self.part {
            PartInfo::Single => "Single".to_string(),
            PartInfo::Segment { index, total, .. } => format!("Part {index}/{total}"),
        }
    }
}

/// A loosely typed scalar as modem backends emit them: numbers sometimes
/// arrive as strings and flags as numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Loose {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bool(_) => None,
            Self::Int(n) => Some(*n),
            Self::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            Self::Float(_) => None,
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Int(n) => Some(*n != 0),
            Self::Float(f) => Some(*f != 0.0),
            Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" | "" => Some(false),
                _ => None,
            },
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(n) => n.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

/// Ingestion form of a [`RawPart`], deserialized straight from the
/// transport's JSON before any validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "id")]
    pub index: Option<Loose>,
    #[serde(default, rename = "type", alias = "direction")]
    pub direction: Option<Loose>,
    #[serde(default, alias = "sender", alias = "recipient")]
    pub contact: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Loose>,
    #[serde(default, alias = "content")]
    pub text: Option<String>,
    #[serde(default)]
    pub reference: Option<Loose>,
    #[serde(default)]
    pub part: Option<Loose>,
    #[serde(default)]
    pub total: Option<Loose>,
    #[serde(default)]
    pub is_read: Option<Loose>,
    #[serde(default)]
    pub success: Option<Loose>,
}

fn int_field<T: TryFrom<i64>>(value: &Loose, field: &str) -> Result<T, CoreError> {
    let n = value
        .as_i64()
        .ok_or_else(|| CoreError::InvalidRecord(format!("{field} is not a number: {}", value.as_text())))?;
    T::try_from(n).map_err(|_| CoreError::InvalidRecord(format!("{field} out of range: {n}")))
}

fn flag_field(value: &Loose, field: &str) -> Result<bool, CoreError> {
    value
        .as_bool()
        .ok_or_else(|| CoreError::InvalidRecord(format!("{field} is not a flag: {}", value.as_text())))
}

impl RawRecord {
    /// Validate and normalize into a [`RawPart`].
    ///
    /// A record without a reference, or whose total is absent or at most 1,
    /// becomes a single part. A segment must name its part index; an index
    /// outside `1..=total` is kept and left for reassembly to flag.
    pub fn into_part(self) -> Result<RawPart, CoreError> {
        let storage_id: u32 = match &self.index {
            Some(v) => int_field(v, "index")?,
            None => return Err(CoreError::InvalidRecord("missing index".into())),
        };

        let direction = match &self.direction {
            Some(v) => {
                let text = v.as_text();
                Direction::parse(&text)
                    .ok_or_else(|| CoreError::InvalidRecord(format!("unknown direction: {text}")))?
            }
            None => return Err(CoreError::InvalidRecord("missing direction".into())),
        };

        let contact = self
            .contact
            .ok_or_else(|| CoreError::InvalidRecord(format!("record {storage_id} has no contact")))?;

        let raw_timestamp: i64 = match &self.timestamp {
            Some(v) => int_field(v, "timestamp")?,
            None => 0,
        };

        let reference: Option<u16> = self
            .reference
            .as_ref()
            .map(|v| int_field(v, "reference"))
            .transpose()?;
        let total: Option<u8> = self.total.as_ref().map(|v| int_field(v, "total")).transpose()?;
        let index: Option<u8> = self.part.as_ref().map(|v| int_field(v, "part")).transpose()?;

        let part = match (reference, total) {
            (Some(reference), Some(total)) if total > 1 => {
                let index = index.ok_or_else(|| {
                    CoreError::InvalidRecord(format!("segment {storage_id} has no part index"))
                })?;
                PartInfo::Segment {
                    reference: Reference::new(reference),
                    index,
                    total,
                }
            }
            _ => PartInfo::Single,
        };

        let is_read = match &self.is_read {
            Some(v) => flag_field(v, "is_read")?,
            None => direction == Direction::Sent,
        };
        let success = match (&self.success, direction) {
            (_, Direction::Received) => true,
            (Some(v), Direction::Sent) => flag_field(v, "success")?,
            (None, Direction::Sent) => true,
        };

        Ok(RawPart {
            storage_id: StorageId::new(storage_id),
            part,
            direction,
            contact,
            raw_timestamp,
            text: self.text.unwrap_or_default(),
            is_read,
            success,
        })
    }
}
