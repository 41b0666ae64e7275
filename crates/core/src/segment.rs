use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

pub const GSM7_SINGLE_CAPACITY: usize = 160;
pub const GSM7_CONCAT_CAPACITY: usize = 153;
pub const UCS2_SINGLE_CAPACITY: usize = 70;
pub const UCS2_CONCAT_CAPACITY: usize = 66;

/// Length past which a message is flagged as excessive, in segments.
pub const EXCESSIVE_SEGMENTS: usize = 5;

const GSM7_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?\
¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";
const GSM7_EXTENSION: &str = "\u{c}^{}\\[~]|€";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// GSM 03.38 default alphabet, 7 bits per character.
    Gsm7,
    /// UCS-2, 16 bits per unit.
    #[default]
    Ucs2,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gsm7 => "7bit",
            Self::Ucs2 => "16bit",
        }
    }

    pub fn single_capacity(&self) -> usize {
        match self {
            Self::Gsm7 => GSM7_SINGLE_CAPACITY,
            Self::Ucs2 => UCS2_SINGLE_CAPACITY,
        }
    }

    pub fn concat_capacity(&self) -> usize {
        match self {
            Self::Gsm7 => GSM7_CONCAT_CAPACITY,
            Self::Ucs2 => UCS2_CONCAT_CAPACITY,
        }
    }

    /// Length of `text` in this encoding's units.
    pub fn unit_count(&self, text: &str) -> usize {
        match self {
            Self::Gsm7 => text
                .chars()
                .map(|c| if GSM7_EXTENSION.contains(c) { 2 } else { 1 })
                .sum(),
            Self::Ucs2 => text.encode_utf16().count(),
        }
    }

    /// 7-bit when every character fits the GSM alphabet, otherwise 16-bit.
    pub fn recommended(text: &str) -> Self {
        if text.chars().all(is_gsm7) {
            Self::Gsm7
        } else {
            Self::Ucs2
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "7bit" | "gsm7" | "gsm" => Ok(Self::Gsm7),
            "16bit" | "ucs2" | "ucs-2" => Ok(Self::Ucs2),
            other => Err(CoreError::InvalidData(format!("unknown encoding: {other}"))),
        }
    }
}

pub fn is_gsm7(c: char) -> bool {
    GSM7_BASIC.contains(c) || GSM7_EXTENSION.contains(c)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanLevel {
    Single,
    Multipart,
    /// Longer than [`EXCESSIVE_SEGMENTS`] segments' worth of units. Still sendable.
    Excessive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentPlan {
    pub encoding: Encoding,
    pub unit_count: usize,
    pub per_segment_capacity: usize,
    pub segment_count: usize,
    pub level: PlanLevel,
}

impl SegmentPlan {
    pub fn is_multipart(&self) -> bool {
        self.segment_count > 1
    }

    /// Counter text in the `120 / 153 (2 parts)` form.
    pub fn counter(&self) -> String {
        if self.is_multipart() {
            format!(
                "{} / {} ({} parts)",
                self.unit_count, self.per_segment_capacity, self.segment_count
            )
        } else {
            format!("{} / {}", self.unit_count, self.per_segment_capacity)
        }
    }
}

pub fn plan(text: &str, encoding: Encoding) -> SegmentPlan {
    let unit_count = encoding.unit_count(text);
    let single = encoding.single_capacity();

    let (per_segment_capacity, segment_count) = if unit_count <= single {
        (single, 1)
    } else {
        let concat = encoding.concat_capacity();
        (concat, unit_count.div_ceil(concat))
    };

    let level = if unit_count > per_segment_capacity * EXCESSIVE_SEGMENTS {
        PlanLevel::Excessive
    } else if segment_count > 1 {
        PlanLevel::Multipart
    } else {
        PlanLevel::Single
    };

    SegmentPlan {
        encoding,
        unit_count,
        per_segment_capacity,
        segment_count,
        level,
    }
}
