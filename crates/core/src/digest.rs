use std::fmt;

use crate::error::CoreError;
use crate::part::RawPart;
use crate::timestamp::TimezoneCorrection;

/// Fingerprint of everything a rebuild depends on: the raw part snapshot and
/// the correction flags. Equal digests mean equal conversation views.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotDigest([u8; 32]);

impl SnapshotDigest {
    pub fn compute(parts: &[RawPart], correction: TimezoneCorrection) -> Result<Self, CoreError> {
        let mut hasher = blake3::Hasher::new();
        let flags = rmp_serde::to_vec(&correction)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        hasher.update(&flags);
        for part in parts {
            let bytes =
                rmp_serde::to_vec(part).map_err(|e| CoreError::Serialization(e.to_string()))?;
            hasher.update(&(bytes.len() as u64).to_be_bytes());
            hasher.update(&bytes);
        }
        Ok(Self(*hasher.finalize().as_bytes()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for SnapshotDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnapshotDigest({:02x}{:02x}...)", self.0[0], self.0[1])
    }
}
