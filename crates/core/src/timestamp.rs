use serde::{Deserialize, Serialize};

use crate::message::LogicalMessage;
use crate::part::Direction;

/// Offset removed from corrected timestamps. Modem firmware often stamps PDUs
/// in local UTC+8 time while the decoder reads them as UTC.
pub const TZ_CORRECTION_SECS: i64 = 8 * 60 * 60;

/// Per-direction opt-in for the UTC+8 correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimezoneCorrection {
    pub received: bool,
    pub sent: bool,
}

impl TimezoneCorrection {
    pub const NONE: Self = Self {
        received: false,
        sent: false,
    };

    pub fn applies_to(&self, direction: Direction) -> bool {
        match direction {
            Direction::Received => self.received,
            Direction::Sent => self.sent,
        }
    }
}

pub fn normalize(raw_timestamp: i64, direction: Direction, correction: TimezoneCorrection) -> i64 {
    if correction.applies_to(direction) {
        raw_timestamp.saturating_sub(TZ_CORRECTION_SECS)
    } else {
        raw_timestamp
    }
}

/// Recompute every message's timestamp from its raw value and restore
/// ascending order. The sort is stable, so equal timestamps keep the
/// incoming (storage) order.
pub fn apply_correction(messages: &mut [LogicalMessage], correction: TimezoneCorrection) {
    for message in messages.iter_mut() {
        message.timestamp = normalize(message.raw_timestamp, message.direction, correction);
    }
    messages.sort_by_key(|m| m.timestamp);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::part::RawPart;
    use crate::reassembly::reassemble;

    const T: i64 = 1_700_000_000;

    #[test]
    fn received_flag() {
        let on = TimezoneCorrection { received: true, sent: false };
        assert_eq!(normalize(T, Direction::Received, on), T - 28800);
        assert_eq!(normalize(T, Direction::Sent, on), T);
        assert_eq!(normalize(T, Direction::Received, TimezoneCorrection::NONE), T);
    }

    #[test]
    fn sent_flag() {
        let on = TimezoneCorrection { received: false, sent: true };
        assert_eq!(normalize(T, Direction::Sent, on), T - 28800);
        assert_eq!(normalize(T, Direction::Received, on), T);
    }

    #[test]
    fn extreme_timestamps_saturate() {
        let on = TimezoneCorrection { received: true, sent: true };
        assert_eq!(normalize(i64::MIN, Direction::Received, on), i64::MIN);
        assert_eq!(normalize(i64::MIN + 1, Direction::Sent, on), i64::MIN);
        assert_eq!(normalize(i64::MAX, Direction::Sent, on), i64::MAX - 28800);
    }

    #[test]
    fn correction_reorders_and_is_idempotent() {
        let parts = vec![
            RawPart::sent(1, "555000111", T, "sent first"),
            RawPart::received(2, "555000111", T + 3600, "reply an hour later"),
        ];
        let mut messages = reassemble(&parts);
        let flags = TimezoneCorrection { received: true, sent: false };

        apply_correction(&mut messages, flags);
        assert_eq!(messages[0].id.get(), 2);
        assert_eq!(messages[0].timestamp, T + 3600 - 28800);

        let once = messages.clone();
        apply_correction(&mut messages, flags);
        assert_eq!(messages, once);
    }

    #[test]
    fn ties_keep_storage_order() {
        let parts = vec![
            RawPart::received(4, "555000111", T, "a"),
            RawPart::received(9, "555000111", T, "b"),
            RawPart::received(6, "555000111", T, "c"),
        ];
        let mut messages = reassemble(&parts);
        apply_correction(&mut messages, TimezoneCorrection::NONE);
        let ids: Vec<u32> = messages.iter().map(|m| m.id.get()).collect();
        assert_eq!(ids, vec![4, 9, 6]);
    }
}
