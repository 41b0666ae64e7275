use std::collections::{BTreeSet, HashMap};

use crate::contact::ContactKey;
use crate::ids::{Reference, StorageId};
use crate::message::{Completeness, IntegrityWarning, LogicalMessage};
use crate::part::{Direction, PartInfo, RawPart};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Segmented {
        direction: Direction,
        contact: ContactKey,
        reference: Reference,
    },
    // Sent and received storage may number their records independently.
    Single {
        direction: Direction,
        storage_id: StorageId,
    },
}

impl GroupKey {
    fn of(part: &RawPart) -> Self {
        match part.part {
            PartInfo::Segment { reference, .. } => Self::Segmented {
                direction: part.direction,
                contact: ContactKey::normalize(&part.contact),
                reference,
            },
            PartInfo::Single => Self::Single {
                direction: part.direction,
                storage_id: part.storage_id,
            },
        }
    }
}

/// Group raw parts into logical messages.
///
/// Output follows the order in which each group is first seen. Incomplete
/// groups are kept, with content built from the parts present.
pub fn reassemble(parts: &[RawPart]) -> Vec<LogicalMessage> {
    let mut order: Vec<Vec<&RawPart>> = Vec::new();
    let mut slots: HashMap<GroupKey, usize> = HashMap::new();

    for part in parts {
        let key = GroupKey::of(part);
        match slots.get(&key) {
            Some(&slot) => order[slot].push(part),
            None => {
                slots.insert(key, order.len());
                order.push(vec![part]);
            }
        }
    }

    order.into_iter().map(build_message).collect()
}

fn build_message(mut group: Vec<&RawPart>) -> LogicalMessage {
    // Stable: duplicates of one index stay in storage order.
    group.sort_by_key(|p| p.part.index());
    let first = group[0];

    let mut warnings = Vec::new();
    let mut content = String::new();
    let (completeness, is_multipart) = match first.part {
        PartInfo::Single => {
            for part in &group {
                content.push_str(&part.text);
            }
            (Completeness::Complete, false)
        }
        PartInfo::Segment { total, .. } => {
            let totals: BTreeSet<u8> = group.iter().map(|p| p.part.total()).collect();
            let mismatch = totals.len() > 1;
            if mismatch {
                warnings.push(IntegrityWarning::TotalMismatch {
                    totals: totals.into_iter().collect(),
                });
            }

            let mut seen = BTreeSet::new();
            let mut out_of_range = false;
            let mut duplicates = BTreeSet::new();
            for part in &group {
                let index = part.part.index();
                if !seen.insert(index) {
                    duplicates.insert(index);
                    continue;
                }
                if index == 0 || index > total {
                    out_of_range = true;
                    warnings.push(IntegrityWarning::PartOutOfRange { index, total });
                }
                content.push_str(&part.text);
            }
            for index in duplicates {
                warnings.push(IntegrityWarning::DuplicatePart { index });
            }

            let missing: Vec<u8> = (1..=total).filter(|i| !seen.contains(i)).collect();
            let received = seen.iter().filter(|&&i| i >= 1 && i <= total).count();
            if !missing.is_empty() {
                warnings.push(IntegrityWarning::MissingParts {
                    missing: missing.clone(),
                });
            }

            let completeness = if missing.is_empty() && !mismatch && !out_of_range {
                Completeness::Complete
            } else {
                Completeness::Incomplete {
                    received,
                    total,
                    missing,
                }
            };
            (completeness, true)
        }
    };

    LogicalMessage {
        id: first.storage_id,
        part_ids: group.iter().map(|p| p.storage_id).collect(),
        contact: first.contact.clone(),
        contact_key: ContactKey::normalize(&first.contact),
        direction: first.direction,
        reference: first.part.reference(),
        raw_timestamp: first.raw_timestamp,
        timestamp: first.raw_timestamp,
        content,
        is_multipart,
        completeness,
        is_read: group.iter().all(|p| p.is_read),
        is_success: group.iter().all(|p| p.success),
        warnings,
    }
}
