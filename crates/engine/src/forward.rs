use std::collections::BTreeSet;

use modemsms_core::{Direction, LogicalMessage, StorageId};
use modemsms_storage::{ConfigStore, ModemTransport};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::PduCodec;
use crate::deletion;
use crate::error::EngineError;
use crate::Engine;

/// A complete received message as handed to forwarding sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardedSms {
    pub sender: String,
    /// Corrected timestamp, seconds since the epoch.
    pub timestamp: i64,
    pub content: String,
    pub part_ids: Vec<StorageId>,
}

impl ForwardedSms {
    fn from_message(message: &LogicalMessage) -> Self {
        Self {
            sender: message.contact.clone(),
            timestamp: message.timestamp,
            content: message.content.clone(),
            part_ids: message.part_ids.clone(),
        }
    }
}

#[derive(Debug, Error)]
#[error("{sink}: {reason}")]
pub struct ForwardError {
    pub sink: String,
    pub reason: String,
}

pub trait ForwardSink {
    fn name(&self) -> &str;
    fn forward(&mut self, sms: &ForwardedSms) -> Result<(), ForwardError>;
}

/// Messages already forwarded, keyed by part ids and raw timestamp so a
/// reused storage slot is not mistaken for an old message.
#[derive(Debug, Default)]
pub struct ForwardLedger {
    done: BTreeSet<(Vec<StorageId>, i64)>,
}

impl ForwardLedger {
    fn key(message: &LogicalMessage) -> (Vec<StorageId>, i64) {
        (message.part_ids.clone(), message.raw_timestamp)
    }

    pub fn contains(&self, message: &LogicalMessage) -> bool {
        self.done.contains(&Self::key(message))
    }

    fn record(&mut self, message: &LogicalMessage) {
        self.done.insert(Self::key(message));
    }

    /// Forget messages that are no longer on the modem.
    fn retain_present(&mut self, present: &[&LogicalMessage]) {
        let keys: BTreeSet<_> = present.iter().map(|m| Self::key(m)).collect();
        self.done.retain(|k| keys.contains(k));
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForwardReport {
    pub forwarded: usize,
    /// Every sink refused; retried on the next pass.
    pub failed: usize,
    /// Incomplete multi-part messages waiting for parts.
    pub waiting: usize,
    pub deleted: usize,
    pub delete_failures: usize,
}

impl<T: ModemTransport + ConfigStore, C: PduCodec> Engine<T, C> {
    pub fn forward_ledger(&self) -> &ForwardLedger {
        &self.ledger
    }

    /// Push every complete, not yet forwarded received message to the sinks.
    /// A message counts as forwarded once any sink accepts it.
    pub fn forward_pending(
        &mut self,
        sinks: &mut [Box<dyn ForwardSink>],
    ) -> Result<ForwardReport, EngineError> {
        self.refresh()?;
        let list = self.conversations();
        let received: Vec<&LogicalMessage> = list
            .iter()
            .flat_map(|c| c.messages.iter())
            .filter(|m| m.direction == Direction::Received)
            .collect();
        self.ledger.retain_present(&received);

        let mut report = ForwardReport::default();
        for message in received {
            if self.ledger.contains(message) {
                continue;
            }
            if !message.is_complete() {
                report.waiting += 1;
                continue;
            }

            let sms = ForwardedSms::from_message(message);
            let mut accepted = 0;
            for sink in sinks.iter_mut() {
                match sink.forward(&sms) {
                    Ok(()) => {
                        debug!(sink = sink.name(), sender = %sms.sender, "forwarded sms");
                        accepted += 1;
                    }
                    Err(e) => warn!(sink = sink.name(), error = %e, "forward failed"),
                }
            }
            if accepted == 0 {
                report.failed += 1;
                continue;
            }

            self.ledger.record(message);
            report.forwarded += 1;

            if self.settings.delete_after_forward {
                match deletion::delete_message(&mut self.transport, &self.scope, message) {
                    Ok(_) => report.deleted += 1,
                    Err(e) => {
                        warn!(error = %e, "delete after forward failed");
                        report.delete_failures += 1;
                    }
                }
            }
        }

        if report.deleted > 0 {
            self.rebuild_after("forward");
        }
        if report.forwarded > 0 || report.failed > 0 {
            info!(
                scope = %self.scope,
                forwarded = report.forwarded,
                failed = report.failed,
                waiting = report.waiting,
                deleted = report.deleted,
                "forwarding pass finished"
            );
        }
        Ok(report)
    }
}
