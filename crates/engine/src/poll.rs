use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use modemsms_core::{ContactKey, FetchId};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PollScope {
    Conversations,
    Conversation(ContactKey),
}

/// Proof that a fetch was started. Hand it back to `finish`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub scope: PollScope,
    pub fetch_id: FetchId,
    generation: u64,
}

#[derive(Debug)]
struct Registration {
    interval: Duration,
    next_due: Instant,
    in_flight: Option<FetchId>,
    generation: u64,
}

#[derive(Debug, Default)]
pub struct PollScheduler {
    registrations: BTreeMap<PollScope, Registration>,
    generations: u64,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a scope. The first tick falls one interval after
    /// `now`. Replacing a scope orphans any fetch still in flight for it.
    pub fn register(&mut self, scope: PollScope, interval: Duration, now: Instant) {
        self.generations += 1;
        let registration = Registration {
            interval,
            next_due: now + interval,
            in_flight: None,
            generation: self.generations,
        };
        debug!(scope = ?scope, interval_ms = interval.as_millis() as u64, "poll registered");
        self.registrations.insert(scope, registration);
    }

    /// Drop a registration. A fetch already in flight runs to completion but
    /// its result will be discarded.
    pub fn cancel(&mut self, scope: &PollScope) -> bool {
        let removed = self.registrations.remove(scope).is_some();
        if removed {
            debug!(scope = ?scope, "poll cancelled");
        }
        removed
    }

    pub fn is_registered(&self, scope: &PollScope) -> bool {
        self.registrations.contains_key(scope)
    }

    pub fn in_flight(&self, scope: &PollScope) -> bool {
        self.registrations
            .get(scope)
            .is_some_and(|r| r.in_flight.is_some())
    }

    pub fn due(&self, now: Instant) -> Vec<PollScope> {
        self.registrations
            .iter()
            .filter(|(_, r)| r.next_due <= now)
            .map(|(scope, _)| scope.clone())
            .collect()
    }

    /// Start a fetch, or `None` when one is already in flight for the scope
    /// or the scope is not registered. The next tick is scheduled from `now`
    /// whatever the fetch's outcome.
    pub fn begin(&mut self, scope: &PollScope, now: Instant) -> Option<FetchTicket> {
        let registration = self.registrations.get_mut(scope)?;
        if registration.in_flight.is_some() {
            debug!(scope = ?scope, "previous fetch still in flight, skipping tick");
            return None;
        }
        let fetch_id = FetchId::new();
        registration.in_flight = Some(fetch_id);
        registration.next_due = now + registration.interval;
        Some(FetchTicket {
            scope: scope.clone(),
            fetch_id,
            generation: registration.generation,
        })
    }

    /// Close a fetch. `false` means the registration was cancelled or
    /// replaced meanwhile and the result must be dropped.
    pub fn finish(&mut self, ticket: &FetchTicket) -> bool {
        let Some(registration) = self.registrations.get_mut(&ticket.scope) else {
            debug!(fetch = %ticket.fetch_id, "fetch finished after cancel, discarding");
            return false;
        };
        if registration.generation != ticket.generation
            || registration.in_flight != Some(ticket.fetch_id)
        {
            debug!(fetch = %ticket.fetch_id, "fetch finished for a replaced registration, discarding");
            return false;
        }
        registration.in_flight = None;
        true
    }
}
