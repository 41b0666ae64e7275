use std::cell::Cell;
use std::collections::BTreeSet;

use modemsms_core::{Direction, ModemScope, RawPart, StorageId};
use modemsms_storage::{
    ConfigStore, DeleteReceipt, ModemSettings, ModemTransport, Pdu, SendReceipt, StorageError,
};

/// Wraps a working transport and injects the failures a real modem shows.
#[derive(Debug)]
pub struct FlakyTransport<T> {
    inner: T,
    pub refuse_sends: bool,
    pub fail_fetches: bool,
    /// Ids the modem silently keeps when asked to delete them.
    pub withhold_deletes: BTreeSet<StorageId>,
    fetch_calls: Cell<usize>,
    pub send_calls: usize,
    pub delete_calls: usize,
    pub mark_read_calls: usize,
}

impl<T> FlakyTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            refuse_sends: false,
            fail_fetches: false,
            withhold_deletes: BTreeSet::new(),
            fetch_calls: Cell::new(0),
            send_calls: 0,
            delete_calls: 0,
            mark_read_calls: 0,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.get()
    }

    fn fetch(&self) -> Result<(), StorageError> {
        self.fetch_calls.set(self.fetch_calls.get() + 1);
        if self.fail_fetches {
            return Err(StorageError::Transport("modem did not answer".into()));
        }
        Ok(())
    }
}

impl<T: ModemTransport> ModemTransport for FlakyTransport<T> {
    fn list_parts(&self, scope: &ModemScope) -> Result<Vec<RawPart>, StorageError> {
        self.fetch()?;
        self.inner.list_parts(scope)
    }

    fn list_parts_for_contact(
        &self,
        scope: &ModemScope,
        contact: &str,
    ) -> Result<Vec<RawPart>, StorageError> {
        self.fetch()?;
        self.inner.list_parts_for_contact(scope, contact)
    }

    fn send(
        &mut self,
        scope: &ModemScope,
        contact: &str,
        pdus: &[Pdu],
        original_text: &str,
    ) -> Result<SendReceipt, StorageError> {
        self.send_calls += 1;
        if self.refuse_sends {
            return Err(StorageError::Transport("+CMS ERROR: 500".into()));
        }
        self.inner.send(scope, contact, pdus, original_text)
    }

    fn delete(
        &mut self,
        scope: &ModemScope,
        direction: Direction,
        ids: &[StorageId],
    ) -> Result<DeleteReceipt, StorageError> {
        self.delete_calls += 1;
        let allowed: Vec<StorageId> = ids
            .iter()
            .copied()
            .filter(|id| !self.withhold_deletes.contains(id))
            .collect();
        self.inner.delete(scope, direction, &allowed)
    }

    fn mark_read(&mut self, scope: &ModemScope, ids: &[StorageId]) -> Result<(), StorageError> {
        self.mark_read_calls += 1;
        self.inner.mark_read(scope, ids)
    }
}

impl<T: ConfigStore> ConfigStore for FlakyTransport<T> {
    fn load_settings(&self, scope: &ModemScope) -> Result<ModemSettings, StorageError> {
        self.inner.load_settings(scope)
    }

    fn save_settings(
        &mut self,
        scope: &ModemScope,
        settings: &ModemSettings,
    ) -> Result<(), StorageError> {
        self.inner.save_settings(scope, settings)
    }
}
