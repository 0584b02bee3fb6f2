//! Read view handed to the transaction executor for one incarnation.
//!
//! Resolves reads through multi-version memory with base-state fallback,
//! records the origin of every read for later validation, and parks the
//! executing thread when the read lands on an estimate (an aborted writer that
//! has not re-executed yet).

use crate::{
    mvmemory::{MVMemory, ReadResult},
    scheduler::Scheduler,
    task::{BaseStateView, Transaction, TxnView},
    types::{ReadDescriptor, ReadOrigin, StorageError, TxnIndex},
};
use std::{cell::RefCell, collections::HashMap, time::Duration};

/// How long a parked execution sleeps between checks of the done marker, so a
/// halt cannot strand a thread waiting on a dependency nobody will resolve.
const DEPENDENCY_POLL_INTERVAL: Duration = Duration::from_millis(10);

pub(crate) struct MVView<'a, T: Transaction, B> {
    versioned: &'a MVMemory<T::Key, T::Value>,
    base: &'a B,
    scheduler: &'a Scheduler,
    txn_idx: TxnIndex,
    /// Reads already resolved by this incarnation. Serves two purposes: the
    /// recorded read-set for validation, and a cache making repeated reads of
    /// one location repeatable within the incarnation even if a lower-indexed
    /// write lands in between.
    captured: RefCell<HashMap<T::Key, (ReadOrigin, Option<T::Value>)>>,
}

impl<'a, T, B> MVView<'a, T, B>
where
    T: Transaction,
    B: BaseStateView<Key = T::Key, Value = T::Value>,
{
    pub(crate) fn new(
        versioned: &'a MVMemory<T::Key, T::Value>,
        base: &'a B,
        scheduler: &'a Scheduler,
        txn_idx: TxnIndex,
    ) -> Self {
        Self {
            versioned,
            base,
            scheduler,
            txn_idx,
            captured: RefCell::new(HashMap::new()),
        }
    }

    /// The read-set of the finished incarnation, one descriptor per distinct
    /// location.
    pub(crate) fn take_reads(&self) -> Vec<ReadDescriptor<T::Key>> {
        self.captured
            .borrow_mut()
            .drain()
            .map(|(key, (origin, _))| ReadDescriptor::new(key, origin))
            .collect()
    }

    /// Parks until the dependency's next incarnation finishes, the registration
    /// turns out to be stale, or execution is halted.
    fn wait_for(&self, dep_idx: TxnIndex) -> Result<(), StorageError> {
        let condvar = match self.scheduler.wait_for_dependency(self.txn_idx, dep_idx) {
            Some(condvar) => condvar,
            // Resolved between the read and the registration; just retry.
            None => return Ok(()),
        };

        let (lock, cvar) = &*condvar;
        let mut resolved = lock.lock();
        while !*resolved {
            if self.scheduler.done() {
                return Err(StorageError("block execution halted".to_string()));
            }
            cvar.wait_for(&mut resolved, DEPENDENCY_POLL_INTERVAL);
        }
        Ok(())
    }
}

impl<'a, T, B> TxnView for MVView<'a, T, B>
where
    T: Transaction,
    B: BaseStateView<Key = T::Key, Value = T::Value>,
{
    type Txn = T;

    fn get(&self, key: &T::Key) -> Result<Option<T::Value>, StorageError> {
        if let Some((_, value)) = self.captured.borrow().get(key) {
            return Ok(value.clone());
        }

        loop {
            match self.versioned.read(key, self.txn_idx) {
                ReadResult::Versioned(version, value) => {
                    let value = value.as_deref().cloned();
                    self.captured
                        .borrow_mut()
                        .insert(key.clone(), (ReadOrigin::FromWriter(version), value.clone()));
                    return Ok(value);
                }
                ReadResult::Storage => {
                    let value = self.base.get(key)?;
                    let origin = if value.is_some() {
                        ReadOrigin::FromStorage
                    } else {
                        ReadOrigin::NotFound
                    };
                    self.captured
                        .borrow_mut()
                        .insert(key.clone(), (origin, value.clone()));
                    return Ok(value);
                }
                ReadResult::Dependency(dep_idx) => {
                    self.wait_for(dep_idx)?;
                }
            }
        }
    }
}
