//! Collaborator-facing seams: the opaque per-transaction executor, the base
//! state reader, and observability hooks.
//!
//! The engine never interprets transaction payloads itself. The virtual
//! machine is injected behind [`ExecutorTask`] and is only required to turn a
//! payload plus a read view into a write-set and an outcome.

use crate::types::{Incarnation, StorageError, TxnIndex, TxnOutcome};
use std::{fmt::Debug, hash::Hash};

/// A transaction that can be scheduled for parallel execution. Each
/// transaction reads and writes a key-value state as its side effect.
pub trait Transaction: Send + Sync + 'static {
    type Key: Eq + Hash + Ord + Clone + Send + Sync + Debug;
    type Value: Clone + Send + Sync + Debug;
}

/// Read view handed to the executor for one incarnation. `get` resolves a
/// location against the writes of strictly lower-indexed transactions, falling
/// back to base state; `None` means the location is absent (or deleted by the
/// latest lower-indexed writer).
///
/// Reading a location the same incarnation has already written is outside this
/// contract: the executor must resolve its own read-after-write internally.
pub trait TxnView {
    type Txn: Transaction;

    fn get(
        &self,
        key: &<Self::Txn as Transaction>::Key,
    ) -> Result<Option<<Self::Txn as Transaction>::Value>, StorageError>;
}

/// Write-set and outcome of one incarnation. The write-set must list every
/// location the execution decided to write, even if the value is unchanged
/// from a prior incarnation: the key set itself is what decides whether
/// higher-indexed transactions need suffix revalidation.
#[derive(Debug)]
pub struct TxnOutput<T: Transaction> {
    /// Written locations; `None` is a deletion.
    pub writes: Vec<(T::Key, Option<T::Value>)>,
    pub outcome: TxnOutcome,
}

impl<T: Transaction> Clone for TxnOutput<T> {
    fn clone(&self) -> Self {
        Self {
            writes: self.writes.clone(),
            outcome: self.outcome.clone(),
        }
    }
}

/// The opaque virtual machine executing one transaction against a view.
///
/// A deterministic transaction-level failure must be reported as
/// [`TxnOutcome::Aborted`] in the output, not as an `Err`: it participates in
/// validation like any other outcome. `Err` is reserved for base-state I/O
/// failures, which abort the whole block.
pub trait ExecutorTask: Sync {
    type Txn: Transaction;

    fn execute_transaction(
        &self,
        view: &impl TxnView<Txn = Self::Txn>,
        txn: &Self::Txn,
        txn_idx: TxnIndex,
    ) -> Result<TxnOutput<Self::Txn>, StorageError>;
}

/// Pre-block committed state, consulted only for reads with no lower-indexed
/// writer inside the block.
pub trait BaseStateView: Sync {
    type Key;
    type Value;

    fn get(&self, key: &Self::Key) -> Result<Option<Self::Value>, StorageError>;
}

/// Side-channel callbacks for metrics/logging collaborators. Implementations
/// must not affect determinism of the final writes.
pub trait ExecutionHooks: Sync {
    fn on_execute(&self, _txn_idx: TxnIndex, _incarnation: Incarnation) {}
    fn on_validate(&self, _txn_idx: TxnIndex, _incarnation: Incarnation, _valid: bool) {}
    fn on_commit(&self, _txn_idx: TxnIndex) {}
}

/// Hooks that do nothing; the type to name when no hooks are installed.
pub struct NoOpHooks;

impl ExecutionHooks for NoOpHooks {}
