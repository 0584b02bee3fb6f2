//! Core types for Block-STM execution.

use std::fmt;
use thiserror::Error;

/// Transaction index in the block (0-based, fixed by the preset order).
pub type TxnIndex = u32;

/// Incarnation number (how many times a transaction has been re-executed).
pub type Incarnation = u32;

/// Validation wave. Every time the validation cursor is moved backwards (after
/// an abort, or after an execution that wrote to a fresh location), a new wave
/// begins; commit of a transaction requires a successful validation in a
/// sufficiently recent wave.
pub type Wave = u32;

/// Version identifier for one transaction execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub txn_idx: TxnIndex,
    pub incarnation: Incarnation,
}

impl Version {
    pub fn new(txn_idx: TxnIndex, incarnation: Incarnation) -> Self {
        Self {
            txn_idx,
            incarnation,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.txn_idx, self.incarnation)
    }
}

/// Where a read was resolved from, as observed during execution and re-derived
/// during validation. Two origins are equal only if the read would see the
/// exact same data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOrigin {
    /// The latest write by a lower-indexed transaction, identified by version.
    FromWriter(Version),
    /// No lower-indexed writer in the block; the base state had a value.
    FromStorage,
    /// No lower-indexed writer in the block and no base value either.
    NotFound,
}

/// One read performed by one incarnation: the location and what it observed.
#[derive(Debug, Clone)]
pub struct ReadDescriptor<K> {
    pub key: K,
    pub origin: ReadOrigin,
}

impl<K> ReadDescriptor<K> {
    pub fn new(key: K, origin: ReadOrigin) -> Self {
        Self { key, origin }
    }
}

/// Outcome of one incarnation as decided by the transaction executor.
///
/// A deterministic executor-level abort is a normal outcome: it is recorded,
/// validated and committed like any success, since re-running it with the same
/// reads must reproduce the same abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxnOutcome {
    Success,
    Aborted(String),
}

/// Failure reading the externally-supplied base state. Unlike conflict aborts,
/// this is not recoverable by re-execution and fails the whole block.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct StorageError(pub String);

/// Error returned from [`BlockExecutor::run`](crate::executor::BlockExecutor::run).
/// No partial block result is ever produced alongside an error.
#[derive(Debug, Error)]
pub enum BlockExecutionError {
    #[error("base state read failed: {0}")]
    Storage(#[from] StorageError),
}
