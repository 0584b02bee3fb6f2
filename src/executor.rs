//! Parallel block executor.
//!
//! Runs a block of transactions over a pool of worker threads using optimistic
//! concurrency: every transaction executes speculatively against multi-version
//! memory, records what it read, and is validated (and re-executed if stale)
//! until the whole block commits in the preset order. The committed result is
//! always identical to executing the block sequentially.

use crate::{
    mvmemory::{MVMemory, ReadResult},
    scheduler::{Scheduler, SchedulerTask},
    sequential,
    task::{BaseStateView, ExecutionHooks, ExecutorTask, NoOpHooks, Transaction, TxnOutput},
    types::{
        BlockExecutionError, ReadDescriptor, ReadOrigin, TxnIndex, TxnOutcome, Version, Wave,
    },
    view::MVView,
};
use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicBool, Ordering},
    thread,
};
use tracing::debug;

/// Configuration for parallel block execution.
#[derive(Debug, Clone)]
pub struct BlockExecutorConfig {
    /// Number of worker threads.
    pub num_workers: usize,
    /// Bound on re-executions per transaction before giving up on the
    /// optimistic path and replaying the block sequentially. `None` retries
    /// without bound.
    pub max_incarnations: Option<u32>,
}

impl Default for BlockExecutorConfig {
    fn default() -> Self {
        Self {
            num_workers: thread::available_parallelism().map(usize::from).unwrap_or(1),
            max_incarnations: None,
        }
    }
}

/// Result of executing one block.
pub struct BlockOutput<T: Transaction> {
    /// Final value per written location, deletions included as `None`.
    pub final_writes: HashMap<T::Key, Option<T::Value>>,
    /// Per-transaction outcome in block order.
    pub outcomes: Vec<TxnOutcome>,
}

impl<T: Transaction> BlockOutput<T> {
    pub(crate) fn empty() -> Self {
        Self {
            final_writes: HashMap::new(),
            outcomes: Vec::new(),
        }
    }
}

/// Last recorded input (read-set) and output (write-set + outcome) per
/// transaction. One writer at a time per slot by scheduler construction, but
/// validations read slots concurrently, hence the mutexes.
struct TxnLastInputOutput<T: Transaction> {
    inputs: Vec<CachePadded<Mutex<Vec<ReadDescriptor<T::Key>>>>>,
    outputs: Vec<CachePadded<Mutex<Option<TxnOutput<T>>>>>,
}

impl<T: Transaction> TxnLastInputOutput<T> {
    fn new(num_txns: TxnIndex) -> Self {
        Self {
            inputs: (0..num_txns)
                .map(|_| CachePadded::new(Mutex::new(Vec::new())))
                .collect(),
            outputs: (0..num_txns)
                .map(|_| CachePadded::new(Mutex::new(None)))
                .collect(),
        }
    }

    fn record(
        &self,
        txn_idx: TxnIndex,
        reads: Vec<ReadDescriptor<T::Key>>,
        output: TxnOutput<T>,
    ) {
        *self.inputs[txn_idx as usize].lock() = reads;
        *self.outputs[txn_idx as usize].lock() = Some(output);
    }

    fn read_set(&self, txn_idx: TxnIndex) -> Vec<ReadDescriptor<T::Key>> {
        self.inputs[txn_idx as usize].lock().clone()
    }

    /// Keys written by the last finished incarnation.
    fn modified_keys(&self, txn_idx: TxnIndex) -> Vec<T::Key> {
        self.outputs[txn_idx as usize]
            .lock()
            .as_ref()
            .map(|output| output.writes.iter().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default()
    }

    fn take_outcome(&self, txn_idx: TxnIndex) -> TxnOutcome {
        match self.outputs[txn_idx as usize].lock().take() {
            Some(output) => output.outcome,
            None => unreachable!("committed transaction without a recorded output"),
        }
    }
}

/// Block-STM executor. Generic over the observability hooks; the transaction
/// type, the virtual machine and the base state are parameters of [`run`].
///
/// [`run`]: BlockExecutor::run
pub struct BlockExecutor<H = NoOpHooks> {
    config: BlockExecutorConfig,
    hooks: H,
}

impl BlockExecutor<NoOpHooks> {
    pub fn new(config: BlockExecutorConfig) -> Self {
        Self {
            config,
            hooks: NoOpHooks,
        }
    }
}

impl<H: ExecutionHooks> BlockExecutor<H> {
    pub fn with_hooks(config: BlockExecutorConfig, hooks: H) -> Self {
        Self { config, hooks }
    }

    /// Executes the block and returns the final writes and per-transaction
    /// outcomes, exactly as a sequential execution in block order would
    /// produce them. Fails the whole block on a base-state read error; no
    /// partial result is produced.
    pub fn run<T, E, B>(
        &self,
        txns: &[T],
        executor: &E,
        base: &B,
    ) -> Result<BlockOutput<T>, BlockExecutionError>
    where
        T: Transaction,
        E: ExecutorTask<Txn = T>,
        B: BaseStateView<Key = T::Key, Value = T::Value>,
    {
        if txns.is_empty() {
            return Ok(BlockOutput::empty());
        }
        if self.config.num_workers <= 1 {
            return sequential::execute_block(txns, executor, base, &self.hooks);
        }

        let num_txns = txns.len() as TxnIndex;
        let scheduler = Scheduler::new(num_txns);
        let versioned = MVMemory::new();
        let last_io = TxnLastInputOutput::new(num_txns);
        let maybe_error: Mutex<Option<BlockExecutionError>> = Mutex::new(None);
        let fallback = AtomicBool::new(false);

        thread::scope(|s| {
            for _ in 0..self.config.num_workers {
                s.spawn(|| {
                    self.worker_loop(
                        txns,
                        executor,
                        base,
                        &scheduler,
                        &versioned,
                        &last_io,
                        &maybe_error,
                        &fallback,
                    )
                });
            }
        });

        if let Some(err) = maybe_error.into_inner() {
            return Err(err);
        }
        if fallback.load(Ordering::Acquire) {
            debug!("incarnation limit reached, replaying the block sequentially");
            return sequential::execute_block(txns, executor, base, &self.hooks);
        }

        Ok(BlockOutput {
            final_writes: versioned.final_writes().into_iter().collect(),
            outcomes: (0..num_txns).map(|idx| last_io.take_outcome(idx)).collect(),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn worker_loop<T, E, B>(
        &self,
        txns: &[T],
        executor: &E,
        base: &B,
        scheduler: &Scheduler,
        versioned: &MVMemory<T::Key, T::Value>,
        last_io: &TxnLastInputOutput<T>,
        maybe_error: &Mutex<Option<BlockExecutionError>>,
        fallback: &AtomicBool,
    ) where
        T: Transaction,
        E: ExecutorTask<Txn = T>,
        B: BaseStateView<Key = T::Key, Value = T::Value>,
    {
        let mut task = SchedulerTask::NoTask;
        loop {
            // Every worker opportunistically drains the commit watermark; the
            // lock inside try_commit keeps this single-threaded in effect.
            while let Some(txn_idx) = scheduler.try_commit() {
                self.hooks.on_commit(txn_idx);
            }

            task = match task {
                SchedulerTask::Execute(_, Some(dep_condvar)) => {
                    // The incarnation is already running on a parked thread;
                    // just wake it.
                    let (lock, cvar) = &*dep_condvar;
                    *lock.lock() = true;
                    cvar.notify_one();
                    SchedulerTask::NoTask
                }
                SchedulerTask::Execute(version, None) => self.execute(
                    version,
                    txns,
                    executor,
                    base,
                    scheduler,
                    versioned,
                    last_io,
                    maybe_error,
                ),
                SchedulerTask::Validate(version, wave) => {
                    self.validate(version, wave, scheduler, versioned, last_io, fallback)
                }
                SchedulerTask::NoTask => {
                    thread::yield_now();
                    scheduler.next_task()
                }
                SchedulerTask::Done => break,
            };
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn execute<T, E, B>(
        &self,
        version: Version,
        txns: &[T],
        executor: &E,
        base: &B,
        scheduler: &Scheduler,
        versioned: &MVMemory<T::Key, T::Value>,
        last_io: &TxnLastInputOutput<T>,
        maybe_error: &Mutex<Option<BlockExecutionError>>,
    ) -> SchedulerTask
    where
        T: Transaction,
        E: ExecutorTask<Txn = T>,
        B: BaseStateView<Key = T::Key, Value = T::Value>,
    {
        let Version {
            txn_idx,
            incarnation,
        } = version;
        self.hooks.on_execute(txn_idx, incarnation);

        let view = MVView::new(versioned, base, scheduler, txn_idx);
        match executor.execute_transaction(&view, &txns[txn_idx as usize], txn_idx) {
            Ok(output) => {
                // Apply the write-set, tracking whether any location is new
                // relative to the previous incarnation: a fresh location can
                // invalidate reads the old write-set could not.
                let mut prev_keys: HashSet<T::Key> =
                    last_io.modified_keys(txn_idx).into_iter().collect();
                let mut wrote_new_location = false;
                for (key, value) in &output.writes {
                    if !prev_keys.remove(key) {
                        wrote_new_location = true;
                    }
                    versioned.write(key.clone(), txn_idx, incarnation, value.clone());
                }
                // Retract locations the new incarnation no longer writes.
                for key in prev_keys {
                    versioned.remove(&key, txn_idx);
                }

                // Record before finish_execution: as soon as the status flips
                // to Executed, other workers may validate against these slots.
                last_io.record(txn_idx, view.take_reads(), output);
                scheduler.finish_execution(txn_idx, incarnation, wrote_new_location)
            }
            Err(err) => {
                // Base-state failure (or a read cut short by a halt already in
                // progress): fail the block once and drain the workers.
                if !scheduler.done() {
                    maybe_error
                        .lock()
                        .get_or_insert(BlockExecutionError::Storage(err));
                    scheduler.halt();
                }
                SchedulerTask::NoTask
            }
        }
    }

    fn validate<T: Transaction>(
        &self,
        version: Version,
        wave: Wave,
        scheduler: &Scheduler,
        versioned: &MVMemory<T::Key, T::Value>,
        last_io: &TxnLastInputOutput<T>,
        fallback: &AtomicBool,
    ) -> SchedulerTask {
        let Version {
            txn_idx,
            incarnation,
        } = version;

        let read_set = last_io.read_set(txn_idx);
        let valid = validate_read_set(&read_set, versioned, txn_idx);
        self.hooks.on_validate(txn_idx, incarnation, valid);

        if !valid && scheduler.try_abort(txn_idx, incarnation) {
            debug!(txn_idx, incarnation, "validation failed, aborting");
            // Flag this incarnation's writes so dependent reads block on the
            // re-execution instead of consuming stale data.
            for key in last_io.modified_keys(txn_idx) {
                versioned.mark_estimate(&key, txn_idx);
            }

            if self
                .config
                .max_incarnations
                .is_some_and(|limit| incarnation + 1 >= limit)
            {
                fallback.store(true, Ordering::Release);
                scheduler.halt();
                return SchedulerTask::NoTask;
            }

            scheduler.finish_abort(txn_idx, incarnation)
        } else {
            if valid {
                scheduler.finish_validation(txn_idx, wave);
            }
            SchedulerTask::NoTask
        }
    }
}

/// A read-set is valid iff re-resolving every recorded location yields the
/// same origin the execution observed. Never blocks: a dependency marker is
/// itself a mismatch.
fn validate_read_set<K: Eq + std::hash::Hash + Ord + Clone, V>(
    read_set: &[ReadDescriptor<K>],
    versioned: &MVMemory<K, V>,
    txn_idx: TxnIndex,
) -> bool {
    read_set.iter().all(|read| match versioned.read(&read.key, txn_idx) {
        ReadResult::Versioned(version, _) => read.origin == ReadOrigin::FromWriter(version),
        // Base state is immutable for the duration of the block, so any
        // storage-resolved origin still matches.
        ReadResult::Storage => matches!(
            read.origin,
            ReadOrigin::FromStorage | ReadOrigin::NotFound
        ),
        ReadResult::Dependency(_) => false,
    })
}
