//! Collaborative scheduler coordinating parallel execution and validation.
//!
//! Two fetch-and-increment cursors disperse worker threads across transaction
//! indices: one for execution, one for validation. The cursors are advisory
//! lower bounds only; the authoritative state is the per-transaction status
//! cell, guarded by its own mutex. A worker that grabs an index whose status
//! does not match the expected precondition simply no-ops and retries, so the
//! raciness of the counters never costs correctness, at worst one wasted
//! `next_task` call.

use crate::types::{Incarnation, TxnIndex, Version, Wave};
use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};
use std::{
    cmp::max,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
    },
};

const TXN_IDX_MASK: u64 = (1 << 32) - 1;

/// Condition variable a suspended execution parks on. The flag flips to true
/// when the dependency is resolved and the execution may retry its read.
pub type DependencyCondvar = Arc<(Mutex<bool>, Condvar)>;

/// Unit of work handed to a worker thread.
pub enum SchedulerTask {
    /// Execute the given incarnation. If the condvar is present the
    /// incarnation is already running on a parked thread waiting for a
    /// resolved dependency; the receiving worker only wakes it up.
    Execute(Version, Option<DependencyCondvar>),
    /// Validate the executed incarnation, associated with a validation wave.
    Validate(Version, Wave),
    /// Nothing eligible right now; call `next_task` again.
    NoTask,
    /// The block is fully committed (or execution was halted).
    Done,
}

/// Status of one transaction. Each status carries the latest incarnation.
///
/// ```text
/// ReadyToExecute(i)
///    |  try_incarnate
///    ↓          wait_for_dependency              resume
/// Executing(i) --------------------> Suspended(i) -----> ReadyToExecute(i)
///    |  finish_execution
///    ↓
/// Executed(i) --(validated in a recent-enough wave)-----> Committed(i)
///    |  try_abort
///    ↓          finish_abort
/// Aborting(i) ------------------------------------------> ReadyToExecute(i+1)
/// ```
///
/// `Executed` doubles as "ready to validate": an executed incarnation may be
/// validated concurrently by several waves, so validation eligibility is not
/// an exclusive claim the way execution is.
#[derive(Debug)]
enum TxnStatus {
    ReadyToExecute(Incarnation, Option<DependencyCondvar>),
    Executing(Incarnation),
    Suspended(Incarnation, DependencyCondvar),
    Executed(Incarnation),
    Committed(Incarnation),
    Aborting(Incarnation),
}

impl PartialEq for TxnStatus {
    fn eq(&self, other: &Self) -> bool {
        use TxnStatus::*;
        match (self, other) {
            (ReadyToExecute(a, _), ReadyToExecute(b, _))
            | (Executing(a), Executing(b))
            | (Suspended(a, _), Suspended(b, _))
            | (Executed(a), Executed(b))
            | (Committed(a), Committed(b))
            | (Aborting(a), Aborting(b)) => a == b,
            _ => false,
        }
    }
}

/// Per-transaction validation bookkeeping gating the commit watermark.
struct ValidationProgress {
    /// Highest wave in which a suffix revalidation covering this index was
    /// triggered.
    triggered_wave: Wave,
    /// Highest wave that successfully validated this transaction.
    validated_wave: Option<Wave>,
    /// Extra lower bound for executions that only self-validated (the
    /// incarnation wrote strictly inside its previous write-set).
    required_wave: Wave,
}

impl ValidationProgress {
    fn new() -> Self {
        Self {
            triggered_wave: 0,
            validated_wave: None,
            required_wave: 0,
        }
    }
}

pub struct Scheduler {
    /// Number of transactions in the block, immutable.
    num_txns: TxnIndex,

    /// Lower bound on indices that may need execution. Incremented by workers
    /// grabbing execution work; decreased when dependencies resolve.
    execution_cursor: AtomicU32,
    /// High 32 bits: current validation wave; low 32 bits: lower bound on
    /// indices that may need validation. Decreasing the index bumps the wave.
    validation_cursor: AtomicU64,
    /// Commit watermark: next index to commit, plus a sweeping lower bound on
    /// the wave a validation must have reached for commit to be allowed.
    commit_state: Mutex<(TxnIndex, Wave)>,
    /// Set once all transactions can be committed, or on halt.
    done_marker: AtomicBool,

    /// Index i holds indices of transactions suspended on a read of i's
    /// in-flight write; resumed when i's incarnation finishes.
    dependency_waiters: Vec<CachePadded<Mutex<Vec<TxnIndex>>>>,
    /// Authoritative per-transaction state: execution status and validation
    /// progress.
    txn_status: Vec<CachePadded<(Mutex<TxnStatus>, Mutex<ValidationProgress>)>>,
}

impl Scheduler {
    pub fn new(num_txns: TxnIndex) -> Self {
        Self {
            num_txns,
            execution_cursor: AtomicU32::new(0),
            validation_cursor: AtomicU64::new(0),
            commit_state: Mutex::new((0, 0)),
            done_marker: AtomicBool::new(false),
            dependency_waiters: (0..num_txns)
                .map(|_| CachePadded::new(Mutex::new(Vec::new())))
                .collect(),
            txn_status: (0..num_txns)
                .map(|_| {
                    CachePadded::new((
                        Mutex::new(TxnStatus::ReadyToExecute(0, None)),
                        Mutex::new(ValidationProgress::new()),
                    ))
                })
                .collect(),
        }
    }

    pub fn num_txns(&self) -> TxnIndex {
        self.num_txns
    }

    /// Whether the done marker is set.
    pub fn done(&self) -> bool {
        self.done_marker.load(Ordering::Acquire)
    }

    /// Stops handing out tasks. Used for fatal errors and the sequential
    /// fallback; parked dependency waiters notice via their wait timeout.
    pub fn halt(&self) {
        self.done_marker.store(true, Ordering::SeqCst);
    }

    /// Advances the commit watermark by one if the next uncommitted
    /// transaction is executed and validated in a recent-enough wave. Returns
    /// the committed index, or None if the watermark cannot move yet. Sets the
    /// done marker once the watermark passes the last transaction.
    pub fn try_commit(&self) -> Option<TxnIndex> {
        let mut commit_state = self.commit_state.lock();
        let idx = commit_state.0;
        if idx == self.num_txns {
            self.done_marker.store(true, Ordering::SeqCst);
            return None;
        }

        let cell = &self.txn_status[idx as usize];
        if let Some(progress) = cell.1.try_lock() {
            if let Some(mut status) = cell.0.try_lock() {
                if let TxnStatus::Executed(incarnation) = *status {
                    // Sweep the wave lower bound forward: any suffix
                    // revalidation triggered at this index binds all higher
                    // indices too.
                    commit_state.1 = max(commit_state.1, progress.triggered_wave);
                    if let Some(validated) = progress.validated_wave {
                        if validated >= max(commit_state.1, progress.required_wave) {
                            *status = TxnStatus::Committed(incarnation);
                            commit_state.0 += 1;
                            return Some(idx);
                        }
                    }
                }
            }
        }
        None
    }

    /// Tries to abort version (txn_idx, incarnation) after a validation
    /// failure. Succeeds at most once per version: the caller that flips
    /// Executed -> Aborting owns the abort and must call `finish_abort`.
    pub fn try_abort(&self, txn_idx: TxnIndex, incarnation: Incarnation) -> bool {
        let mut status = self.txn_status[txn_idx as usize].0.lock();
        if *status == TxnStatus::Executed(incarnation) {
            *status = TxnStatus::Aborting(incarnation);
            true
        } else {
            false
        }
    }

    /// Returns the next unit of work: the cursor pointing at the lower index
    /// wins, with validation preferred on a tie (it is the cheaper task and
    /// only eligible behind the execution frontier anyway).
    pub fn next_task(&self) -> SchedulerTask {
        loop {
            if self.done() {
                return SchedulerTask::Done;
            }

            let (idx_to_validate, _) =
                Self::unpack_validation_cursor(self.validation_cursor.load(Ordering::Acquire));
            let idx_to_execute = self.execution_cursor.load(Ordering::Acquire);

            if idx_to_execute >= self.num_txns && idx_to_validate >= self.num_txns {
                return SchedulerTask::NoTask;
            }

            if idx_to_validate < idx_to_execute {
                if let Some((version, wave)) = self.try_validate_next() {
                    return SchedulerTask::Validate(version, wave);
                }
            } else if let Some((version, maybe_condvar)) = self.try_execute_next() {
                return SchedulerTask::Execute(version, maybe_condvar);
            }
        }
    }

    /// Registers `txn_idx` as waiting for `dep_idx` and returns the condvar to
    /// park on, or None if the dependency resolved in the meantime, in which
    /// case the caller must simply retry the read that blocked.
    pub fn wait_for_dependency(
        &self,
        txn_idx: TxnIndex,
        dep_idx: TxnIndex,
    ) -> Option<DependencyCondvar> {
        let dep_condvar: DependencyCondvar = Arc::new((Mutex::new(false), Condvar::new()));

        let mut waiters = self.dependency_waiters[dep_idx as usize].lock();

        // Committed counts as resolved too: its waiter list was drained at
        // finish_execution and will never be drained again.
        if self.is_executed(dep_idx, true).is_some() {
            // Already resolved; registering now would leave a zombie waiter
            // that nobody wakes. (This takes the status mutex while holding
            // the waiter mutex; the only such nesting in the scheduler, so
            // the acquisition order is fixed and cannot deadlock.)
            return None;
        }

        self.suspend(txn_idx, dep_condvar.clone());

        // Still holding the waiter lock: finish_execution of dep_idx takes the
        // same lock before draining, so this registration cannot be missed.
        waiters.push(txn_idx);

        Some(dep_condvar)
    }

    /// Records a successful validation of `txn_idx` at `wave`.
    pub fn finish_validation(&self, txn_idx: TxnIndex, wave: Wave) {
        let mut progress = self.txn_status[txn_idx as usize].1.lock();
        progress.validated_wave = Some(match progress.validated_wave {
            Some(prev) => max(prev, wave),
            None => wave,
        });
    }

    /// Called when an incarnation finished executing and its writes landed in
    /// multi-version memory. Resumes suspended dependents, and either lowers
    /// the validation cursor (starting a new wave) if the incarnation wrote
    /// outside its previous write-set, or hands the caller a validation task
    /// for just this transaction.
    pub fn finish_execution(
        &self,
        txn_idx: TxnIndex,
        incarnation: Incarnation,
        wrote_new_location: bool,
    ) -> SchedulerTask {
        // Hold the validation progress lock across the status flip so the
        // commit watermark never observes Executed with stale wave bounds.
        let mut progress = self.txn_status[txn_idx as usize].1.lock();
        self.set_executed_status(txn_idx, incarnation);

        let waiters: Vec<TxnIndex> = {
            let mut stored = self.dependency_waiters[txn_idx as usize].lock();
            std::mem::take(&mut *stored)
        };

        let min_waiter = waiters
            .into_iter()
            .map(|dep| {
                self.resume(dep);
                dep
            })
            .min();
        if let Some(target) = min_waiter {
            // Ensure resumed transactions get picked up again.
            self.execution_cursor.fetch_min(target, Ordering::SeqCst);
        }

        let (cur_val_idx, cur_wave) =
            Self::unpack_validation_cursor(self.validation_cursor.load(Ordering::Acquire));

        // If the validation cursor is still at or below this index, the
        // regular sweep will cover whatever needs validating.
        if cur_val_idx > txn_idx {
            if wrote_new_location {
                // A write to a fresh location can invalidate reads of any
                // higher transaction: revalidate the whole suffix.
                if let Some(wave) = self.decrease_validation_cursor(txn_idx) {
                    progress.triggered_wave = wave;
                }
            } else {
                // Only this transaction needs validating; return the task to
                // the caller directly.
                progress.required_wave = cur_wave;
                return SchedulerTask::Validate(Version::new(txn_idx, incarnation), cur_wave);
            }
        }

        SchedulerTask::NoTask
    }

    /// Completes an abort won via `try_abort`: schedules the suffix for
    /// revalidation and readies incarnation + 1. May hand the re-execution
    /// task straight back to the caller instead of dragging the execution
    /// cursor down past unrelated indices.
    pub fn finish_abort(&self, txn_idx: TxnIndex, incarnation: Incarnation) -> SchedulerTask {
        let mut progress = self.txn_status[txn_idx as usize].1.lock();
        self.set_aborted_status(txn_idx, incarnation);

        if let Some(wave) = self.decrease_validation_cursor(txn_idx) {
            progress.triggered_wave = wave;
        }

        if self.execution_cursor.load(Ordering::Acquire) > txn_idx {
            if let Some((new_incarnation, maybe_condvar)) = self.try_incarnate(txn_idx) {
                return SchedulerTask::Execute(
                    Version::new(txn_idx, new_incarnation),
                    maybe_condvar,
                );
            }
        }

        SchedulerTask::NoTask
    }
}

/// Internal helpers.
impl Scheduler {
    fn unpack_validation_cursor(cursor: u64) -> (TxnIndex, Wave) {
        ((cursor & TXN_IDX_MASK) as TxnIndex, (cursor >> 32) as Wave)
    }

    /// Lowers the validation cursor to `target_idx`, bumping the wave.
    /// Returns the new wave, or None if the cursor was already low enough.
    fn decrease_validation_cursor(&self, target_idx: TxnIndex) -> Option<Wave> {
        self.validation_cursor
            .fetch_update(Ordering::SeqCst, Ordering::Acquire, |cursor| {
                let (txn_idx, wave) = Self::unpack_validation_cursor(cursor);
                (txn_idx > target_idx)
                    .then(|| (target_idx as u64) | ((wave as u64 + 1) << 32))
            })
            .ok()
            .map(|prev| Self::unpack_validation_cursor(prev).1 + 1)
    }

    /// Claims the next incarnation of `txn_idx` for execution. Succeeds only
    /// from ReadyToExecute, so each version is executed exactly once.
    fn try_incarnate(&self, txn_idx: TxnIndex) -> Option<(Incarnation, Option<DependencyCondvar>)> {
        if txn_idx >= self.num_txns {
            return None;
        }

        let mut status = self.txn_status[txn_idx as usize].0.lock();
        if let TxnStatus::ReadyToExecute(incarnation, maybe_condvar) = &*status {
            let ret = (*incarnation, maybe_condvar.clone());
            *status = TxnStatus::Executing(*incarnation);
            Some(ret)
        } else {
            None
        }
    }

    /// Some(incarnation) iff the transaction finished executing. Validation
    /// cares about Executed only; dependency resolution must also accept
    /// Committed, which can never regress to an unresolved state.
    fn is_executed(&self, txn_idx: TxnIndex, include_committed: bool) -> Option<Incarnation> {
        if txn_idx >= self.num_txns {
            return None;
        }

        let status = self.txn_status[txn_idx as usize].0.lock();
        match *status {
            TxnStatus::Executed(incarnation) => Some(incarnation),
            TxnStatus::Committed(incarnation) if include_committed => Some(incarnation),
            _ => None,
        }
    }

    fn try_validate_next(&self) -> Option<(Version, Wave)> {
        let (idx_to_validate, wave) = Self::unpack_validation_cursor(
            self.validation_cursor.fetch_add(1, Ordering::SeqCst),
        );

        self.is_executed(idx_to_validate, false)
            .map(|incarnation| (Version::new(idx_to_validate, incarnation), wave))
    }

    fn try_execute_next(&self) -> Option<(Version, Option<DependencyCondvar>)> {
        let idx_to_execute = self.execution_cursor.fetch_add(1, Ordering::SeqCst);

        self.try_incarnate(idx_to_execute)
            .map(|(incarnation, maybe_condvar)| {
                (Version::new(idx_to_execute, incarnation), maybe_condvar)
            })
    }

    /// Parks the currently executing transaction on a dependency condvar.
    fn suspend(&self, txn_idx: TxnIndex, dep_condvar: DependencyCondvar) {
        let mut status = self.txn_status[txn_idx as usize].0.lock();
        if let TxnStatus::Executing(incarnation) = *status {
            *status = TxnStatus::Suspended(incarnation, dep_condvar);
        } else {
            unreachable!("suspend from non-Executing status: {:?}", *status);
        }
    }

    /// Marks a suspended transaction ready again, carrying the condvar so the
    /// claiming worker wakes the parked execution instead of re-running it.
    fn resume(&self, txn_idx: TxnIndex) {
        let mut status = self.txn_status[txn_idx as usize].0.lock();
        if let TxnStatus::Suspended(incarnation, dep_condvar) = &*status {
            *status = TxnStatus::ReadyToExecute(*incarnation, Some(dep_condvar.clone()));
        } else {
            unreachable!("resume from non-Suspended status: {:?}", *status);
        }
    }

    fn set_executed_status(&self, txn_idx: TxnIndex, incarnation: Incarnation) {
        let mut status = self.txn_status[txn_idx as usize].0.lock();
        debug_assert!(
            *status == TxnStatus::Executing(incarnation),
            "finish_execution from unexpected status"
        );
        *status = TxnStatus::Executed(incarnation);
    }

    fn set_aborted_status(&self, txn_idx: TxnIndex, incarnation: Incarnation) {
        let mut status = self.txn_status[txn_idx as usize].0.lock();
        debug_assert!(
            *status == TxnStatus::Aborting(incarnation),
            "finish_abort from unexpected status"
        );
        *status = TxnStatus::ReadyToExecute(incarnation + 1, None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim_execution(scheduler: &Scheduler) -> Version {
        match scheduler.next_task() {
            SchedulerTask::Execute(version, None) => version,
            _ => panic!("expected a fresh execution task"),
        }
    }

    #[test]
    fn hands_out_execution_tasks_in_index_order() {
        let scheduler = Scheduler::new(3);
        assert_eq!(claim_execution(&scheduler), Version::new(0, 0));
        assert_eq!(claim_execution(&scheduler), Version::new(1, 0));
        assert_eq!(claim_execution(&scheduler), Version::new(2, 0));
        assert!(matches!(scheduler.next_task(), SchedulerTask::NoTask));
    }

    #[test]
    fn executed_transaction_becomes_validation_work() {
        let scheduler = Scheduler::new(2);
        claim_execution(&scheduler);
        assert!(matches!(
            scheduler.finish_execution(0, 0, false),
            SchedulerTask::NoTask
        ));

        // Validation cursor (0) is now behind the execution cursor (1).
        match scheduler.next_task() {
            SchedulerTask::Validate(version, wave) => {
                assert_eq!(version, Version::new(0, 0));
                assert_eq!(wave, 0);
            }
            _ => panic!("expected a validation task"),
        }
    }

    #[test]
    fn abort_is_exactly_once_and_reschedules() {
        let scheduler = Scheduler::new(2);
        claim_execution(&scheduler);
        claim_execution(&scheduler);
        scheduler.finish_execution(0, 0, false);

        assert!(scheduler.try_abort(0, 0));
        assert!(!scheduler.try_abort(0, 0));

        // Execution cursor is past index 0, so the re-execution task comes
        // straight back.
        match scheduler.finish_abort(0, 0) {
            SchedulerTask::Execute(version, None) => {
                assert_eq!(version, Version::new(0, 1));
            }
            _ => panic!("expected the re-execution task back"),
        }
    }

    #[test]
    fn commit_watermark_advances_in_index_order() {
        let scheduler = Scheduler::new(2);
        claim_execution(&scheduler);
        claim_execution(&scheduler);

        // Finish out of order; commit must still go 0 then 1.
        scheduler.finish_execution(1, 0, false);
        scheduler.finish_execution(0, 0, false);
        assert!(scheduler.try_commit().is_none());

        scheduler.finish_validation(1, 0);
        assert!(scheduler.try_commit().is_none());

        scheduler.finish_validation(0, 0);
        assert_eq!(scheduler.try_commit(), Some(0));
        assert_eq!(scheduler.try_commit(), Some(1));

        // Watermark passed the last index: the block is done.
        assert!(scheduler.try_commit().is_none());
        assert!(matches!(scheduler.next_task(), SchedulerTask::Done));
    }

    fn claim_validation(scheduler: &Scheduler) -> (Version, Wave) {
        match scheduler.next_task() {
            SchedulerTask::Validate(version, wave) => (version, wave),
            _ => panic!("expected a validation task"),
        }
    }

    #[test]
    fn abort_invalidates_stale_validations_of_the_suffix() {
        let scheduler = Scheduler::new(2);
        claim_execution(&scheduler);
        claim_execution(&scheduler);

        // The second claim burned a validation slot, so the cursor already
        // sits past index 0 and txn 0's validation task is handed straight
        // back; txn 1's still comes from the sweep.
        match scheduler.finish_execution(0, 0, false) {
            SchedulerTask::Validate(version, wave) => {
                assert_eq!(version, Version::new(0, 0));
                assert_eq!(wave, 0);
            }
            _ => panic!("expected txn 0's validation task back"),
        }
        assert!(matches!(
            scheduler.finish_execution(1, 0, false),
            SchedulerTask::NoTask
        ));

        // Both validate successfully in wave 0.
        scheduler.finish_validation(0, 0);
        assert_eq!(claim_validation(&scheduler), (Version::new(1, 0), 0));
        scheduler.finish_validation(1, 0);

        // Transaction 0 aborts before anything commits: its wave-0 validation
        // of transaction 1 must no longer be commit-worthy.
        assert!(scheduler.try_abort(0, 0));
        match scheduler.finish_abort(0, 0) {
            SchedulerTask::Execute(version, None) => assert_eq!(version, Version::new(0, 1)),
            _ => panic!("expected the re-execution task back"),
        }
        assert!(scheduler.try_commit().is_none());

        scheduler.finish_execution(0, 1, false);
        // Still gated: incarnation 1 has only a wave-0 validation bound.
        assert!(scheduler.try_commit().is_none());

        // The suffix revalidation sweep runs in wave 1.
        match scheduler.next_task() {
            SchedulerTask::Validate(version, wave) => {
                assert_eq!(version, Version::new(0, 1));
                assert_eq!(wave, 1);
            }
            _ => panic!("expected wave-1 validation of txn 0"),
        }
        scheduler.finish_validation(0, 1);
        assert_eq!(scheduler.try_commit(), Some(0));

        // Transaction 1's stale wave-0 result is not enough.
        assert!(scheduler.try_commit().is_none());
        match scheduler.next_task() {
            SchedulerTask::Validate(version, wave) => {
                assert_eq!(version, Version::new(1, 0));
                assert_eq!(wave, 1);
            }
            _ => panic!("expected wave-1 validation of txn 1"),
        }
        scheduler.finish_validation(1, 1);
        assert_eq!(scheduler.try_commit(), Some(1));
    }

    #[test]
    fn dependency_suspends_and_resumes() {
        let scheduler = Scheduler::new(2);
        claim_execution(&scheduler);
        claim_execution(&scheduler);

        // Txn 1 blocks on txn 0's in-flight write.
        let condvar = scheduler
            .wait_for_dependency(1, 0)
            .expect("dependency on an executing transaction must register");

        // When txn 0 finishes, txn 1 is resumed. Txn 0's own validation task
        // is handed straight back (the validation cursor is already past it);
        // the wake-up task carrying the same condvar comes from the cursor.
        match scheduler.finish_execution(0, 0, false) {
            SchedulerTask::Validate(version, _) => assert_eq!(version, Version::new(0, 0)),
            _ => panic!("expected txn 0's validation task back"),
        }
        match scheduler.next_task() {
            SchedulerTask::Execute(version, Some(cv)) => {
                assert_eq!(version, Version::new(1, 0));
                assert!(Arc::ptr_eq(&cv, &condvar));
            }
            _ => panic!("expected a wake-up execution task for txn 1"),
        }
    }

    #[test]
    fn resolved_dependency_does_not_register() {
        let scheduler = Scheduler::new(2);
        claim_execution(&scheduler);
        claim_execution(&scheduler);
        scheduler.finish_execution(0, 0, false);

        // Txn 0 already executed: the reader just retries its read.
        assert!(scheduler.wait_for_dependency(1, 0).is_none());
    }

    #[test]
    fn committed_dependency_counts_as_resolved() {
        let scheduler = Scheduler::new(2);
        claim_execution(&scheduler);
        claim_execution(&scheduler);

        // Drive txn 0 all the way to Committed.
        match scheduler.finish_execution(0, 0, false) {
            SchedulerTask::Validate(version, wave) => {
                assert_eq!(version, Version::new(0, 0));
                scheduler.finish_validation(0, wave);
            }
            _ => panic!("expected txn 0's validation task back"),
        }
        assert_eq!(scheduler.try_commit(), Some(0));

        // A read that raced the commit must not park: txn 0's waiter list was
        // drained at finish_execution and nothing will ever drain it again.
        assert!(scheduler.wait_for_dependency(1, 0).is_none());
    }

    #[test]
    fn halt_drains_all_workers() {
        let scheduler = Scheduler::new(4);
        claim_execution(&scheduler);
        scheduler.halt();
        assert!(matches!(scheduler.next_task(), SchedulerTask::Done));
    }
}
