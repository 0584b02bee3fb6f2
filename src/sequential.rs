//! Sequential block execution in plain index order.
//!
//! Used for single-worker configurations and as the fallback once the
//! incarnation limit abandons the optimistic path. Produces the exact result
//! the parallel executor is required to match.

use crate::{
    executor::BlockOutput,
    task::{BaseStateView, ExecutionHooks, ExecutorTask, Transaction, TxnView},
    types::{BlockExecutionError, StorageError, TxnIndex},
};
use std::collections::HashMap;

/// Read view over the base state plus the writes of all prior transactions.
struct UnsyncView<'a, T: Transaction, B> {
    base: &'a B,
    overlay: &'a HashMap<T::Key, Option<T::Value>>,
}

impl<'a, T, B> TxnView for UnsyncView<'a, T, B>
where
    T: Transaction,
    B: BaseStateView<Key = T::Key, Value = T::Value>,
{
    type Txn = T;

    fn get(&self, key: &T::Key) -> Result<Option<T::Value>, StorageError> {
        match self.overlay.get(key) {
            Some(value) => Ok(value.clone()),
            None => self.base.get(key),
        }
    }
}

pub(crate) fn execute_block<T, E, B, H>(
    txns: &[T],
    executor: &E,
    base: &B,
    hooks: &H,
) -> Result<BlockOutput<T>, BlockExecutionError>
where
    T: Transaction,
    E: ExecutorTask<Txn = T>,
    B: BaseStateView<Key = T::Key, Value = T::Value>,
    H: ExecutionHooks,
{
    let mut state: HashMap<T::Key, Option<T::Value>> = HashMap::new();
    let mut outcomes = Vec::with_capacity(txns.len());

    for (idx, txn) in txns.iter().enumerate() {
        let txn_idx = idx as TxnIndex;
        hooks.on_execute(txn_idx, 0);

        let view: UnsyncView<'_, T, B> = UnsyncView {
            base,
            overlay: &state,
        };
        let output = executor.execute_transaction(&view, txn, txn_idx)?;

        for (key, value) in output.writes {
            state.insert(key, value);
        }
        outcomes.push(output.outcome);
        hooks.on_commit(txn_idx);
    }

    Ok(BlockOutput {
        final_writes: state,
        outcomes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxnOutcome;

    struct KvTxn(u64, u64);

    impl Transaction for KvTxn {
        type Key = u64;
        type Value = u64;
    }

    struct AddVm;

    impl ExecutorTask for AddVm {
        type Txn = KvTxn;

        fn execute_transaction(
            &self,
            view: &impl TxnView<Txn = KvTxn>,
            txn: &KvTxn,
            _txn_idx: TxnIndex,
        ) -> Result<crate::task::TxnOutput<KvTxn>, StorageError> {
            let current = view.get(&txn.0)?.unwrap_or(0);
            Ok(crate::task::TxnOutput {
                writes: vec![(txn.0, Some(current + txn.1))],
                outcome: TxnOutcome::Success,
            })
        }
    }

    struct EmptyBase;

    impl BaseStateView for EmptyBase {
        type Key = u64;
        type Value = u64;

        fn get(&self, _key: &u64) -> Result<Option<u64>, StorageError> {
            Ok(None)
        }
    }

    #[test]
    fn applies_writes_in_block_order() {
        let txns = vec![KvTxn(1, 5), KvTxn(1, 7), KvTxn(2, 3)];
        let output = execute_block(&txns, &AddVm, &EmptyBase, &crate::task::NoOpHooks).unwrap();

        assert_eq!(output.final_writes[&1], Some(12));
        assert_eq!(output.final_writes[&2], Some(3));
        assert_eq!(output.outcomes.len(), 3);
    }
}
