//! Benchmark for parallel block execution with varying conflict levels.

use block_stm::{
    BaseStateView, BlockExecutor, BlockExecutorConfig, ExecutorTask, StorageError, Transaction,
    TxnIndex, TxnOutcome, TxnOutput, TxnView,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::HashMap;

/// Balance transfer between two accounts.
#[derive(Debug, Clone)]
struct Transfer {
    from: u64,
    to: u64,
    amount: u64,
}

impl Transaction for Transfer {
    type Key = u64;
    type Value = u64;
}

struct TransferVm;

impl ExecutorTask for TransferVm {
    type Txn = Transfer;

    fn execute_transaction(
        &self,
        view: &impl TxnView<Txn = Transfer>,
        txn: &Transfer,
        _txn_idx: TxnIndex,
    ) -> Result<TxnOutput<Transfer>, StorageError> {
        let from_balance = view.get(&txn.from)?.unwrap_or(0);
        if from_balance < txn.amount {
            return Ok(TxnOutput {
                writes: Vec::new(),
                outcome: TxnOutcome::Aborted("insufficient balance".to_string()),
            });
        }
        let to_balance = view.get(&txn.to)?.unwrap_or(0);
        Ok(TxnOutput {
            writes: vec![
                (txn.from, Some(from_balance - txn.amount)),
                (txn.to, Some(to_balance + txn.amount)),
            ],
            outcome: TxnOutcome::Success,
        })
    }
}

struct Balances(HashMap<u64, u64>);

impl BaseStateView for Balances {
    type Key = u64;
    type Value = u64;

    fn get(&self, key: &u64) -> Result<Option<u64>, StorageError> {
        Ok(self.0.get(key).copied())
    }
}

struct WorkloadConfig {
    num_accounts: u64,
    num_transactions: usize,
    /// Fraction of transfers funneled through one hot account.
    conflict_factor: f64,
    seed: u64,
}

fn generate_workload(config: &WorkloadConfig) -> (Vec<Transfer>, Balances) {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let txns = (0..config.num_transactions)
        .map(|_| {
            let from = if rng.gen_bool(config.conflict_factor) {
                0
            } else {
                rng.gen_range(0..config.num_accounts)
            };
            let mut to = rng.gen_range(0..config.num_accounts - 1);
            if to >= from {
                to += 1;
            }
            Transfer {
                from,
                to,
                amount: rng.gen_range(1..10),
            }
        })
        .collect();

    let balances = Balances(
        (0..config.num_accounts)
            .map(|account| (account, 1_000_000))
            .collect(),
    );
    (txns, balances)
}

fn executor(num_workers: usize) -> BlockExecutor {
    BlockExecutor::new(BlockExecutorConfig {
        num_workers,
        max_incarnations: None,
    })
}

/// Parallel vs sequential across conflict levels.
fn bench_conflict_levels(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_stm/conflict_levels");

    let conflict_factors = [0.0, 0.25, 0.5, 1.0];
    let num_transactions = 1000;

    for &conflict_factor in &conflict_factors {
        let config = WorkloadConfig {
            num_accounts: 1000,
            num_transactions,
            conflict_factor,
            seed: 42,
        };
        let (txns, balances) = generate_workload(&config);

        group.throughput(Throughput::Elements(num_transactions as u64));
        for (name, num_workers) in [("sequential", 1), ("parallel_4", 4), ("parallel_8", 8)] {
            let exec = executor(num_workers);
            group.bench_with_input(
                BenchmarkId::new(name, format!("conflict_{:.0}%", conflict_factor * 100.0)),
                &txns,
                |b, txns| {
                    b.iter(|| {
                        let output = exec
                            .run(black_box(txns), &TransferVm, &balances)
                            .expect("base state never fails");
                        output.outcomes.len()
                    });
                },
            );
        }
    }

    group.finish();
}

/// Parallel vs sequential across block sizes.
fn bench_block_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_stm/block_sizes");

    let block_sizes = [100, 500, 1000, 5000];

    for &block_size in &block_sizes {
        let config = WorkloadConfig {
            num_accounts: 10_000,
            num_transactions: block_size,
            conflict_factor: 0.0,
            seed: 42,
        };
        let (txns, balances) = generate_workload(&config);

        group.throughput(Throughput::Elements(block_size as u64));
        for (name, num_workers) in [("sequential", 1), ("parallel_4", 4)] {
            let exec = executor(num_workers);
            group.bench_with_input(BenchmarkId::new(name, block_size), &txns, |b, txns| {
                b.iter(|| {
                    let output = exec
                        .run(black_box(txns), &TransferVm, &balances)
                        .expect("base state never fails");
                    output.outcomes.len()
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_conflict_levels, bench_block_sizes);
criterion_main!(benches);
