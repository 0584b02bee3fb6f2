//! Block-STM parallel transaction executor.
//!
//! This crate implements the Block-STM algorithm for executing a block of
//! transactions in parallel while guaranteeing a result identical to executing
//! them one by one in block order. It uses optimistic concurrency control:
//! transactions execute speculatively against a multi-version memory, record
//! what they read, and are validated and re-executed until the whole block
//! commits in the preset order.
//!
//! # Core Components
//!
//! - **MVMemory**: Multi-version data structure storing one entry per
//!   (location, writing transaction) pair
//! - **Scheduler**: Coordinates parallel execution, validation and in-order
//!   commit across worker threads
//! - **BlockExecutor**: Orchestrates worker threads and collects the block
//!   result
//!
//! # Algorithm Overview
//!
//! 1. Transactions execute speculatively in parallel, reading the latest write
//!    of a lower-indexed transaction (or base state)
//! 2. Each execution records its read-set; validation re-resolves those reads
//!    and aborts the transaction if anything changed
//! 3. An aborted transaction's writes are flagged so dependents wait for its
//!    re-execution instead of consuming stale data
//! 4. Re-executions get incremented incarnation numbers and are revalidated
//! 5. Transactions commit in block order once validated against all
//!    lower-indexed results
//!
//! # Example
//!
//! ```rust,ignore
//! use block_stm::{BlockExecutor, BlockExecutorConfig};
//!
//! let config = BlockExecutorConfig {
//!     num_workers: 4,
//!     max_incarnations: None,
//! };
//!
//! let executor = BlockExecutor::new(config);
//! let output = executor.run(&transactions, &vm, &base_state)?;
//!
//! println!("committed {} transactions", output.outcomes.len());
//! ```

pub mod executor;
pub mod mvmemory;
pub mod scheduler;
pub mod task;
pub mod types;

mod sequential;
mod view;

pub use executor::{BlockExecutor, BlockExecutorConfig, BlockOutput};
pub use task::{
    BaseStateView, ExecutionHooks, ExecutorTask, NoOpHooks, Transaction, TxnOutput, TxnView,
};
pub use types::{BlockExecutionError, Incarnation, StorageError, TxnIndex, TxnOutcome, Version};
