// Pull-based query execution
//
// Each operator exposes init/next; a row travels up the tree as a
// (tuple, rid) pair. Lock failures surface as transaction aborts that
// unwind the whole tree; the coordinator then rolls back through the
// transaction manager.

pub mod operators;

use std::sync::{Arc, RwLock};

use thiserror::Error;

use crate::catalog::{Catalog, CatalogError};
use crate::common::types::Rid;
use crate::index::IndexError;
use crate::query::expression::ExpressionError;
use crate::storage::buffer::ParallelBufferPool;
use crate::storage::table::TableHeapError;
use crate::storage::tuple::Tuple;
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{Transaction, TransactionAbortError};

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error(transparent)]
    Aborted(#[from] TransactionAbortError),

    #[error("Storage error: {0}")]
    Storage(#[from] TableHeapError),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Expression error: {0}")]
    Expression(#[from] ExpressionError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Table {0} not found")]
    TableNotFound(u32),

    #[error("Execution error: {0}")]
    Internal(String),
}

pub type ExecResult<T> = Result<T, ExecutionError>;

/// Shared, non-owning handles every executor needs. The buffer pool,
/// catalog and lock manager all outlive any query.
#[derive(Clone)]
pub struct ExecutorContext {
    pub buffer_pool: Arc<ParallelBufferPool>,
    pub catalog: Arc<RwLock<Catalog>>,
    pub lock_manager: Arc<LockManager>,
    pub txn: Arc<Transaction>,
}

impl ExecutorContext {
    pub fn new(
        buffer_pool: Arc<ParallelBufferPool>,
        catalog: Arc<RwLock<Catalog>>,
        lock_manager: Arc<LockManager>,
        txn: Arc<Transaction>,
    ) -> Self {
        Self {
            buffer_pool,
            catalog,
            lock_manager,
            txn,
        }
    }
}

/// The iterator contract every operator implements
pub trait Executor: Send {
    /// Reset the operator to the start of its output
    fn init(&mut self) -> ExecResult<()>;

    /// Produce the next row, or `None` when exhausted
    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>>;
}

pub type BoxedExecutor = Box<dyn Executor>;
