use std::sync::Arc;

use crate::catalog::TableInfo;
use crate::query::executor::{ExecResult, ExecutionError, Executor, ExecutorContext};
use crate::query::plan::SeqScanPlan;
use crate::storage::table::TableIterator;
use crate::storage::tuple::Tuple;
use crate::transaction::transaction::{AbortReason, IsolationLevel, TransactionAbortError};

/// Sequential scan over a table heap. Rows are locked shared before they
/// are read (skipped under READ UNCOMMITTED) and released right after
/// under READ COMMITTED.
pub struct SeqScanExecutor {
    ctx: ExecutorContext,
    plan: SeqScanPlan,
    table: Arc<TableInfo>,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(ctx: ExecutorContext, plan: SeqScanPlan) -> ExecResult<Self> {
        let table = ctx
            .catalog
            .read()
            .unwrap()
            .get_table(plan.table_oid)
            .ok_or(ExecutionError::TableNotFound(plan.table_oid))?;
        Ok(Self {
            ctx,
            plan,
            table,
            iter: None,
        })
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.iter = Some(TableIterator::new(self.table.heap.clone()));
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, crate::common::types::Rid)>> {
        let iter = self
            .iter
            .as_mut()
            .ok_or_else(|| ExecutionError::Internal("scan used before init".into()))?;

        let txn = &self.ctx.txn;
        let isolation = txn.isolation_level();

        while let Some(rid) = iter.next_rid()? {
            // lock the row the iterator just produced, not a stale rid
            if isolation != IsolationLevel::ReadUncommitted {
                self.ctx.lock_manager.lock_shared(txn, rid)?;
            }

            let tuple = self.table.heap.get_tuple(rid)?;

            if let Some(predicate) = &self.plan.predicate {
                if !predicate.evaluate(&tuple)?.is_true() {
                    if isolation == IsolationLevel::ReadCommitted {
                        self.ctx.lock_manager.unlock(txn, rid);
                    }
                    continue;
                }
            }

            let output = match &self.plan.output_columns {
                Some(columns) => tuple.key_from_tuple(columns),
                None => tuple,
            };

            if isolation == IsolationLevel::ReadCommitted
                && !self.ctx.lock_manager.unlock(txn, rid)
            {
                return Err(
                    TransactionAbortError::new(txn.id(), AbortReason::Deadlock).into(),
                );
            }

            return Ok(Some((output, rid)));
        }
        Ok(None)
    }
}
