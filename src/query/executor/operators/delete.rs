use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::query::executor::{BoxedExecutor, ExecResult, ExecutionError, Executor, ExecutorContext};
use crate::query::plan::DeletePlan;
use crate::storage::tuple::Tuple;
use crate::transaction::transaction::{IndexWriteRecord, WriteType};

/// Marks the child's rows deleted, upgrading a held shared lock or
/// taking an exclusive one, and retracts every index entry.
pub struct DeleteExecutor {
    ctx: ExecutorContext,
    child: BoxedExecutor,
    table: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
}

impl DeleteExecutor {
    pub fn new(ctx: ExecutorContext, plan: DeletePlan, child: BoxedExecutor) -> ExecResult<Self> {
        let (table, indexes) = {
            let catalog = ctx.catalog.read().unwrap();
            let table = catalog
                .get_table(plan.table_oid)
                .ok_or(ExecutionError::TableNotFound(plan.table_oid))?;
            let indexes = catalog.get_table_indexes(&table.name);
            (table, indexes)
        };
        Ok(Self {
            ctx,
            child,
            table,
            indexes,
        })
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.child.init()
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, crate::common::types::Rid)>> {
        let (tuple, rid) = match self.child.next()? {
            Some(row) => row,
            None => return Ok(None),
        };

        let txn = &self.ctx.txn;
        if txn.is_shared_locked(rid) {
            self.ctx.lock_manager.lock_upgrade(txn, rid)?;
        } else {
            self.ctx.lock_manager.lock_exclusive(txn, rid)?;
        }

        self.table.heap.mark_delete(rid, txn)?;

        for index_info in &self.indexes {
            let key = tuple.key_from_tuple(&index_info.key_attrs);
            index_info.index.delete_entry(&key, rid)?;
            txn.append_index_write(IndexWriteRecord {
                rid,
                table_oid: self.table.oid,
                index_oid: index_info.oid,
                wtype: WriteType::Delete,
                tuple: tuple.clone(),
                old_tuple: None,
            });
        }

        Ok(Some((tuple, rid)))
    }
}
