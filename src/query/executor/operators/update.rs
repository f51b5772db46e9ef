use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::query::executor::{BoxedExecutor, ExecResult, ExecutionError, Executor, ExecutorContext};
use crate::query::plan::{UpdateAction, UpdatePlan};
use crate::storage::tuple::{Datum, Tuple};
use crate::transaction::transaction::{IndexWriteRecord, WriteType};

/// Rewrites the child's rows per the plan's SET/ADD actions, writing
/// through the heap and swapping old index keys for new ones.
pub struct UpdateExecutor {
    ctx: ExecutorContext,
    plan: UpdatePlan,
    child: BoxedExecutor,
    table: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
}

impl UpdateExecutor {
    pub fn new(ctx: ExecutorContext, plan: UpdatePlan, child: BoxedExecutor) -> ExecResult<Self> {
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
            plan,
            child,
            table,
            indexes,
        })
    }

    fn generate_updated_tuple(&self, src: &Tuple) -> ExecResult<Tuple> {
        let mut values = Vec::with_capacity(src.arity());
        for (idx, value) in src.values().iter().enumerate() {
            match self.plan.update_attrs.get(&idx) {
                None => values.push(value.clone()),
                Some(UpdateAction::Set(new_value)) => values.push(new_value.clone()),
                Some(UpdateAction::Add(delta)) => match value {
                    Datum::Int(old) => values.push(Datum::Int(old + delta)),
                    other => {
                        return Err(ExecutionError::Internal(format!(
                            "cannot ADD to non-integer value {}",
                            other
                        )))
                    }
                },
            }
        }
        Ok(Tuple::new(values))
    }
}

impl Executor for UpdateExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.child.init()
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, crate::common::types::Rid)>> {
        let (old_tuple, rid) = match self.child.next()? {
            Some(row) => row,
            None => return Ok(None),
        };

        let txn = &self.ctx.txn;
        if txn.is_shared_locked(rid) {
            self.ctx.lock_manager.lock_upgrade(txn, rid)?;
        } else {
            self.ctx.lock_manager.lock_exclusive(txn, rid)?;
        }

        let updated = self.generate_updated_tuple(&old_tuple)?;
        self.table.heap.update_tuple(&updated, rid, txn)?;

        for index_info in &self.indexes {
            let old_key = old_tuple.key_from_tuple(&index_info.key_attrs);
            let new_key = updated.key_from_tuple(&index_info.key_attrs);
            index_info.index.delete_entry(&old_key, rid)?;
            index_info.index.insert_entry(&new_key, rid)?;
            txn.append_index_write(IndexWriteRecord {
                rid,
                table_oid: self.table.oid,
                index_oid: index_info.oid,
                wtype: WriteType::Update,
                tuple: updated.clone(),
                old_tuple: Some(old_tuple.clone()),
            });
        }

        Ok(Some((updated, rid)))
    }
}
