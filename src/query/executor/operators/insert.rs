use std::sync::Arc;

use crate::catalog::{IndexInfo, TableInfo};
use crate::query::executor::{BoxedExecutor, ExecResult, ExecutionError, Executor, ExecutorContext};
use crate::query::plan::{InsertPlan, InsertSource};
use crate::storage::tuple::Tuple;
use crate::transaction::transaction::{IndexWriteRecord, WriteType};

/// Inserts rows into a table, maintaining every secondary index. Rows
/// come either from literals embedded in the plan or from a child.
pub struct InsertExecutor {
    ctx: ExecutorContext,
    plan: InsertPlan,
    child: Option<BoxedExecutor>,
    table: Arc<TableInfo>,
    indexes: Vec<Arc<IndexInfo>>,
    raw_cursor: usize,
}

impl InsertExecutor {
    pub fn new(
        ctx: ExecutorContext,
        plan: InsertPlan,
        child: Option<BoxedExecutor>,
    ) -> ExecResult<Self> {
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
            raw_cursor: 0,
        })
    }

    /// Write one row through the heap and every index, recording index
    /// maintenance for undo
    fn insert(&self, tuple: &Tuple) -> ExecResult<crate::common::types::Rid> {
        let txn = &self.ctx.txn;
        let rid = self.table.heap.insert_tuple(tuple, txn)?;

        for index_info in &self.indexes {
            let key = tuple.key_from_tuple(&index_info.key_attrs);
            index_info.index.insert_entry(&key, rid)?;
            txn.append_index_write(IndexWriteRecord {
                rid,
                table_oid: self.table.oid,
                index_oid: index_info.oid,
                wtype: WriteType::Insert,
                tuple: tuple.clone(),
                old_tuple: None,
            });
        }
        Ok(rid)
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> ExecResult<()> {
        match (&self.plan.source, self.child.as_mut()) {
            (InsertSource::FromChild, Some(child)) => child.init(),
            (InsertSource::FromChild, None) => Err(ExecutionError::Internal(
                "insert plan expects a child executor".into(),
            )),
            (InsertSource::Raw(_), _) => {
                self.raw_cursor = 0;
                Ok(())
            }
        }
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, crate::common::types::Rid)>> {
        let tuple = match &self.plan.source {
            InsertSource::Raw(rows) => {
                if self.raw_cursor >= rows.len() {
                    return Ok(None);
                }
                let tuple = Tuple::new(rows[self.raw_cursor].clone());
                self.raw_cursor += 1;
                tuple
            }
            InsertSource::FromChild => {
                let child = self.child.as_mut().ok_or_else(|| {
                    ExecutionError::Internal("insert plan expects a child executor".into())
                })?;
                match child.next()? {
                    Some((tuple, _)) => tuple,
                    None => return Ok(None),
                }
            }
        };

        let rid = self.insert(&tuple)?;
        Ok(Some((tuple, rid)))
    }
}
