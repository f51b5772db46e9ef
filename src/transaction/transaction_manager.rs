use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::catalog::Catalog;
use crate::common::types::TxnId;
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{
    IsolationLevel, Transaction, TransactionError, TransactionState, WriteType,
};
use crate::transaction::wal::log_manager::LogManager;

/// Creates and tracks transactions, and drives commit and rollback
pub struct TransactionManager {
    next_txn_id: AtomicU32,
    log_manager: Arc<LogManager>,
    lock_manager: Arc<LockManager>,
    active_transactions: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(log_manager: Arc<LogManager>, lock_manager: Arc<LockManager>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
            log_manager,
            lock_manager,
            active_transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a new transaction. Ids are monotonic, so a smaller id always
    /// denotes an older transaction for Wound-Wait.
    pub fn begin(
        &self,
        isolation_level: IsolationLevel,
    ) -> Result<Arc<Transaction>, TransactionError> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(
            txn_id,
            self.log_manager.clone(),
            isolation_level,
        ));
        txn.begin()?;

        self.active_transactions
            .lock()
            .unwrap()
            .insert(txn_id, txn.clone());
        Ok(txn)
    }

    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.active_transactions.lock().unwrap().get(&txn_id).cloned()
    }

    /// Commit: apply deferred deletes, log the commit, release every lock
    pub fn commit(&self, txn: &Arc<Transaction>, catalog: &Catalog) -> Result<(), TransactionError> {
        match txn.state() {
            TransactionState::Growing | TransactionState::Shrinking => {}
            _ => return Err(TransactionError::InvalidState(txn.id())),
        }

        for record in txn.take_write_set() {
            if record.wtype == WriteType::Delete {
                let table = catalog
                    .get_table(record.table_oid)
                    .ok_or_else(|| no_table(record.table_oid))?;
                table
                    .heap
                    .apply_delete(record.rid)
                    .map_err(|e| TransactionError::RollbackError(e.to_string()))?;
            }
        }
        txn.take_index_write_set();

        txn.log_commit()?;
        txn.set_state(TransactionState::Committed);
        self.lock_manager.release_all(txn);
        self.active_transactions.lock().unwrap().remove(&txn.id());
        Ok(())
    }

    /// Abort: undo heap writes newest-first, back out index maintenance,
    /// log the abort, release every lock
    pub fn abort(&self, txn: &Arc<Transaction>, catalog: &Catalog) -> Result<(), TransactionError> {
        if txn.state() == TransactionState::Committed {
            return Err(TransactionError::InvalidState(txn.id()));
        }

        let mut write_set = txn.take_write_set();
        while let Some(record) = write_set.pop() {
            let table = catalog
                .get_table(record.table_oid)
                .ok_or_else(|| no_table(record.table_oid))?;
            let undo = match record.wtype {
                WriteType::Insert => table.heap.apply_delete(record.rid),
                WriteType::Delete => table.heap.rollback_delete(record.rid),
                WriteType::Update => {
                    let old = record.old_tuple.as_ref().ok_or_else(|| {
                        TransactionError::RollbackError("update record missing pre-image".into())
                    })?;
                    table.heap.restore_tuple(record.rid, old)
                }
            };
            undo.map_err(|e| TransactionError::RollbackError(e.to_string()))?;
        }

        let mut index_write_set = txn.take_index_write_set();
        while let Some(record) = index_write_set.pop() {
            let index_info = catalog.get_index(record.index_oid).ok_or_else(|| {
                TransactionError::RollbackError(format!("index {} not found", record.index_oid))
            })?;
            let key = record.tuple.key_from_tuple(&index_info.key_attrs);
            let undo = match record.wtype {
                WriteType::Insert => index_info.index.delete_entry(&key, record.rid),
                WriteType::Delete => index_info.index.insert_entry(&key, record.rid),
                WriteType::Update => {
                    let old = record.old_tuple.as_ref().ok_or_else(|| {
                        TransactionError::RollbackError(
                            "index update record missing pre-image".into(),
                        )
                    })?;
                    index_info.index.delete_entry(&key, record.rid).and_then(|_| {
                        index_info
                            .index
                            .insert_entry(&old.key_from_tuple(&index_info.key_attrs), record.rid)
                    })
                }
            };
            undo.map_err(|e| TransactionError::RollbackError(e.to_string()))?;
        }

        txn.log_abort()?;
        txn.set_state(TransactionState::Aborted);
        self.lock_manager.release_all(txn);
        self.active_transactions.lock().unwrap().remove(&txn.id());
        Ok(())
    }
}

fn no_table(oid: u32) -> TransactionError {
    TransactionError::RollbackError(format!("table {} not found", oid))
}
