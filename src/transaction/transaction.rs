// Transaction state and per-transaction bookkeeping
//
// A transaction records what it locked and what it wrote; the lock
// manager enforces two-phase locking over the lock sets and the
// transaction manager undoes the write sets on abort.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Lsn, Rid, TxnId};
use crate::storage::tuple::Tuple;
use crate::transaction::wal::log_manager::LogManager;
use crate::transaction::wal::log_record::{LogRecordPayload, LogRecordType};

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

/// Transaction states under two-phase locking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransactionState {
    Growing = 0,
    Shrinking = 1,
    Committed = 2,
    Aborted = 3,
}

impl TransactionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TransactionState::Growing,
            1 => TransactionState::Shrinking,
            2 => TransactionState::Committed,
            _ => TransactionState::Aborted,
        }
    }
}

/// Why a transaction was aborted by the lock manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Deadlock,
    UpgradeConflict,
    LockOnShrinking,
    LockSharedOnReadUncommitted,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            AbortReason::Deadlock => "wounded by an older transaction",
            AbortReason::UpgradeConflict => "conflicting lock upgrade",
            AbortReason::LockOnShrinking => "lock requested in shrinking phase",
            AbortReason::LockSharedOnReadUncommitted => {
                "shared lock requested under READ UNCOMMITTED"
            }
        };
        write!(f, "{}", text)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Transaction {txn_id} aborted: {reason}")]
pub struct TransactionAbortError {
    pub txn_id: TxnId,
    pub reason: AbortReason,
}

impl TransactionAbortError {
    pub fn new(txn_id: TxnId, reason: AbortReason) -> Self {
        Self { txn_id, reason }
    }
}

/// Errors from the transaction manager
#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("Transaction {0} is already committed or aborted")]
    InvalidState(TxnId),

    #[error("Transaction {0} not found")]
    NotFound(TxnId),

    #[error("Failed to write to WAL: {0}")]
    LogError(String),

    #[error("Rollback failed: {0}")]
    RollbackError(String),
}

/// What a write did, for undo purposes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteType {
    Insert,
    Delete,
    Update,
}

/// One table-heap modification made by a transaction
#[derive(Debug, Clone)]
pub struct TableWriteRecord {
    pub rid: Rid,
    pub wtype: WriteType,
    pub table_oid: u32,
    /// Pre-image, present for updates
    pub old_tuple: Option<Tuple>,
}

/// One secondary-index modification made by a transaction
#[derive(Debug, Clone)]
pub struct IndexWriteRecord {
    pub rid: Rid,
    pub table_oid: u32,
    pub index_oid: u32,
    pub wtype: WriteType,
    /// Row image the maintained key was derived from (post-image for
    /// inserts and updates, pre-image for deletes)
    pub tuple: Tuple,
    /// Pre-image, present for updates
    pub old_tuple: Option<Tuple>,
}

/// An active database transaction
pub struct Transaction {
    id: TxnId,
    state: AtomicU8,
    isolation_level: IsolationLevel,
    log_manager: Arc<LogManager>,
    prev_lsn: AtomicU64,

    shared_lock_set: Mutex<HashSet<Rid>>,
    exclusive_lock_set: Mutex<HashSet<Rid>>,
    write_set: Mutex<Vec<TableWriteRecord>>,
    index_write_set: Mutex<Vec<IndexWriteRecord>>,
}

impl Transaction {
    pub fn new(id: TxnId, log_manager: Arc<LogManager>, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            state: AtomicU8::new(TransactionState::Growing as u8),
            isolation_level,
            log_manager,
            prev_lsn: AtomicU64::new(0),
            shared_lock_set: Mutex::new(HashSet::new()),
            exclusive_lock_set: Mutex::new(HashSet::new()),
            write_set: Mutex::new(Vec::new()),
            index_write_set: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Visible to the lock manager: Wound-Wait aborts a younger
    /// transaction from another thread through this setter.
    pub fn set_state(&self, state: TransactionState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn prev_lsn(&self) -> Lsn {
        self.prev_lsn.load(Ordering::SeqCst)
    }

    pub fn is_shared_locked(&self, rid: Rid) -> bool {
        self.shared_lock_set.lock().contains(&rid)
    }

    pub fn is_exclusive_locked(&self, rid: Rid) -> bool {
        self.exclusive_lock_set.lock().contains(&rid)
    }

    pub(crate) fn add_shared_lock(&self, rid: Rid) {
        self.shared_lock_set.lock().insert(rid);
    }

    pub(crate) fn add_exclusive_lock(&self, rid: Rid) {
        self.exclusive_lock_set.lock().insert(rid);
    }

    pub(crate) fn remove_lock(&self, rid: Rid) {
        self.shared_lock_set.lock().remove(&rid);
        self.exclusive_lock_set.lock().remove(&rid);
    }

    pub(crate) fn promote_lock(&self, rid: Rid) {
        self.shared_lock_set.lock().remove(&rid);
        self.exclusive_lock_set.lock().insert(rid);
    }

    /// Every RID this transaction currently holds a lock on
    pub fn locked_rids(&self) -> Vec<Rid> {
        let mut rids: Vec<Rid> = self.shared_lock_set.lock().iter().copied().collect();
        rids.extend(self.exclusive_lock_set.lock().iter().copied());
        rids
    }

    pub fn append_table_write(&self, record: TableWriteRecord) {
        self.write_set.lock().push(record);
    }

    pub fn append_index_write(&self, record: IndexWriteRecord) {
        self.index_write_set.lock().push(record);
    }

    pub fn take_write_set(&self) -> Vec<TableWriteRecord> {
        std::mem::take(&mut *self.write_set.lock())
    }

    pub fn take_index_write_set(&self) -> Vec<IndexWriteRecord> {
        std::mem::take(&mut *self.index_write_set.lock())
    }

    /// Write the BEGIN record
    pub fn begin(&self) -> Result<Lsn, TransactionError> {
        self.append_log(LogRecordType::Begin, LogRecordPayload::Transaction)
    }

    pub fn log_insert(&self, table_oid: u32, rid: Rid, tuple: &[u8]) -> Result<Lsn, TransactionError> {
        self.check_active()?;
        self.append_log(
            LogRecordType::Insert,
            LogRecordPayload::Insert {
                table_oid,
                rid,
                tuple: tuple.to_vec(),
            },
        )
    }

    pub fn log_delete(&self, table_oid: u32, rid: Rid, tuple: &[u8]) -> Result<Lsn, TransactionError> {
        self.check_active()?;
        self.append_log(
            LogRecordType::MarkDelete,
            LogRecordPayload::MarkDelete {
                table_oid,
                rid,
                tuple: tuple.to_vec(),
            },
        )
    }

    pub fn log_update(
        &self,
        table_oid: u32,
        rid: Rid,
        old_tuple: &[u8],
        new_tuple: &[u8],
    ) -> Result<Lsn, TransactionError> {
        self.check_active()?;
        self.append_log(
            LogRecordType::Update,
            LogRecordPayload::Update {
                table_oid,
                rid,
                old_tuple: old_tuple.to_vec(),
                new_tuple: new_tuple.to_vec(),
            },
        )
    }

    pub(crate) fn log_commit(&self) -> Result<Lsn, TransactionError> {
        self.append_log(LogRecordType::Commit, LogRecordPayload::Transaction)
    }

    pub(crate) fn log_abort(&self) -> Result<Lsn, TransactionError> {
        self.append_log(LogRecordType::Abort, LogRecordPayload::Transaction)
    }

    fn check_active(&self) -> Result<(), TransactionError> {
        match self.state() {
            TransactionState::Growing | TransactionState::Shrinking => Ok(()),
            _ => Err(TransactionError::InvalidState(self.id)),
        }
    }

    fn append_log(
        &self,
        record_type: LogRecordType,
        payload: LogRecordPayload,
    ) -> Result<Lsn, TransactionError> {
        let prev = self.prev_lsn.load(Ordering::SeqCst);
        let lsn = self
            .log_manager
            .append_record(self.id, prev, record_type, payload)
            .map_err(|e| TransactionError::LogError(e.to_string()))?;
        self.prev_lsn.store(lsn, Ordering::SeqCst);
        Ok(lsn)
    }
}
