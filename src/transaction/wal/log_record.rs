use serde::{Deserialize, Serialize};

use crate::common::types::{Lsn, Rid, TxnId};

/// Kinds of write-ahead log records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecordType {
    Begin,
    Commit,
    Abort,
    Insert,
    MarkDelete,
    Update,
}

/// Body of a log record. Tuple images are stored pre-encoded so the log
/// layer stays independent of the value representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogRecordPayload {
    /// Begin / Commit / Abort carry no body
    Transaction,
    Insert {
        table_oid: u32,
        rid: Rid,
        tuple: Vec<u8>,
    },
    MarkDelete {
        table_oid: u32,
        rid: Rid,
        tuple: Vec<u8>,
    },
    Update {
        table_oid: u32,
        rid: Rid,
        old_tuple: Vec<u8>,
        new_tuple: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub lsn: Lsn,
    pub txn_id: TxnId,
    pub prev_lsn: Lsn,
    pub record_type: LogRecordType,
    pub payload: LogRecordPayload,
}
