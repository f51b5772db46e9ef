use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use byteorder::{ByteOrder, LittleEndian};
use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{Lsn, TxnId};
use crate::transaction::wal::log_record::{LogRecord, LogRecordPayload, LogRecordType};

#[derive(Error, Debug)]
pub enum LogManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to encode log record: {0}")]
    EncodeError(String),
}

/// Append-only write-ahead log. Records are length-prefixed bincode;
/// recovery over this format is handled outside the engine.
pub struct LogManager {
    log_file: Mutex<File>,
    next_lsn: AtomicU64,
}

impl LogManager {
    pub fn new(log_path: impl AsRef<Path>) -> Result<Self, LogManagerError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(log_path)?;

        Ok(Self {
            log_file: Mutex::new(file),
            next_lsn: AtomicU64::new(1),
        })
    }

    /// Append one record and return its LSN
    pub fn append_record(
        &self,
        txn_id: TxnId,
        prev_lsn: Lsn,
        record_type: LogRecordType,
        payload: LogRecordPayload,
    ) -> Result<Lsn, LogManagerError> {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        let record = LogRecord {
            lsn,
            txn_id,
            prev_lsn,
            record_type,
            payload,
        };

        let body =
            bincode::serialize(&record).map_err(|e| LogManagerError::EncodeError(e.to_string()))?;
        let mut len_prefix = [0u8; 4];
        LittleEndian::write_u32(&mut len_prefix, body.len() as u32);

        let mut file = self.log_file.lock();
        file.write_all(&len_prefix)?;
        file.write_all(&body)?;

        Ok(lsn)
    }

    /// Force buffered records to stable storage
    pub fn flush(&self) -> Result<(), LogManagerError> {
        self.log_file.lock().flush()?;
        Ok(())
    }
}
