use std::sync::{Arc, RwLock};

use anyhow::Result;
use tempfile::NamedTempFile;

use ferrodb::catalog::{Catalog, Column, DataType, Schema};
use ferrodb::common::config::EngineConfig;
use ferrodb::query::executor::ExecutorContext;
use ferrodb::storage::buffer::ParallelBufferPool;
use ferrodb::storage::disk::DiskManager;
use ferrodb::storage::tuple::Datum;
use ferrodb::transaction::wal::LogManager;
use ferrodb::transaction::{LockManager, Transaction, TransactionManager};

// Create a temporary database file for testing
#[allow(dead_code)]
pub fn create_temp_db_file() -> Result<(NamedTempFile, String)> {
    let file = NamedTempFile::new()?;
    let path = file.path().to_str().unwrap().to_string();
    Ok((file, path))
}

// Create a sharded buffer pool over a temporary database
#[allow(dead_code)]
pub fn create_test_buffer_pool(
    num_instances: usize,
    pool_size: usize,
) -> Result<(Arc<ParallelBufferPool>, NamedTempFile)> {
    let (file, path) = create_temp_db_file()?;
    let disk_manager = Arc::new(DiskManager::new(path)?);
    let buffer_pool = Arc::new(ParallelBufferPool::new(num_instances, pool_size, disk_manager));
    Ok((buffer_pool, file))
}

/// Fully wired engine for executor and transaction tests
#[allow(dead_code)]
pub struct TestEngine {
    pub buffer_pool: Arc<ParallelBufferPool>,
    pub catalog: Arc<RwLock<Catalog>>,
    pub lock_manager: Arc<LockManager>,
    pub txn_manager: Arc<TransactionManager>,
    _db_file: NamedTempFile,
    _log_file: NamedTempFile,
}

#[allow(dead_code)]
pub fn create_test_engine() -> Result<TestEngine> {
    let (db_file, db_path) = create_temp_db_file()?;
    let (log_file, log_path) = create_temp_db_file()?;

    let disk_manager = Arc::new(DiskManager::new(db_path)?);
    let config = EngineConfig {
        pool_size: 64,
        num_instances: 2,
    };
    let buffer_pool = Arc::new(ParallelBufferPool::with_config(&config, disk_manager));
    let log_manager = Arc::new(LogManager::new(log_path)?);
    let lock_manager = Arc::new(LockManager::new());
    let txn_manager = Arc::new(TransactionManager::new(
        log_manager,
        lock_manager.clone(),
    ));
    let catalog = Arc::new(RwLock::new(Catalog::new(
        buffer_pool.clone(),
        Some(lock_manager.clone()),
    )));

    Ok(TestEngine {
        buffer_pool,
        catalog,
        lock_manager,
        txn_manager,
        _db_file: db_file,
        _log_file: log_file,
    })
}

#[allow(dead_code)]
impl TestEngine {
    pub fn context(&self, txn: &Arc<Transaction>) -> ExecutorContext {
        ExecutorContext::new(
            self.buffer_pool.clone(),
            self.catalog.clone(),
            self.lock_manager.clone(),
            txn.clone(),
        )
    }
}

// Two-integer-column schema used across the executor tests
#[allow(dead_code)]
pub fn two_int_schema(first: &str, second: &str) -> Schema {
    Schema::new(vec![
        Column::new(first, DataType::Int),
        Column::new(second, DataType::Int),
    ])
}

#[allow(dead_code)]
pub fn int_row(a: i64, b: i64) -> Vec<Datum> {
    vec![Datum::Int(a), Datum::Int(b)]
}
