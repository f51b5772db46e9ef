pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;
pub mod wal;

pub use lock_manager::{LockManager, LockMode};
pub use transaction::{
    AbortReason, IsolationLevel, Transaction, TransactionAbortError, TransactionError,
    TransactionState,
};
pub use transaction_manager::TransactionManager;
