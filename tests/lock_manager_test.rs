use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tempfile::NamedTempFile;

use ferrodb::common::types::Rid;
use ferrodb::transaction::wal::LogManager;
use ferrodb::transaction::{
    AbortReason, IsolationLevel, LockManager, Transaction, TransactionState,
};

struct LockHarness {
    lock_manager: Arc<LockManager>,
    log_manager: Arc<LogManager>,
    _log_file: NamedTempFile,
}

impl LockHarness {
    fn new() -> Result<Self> {
        let log_file = NamedTempFile::new()?;
        let log_manager = Arc::new(LogManager::new(log_file.path())?);
        Ok(Self {
            lock_manager: Arc::new(LockManager::new()),
            log_manager,
            _log_file: log_file,
        })
    }

    fn txn(&self, id: u32, isolation: IsolationLevel) -> Arc<Transaction> {
        Arc::new(Transaction::new(id, self.log_manager.clone(), isolation))
    }
}

#[test]
fn test_shared_locks_coexist() -> Result<()> {
    let harness = LockHarness::new()?;
    let lm = &harness.lock_manager;
    let t1 = harness.txn(1, IsolationLevel::RepeatableRead);
    let t2 = harness.txn(2, IsolationLevel::RepeatableRead);
    let rid = Rid::new(1, 1);

    lm.lock_shared(&t1, rid)?;
    lm.lock_shared(&t2, rid)?;
    assert!(t1.is_shared_locked(rid));
    assert!(t2.is_shared_locked(rid));

    assert!(lm.unlock(&t1, rid));
    assert!(lm.unlock(&t2, rid));
    Ok(())
}

#[test]
fn test_relocking_held_lock_is_noop() -> Result<()> {
    let harness = LockHarness::new()?;
    let lm = &harness.lock_manager;
    let t1 = harness.txn(1, IsolationLevel::RepeatableRead);
    let rid = Rid::new(1, 1);

    lm.lock_exclusive(&t1, rid)?;
    lm.lock_exclusive(&t1, rid)?;
    // a held exclusive lock satisfies a shared request
    lm.lock_shared(&t1, rid)?;
    assert_eq!(t1.state(), TransactionState::Growing);
    Ok(())
}

#[test]
fn test_shared_lock_refused_under_read_uncommitted() -> Result<()> {
    let harness = LockHarness::new()?;
    let t1 = harness.txn(1, IsolationLevel::ReadUncommitted);
    let rid = Rid::new(1, 1);

    let err = harness.lock_manager.lock_shared(&t1, rid).unwrap_err();
    assert_eq!(err.reason, AbortReason::LockSharedOnReadUncommitted);
    assert_eq!(t1.state(), TransactionState::Aborted);

    // exclusive locks are still allowed for writes
    let t2 = harness.txn(2, IsolationLevel::ReadUncommitted);
    harness.lock_manager.lock_exclusive(&t2, rid)?;
    Ok(())
}

#[test]
fn test_lock_after_release_hits_shrinking_phase() -> Result<()> {
    let harness = LockHarness::new()?;
    let lm = &harness.lock_manager;
    let t1 = harness.txn(1, IsolationLevel::RepeatableRead);
    let r1 = Rid::new(1, 1);
    let r2 = Rid::new(1, 2);

    lm.lock_shared(&t1, r1)?;
    assert!(lm.unlock(&t1, r1));
    assert_eq!(t1.state(), TransactionState::Shrinking);

    let err = lm.lock_shared(&t1, r2).unwrap_err();
    assert_eq!(err.reason, AbortReason::LockOnShrinking);
    assert_eq!(t1.state(), TransactionState::Aborted);
    Ok(())
}

#[test]
fn test_read_committed_unlock_keeps_growing() -> Result<()> {
    let harness = LockHarness::new()?;
    let lm = &harness.lock_manager;
    let t1 = harness.txn(1, IsolationLevel::ReadCommitted);
    let r1 = Rid::new(1, 1);
    let r2 = Rid::new(1, 2);

    lm.lock_shared(&t1, r1)?;
    assert!(lm.unlock(&t1, r1));
    assert_eq!(t1.state(), TransactionState::Growing);
    // further locks remain possible
    lm.lock_shared(&t1, r2)?;
    Ok(())
}

#[test]
fn test_unlock_without_lock_returns_false() -> Result<()> {
    let harness = LockHarness::new()?;
    let t1 = harness.txn(1, IsolationLevel::RepeatableRead);
    assert!(!harness.lock_manager.unlock(&t1, Rid::new(9, 9)));
    Ok(())
}

/// Wound-Wait: an older transaction aborts a younger blocker but still
/// queues behind an older holder.
#[test]
fn test_wound_wait_aborts_younger_waiter() -> Result<()> {
    let harness = LockHarness::new()?;
    let lm = harness.lock_manager.clone();
    let rid = Rid::new(4, 0);

    let t1 = harness.txn(1, IsolationLevel::RepeatableRead);
    let t3 = harness.txn(2, IsolationLevel::RepeatableRead);
    let t2 = harness.txn(5, IsolationLevel::RepeatableRead);

    lm.lock_exclusive(&t1, rid)?;

    // the youngest transaction blocks behind t1's exclusive lock
    let t2_thread = {
        let lm = lm.clone();
        let t2 = t2.clone();
        thread::spawn(move || lm.lock_exclusive(&t2, rid))
    };
    thread::sleep(Duration::from_millis(100));

    // t3 (older than t2) wounds t2 but must keep waiting behind t1
    let t3_thread = {
        let lm = lm.clone();
        let t3 = t3.clone();
        thread::spawn(move || lm.lock_exclusive(&t3, rid))
    };

    let t2_result = t2_thread.join().unwrap();
    let t2_err = t2_result.unwrap_err();
    assert_eq!(t2_err.reason, AbortReason::Deadlock);
    assert_eq!(t2.state(), TransactionState::Aborted);

    // t3 is still blocked until t1 releases
    thread::sleep(Duration::from_millis(100));
    assert!(!t3.is_exclusive_locked(rid));

    assert!(lm.unlock(&t1, rid));
    t3_thread.join().unwrap()?;
    assert!(t3.is_exclusive_locked(rid));
    Ok(())
}

/// Only one upgrade may wait per RID; the second upgrader aborts.
#[test]
fn test_concurrent_upgrades_conflict() -> Result<()> {
    let harness = LockHarness::new()?;
    let lm = harness.lock_manager.clone();
    let rid = Rid::new(7, 0);

    // t_old holds a shared lock and is older than the upgrader, so the
    // upgrader has to wait instead of wounding it
    let t_old = harness.txn(1, IsolationLevel::RepeatableRead);
    let t_up = harness.txn(2, IsolationLevel::RepeatableRead);

    lm.lock_shared(&t_old, rid)?;
    lm.lock_shared(&t_up, rid)?;

    let upgrade_thread = {
        let lm = lm.clone();
        let t_up = t_up.clone();
        thread::spawn(move || lm.lock_upgrade(&t_up, rid))
    };
    thread::sleep(Duration::from_millis(100));
    assert!(!t_up.is_exclusive_locked(rid));

    // a second upgrade on the same RID is refused outright
    let err = lm.lock_upgrade(&t_old, rid).unwrap_err();
    assert_eq!(err.reason, AbortReason::UpgradeConflict);
    assert_eq!(t_old.state(), TransactionState::Aborted);

    // the aborted holder's release lets the first upgrade through
    lm.release_all(&t_old);
    upgrade_thread.join().unwrap()?;
    assert!(t_up.is_exclusive_locked(rid));
    Ok(())
}

#[test]
fn test_upgrade_without_shared_lock_fails() -> Result<()> {
    let harness = LockHarness::new()?;
    let t1 = harness.txn(1, IsolationLevel::RepeatableRead);

    let err = harness
        .lock_manager
        .lock_upgrade(&t1, Rid::new(1, 0))
        .unwrap_err();
    assert_eq!(err.reason, AbortReason::UpgradeConflict);
    assert_eq!(t1.state(), TransactionState::Aborted);
    Ok(())
}

/// An older writer never waits behind a younger reader: the reader is
/// wounded even though it already holds the lock.
#[test]
fn test_older_writer_wounds_younger_holder() -> Result<()> {
    let harness = LockHarness::new()?;
    let lm = harness.lock_manager.clone();
    let rid = Rid::new(3, 3);

    let t_old = harness.txn(1, IsolationLevel::RepeatableRead);
    let t_young = harness.txn(9, IsolationLevel::RepeatableRead);

    lm.lock_shared(&t_young, rid)?;
    lm.lock_exclusive(&t_old, rid)?;

    assert_eq!(t_young.state(), TransactionState::Aborted);
    assert!(t_old.is_exclusive_locked(rid));
    Ok(())
}
