// Two-phase-locking lock manager with Wound-Wait deadlock avoidance
//
// One mutex guards the whole lock table; each RID's request queue owns a
// condition variable that waiters block on. An older transaction never
// waits behind a younger one: it marks the younger transaction ABORTED
// and wakes the queue so the victim can observe its fate.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::common::types::{Rid, TxnId};
use crate::transaction::transaction::{
    AbortReason, IsolationLevel, Transaction, TransactionAbortError, TransactionState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

struct LockRequest {
    txn: Arc<Transaction>,
    mode: LockMode,
    granted: bool,
}

#[derive(Default)]
struct LockRequestQueue {
    requests: VecDeque<LockRequest>,
    cv: Arc<Condvar>,
    upgrading: Option<TxnId>,
}

type LockTable = HashMap<Rid, LockRequestQueue>;

pub struct LockManager {
    latch: Mutex<LockTable>,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new()
    }
}

impl LockManager {
    pub fn new() -> Self {
        Self {
            latch: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire a shared lock on `rid`. Refused outright under
    /// READ UNCOMMITTED and outside the growing phase; both refusals
    /// abort the transaction.
    pub fn lock_shared(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<(), TransactionAbortError> {
        if txn.state() == TransactionState::Aborted {
            return Err(TransactionAbortError::new(txn.id(), AbortReason::Deadlock));
        }
        if txn.isolation_level() == IsolationLevel::ReadUncommitted {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionAbortError::new(
                txn.id(),
                AbortReason::LockSharedOnReadUncommitted,
            ));
        }
        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionAbortError::new(
                txn.id(),
                AbortReason::LockOnShrinking,
            ));
        }
        if txn.is_shared_locked(rid) || txn.is_exclusive_locked(rid) {
            return Ok(());
        }

        self.acquire(txn, rid, LockMode::Shared)?;
        txn.add_shared_lock(rid);
        Ok(())
    }

    /// Acquire an exclusive lock on `rid`
    pub fn lock_exclusive(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<(), TransactionAbortError> {
        if txn.state() == TransactionState::Aborted {
            return Err(TransactionAbortError::new(txn.id(), AbortReason::Deadlock));
        }
        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionAbortError::new(
                txn.id(),
                AbortReason::LockOnShrinking,
            ));
        }
        if txn.is_exclusive_locked(rid) {
            return Ok(());
        }

        self.acquire(txn, rid, LockMode::Exclusive)?;
        txn.add_exclusive_lock(rid);
        Ok(())
    }

    /// Upgrade an already-held shared lock to exclusive. Only one upgrade
    /// may be pending per RID; a second upgrader is aborted.
    pub fn lock_upgrade(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<(), TransactionAbortError> {
        if txn.state() == TransactionState::Aborted {
            return Err(TransactionAbortError::new(txn.id(), AbortReason::Deadlock));
        }
        if txn.state() != TransactionState::Growing {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionAbortError::new(
                txn.id(),
                AbortReason::LockOnShrinking,
            ));
        }
        if txn.is_exclusive_locked(rid) {
            return Ok(());
        }
        if !txn.is_shared_locked(rid) {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionAbortError::new(
                txn.id(),
                AbortReason::UpgradeConflict,
            ));
        }

        let txn_id = txn.id();
        let mut table = self.latch.lock();

        {
            let queue = table.entry(rid).or_default();
            if queue.upgrading.is_some() {
                txn.set_state(TransactionState::Aborted);
                return Err(TransactionAbortError::new(
                    txn_id,
                    AbortReason::UpgradeConflict,
                ));
            }
            queue.upgrading = Some(txn_id);
        }

        let cv = table.get(&rid).map(|q| q.cv.clone()).unwrap_or_default();
        // The upgrader's own entry may sit at the queue head, so
        // eligibility must consider every other request, not just the
        // preceding ones.
        while !Self::try_grant(&mut table, rid, txn, LockMode::Exclusive, true) {
            cv.wait(&mut table);
            if txn.state() == TransactionState::Aborted {
                if let Some(queue) = table.get_mut(&rid) {
                    if queue.upgrading == Some(txn_id) {
                        queue.upgrading = None;
                    }
                }
                return Err(TransactionAbortError::new(txn_id, AbortReason::Deadlock));
            }
        }

        if let Some(queue) = table.get_mut(&rid) {
            for request in queue.requests.iter_mut() {
                if request.txn.id() == txn_id {
                    request.mode = LockMode::Exclusive;
                    request.granted = true;
                    break;
                }
            }
            queue.upgrading = None;
        }

        txn.promote_lock(rid);
        Ok(())
    }

    /// Release a held lock. Under REPEATABLE READ the first release ends
    /// the growing phase. Returns false if the lock was not held.
    pub fn unlock(&self, txn: &Arc<Transaction>, rid: Rid) -> bool {
        if !txn.is_shared_locked(rid) && !txn.is_exclusive_locked(rid) {
            return false;
        }

        if txn.state() == TransactionState::Growing
            && txn.isolation_level() == IsolationLevel::RepeatableRead
        {
            txn.set_state(TransactionState::Shrinking);
        }

        let mut table = self.latch.lock();
        Self::remove_request(&mut table, rid, txn.id());
        txn.remove_lock(rid);
        true
    }

    /// Drop every lock a finished transaction still holds, without the
    /// shrinking-phase transition. Used by commit and abort.
    pub fn release_all(&self, txn: &Arc<Transaction>) {
        let rids = txn.locked_rids();
        let mut table = self.latch.lock();
        for rid in rids {
            Self::remove_request(&mut table, rid, txn.id());
            txn.remove_lock(rid);
        }
    }

    /// Block until the request is grantable, per Wound-Wait
    fn acquire(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
        mode: LockMode,
    ) -> Result<(), TransactionAbortError> {
        let txn_id = txn.id();
        let mut table = self.latch.lock();

        let queue = table.entry(rid).or_default();
        queue.requests.push_back(LockRequest {
            txn: txn.clone(),
            mode,
            granted: false,
        });
        let cv = queue.cv.clone();

        while !Self::try_grant(&mut table, rid, txn, mode, false) {
            cv.wait(&mut table);
            if txn.state() == TransactionState::Aborted {
                Self::remove_request(&mut table, rid, txn_id);
                return Err(TransactionAbortError::new(txn_id, AbortReason::Deadlock));
            }
        }

        if let Some(queue) = table.get_mut(&rid) {
            for request in queue.requests.iter_mut() {
                if request.txn.id() == txn_id {
                    request.granted = true;
                    break;
                }
            }
        }
        Ok(())
    }

    /// Wound-Wait eligibility. Walks the queue up to the caller's request
    /// (or over every other request when `check_all` is set, as upgrades
    /// require): a conflicting older transaction forces a wait; a
    /// conflicting younger one is wounded and the queue is woken so it can
    /// observe the abort.
    fn try_grant(
        table: &mut LockTable,
        rid: Rid,
        txn: &Arc<Transaction>,
        mode: LockMode,
        check_all: bool,
    ) -> bool {
        let queue = match table.get_mut(&rid) {
            Some(queue) => queue,
            None => return true,
        };
        let txn_id = txn.id();

        let mut eligible = true;
        let mut wounded = false;
        for request in queue.requests.iter() {
            let other_id = request.txn.id();
            if other_id == txn_id {
                if check_all {
                    continue;
                }
                break;
            }
            // a wounded waiter is already on its way out of the queue
            if !request.granted && request.txn.state() == TransactionState::Aborted {
                continue;
            }
            if mode == LockMode::Exclusive || request.mode == LockMode::Exclusive {
                if other_id < txn_id {
                    eligible = false;
                } else if request.txn.state() != TransactionState::Aborted {
                    log::debug!("txn {} wounds younger txn {} on rid {}", txn_id, other_id, rid);
                    request.txn.set_state(TransactionState::Aborted);
                    wounded = true;
                }
            }
        }

        if wounded {
            queue.cv.notify_all();
        }
        eligible
    }

    fn remove_request(table: &mut LockTable, rid: Rid, txn_id: TxnId) {
        let mut drop_queue = false;
        if let Some(queue) = table.get_mut(&rid) {
            if let Some(pos) = queue.requests.iter().position(|r| r.txn.id() == txn_id) {
                queue.requests.remove(pos);
            }
            if queue.upgrading == Some(txn_id) {
                queue.upgrading = None;
            }
            queue.cv.notify_all();
            // waiters always have a request enqueued, so an empty queue
            // has no observers left
            drop_queue = queue.requests.is_empty();
        }
        if drop_queue {
            table.remove(&rid);
        }
    }
}
