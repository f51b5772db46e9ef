// Table heap: a linked chain of slotted pages
//
// Inserts append to the chain, deletes are deferred (mark now, apply at
// commit) and updates happen in place. All page access goes through the
// buffer pool under the pin-then-latch discipline.

use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::common::types::{PageId, Rid, PAGE_SIZE};
use crate::storage::buffer::{BufferPoolError, ParallelBufferPool};
use crate::storage::page::layout::{HEADER_SIZE, SLOT_SIZE};
use crate::storage::page::{PageError, TablePage};
use crate::storage::tuple::{Tuple, TupleError};
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{
    TableWriteRecord, Transaction, TransactionAbortError, TransactionError, WriteType,
};

#[derive(Error, Debug)]
pub enum TableHeapError {
    #[error("Buffer pool error: {0}")]
    BufferPool(#[from] BufferPoolError),

    #[error("Page error: {0}")]
    Page(#[from] PageError),

    #[error("Tuple error: {0}")]
    Tuple(#[from] TupleError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Aborted(#[from] TransactionAbortError),
}

pub struct TableHeap {
    buffer_pool: Arc<ParallelBufferPool>,
    lock_manager: Option<Arc<LockManager>>,
    table_oid: u32,
    first_page_id: PageId,
    table_page: TablePage,
    // serializes chain extension so two inserters never race to append
    extend_latch: Mutex<()>,
}

impl TableHeap {
    /// Create an empty heap with one formatted page
    pub fn new(
        buffer_pool: Arc<ParallelBufferPool>,
        lock_manager: Option<Arc<LockManager>>,
        table_oid: u32,
    ) -> Result<Self, TableHeapError> {
        let table_page = TablePage::new();
        let (first_page_id, page_ptr) = buffer_pool.new_page()?;
        {
            let mut page = page_ptr.write();
            table_page.init_page(&mut page);
        }
        buffer_pool.unpin_page(first_page_id, true)?;

        Ok(Self {
            buffer_pool,
            lock_manager,
            table_oid,
            first_page_id,
            table_page,
            extend_latch: Mutex::new(()),
        })
    }

    pub fn table_oid(&self) -> u32 {
        self.table_oid
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Insert a tuple, returning its RID. Takes an exclusive lock on the
    /// fresh RID when a lock manager is attached, WAL-logs the insert and
    /// records it in the transaction's write set.
    pub fn insert_tuple(
        &self,
        tuple: &Tuple,
        txn: &Arc<Transaction>,
    ) -> Result<Rid, TableHeapError> {
        let bytes = tuple.to_bytes()?;
        let rid = self.insert_bytes(&bytes)?;

        if let Some(lock_manager) = &self.lock_manager {
            lock_manager.lock_exclusive(txn, rid)?;
        }
        txn.log_insert(self.table_oid, rid, &bytes)?;
        txn.append_table_write(TableWriteRecord {
            rid,
            wtype: WriteType::Insert,
            table_oid: self.table_oid,
            old_tuple: None,
        });

        Ok(rid)
    }

    fn insert_bytes(&self, bytes: &[u8]) -> Result<Rid, TableHeapError> {
        // a tuple that cannot fit an empty page never will
        if bytes.len() + SLOT_SIZE > PAGE_SIZE - HEADER_SIZE {
            return Err(PageError::InsufficientSpace.into());
        }

        let mut page_id = self.first_page_id;
        loop {
            let page_ptr = self.buffer_pool.fetch_page(page_id)?;
            let (inserted, next) = {
                let mut page = page_ptr.write();
                match self.table_page.insert_record(&mut page, bytes) {
                    Ok(slot) => (Some(slot), None),
                    Err(PageError::InsufficientSpace) => {
                        (None, self.table_page.next_page_id(&page))
                    }
                    Err(e) => {
                        drop(page);
                        self.buffer_pool.unpin_page(page_id, false)?;
                        return Err(e.into());
                    }
                }
            };

            match (inserted, next) {
                (Some(slot), _) => {
                    self.buffer_pool.unpin_page(page_id, true)?;
                    return Ok(Rid::new(page_id, slot));
                }
                (None, Some(next_id)) => {
                    self.buffer_pool.unpin_page(page_id, false)?;
                    page_id = next_id;
                }
                (None, None) => {
                    self.buffer_pool.unpin_page(page_id, false)?;
                    page_id = self.extend_chain(page_id)?;
                }
            }
        }
    }

    /// Append a fresh page after `tail`. Another inserter may have
    /// extended the chain already, in which case its page is used.
    fn extend_chain(&self, tail_id: PageId) -> Result<PageId, TableHeapError> {
        let _guard = self.extend_latch.lock();

        let tail_ptr = self.buffer_pool.fetch_page(tail_id)?;
        let existing_next = {
            let page = tail_ptr.read();
            self.table_page.next_page_id(&page)
        };
        if let Some(next_id) = existing_next {
            self.buffer_pool.unpin_page(tail_id, false)?;
            return Ok(next_id);
        }

        let (new_page_id, new_ptr) = match self.buffer_pool.new_page() {
            Ok(pair) => pair,
            Err(e) => {
                self.buffer_pool.unpin_page(tail_id, false)?;
                return Err(e.into());
            }
        };
        {
            let mut page = new_ptr.write();
            self.table_page.init_page(&mut page);
        }
        {
            let mut page = tail_ptr.write();
            self.table_page.set_next_page_id(&mut page, Some(new_page_id));
        }
        self.buffer_pool.unpin_page(new_page_id, true)?;
        self.buffer_pool.unpin_page(tail_id, true)?;

        Ok(new_page_id)
    }

    /// Read a live tuple
    pub fn get_tuple(&self, rid: Rid) -> Result<Tuple, TableHeapError> {
        let page_ptr = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let page = page_ptr.read();
            self.table_page.get_record(&page, rid.slot)
        };
        self.buffer_pool.unpin_page(rid.page_id, false)?;
        Ok(Tuple::from_bytes(&result?)?)
    }

    /// Logically delete; the caller must already hold the exclusive lock.
    /// The pre-image is WAL-logged and recorded for undo.
    pub fn mark_delete(&self, rid: Rid, txn: &Arc<Transaction>) -> Result<(), TableHeapError> {
        let page_ptr = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page = page_ptr.write();
            match self.table_page.get_record(&page, rid.slot) {
                Ok(old_bytes) => self
                    .table_page
                    .mark_delete(&mut page, rid.slot)
                    .map(|_| old_bytes),
                Err(e) => Err(e),
            }
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;
        let old_bytes = result?;

        txn.log_delete(self.table_oid, rid, &old_bytes)?;
        txn.append_table_write(TableWriteRecord {
            rid,
            wtype: WriteType::Delete,
            table_oid: self.table_oid,
            old_tuple: None,
        });
        Ok(())
    }

    /// Overwrite a tuple in place; the caller must already hold the
    /// exclusive lock. The pre-image is kept for undo.
    pub fn update_tuple(
        &self,
        new_tuple: &Tuple,
        rid: Rid,
        txn: &Arc<Transaction>,
    ) -> Result<(), TableHeapError> {
        let new_bytes = new_tuple.to_bytes()?;

        let page_ptr = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page = page_ptr.write();
            match self.table_page.get_record(&page, rid.slot) {
                Ok(old_bytes) => self
                    .table_page
                    .update_record(&mut page, rid.slot, &new_bytes)
                    .map(|_| old_bytes),
                Err(e) => Err(e),
            }
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;
        let old_bytes = result?;

        txn.log_update(self.table_oid, rid, &old_bytes, &new_bytes)?;
        txn.append_table_write(TableWriteRecord {
            rid,
            wtype: WriteType::Update,
            table_oid: self.table_oid,
            old_tuple: Some(Tuple::from_bytes(&old_bytes)?),
        });
        Ok(())
    }

    /// Physically release a slot (commit of a delete, undo of an insert)
    pub fn apply_delete(&self, rid: Rid) -> Result<(), TableHeapError> {
        self.with_page_mut(rid, |table_page, page| table_page.apply_delete(page, rid.slot))
    }

    /// Undo a `mark_delete`
    pub fn rollback_delete(&self, rid: Rid) -> Result<(), TableHeapError> {
        self.with_page_mut(rid, |table_page, page| {
            table_page.rollback_delete(page, rid.slot)
        })
    }

    /// Write a tuple image back without logging (undo of an update)
    pub fn restore_tuple(&self, rid: Rid, tuple: &Tuple) -> Result<(), TableHeapError> {
        let bytes = tuple.to_bytes()?;
        self.with_page_mut(rid, |table_page, page| {
            table_page.update_record(page, rid.slot, &bytes)
        })
    }

    fn with_page_mut<F>(&self, rid: Rid, f: F) -> Result<(), TableHeapError>
    where
        F: FnOnce(&TablePage, &mut crate::common::types::Page) -> Result<(), PageError>,
    {
        let page_ptr = self.buffer_pool.fetch_page(rid.page_id)?;
        let result = {
            let mut page = page_ptr.write();
            f(&self.table_page, &mut page)
        };
        self.buffer_pool.unpin_page(rid.page_id, result.is_ok())?;
        Ok(result?)
    }
}

/// Iterates the RIDs of live tuples in (page, slot) order
pub struct TableIterator {
    heap: Arc<TableHeap>,
    current_page_id: Option<PageId>,
    current_slot: u32,
}

impl TableIterator {
    pub fn new(heap: Arc<TableHeap>) -> Self {
        Self {
            current_page_id: Some(heap.first_page_id),
            heap,
            current_slot: 0,
        }
    }

    /// Advance to the next live tuple and return its RID
    pub fn next_rid(&mut self) -> Result<Option<Rid>, TableHeapError> {
        while let Some(page_id) = self.current_page_id {
            let page_ptr = self.heap.buffer_pool.fetch_page(page_id)?;
            let (found, next_page) = {
                let page = page_ptr.read();
                let slot_count = self.heap.table_page.slot_count(&page);
                let mut found = None;
                while self.current_slot < slot_count {
                    let slot = self.current_slot;
                    self.current_slot += 1;
                    if self.heap.table_page.is_live(&page, slot) {
                        found = Some(Rid::new(page_id, slot));
                        break;
                    }
                }
                (found, self.heap.table_page.next_page_id(&page))
            };
            self.heap.buffer_pool.unpin_page(page_id, false)?;

            if found.is_some() {
                return Ok(found);
            }
            self.current_page_id = next_page;
            self.current_slot = 0;
        }
        Ok(None)
    }
}
