use crate::common::types::{Page, PageId, PAGE_SIZE};
use crate::storage::page::error::PageError;
use crate::storage::page::layout::{self, Slot, SLOT_SIZE};

/// Slotted record page. Tuples grow forward from the 8-byte header, the
/// slot array grows backward from the end of the page, and free room is
/// whatever remains between the two. Deleting is a two-step affair:
/// `mark_delete` flips the slot's deleted bit (undoable), and
/// `apply_delete` releases the slot for good at commit time.
pub struct TablePage;

impl TablePage {
    pub fn new() -> Self {
        Self
    }

    pub fn init_page(&self, page: &mut Page) {
        layout::init_heap_page(&mut page.data);
    }

    pub fn next_page_id(&self, page: &Page) -> Option<PageId> {
        layout::next_page(&page.data)
    }

    pub fn set_next_page_id(&self, page: &mut Page, next: Option<PageId>) {
        layout::set_next_page(&mut page.data, next);
    }

    pub fn slot_count(&self, page: &Page) -> u32 {
        layout::slot_count(&page.data)
    }

    fn slot_position(slot: u32) -> usize {
        PAGE_SIZE - SLOT_SIZE * (slot as usize + 1)
    }

    fn get_slot(&self, page: &Page, slot: u32) -> Slot {
        let pos = Self::slot_position(slot);
        Slot::from_bytes(&page.data[pos..pos + SLOT_SIZE])
    }

    fn set_slot(&self, page: &mut Page, slot: u32, entry: &Slot) {
        let pos = Self::slot_position(slot);
        page.data[pos..pos + SLOT_SIZE].copy_from_slice(&entry.to_bytes());
    }

    // bytes left between the data top and the slot array
    fn free_room(&self, page: &Page) -> usize {
        let slot_bytes = layout::slot_count(&page.data) as usize * SLOT_SIZE;
        PAGE_SIZE - slot_bytes - layout::data_top(&page.data)
    }

    /// Append a record, returning its slot number
    pub fn insert_record(&self, page: &mut Page, data: &[u8]) -> Result<u32, PageError> {
        // the record needs its bytes plus one new slot entry
        if self.free_room(page) < data.len() + SLOT_SIZE {
            return Err(PageError::InsufficientSpace);
        }

        let slot = layout::slot_count(&page.data);
        let top = layout::data_top(&page.data);

        page.data[top..top + data.len()].copy_from_slice(data);
        self.set_slot(
            page,
            slot,
            &Slot {
                offset: top as u32,
                length: data.len() as u32,
                deleted: false,
            },
        );
        layout::set_data_top(&mut page.data, top + data.len());
        layout::set_slot_count(&mut page.data, slot + 1);

        Ok(slot)
    }

    /// Read a live record's bytes
    pub fn get_record(&self, page: &Page, slot: u32) -> Result<Vec<u8>, PageError> {
        let entry = self.checked_slot(page, slot)?;
        if entry.deleted || entry.length == 0 {
            return Err(PageError::RecordNotFound);
        }
        let start = entry.offset as usize;
        Ok(page.data[start..start + entry.length as usize].to_vec())
    }

    /// Logically delete a record; the bytes stay until `apply_delete`
    pub fn mark_delete(&self, page: &mut Page, slot: u32) -> Result<(), PageError> {
        let mut entry = self.checked_slot(page, slot)?;
        if entry.deleted || entry.length == 0 {
            return Err(PageError::RecordNotFound);
        }
        entry.deleted = true;
        self.set_slot(page, slot, &entry);
        Ok(())
    }

    /// Undo a `mark_delete`
    pub fn rollback_delete(&self, page: &mut Page, slot: u32) -> Result<(), PageError> {
        let mut entry = self.checked_slot(page, slot)?;
        if !entry.deleted {
            return Err(PageError::NotDeleted);
        }
        entry.deleted = false;
        self.set_slot(page, slot, &entry);
        Ok(())
    }

    /// Release a slot for good. The slot number stays occupied so later
    /// records keep their RIDs; only the length is zeroed.
    pub fn apply_delete(&self, page: &mut Page, slot: u32) -> Result<(), PageError> {
        let mut entry = self.checked_slot(page, slot)?;
        if entry.length == 0 {
            return Err(PageError::RecordNotFound);
        }
        entry.length = 0;
        entry.deleted = false;
        self.set_slot(page, slot, &entry);
        Ok(())
    }

    /// Overwrite a record in place. A record that grew is relocated to the
    /// free area of the same page, keeping its slot number.
    pub fn update_record(&self, page: &mut Page, slot: u32, data: &[u8]) -> Result<(), PageError> {
        let mut entry = self.checked_slot(page, slot)?;
        if entry.deleted || entry.length == 0 {
            return Err(PageError::RecordNotFound);
        }

        let new_size = data.len() as u32;
        if new_size <= entry.length {
            let start = entry.offset as usize;
            page.data[start..start + data.len()].copy_from_slice(data);
            entry.length = new_size;
            self.set_slot(page, slot, &entry);
            return Ok(());
        }

        if self.free_room(page) < data.len() {
            return Err(PageError::InsufficientSpace);
        }

        // relocate; the old bytes are abandoned until compaction
        let top = layout::data_top(&page.data);
        page.data[top..top + data.len()].copy_from_slice(data);
        entry.offset = top as u32;
        entry.length = new_size;
        self.set_slot(page, slot, &entry);
        layout::set_data_top(&mut page.data, top + data.len());

        Ok(())
    }

    /// Whether the slot currently holds a visible record
    pub fn is_live(&self, page: &Page, slot: u32) -> bool {
        if slot >= self.slot_count(page) {
            return false;
        }
        let entry = self.get_slot(page, slot);
        !entry.deleted && entry.length > 0
    }

    fn checked_slot(&self, page: &Page, slot: u32) -> Result<Slot, PageError> {
        if slot >= self.slot_count(page) {
            return Err(PageError::InvalidSlot);
        }
        Ok(self.get_slot(page, slot))
    }
}

impl Default for TablePage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Page;

    #[test]
    fn test_insert_and_get() {
        let table_page = TablePage::new();
        let mut page = Page::new(1);
        table_page.init_page(&mut page);

        let slot0 = table_page.insert_record(&mut page, b"hello").unwrap();
        let slot1 = table_page.insert_record(&mut page, b"world!").unwrap();
        assert_eq!(slot0, 0);
        assert_eq!(slot1, 1);

        assert_eq!(table_page.get_record(&page, 0).unwrap(), b"hello");
        assert_eq!(table_page.get_record(&page, 1).unwrap(), b"world!");
        assert!(matches!(
            table_page.get_record(&page, 2),
            Err(PageError::InvalidSlot)
        ));
    }

    #[test]
    fn test_chain_link_round_trip() {
        let table_page = TablePage::new();
        let mut page = Page::new(1);
        table_page.init_page(&mut page);

        assert_eq!(table_page.next_page_id(&page), None);
        table_page.set_next_page_id(&mut page, Some(5));
        assert_eq!(table_page.next_page_id(&page), Some(5));
        table_page.set_next_page_id(&mut page, None);
        assert_eq!(table_page.next_page_id(&page), None);
    }

    #[test]
    fn test_mark_and_rollback_delete() {
        let table_page = TablePage::new();
        let mut page = Page::new(1);
        table_page.init_page(&mut page);

        let slot = table_page.insert_record(&mut page, b"row").unwrap();
        table_page.mark_delete(&mut page, slot).unwrap();
        assert!(matches!(
            table_page.get_record(&page, slot),
            Err(PageError::RecordNotFound)
        ));

        table_page.rollback_delete(&mut page, slot).unwrap();
        assert_eq!(table_page.get_record(&page, slot).unwrap(), b"row");

        table_page.mark_delete(&mut page, slot).unwrap();
        table_page.apply_delete(&mut page, slot).unwrap();
        assert!(matches!(
            table_page.get_record(&page, slot),
            Err(PageError::RecordNotFound)
        ));
        assert!(table_page.rollback_delete(&mut page, slot).is_err());
    }

    #[test]
    fn test_update_grows_record() {
        let table_page = TablePage::new();
        let mut page = Page::new(1);
        table_page.init_page(&mut page);

        let slot = table_page.insert_record(&mut page, b"ab").unwrap();
        table_page
            .update_record(&mut page, slot, b"a much longer record")
            .unwrap();
        assert_eq!(
            table_page.get_record(&page, slot).unwrap(),
            b"a much longer record"
        );
    }

    #[test]
    fn test_insert_fails_when_full() {
        let table_page = TablePage::new();
        let mut page = Page::new(1);
        table_page.init_page(&mut page);

        let big = vec![0u8; 2000];
        table_page.insert_record(&mut page, &big).unwrap();
        table_page.insert_record(&mut page, &big).unwrap();
        assert!(matches!(
            table_page.insert_record(&mut page, &big),
            Err(PageError::InsufficientSpace)
        ));
    }
}
