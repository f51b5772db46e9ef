use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{PageId, INVALID_PAGE_ID};

// Heap page header, packed little-endian:
//   0..4  next page in the table chain (INVALID_PAGE_ID when last)
//   4..6  number of slots ever handed out
//   6..8  offset one past the last data byte
// Free room is whatever lies between the data top and the slot array,
// so it is never stored.
pub const HEADER_SIZE: usize = 8;
pub const SLOT_SIZE: usize = 8; // 4 bytes for offset + 4 bytes for length

const OFF_NEXT_PAGE: usize = 0;
const OFF_SLOT_COUNT: usize = 4;
const OFF_DATA_TOP: usize = 6;

/// High bit of the slot length marks a tuple as deleted; the bytes stay in
/// place until the deleting transaction commits.
pub const DELETED_FLAG: u32 = 0x8000_0000;
pub const LENGTH_MASK: u32 = 0x7FFF_FFFF;

pub fn init_heap_page(data: &mut [u8]) {
    LittleEndian::write_u32(&mut data[OFF_NEXT_PAGE..OFF_NEXT_PAGE + 4], INVALID_PAGE_ID);
    LittleEndian::write_u16(&mut data[OFF_SLOT_COUNT..OFF_SLOT_COUNT + 2], 0);
    LittleEndian::write_u16(&mut data[OFF_DATA_TOP..OFF_DATA_TOP + 2], HEADER_SIZE as u16);
}

pub fn next_page(data: &[u8]) -> Option<PageId> {
    let raw = LittleEndian::read_u32(&data[OFF_NEXT_PAGE..OFF_NEXT_PAGE + 4]);
    if raw == INVALID_PAGE_ID {
        None
    } else {
        Some(raw)
    }
}

pub fn set_next_page(data: &mut [u8], next: Option<PageId>) {
    let raw = next.unwrap_or(INVALID_PAGE_ID);
    LittleEndian::write_u32(&mut data[OFF_NEXT_PAGE..OFF_NEXT_PAGE + 4], raw);
}

pub fn slot_count(data: &[u8]) -> u32 {
    LittleEndian::read_u16(&data[OFF_SLOT_COUNT..OFF_SLOT_COUNT + 2]) as u32
}

pub fn set_slot_count(data: &mut [u8], count: u32) {
    LittleEndian::write_u16(&mut data[OFF_SLOT_COUNT..OFF_SLOT_COUNT + 2], count as u16);
}

pub fn data_top(data: &[u8]) -> usize {
    LittleEndian::read_u16(&data[OFF_DATA_TOP..OFF_DATA_TOP + 2]) as usize
}

pub fn set_data_top(data: &mut [u8], top: usize) {
    LittleEndian::write_u16(&mut data[OFF_DATA_TOP..OFF_DATA_TOP + 2], top as u16);
}

#[derive(Debug, Clone, Copy)]
pub struct Slot {
    pub offset: u32,
    pub length: u32,
    pub deleted: bool,
}

impl Slot {
    pub fn to_bytes(&self) -> [u8; SLOT_SIZE] {
        let mut bytes = [0u8; SLOT_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.offset);
        let mut length = self.length & LENGTH_MASK;
        if self.deleted {
            length |= DELETED_FLAG;
        }
        LittleEndian::write_u32(&mut bytes[4..8], length);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let offset = LittleEndian::read_u32(&bytes[0..4]);
        let raw = LittleEndian::read_u32(&bytes[4..8]);
        Self {
            offset,
            length: raw & LENGTH_MASK,
            deleted: raw & DELETED_FLAG != 0,
        }
    }
}
