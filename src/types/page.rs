use crate::types::{
    error::{DatabaseError, Result},
    PAGE_HEADER_SIZE, PAGE_SIZE, SLOT_ENTRY_SIZE, SLOT_STATUS_ACTIVE,
};

/*
 * Page layout on disk (slotted page, all integers big-endian)
 * ┌─────────────────────────────────────────────────────────────────┐
 * │                    PAGE HEADER (32 bytes)                       │
 * │  num_slots(2) | free_space_start(2) | free_space_end(2) |       │
 * │  reserved(26)                                                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                  SLOT DIRECTORY                                 │
 * │  [slot0: offset(2)|size(2)|status(1)] [slot1: ...] ...          │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    FREE SPACE                                   │
 * ├─────────────────────────────────────────────────────────────────┤
 * │                    PAYLOAD                                      │
 * │  [...record N...] [...record 1...] [...record 0...]             │
 * └─────────────────────────────────────────────────────────────────┘
 */

#[derive(Debug, Clone, PartialEq)]
pub struct SlotEntry {
    /// Start of the payload, in bytes from the beginning of the page.
    pub offset: u16,
    /// Payload length in bytes.
    pub size: u16,
    /// `SLOT_STATUS_ACTIVE` or the `SLOT_STATUS_DELETED` tombstone.
    pub status: u8,
}

impl SlotEntry {
    pub fn is_active(&self) -> bool {
        self.status == SLOT_STATUS_ACTIVE
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub num_slots: u16,
    /// End of the slot directory; always `32 + 5 * num_slots`.
    pub free_space_start: u16,
    /// Lowest occupied payload offset; payloads grow down from 8192.
    pub free_space_end: u16,
    pub slots: Vec<SlotEntry>,
    data: Vec<u8>,
}

impl Page {
    pub fn empty() -> Self {
        Page {
            num_slots: 0,
            free_space_start: PAGE_HEADER_SIZE as u16,
            free_space_end: PAGE_SIZE as u16,
            slots: Vec::new(),
            data: vec![0; PAGE_SIZE],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAGE_SIZE {
            return Err(DatabaseError::BadPageSize {
                expected: PAGE_SIZE,
                actual: bytes.len(),
            });
        }

        let num_slots = u16::from_be_bytes([bytes[0], bytes[1]]);
        let free_space_start = u16::from_be_bytes([bytes[2], bytes[3]]);
        let free_space_end = u16::from_be_bytes([bytes[4], bytes[5]]);

        if free_space_end as usize > PAGE_SIZE || free_space_start > free_space_end {
            return Err(DatabaseError::CorruptedPage {
                reason: format!(
                    "inconsistent free space bounds {free_space_start}..{free_space_end}"
                ),
            });
        }

        if PAGE_HEADER_SIZE + num_slots as usize * SLOT_ENTRY_SIZE > PAGE_SIZE {
            return Err(DatabaseError::CorruptedPage {
                reason: "slot directory extends beyond page boundary".to_string(),
            });
        }

        let mut slots = Vec::with_capacity(num_slots as usize);
        let mut cursor = PAGE_HEADER_SIZE;
        for _ in 0..num_slots {
            let offset = u16::from_be_bytes([bytes[cursor], bytes[cursor + 1]]);
            let size = u16::from_be_bytes([bytes[cursor + 2], bytes[cursor + 3]]);
            let status = bytes[cursor + 4];
            cursor += SLOT_ENTRY_SIZE;

            if offset as usize + size as usize > PAGE_SIZE {
                return Err(DatabaseError::CorruptedPage {
                    reason: format!(
                        "slot at offset {offset} with size {size} exceeds page boundary"
                    ),
                });
            }

            slots.push(SlotEntry {
                offset,
                size,
                status,
            });
        }

        Ok(Page {
            num_slots,
            free_space_start,
            free_space_end,
            slots,
            data: bytes.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; PAGE_SIZE];

        buf[0..2].copy_from_slice(&self.num_slots.to_be_bytes());
        buf[2..4].copy_from_slice(&self.free_space_start.to_be_bytes());
        buf[4..6].copy_from_slice(&self.free_space_end.to_be_bytes());

        let mut cursor = PAGE_HEADER_SIZE;
        for slot in &self.slots {
            buf[cursor..cursor + 2].copy_from_slice(&slot.offset.to_be_bytes());
            buf[cursor + 2..cursor + 4].copy_from_slice(&slot.size.to_be_bytes());
            buf[cursor + 4] = slot.status;
            cursor += SLOT_ENTRY_SIZE;
        }

        let payload_start = self.free_space_end as usize;
        buf[payload_start..].copy_from_slice(&self.data[payload_start..]);

        buf
    }

    /// Bytes in the gap between the slot directory and the payload region.
    pub fn free_space(&self) -> usize {
        (self.free_space_end - self.free_space_start) as usize
    }

    /// A payload fits only if its slot directory entry fits too.
    pub fn has_free_space(&self, payload_len: usize) -> bool {
        self.free_space() >= payload_len + SLOT_ENTRY_SIZE
    }

    /// Copy `data` into the payload region and append an active slot for
    /// it, returning the slot index.
    pub fn insert(&mut self, data: &[u8]) -> Result<usize> {
        if !self.has_free_space(data.len()) {
            return Err(DatabaseError::PageFull {
                required: data.len() + SLOT_ENTRY_SIZE,
                available: self.free_space(),
            });
        }

        self.free_space_end -= data.len() as u16;
        self.free_space_start += SLOT_ENTRY_SIZE as u16;
        self.num_slots += 1;

        let offset = self.free_space_end;
        self.data[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        self.slots.push(SlotEntry {
            offset,
            size: data.len() as u16,
            status: SLOT_STATUS_ACTIVE,
        });

        Ok(self.slots.len() - 1)
    }

    pub fn get(&self, slot_index: usize) -> Option<&[u8]> {
        self.slots.get(slot_index).map(|slot| self.slot_payload(slot))
    }

    pub fn slot_payload(&self, slot: &SlotEntry) -> &[u8] {
        &self.data[slot.offset as usize..slot.offset as usize + slot.size as usize]
    }

    pub fn active_slot_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_active()).count()
    }
}

impl PartialEq for Page {
    fn eq(&self, other: &Self) -> bool {
        self.num_slots == other.num_slots
            && self.free_space_start == other.free_space_start
            && self.free_space_end == other.free_space_end
            && self.slots == other.slots
            && self.data[self.free_space_end as usize..]
                == other.data[other.free_space_end as usize..]
    }
}
