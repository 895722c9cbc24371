use std::sync::Arc;

use bytes::BytesMut;

use crate::error::{DbError, DbResult};
use crate::schema::TupleDesc;
use crate::transaction::TransactionId;
use crate::tuple::{RecordId, Tuple};
use crate::PageId;

/// Number of tuple slots on a page: each slot costs `tuple_size` bytes of
/// body plus one header bit.
pub fn slots_per_page(page_size: usize, tuple_size: usize) -> usize {
    (page_size * 8) / (tuple_size * 8 + 1)
}

/// Bytes of slot bitmap at the front of a page.
pub fn header_len(num_slots: usize) -> usize {
    num_slots.div_ceil(8)
}

/// A slotted heap page: a slot-occupancy bitmap followed by fixed-size
/// tuple slots in schema order. The serialized form is exactly
/// `page_size` bytes.
///
/// The page also tracks which transaction (if any) dirtied it, and keeps a
/// single before-image snapshot taken on the first mutation of a clean
/// page, which the buffer pool uses to undo an aborted transaction.
#[derive(Debug, Clone)]
pub struct HeapPage {
    pid: PageId,
    desc: Arc<TupleDesc>,
    page_size: usize,
    num_slots: usize,
    bitmap: Vec<u8>,
    slots: Vec<Option<Tuple>>,
    dirtied_by: Option<TransactionId>,
    before_image: Option<Vec<u8>>,
}

impl HeapPage {
    /// Parses a page from a raw on-disk image.
    pub fn new(
        pid: PageId,
        data: &[u8],
        desc: Arc<TupleDesc>,
        page_size: usize,
    ) -> DbResult<Self> {
        if data.len() != page_size {
            return Err(DbError::Corrupt(format!(
                "page image of {} bytes, expected {}",
                data.len(),
                page_size
            )));
        }
        let tuple_size = desc.byte_size();
        let num_slots = slots_per_page(page_size, tuple_size);
        if num_slots == 0 {
            return Err(DbError::IllegalArgument(format!(
                "page size {} cannot hold a single {}-byte tuple",
                page_size, tuple_size
            )));
        }
        let hdr = header_len(num_slots);
        let bitmap = data[..hdr].to_vec();

        let mut slots = Vec::with_capacity(num_slots);
        for i in 0..num_slots {
            let occupied = bitmap[i / 8] & (0x80 >> (i % 8)) != 0;
            if occupied {
                let start = hdr + i * tuple_size;
                let mut field_bytes = &data[start..start + tuple_size];
                let mut tuple = Tuple::read_from(desc.clone(), &mut field_bytes)?;
                tuple.set_record_id(Some(RecordId::new(pid, i as u16)));
                slots.push(Some(tuple));
            } else {
                slots.push(None);
            }
        }

        Ok(Self {
            pid,
            desc,
            page_size,
            num_slots,
            bitmap,
            slots,
            dirtied_by: None,
            before_image: None,
        })
    }

    /// A zeroed image of an empty page.
    pub fn empty_image(page_size: usize) -> Vec<u8> {
        vec![0u8; page_size]
    }

    pub fn id(&self) -> PageId {
        self.pid
    }

    pub fn desc(&self) -> &Arc<TupleDesc> {
        &self.desc
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    pub fn num_empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    pub fn is_slot_occupied(&self, slot: usize) -> bool {
        slot < self.num_slots && self.bitmap[slot / 8] & (0x80 >> (slot % 8)) != 0
    }

    fn set_slot_bit(&mut self, slot: usize, occupied: bool) {
        let mask = 0x80 >> (slot % 8);
        if occupied {
            self.bitmap[slot / 8] |= mask;
        } else {
            self.bitmap[slot / 8] &= !mask;
        }
    }

    /// Serializes the page to exactly `page_size` bytes: bitmap header,
    /// then each slot (occupied slots carry the tuple's fields, free slots
    /// are zeroed), then zero padding.
    pub fn serialize(&self) -> DbResult<Vec<u8>> {
        let tuple_size = self.desc.byte_size();
        let mut buf = BytesMut::with_capacity(self.page_size);
        buf.extend_from_slice(&self.bitmap);
        for slot in &self.slots {
            match slot {
                Some(tuple) => tuple.write_to(&mut buf)?,
                None => buf.extend_from_slice(&vec![0u8; tuple_size]),
            }
        }
        let mut data = buf.to_vec();
        data.resize(self.page_size, 0);
        debug_assert_eq!(data.len(), self.page_size);
        Ok(data)
    }

    /// Places the tuple in the lowest-numbered free slot and stamps its
    /// record id.
    pub fn insert_tuple(&mut self, mut tuple: Tuple) -> DbResult<()> {
        if tuple.desc().as_ref() != self.desc.as_ref() {
            return Err(DbError::SchemaMismatch(format!(
                "tuple schema does not match table schema of page {}",
                self.pid
            )));
        }
        let slot = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or(DbError::PageFull(self.pid))?;
        self.snapshot_if_clean()?;
        tuple.set_record_id(Some(RecordId::new(self.pid, slot as u16)));
        self.set_slot_bit(slot, true);
        self.slots[slot] = Some(tuple);
        Ok(())
    }

    /// Removes the tuple addressed by its record id and blanks the slot.
    pub fn delete_tuple(&mut self, tuple: &Tuple) -> DbResult<()> {
        let rid = tuple
            .record_id()
            .ok_or_else(|| DbError::TupleNotFound(self.pid))?;
        if rid.page_id != self.pid {
            return Err(DbError::TupleNotFound(self.pid));
        }
        let slot = rid.slot as usize;
        if !self.is_slot_occupied(slot) {
            return Err(DbError::TupleNotFound(self.pid));
        }
        self.snapshot_if_clean()?;
        self.set_slot_bit(slot, false);
        self.slots[slot] = None;
        Ok(())
    }

    /// Occupied slots in ascending slot order.
    pub fn iter_tuples(&self) -> impl Iterator<Item = &Tuple> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn mark_dirty(&mut self, dirtier: Option<TransactionId>) {
        self.dirtied_by = dirtier;
        if dirtier.is_none() {
            self.before_image = None;
        }
    }

    pub fn is_dirty(&self) -> Option<TransactionId> {
        self.dirtied_by
    }

    pub fn before_image(&self) -> Option<&[u8]> {
        self.before_image.as_deref()
    }

    /// Captures the pre-modification image the first time a clean page is
    /// mutated. While a page is clean its serialized form equals the last
    /// committed state (NO-STEAL: dirty pages never reach disk early).
    fn snapshot_if_clean(&mut self) -> DbResult<()> {
        if self.dirtied_by.is_none() && self.before_image.is_none() {
            self.before_image = Some(self.serialize()?);
        }
        Ok(())
    }
}
