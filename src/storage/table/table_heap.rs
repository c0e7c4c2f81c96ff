use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::BufferPoolManager;
use crate::common::{DbError, PageId, Result, Rid, SlotId, PAGE_SIZE};
use crate::storage::page::{TablePage, TablePageRef, TupleMeta};
use crate::types::{Schema, Tuple};

/// A table heap: an append-only linked list of slotted pages.
///
/// Deletion is logical (tombstones); updates are tombstone-and-insert at
/// the executor layer.
pub struct TableHeap {
    bpm: Arc<BufferPoolManager>,
    schema: Arc<Schema>,
    first_page_id: PageId,
    /// Tail of the page chain, where inserts go. The mutex serializes
    /// appends so two inserts cannot both extend the chain.
    last_page_id: Mutex<PageId>,
}

impl TableHeap {
    /// Creates an empty heap with one empty page.
    pub fn new(bpm: Arc<BufferPoolManager>, schema: Arc<Schema>) -> Result<Self> {
        let mut guard = bpm.new_write_guarded()?;
        TablePage::init(guard.data_mut());
        let first_page_id = guard.page_id();
        drop(guard);

        Ok(Self {
            bpm,
            schema,
            first_page_id,
            last_page_id: Mutex::new(first_page_id),
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    /// Appends a tuple, extending the page chain if the tail is full.
    /// Returns None if the tuple cannot fit even in an empty page.
    pub fn insert_tuple(&self, meta: TupleMeta, tuple: &Tuple) -> Result<Option<Rid>> {
        let bytes = match tuple.to_bytes() {
            Some(b) => b,
            None => return Ok(None),
        };

        let mut last = self.last_page_id.lock();
        let mut guard = self.bpm.fetch_write(*last)?;
        if let Some(slot) = TablePage::new(guard.data_mut()).insert_tuple(meta, &bytes) {
            return Ok(Some(Rid::new(guard.page_id(), slot)));
        }

        let mut next_guard = self.bpm.new_write_guarded()?;
        TablePage::init(next_guard.data_mut());
        let next_page_id = next_guard.page_id();
        TablePage::new(guard.data_mut()).set_next_page_id(next_page_id);
        drop(guard);
        *last = next_page_id;

        let slot = TablePage::new(next_guard.data_mut())
            .insert_tuple(meta, &bytes)
            .ok_or(DbError::TupleTooLarge {
                tuple_size: bytes.len(),
                available: PAGE_SIZE,
            })?;
        Ok(Some(Rid::new(next_page_id, slot)))
    }

    pub fn get_tuple(&self, rid: Rid) -> Result<Option<(TupleMeta, Tuple)>> {
        let guard = self.bpm.fetch_read(rid.page_id)?;
        let page = TablePageRef::new(guard.data());
        let Some(meta) = page.tuple_meta(rid.slot_id) else {
            return Ok(None);
        };
        let Some(bytes) = page.tuple_bytes(rid.slot_id) else {
            return Ok(None);
        };
        let tuple = Tuple::from_bytes(Arc::clone(&self.schema), bytes).map(|t| t.with_rid(rid));
        Ok(tuple.map(|t| (meta, t)))
    }

    pub fn get_tuple_meta(&self, rid: Rid) -> Result<Option<TupleMeta>> {
        let guard = self.bpm.fetch_read(rid.page_id)?;
        Ok(TablePageRef::new(guard.data()).tuple_meta(rid.slot_id))
    }

    pub fn update_tuple_meta(&self, meta: TupleMeta, rid: Rid) -> Result<bool> {
        let mut guard = self.bpm.fetch_write(rid.page_id)?;
        Ok(TablePage::new(guard.data_mut()).set_tuple_meta(rid.slot_id, meta))
    }

    /// Iterator bounded at the current end of the heap: tuples appended
    /// while the scan runs are not visited. This is what scans (and
    /// mutation executors reading through them) should use.
    pub fn iter(self: &Arc<Self>) -> Result<TableIterator> {
        let stop_after = {
            let last = self.last_page_id.lock();
            let guard = self.bpm.fetch_read(*last)?;
            let count = TablePageRef::new(guard.data()).tuple_count();
            (*last, count)
        };
        Ok(TableIterator {
            heap: Arc::clone(self),
            cursor: Some(Rid::new(self.first_page_id, SlotId::new(0))),
            stop_after: Some(stop_after),
        })
    }

    /// Unbounded iterator that chases the chain as far as it grows.
    pub fn eager_iter(self: &Arc<Self>) -> TableIterator {
        TableIterator {
            heap: Arc::clone(self),
            cursor: Some(Rid::new(self.first_page_id, SlotId::new(0))),
            stop_after: None,
        }
    }
}

/// Cursor over every slot of a heap, tombstoned or not; callers filter on
/// the returned meta.
pub struct TableIterator {
    heap: Arc<TableHeap>,
    cursor: Option<Rid>,
    /// (page, tuple_count) bound captured at creation
    stop_after: Option<(PageId, usize)>,
}

impl TableIterator {
    pub fn is_end(&self) -> bool {
        self.cursor.is_none()
    }

    pub fn next(&mut self) -> Result<Option<(TupleMeta, Tuple)>> {
        loop {
            let Some(rid) = self.cursor else {
                return Ok(None);
            };

            let guard = self.heap.bpm.fetch_read(rid.page_id)?;
            let page = TablePageRef::new(guard.data());

            let mut count = page.tuple_count();
            if let Some((stop_page, stop_count)) = self.stop_after {
                if rid.page_id == stop_page {
                    count = count.min(stop_count);
                }
            }

            if rid.slot_id.as_usize() < count {
                let meta = page.tuple_meta(rid.slot_id).expect("slot in range");
                let bytes = page.tuple_bytes(rid.slot_id).expect("slot in range");
                let tuple = Tuple::from_bytes(Arc::clone(&self.heap.schema), bytes)
                    .map(|t| t.with_rid(rid));
                self.cursor = Some(Rid::new(
                    rid.page_id,
                    SlotId::new(rid.slot_id.as_u16() + 1),
                ));
                if let Some(tuple) = tuple {
                    return Ok(Some((meta, tuple)));
                }
                continue;
            }

            let at_stop_page = matches!(self.stop_after, Some((p, _)) if p == rid.page_id);
            let next = page.next_page_id();
            drop(guard);

            if at_stop_page || !next.is_valid() {
                self.cursor = None;
                return Ok(None);
            }
            self.cursor = Some(Rid::new(next, SlotId::new(0)));
        }
    }
}
