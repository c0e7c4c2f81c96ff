use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{DbError, FrameId, PageId, Result, PAGE_SIZE};
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{BasicPageGuard, FrameHeader, LruKReplacer, ReadPageGuard, WritePageGuard};

/// Free list and page table, always manipulated together under one mutex.
struct PoolCore {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
}

/// State shared between the manager and the guards it hands out.
pub(crate) struct PoolShared {
    frames: Vec<Arc<FrameHeader>>,
    core: Mutex<PoolCore>,
    replacer: LruKReplacer,
    scheduler: DiskScheduler,
}

impl PoolShared {
    /// Pins the page, fetching it from disk into a frame if necessary.
    ///
    /// The core mutex is held for the whole operation, including the disk
    /// read and any eviction write-back.
    fn pin_page(&self, page_id: PageId) -> Result<FrameId> {
        let mut core = self.core.lock();

        if let Some(&frame_id) = core.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            debug_assert_eq!(frame.page_id(), page_id, "page table desync");
            frame.pin();
            self.replacer.record_access(frame_id);
            self.replacer.set_evictable(frame_id, false);
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame(&mut core)?;
        let frame = &self.frames[frame_id.as_usize()];

        let mut data = [0u8; PAGE_SIZE];
        self.scheduler.read_sync(page_id, &mut data)?;

        frame.set_page_id(page_id);
        frame.copy_from(&data);
        frame.set_dirty(false);
        frame.pin();

        core.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id);
        self.replacer.set_evictable(frame_id, false);

        Ok(frame_id)
    }

    /// Decrements the page's pin count, folding `mark_dirty` into the dirty
    /// bit. Returns false if the page is not resident or already unpinned.
    pub(crate) fn unpin(&self, page_id: PageId, mark_dirty: bool) -> bool {
        let core = self.core.lock();

        let Some(&frame_id) = core.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        match frame.unpin() {
            Some(remaining) => {
                if mark_dirty {
                    frame.set_dirty(true);
                }
                if remaining == 0 {
                    self.replacer.set_evictable(frame_id, true);
                }
                true
            }
            None => false,
        }
    }

    /// Takes a frame from the free list, or evicts a victim.
    fn acquire_frame(&self, core: &mut PoolCore) -> Result<FrameId> {
        if let Some(frame_id) = core.free_list.pop_front() {
            return Ok(frame_id);
        }

        let frame_id = self.replacer.evict().ok_or(DbError::PoolExhausted)?;
        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();

        if frame.is_dirty() {
            let mut data = [0u8; PAGE_SIZE];
            frame.copy_to(&mut data);
            self.scheduler.write_sync(old_page_id, &data)?;
            debug!("evicted dirty {old_page_id} from {frame_id}");
        }

        core.page_table.remove(&old_page_id);
        frame.reset();

        Ok(frame_id)
    }
}

/// BufferPoolManager mediates all access to disk pages, caching a fixed
/// number of frames in memory and evicting with the LRU-K policy.
pub struct BufferPoolManager {
    pool_size: usize,
    shared: Arc<PoolShared>,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Arc::new(FrameHeader::new(frame_id)));
            free_list.push_back(frame_id);
        }

        Self {
            pool_size,
            shared: Arc::new(PoolShared {
                frames,
                core: Mutex::new(PoolCore {
                    page_table: HashMap::new(),
                    free_list,
                }),
                replacer: LruKReplacer::new(k, pool_size),
                scheduler: DiskScheduler::new(disk_manager),
            }),
        }
    }

    /// Allocates a fresh zero-filled page, pinned with a pin count of one.
    /// The caller must eventually unpin it (or use [`Self::new_guarded`]).
    pub fn new_page(&self) -> Result<PageId> {
        let shared = &self.shared;
        let mut core = shared.core.lock();

        let frame_id = shared.acquire_frame(&mut core)?;
        let frame = &shared.frames[frame_id.as_usize()];

        let page_id = shared.scheduler.disk_manager().allocate_page()?;

        frame.reset();
        frame.set_page_id(page_id);
        frame.pin();

        core.page_table.insert(page_id, frame_id);
        shared.replacer.record_access(frame_id);
        shared.replacer.set_evictable(frame_id, false);

        Ok(page_id)
    }

    /// Decrements the pin count of a resident page.
    pub fn unpin_page(&self, page_id: PageId, mark_dirty: bool) -> bool {
        self.shared.unpin(page_id, mark_dirty)
    }

    /// Writes the page through to disk regardless of dirtiness and clears
    /// the dirty bit. The pin count is unchanged. Returns false if the page
    /// is not resident.
    ///
    /// The frame is pinned for the duration of the copy so the page latch
    /// is taken only after the pool mutex is released; a thread holding a
    /// latch may be blocked on the pool mutex, never the other way around.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }

        let shared = &self.shared;
        let frame = {
            let core = shared.core.lock();
            let Some(&frame_id) = core.page_table.get(&page_id) else {
                return Ok(false);
            };
            let frame = Arc::clone(&shared.frames[frame_id.as_usize()]);
            frame.pin();
            shared.replacer.set_evictable(frame_id, false);
            frame
        };

        let mut data = [0u8; PAGE_SIZE];
        frame.copy_to(&mut data);
        let result = shared.scheduler.write_sync(page_id, &data);
        if result.is_ok() {
            frame.set_dirty(false);
        }
        shared.unpin(page_id, false);
        result.map(|_| true)
    }

    /// Flushes every resident page with a valid page id.
    pub fn flush_all_pages(&self) -> Result<()> {
        let resident: Vec<PageId> = {
            let core = self.shared.core.lock();
            core.page_table
                .keys()
                .copied()
                .filter(PageId::is_valid)
                .collect()
        };
        for page_id in resident {
            self.flush_page(page_id)?;
        }
        Ok(())
    }

    /// Removes the page from the pool and releases its id on disk.
    /// Returns false if the page is currently pinned; succeeds trivially if
    /// the page was never resident.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let shared = &self.shared;
        let mut core = shared.core.lock();

        let Some(&frame_id) = core.page_table.get(&page_id) else {
            shared.scheduler.disk_manager().deallocate_page(page_id);
            return Ok(true);
        };
        let frame = &shared.frames[frame_id.as_usize()];

        if frame.pin_count() > 0 {
            return Ok(false);
        }

        core.page_table.remove(&page_id);
        shared.replacer.remove(frame_id);
        frame.reset();
        core.free_list.push_back(frame_id);
        shared.scheduler.disk_manager().deallocate_page(page_id);

        Ok(true)
    }

    /// Fetches a page pinned but unlatched. Data access re-acquires the page
    /// latch per call.
    pub fn fetch_basic(&self, page_id: PageId) -> Result<BasicPageGuard> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }
        let frame_id = self.shared.pin_page(page_id)?;
        let frame = Arc::clone(&self.shared.frames[frame_id.as_usize()]);
        Ok(BasicPageGuard::new(
            Arc::clone(&self.shared),
            frame,
            page_id,
        ))
    }

    /// Fetches a page pinned and read-latched.
    pub fn fetch_read(&self, page_id: PageId) -> Result<ReadPageGuard> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }
        let frame_id = self.shared.pin_page(page_id)?;
        let frame = Arc::clone(&self.shared.frames[frame_id.as_usize()]);
        Ok(ReadPageGuard::new(Arc::clone(&self.shared), frame, page_id))
    }

    /// Fetches a page pinned and write-latched.
    pub fn fetch_write(&self, page_id: PageId) -> Result<WritePageGuard> {
        if !page_id.is_valid() {
            return Err(DbError::InvalidPageId(page_id));
        }
        let frame_id = self.shared.pin_page(page_id)?;
        let frame = Arc::clone(&self.shared.frames[frame_id.as_usize()]);
        Ok(WritePageGuard::new(
            Arc::clone(&self.shared),
            frame,
            page_id,
        ))
    }

    /// Allocates a fresh page and returns it wrapped in a basic guard.
    pub fn new_guarded(&self) -> Result<BasicPageGuard> {
        let page_id = self.new_page()?;
        // new_page already pinned the frame; hand that pin to the guard.
        let frame_id = {
            let core = self.shared.core.lock();
            core.page_table[&page_id]
        };
        let frame = Arc::clone(&self.shared.frames[frame_id.as_usize()]);
        Ok(BasicPageGuard::new(
            Arc::clone(&self.shared),
            frame,
            page_id,
        ))
    }

    /// Allocates a fresh page and returns it write-latched.
    pub fn new_write_guarded(&self) -> Result<WritePageGuard> {
        let page_id = self.new_page()?;
        let frame_id = {
            let core = self.shared.core.lock();
            core.page_table[&page_id]
        };
        let frame = Arc::clone(&self.shared.frames[frame_id.as_usize()]);
        Ok(WritePageGuard::new(
            Arc::clone(&self.shared),
            frame,
            page_id,
        ))
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.shared.core.lock().free_list.len()
    }

    /// Number of evictable frames, as tracked by the replacer.
    pub fn evictable_count(&self) -> usize {
        self.shared.replacer.size()
    }

    pub fn pin_count_of(&self, page_id: PageId) -> Option<u32> {
        let core = self.shared.core.lock();
        core.page_table
            .get(&page_id)
            .map(|&fid| self.shared.frames[fid.as_usize()].pin_count())
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.shared.scheduler.disk_manager()
    }
}
