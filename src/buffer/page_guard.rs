use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolShared;
use super::FrameHeader;

/// Pinned but unlatched page handle.
///
/// Each data access takes the page latch for just that access, so the
/// reference handed out can never outlive the latch that protects it.
/// Dropping the guard unpins the page, propagating the dirty bit.
pub struct BasicPageGuard {
    pool: Arc<PoolShared>,
    frame: Arc<FrameHeader>,
    page_id: PageId,
    is_dirty: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(pool: Arc<PoolShared>, frame: Arc<FrameHeader>, page_id: PageId) -> Self {
        Self {
            pool,
            frame,
            page_id,
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Read-latches the page for the lifetime of the returned view.
    pub fn data(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.frame.data.read(), |d| &d[..])
    }

    /// Write-latches the page for the lifetime of the returned view and
    /// marks the page dirty.
    pub fn data_mut(&mut self) -> MappedRwLockWriteGuard<'_, [u8]> {
        self.is_dirty = true;
        RwLockWriteGuard::map(self.frame.data.write(), |d| &mut d[..])
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        self.pool.unpin(self.page_id, self.is_dirty);
    }
}

/// Pinned page handle holding the page's read latch for its whole lifetime.
pub struct ReadPageGuard {
    pool: Arc<PoolShared>,
    // Keeps the latched data alive; never dropped before `latch`.
    _frame: Arc<FrameHeader>,
    page_id: PageId,
    latch: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    pub(crate) fn new(pool: Arc<PoolShared>, frame: Arc<FrameHeader>, page_id: PageId) -> Self {
        let latch = frame.data.read();
        // The latch borrows the frame, which the guard keeps alive through
        // an Arc for at least as long as the latch itself; Drop releases
        // the latch before the Arc.
        let latch: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(latch) };

        Self {
            pool,
            _frame: frame,
            page_id,
            latch: Some(latch),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch.as_ref().expect("latch held until drop")[..]
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Release the latch, then the pin.
        self.latch.take();
        self.pool.unpin(self.page_id, false);
    }
}

/// Pinned page handle holding the page's write latch for its whole lifetime.
pub struct WritePageGuard {
    pool: Arc<PoolShared>,
    _frame: Arc<FrameHeader>,
    page_id: PageId,
    latch: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
    is_dirty: bool,
}

impl WritePageGuard {
    pub(crate) fn new(pool: Arc<PoolShared>, frame: Arc<FrameHeader>, page_id: PageId) -> Self {
        let latch = frame.data.write();
        let latch: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(latch) };

        Self {
            pool,
            _frame: frame,
            page_id,
            latch: Some(latch),
            is_dirty: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch.as_ref().expect("latch held until drop")[..]
    }

    /// Marks the page dirty and returns the mutable page image.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.is_dirty = true;
        &mut self.latch.as_mut().expect("latch held until drop")[..]
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        self.latch.take();
        self.pool.unpin(self.page_id, self.is_dirty);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::NamedTempFile;

    use crate::buffer::BufferPoolManager;
    use crate::storage::disk::DiskManager;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        (BufferPoolManager::new(pool_size, 2, dm), temp_file)
    }

    #[test]
    fn test_write_guard_marks_dirty_on_drop() {
        let (bpm, _temp) = create_bpm(4);
        let page_id = bpm.new_page().unwrap();
        bpm.unpin_page(page_id, false);

        {
            let mut guard = bpm.fetch_write(page_id).unwrap();
            guard.data_mut()[17] = 3;
        }

        // The dirty write survives eviction: force the page out and back.
        for _ in 0..4 {
            let pid = bpm.new_page().unwrap();
            bpm.unpin_page(pid, false);
        }
        let guard = bpm.fetch_read(page_id).unwrap();
        assert_eq!(guard.data()[17], 3);
    }

    #[test]
    fn test_read_guards_are_shared() {
        let (bpm, _temp) = create_bpm(4);
        let page_id = bpm.new_page().unwrap();
        bpm.unpin_page(page_id, false);

        let g1 = bpm.fetch_read(page_id).unwrap();
        let g2 = bpm.fetch_read(page_id).unwrap();
        assert_eq!(g1.data()[0], g2.data()[0]);
        assert_eq!(bpm.pin_count_of(page_id), Some(2));

        drop(g1);
        assert_eq!(bpm.pin_count_of(page_id), Some(1));
        drop(g2);
        assert_eq!(bpm.pin_count_of(page_id), Some(0));
    }

    #[test]
    fn test_basic_guard_relatches_per_access() {
        let (bpm, _temp) = create_bpm(4);
        let page_id = bpm.new_page().unwrap();
        bpm.unpin_page(page_id, false);

        let mut basic = bpm.fetch_basic(page_id).unwrap();
        basic.data_mut()[5] = 7;
        assert_eq!(basic.data()[5], 7);

        // A read guard can coexist with an idle basic guard.
        let reader = bpm.fetch_read(page_id).unwrap();
        assert_eq!(reader.data()[5], 7);
        drop(reader);
        drop(basic);

        // Dirty bit propagated by the basic guard's drop.
        let guard = bpm.fetch_read(page_id).unwrap();
        assert_eq!(guard.data()[5], 7);
    }
}
