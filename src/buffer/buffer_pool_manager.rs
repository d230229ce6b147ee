use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{AccessType, FrameId, PageId, Result, StrataError, INVALID_PAGE_ID};
use crate::recovery::LogManager;
use crate::storage::disk::DiskManager;

use super::page_guard::{BasicPageGuard, ReadPageGuard, WritePageGuard};
use super::{FrameHeader, LruKReplacer};

/// Bookkeeping guarded by the pool mutex. Every public pool operation holds
/// this lock for its full duration, disk I/O included.
struct PoolState {
    /// Maps each resident page to the frame holding it
    page_table: HashMap<PageId, FrameId>,
    /// Frames not currently assigned to any page
    free_list: VecDeque<FrameId>,
    /// Next page id to hand out; ids are never reused
    next_page_id: u32,
}

/// Pool internals shared between the manager and its page guards.
pub(crate) struct PoolInner {
    frames: Vec<Arc<FrameHeader>>,
    state: Mutex<PoolState>,
    replacer: LruKReplacer,
    disk: Arc<DiskManager>,
    log_manager: Option<Arc<LogManager>>,
}

/// BufferPoolManager mediates between callers and the on-disk page store.
/// It owns a fixed set of frames, caches pages in them, and evicts with the
/// LRU-K policy when it runs out of room. Callers access resident pages
/// through scoped page guards whose destruction releases the pin.
pub struct BufferPoolManager {
    pool_size: usize,
    inner: Arc<PoolInner>,
}

impl BufferPoolManager {
    /// Creates a pool with `pool_size` frames over the given disk manager.
    /// `replacer_k` is the LRU-K history depth. The log manager is held as an
    /// opaque collaborator and not consulted by the pool itself.
    pub fn new(
        pool_size: usize,
        disk: Arc<DiskManager>,
        replacer_k: usize,
        log_manager: Option<Arc<LogManager>>,
    ) -> Self {
        let frames = (0..pool_size)
            .map(|i| Arc::new(FrameHeader::new(FrameId::new(i as u32))))
            .collect();
        let free_list = (0..pool_size).map(|i| FrameId::new(i as u32)).collect();

        let inner = Arc::new(PoolInner {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                next_page_id: 0,
            }),
            replacer: LruKReplacer::new(pool_size, replacer_k),
            disk,
            log_manager,
        });

        Self { pool_size, inner }
    }

    /// Allocates a new page and pins it. Returns `Ok(None)` when every frame
    /// is pinned (pool exhausted). The caller owns one pin and must pair it
    /// with [`unpin_page`](Self::unpin_page); prefer
    /// [`new_page_guarded`](Self::new_page_guarded) where a scoped handle
    /// fits.
    pub fn new_page(&self) -> Result<Option<PageId>> {
        Ok(self.inner.new_frame()?.map(|(page_id, _)| page_id))
    }

    /// Allocates a new page and returns it wrapped in a pin-only guard.
    pub fn new_page_guarded(&self) -> Result<Option<BasicPageGuard>> {
        Ok(self.inner.new_frame()?.map(|(page_id, frame)| {
            BasicPageGuard::new(Arc::clone(&self.inner), page_id, frame)
        }))
    }

    /// Fetches a page and returns it wrapped in a pin-only guard.
    /// Returns `Ok(None)` when the page is not resident and no frame can be
    /// freed for it.
    pub fn fetch_page_basic(&self, page_id: PageId) -> Result<Option<BasicPageGuard>> {
        Ok(self
            .inner
            .fetch_frame(page_id, AccessType::Unknown)?
            .map(|frame| BasicPageGuard::new(Arc::clone(&self.inner), page_id, frame)))
    }

    /// Fetches a page and returns a guard holding the shared frame latch.
    /// The latch is acquired after the pool mutex is released.
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<Option<ReadPageGuard>> {
        Ok(self
            .fetch_page_basic(page_id)?
            .map(BasicPageGuard::upgrade_read))
    }

    /// Fetches a page and returns a guard holding the exclusive frame latch.
    /// The latch is acquired after the pool mutex is released.
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<Option<WritePageGuard>> {
        Ok(self
            .fetch_page_basic(page_id)?
            .map(BasicPageGuard::upgrade_write))
    }

    /// Drops one pin on the page, ORing `is_dirty` into the frame's dirty
    /// flag. Returns false when the page is not resident or was not pinned.
    /// When the last pin goes away the frame becomes evictable.
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.inner.unpin_page(page_id, is_dirty)
    }

    /// Writes the page through to disk regardless of its dirty flag and
    /// clears the flag. Pin state is untouched. Returns false when the page
    /// is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        self.inner.flush_page(page_id)
    }

    /// Flushes every resident page.
    pub fn flush_all_pages(&self) -> Result<()> {
        self.inner.flush_all_pages()
    }

    /// Drops a page from the pool. Returns `Ok(true)` when the page is not
    /// resident (nothing to do) or was dropped, `Ok(false)` when it is still
    /// pinned. Dirty contents of a deleted page are discarded, not written
    /// back.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        self.inner.delete_page(page_id)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Number of frames on the free list.
    pub fn free_frame_count(&self) -> usize {
        self.inner.state.lock().free_list.len()
    }

    /// Number of resident frames the replacer would be willing to evict.
    pub fn evictable_count(&self) -> usize {
        self.inner.replacer.size()
    }

    /// Pin count of a resident page, or None if the page is not resident.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.inner.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|frame_id| self.inner.frames[frame_id.as_usize()].pin_count())
    }

    /// Dirty flag of a resident page, or None if the page is not resident.
    pub fn is_page_dirty(&self, page_id: PageId) -> Option<bool> {
        let state = self.inner.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|frame_id| self.inner.frames[frame_id.as_usize()].is_dirty())
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.inner.disk
    }

    pub fn log_manager(&self) -> Option<&Arc<LogManager>> {
        self.inner.log_manager.as_ref()
    }
}

impl PoolInner {
    /// Allocates the next page id into a free frame, pinned once.
    fn new_frame(&self) -> Result<Option<(PageId, Arc<FrameHeader>)>> {
        let mut state = self.state.lock();
        let Some(frame_id) = self.acquire_frame(&mut state)? else {
            return Ok(None);
        };

        let page_id = PageId::new(state.next_page_id);
        state.next_page_id += 1;

        let frame = &self.frames[frame_id.as_usize()];
        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id, AccessType::Unknown)?;
        self.replacer.set_evictable(frame_id, false)?;

        debug!(%page_id, %frame_id, "allocated new page");
        Ok(Some((page_id, Arc::clone(frame))))
    }

    /// Pins the page into a frame, reading it from disk if it is not
    /// resident. Returns None when no frame can be obtained.
    fn fetch_frame(
        &self,
        page_id: PageId,
        access_type: AccessType,
    ) -> Result<Option<Arc<FrameHeader>>> {
        if page_id == INVALID_PAGE_ID {
            return Err(StrataError::InvalidPageId(page_id));
        }

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.as_usize()];
            frame.pin();
            self.replacer.record_access(frame_id, access_type)?;
            self.replacer.set_evictable(frame_id, false)?;
            return Ok(Some(Arc::clone(frame)));
        }

        let Some(frame_id) = self.acquire_frame(&mut state)? else {
            return Ok(None);
        };

        let frame = &self.frames[frame_id.as_usize()];
        {
            let mut data = frame.data.write();
            if let Err(e) = self.disk.read_page(page_id, &mut data[..]) {
                drop(data);
                state.free_list.push_front(frame_id);
                return Err(e);
            }
        }
        frame.set_page_id(page_id);
        frame.pin();
        state.page_table.insert(page_id, frame_id);
        self.replacer.record_access(frame_id, access_type)?;
        self.replacer.set_evictable(frame_id, false)?;

        trace!(%page_id, %frame_id, "fetched page from disk");
        Ok(Some(Arc::clone(frame)))
    }

    /// Obtains an empty frame: free list first, then eviction. A dirty
    /// victim is written back before its frame is recycled; the dirty flag
    /// is cleared only after the write succeeds.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<Option<FrameId>> {
        if let Some(frame_id) = state.free_list.pop_front() {
            debug_assert!(
                !self.replacer.tracks(frame_id),
                "free-list frame must have no replacer history"
            );
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.replacer.evict() else {
            return Ok(None);
        };

        let frame = &self.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();
        if frame.is_dirty() {
            let data = frame.data.read();
            if let Err(e) = self.disk.write_page(old_page_id, &data[..]) {
                drop(data);
                // Hand the victim back to the replacer so pool accounting
                // stays intact; its history restarts from now.
                self.replacer.record_access(frame_id, AccessType::Unknown)?;
                self.replacer.set_evictable(frame_id, true)?;
                return Err(e);
            }
            drop(data);
            frame.set_dirty(false);
            debug!(page_id = %old_page_id, "wrote back dirty page on eviction");
        }

        state.page_table.remove(&old_page_id);
        frame.reset();
        Ok(Some(frame_id))
    }

    pub(crate) fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];
        let Some(remaining) = frame.unpin() else {
            return false;
        };
        if is_dirty {
            frame.set_dirty(true);
        }
        if remaining == 0 {
            // A resident frame always has replacer history.
            let marked = self.replacer.set_evictable(frame_id, true);
            debug_assert!(marked.is_ok());
        }
        true
    }

    fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(false);
        };
        let frame = &self.frames[frame_id.as_usize()];
        {
            let data = frame.data.read();
            self.disk.write_page(page_id, &data[..])?;
        }
        frame.set_dirty(false);
        debug!(%page_id, "flushed page");
        Ok(true)
    }

    fn flush_all_pages(&self) -> Result<()> {
        let state = self.state.lock();
        for (&page_id, &frame_id) in &state.page_table {
            let frame = &self.frames[frame_id.as_usize()];
            {
                let data = frame.data.read();
                self.disk.write_page(page_id, &data[..])?;
            }
            frame.set_dirty(false);
        }
        debug!(pages = state.page_table.len(), "flushed all pages");
        Ok(())
    }

    fn delete_page(&self, page_id: PageId) -> Result<bool> {
        let mut state = self.state.lock();
        let Some(&frame_id) = state.page_table.get(&page_id) else {
            return Ok(true);
        };
        let frame = &self.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        self.replacer.remove(frame_id)?;
        state.page_table.remove(&page_id);
        frame.reset();
        state.free_list.push_back(frame_id);
        self.deallocate_page(page_id);

        debug!(%page_id, "deleted page");
        Ok(true)
    }

    fn deallocate_page(&self, _page_id: PageId) {
        // Page ids are never reused and there is no on-disk free map yet.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, dm, 2, None);
        (bpm, temp_file)
    }

    #[test]
    fn test_new_pool_is_all_free() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
        assert_eq!(bpm.evictable_count(), 0);
    }

    #[test]
    fn test_new_page_starts_pinned_and_clean() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = bpm.new_page().unwrap().unwrap();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(bpm.pin_count(page_id), Some(1));
        assert_eq!(bpm.is_page_dirty(page_id), Some(false));
        assert_eq!(bpm.free_frame_count(), 9);

        assert!(bpm.unpin_page(page_id, false));
        assert_eq!(bpm.pin_count(page_id), Some(0));
        assert_eq!(bpm.evictable_count(), 1);
    }

    #[test]
    fn test_page_ids_are_monotonic() {
        let (bpm, _temp) = create_bpm(10);

        for expected in 0..5 {
            let page_id = bpm.new_page().unwrap().unwrap();
            assert_eq!(page_id, PageId::new(expected));
            bpm.unpin_page(page_id, false);
        }

        // Deleting does not recycle the id sequence.
        assert!(bpm.delete_page(PageId::new(2)).unwrap());
        let page_id = bpm.new_page().unwrap().unwrap();
        assert_eq!(page_id, PageId::new(5));
    }

    #[test]
    fn test_unpin_contract() {
        let (bpm, _temp) = create_bpm(10);

        // Unmapped page
        assert!(!bpm.unpin_page(PageId::new(42), false));

        let page_id = bpm.new_page().unwrap().unwrap();
        assert!(bpm.unpin_page(page_id, false));
        // Already at zero
        assert!(!bpm.unpin_page(page_id, false));
    }

    #[test]
    fn test_unpin_dirty_sticks() {
        let (bpm, _temp) = create_bpm(10);

        let page_id = bpm.new_page().unwrap().unwrap();
        assert!(bpm.unpin_page(page_id, true));
        assert_eq!(bpm.is_page_dirty(page_id), Some(true));

        // A later clean unpin must not clear the flag.
        let guard = bpm.fetch_page_basic(page_id).unwrap().unwrap();
        drop(guard);
        assert_eq!(bpm.is_page_dirty(page_id), Some(true));
    }

    #[test]
    fn test_fetch_missing_page_reads_disk() {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());

        let mut bytes = [0u8; crate::common::PAGE_SIZE];
        bytes[0] = 0x5A;
        dm.write_page(PageId::new(0), &bytes).unwrap();

        let bpm = BufferPoolManager::new(4, dm, 2, None);
        // Page 0 was written behind the pool's back; fetching must read it.
        let guard = bpm.fetch_page_read(PageId::new(0)).unwrap().unwrap();
        assert_eq!(guard.data()[0], 0x5A);
    }

    #[test]
    fn test_fetch_invalid_page_id_is_error() {
        let (bpm, _temp) = create_bpm(4);
        assert!(matches!(
            bpm.fetch_page_basic(INVALID_PAGE_ID),
            Err(StrataError::InvalidPageId(_))
        ));
    }
}
