use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::PoolInner;
use super::FrameHeader;

/// Scoped pin on a page. While any guard on a page is alive the page cannot
/// be evicted; dropping the guard returns the pin to the pool together with
/// the dirty flag accumulated through it.
///
/// Guards are move-only; a moved-from guard owes nothing. The basic variant
/// holds no latch: its accessors take the frame latch per call.
pub struct BasicPageGuard {
    pool: Arc<PoolInner>,
    page_id: PageId,
    frame: Arc<FrameHeader>,
    is_dirty: bool,
    released: bool,
}

impl BasicPageGuard {
    pub(crate) fn new(pool: Arc<PoolInner>, page_id: PageId, frame: Arc<FrameHeader>) -> Self {
        Self {
            pool,
            page_id,
            frame,
            is_dirty: false,
            released: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Shared access to the page bytes. Holds the frame latch for the
    /// lifetime of the returned borrow.
    pub fn data(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.frame.data.read(), |d| &d[..])
    }

    /// Exclusive access to the page bytes; marks the page dirty.
    pub fn data_mut(&mut self) -> MappedRwLockWriteGuard<'_, [u8]> {
        self.is_dirty = true;
        RwLockWriteGuard::map(self.frame.data.write(), |d| &mut d[..])
    }

    /// Marks the page dirty without touching the bytes. The flag can only be
    /// set through a guard, never cleared.
    pub fn mark_dirty(&mut self) {
        self.is_dirty = true;
    }

    /// Trades this guard for one holding the shared frame latch.
    /// Latches before returning; the pin count is unchanged.
    pub fn upgrade_read(self) -> ReadPageGuard {
        ReadPageGuard::latch(self)
    }

    /// Trades this guard for one holding the exclusive frame latch.
    /// Latches before returning; the pin count is unchanged.
    pub fn upgrade_write(self) -> WritePageGuard {
        WritePageGuard::latch(self)
    }

    /// Releases the pin now instead of at end of scope.
    pub fn drop_guard(self) {
        drop(self);
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.pool.unpin_page(self.page_id, self.is_dirty);
        }
    }
}

impl Drop for BasicPageGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Pin plus the shared frame latch, held for the guard's whole lifetime.
/// Readers of the same page coexist; writers are kept out until every read
/// guard is gone.
pub struct ReadPageGuard {
    base: BasicPageGuard,
    /// Held latch; released before the base gives up the pin
    latch: Option<RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl ReadPageGuard {
    pub(crate) fn latch(base: BasicPageGuard) -> Self {
        let frame = Arc::clone(&base.frame);
        let guard = frame.data.read();
        // Safety: the guard borrows the frame allocation, which `base` keeps
        // alive through its Arc for at least as long as this struct, and the
        // latch field is dropped before the base on every exit path.
        let latch: RwLockReadGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(guard) };
        Self {
            base,
            latch: Some(latch),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch.as_ref().unwrap()[..]
    }

    /// Releases the latch and the pin now instead of at end of scope.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        // Unlatch first, then let the base release the pin.
        self.latch.take();
        self.base.release();
    }
}

/// Pin plus the exclusive frame latch, held for the guard's whole lifetime.
pub struct WritePageGuard {
    base: BasicPageGuard,
    /// Held latch; released before the base gives up the pin
    latch: Option<RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>>>,
}

impl WritePageGuard {
    pub(crate) fn latch(base: BasicPageGuard) -> Self {
        let frame = Arc::clone(&base.frame);
        let guard = frame.data.write();
        // Safety: as for ReadPageGuard::latch.
        let latch: RwLockWriteGuard<'static, Box<[u8; PAGE_SIZE]>> =
            unsafe { std::mem::transmute(guard) };
        Self {
            base,
            latch: Some(latch),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.base.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch.as_ref().unwrap()[..]
    }

    /// Mutable access to the page bytes; marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.base.is_dirty = true;
        &mut self.latch.as_mut().unwrap()[..]
    }

    /// Marks the page dirty without touching the bytes.
    pub fn mark_dirty(&mut self) {
        self.base.is_dirty = true;
    }

    /// Releases the latch and the pin now instead of at end of scope.
    pub fn drop_guard(self) {
        drop(self);
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        // Unlatch first, then let the base release the pin.
        self.latch.take();
        self.base.release();
    }
}
