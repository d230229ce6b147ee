use super::types::{FrameId, PageId};

/// Fixed page size shared by the buffer pool and the disk manager.
pub const PAGE_SIZE: usize = 4096;

/// Sentinel id for a frame that holds no page.
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Sentinel frame id, outside any pool's `[0, pool_size)` range.
pub const INVALID_FRAME_ID: FrameId = FrameId(u32::MAX);

/// History depth used by the LRU-K replacer unless a caller picks another.
pub const DEFAULT_REPLACER_K: usize = 2;

/// Frame count for pools created without an explicit size.
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 10;
