use thiserror::Error;

use super::types::{FrameId, PageId};

/// Storage-layer error types
#[derive(Error, Debug)]
pub enum StrataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Frame ID {0} out of range")]
    InvalidFrameId(FrameId),

    #[error("Frame {0} is not tracked by the replacer")]
    FrameNotTracked(FrameId),

    #[error("Frame {0} is not evictable")]
    FrameNotEvictable(FrameId),
}

pub type Result<T> = std::result::Result<T, StrataError>;
