mod buffer_manager;
mod buffer_pool;
mod page;

pub use buffer_manager::{BufferManager, DBFile};
pub use buffer_pool::{BufferPool, FrameId, FrameMeta, PageKey};
pub use page::{ReadPageGuard, WritePageGuard};
