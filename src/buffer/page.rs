use parking_lot::{RwLockReadGuard, RwLockWriteGuard};
use std::mem::{self, ManuallyDrop};
use std::sync::Arc;

use crate::buffer::{BufferManager, FrameId, PageKey};
use crate::storage::PageNo;

/// Shared, pinned access to one cached page. Unpins on drop.
#[derive(Debug)]
pub struct ReadPageGuard {
    bpm: Arc<BufferManager>,
    key: PageKey,
    frame_id: FrameId,
    guard: ManuallyDrop<RwLockReadGuard<'static, Vec<u8>>>,
}

impl ReadPageGuard {
    pub fn data(&self) -> &[u8] {
        &self.guard
    }

    pub fn page_no(&self) -> PageNo {
        self.key.page_no
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Drop for ReadPageGuard {
    fn drop(&mut self) {
        unsafe {
            ManuallyDrop::drop(&mut self.guard);
        }
        self.bpm.complete_unpin(self.key, self.frame_id, false);
    }
}

/// Exclusive, pinned access to one cached page. Unpins on drop and hands the
/// dirty flag back to the buffer manager.
#[derive(Debug)]
pub struct WritePageGuard {
    bpm: Arc<BufferManager>,
    key: PageKey,
    frame_id: FrameId,
    dirty: bool,
    guard: ManuallyDrop<RwLockWriteGuard<'static, Vec<u8>>>,
}

impl WritePageGuard {
    pub fn data(&self) -> &[u8] {
        &self.guard
    }

    /// Mutable page bytes. Marks the page dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirty = true;
        &mut self.guard
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn page_no(&self) -> PageNo {
        self.key.page_no
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Drop for WritePageGuard {
    fn drop(&mut self) {
        unsafe {
            ManuallyDrop::drop(&mut self.guard);
        }
        self.bpm.complete_unpin(self.key, self.frame_id, self.dirty);
    }
}

// The frame lock lives inside the pool owned by `bpm`, which the guard keeps
// alive, and the lock guard is always released before `bpm` is dropped.
pub(crate) fn new_read_guard(
    bpm: Arc<BufferManager>,
    key: PageKey,
    frame_id: FrameId,
) -> ReadPageGuard {
    let pool = bpm.buffer_pool();
    let lock = pool.frame(frame_id).read();
    let static_guard = unsafe {
        mem::transmute::<RwLockReadGuard<'_, Vec<u8>>, RwLockReadGuard<'static, Vec<u8>>>(lock)
    };
    ReadPageGuard {
        bpm,
        key,
        frame_id,
        guard: ManuallyDrop::new(static_guard),
    }
}

pub(crate) fn new_write_guard(
    bpm: Arc<BufferManager>,
    key: PageKey,
    frame_id: FrameId,
) -> WritePageGuard {
    let pool = bpm.buffer_pool();
    let lock = pool.frame(frame_id).write();
    let static_guard = unsafe {
        mem::transmute::<RwLockWriteGuard<'_, Vec<u8>>, RwLockWriteGuard<'static, Vec<u8>>>(lock)
    };
    WritePageGuard {
        bpm,
        key,
        frame_id,
        dirty: false,
        guard: ManuallyDrop::new(static_guard),
    }
}
