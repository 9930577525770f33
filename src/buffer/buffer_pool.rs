//! Frame storage, frame metadata and the page table.

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::VecDeque;

use crate::config::BufferPoolConfig;
use crate::error::HashFileResult;
use crate::storage::disk_manager::DiskManager;
use crate::storage::{FileId, PageNo};

pub type FrameId = usize;

/// Identifies a page across every file registered with the buffer manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub file_id: FileId,
    pub page_no: PageNo,
}

impl PageKey {
    pub fn new(file_id: FileId, page_no: PageNo) -> Self {
        Self { file_id, page_no }
    }
}

#[derive(Debug, Default, Clone)]
pub struct FrameMeta {
    pub page: Option<PageKey>,
    pub pin_count: u32,
    pub is_dirty: bool,
}

#[derive(Debug)]
pub struct BufferPool {
    // Files may use different page sizes, so each frame owns its buffer and
    // is resized when a page is loaded into it.
    frames: Vec<RwLock<Vec<u8>>>,
    meta: Vec<Mutex<FrameMeta>>,
    page_table: DashMap<PageKey, FrameId>,
    free_list: Mutex<VecDeque<FrameId>>,
}

impl BufferPool {
    pub fn new(config: BufferPoolConfig) -> Self {
        let num_frames = config.buffer_pool_size;
        let mut free_list = VecDeque::with_capacity(num_frames);
        let mut frames = Vec::with_capacity(num_frames);
        let mut meta = Vec::with_capacity(num_frames);
        for frame_id in 0..num_frames {
            free_list.push_back(frame_id);
            frames.push(RwLock::new(Vec::new()));
            meta.push(Mutex::new(FrameMeta::default()));
        }
        Self {
            frames,
            meta,
            page_table: DashMap::new(),
            free_list: Mutex::new(free_list),
        }
    }

    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    pub fn frame(&self, frame_id: FrameId) -> &RwLock<Vec<u8>> {
        &self.frames[frame_id]
    }

    pub fn frame_meta(&self, frame_id: FrameId) -> MutexGuard<'_, FrameMeta> {
        self.meta[frame_id].lock()
    }

    pub fn pop_free_frame(&self) -> Option<FrameId> {
        self.free_list.lock().pop_front()
    }

    pub fn has_free_frame(&self) -> bool {
        !self.free_list.lock().is_empty()
    }

    pub fn push_free_frame(&self, frame_id: FrameId) {
        self.free_list.lock().push_back(frame_id);
    }

    pub fn insert_mapping(&self, key: PageKey, frame_id: FrameId) {
        self.page_table.insert(key, frame_id);
    }

    pub fn remove_mapping_if(&self, key: PageKey, frame_id: FrameId) -> bool {
        self.page_table
            .remove_if(&key, |_, current| *current == frame_id)
            .is_some()
    }

    pub fn lookup_frame(&self, key: PageKey) -> Option<FrameId> {
        self.page_table.get(&key).map(|entry| *entry.value())
    }

    /// Snapshot of the mappings whose page belongs to `file_id`, or all of
    /// them when `file_id` is `None`.
    pub fn mapped_pages(&self, file_id: Option<FileId>) -> Vec<(PageKey, FrameId)> {
        self.page_table
            .iter()
            .filter(|entry| file_id.map_or(true, |id| entry.key().file_id == id))
            .map(|entry| (*entry.key(), *entry.value()))
            .collect()
    }

    pub fn load_page_into_frame(
        &self,
        disk: &DiskManager,
        page_no: PageNo,
        frame_id: FrameId,
    ) -> HashFileResult<()> {
        let page_bytes = disk.read_page(page_no)?;
        let mut frame = self.frames[frame_id].write();
        frame.clear();
        frame.extend_from_slice(&page_bytes);
        Ok(())
    }

    pub fn write_frame_to_disk(
        &self,
        disk: &DiskManager,
        page_no: PageNo,
        frame_id: FrameId,
    ) -> HashFileResult<()> {
        let frame = self.frames[frame_id].read();
        disk.write_page(page_no, &frame)
    }

    pub fn pinned_frames(&self) -> u32 {
        self.meta.iter().map(|meta| meta.lock().pin_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::file_type::DBFileType;
    use tempfile::TempDir;

    fn setup_pool(num_frames: usize) -> (TempDir, DiskManager, BufferPool) {
        let temp_dir = TempDir::new().unwrap();
        let disk =
            DiskManager::create(temp_dir.path().join("pool.tbl"), DBFileType::Heap, 512).unwrap();
        let config = BufferPoolConfig {
            buffer_pool_size: num_frames,
            ..Default::default()
        };
        (temp_dir, disk, BufferPool::new(config))
    }

    #[test]
    fn load_page_into_frame_sizes_frame_to_file() {
        let (_tmp, disk, pool) = setup_pool(4);
        disk.extend_to(2).unwrap();
        disk.write_page(1, &vec![0xAA; 512]).unwrap();

        let frame_id = pool.pop_free_frame().expect("free frame");
        pool.load_page_into_frame(&disk, 1, frame_id).unwrap();
        let frame = pool.frame(frame_id).read();
        assert_eq!(frame.len(), 512);
        assert!(frame.iter().all(|b| *b == 0xAA));
    }

    #[test]
    fn write_frame_to_disk_persists_bytes() {
        let (_tmp, disk, pool) = setup_pool(4);
        disk.extend_to(2).unwrap();
        let frame_id = pool.pop_free_frame().expect("free frame");
        pool.load_page_into_frame(&disk, 1, frame_id).unwrap();
        pool.frame(frame_id).write().fill(0x3C);

        pool.write_frame_to_disk(&disk, 1, frame_id).unwrap();
        assert!(disk.read_page(1).unwrap().iter().all(|b| *b == 0x3C));
    }

    #[test]
    fn page_table_insert_lookup_and_remove() {
        let (_tmp, _disk, pool) = setup_pool(2);
        let key = PageKey::new(7, 3);
        pool.insert_mapping(key, 1);
        pool.insert_mapping(PageKey::new(8, 3), 0);
        assert_eq!(pool.lookup_frame(key), Some(1));
        assert_eq!(pool.mapped_pages(Some(7)), vec![(key, 1)]);
        assert_eq!(pool.mapped_pages(None).len(), 2);

        assert!(!pool.remove_mapping_if(key, 0));
        assert!(pool.remove_mapping_if(key, 1));
        assert!(pool.lookup_frame(key).is_none());
    }
}
