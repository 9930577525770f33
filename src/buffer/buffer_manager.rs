//! BufferManager maps pages of registered files onto pool frames, pins them
//! behind RAII guards and writes dirty victims back on eviction.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use log::{debug, trace};
use parking_lot::{Mutex, RwLock};

use crate::buffer::buffer_pool::{BufferPool, FrameId, FrameMeta, PageKey};
use crate::buffer::page::{self, ReadPageGuard, WritePageGuard};
use crate::config::BufferPoolConfig;
use crate::error::{HashFileError, HashFileResult};
use crate::storage::disk_manager::DiskManager;
use crate::storage::file_type::DBFileType;
use crate::storage::{FileId, PageNo};
use crate::utils::cache::LruKReplacer;

/// Handle to a file registered with a [`BufferManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DBFile {
    pub id: FileId,
    /// File name without directory or extension.
    pub name: String,
    pub path: PathBuf,
    pub file_type: DBFileType,
    pub page_size: usize,
}

#[derive(Debug)]
pub struct BufferManager {
    pool: Arc<BufferPool>,
    replacer: RwLock<LruKReplacer>,
    files: DashMap<FileId, Arc<DiskManager>>,
    next_file_id: AtomicU32,
    // Serializes cache misses so a page is never loaded into two frames.
    miss_latch: Mutex<()>,
}

impl BufferManager {
    pub fn new(config: BufferPoolConfig) -> Self {
        Self {
            pool: Arc::new(BufferPool::new(config)),
            replacer: RwLock::new(LruKReplacer::new(config.lru_k_k)),
            files: DashMap::new(),
            next_file_id: AtomicU32::new(1),
            miss_latch: Mutex::new(()),
        }
    }

    pub fn buffer_pool(&self) -> Arc<BufferPool> {
        self.pool.clone()
    }

    pub fn create_file(
        &self,
        path: impl AsRef<Path>,
        file_type: DBFileType,
        page_size: usize,
    ) -> HashFileResult<DBFile> {
        let disk = DiskManager::create(path, file_type, page_size)?;
        Ok(self.register(disk))
    }

    pub fn open_file(&self, path: impl AsRef<Path>) -> HashFileResult<DBFile> {
        let disk = DiskManager::open(path)?;
        Ok(self.register(disk))
    }

    fn register(&self, disk: DiskManager) -> DBFile {
        let id = self.next_file_id.fetch_add(1, Ordering::SeqCst);
        let name = disk
            .path()
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = DBFile {
            id,
            name,
            path: disk.path().to_path_buf(),
            file_type: disk.file_type(),
            page_size: disk.page_size(),
        };
        self.files.insert(id, Arc::new(disk));
        file
    }

    fn disk(&self, file_id: FileId) -> HashFileResult<Arc<DiskManager>> {
        self.files
            .get(&file_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| HashFileError::Storage(format!("File {file_id} is not registered")))
    }

    pub fn num_pages(&self, file: &DBFile) -> HashFileResult<PageNo> {
        Ok(self.disk(file.id)?.num_pages())
    }

    /// Pins `page_no` of `file` for writing. A missing page is an
    /// `EndOfFile` error unless `create` is set, in which case the file is
    /// extended through that page.
    pub fn load_page(
        self: &Arc<Self>,
        file: &DBFile,
        page_no: PageNo,
        create: bool,
    ) -> HashFileResult<WritePageGuard> {
        let key = PageKey::new(file.id, page_no);
        let frame_id = self.pin(file, key, create)?;
        Ok(page::new_write_guard(Arc::clone(self), key, frame_id))
    }

    pub fn load_page_read(
        self: &Arc<Self>,
        file: &DBFile,
        page_no: PageNo,
    ) -> HashFileResult<ReadPageGuard> {
        let key = PageKey::new(file.id, page_no);
        let frame_id = self.pin(file, key, false)?;
        Ok(page::new_read_guard(Arc::clone(self), key, frame_id))
    }

    fn pin(&self, file: &DBFile, key: PageKey, create: bool) -> HashFileResult<FrameId> {
        let disk = self.disk(file.id)?;
        if key.page_no >= disk.num_pages() {
            if !create {
                return Err(HashFileError::EndOfFile {
                    file: file.name.clone(),
                    page_no: key.page_no,
                });
            }
            disk.extend_to(key.page_no + 1)?;
        }

        if let Some(frame_id) = self.try_pin_resident(key) {
            return Ok(frame_id);
        }
        let _latch = self.miss_latch.lock();
        if let Some(frame_id) = self.try_pin_resident(key) {
            return Ok(frame_id);
        }

        let frame_id = self.allocate_frame()?;
        if let Err(e) = self.pool.load_page_into_frame(&disk, key.page_no, frame_id) {
            self.pool.push_free_frame(frame_id);
            return Err(e);
        }
        {
            let mut meta = self.pool.frame_meta(frame_id);
            meta.page = Some(key);
            meta.pin_count = 1;
            meta.is_dirty = false;
        }
        self.pool.insert_mapping(key, frame_id);
        trace!("Loaded page {:?} into frame {}", key, frame_id);
        self.record_pinned(frame_id);
        Ok(frame_id)
    }

    fn try_pin_resident(&self, key: PageKey) -> Option<FrameId> {
        let frame_id = self.pool.lookup_frame(key)?;
        {
            let mut meta = self.pool.frame_meta(frame_id);
            // Stale mapping of a frame being evicted.
            if meta.page != Some(key) {
                return None;
            }
            meta.pin_count += 1;
        }
        self.record_pinned(frame_id);
        Some(frame_id)
    }

    fn record_pinned(&self, frame_id: FrameId) {
        let mut rep = self.replacer.write();
        rep.record_access(frame_id);
        rep.set_evictable(frame_id, false);
    }

    pub(crate) fn complete_unpin(&self, key: PageKey, frame_id: FrameId, is_dirty: bool) {
        let mut meta = self.pool.frame_meta(frame_id);
        if meta.page != Some(key) {
            return;
        }
        meta.pin_count = meta.pin_count.saturating_sub(1);
        meta.is_dirty |= is_dirty;
        if meta.pin_count == 0 {
            self.replacer.write().set_evictable(frame_id, true);
        }
    }

    fn allocate_frame(&self) -> HashFileResult<FrameId> {
        if let Some(frame_id) = self.pool.pop_free_frame() {
            return Ok(frame_id);
        }
        self.evict_victim_frame()
    }

    fn evict_victim_frame(&self) -> HashFileResult<FrameId> {
        loop {
            let victim = self.replacer.write().evict();
            let Some(victim) = victim else {
                return Err(HashFileError::Storage(
                    "Cannot allocate frame: every page in the buffer pool is pinned".to_string(),
                ));
            };

            let mut meta = self.pool.frame_meta(victim);
            if meta.pin_count > 0 {
                drop(meta);
                self.record_pinned(victim);
                continue;
            }
            if let Some(key) = meta.page {
                if meta.is_dirty {
                    let disk = self.disk(key.file_id)?;
                    self.pool.write_frame_to_disk(&disk, key.page_no, victim)?;
                }
                self.pool.remove_mapping_if(key, victim);
                debug!("Evicted page {:?} from frame {}", key, victim);
            }
            *meta = FrameMeta::default();
            return Ok(victim);
        }
    }

    fn flush_frame(&self, key: PageKey, frame_id: FrameId) -> HashFileResult<bool> {
        let mut meta = self.pool.frame_meta(frame_id);
        if meta.page != Some(key) || !meta.is_dirty {
            return Ok(false);
        }
        let disk = self.disk(key.file_id)?;
        self.pool.write_frame_to_disk(&disk, key.page_no, frame_id)?;
        meta.is_dirty = false;
        Ok(true)
    }

    /// Writes back every dirty page of `file`. Must not be called while the
    /// caller holds a write guard on one of its pages.
    pub fn flush_file(&self, file: &DBFile) -> HashFileResult<()> {
        let mut flushed = 0;
        for (key, frame_id) in self.pool.mapped_pages(Some(file.id)) {
            if self.flush_frame(key, frame_id)? {
                flushed += 1;
            }
        }
        self.disk(file.id)?.sync()?;
        debug!("Flushed {} pages of {}", flushed, file.name);
        Ok(())
    }

    pub fn flush_all(&self) -> HashFileResult<()> {
        for (key, frame_id) in self.pool.mapped_pages(None) {
            self.flush_frame(key, frame_id)?;
        }
        for entry in self.files.iter() {
            entry.value().sync()?;
        }
        Ok(())
    }

    /// Sum of pin counts over every frame.
    pub fn pinned_frames(&self) -> u32 {
        self.pool.pinned_frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn setup_manager(num_frames: usize) -> (TempDir, Arc<BufferManager>, DBFile) {
        let temp_dir = TempDir::new().unwrap();
        let manager = Arc::new(BufferManager::new(BufferPoolConfig {
            buffer_pool_size: num_frames,
            ..Default::default()
        }));
        let file = manager
            .create_file(temp_dir.path().join("test.tbl"), DBFileType::Heap, 512)
            .unwrap();
        (temp_dir, manager, file)
    }

    #[test]
    fn missing_page_is_end_of_file_unless_created() {
        let (_tmp, manager, file) = setup_manager(4);
        let err = manager.load_page(&file, 1, false).unwrap_err();
        assert!(err.is_end_of_file());
        assert_eq!(manager.pinned_frames(), 0);

        let guard = manager.load_page(&file, 3, true).unwrap();
        assert_eq!(guard.data().len(), 512);
        assert!(guard.data().iter().all(|b| *b == 0));
        drop(guard);
        assert_eq!(manager.num_pages(&file).unwrap(), 4);
        assert_eq!(file.name, "test");
    }

    #[test]
    fn guard_pins_until_dropped() {
        let (_tmp, manager, file) = setup_manager(4);
        {
            let mut guard = manager.load_page(&file, 1, true).unwrap();
            assert!(!guard.is_dirty());
            guard.data_mut()[10] = 7;
            assert!(guard.is_dirty());
            assert_eq!(manager.pinned_frames(), 1);
        }
        assert_eq!(manager.pinned_frames(), 0);

        let read_guard = manager.load_page_read(&file, 1).unwrap();
        assert_eq!(read_guard.data()[10], 7);
        let frame_id = read_guard.frame_id();
        drop(read_guard);

        let meta = manager.buffer_pool().frame_meta(frame_id).clone();
        assert!(meta.is_dirty);
        assert_eq!(meta.pin_count, 0);
    }

    #[test]
    fn eviction_writes_dirty_pages_back() {
        let (_tmp, manager, file) = setup_manager(2);
        for page_no in 1..=6u32 {
            let mut guard = manager.load_page(&file, page_no, true).unwrap();
            guard.data_mut()[0] = page_no as u8;
        }
        for page_no in 1..=6u32 {
            let guard = manager.load_page_read(&file, page_no).unwrap();
            assert_eq!(guard.data()[0], page_no as u8);
        }
        assert_eq!(manager.pinned_frames(), 0);
    }

    #[test]
    fn pinned_full_pool_is_storage_error() {
        let (_tmp, manager, file) = setup_manager(1);
        let _held = manager.load_page(&file, 1, true).unwrap();
        let err = manager.load_page(&file, 2, true).unwrap_err();
        assert!(matches!(err, HashFileError::Storage(_)));
    }

    #[test]
    fn flush_then_reopen_sees_data() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("persist.tbl");
        {
            let manager = Arc::new(BufferManager::new(BufferPoolConfig::default()));
            let file = manager.create_file(&path, DBFileType::Overflow, 1024).unwrap();
            let mut guard = manager.load_page(&file, 2, true).unwrap();
            guard.data_mut()[100] = 0xEE;
            drop(guard);
            manager.flush_file(&file).unwrap();
        }
        let manager = Arc::new(BufferManager::new(BufferPoolConfig::default()));
        let file = manager.open_file(&path).unwrap();
        assert_eq!(file.file_type, DBFileType::Overflow);
        assert_eq!(file.page_size, 1024);
        assert_eq!(manager.num_pages(&file).unwrap(), 3);
        let guard = manager.load_page_read(&file, 2).unwrap();
        assert_eq!(guard.data()[100], 0xEE);
    }

    #[test]
    fn concurrent_reads_do_not_leak_pins() {
        const THREADS: usize = 8;
        let (_tmp, manager, file) = setup_manager(4);
        {
            let mut guard = manager.load_page(&file, 1, true).unwrap();
            guard.data_mut()[0] = 42;
        }

        let barrier = Arc::new(Barrier::new(THREADS));
        let mut handles = Vec::with_capacity(THREADS);
        for _ in 0..THREADS {
            let mgr = manager.clone();
            let file = file.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                barrier.wait();
                for _ in 0..50 {
                    let guard = mgr.load_page_read(&file, 1).expect("read page");
                    assert_eq!(guard.data()[0], 42);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(manager.pinned_frames(), 0);
    }
}
