use bytes::BytesMut;
use log::{debug, info};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::validate_page_size;
use crate::error::{HashFileError, HashFileResult};
use crate::storage::file_type::DBFileType;
use crate::storage::PageNo;

/// Byte of page 0 holding the file type tag.
pub const OFFSET_FILE_TYPE: usize = 0;
/// Byte of page 0 holding log2 of the page size.
pub const OFFSET_PAGE_SIZE_EXP: usize = 1;

pub fn encode_page_size(page_size: usize) -> HashFileResult<u8> {
    validate_page_size(page_size)?;
    Ok(page_size.trailing_zeros() as u8)
}

pub fn decode_page_size(exponent: u8) -> HashFileResult<usize> {
    let page_size = 1usize
        .checked_shl(exponent as u32)
        .ok_or_else(|| HashFileError::Storage(format!("Bad page size exponent {exponent}")))?;
    validate_page_size(page_size).map_err(|_| {
        HashFileError::Storage(format!("Bad page size exponent {exponent}"))
    })?;
    Ok(page_size)
}

/// Fixed-size page I/O over one database file.
#[derive(Debug)]
pub struct DiskManager {
    path: PathBuf,
    file_type: DBFileType,
    page_size: usize,
    num_pages: AtomicU32,
    // Only one thread may seek and transfer at a time.
    db_file: Mutex<File>,
}

impl DiskManager {
    /// Creates a new file holding only page 0, tagged with its type and page size.
    pub fn create(
        path: impl AsRef<Path>,
        file_type: DBFileType,
        page_size: usize,
    ) -> HashFileResult<Self> {
        let path = path.as_ref();
        let exponent = encode_page_size(page_size)?;
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        let mut first = vec![0u8; page_size];
        first[OFFSET_FILE_TYPE] = file_type.tag();
        first[OFFSET_PAGE_SIZE_EXP] = exponent;
        file.write_all(&first)?;
        info!(
            "Created {} file {:?} with page size {}",
            file_type, path, page_size
        );

        Ok(Self {
            path: path.to_path_buf(),
            file_type,
            page_size,
            num_pages: AtomicU32::new(1),
            db_file: Mutex::new(file),
        })
    }

    pub fn open(path: impl AsRef<Path>) -> HashFileResult<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new().read(true).write(true).open(path)?;

        let mut tag = [0u8; 2];
        file.read_exact(&mut tag)?;
        let file_type = DBFileType::from_tag(tag[OFFSET_FILE_TYPE])?;
        let page_size = decode_page_size(tag[OFFSET_PAGE_SIZE_EXP])?;

        let len = file.metadata()?.len();
        if len % page_size as u64 != 0 {
            return Err(HashFileError::Storage(format!(
                "File {:?} length {} is not a multiple of page size {}",
                path, len, page_size
            )));
        }
        let num_pages = PageNo::try_from(len / page_size as u64).map_err(|_| {
            HashFileError::Storage(format!("File {:?} has too many pages", path))
        })?;
        info!(
            "Opened {} file {:?}: {} pages of {} bytes",
            file_type, path, num_pages, page_size
        );

        Ok(Self {
            path: path.to_path_buf(),
            file_type,
            page_size,
            num_pages: AtomicU32::new(num_pages),
            db_file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_type(&self) -> DBFileType {
        self.file_type
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn num_pages(&self) -> PageNo {
        self.num_pages.load(Ordering::SeqCst)
    }

    pub fn read_page(&self, page_no: PageNo) -> HashFileResult<BytesMut> {
        self.check_page(page_no)?;
        let mut buf = BytesMut::zeroed(self.page_size);
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(self.page_start(page_no)))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn write_page(&self, page_no: PageNo, data: &[u8]) -> HashFileResult<()> {
        self.check_page(page_no)?;
        if data.len() != self.page_size {
            return Err(HashFileError::Internal(format!(
                "Page buffer of {} bytes written to a file of {}-byte pages",
                data.len(),
                self.page_size
            )));
        }
        let mut file = self.db_file.lock();
        file.seek(SeekFrom::Start(self.page_start(page_no)))?;
        file.write_all(data)?;
        Ok(())
    }

    /// Grows the file with zeroed pages until it holds `page_count` pages.
    pub fn extend_to(&self, page_count: PageNo) -> HashFileResult<()> {
        let mut file = self.db_file.lock();
        let current = self.num_pages.load(Ordering::SeqCst);
        if page_count <= current {
            return Ok(());
        }
        let zeros = vec![0u8; self.page_size];
        file.seek(SeekFrom::Start(self.page_start(current)))?;
        for _ in current..page_count {
            file.write_all(&zeros)?;
        }
        self.num_pages.store(page_count, Ordering::SeqCst);
        debug!(
            "Extended {:?} from {} to {} pages",
            self.path, current, page_count
        );
        Ok(())
    }

    pub fn sync(&self) -> HashFileResult<()> {
        self.db_file.lock().sync_data()?;
        Ok(())
    }

    fn check_page(&self, page_no: PageNo) -> HashFileResult<()> {
        if page_no >= self.num_pages() {
            return Err(HashFileError::Storage(format!(
                "Page {} is past the end of {:?} ({} pages)",
                page_no,
                self.path,
                self.num_pages()
            )));
        }
        Ok(())
    }

    fn page_start(&self, page_no: PageNo) -> u64 {
        page_no as u64 * self.page_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn create_writes_type_and_page_size() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("t.tbl");
        let disk = DiskManager::create(&path, DBFileType::LinearHash, 1024).unwrap();
        assert_eq!(disk.num_pages(), 1);
        let page = disk.read_page(0).unwrap();
        assert_eq!(page[0], 4);
        assert_eq!(page[1], 10);
        drop(disk);

        let reopened = DiskManager::open(&path).unwrap();
        assert_eq!(reopened.file_type(), DBFileType::LinearHash);
        assert_eq!(reopened.page_size(), 1024);
        assert_eq!(reopened.num_pages(), 1);

        assert!(DiskManager::create(&path, DBFileType::Heap, 1024).is_err());
    }

    #[test]
    fn write_read_and_extend() {
        let temp_dir = TempDir::new().unwrap();
        let disk =
            DiskManager::create(temp_dir.path().join("o.tbl"), DBFileType::Overflow, 512).unwrap();
        assert!(disk.read_page(1).is_err());

        disk.extend_to(4).unwrap();
        assert_eq!(disk.num_pages(), 4);
        assert!(disk.read_page(3).unwrap().iter().all(|b| *b == 0));

        let data = vec![0x5A; 512];
        disk.write_page(2, &data).unwrap();
        assert_eq!(&disk.read_page(2).unwrap()[..], &data[..]);
        assert!(disk.write_page(1, &[0u8; 100]).is_err());

        // Shrinking is a no-op.
        disk.extend_to(2).unwrap();
        assert_eq!(disk.num_pages(), 4);
    }

    #[test]
    fn page_size_exponent_is_validated() {
        assert_eq!(encode_page_size(4096).unwrap(), 12);
        assert_eq!(decode_page_size(16).unwrap(), 65536);
        assert!(encode_page_size(3000).is_err());
        assert!(decode_page_size(8).is_err());
        assert!(decode_page_size(200).is_err());
    }
}
