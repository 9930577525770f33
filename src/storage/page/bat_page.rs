use crate::error::{HashFileError, HashFileResult};
use crate::storage::codec::CommonCodec;

pub const OFFSET_PREFIX_LEN: usize = 2;
pub const OFFSET_TABLE_START: usize = 4;
pub const ADDR_SIZE: usize = 2;

/// Longest hash prefix whose directory fits in a page of `page_size` bytes.
pub fn max_prefix_length(page_size: usize) -> u16 {
    let entries = page_size.saturating_sub(OFFSET_TABLE_START) / ADDR_SIZE;
    // floor(log2(entries)), bounded by the width of a hash.
    match entries {
        0 => 0,
        n => (usize::BITS - 1 - n.leading_zeros()).min(u32::BITS) as u16,
    }
}

/// Bucket address table of an extendible hash file: maps the leading
/// `prefix_len` bits of a hash to a bucket page number.
///
/// Byte 0 holds the file type and byte 1 the page size exponent, like every
/// page 0.
#[derive(Debug)]
pub struct BatPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> BatPage<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    /// Stored prefix length, rejected when its directory cannot fit the page.
    pub fn prefix_length(&self) -> HashFileResult<u16> {
        let page_size = self.data.as_ref().len();
        let len = CommonCodec::read_u16_at(self.data.as_ref(), OFFSET_PREFIX_LEN);
        if len > max_prefix_length(page_size) {
            return Err(HashFileError::Storage(format!(
                "stored prefix length {} does not fit a {}-byte page",
                len, page_size
            )));
        }
        Ok(len)
    }

    pub fn num_entries(&self) -> HashFileResult<usize> {
        Ok(1usize << self.prefix_length()?)
    }

    fn prefix_of(&self, hash: u32) -> HashFileResult<usize> {
        Ok(match self.prefix_length()? {
            0 => 0,
            len => (hash >> (u32::BITS - len as u32)) as usize,
        })
    }

    pub fn bucket(&self, prefix: usize) -> HashFileResult<u16> {
        self.check_prefix(prefix)?;
        Ok(CommonCodec::read_u16_at(
            self.data.as_ref(),
            OFFSET_TABLE_START + prefix * ADDR_SIZE,
        ))
    }

    pub fn bucket_for_hash(&self, hash: u32) -> HashFileResult<u16> {
        self.bucket(self.prefix_of(hash)?)
    }

    fn check_prefix(&self, prefix: usize) -> HashFileResult<()> {
        let len = self.prefix_length()?;
        if prefix >= 1usize << len {
            return Err(HashFileError::Storage(format!(
                "prefix {} is out of range for prefix length {}",
                prefix, len
            )));
        }
        Ok(())
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> BatPage<T> {
    pub fn set_prefix_length(&mut self, len: u16) -> HashFileResult<()> {
        let page_size = self.data.as_ref().len();
        if len > max_prefix_length(page_size) {
            return Err(HashFileError::Storage(format!(
                "prefix length {} needs a larger page than {} bytes",
                len, page_size
            )));
        }
        CommonCodec::write_u16_at(self.data.as_mut(), OFFSET_PREFIX_LEN, len);
        Ok(())
    }

    pub fn set_bucket(&mut self, prefix: usize, bucket: u16) -> HashFileResult<()> {
        self.check_prefix(prefix)?;
        CommonCodec::write_u16_at(
            self.data.as_mut(),
            OFFSET_TABLE_START + prefix * ADDR_SIZE,
            bucket,
        );
        Ok(())
    }

    /// Grows the prefix by one bit. Entry `i` is copied into `2i` and
    /// `2i + 1`, so every hash still maps to the same bucket.
    pub fn double_directory(&mut self) -> HashFileResult<()> {
        let old_len = self.prefix_length()?;
        let old_entries = self.num_entries()?;
        self.set_prefix_length(old_len + 1)?;
        for prefix in (0..old_entries).rev() {
            let bucket = self.bucket(prefix)?;
            self.set_bucket(2 * prefix, bucket)?;
            self.set_bucket(2 * prefix + 1, bucket)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_buckets() {
        let mut page = BatPage::new(vec![0u8; 8192]);
        page.set_prefix_length(2).unwrap();
        assert_eq!(page.prefix_length().unwrap(), 2);

        page.set_bucket(0, 1).unwrap();
        page.set_bucket(1, 65535).unwrap();
        page.set_bucket(2, 0).unwrap();
        page.set_bucket(3, 512).unwrap();
        assert!(page.set_bucket(4, 9).is_err());

        assert_eq!(page.bucket_for_hash(0 << 30).unwrap(), 1);
        assert_eq!(page.bucket_for_hash(1 << 30).unwrap(), 65535);
        assert_eq!(page.bucket_for_hash(2 << 30).unwrap(), 0);
        assert_eq!(page.bucket_for_hash(3 << 30).unwrap(), 512);
        assert_eq!(page.bucket_for_hash((1 << 30) | 0x1234).unwrap(), 65535);
    }

    #[test]
    fn zero_prefix_maps_everything_to_first_entry() {
        let mut page = BatPage::new(vec![0u8; 512]);
        page.set_bucket(0, 42).unwrap();
        assert_eq!(page.bucket_for_hash(0).unwrap(), 42);
        assert_eq!(page.bucket_for_hash(u32::MAX).unwrap(), 42);
        assert!(page.set_bucket(1, 1).is_err());
    }

    #[test]
    fn prefix_length_bounded_by_page() {
        // (512 - 4) / 2 = 254 entries -> 7 bits.
        assert_eq!(max_prefix_length(512), 7);
        assert_eq!(max_prefix_length(8192), 11);
        let mut page = BatPage::new(vec![0u8; 512]);
        page.set_prefix_length(7).unwrap();
        assert!(page.set_prefix_length(8).is_err());
        page.set_bucket(127, 3).unwrap();
    }

    #[test]
    fn doubling_preserves_mapping() {
        let mut page = BatPage::new(vec![0u8; 1024]);
        page.set_prefix_length(1).unwrap();
        page.set_bucket(0, 10).unwrap();
        page.set_bucket(1, 20).unwrap();
        let hashes = [0u32, 0x4000_0000, 0x8000_0000, 0xC000_0001];
        let before = hashes.map(|h| page.bucket_for_hash(h).unwrap());

        page.double_directory().unwrap();
        assert_eq!(page.prefix_length().unwrap(), 2);
        assert_eq!(hashes.map(|h| page.bucket_for_hash(h).unwrap()), before);
        assert_eq!((page.bucket(2).unwrap(), page.bucket(3).unwrap()), (20, 20));
    }

    #[test]
    fn corrupt_prefix_length_is_an_error() {
        let mut bytes = vec![0u8; 512];
        CommonCodec::write_u16_at(&mut bytes, OFFSET_PREFIX_LEN, 40);
        let page = BatPage::new(bytes.clone());
        assert!(matches!(page.prefix_length(), Err(HashFileError::Storage(_))));
        assert!(page.bucket_for_hash(u32::MAX).is_err());
        assert!(page.num_entries().is_err());

        // Fits a hash but not a 512-byte page.
        CommonCodec::write_u16_at(&mut bytes, OFFSET_PREFIX_LEN, 8);
        let page = BatPage::new(bytes);
        assert!(page.bucket_for_hash(0).is_err());
        assert!(page.bucket(300).is_err());
    }
}
