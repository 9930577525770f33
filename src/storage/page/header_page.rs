use crate::error::{HashFileError, HashFileResult};
use crate::storage::codec::CommonCodec;

pub const OFFSET_NEXT: usize = 2;
pub const OFFSET_LEVEL: usize = 4;
pub const OFFSET_INITIAL_BUCKETS: usize = 6;
pub const OFFSET_SCHEMA_SIZE: usize = 8;
pub const OFFSET_HASH_COLUMNS_SIZE: usize = 10;
pub const OFFSET_STATS_SIZE: usize = 12;
pub const OFFSET_SCHEMA_START: usize = 14;

/// Largest bucket count whose split frontier still fits the u16 `next` field.
pub const MAX_BUCKETS: u64 = 1 << 16;

/// Linear hashing split state, loaded from the header once per operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderState {
    pub initial_buckets: u16,
    pub level: u16,
    /// Next bucket to split at the current level.
    pub next: u16,
}

impl HeaderState {
    pub fn new(initial_buckets: u16) -> Self {
        Self {
            initial_buckets,
            level: 0,
            next: 0,
        }
    }

    /// Buckets per round at the current level: `N * 2^level`.
    pub fn bucket_count(&self) -> u64 {
        (self.initial_buckets as u64)
            .checked_shl(self.level as u32)
            .unwrap_or(u64::MAX)
    }

    /// Buckets that currently exist, split buckets included.
    pub fn total_buckets(&self) -> u64 {
        self.bucket_count() + self.next as u64
    }

    /// Moves the split frontier past the bucket that was just split.
    pub fn advance_split(&mut self) -> HashFileResult<()> {
        if self.next as u64 + 1 == self.bucket_count() {
            let doubled = self.bucket_count() * 2;
            if doubled > MAX_BUCKETS {
                return Err(HashFileError::Storage(format!(
                    "linear hash file cannot grow past {} buckets",
                    MAX_BUCKETS
                )));
            }
            self.next = 0;
            self.level += 1;
        } else {
            self.next += 1;
        }
        Ok(())
    }
}

/// Header page (page 0 of the primary file).
///
/// Fixed u16 fields are followed by the schema blob, the hash column indices
/// (u16 each) and the statistics blob.
#[derive(Debug)]
pub struct HeaderPage<T> {
    data: T,
}

impl<T: AsRef<[u8]>> HeaderPage<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    fn read(&self, offset: usize) -> u16 {
        CommonCodec::read_u16_at(self.data.as_ref(), offset)
    }

    pub fn state(&self) -> HeaderState {
        HeaderState {
            initial_buckets: self.read(OFFSET_INITIAL_BUCKETS),
            level: self.read(OFFSET_LEVEL),
            next: self.read(OFFSET_NEXT),
        }
    }

    fn section(&self, start: usize, len: usize) -> HashFileResult<&[u8]> {
        self.data.as_ref().get(start..start + len).ok_or_else(|| {
            HashFileError::Storage(format!(
                "header section [{}, {}) is past the page end",
                start,
                start + len
            ))
        })
    }

    fn schema_size(&self) -> usize {
        self.read(OFFSET_SCHEMA_SIZE) as usize
    }

    fn hash_columns_size(&self) -> usize {
        self.read(OFFSET_HASH_COLUMNS_SIZE) as usize
    }

    pub fn schema_bytes(&self) -> HashFileResult<&[u8]> {
        self.section(OFFSET_SCHEMA_START, self.schema_size())
    }

    pub fn hash_columns(&self) -> HashFileResult<Vec<u16>> {
        let start = OFFSET_SCHEMA_START + self.schema_size();
        let bytes = self.section(start, self.hash_columns_size())?;
        Ok(bytes
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect())
    }

    pub fn stats_bytes(&self) -> HashFileResult<&[u8]> {
        let start = OFFSET_SCHEMA_START + self.schema_size() + self.hash_columns_size();
        self.section(start, self.read(OFFSET_STATS_SIZE) as usize)
    }
}

impl<T: AsRef<[u8]> + AsMut<[u8]>> HeaderPage<T> {
    fn write(&mut self, offset: usize, value: u16) {
        CommonCodec::write_u16_at(self.data.as_mut(), offset, value);
    }

    pub fn set_state(&mut self, state: &HeaderState) {
        self.write(OFFSET_NEXT, state.next);
        self.write(OFFSET_LEVEL, state.level);
        self.write(OFFSET_INITIAL_BUCKETS, state.initial_buckets);
    }

    /// Rewrites the variable-length sections. Fails without touching the
    /// page if they do not fit.
    pub fn write_metadata(
        &mut self,
        schema: &[u8],
        hash_columns: &[u16],
        stats: &[u8],
    ) -> HashFileResult<()> {
        let columns_size = hash_columns.len() * 2;
        let total = OFFSET_SCHEMA_START + schema.len() + columns_size + stats.len();
        let page_size = self.data.as_ref().len();
        if total > page_size {
            return Err(HashFileError::Storage(format!(
                "table metadata of {} bytes does not fit in a {}-byte header page",
                total, page_size
            )));
        }
        let to_u16 = |len: usize| {
            u16::try_from(len).map_err(|_| {
                HashFileError::Storage(format!("metadata section of {} bytes is too long", len))
            })
        };
        let (schema_len, columns_len, stats_len) = (
            to_u16(schema.len())?,
            to_u16(columns_size)?,
            to_u16(stats.len())?,
        );

        self.write(OFFSET_SCHEMA_SIZE, schema_len);
        self.write(OFFSET_HASH_COLUMNS_SIZE, columns_len);
        self.write(OFFSET_STATS_SIZE, stats_len);

        let mut encoded = Vec::with_capacity(total - OFFSET_SCHEMA_START);
        encoded.extend_from_slice(schema);
        for col in hash_columns {
            encoded.extend(CommonCodec::encode_u16(*col));
        }
        encoded.extend_from_slice(stats);
        let bytes = self.data.as_mut();
        bytes[OFFSET_SCHEMA_START..total].copy_from_slice(&encoded);
        bytes[total..].fill(0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_split_wraps_at_level_end() {
        let mut state = HeaderState::new(3);
        assert_eq!(state.bucket_count(), 3);
        state.advance_split().unwrap();
        state.advance_split().unwrap();
        assert_eq!((state.level, state.next), (0, 2));
        state.advance_split().unwrap();
        assert_eq!((state.level, state.next), (1, 0));
        assert_eq!(state.bucket_count(), 6);
        assert_eq!(state.total_buckets(), 6);
    }

    #[test]
    fn advance_split_stops_at_max_buckets() {
        let mut state = HeaderState {
            initial_buckets: 1,
            level: 16,
            next: u16::MAX,
        };
        assert!(state.advance_split().is_err());
        state.next = 5;
        state.advance_split().unwrap();
        assert_eq!(state.next, 6);
    }

    #[test]
    fn header_round_trip() {
        let mut page = HeaderPage::new(vec![0u8; 512]);
        page.data[0] = 4;
        let state = HeaderState {
            initial_buckets: 3,
            level: 2,
            next: 5,
        };
        page.set_state(&state);
        page.write_metadata(b"schema", &[1, 0], b"stats!").unwrap();

        assert_eq!(page.state(), state);
        assert_eq!(page.schema_bytes().unwrap(), b"schema");
        assert_eq!(page.hash_columns().unwrap(), vec![1, 0]);
        assert_eq!(page.stats_bytes().unwrap(), b"stats!");
        assert_eq!(page.data[0], 4);

        // Shorter metadata clears the old tail.
        page.write_metadata(b"s", &[2], b"").unwrap();
        assert_eq!(page.hash_columns().unwrap(), vec![2]);
        assert!(page.stats_bytes().unwrap().is_empty());
        assert!(page.data[OFFSET_SCHEMA_START + 3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn oversized_metadata_is_rejected() {
        let mut page = HeaderPage::new(vec![0u8; 512]);
        let schema = vec![7u8; 500];
        assert!(page.write_metadata(&schema, &[0], b"").is_err());
        assert!(page.schema_bytes().unwrap().is_empty());
    }
}
