use std::str::FromStr;

use derive_with::With;

use crate::catalog::Schema;
use crate::error::{HashFileError, HashFileResult};

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const MIN_PAGE_SIZE: usize = 512;
pub const MAX_PAGE_SIZE: usize = 65536;

#[derive(Debug, Clone, Copy)]
pub struct BufferPoolConfig {
    pub buffer_pool_size: usize,
    pub lru_k_k: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        BufferPoolConfig {
            buffer_pool_size: 5000,
            lru_k_k: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, With)]
pub struct LinHashConfig {
    /// Bucket count at level 0.
    pub initial_buckets: u16,
    pub page_size: usize,
}

impl Default for LinHashConfig {
    fn default() -> Self {
        LinHashConfig {
            initial_buckets: 3,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
pub enum StorageType {
    #[strum(serialize = "heap")]
    Heap,
    #[strum(serialize = "btree")]
    BTree,
    #[strum(serialize = "lin-hash")]
    LinearHash,
    #[strum(serialize = "ext-hash")]
    ExtendibleHash,
}

/// Table-creation properties, e.g.
/// `storage = 'lin-hash', pagesize = 4096, hashkey = '0, 1'`.
#[derive(Debug, Clone, PartialEq, Eq, With)]
pub struct TableProperties {
    pub storage: StorageType,
    /// Ordered column indices forming the hash key.
    pub hash_key: Vec<usize>,
    pub page_size: usize,
    pub initial_buckets: u16,
}

impl TableProperties {
    pub fn lin_hash(hash_key: Vec<usize>) -> Self {
        let defaults = LinHashConfig::default();
        Self {
            storage: StorageType::LinearHash,
            hash_key,
            page_size: defaults.page_size,
            initial_buckets: defaults.initial_buckets,
        }
    }

    pub fn from_options<'a>(
        options: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> HashFileResult<Self> {
        let mut props = Self::lin_hash(vec![]);
        let mut storage_seen = false;
        for (name, value) in options {
            let value = value.trim().trim_matches('\'');
            match name.trim().to_ascii_lowercase().as_str() {
                "storage" => {
                    props.storage = StorageType::from_str(value).map_err(|_| {
                        HashFileError::Plan(format!("Unknown storage type '{value}'"))
                    })?;
                    storage_seen = true;
                }
                "hashkey" => props.hash_key = parse_column_list(value)?,
                "pagesize" => {
                    props.page_size = value.parse::<usize>().map_err(|_| {
                        HashFileError::Plan(format!("Invalid page size '{value}'"))
                    })?;
                }
                "buckets" => {
                    props.initial_buckets = value.parse::<u16>().map_err(|_| {
                        HashFileError::Plan(format!("Invalid bucket count '{value}'"))
                    })?;
                }
                other => {
                    return Err(HashFileError::Plan(format!(
                        "Unknown table property '{other}'"
                    )))
                }
            }
        }
        if !storage_seen {
            props.storage = StorageType::Heap;
        }
        Ok(props)
    }

    pub fn validate(&self, schema: &Schema) -> HashFileResult<()> {
        validate_page_size(self.page_size)?;
        if self.storage != StorageType::LinearHash {
            return Ok(());
        }
        if self.hash_key.is_empty() {
            return Err(HashFileError::Plan(
                "lin-hash storage requires at least one hash key column".to_string(),
            ));
        }
        for (i, col) in self.hash_key.iter().enumerate() {
            if *col >= schema.column_count() {
                return Err(HashFileError::Plan(format!(
                    "Hash key column {col} out of range for {} columns",
                    schema.column_count()
                )));
            }
            if self.hash_key[..i].contains(col) {
                return Err(HashFileError::Plan(format!(
                    "Hash key column {col} listed twice"
                )));
            }
        }
        if self.initial_buckets == 0 {
            return Err(HashFileError::Plan(
                "Initial bucket count must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn validate_page_size(page_size: usize) -> HashFileResult<()> {
    if !page_size.is_power_of_two() || !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) {
        return Err(HashFileError::Plan(format!(
            "Page size {page_size} must be a power of two in [{MIN_PAGE_SIZE}, {MAX_PAGE_SIZE}]"
        )));
    }
    Ok(())
}

fn parse_column_list(value: &str) -> HashFileResult<Vec<usize>> {
    value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| HashFileError::Plan(format!("Invalid hash key column '{s}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("a", DataType::Int32, false),
            Column::new("b", DataType::Varchar(Some(20)), true),
        ])
    }

    #[test]
    fn parse_lin_hash_properties() {
        let props = TableProperties::from_options([
            ("storage", "'lin-hash'"),
            ("pagesize", "4096"),
            ("hashkey", "'0, 1'"),
        ])
        .unwrap();
        assert_eq!(props.storage, StorageType::LinearHash);
        assert_eq!(props.hash_key, vec![0, 1]);
        assert_eq!(props.page_size, 4096);
        props.validate(&schema()).unwrap();
    }

    #[test]
    fn reject_bad_properties() {
        assert!(TableProperties::from_options([("storage", "'nope'")]).is_err());
        assert!(TableProperties::from_options([("hashkey", "'x'")]).is_err());

        let props = TableProperties::lin_hash(vec![2]);
        assert!(props.validate(&schema()).is_err());
        let props = TableProperties::lin_hash(vec![]);
        assert!(props.validate(&schema()).is_err());
        let props = TableProperties::lin_hash(vec![0]).with_page_size(1000usize);
        assert!(props.validate(&schema()).is_err());
    }
}
