use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;
use parking_lot::RwLock;

use crate::buffer::{BufferManager, DBFile};
use crate::catalog::{Schema, SchemaRef, TableStats};
use crate::config::{StorageType, TableProperties};
use crate::error::{HashFileError, HashFileResult};
use crate::storage::file_type::DBFileType;
use crate::storage::linhash::LinHashTupleFile;
use crate::storage::page::{BucketPage, HeaderPage, HeaderState};

pub fn primary_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.tbl"))
}

pub fn overflow_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("ovflw_{name}.tbl"))
}

impl LinHashTupleFile {
    /// Creates both files of table `name` under `dir` with every level-0
    /// bucket page in place.
    pub fn create(
        buffer: &Arc<BufferManager>,
        dir: &Path,
        name: &str,
        schema: SchemaRef,
        props: &TableProperties,
    ) -> HashFileResult<Self> {
        if props.storage != StorageType::LinearHash {
            return Err(HashFileError::Plan(format!(
                "{} storage cannot back a linear hash file",
                props.storage
            )));
        }
        props.validate(&schema)?;

        let primary = buffer.create_file(
            primary_path(dir, name),
            DBFileType::LinearHash,
            props.page_size,
        )?;
        let overflow = buffer.create_file(
            overflow_path(dir, name),
            DBFileType::Overflow,
            props.page_size,
        )?;
        let file = Self {
            primary,
            overflow,
            stats: RwLock::new(TableStats::empty(&schema)),
            schema,
            hash_columns: props.hash_key.clone(),
            buffer: buffer.clone(),
        };

        {
            let mut guard = buffer.load_page(&file.primary, 0, false)?;
            HeaderPage::new(guard.data_mut()).set_state(&HeaderState::new(props.initial_buckets));
        }
        file.save_metadata()?;

        for page_no in 1..=props.initial_buckets as u32 {
            let mut guard = buffer.load_page(&file.primary, page_no, true)?;
            BucketPage::new(guard.data_mut()).init_new_page();
        }
        {
            let mut guard = buffer.load_page(&file.overflow, 0, false)?;
            BucketPage::new(guard.data_mut()).init_new_page();
        }

        info!(
            "Created linear hash table {} with {} buckets, {}-byte pages, hash key {:?}",
            name, props.initial_buckets, props.page_size, file.hash_columns
        );
        Ok(file)
    }

    /// Opens a table from its already registered primary file; the overflow
    /// file is found next to it.
    pub fn open(buffer: &Arc<BufferManager>, primary: DBFile) -> HashFileResult<Self> {
        if primary.file_type != DBFileType::LinearHash {
            return Err(HashFileError::Storage(format!(
                "{} is a {} file, not a linear hash file",
                primary.path.display(),
                primary.file_type
            )));
        }
        let dir = primary.path.parent().unwrap_or_else(|| Path::new("."));
        let overflow = buffer.open_file(overflow_path(dir, &primary.name))?;
        if overflow.file_type != DBFileType::Overflow {
            return Err(HashFileError::Storage(format!(
                "{} is a {} file, not an overflow file",
                overflow.path.display(),
                overflow.file_type
            )));
        }
        if overflow.page_size != primary.page_size {
            return Err(HashFileError::Storage(format!(
                "overflow file of {} uses {}-byte pages, primary uses {}",
                primary.name, overflow.page_size, primary.page_size
            )));
        }

        let (schema, hash_columns, stats) = {
            let guard = buffer.load_page_read(&primary, 0)?;
            let header = HeaderPage::new(guard.data());
            let schema: Schema = bincode::deserialize(header.schema_bytes()?)?;
            let stats: TableStats = bincode::deserialize(header.stats_bytes()?)?;
            let hash_columns = header
                .hash_columns()?
                .into_iter()
                .map(|col| col as usize)
                .collect::<Vec<usize>>();
            (schema, hash_columns, stats)
        };
        if hash_columns.is_empty() || hash_columns.iter().any(|col| *col >= schema.column_count()) {
            return Err(HashFileError::Storage(format!(
                "header of {} names invalid hash columns {:?}",
                primary.name, hash_columns
            )));
        }

        info!(
            "Opened linear hash table {} ({} columns, hash key {:?})",
            primary.name,
            schema.column_count(),
            hash_columns
        );
        Ok(Self {
            primary,
            overflow,
            schema: Arc::new(schema),
            hash_columns,
            stats: RwLock::new(stats),
            buffer: buffer.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType};
    use crate::config::BufferPoolConfig;
    use crate::storage::tuple::Tuple;
    use crate::storage::tuple_file::TupleFile;
    use crate::utils::scalar::ScalarValue;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Column::new("id", DataType::Int32, false),
            Column::new("name", DataType::Varchar(Some(32)), true),
        ]))
    }

    #[test]
    fn create_lays_out_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = Arc::new(BufferManager::new(BufferPoolConfig::default()));
        let props = TableProperties::lin_hash(vec![0]).with_initial_buckets(4u16);
        let file = LinHashTupleFile::create(&buffer, dir.path(), "t", schema(), &props).unwrap();

        assert_eq!(buffer.num_pages(file.primary_file()).unwrap(), 5);
        assert_eq!(file.overflow_page_count().unwrap(), 1);
        assert_eq!(file.header_state().unwrap(), HeaderState::new(4));
        assert!(dir.path().join("t.tbl").exists());
        assert!(dir.path().join("ovflw_t.tbl").exists());
        assert!(file.get_first_tuple().unwrap().is_none());
        assert!(file.verify().unwrap().is_empty());
    }

    #[test]
    fn create_rejects_other_storage() {
        let dir = tempfile::tempdir().unwrap();
        let buffer = Arc::new(BufferManager::new(BufferPoolConfig::default()));
        let props = TableProperties::lin_hash(vec![0]).with_storage(StorageType::Heap);
        assert!(LinHashTupleFile::create(&buffer, dir.path(), "t", schema(), &props).is_err());
        let props = TableProperties::lin_hash(vec![]);
        assert!(LinHashTupleFile::create(&buffer, dir.path(), "u", schema(), &props).is_err());
    }

    #[test]
    fn open_restores_header() {
        let dir = tempfile::tempdir().unwrap();
        let props = TableProperties::lin_hash(vec![1, 0]).with_page_size(1024usize);
        {
            let buffer = Arc::new(BufferManager::new(BufferPoolConfig::default()));
            let file =
                LinHashTupleFile::create(&buffer, dir.path(), "people", schema(), &props).unwrap();
            let tuple = Tuple::new(schema(), vec![1i32.into(), "ann".into()]);
            file.add_tuple(&tuple).unwrap();
            file.analyze().unwrap();
            buffer.flush_all().unwrap();
        }

        let buffer = Arc::new(BufferManager::new(BufferPoolConfig::default()));
        let primary = buffer.open_file(primary_path(dir.path(), "people")).unwrap();
        let file = LinHashTupleFile::open(&buffer, primary).unwrap();
        assert_eq!(file.schema(), schema());
        assert_eq!(file.hash_columns, vec![1, 0]);
        assert_eq!(file.stats().num_tuples, 1);
        assert_eq!(file.overflow_file().page_size, 1024);
        let first = file.get_first_tuple().unwrap().unwrap();
        assert_eq!(first.tuple.value(1).unwrap(), &ScalarValue::from("ann"));
    }
}
