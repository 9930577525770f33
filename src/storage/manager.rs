use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use log::info;
use tempfile::TempDir;

use crate::buffer::BufferManager;
use crate::catalog::SchemaRef;
use crate::config::{BufferPoolConfig, StorageType, TableProperties};
use crate::error::{HashFileError, HashFileResult};
use crate::storage::file_type::DBFileType;
use crate::storage::linhash::{primary_path, LinHashTupleFile};
use crate::storage::tuple_file::TupleFile;

/// Owns the page cache and the tables stored under one directory.
pub struct StorageManager {
    _temp_dir: Option<TempDir>,
    base_dir: PathBuf,
    buffer: Arc<BufferManager>,
    tables: DashMap<String, Arc<dyn TupleFile>>,
}

impl StorageManager {
    pub fn new(base_dir: impl AsRef<Path>, config: BufferPoolConfig) -> HashFileResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self {
            _temp_dir: None,
            base_dir,
            buffer: Arc::new(BufferManager::new(config)),
            tables: DashMap::new(),
        })
    }

    /// Storage in a fresh temporary directory removed on drop.
    pub fn new_temp() -> HashFileResult<Self> {
        Self::new_temp_with_config(BufferPoolConfig::default())
    }

    pub fn new_temp_with_config(config: BufferPoolConfig) -> HashFileResult<Self> {
        let temp_dir = TempDir::new()?;
        let mut manager = Self::new(temp_dir.path(), config)?;
        manager._temp_dir = Some(temp_dir);
        Ok(manager)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn buffer_manager(&self) -> Arc<BufferManager> {
        self.buffer.clone()
    }

    pub fn create_table(
        &self,
        name: &str,
        schema: SchemaRef,
        props: &TableProperties,
    ) -> HashFileResult<Arc<dyn TupleFile>> {
        if self.tables.contains_key(name) || primary_path(&self.base_dir, name).exists() {
            return Err(HashFileError::Storage(format!("Table {name} already exists")));
        }
        let table: Arc<dyn TupleFile> = match props.storage {
            StorageType::LinearHash => Arc::new(LinHashTupleFile::create(
                &self.buffer,
                &self.base_dir,
                name,
                schema,
                props,
            )?),
            other => {
                return Err(HashFileError::NotSupport(format!(
                    "{other} storage is not implemented"
                )))
            }
        };
        self.tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    /// Opens an existing table, choosing the engine from the file type tag
    /// of its primary file.
    pub fn open_table(&self, name: &str) -> HashFileResult<Arc<dyn TupleFile>> {
        if let Some(table) = self.tables.get(name) {
            return Ok(table.value().clone());
        }
        let primary = self.buffer.open_file(primary_path(&self.base_dir, name))?;
        let table: Arc<dyn TupleFile> = match primary.file_type {
            DBFileType::LinearHash => Arc::new(LinHashTupleFile::open(&self.buffer, primary)?),
            other => {
                return Err(HashFileError::NotSupport(format!(
                    "Tables stored as {other} files cannot be opened"
                )))
            }
        };
        info!("Opened table {} from {}", name, self.base_dir.display());
        self.tables.insert(name.to_string(), table.clone());
        Ok(table)
    }

    pub fn drop_table(&self, name: &str) -> HashFileResult<()> {
        Err(HashFileError::UnsupportedOperation(format!(
            "Table files cannot be deleted (table {name})"
        )))
    }

    /// Writes every dirty page back to disk.
    pub fn flush(&self) -> HashFileResult<()> {
        self.buffer.flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Column, DataType, Schema};
    use crate::storage::tuple::Tuple;

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Column::new("k", DataType::Int64, false),
            Column::new("v", DataType::Varchar(None), true),
        ]))
    }

    #[test]
    fn create_then_reopen_in_new_manager() {
        let dir = tempfile::tempdir().unwrap();
        let tuple = Tuple::new(schema(), vec![42i64.into(), "answer".into()]);
        {
            let storage = StorageManager::new(dir.path(), BufferPoolConfig::default()).unwrap();
            let table = storage
                .create_table("facts", schema(), &TableProperties::lin_hash(vec![0]))
                .unwrap();
            table.add_tuple(&tuple).unwrap();
            assert!(storage
                .create_table("facts", schema(), &TableProperties::lin_hash(vec![0]))
                .is_err());
            storage.flush().unwrap();
        }

        let storage = StorageManager::new(dir.path(), BufferPoolConfig::default()).unwrap();
        let table = storage.open_table("facts").unwrap();
        assert_eq!(table.file_type(), DBFileType::LinearHash);
        assert!(table.as_hashed().is_some());
        assert_eq!(table.get_first_tuple().unwrap().unwrap().tuple, tuple);
        assert!(Arc::ptr_eq(&table, &storage.open_table("facts").unwrap()));
    }

    #[test]
    fn unsupported_storage_and_drop() {
        let storage = StorageManager::new_temp().unwrap();
        let props = TableProperties::lin_hash(vec![0]).with_storage(StorageType::Heap);
        assert!(matches!(
            storage.create_table("h", schema(), &props),
            Err(HashFileError::NotSupport(_))
        ));
        assert!(matches!(
            storage.drop_table("h"),
            Err(HashFileError::UnsupportedOperation(_))
        ));
        assert!(storage.open_table("missing").is_err());
    }
}
