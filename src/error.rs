use thiserror::Error;

use crate::storage::PageNo;

pub type HashFileResult<T, E = HashFileError> = Result<T, E>;

#[derive(Debug, Error)]
pub enum HashFileError {
    #[error("Not support: {0}")]
    NotSupport(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("Plan error: {0}")]
    Plan(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid file pointer: {0}")]
    InvalidPointer(String),

    #[error("Tuple of {size} bytes cannot fit in a {page_size}-byte page")]
    TupleTooLarge { size: usize, page_size: usize },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Raised by the page cache when a page past the end of a file is
    /// requested without creation. Iteration folds it into "no more tuples".
    #[error("Page {page_no} does not exist in file {file}")]
    EndOfFile { file: String, page_no: PageNo },
}

impl HashFileError {
    pub fn is_end_of_file(&self) -> bool {
        matches!(self, HashFileError::EndOfFile { .. })
    }
}
