use thiserror::Error;

use super::types::{Oid, PageId};

/// Database error types
#[derive(Error, Debug)]
pub enum DbError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool exhausted: no free or evictable frames")]
    PoolExhausted,

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Disk scheduler error: {0}")]
    DiskScheduler(String),

    #[error("Tuple of {tuple_size} bytes does not fit in a page ({available} available)")]
    TupleTooLarge { tuple_size: usize, available: usize },

    #[error("Table {0} not found")]
    TableNotFound(Oid),

    #[error("Index {0} not found")]
    IndexNotFound(Oid),

    #[error("Transaction aborted")]
    TransactionAborted,

    #[error("Execution error: {0}")]
    Execution(String),
}

pub type Result<T> = std::result::Result<T, DbError>;
