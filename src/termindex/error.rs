//! Term index errors.

use std::io;

use thiserror::Error;

use crate::termindex::document::DocId;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(DocId),
}

pub type IndexResult<T> = std::result::Result<T, IndexError>;
