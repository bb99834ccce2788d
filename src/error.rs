use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BookError>;

#[derive(Debug, Error)]
pub enum BookError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed XML in {name} near byte {position}: {message}")]
    Xml {
        name: String,
        position: usize,
        message: String,
    },

    #[error("no package document (OPF) found under {0}")]
    MissingPackage(PathBuf),

    #[error("unknown file in book: {0}")]
    UnknownFile(String),
}

impl BookError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BookError::Io {
            path: path.into(),
            source,
        }
    }
}
