use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort a run. Anything scoped to a single dataset is handled
/// inside the processor and never reaches this type.
#[derive(Error, Debug)]
pub enum EtlError {
    /// Metadata record exists but cannot be read back as a timestamp.
    #[error("run metadata at {} is corrupt: {reason}", path.display())]
    MetadataCorrupt { path: PathBuf, reason: String },

    /// Catalog endpoint unreachable, returned an error status, or sent garbage.
    #[error("dataset catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;
