//! Error taxonomy for dataset provisioning

use std::path::PathBuf;

use datamine_core::StreamError;

use crate::collection::Collection;

/// Result type alias for store operations
pub type Result<T, E = DatasetError> = std::result::Result<T, E>;

/// Everything that can go wrong while resolving, checking or fetching a dataset.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    // Configuration
    #[error("Dataset `{name}` is not part of the collection. Available datasets: {available}")]
    UnknownDataset { name: String, available: String },

    #[error("Dataset {0} has no entry in the dataset registry")]
    NotConfigured(Collection),

    #[error("Cannot derive a file name from URL `{url}`")]
    NoFileName { url: String },

    #[error("Invalid dataset registry {}: {reason}", path.display())]
    InvalidRegistry { path: PathBuf, reason: String },

    // Manifest format
    #[error(
        "Invalid format for the integrity file at line {line_number}: `{line}`. \
         Expected <sha_256> <2-spaces> <relative_file_path>."
    )]
    ManifestFormat { line_number: usize, line: String },

    #[error("Invalid hex SHA256: `{digest}`")]
    InvalidDigest { digest: String },

    // Local filesystem
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The cache directory `{}` is not a directory", .0.display())]
    CacheRootNotDirectory(PathBuf),

    #[error("Cannot determine the home directory of the current user")]
    HomeDirUnavailable,

    // Network
    #[error("Failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: StreamError,
    },

    // Content
    #[error("Downloaded file is corrupt: {} (expected SHA256 {expected}, got {actual})", path.display())]
    Corrupt {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Cannot unpack archive {}: {reason}", path.display())]
    Archive { path: PathBuf, reason: String },
}

impl DatasetError {
    /// Attach a path to a bare I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Fetched fine, but the bytes are not the expected ones.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }

    /// Could not fetch at all (transport failure or non-success status).
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Fetch { .. })
    }

    /// Problems with the registry or the dataset name, never worth retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownDataset { .. }
                | Self::NotConfigured(_)
                | Self::NoFileName { .. }
                | Self::InvalidRegistry { .. }
        )
    }
}
