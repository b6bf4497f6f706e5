use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {source}")]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} responded with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("archive is unreadable: {source}")]
    Archive {
        #[source]
        source: zip::result::ZipError,
    },

    #[error("archive entry '{name}' would extract outside the destination")]
    UnsafeEntry { name: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// Transport failures and unsuccessful HTTP responses.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Status { .. })
    }

    /// Corrupt archives and entries that cannot be extracted safely.
    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Archive { .. } | Self::UnsafeEntry { .. })
    }
}
