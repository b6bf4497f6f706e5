use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed XML in {path} at byte {position}: {source}")]
    Xml {
        path: PathBuf,
        position: u64,
        #[source]
        source: quick_xml::Error,
    },

    #[error("malformed XML in {path}: {message}")]
    Structure { path: PathBuf, message: String },

    #[error("found {instruments} instrument records but {issuers} issuer values")]
    PairingMismatch { instruments: usize, issuers: usize },

    #[error("instrument record {index} (id {id:?}) has no issuer in its record")]
    MissingIssuer { index: usize, id: Option<String> },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected CSV header in {path}: {found}")]
    UnexpectedHeader { path: PathBuf, found: String },

    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl TransformError {
    /// True for failures caused by the input document not being well-formed XML.
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Xml { .. } | Self::Structure { .. })
    }
}
