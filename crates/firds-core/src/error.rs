// crates/firds-core/src/error.rs

use std::path::PathBuf;

use firds_bucket::BucketError;
use firds_fetch::FetchError;
use firds_parser::TransformError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid value for {var}: {message}")]
    Config { var: &'static str, message: String },

    #[error("File I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fetch stage failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("archive {archive} does not contain {entry}")]
    MissingEntry { archive: PathBuf, entry: String },

    #[error("Transform stage failed: {0}")]
    Transform(#[from] TransformError),

    #[error("Storage operation failed: {0}")]
    Bucket(#[from] BucketError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
