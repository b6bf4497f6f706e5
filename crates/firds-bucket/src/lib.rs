//! Object storage containers (S3 buckets) that receive the published CSV files.

mod memory;
mod s3;

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryContainerStore;
pub use s3::{S3Config, S3ContainerStore};

#[derive(Debug, Error)]
pub enum BucketError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("storage request failed: {0}")]
    Network(String),
    #[error("container '{0}' already exists and is owned by another account")]
    ContainerConflict(String),
    #[error("failed to publish {key} to {container}: {message}")]
    Publish {
        container: String,
        key: String,
        message: String,
    },
}

impl BucketError {
    fn network(err: impl fmt::Display) -> Self {
        Self::Network(err.to_string())
    }

    fn publish(container: &str, key: &str, err: impl fmt::Display) -> Self {
        Self::Publish {
            container: container.to_string(),
            key: key.to_string(),
            message: err.to_string(),
        }
    }
}

#[async_trait]
pub trait ContainerStore: Send + Sync {
    /// Creates `name` unless it already exists. Returns whether it was created.
    async fn ensure_container(&self, name: &str, region: Option<&str>)
        -> Result<bool, BucketError>;

    /// Uploads `local_path` into `container`, creating the container first when
    /// needed. The key defaults to the file's base name; the key used is returned.
    async fn publish(
        &self,
        local_path: &Path,
        container: &str,
        key: Option<&str>,
    ) -> Result<String, BucketError>;

    async fn list_containers(&self) -> Result<Vec<String>, BucketError>;
}

/// Object key used when none is given: the base name of `local_path`.
pub fn default_object_key(local_path: &Path) -> Result<String, BucketError> {
    local_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            BucketError::Configuration(format!(
                "cannot derive an object key from '{}'",
                local_path.display()
            ))
        })
}

fn resolve_key(local_path: &Path, key: Option<&str>) -> Result<String, BucketError> {
    match key {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => default_object_key(local_path),
    }
}

fn check_container_name(name: &str) -> Result<(), BucketError> {
    if name.trim().is_empty() {
        return Err(BucketError::Configuration(
            "container name cannot be empty".into(),
        ));
    }
    Ok(())
}

fn content_type_for(local_path: &Path) -> &'static str {
    match local_path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => "text/csv",
        _ => "application/octet-stream",
    }
}
