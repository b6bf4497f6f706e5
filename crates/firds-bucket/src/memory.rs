use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::{check_container_name, resolve_key, BucketError, ContainerStore};

#[derive(Debug, Default)]
struct MemoryContainer {
    region: Option<String>,
    objects: BTreeMap<String, Bytes>,
}

#[derive(Debug, Default)]
struct MemoryState {
    containers: BTreeMap<String, MemoryContainer>,
    foreign: BTreeSet<String>,
}

/// In-process container store with the same provisioning rules as the S3
/// adapter. Used for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryContainerStore {
    state: Mutex<MemoryState>,
}

impl MemoryContainerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `name` as taken by another account; provisioning it conflicts.
    pub fn with_foreign_container(self, name: impl Into<String>) -> Self {
        self.lock().foreign.insert(name.into());
        self
    }

    pub fn object(&self, container: &str, key: &str) -> Option<Bytes> {
        self.lock()
            .containers
            .get(container)
            .and_then(|c| c.objects.get(key).cloned())
    }

    pub fn object_keys(&self, container: &str) -> Vec<String> {
        self.lock()
            .containers
            .get(container)
            .map(|c| c.objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// `None` when the container does not exist.
    pub fn container_region(&self, name: &str) -> Option<Option<String>> {
        self.lock()
            .containers
            .get(name)
            .map(|container| container.region.clone())
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_locked(
        state: &mut MemoryState,
        name: &str,
        region: Option<&str>,
    ) -> Result<bool, BucketError> {
        check_container_name(name)?;
        if state.foreign.contains(name) {
            return Err(BucketError::ContainerConflict(name.to_string()));
        }
        if state.containers.contains_key(name) {
            return Ok(false);
        }
        state.containers.insert(
            name.to_string(),
            MemoryContainer {
                region: region.map(str::to_string),
                objects: BTreeMap::new(),
            },
        );
        Ok(true)
    }
}

#[async_trait]
impl ContainerStore for MemoryContainerStore {
    async fn ensure_container(
        &self,
        name: &str,
        region: Option<&str>,
    ) -> Result<bool, BucketError> {
        let created = Self::ensure_locked(&mut self.lock(), name, region)?;
        info!(container = name, created, "container ensured");
        Ok(created)
    }

    async fn publish(
        &self,
        local_path: &Path,
        container: &str,
        key: Option<&str>,
    ) -> Result<String, BucketError> {
        check_container_name(container)?;
        let key = resolve_key(local_path, key)?;
        let contents = tokio::fs::read(local_path)
            .await
            .map_err(|err| BucketError::publish(container, &key, err))?;

        let mut state = self.lock();
        Self::ensure_locked(&mut state, container, None)?;
        if let Some(target) = state.containers.get_mut(container) {
            target.objects.insert(key.clone(), Bytes::from(contents));
        }
        drop(state);

        info!(container, key = %key, path = %local_path.display(), "object stored");
        Ok(key)
    }

    async fn list_containers(&self) -> Result<Vec<String>, BucketError> {
        Ok(self.lock().containers.keys().cloned().collect())
    }
}
