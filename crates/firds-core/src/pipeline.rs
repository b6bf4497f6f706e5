use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use firds_bucket::{BucketError, ContainerStore, S3ContainerStore};
use firds_fetch::{download_archive, http_client, unpack};
use firds_parser::{transform_with, TransformReport};
use reqwest::Client;
use tracing::{error, info};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub archive: PathBuf,
    pub extracted: Vec<PathBuf>,
    pub xml: PathBuf,
    pub csv: PathBuf,
    pub report: TransformReport,
    pub container: String,
    pub object_key: String,
}

/// Fetch, transform and publish, strictly in that order. A failing stage
/// stops the run; later stages never start.
pub struct Pipeline {
    config: PipelineConfig,
    http: Client,
    store: Arc<dyn ContainerStore>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, store: Arc<dyn ContainerStore>) -> Result<Self> {
        let http = http_client(config.fetch_timeout)?;
        Ok(Self {
            config,
            http,
            store,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<PipelineSummary> {
        info!(url = %self.config.source_url, work_dir = %self.config.work_dir.display(), "pipeline started");

        let (archive, extracted) = self.fetch_stage().await.inspect_err(stage_failed("fetch"))?;
        let xml = self.locate_entry(&archive, &extracted).inspect_err(stage_failed("fetch"))?;
        let csv = self.config.csv_path();
        let report = transform_with(&xml, &csv, &self.config.transform)
            .map_err(PipelineError::from)
            .inspect_err(stage_failed("transform"))?;
        let object_key = self.publish_stage(&csv).await.inspect_err(stage_failed("publish"))?;

        info!(
            rows = report.rows,
            container = %self.config.container,
            key = %object_key,
            "pipeline finished"
        );

        Ok(PipelineSummary {
            archive,
            extracted,
            xml,
            csv,
            report,
            container: self.config.container.clone(),
            object_key,
        })
    }

    async fn fetch_stage(&self) -> Result<(PathBuf, Vec<PathBuf>)> {
        let work_dir = &self.config.work_dir;
        std::fs::create_dir_all(work_dir).map_err(|source| PipelineError::Io {
            path: work_dir.clone(),
            source,
        })?;

        let archive = self.config.archive_path();
        let payload = download_archive(&self.http, &self.config.source_url, &archive).await?;
        let extracted = unpack(&payload, work_dir)?;
        Ok((archive, extracted))
    }

    fn locate_entry(&self, archive: &Path, extracted: &[PathBuf]) -> Result<PathBuf> {
        let entry = OsStr::new(&self.config.xml_entry);
        extracted
            .iter()
            .find(|path| path.file_name() == Some(entry))
            .cloned()
            .ok_or_else(|| PipelineError::MissingEntry {
                archive: archive.to_path_buf(),
                entry: self.config.xml_entry.clone(),
            })
    }

    async fn publish_stage(&self, csv: &Path) -> Result<String> {
        let container = &self.config.container;
        self.store
            .ensure_container(container, self.config.region.as_deref())
            .await?;
        let key = self
            .store
            .publish(csv, container, self.config.object_key.as_deref())
            .await?;
        Ok(key)
    }
}

fn stage_failed(stage: &'static str) -> impl Fn(&PipelineError) {
    move |err: &PipelineError| error!(stage, error = %err, "pipeline stage failed")
}

/// Lists every container visible to the store, logging one line per name.
pub async fn inventory(store: &dyn ContainerStore) -> Result<Vec<String>> {
    let containers = store.list_containers().await?;
    if containers.is_empty() {
        info!("no containers found");
    }
    for name in &containers {
        info!(container = %name, "container");
    }
    Ok(containers)
}

/// S3-backed store built from the configuration's S3 settings.
pub async fn connect_store(
    config: &PipelineConfig,
) -> std::result::Result<Arc<dyn ContainerStore>, BucketError> {
    let store = S3ContainerStore::new(config.s3.clone()).await?;
    Ok(Arc::new(store))
}
