use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use firds_bucket::S3Config;
use firds_fetch::xml_entry_name;
use firds_parser::{IssuerScope, PairingPolicy, TransformOptions};

use crate::error::{PipelineError, Result};

pub const DEFAULT_SOURCE_URL: &str =
    "http://firds.esma.europa.eu/firds/DLTINS_20210117_01of01.zip";
pub const DEFAULT_CSV_NAME: &str = "output.csv";
pub const DEFAULT_CONTAINER: &str = "firds-instruments";

/// Everything one pipeline run needs: where the archive comes from, where the
/// intermediate files live and where the CSV is published.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_url: String,
    pub work_dir: PathBuf,
    /// File name the downloaded archive is saved under.
    pub archive_name: String,
    /// Name of the XML document inside the archive.
    pub xml_entry: String,
    pub csv_name: String,
    pub fetch_timeout: Option<Duration>,
    pub transform: TransformOptions,
    pub container: String,
    pub region: Option<String>,
    pub object_key: Option<String>,
    pub s3: S3Config,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let archive_name = "DLTINS_20210117_01of01.zip".to_string();
        Self {
            source_url: DEFAULT_SOURCE_URL.to_string(),
            work_dir: PathBuf::from("."),
            xml_entry: xml_entry_name(&archive_name),
            archive_name,
            csv_name: DEFAULT_CSV_NAME.to_string(),
            fetch_timeout: None,
            transform: TransformOptions::default(),
            container: DEFAULT_CONTAINER.to_string(),
            region: None,
            object_key: None,
            s3: S3Config::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads the process environment, after loading `.env` when present.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let source_url = get("FIRDS_SOURCE_URL").unwrap_or_else(|| DEFAULT_SOURCE_URL.to_string());
        let archive_name = archive_name_from_url(&source_url)?;
        let xml_entry = get("FIRDS_XML_ENTRY").unwrap_or_else(|| xml_entry_name(&archive_name));

        let fetch_timeout = get("FIRDS_FETCH_TIMEOUT_SECS")
            .map(|value| parse_value::<u64>("FIRDS_FETCH_TIMEOUT_SECS", &value))
            .transpose()?
            .map(Duration::from_secs);

        let pairing = get("FIRDS_PAIRING")
            .map(|value| parse_value::<PairingPolicy>("FIRDS_PAIRING", &value))
            .transpose()?
            .unwrap_or_default();
        let issuer_scope = get("FIRDS_ISSUER_SCOPE")
            .map(|value| parse_value::<IssuerScope>("FIRDS_ISSUER_SCOPE", &value))
            .transpose()?
            .unwrap_or_default();

        let region = get("S3_REGION");
        let force_path_style = get("S3_FORCE_PATH_STYLE")
            .map(|value| parse_flag("S3_FORCE_PATH_STYLE", &value))
            .transpose()?
            .unwrap_or(false);

        let s3 = S3Config {
            region: region.clone().unwrap_or_else(|| S3Config::default().region),
            endpoint: get("S3_ENDPOINT_URL"),
            access_key_id: get("S3_ACCESS_KEY_ID"),
            secret_access_key: get("S3_SECRET_ACCESS_KEY"),
            force_path_style,
        };

        Ok(Self {
            source_url,
            work_dir: get("FIRDS_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            archive_name,
            xml_entry,
            csv_name: get("FIRDS_CSV_NAME").unwrap_or_else(|| DEFAULT_CSV_NAME.to_string()),
            fetch_timeout,
            transform: TransformOptions {
                pairing,
                issuer_scope,
            },
            container: get("S3_BUCKET").unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            region,
            object_key: get("S3_OBJECT_KEY"),
            s3,
        })
    }

    pub fn archive_path(&self) -> PathBuf {
        self.work_dir.join(&self.archive_name)
    }

    pub fn csv_path(&self) -> PathBuf {
        self.work_dir.join(&self.csv_name)
    }
}

/// Last path segment of `url`, ignoring any query string or fragment.
fn archive_name_from_url(url: &str) -> Result<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    match path.rsplit('/').next() {
        Some(name) if !name.is_empty() && path.contains('/') => Ok(name.to_string()),
        _ => Err(PipelineError::Config {
            var: "FIRDS_SOURCE_URL",
            message: format!("cannot derive an archive file name from '{url}'"),
        }),
    }
}

fn parse_value<T>(var: &'static str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|err| PipelineError::Config {
        var,
        message: err.to_string(),
    })
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(PipelineError::Config {
            var,
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
