use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use firds_bucket::{ContainerStore, S3Config, S3ContainerStore};

const REQUIRED_VARS: &[&str] = &[
    "FIRDS_TEST_S3_BUCKET",
    "FIRDS_TEST_S3_ENDPOINT",
    "FIRDS_TEST_S3_ACCESS_KEY_ID",
    "FIRDS_TEST_S3_SECRET_ACCESS_KEY",
];

struct S3TestConfig {
    bucket: String,
    s3: S3Config,
}

impl S3TestConfig {
    fn from_env() -> Option<Self> {
        let value = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Some(Self {
            bucket: value("FIRDS_TEST_S3_BUCKET")?,
            s3: S3Config {
                region: value("FIRDS_TEST_S3_REGION").unwrap_or_else(|| "us-east-1".into()),
                endpoint: Some(value("FIRDS_TEST_S3_ENDPOINT")?),
                access_key_id: Some(value("FIRDS_TEST_S3_ACCESS_KEY_ID")?),
                secret_access_key: Some(value("FIRDS_TEST_S3_SECRET_ACCESS_KEY")?),
                force_path_style: value("FIRDS_TEST_S3_FORCE_PATH_STYLE")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(true),
            },
        })
    }
}

#[tokio::test]
async fn s3_store_provisions_and_publishes() -> Result<()> {
    let Some(config) = S3TestConfig::from_env() else {
        eprintln!(
            "Skipping S3 container store test; set {} to enable",
            REQUIRED_VARS.join(", ")
        );
        return Ok(());
    };

    let store = S3ContainerStore::new(config.s3)
        .await
        .context("failed to build S3 container store")?;

    store
        .ensure_container(&config.bucket, None)
        .await
        .context("first ensure failed")?;
    let created_again = store
        .ensure_container(&config.bucket, None)
        .await
        .context("second ensure failed")?;
    assert!(!created_again);

    let dir = tempfile::TempDir::new()?;
    let path = dir.path().join("output.csv");
    std::fs::write(&path, "FinInstrmGnlAttrbts.Id\n")?;
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    let key = format!("integration/{nanos}.csv");

    let used = store
        .publish(&path, &config.bucket, Some(&key))
        .await
        .context("upload to S3 failed")?;
    assert_eq!(used, key);

    let listed = store.list_containers().await.context("list failed")?;
    assert!(listed.iter().any(|name| name == &config.bucket));

    Ok(())
}
