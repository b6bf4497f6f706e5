use std::io::{Cursor, Write};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use firds_bucket::{ContainerStore, MemoryContainerStore};
use firds_core::{inventory, Pipeline, PipelineConfig, PipelineError};
use firds_parser::CSV_HEADER;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const ARCHIVE: &str = "DLTINS_20210117_01of01.zip";
const ENTRY: &str = "DLTINS_20210117_01of01.xml";

fn sample_xml() -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../firds-parser/tests/data/DLTINS_sample.xml");
    std::fs::read(path).expect("read sample fixture")
}

fn zip_of(entries: &[(&str, &[u8])]) -> Bytes {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, contents) in entries {
        writer.start_file(*name, options).expect("start zip entry");
        writer.write_all(contents).expect("write zip entry");
    }
    Bytes::from(writer.finish().expect("finish zip").into_inner())
}

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    addr
}

async fn serve_archive(payload: Bytes) -> SocketAddr {
    let route = format!("/firds/{ARCHIVE}");
    serve(Router::new().route(
        &route,
        get(move || {
            let payload = payload.clone();
            async move { payload }
        }),
    ))
    .await
}

fn config_for(addr: SocketAddr, work_dir: &Path) -> PipelineConfig {
    let url = format!("http://{addr}/firds/{ARCHIVE}");
    let work_dir = work_dir.display().to_string();
    PipelineConfig::from_lookup(|key| match key {
        "FIRDS_SOURCE_URL" => Some(url.clone()),
        "FIRDS_WORK_DIR" => Some(work_dir.clone()),
        "FIRDS_FETCH_TIMEOUT_SECS" => Some("10".into()),
        "S3_BUCKET" => Some("firds-test".into()),
        "S3_REGION" => Some("eu-west-1".into()),
        _ => None,
    })
    .expect("test configuration")
}

#[tokio::test]
async fn run_downloads_transforms_and_publishes() -> Result<()> {
    let addr = serve_archive(zip_of(&[(ENTRY, sample_xml().as_slice())])).await;
    let dir = TempDir::new()?;
    let store = Arc::new(MemoryContainerStore::new());
    let pipeline = Pipeline::new(config_for(addr, dir.path()), store.clone())?;

    let summary = pipeline.run().await?;

    assert_eq!(summary.archive, dir.path().join(ARCHIVE));
    assert!(summary.archive.exists());
    assert_eq!(summary.xml, dir.path().join(ENTRY));
    assert_eq!(summary.extracted, vec![dir.path().join(ENTRY)]);
    assert_eq!(summary.csv, dir.path().join("output.csv"));
    assert_eq!(summary.report.rows, 3);
    assert_eq!(summary.container, "firds-test");
    assert_eq!(summary.object_key, "output.csv");

    assert_eq!(store.container_region("firds-test"), Some(Some("eu-west-1".to_string())));
    let object = store
        .object("firds-test", "output.csv")
        .expect("csv was published");
    let local = std::fs::read(&summary.csv)?;
    assert_eq!(&object[..], &local[..]);

    let text = String::from_utf8(local)?;
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some(CSV_HEADER.join(",").as_str()));
    assert_eq!(lines.count(), 3);
    Ok(())
}

#[tokio::test]
async fn missing_archive_stops_before_any_file_is_written() -> Result<()> {
    let addr = serve(Router::new()).await;
    let dir = TempDir::new()?;
    let store = Arc::new(MemoryContainerStore::new());
    let pipeline = Pipeline::new(config_for(addr, dir.path()), store.clone())?;

    let err = pipeline.run().await.unwrap_err();

    match err {
        PipelineError::Fetch(fetch) => assert!(fetch.is_network()),
        other => panic!("expected a fetch error, got {other:?}"),
    }
    assert!(!dir.path().join(ARCHIVE).exists());
    assert!(!dir.path().join("output.csv").exists());
    assert!(store.container_region("firds-test").is_none());
    Ok(())
}

#[tokio::test]
async fn malformed_document_is_not_published() -> Result<()> {
    let malformed = b"<Document xmlns=\"urn:iso:std:iso:20022:tech:xsd:auth.036.001.02\"><FinInstrm><NewRcrd></FinInstrm></Document>";
    let addr = serve_archive(zip_of(&[(ENTRY, &malformed[..])])).await;
    let dir = TempDir::new()?;
    let store = Arc::new(MemoryContainerStore::new());
    let pipeline = Pipeline::new(config_for(addr, dir.path()), store.clone())?;

    let err = pipeline.run().await.unwrap_err();

    match err {
        PipelineError::Transform(transform) => assert!(transform.is_parse_error()),
        other => panic!("expected a transform error, got {other:?}"),
    }
    assert!(dir.path().join(ENTRY).exists());
    assert!(!dir.path().join("output.csv").exists());
    assert!(store.object("firds-test", "output.csv").is_none());
    Ok(())
}

#[tokio::test]
async fn archive_without_the_expected_entry_is_reported() -> Result<()> {
    let addr = serve_archive(zip_of(&[("README.txt", &b"no data today"[..])])).await;
    let dir = TempDir::new()?;
    let store = Arc::new(MemoryContainerStore::new());
    let pipeline = Pipeline::new(config_for(addr, dir.path()), store.clone())?;

    let err = pipeline.run().await.unwrap_err();

    match err {
        PipelineError::MissingEntry { archive, entry } => {
            assert_eq!(archive, dir.path().join(ARCHIVE));
            assert_eq!(entry, ENTRY);
        }
        other => panic!("expected a missing entry error, got {other:?}"),
    }
    assert!(dir.path().join("README.txt").exists());
    assert!(!dir.path().join("output.csv").exists());
    Ok(())
}

#[tokio::test]
async fn conflicting_container_fails_the_publish_stage() -> Result<()> {
    let addr = serve_archive(zip_of(&[(ENTRY, sample_xml().as_slice())])).await;
    let dir = TempDir::new()?;
    let store = Arc::new(MemoryContainerStore::new().with_foreign_container("firds-test"));
    let pipeline = Pipeline::new(config_for(addr, dir.path()), store.clone())?;

    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, PipelineError::Bucket(_)), "got {err:?}");
    assert!(dir.path().join("output.csv").exists());
    Ok(())
}

#[tokio::test]
async fn inventory_lists_every_container() -> Result<()> {
    let store = MemoryContainerStore::new();
    assert!(inventory(&store).await?.is_empty());

    store.ensure_container("rohitsteel", Some("ap-south-1")).await?;
    store.ensure_container("firds-test", None).await?;

    assert_eq!(inventory(&store).await?, vec!["firds-test", "rohitsteel"]);
    Ok(())
}
