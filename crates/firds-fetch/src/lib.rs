//! Downloads FIRDS archives and unpacks them into a working directory.

mod archive;
mod errors;

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use tracing::info;

pub use archive::{unpack, unpack_file, xml_entry_name};
pub use errors::FetchError;

/// Builds the HTTP client used for downloads. The timeout, when set, bounds
/// each request end to end.
pub fn http_client(timeout: Option<Duration>) -> Result<Client, FetchError> {
    let mut builder = Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|source| FetchError::Client { source })
}

/// Retrieves `url` in full. Non-2xx responses are errors; nothing is retried.
pub async fn fetch(client: &Client, url: &str) -> Result<Bytes, FetchError> {
    let network = |source| FetchError::Network {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(network)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.bytes().await.map_err(network)?;
    info!(url, bytes = body.len(), "download complete");
    Ok(body)
}

/// Fetches `url` and stores the payload at `destination`. The file is only
/// written once the whole body has been received.
pub async fn download_archive(
    client: &Client,
    url: &str,
    destination: &Path,
) -> Result<Bytes, FetchError> {
    let body = fetch(client, url).await?;
    tokio::fs::write(destination, &body)
        .await
        .map_err(|source| FetchError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
    info!(path = %destination.display(), "archive saved");
    Ok(body)
}
