use std::path::Path;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use tracing::{info, warn};

use crate::{check_container_name, content_type_for, resolve_key, BucketError, ContainerStore};

/// Region in which buckets must be created without a location constraint.
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub force_path_style: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
        }
    }
}

#[derive(Clone)]
pub struct S3ContainerStore {
    client: Client,
    region: String,
}

impl S3ContainerStore {
    pub async fn new(config: S3Config) -> Result<Self, BucketError> {
        if config.region.is_empty() {
            return Err(BucketError::Configuration("region cannot be empty".into()));
        }

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            let credentials = Credentials::new(access_key, secret_key, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let shared_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);

        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            region: config.region,
        })
    }

    /// HeadBucket: 404 means free, 403 means the name is not ours to use.
    async fn container_exists(&self, name: &str) -> Result<bool, BucketError> {
        match self.client.head_bucket().bucket(name).send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => Ok(false),
            Err(SdkError::ServiceError(err)) if err.raw().status().as_u16() == 403 => {
                Err(BucketError::ContainerConflict(name.to_string()))
            }
            Err(other) => Err(BucketError::network(other)),
        }
    }

    async fn create_container(&self, name: &str, region: &str) -> Result<bool, BucketError> {
        let mut request = self.client.create_bucket().bucket(name);
        if let Some(region) = location_constraint(region) {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        match request.send().await {
            Ok(_) => Ok(true),
            Err(SdkError::ServiceError(err)) if err.err().is_bucket_already_owned_by_you() => {
                Ok(false)
            }
            Err(SdkError::ServiceError(err)) if err.err().is_bucket_already_exists() => {
                Err(BucketError::ContainerConflict(name.to_string()))
            }
            Err(other) => Err(BucketError::network(other)),
        }
    }
}

#[async_trait]
impl ContainerStore for S3ContainerStore {
    async fn ensure_container(
        &self,
        name: &str,
        region: Option<&str>,
    ) -> Result<bool, BucketError> {
        check_container_name(name)?;

        if self.container_exists(name).await? {
            info!(container = name, "container already exists");
            return Ok(false);
        }

        let region = region.unwrap_or(self.region.as_str());
        let created = self.create_container(name, region).await?;
        if created {
            info!(container = name, region, "container created");
        } else {
            warn!(container = name, "container appeared while it was being created");
        }
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

        let exists = self
            .container_exists(container)
            .await
            .map_err(|err| denied_as_publish(err, container, &key))?;
        if !exists {
            self.ensure_container(container, None).await?;
        }

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|err| BucketError::publish(container, &key, err))?;

        self.client
            .put_object()
            .bucket(container)
            .key(&key)
            .body(body)
            .content_type(content_type_for(local_path))
            .send()
            .await
            .map_err(|err| BucketError::publish(container, &key, err))?;

        info!(container, key = %key, path = %local_path.display(), "object uploaded");
        Ok(key)
    }

    async fn list_containers(&self) -> Result<Vec<String>, BucketError> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(BucketError::network)?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| bucket.name().map(str::to_string))
            .collect())
    }
}

/// CreateBucket takes a location constraint everywhere except us-east-1,
/// which rejects one.
fn location_constraint(region: &str) -> Option<&str> {
    (region != DEFAULT_REGION).then_some(region)
}

/// A 403 from the existence check while publishing means the caller lacks
/// access to the container, which is a publish failure rather than a
/// naming conflict.
fn denied_as_publish(err: BucketError, container: &str, key: &str) -> BucketError {
    match err {
        BucketError::ContainerConflict(_) => {
            BucketError::publish(container, key, "access to the container was denied")
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_remembers_configured_region() {
        let store = S3ContainerStore::new(S3Config {
            region: "ap-south-1".into(),
            endpoint: Some("http://127.0.0.1:9".into()),
            access_key_id: Some("test".into()),
            secret_access_key: Some("test".into()),
            force_path_style: true,
        })
        .await
        .unwrap();

        assert_eq!(store.region, "ap-south-1");
        assert_eq!(location_constraint(&store.region), Some("ap-south-1"));
    }

    #[test]
    fn us_east_1_is_created_without_constraint() {
        assert_eq!(location_constraint("us-east-1"), None);
        assert_eq!(location_constraint("eu-west-1"), Some("eu-west-1"));
    }

    #[test]
    fn denied_access_while_publishing_is_a_publish_error() {
        let err = denied_as_publish(
            BucketError::ContainerConflict("firds-instruments".into()),
            "firds-instruments",
            "output.csv",
        );
        assert!(matches!(
            err,
            BucketError::Publish { ref container, ref key, .. }
                if container == "firds-instruments" && key == "output.csv"
        ));

        let err = denied_as_publish(BucketError::Network("timeout".into()), "c", "k");
        assert!(matches!(err, BucketError::Network(_)));
    }
}
