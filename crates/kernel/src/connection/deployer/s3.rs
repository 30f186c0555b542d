//! S3-compatible object storage deployer.

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::debug;

use super::{Deployer, DeployerError, DeployerOptions, decode_payload};
use crate::connection::{StrategySettings, join_path};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct S3Settings {
    bucket: String,
    /// Key prefix every path is placed under.
    #[serde(default)]
    prefix: Option<String>,
    /// Custom endpoint for S3-compatible services like MinIO.
    #[serde(default)]
    endpoint_url: Option<String>,
    #[serde(flatten)]
    common: DeployerOptions,
}

/// Writes published files to an S3 bucket.
///
/// The client is built on first use from the default AWS credential chain
/// (env vars, config file, instance profile).
pub struct S3Deployer {
    client: OnceCell<aws_sdk_s3::Client>,
    bucket: String,
    prefix: String,
    endpoint_url: Option<String>,
    options: DeployerOptions,
}

impl S3Deployer {
    pub fn new(bucket: impl Into<String>, prefix: Option<String>, options: DeployerOptions) -> Self {
        Self {
            client: OnceCell::new(),
            bucket: bucket.into(),
            prefix: prefix.map(|p| join_path(&[&p])).unwrap_or_default(),
            endpoint_url: None,
            options,
        }
    }

    /// Build from registry settings.
    pub fn from_settings(settings: &StrategySettings) -> anyhow::Result<Self> {
        let parsed: S3Settings = settings.parse()?;
        anyhow::ensure!(!parsed.bucket.is_empty(), "s3 deployer needs a bucket");

        let mut deployer = Self::new(parsed.bucket, parsed.prefix, parsed.common);
        deployer.endpoint_url = parsed.endpoint_url;
        Ok(deployer)
    }

    async fn client(&self) -> &aws_sdk_s3::Client {
        self.client
            .get_or_init(|| async {
                let config = match &self.endpoint_url {
                    Some(endpoint) => aws_config::from_env().endpoint_url(endpoint).load().await,
                    None => aws_config::load_from_env().await,
                };
                aws_sdk_s3::Client::new(&config)
            })
            .await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, DeployerError> {
        let client = self.client().await;
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let response = client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .context("failed to list S3 objects")?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            match response.next_continuation_token() {
                Some(next) if response.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_string());
                }
                _ => break,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl Deployer for S3Deployer {
    fn alias(&self) -> &str {
        "s3"
    }

    fn options(&self) -> &DeployerOptions {
        &self.options
    }

    fn root(&self) -> &str {
        &self.prefix
    }

    async fn set_file(&self, path: &str, base64: &str) -> Result<(), DeployerError> {
        let data = decode_payload(base64)?;
        let size = data.len();

        self.client()
            .await
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(aws_sdk_s3::primitives::ByteStream::from(data))
            .send()
            .await
            .context("failed to upload to S3")?;

        debug!(bucket = %self.bucket, key = %path, size, "file written to S3");
        Ok(())
    }

    async fn remove_file(&self, path: &str) -> Result<(), DeployerError> {
        let client = self.client().await;

        // DeleteObject succeeds for missing keys, so check first.
        if let Err(err) = client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                return Err(DeployerError::NotFound(path.to_string()));
            }
            return Err(anyhow::Error::new(err)
                .context("failed to check S3 object existence")
                .into());
        }

        client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .context("failed to delete from S3")?;

        debug!(bucket = %self.bucket, key = %path, "file deleted from S3");
        Ok(())
    }

    async fn remove_folder(&self, path: &str) -> Result<(), DeployerError> {
        let prefix = format!("{}/", join_path(&[path]));
        let keys = self.list_keys(&prefix).await?;
        if keys.is_empty() {
            return Err(DeployerError::NotFound(path.to_string()));
        }

        let client = self.client().await;
        for key in &keys {
            client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .with_context(|| format!("failed to delete {key} from S3"))?;
        }

        debug!(bucket = %self.bucket, prefix = %prefix, removed = keys.len(), "folder deleted from S3");
        Ok(())
    }

    async fn get_folder(&self, path: &str, depth: usize) -> Result<Vec<String>, DeployerError> {
        let base = join_path(&[path]);
        let prefix = if base.is_empty() {
            String::new()
        } else {
            format!("{base}/")
        };

        let mut keys: Vec<String> = self
            .list_keys(&prefix)
            .await?
            .into_iter()
            .filter(|key| {
                key.strip_prefix(&prefix)
                    .is_some_and(|rest| rest.split('/').count() <= depth)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }

    fn settings(&self) -> StrategySettings {
        let mut settings = StrategySettings::with_options(self.alias(), &self.options);
        settings.set("bucket", serde_json::Value::String(self.bucket.clone()));
        if !self.prefix.is_empty() {
            settings.set("prefix", serde_json::Value::String(self.prefix.clone()));
        }
        if let Some(endpoint) = &self.endpoint_url {
            settings.set("endpointUrl", serde_json::Value::String(endpoint.clone()));
        }
        settings
    }
}

impl std::fmt::Debug for S3Deployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Deployer")
            .field("bucket", &self.bucket)
            .field("prefix", &self.prefix)
            .field("endpoint_url", &self.endpoint_url)
            .finish()
    }
}
