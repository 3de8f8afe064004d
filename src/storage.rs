use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    primitives::ByteStream,
    Client as S3Client,
};
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

/// Key prefix holding lease lock objects inside each container.
const LEASE_PREFIX: &str = ".leases/";

/// Exclusive claim on one archive. Expires on its own; peers that find a
/// live lease back off until the next tick.
#[derive(Debug, Clone)]
pub struct Lease {
    pub token: String,
}

/// Gateway to the per-jurisdiction archive containers.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    async fn list_archives(&self, container: &str) -> Result<Vec<String>>;

    async fn last_modified(&self, container: &str, name: &str) -> Result<Option<NaiveDateTime>>;

    /// `None` means another replica holds the archive; not an error.
    async fn acquire_lease(
        &self,
        container: &str,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Lease>>;

    async fn release_lease(&self, container: &str, name: &str, lease: &Lease) -> Result<()>;

    async fn get_object(&self, container: &str, name: &str) -> Result<Vec<u8>>;

    async fn delete_if_exists(&self, container: &str, name: &str) -> Result<()>;

    /// Copy into the `-rejected` sibling (overwriting any previous reject
    /// of the same name), then delete the source.
    async fn move_to_rejected(&self, container: &str, name: &str) -> Result<()>;
}

pub fn rejected_container(container: &str) -> String {
    format!("{container}-rejected")
}

pub async fn build_client(config: &AppConfig) -> Result<S3Client> {
    let region = Region::new(config.aws_region.clone());
    let region_provider = RegionProviderChain::first_try(Some(region))
        .or_default_provider()
        .or_else("us-east-1");

    #[allow(deprecated)]
    let mut loader = aws_config::from_env().region(region_provider);

    if let Some(endpoint) = &config.aws_endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (
        config.aws_access_key_id.clone(),
        config.aws_secret_access_key.clone(),
    ) {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");
        loader = loader.credentials_provider(credentials);
    }

    let base_config = loader.load().await;
    let s3_config = S3ConfigBuilder::from(&base_config)
        .force_path_style(true)
        .build();

    Ok(S3Client::from_conf(s3_config))
}

/// S3-backed gateway. Containers map to buckets; leases are lock objects
/// under [`LEASE_PREFIX`] created conditionally and carrying their own
/// expiry, so an abandoned lock is taken over after the TTL.
pub struct S3Blobs {
    client: S3Client,
}

#[derive(Serialize, Deserialize)]
struct LeaseRecord {
    token: String,
    expires_at: i64,
}

impl S3Blobs {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }

    fn lease_key(name: &str) -> String {
        format!("{LEASE_PREFIX}{name}")
    }

    async fn read_lease(&self, container: &str, name: &str) -> Result<Option<LeaseRecord>> {
        let response = self
            .client
            .get_object()
            .bucket(container)
            .key(Self::lease_key(name))
            .send()
            .await;
        match response {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .context("failed to read lease object")?
                    .into_bytes();
                Ok(serde_json::from_slice(&bytes).ok())
            }
            Err(err) if err.as_service_error().map(|e| e.is_no_such_key()) == Some(true) => {
                Ok(None)
            }
            Err(err) => Err(err).context("failed to look up lease object"),
        }
    }
}

#[async_trait]
impl BlobStore for S3Blobs {
    async fn list_archives(&self, container: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(container)
            .into_paginator()
            .send();
        while let Some(page) = pages.next().await {
            let page = page.with_context(|| format!("failed to list container {container}"))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    if !key.starts_with(LEASE_PREFIX) {
                        names.push(key.to_string());
                    }
                }
            }
        }
        Ok(names)
    }

    async fn last_modified(&self, container: &str, name: &str) -> Result<Option<NaiveDateTime>> {
        let response = self
            .client
            .head_object()
            .bucket(container)
            .key(name)
            .send()
            .await;
        match response {
            Ok(head) => Ok(head
                .last_modified()
                .and_then(|ts| chrono::DateTime::from_timestamp_millis(ts.to_millis().ok()?))
                .map(|ts| ts.naive_utc())),
            Err(err) if err.as_service_error().map(|e| e.is_not_found()) == Some(true) => Ok(None),
            Err(err) => Err(err).with_context(|| format!("failed to stat {container}/{name}")),
        }
    }

    async fn acquire_lease(
        &self,
        container: &str,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<Lease>> {
        let existing = self.read_lease(container, name).await?;
        let now = Utc::now().timestamp();
        let takeover = match existing {
            Some(record) if record.expires_at > now => return Ok(None),
            Some(_) => true,
            None => false,
        };

        let record = LeaseRecord {
            token: Uuid::new_v4().to_string(),
            expires_at: now + ttl.as_secs() as i64,
        };
        let body = serde_json::to_vec(&record).context("failed to encode lease")?;

        let mut request = self
            .client
            .put_object()
            .bucket(container)
            .key(Self::lease_key(name))
            .body(ByteStream::from(body));
        if !takeover {
            // Conditional create loses cleanly when a peer writes first.
            request = request.if_none_match("*");
        }

        match request.send().await {
            Ok(_) => Ok(Some(Lease {
                token: record.token,
            })),
            Err(err)
                if err
                    .raw_response()
                    .map(|r| r.status().as_u16() == 412)
                    .unwrap_or(false) =>
            {
                Ok(None)
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to lease {container}/{name}"))
            }
        }
    }

    async fn release_lease(&self, container: &str, name: &str, _lease: &Lease) -> Result<()> {
        self.client
            .delete_object()
            .bucket(container)
            .key(Self::lease_key(name))
            .send()
            .await
            .with_context(|| format!("failed to release lease on {container}/{name}"))?;
        Ok(())
    }

    async fn get_object(&self, container: &str, name: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(container)
            .key(name)
            .send()
            .await
            .with_context(|| format!("failed to download {container}/{name}"))?;
        let bytes = response
            .body
            .collect()
            .await
            .context("failed to read object stream")?
            .into_bytes()
            .to_vec();
        Ok(bytes)
    }

    async fn delete_if_exists(&self, container: &str, name: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(container)
            .key(name)
            .send()
            .await
            .with_context(|| format!("failed to delete {container}/{name}"))?;
        Ok(())
    }

    async fn move_to_rejected(&self, container: &str, name: &str) -> Result<()> {
        let target = rejected_container(container);
        self.client
            .copy_object()
            .bucket(&target)
            .key(name)
            .copy_source(format!("{container}/{name}"))
            .send()
            .await
            .with_context(|| format!("failed to copy {container}/{name} to {target}"))?;
        self.delete_if_exists(container, name).await
    }
}
