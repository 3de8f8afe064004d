use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use crate::ingest::Pdf;

/// Downstream document manager. Expected to deduplicate by file name, so a
/// retried upload of the same envelope is safe.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
    /// Upload one envelope's PDF set; returns file name → durable URL.
    async fn upload(&self, pdfs: &[Pdf]) -> Result<HashMap<String, String>>;
}

pub struct HttpDocuments {
    client: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    documents: Vec<UploadedDocument>,
}

#[derive(Deserialize)]
struct UploadedDocument {
    file_name: String,
    url: String,
}

impl HttpDocuments {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build document store client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl DocumentStore for HttpDocuments {
    async fn upload(&self, pdfs: &[Pdf]) -> Result<HashMap<String, String>> {
        let mut form = Form::new();
        for pdf in pdfs {
            let part = Part::bytes(pdf.bytes.clone())
                .file_name(pdf.file_name.clone())
                .mime_str("application/pdf")
                .context("invalid mime type for pdf part")?;
            form = form.part("files", part);
        }

        let url = format!("{}/documents", self.endpoint.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("document store request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("document store returned {status}: {body}");
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .context("document store response is not valid JSON")?;

        Ok(parsed
            .documents
            .into_iter()
            .map(|doc| (doc.file_name, doc.url))
            .collect())
    }
}
