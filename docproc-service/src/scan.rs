//! Scan status of stored documents.
//!
//! The document storage service virus-scans every upload. A document whose
//! scan failed is quarantined for good and must never be sent to processors.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::config::ScanConfig;
use crate::error::ScanStatusError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanStatus {
    Ready,
    AwaitingScan,
    FailedScan,
}

impl ScanStatus {
    pub fn message(&self) -> &'static str {
        match self {
            ScanStatus::Ready => "Document is ready",
            ScanStatus::AwaitingScan => "Document is awaiting scan",
            ScanStatus::FailedScan => {
                "Document has been permanently quarantined and cannot be retrieved"
            }
        }
    }
}

#[async_trait]
pub trait ScanStatusProvider: Send + Sync {
    async fn get_status(&self, document_id: Uuid) -> Result<ScanStatus, ScanStatusError>;
}

/// Reports the same status for every document
pub struct StaticScanStatus(pub ScanStatus);

#[async_trait]
impl ScanStatusProvider for StaticScanStatus {
    async fn get_status(&self, _document_id: Uuid) -> Result<ScanStatus, ScanStatusError> {
        Ok(self.0)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanStatusResponse {
    scan_status: ScanStatus,
}

/// Client for the document storage service's scan status endpoint
pub struct HttpScanStatusClient {
    client: Client,
    base_url: String,
}

impl HttpScanStatusClient {
    pub fn new(base_url: &str, config: &ScanConfig) -> Result<Self, ScanStatusError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScanStatusError::Connection {
                url: base_url.to_string(),
                source: e,
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn status_url(&self, document_id: Uuid) -> String {
        format!("{}/api/v1/documents/{}/scan-status", self.base_url, document_id)
    }
}

#[async_trait]
impl ScanStatusProvider for HttpScanStatusClient {
    async fn get_status(&self, document_id: Uuid) -> Result<ScanStatus, ScanStatusError> {
        let url = self.status_url(document_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ScanStatusError::Connection {
                url: url.clone(),
                source: e,
            })?;

        if !response.status().is_success() {
            return Err(ScanStatusError::Status {
                document_id: document_id.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body: ScanStatusResponse = response
            .json()
            .await
            .map_err(|e| ScanStatusError::InvalidResponse { source: e })?;

        Ok(body.scan_status)
    }
}
