//! Processor backed by a remote processing endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::DocumentProcessor;
use crate::config::ProcessorEndpointConfig;
use crate::db::DocumentProcessorResult;
use crate::error::ProcessorError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    document_id: Uuid,
}

/// Forwards `process` calls to an HTTP endpoint that answers with a
/// `DocumentProcessorResult` body.
pub struct HttpProcessor {
    client: Client,
    processor_id: String,
    endpoint: String,
}

impl HttpProcessor {
    pub fn new(config: &ProcessorEndpointConfig) -> Result<Self, ProcessorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProcessorError::Connection {
                url: config.endpoint.clone(),
                source: e,
            })?;

        Ok(Self {
            client,
            processor_id: config.id.clone(),
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl DocumentProcessor for HttpProcessor {
    fn processor_id(&self) -> &str {
        &self.processor_id
    }

    async fn process(&self, document_id: Uuid) -> Result<DocumentProcessorResult, ProcessorError> {
        debug!(doc_id = %document_id, processor_id = %self.processor_id, "Calling processor endpoint");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ProcessRequest { document_id })
            .send()
            .await
            .map_err(|e| ProcessorError::Connection {
                url: self.endpoint.clone(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ProcessorError::Endpoint {
                status: status.as_u16(),
                message,
            });
        }

        let result = response
            .json::<DocumentProcessorResult>()
            .await
            .map_err(|e| ProcessorError::InvalidResponse { source: e })?;

        if result.document_id != document_id {
            return Err(ProcessorError::Failed {
                message: format!(
                    "Processor endpoint answered for document {} instead of {}",
                    result.document_id, document_id
                ),
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ProcessorStatus;
    use crate::testing::{serve_once, unreachable_url};

    fn processor(base_url: &str) -> HttpProcessor {
        HttpProcessor::new(&ProcessorEndpointConfig {
            id: "docai-document-quality".to_string(),
            endpoint: format!("{}/process", base_url),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn result_body(document_id: Uuid, result: serde_json::Value) -> String {
        serde_json::json!({
            "documentId": document_id,
            "processorId": "docai-document-quality",
            "status": "COMPLETE",
            "result": result,
            "timestamp": "2024-05-01T12:00:00Z"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_process_posts_document_id_and_decodes_result() {
        let document_id = Uuid::new_v4();
        let (base_url, server) =
            serve_once("200 OK", &result_body(document_id, serde_json::json!({ "score": 0.98 }))).await;

        let result = processor(&base_url).process(document_id).await.unwrap();

        assert_eq!(result.document_id, document_id);
        assert_eq!(result.status, ProcessorStatus::Complete);
        assert_eq!(result.result.fields["score"], 0.98);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /process "));
        assert!(request.ends_with(&format!(r#"{{"documentId":"{}"}}"#, document_id)));
    }

    #[tokio::test]
    async fn test_numeric_error_entry_decodes() {
        let document_id = Uuid::new_v4();
        let (base_url, _server) = serve_once(
            "200 OK",
            &result_body(document_id, serde_json::json!({ "error": 0.02, "score": 0.98 })),
        )
        .await;

        let result = processor(&base_url).process(document_id).await.unwrap();
        assert_eq!(result.result.fields["error"], 0.02);
    }

    #[tokio::test]
    async fn test_error_status_maps_to_endpoint_error() {
        let (base_url, _server) =
            serve_once("500 Internal Server Error", r#"{"message":"model offline"}"#).await;

        let err = processor(&base_url).process(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(
            err,
            ProcessorError::Endpoint { status: 500, ref message } if message.contains("model offline")
        ));
    }

    #[tokio::test]
    async fn test_undecodable_body_maps_to_invalid_response() {
        let (base_url, _server) = serve_once("200 OK", "{not json").await;

        let err = processor(&base_url).process(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ProcessorError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_answer_for_other_document_is_rejected() {
        let (base_url, _server) =
            serve_once("200 OK", &result_body(Uuid::new_v4(), serde_json::json!({}))).await;

        let err = processor(&base_url).process(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Failed { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_maps_to_connection_error() {
        let base_url = unreachable_url().await;

        let err = processor(&base_url).process(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ProcessorError::Connection { ref url, .. } if url.ends_with("/process")));
    }
}
