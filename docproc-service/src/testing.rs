//! Test doubles shared by the unit tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::db::{DocumentProcessorResult, ProcessorStatus, ResultPayload};
use crate::error::{ProcessorError, PublishError};
use crate::processor::{DocumentProcessor, ProcessorRegistry};
use crate::queue::MessagePublisher;
use crate::scan::{ScanStatus, StaticScanStatus};
use crate::service::DocumentProcessingService;
use crate::store::MemoryResultStore;

/// Processor that always reports the same status
pub struct StubProcessor {
    id: String,
    reported_id: String,
    status: ProcessorStatus,
    payload: ResultPayload,
    delay: Option<std::time::Duration>,
}

impl StubProcessor {
    pub fn new(id: &str, status: ProcessorStatus) -> Self {
        Self {
            id: id.to_string(),
            reported_id: id.to_string(),
            status,
            payload: ResultPayload::empty(),
            delay: None,
        }
    }

    /// Put a different processor id into the returned result
    pub fn reporting_as(mut self, reported_id: &str) -> Self {
        self.reported_id = reported_id.to_string();
        self
    }

    pub fn with_payload(mut self, payload: ResultPayload) -> Self {
        self.payload = payload;
        self
    }

    /// Take `delay` before answering
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl DocumentProcessor for StubProcessor {
    fn processor_id(&self) -> &str {
        &self.id
    }

    async fn process(&self, document_id: Uuid) -> Result<DocumentProcessorResult, ProcessorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(DocumentProcessorResult {
            document_id,
            processor_id: self.reported_id.clone(),
            status: self.status.clone(),
            result: self.payload.clone(),
            timestamp: Utc::now(),
        })
    }
}

/// Processor whose every call fails without a classified outcome
pub struct FailingProcessor {
    id: String,
}

impl FailingProcessor {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

#[async_trait]
impl DocumentProcessor for FailingProcessor {
    fn processor_id(&self) -> &str {
        &self.id
    }

    async fn process(&self, _document_id: Uuid) -> Result<DocumentProcessorResult, ProcessorError> {
        Err(ProcessorError::Failed {
            message: "backend exploded".to_string(),
        })
    }
}

/// Publisher that keeps every message it was given
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<String>>,
}

impl RecordingPublisher {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl MessagePublisher for RecordingPublisher {
    fn publish(&self, message: String) -> Result<(), PublishError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }
}

/// Publisher whose topic is gone
pub struct ClosedPublisher;

impl MessagePublisher for ClosedPublisher {
    fn publish(&self, _message: String) -> Result<(), PublishError> {
        Err(PublishError::Closed {
            topic: "closed".to_string(),
        })
    }
}

/// Service wired to in-memory collaborators
pub struct TestHarness {
    pub service: Arc<DocumentProcessingService>,
    pub store: Arc<MemoryResultStore>,
    pub requests: Arc<RecordingPublisher>,
    pub completions: Arc<RecordingPublisher>,
    registry: ProcessorRegistry,
    scan_status: ScanStatus,
    request_publisher: Arc<dyn MessagePublisher>,
    result_publisher: Arc<dyn MessagePublisher>,
}

impl TestHarness {
    pub fn new(scan_status: ScanStatus) -> Self {
        let requests = Arc::new(RecordingPublisher::default());
        let completions = Arc::new(RecordingPublisher::default());
        Self::build(
            scan_status,
            ProcessorRegistry::new(),
            Arc::new(MemoryResultStore::new()),
            requests.clone(),
            completions.clone(),
            requests,
            completions,
        )
    }

    pub fn with_request_publisher(scan_status: ScanStatus, publisher: Arc<dyn MessagePublisher>) -> Self {
        let harness = Self::new(scan_status);
        Self::build(
            harness.scan_status,
            harness.registry,
            harness.store,
            harness.requests,
            harness.completions,
            publisher,
            harness.result_publisher,
        )
    }

    pub fn with_result_publisher(scan_status: ScanStatus, publisher: Arc<dyn MessagePublisher>) -> Self {
        let harness = Self::new(scan_status);
        Self::build(
            harness.scan_status,
            harness.registry,
            harness.store,
            harness.requests,
            harness.completions,
            harness.request_publisher,
            publisher,
        )
    }

    pub fn with_processor(self, processor: impl DocumentProcessor + 'static) -> Self {
        let registry = self.registry.with(Arc::new(processor));
        Self::build(
            self.scan_status,
            registry,
            self.store,
            self.requests,
            self.completions,
            self.request_publisher,
            self.result_publisher,
        )
    }

    fn build(
        scan_status: ScanStatus,
        registry: ProcessorRegistry,
        store: Arc<MemoryResultStore>,
        requests: Arc<RecordingPublisher>,
        completions: Arc<RecordingPublisher>,
        request_publisher: Arc<dyn MessagePublisher>,
        result_publisher: Arc<dyn MessagePublisher>,
    ) -> Self {
        let service = Arc::new(DocumentProcessingService::new(
            Arc::new(registry.clone()),
            store.clone(),
            Arc::new(StaticScanStatus(scan_status)),
            request_publisher.clone(),
            result_publisher.clone(),
        ));

        Self {
            service,
            store,
            requests,
            completions,
            registry,
            scan_status,
            request_publisher,
            result_publisher,
        }
    }
}

/// Serve a single canned HTTP response on a local port.
///
/// Returns the base URL and a handle resolving to the raw request received.
pub async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let request = read_request(&mut socket).await;
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
        request
    });

    (base_url, handle)
}

/// Base URL of a local port nothing listens on
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);
    base_url
}

async fn read_request(socket: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + content_length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}
