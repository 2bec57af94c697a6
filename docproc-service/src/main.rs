use std::io::BufRead;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use docproc_service::config::{ServiceConfig, StorageBackend, load_config};
use docproc_service::db::{Database, DocumentProcessorResult};
use docproc_service::error::ProcessorError;
use docproc_service::events::{EventConsumer, InitiateProcessingHandler};
use docproc_service::ingress::Ingress;
use docproc_service::processor::{HttpProcessor, KnownProcessor, ProcessorRegistry};
use docproc_service::queue::{Delivery, RequestConsumer, WorkQueue};
use docproc_service::scan::{HttpScanStatusClient, ScanStatus, ScanStatusProvider, StaticScanStatus};
use docproc_service::service::DocumentProcessingService;
use docproc_service::store::{MemoryResultStore, ResultStore};
use docproc_service::{EVENT_TOPIC, REQUEST_TOPIC, RESULT_TOPIC};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    info!(
        "Starting document processing service v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = load_config()?;

    let store: Arc<dyn ResultStore> = match config.storage.backend {
        StorageBackend::Sqlite => {
            let db_path = config.storage.database_path();
            let db = Database::open(&db_path)?;
            info!(path = %db_path.display(), "Database initialized");
            Arc::new(db)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory result store, results are lost on restart");
            Arc::new(MemoryResultStore::new())
        }
    };

    let registry = build_registry(&config)?;

    let scan_status: Arc<dyn ScanStatusProvider> = match &config.scan.base_url {
        Some(base_url) => {
            info!(url = %base_url, "Scan status checked against storage service");
            Arc::new(HttpScanStatusClient::new(base_url, &config.scan)?)
        }
        None => {
            warn!("No storage service configured, treating every document as scanned");
            Arc::new(StaticScanStatus(ScanStatus::Ready))
        }
    };

    let (request_queue, request_rx) = WorkQueue::new(REQUEST_TOPIC);
    let (result_queue, result_rx) = WorkQueue::new(RESULT_TOPIC);
    let (event_queue, event_rx) = WorkQueue::new(EVENT_TOPIC);

    let service = Arc::new(DocumentProcessingService::new(
        Arc::new(registry),
        store,
        scan_status,
        Arc::new(request_queue.publisher()),
        Arc::new(result_queue.publisher()),
    ));
    info!(processors = ?service.registry().processor_ids(), "Document processing service initialized");

    let shutdown = CancellationToken::new();

    let request_consumer = Arc::new(RequestConsumer::new(
        service.clone(),
        request_queue,
        config.queue.clone(),
    ));
    let request_handle = tokio::spawn(request_consumer.run(request_rx, shutdown.clone()));

    let ingress = Ingress::new(service.clone(), Arc::new(event_queue.publisher()));

    let event_consumer = EventConsumer::new(
        InitiateProcessingHandler::new(service.clone()),
        event_queue,
        config.queue.clone(),
    );
    let event_handle = tokio::spawn(event_consumer.run(event_rx, shutdown.clone()));

    let completion_handle = tokio::spawn(log_completions(result_rx, shutdown.clone()));

    let ingress_shutdown = shutdown.clone();
    let ingress_handle = tokio::spawn(async move {
        if let Err(e) = ingress
            .run(stdin_lines(), tokio::io::stdout(), ingress_shutdown)
            .await
        {
            warn!(error = %e, "Command ingress failed");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    shutdown.cancel();

    let _ = tokio::join!(request_handle, event_handle, completion_handle, ingress_handle);
    info!("Document processing service stopped");

    Ok(())
}

/// Register an [`HttpProcessor`] for every configured endpoint
fn build_registry(config: &ServiceConfig) -> Result<ProcessorRegistry, ProcessorError> {
    let mut registry = ProcessorRegistry::new();

    for endpoint in &config.processors {
        registry.register(Arc::new(HttpProcessor::new(endpoint)?));
        info!(processor_id = %endpoint.id, endpoint = %endpoint.endpoint, "Processor endpoint configured");
    }

    for known in KnownProcessor::all() {
        if !registry.contains(&known.id()) {
            warn!(
                processor_id = %known.id(),
                name = known.name(),
                description = known.description(),
                "Known processor has no endpoint configured"
            );
        }
    }

    if registry.is_empty() {
        warn!("No processors registered, every processing request will be unprocessable");
    } else {
        info!(count = registry.len(), "Processor registry built");
    }

    Ok(registry)
}

/// Forward stdin lines from a dedicated thread so a pending read never holds up shutdown
fn stdin_lines() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read stdin");
                    break;
                }
            }
        }
    });
    rx
}

/// Stand-in subscriber for the completion topic
async fn log_completions(mut rx: mpsc::UnboundedReceiver<Delivery>, shutdown: CancellationToken) {
    loop {
        let delivery = tokio::select! {
            _ = shutdown.cancelled() => break,
            delivery = rx.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        match serde_json::from_str::<DocumentProcessorResult>(&delivery.payload) {
            Ok(result) => info!(
                doc_id = %result.document_id,
                processor_id = %result.processor_id,
                status = %result.status,
                "Processing result published"
            ),
            Err(e) => warn!(error = %e, "Unreadable processing result on completion topic"),
        }
    }
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docproc_service=info"));

    // stdout carries command replies
    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
