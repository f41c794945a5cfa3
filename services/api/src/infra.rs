use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use kpi_tracker::config::{AppConfig, StorageConfig};
use kpi_tracker::error::AppError;
use kpi_tracker::kpi::{KpiService, MemoryStore, NotificationDispatcher, WhatsAppClient};
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Opens the JSON snapshot when one is configured, otherwise a process-local store.
pub(crate) fn build_store(storage: &StorageConfig) -> Result<Arc<MemoryStore>, AppError> {
    let store = match &storage.data_file {
        Some(path) => MemoryStore::open(path.clone())?,
        None => {
            warn!("KPI_DATA_FILE not set, data lives only as long as this process");
            MemoryStore::new()
        }
    };
    Ok(Arc::new(store))
}

pub(crate) fn build_service(config: &AppConfig) -> Result<KpiService<MemoryStore>, AppError> {
    Ok(KpiService::new(build_store(&config.storage)?))
}

pub(crate) fn build_dispatcher(
    config: &AppConfig,
    service: KpiService<MemoryStore>,
) -> NotificationDispatcher<MemoryStore, WhatsAppClient> {
    let client = WhatsAppClient::new(&config.messaging);
    info!(
        api_url = %config.messaging.api_url,
        delay_ms = config.messaging.delay.as_millis() as u64,
        "messaging gateway configured"
    );
    NotificationDispatcher::new(service, Arc::new(client), config.messaging.delay)
}
