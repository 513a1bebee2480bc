use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::cli::ServeArgs;
use crate::infra::{load_directory, AppState};
use crate::routes::with_admission_routes;
use admission_engine::config::AppConfig;
use admission_engine::error::AppError;
use admission_engine::telemetry;
use admission_engine::workflows::admissions::{
    AdmissionService, InMemoryApplicationStore, InMemoryEventLog,
};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(seed) = args.seed.take() {
        config.seed_path = Some(seed);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = Arc::new(load_directory(config.seed_path.as_deref())?);
    let store = Arc::new(InMemoryApplicationStore::default());
    let events = Arc::new(InMemoryEventLog::default());
    let admission_service = Arc::new(AdmissionService::new(
        store,
        directory,
        events,
        config.engine,
    ));

    let app = with_admission_routes(admission_service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        conflict_retries = config.engine.conflict_retries,
        "admission engine ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
