use crate::cli::ServeArgs;
use crate::infra::{sandbox_collaborators, AppState};
use crate::routes::with_pipeline_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use sales_pipeline::config::AppConfig;
use sales_pipeline::error::AppError;
use sales_pipeline::telemetry;
use sales_pipeline::workflows::pipeline::PipelineOrchestrator;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let catalog = config.catalog.build()?;
    let (collaborators, _store) = sandbox_collaborators(Arc::new(catalog));
    let orchestrator = Arc::new(PipelineOrchestrator::new(
        collaborators,
        config.pipeline.clone(),
    ));

    let app = with_pipeline_routes(orchestrator)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "sales pipeline orchestrator ready");

    axum::serve(listener, app).await?;
    Ok(())
}
