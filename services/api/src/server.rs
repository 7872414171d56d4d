use crate::cli::ServeArgs;
use crate::infra::{
    AllowListIdentity, AppState, InMemoryApplicationRepository, InMemoryDirectory,
    LoggingNotifier, PrefixedContractGenerator,
};
use crate::routes::with_placement_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use placement_workflow::config::AppConfig;
use placement_workflow::error::AppError;
use placement_workflow::telemetry;
use placement_workflow::workflows::placement::{ApplicationService, PlacementApi};
use std::sync::atomic::{AtomicBool, Ordering};
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
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = ApplicationService::new(
        Arc::new(InMemoryApplicationRepository::default()),
        Arc::new(InMemoryDirectory::seeded()),
        Arc::new(PrefixedContractGenerator::new(
            config.contracts.reference_prefix.clone(),
        )),
        Arc::new(LoggingNotifier::default()),
    );
    let api = PlacementApi::new(Arc::new(service), Arc::new(AllowListIdentity::demo()));

    let app = with_placement_routes(Arc::new(api))
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        contract_prefix = %config.contracts.reference_prefix,
        "placement api ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
