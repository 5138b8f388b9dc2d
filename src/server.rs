use crate::bridge::crm::HttpCrmGateway;
use crate::bridge::identity::HttpIdentityGateway;
use crate::bridge::report_token::ReportTokens;
use crate::bridge::scoring::HttpScoringGateway;
use crate::bridge::store::MemoryRecordStore;
use crate::bridge::{AssessmentService, BridgeSettings};
use crate::cli::ServeArgs;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::infra::AppState;
use crate::routes::with_bridge_routes;
use crate::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
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

    let client = reqwest::Client::builder()
        .timeout(config.bridge.upstream_timeout)
        .build()?;

    let service = Arc::new(AssessmentService::new(
        Arc::new(MemoryRecordStore::default()),
        Arc::new(HttpIdentityGateway::new(
            client.clone(),
            config.bridge.identity_url.clone(),
        )),
        Arc::new(HttpScoringGateway::new(
            client.clone(),
            config.bridge.scoring_url.clone(),
            config.bridge.scoring_oauth_token.clone(),
        )),
        Arc::new(HttpCrmGateway::new(
            client,
            config.bridge.crm_url.clone(),
            config.bridge.crm_api_key.clone(),
        )),
        ReportTokens::new(config.bridge.report_token_secret.as_bytes().to_vec()),
        BridgeSettings::from(&config.bridge),
    ));

    let app = with_bridge_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "aicvd bridge ready");

    axum::serve(listener, app).await?;
    Ok(())
}
