use crate::cli::ServeArgs;
use crate::infra::{service_user, AppState, InMemoryLeasingBackend, TracingNotifier};
use crate::routes::with_wizard_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use lease_desk::config::AppConfig;
use lease_desk::error::AppError;
use lease_desk::telemetry;
use lease_desk::workflows::tenancy::{
    HttpAgreementClient, HttpDirectoryClient, HttpTenancyClient, RestClient, WizardSessions,
};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    match config.backend.base_url.clone() {
        Some(base_url) => {
            info!(%base_url, "using remote property backend");
            let mut rest = RestClient::new(base_url);
            if let Some(token) = config.backend.bearer_token.clone() {
                rest = rest.with_bearer_token(token);
            }
            let sessions = Arc::new(WizardSessions::new(
                service_user(),
                Arc::new(HttpAgreementClient::new(rest.clone())),
                Arc::new(HttpTenancyClient::new(rest.clone())),
                Arc::new(HttpDirectoryClient::new(rest)),
                Arc::new(TracingNotifier),
            ));
            serve(config, sessions).await
        }
        None => {
            info!("no backend configured, serving against the seeded in-memory backend");
            let backend = Arc::new(InMemoryLeasingBackend::default());
            let sessions = Arc::new(WizardSessions::new(
                service_user(),
                backend.clone(),
                backend.clone(),
                backend,
                Arc::new(TracingNotifier),
            ));
            serve(config, sessions).await
        }
    }
}

async fn serve<A, T, D, N>(
    config: AppConfig,
    sessions: Arc<WizardSessions<A, T, D, N>>,
) -> Result<(), AppError>
where
    A: lease_desk::workflows::tenancy::AgreementClient + 'static,
    T: lease_desk::workflows::tenancy::TenancyClient + 'static,
    D: lease_desk::workflows::tenancy::DirectoryClient + 'static,
    N: lease_desk::workflows::tenancy::WizardNotifier + 'static,
{
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = with_wizard_routes(sessions)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "tenancy onboarding service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
