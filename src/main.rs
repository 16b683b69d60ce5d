use obesity_risk::{
    api::{build_router, AppState},
    config::Config,
    error::AppError,
    metrics::{MODEL_CLASSES, MODEL_FEATURES},
    ml::{DiagnosisService, ModelArtifacts},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration; tracing is not up yet, so report on stderr
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            let e = AppError::from(e);
            eprintln!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    init_tracing(&config);

    tracing::info!("Starting obesity-risk v{}", env!("CARGO_PKG_VERSION"));

    // Initialize Prometheus metrics
    if config.observability.prometheus_enabled {
        if let Err(e) = obesity_risk::metrics::init_metrics() {
            tracing::warn!("Failed to initialize metrics: {}", e);
            tracing::warn!("Continuing without metrics");
        } else {
            tracing::info!("Prometheus metrics initialized");
        }
    } else {
        tracing::info!("Prometheus metrics disabled in configuration");
    }

    // A missing or inconsistent model is fatal: never serve without one
    let artifacts = match ModelArtifacts::load(&config.model.artifact_path) {
        Ok(artifacts) => artifacts,
        Err(e) => {
            tracing::error!(
                path = %config.model.artifact_path.display(),
                error = %e,
                fatal = e.is_fatal(),
                "Failed to load model artifacts"
            );
            return Err(e.into());
        }
    };
    MODEL_FEATURES.set(artifacts.schema().len() as f64);
    MODEL_CLASSES.set(artifacts.label_encoder().len() as f64);

    let service = Arc::new(DiagnosisService::new(Arc::new(artifacts)));
    let state = AppState::new(service).with_cors(config.server.cors_permissive);
    let app = build_router(state);

    // Start HTTP server
    let http_addr = format!("{}:{}", config.server.host, config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;

    tracing::info!("HTTP API server listening on http://{}", http_addr);
    tracing::info!("Press Ctrl+C to shutdown");

    axum::serve(http_listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shut down gracefully");
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "obesity_risk={},tower_http={}",
            config.observability.log_level, config.observability.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.observability.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
