//! Application startup and lifecycle management.

use axum::http::{header, HeaderValue};
use axum::middleware::from_fn;
use axum::{
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::{StoreBackend, ZatcaServiceConfig};
use crate::handlers;
use crate::services::signing::signer_from_config;
use crate::services::{
    DocumentBuilder, HttpZatcaGateway, InMemorySyncStore, InvoiceSigner, MongoSyncStore,
    SubmissionPipeline, SyncStore, WebhookReconciler, ZatcaGateway,
};

const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const CORS_ALLOW_METHODS: &str = "POST, OPTIONS";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ZatcaServiceConfig>,
    pub store: Arc<dyn SyncStore>,
    pub builder: DocumentBuilder,
    pub signer: Arc<dyn InvoiceSigner>,
    pub pipeline: SubmissionPipeline,
    pub reconciler: WebhookReconciler,
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application with the configured store and the live ZATCA gateway.
    pub async fn build(config: ZatcaServiceConfig) -> Result<Self, AppError> {
        let store: Arc<dyn SyncStore> = match config.store.backend {
            StoreBackend::Mongodb => {
                let store = MongoSyncStore::connect(
                    &config.store.mongodb_uri,
                    &config.store.mongodb_database,
                )
                .await
                .map_err(|e| AppError::DatabaseError(e.into()))?;
                store.init_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    AppError::DatabaseError(e.into())
                })?;
                Arc::new(store)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory sync store - webhook updates are not persisted");
                Arc::new(InMemorySyncStore::new())
            }
        };

        let gateway = HttpZatcaGateway::new(config.zatca.clone());
        if gateway.is_configured() {
            tracing::info!(base_url = %config.zatca.base_url, "ZATCA gateway initialized");
        } else if !config.zatca.testing_mode {
            tracing::warn!("ZATCA API credentials not configured - submissions will fail");
        }

        Self::build_with(config, store, Arc::new(gateway)).await
    }

    /// Build with explicit collaborators. Used by tests to swap the store.
    pub async fn build_with(
        config: ZatcaServiceConfig,
        store: Arc<dyn SyncStore>,
        gateway: Arc<dyn ZatcaGateway>,
    ) -> Result<Self, AppError> {
        let signer = signer_from_config(config.signing.ed25519_seed.as_ref())
            .map_err(|e| AppError::ConfigError(e.into()))?;

        let state = AppState {
            pipeline: SubmissionPipeline::new(gateway, config.zatca.testing_mode),
            reconciler: WebhookReconciler::new(store.clone()),
            builder: DocumentBuilder::new(),
            signer,
            store,
            config: Arc::new(config),
        };

        // Port 0 picks a random port for tests
        let addr = SocketAddr::from(([0, 0, 0, 0], state.config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind HTTP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("ZATCA service listening on port {}", port);

        Ok(Self {
            port,
            listener,
            router: router(state),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }

    pub async fn run_with_shutdown<F>(self, signal: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(signal)
            .await
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/invoices/submit",
            post(handlers::invoices::submit_invoice).options(handlers::preflight),
        )
        .route(
            "/webhooks/zatca",
            post(handlers::webhooks::zatca_webhook).options(handlers::preflight),
        )
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ))
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            }),
        )
        .with_state(state)
}
