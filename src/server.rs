//! HTTP hosting for the dispatcher.
//!
//! Mounts a [`SoapService`] in an axum router and provides the canned
//! [`StaticResponder`] handler the standalone binary registers per configured
//! action.

use std::future::Future;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::{ServerConfig, SoapDispatchConfig, StaticActionConfig};
use crate::dispatcher::{SoapDispatcher, SoapService};
use crate::error::ConfigError;
use crate::registry::{SoapHandler, SoapRequest};

/// Handler answering every request with the same response.
#[derive(Debug, Clone)]
pub struct StaticResponder {
    status: StatusCode,
    content_type: HeaderValue,
    body: Bytes,
}

impl StaticResponder {
    pub fn new(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Result<Self, ConfigError> {
        let content_type = HeaderValue::from_str(content_type)
            .map_err(|e| ConfigError::Invalid(format!("invalid content type {:?}: {}", content_type, e)))?;
        Ok(Self {
            status,
            content_type,
            body: body.into(),
        })
    }

    pub fn from_config(config: &StaticActionConfig) -> Result<Self, ConfigError> {
        Self::new(config.status_code()?, &config.content_type, config.body.clone())
    }
}

#[async_trait]
impl SoapHandler for StaticResponder {
    async fn handle(&self, request: SoapRequest) -> Response {
        debug!(
            action = %request.action(),
            status = self.status.as_u16(),
            "Serving static SOAP response"
        );
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type.clone())],
            self.body.clone(),
        )
            .into_response()
    }
}

/// Build a dispatcher with a [`StaticResponder`] for every configured action.
pub fn build_dispatcher(config: &SoapDispatchConfig) -> Result<SoapDispatcher, ConfigError> {
    let mut dispatcher = SoapDispatcher::new(config.settings.clone());
    for action in &config.actions {
        dispatcher.register(action.action.clone(), StaticResponder::from_config(action)?);
    }
    Ok(dispatcher)
}

/// Router serving the dispatcher at the configured path.
pub fn build_router(config: &ServerConfig, service: SoapService) -> Router {
    Router::new()
        .route_service(&config.path, service)
        .layer(TraceLayer::new_for_http())
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(address = %addr, "SOAP dispatch server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("SOAP dispatch server stopped");
    Ok(())
}
