//! SOAP request pipeline.
//!
//! Reads the body, parses the envelope, resolves the action, looks up the
//! handler and hands the request over. Any failure before the handover ends
//! the request with one of the fixed [`DispatchError`] responses; after the
//! handover the handler owns the response.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use tower::Service;
use tracing::{debug, info, warn};

use crate::action::resolve_action;
use crate::config::SettingsConfig;
use crate::error::{DispatchError, ParseError};
use crate::parser::EnvelopeParser;
use crate::registry::{HandlerRegistry, SoapHandler, SoapRequest};

/// Snapshot of dispatcher counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchMetrics {
    pub requests: u64,
    pub dispatched: u64,
    pub parse_failures: u64,
    pub unresolved_actions: u64,
    pub missing_handlers: u64,
}

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    dispatched: AtomicU64,
    parse_failures: AtomicU64,
    unresolved_actions: AtomicU64,
    missing_handlers: AtomicU64,
}

/// Routes SOAP requests to handlers by action.
///
/// Handlers are registered through `&mut self`; once the dispatcher is turned
/// into a [`SoapService`] it is shared read-only.
#[derive(Debug)]
pub struct SoapDispatcher {
    settings: SettingsConfig,
    parser: EnvelopeParser,
    registry: HandlerRegistry,
    counters: Counters,
}

impl Default for SoapDispatcher {
    fn default() -> Self {
        Self::new(SettingsConfig::default())
    }
}

impl SoapDispatcher {
    /// Create a dispatcher with no handlers.
    pub fn new(settings: SettingsConfig) -> Self {
        Self {
            parser: EnvelopeParser::new(settings.max_depth),
            settings,
            registry: HandlerRegistry::new(),
            counters: Counters::default(),
        }
    }

    /// Bind a handler to an action. A previous binding for the same action is replaced.
    pub fn register<H>(&mut self, action: impl Into<String>, handler: H) -> &mut Self
    where
        H: SoapHandler + 'static,
    {
        let action = action.into();
        if self.registry.register(action.clone(), handler).is_some() {
            info!(action = %action, "Replaced handler for SOAP action");
        } else {
            debug!(action = %action, "Registered handler for SOAP action");
        }
        self
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &SettingsConfig {
        &self.settings
    }

    /// Current counter values.
    pub fn metrics(&self) -> DispatchMetrics {
        DispatchMetrics {
            requests: self.counters.requests.load(Ordering::Relaxed),
            dispatched: self.counters.dispatched.load(Ordering::Relaxed),
            parse_failures: self.counters.parse_failures.load(Ordering::Relaxed),
            unresolved_actions: self.counters.unresolved_actions.load(Ordering::Relaxed),
            missing_handlers: self.counters.missing_handlers.load(Ordering::Relaxed),
        }
    }

    /// Freeze the registry and wrap the dispatcher as a cloneable tower service.
    pub fn into_service(self) -> SoapService {
        SoapService {
            dispatcher: Arc::new(self),
        }
    }

    /// Run one request through the pipeline.
    pub async fn dispatch(&self, request: Request<Body>) -> Response {
        self.counters.requests.fetch_add(1, Ordering::Relaxed);

        debug!(
            method = %request.method(),
            path = %request.uri().path(),
            "Processing SOAP request"
        );

        match self.prepare(request).await {
            Ok((handler, request)) => {
                self.counters.dispatched.fetch_add(1, Ordering::Relaxed);
                debug!(action = %request.action(), "Dispatching SOAP request");
                handler.handle(request).await
            }
            Err(err) => {
                self.record_failure(&err);
                err.into_response()
            }
        }
    }

    async fn prepare(
        &self,
        request: Request<Body>,
    ) -> Result<(Arc<dyn SoapHandler>, SoapRequest), DispatchError> {
        let (parts, body) = request.into_parts();

        let body = read_body(body, self.settings.max_body_size).await?;
        let envelope = self.parser.parse(&body)?;

        let resolved = resolve_action(&parts.headers)?;
        debug!(
            action = %resolved.action,
            source = %resolved.source,
            "Resolved SOAP action"
        );

        let handler = self
            .registry
            .lookup(&resolved.action)
            .cloned()
            .ok_or_else(|| DispatchError::MissingHandler {
                action: resolved.action.clone(),
            })?;

        Ok((handler, SoapRequest::new(parts, body, envelope, resolved.action)))
    }

    fn record_failure(&self, err: &DispatchError) {
        let counter = match err {
            DispatchError::Parse(_) => &self.counters.parse_failures,
            DispatchError::UnresolvedAction => &self.counters.unresolved_actions,
            DispatchError::MissingHandler { .. } => &self.counters.missing_handlers,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        match err {
            DispatchError::MissingHandler { action } => warn!(
                code = %err.as_str(),
                action = %action,
                "No handler registered for SOAP action"
            ),
            _ => warn!(
                code = %err.as_str(),
                status = err.status().as_u16(),
                message = %err,
                "SOAP request rejected"
            ),
        }
    }
}

/// Read the whole body, up to `limit` bytes.
///
/// The stream is consumed here, so it is released exactly once however the
/// rest of the pipeline ends.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, ParseError> {
    let result = axum::body::to_bytes(body, limit).await;
    debug!(ok = result.is_ok(), "Request body released");
    result.map_err(|e| ParseError::Read(e.to_string()))
}

/// Shared, cloneable handle to a configured [`SoapDispatcher`].
#[derive(Debug, Clone)]
pub struct SoapService {
    dispatcher: Arc<SoapDispatcher>,
}

impl SoapService {
    pub fn dispatcher(&self) -> &SoapDispatcher {
        &self.dispatcher
    }
}

impl Service<Request<Body>> for SoapService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let dispatcher = Arc::clone(&self.dispatcher);
        Box::pin(async move { Ok(dispatcher.dispatch(request).await) })
    }
}
