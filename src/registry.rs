//! Action to handler registry.
//!
//! Filled while the dispatcher is being configured and read-only once it is
//! shared, so lookups take no lock.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;

use crate::envelope::Envelope;

/// A request that made it through parsing and action resolution.
///
/// Carries the original request head and raw body next to the parsed
/// envelope and the resolved action.
#[derive(Debug)]
pub struct SoapRequest {
    parts: Parts,
    body: Bytes,
    envelope: Envelope,
    action: String,
}

impl SoapRequest {
    pub fn new(parts: Parts, body: Bytes, envelope: Envelope, action: String) -> Self {
        Self {
            parts,
            body,
            envelope,
            action,
        }
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    /// Raw request body as received.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Request head (with extensions), for handlers that need more than the accessors.
    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    pub fn into_parts(self) -> (Parts, Bytes, Envelope) {
        (self.parts, self.body, self.envelope)
    }
}

/// Handler bound to one SOAP action. Owns the entire response.
#[async_trait]
pub trait SoapHandler: Send + Sync {
    async fn handle(&self, request: SoapRequest) -> Response;
}

#[async_trait]
impl<F, Fut> SoapHandler for F
where
    F: Fn(SoapRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    async fn handle(&self, request: SoapRequest) -> Response {
        (self)(request).await
    }
}

/// Mapping from action string to its handler.
///
/// Keys compare with exact, case-sensitive equality. Registering a key again
/// replaces the previous handler.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn SoapHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `action`, returning the handler it replaced.
    pub fn register<H>(&mut self, action: impl Into<String>, handler: H) -> Option<Arc<dyn SoapHandler>>
    where
        H: SoapHandler + 'static,
    {
        self.register_arc(action, Arc::new(handler))
    }

    /// Bind an already shared handler.
    pub fn register_arc(
        &mut self,
        action: impl Into<String>,
        handler: Arc<dyn SoapHandler>,
    ) -> Option<Arc<dyn SoapHandler>> {
        self.handlers.insert(action.into(), handler)
    }

    pub fn lookup(&self, action: &str) -> Option<&Arc<dyn SoapHandler>> {
        self.handlers.get(action)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered actions, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("actions", &self.actions())
            .finish()
    }
}
