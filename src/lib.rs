//! SOAP action dispatch for Zentinel
//!
//! Receives SOAP-over-HTTP requests, works out which SOAP action the caller
//! wants and hands the request, together with its parsed envelope, to the
//! handler registered for that action.
//!
//! # Pipeline
//!
//! - Read the request body (bounded)
//! - Parse the envelope: Header, opaque Body bytes, Fault, arbitrary nested
//!   sub-elements
//! - Resolve the action from `SOAPAction`, falling back to a
//!   `SOAPAction="..."` parameter in `Content-Type`
//! - Look up the handler and delegate; the handler writes the response
//!
//! Failures map to fixed responses: 400 with the parser message, 404
//! `unsupported SOAP body type`, 501 `handler for this SOAP action is missing`.
//!
//! # Example
//!
//! ```ignore
//! use zentinel_soap_dispatch::{SoapDispatcher, SoapRequest};
//! use axum::response::IntoResponse;
//!
//! let mut dispatcher = SoapDispatcher::default();
//! dispatcher.register("\"urn:GetUser\"", |req: SoapRequest| async move {
//!     let body = req.envelope().body_content().unwrap_or_default().to_vec();
//!     body.into_response()
//! });
//!
//! let app = axum::Router::new().route_service("/soap", dispatcher.into_service());
//! ```

pub mod action;
pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod error;
pub mod parser;
pub mod registry;
pub mod server;

pub use action::{resolve_action, ActionSource, ResolvedAction};
pub use config::SoapDispatchConfig;
pub use dispatcher::{DispatchMetrics, SoapDispatcher, SoapService};
pub use envelope::{Body, Detail, Element, Envelope, Fault, Header, SubDetail, SubHeader, XmlAttr, XmlName};
pub use error::{ConfigError, DispatchError, ParseError};
pub use parser::{parse_envelope, EnvelopeParser};
pub use registry::{HandlerRegistry, SoapHandler, SoapRequest};
