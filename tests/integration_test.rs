//! Integration tests for the zentinel-soap-dispatch crate.
//!
//! These tests exercise the public API surface end-to-end: requests go
//! through an axum router into the dispatcher, and handlers inspect the
//! envelope they receive.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tower::ServiceExt;

use zentinel_soap_dispatch::config::{ServerConfig, SettingsConfig};
use zentinel_soap_dispatch::server::{build_dispatcher, build_router};
use zentinel_soap_dispatch::{
    parse_envelope, Envelope, SoapDispatchConfig, SoapDispatcher, SoapHandler, SoapRequest,
};

// ============================================================================
// Helpers
// ============================================================================

/// Handler that records every envelope it is given.
#[derive(Clone, Default)]
struct Capture {
    calls: Arc<AtomicUsize>,
    envelopes: Arc<Mutex<Vec<Envelope>>>,
}

impl Capture {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last(&self) -> Envelope {
        self.envelopes.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait::async_trait]
impl SoapHandler for Capture {
    async fn handle(&self, request: SoapRequest) -> Response {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.envelopes.lock().unwrap().push(request.envelope().clone());
        (StatusCode::OK, format!("handled {}", request.action())).into_response()
    }
}

fn router_with(dispatcher: SoapDispatcher) -> Router {
    let server = ServerConfig {
        path: "/soap".to_string(),
        ..Default::default()
    };
    build_router(&server, dispatcher.into_service())
}

fn post(soap_action: Option<&str>, content_type: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/soap");
    if let Some(sa) = soap_action {
        builder = builder.header("SOAPAction", sa);
    }
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn read_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

const SOAP_11_REQUEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"
               xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <soap:Header>
    <m:RequestId xmlns:m="http://example.org/meta">REQ-12345</m:RequestId>
  </soap:Header>
  <soap:Body><usr:GetUserProfile xmlns:usr="http://example.org/users/v2"><usr:UserId>42</usr:UserId></usr:GetUserProfile></soap:Body>
</soap:Envelope>"#;

// ============================================================================
// End-to-end: dispatch
// ============================================================================

#[tokio::test]
async fn test_e2e_example_scenario() {
    let capture = Capture::default();
    let mut dispatcher = SoapDispatcher::default();
    dispatcher.register("\"DoWork\"", capture.clone());

    let response = router_with(dispatcher)
        .oneshot(post(
            Some("\"DoWork\""),
            None,
            "<Envelope><Header/><Body><Foo>bar</Foo></Body></Envelope>",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_text(response).await, "handled \"DoWork\"");
    assert_eq!(capture.calls(), 1);
    assert_eq!(capture.last().body_content(), Some(&b"<Foo>bar</Foo>"[..]));
}

#[tokio::test]
async fn test_e2e_soap_11_request() {
    let capture = Capture::default();
    let mut dispatcher = SoapDispatcher::default();
    dispatcher.register("http://example.org/users/v2/GetUserProfile", capture.clone());

    let response = router_with(dispatcher)
        .oneshot(post(
            Some("http://example.org/users/v2/GetUserProfile"),
            Some("text/xml; charset=utf-8"),
            SOAP_11_REQUEST,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let envelope = capture.last();
    assert_eq!(
        envelope.namespaces.get("soap").map(String::as_str),
        Some("http://schemas.xmlsoap.org/soap/envelope/")
    );
    let header = envelope.header.as_ref().unwrap();
    let request_id = header.find("RequestId").unwrap();
    assert_eq!(request_id.content, "REQ-12345");
    assert_eq!(
        envelope.body_content(),
        Some(&br#"<usr:GetUserProfile xmlns:usr="http://example.org/users/v2"><usr:UserId>42</usr:UserId></usr:GetUserProfile>"#[..])
    );
}

#[tokio::test]
async fn test_e2e_soap_12_content_type_action() {
    let capture = Capture::default();
    let mut dispatcher = SoapDispatcher::default();
    dispatcher.register("urn:SearchProducts", capture.clone());

    let response = router_with(dispatcher)
        .oneshot(post(
            None,
            Some(r#"application/soap+xml;charset=UTF-8;SOAPAction = "urn:SearchProducts""#),
            r#"<soap12:Envelope xmlns:soap12="http://www.w3.org/2003/05/soap-envelope"><soap12:Body><Query>x</Query></soap12:Body></soap12:Envelope>"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(capture.calls(), 1);
}

#[tokio::test]
async fn test_e2e_header_beats_content_type() {
    let header_handler = Capture::default();
    let content_type_handler = Capture::default();
    let mut dispatcher = SoapDispatcher::default();
    dispatcher
        .register("FromHeader", header_handler.clone())
        .register("FromContentType", content_type_handler.clone());

    let response = router_with(dispatcher)
        .oneshot(post(
            Some("FromHeader"),
            Some(r#"text/xml; SOAPAction="FromContentType""#),
            "<E><Body/></E>",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_handler.calls(), 1);
    assert_eq!(content_type_handler.calls(), 0);
}

#[tokio::test]
async fn test_e2e_last_registration_wins() {
    let first = Capture::default();
    let second = Capture::default();
    let mut dispatcher = SoapDispatcher::default();
    dispatcher.register("A", first.clone());
    dispatcher.register("A", second.clone());

    router_with(dispatcher)
        .oneshot(post(Some("A"), None, "<E><Body/></E>"))
        .await
        .unwrap();

    assert_eq!(first.calls(), 0);
    assert_eq!(second.calls(), 1);
}

#[tokio::test]
async fn test_e2e_method_is_ignored() {
    let capture = Capture::default();
    let mut dispatcher = SoapDispatcher::default();
    dispatcher.register("A", capture.clone());

    let request = Request::builder()
        .method("PUT")
        .uri("/soap")
        .header("SOAPAction", "A")
        .body(Body::from("<E><Body/></E>"))
        .unwrap();
    let response = router_with(dispatcher).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(capture.calls(), 1);
}

// ============================================================================
// End-to-end: fixed error responses
// ============================================================================

#[tokio::test]
async fn test_e2e_malformed_xml() {
    let capture = Capture::default();
    let mut dispatcher = SoapDispatcher::default();
    dispatcher.register("A", capture.clone());

    let response = router_with(dispatcher)
        .oneshot(post(Some("A"), None, "<Envelope><Body></Header></Envelope>"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let text = read_text(response).await;
    assert!(text.starts_with("XML syntax error"), "got: {}", text);
    assert_eq!(capture.calls(), 0);
}

#[tokio::test]
async fn test_e2e_unresolved_action() {
    let response = router_with(SoapDispatcher::default())
        .oneshot(post(None, Some("text/xml"), "<E><Body/></E>"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );
    assert_eq!(read_text(response).await, "unsupported SOAP body type");
}

#[tokio::test]
async fn test_e2e_missing_handler() {
    let mut dispatcher = SoapDispatcher::default();
    dispatcher.register("getuser", Capture::default());

    let response = router_with(dispatcher)
        .oneshot(post(Some("GetUser"), None, "<E><Body/></E>"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    assert_eq!(
        read_text(response).await,
        "handler for this SOAP action is missing"
    );
}

#[tokio::test]
async fn test_e2e_depth_limit_from_settings() {
    let mut dispatcher = SoapDispatcher::new(SettingsConfig {
        max_depth: 4,
        ..Default::default()
    });
    dispatcher.register("A", Capture::default());
    let router = router_with(dispatcher);

    let ok = router
        .clone()
        .oneshot(post(Some("A"), None, "<E><Body><a><b/></a></Body></E>"))
        .await
        .unwrap();
    assert_eq!(ok.status(), StatusCode::OK);

    let too_deep = router
        .oneshot(post(Some("A"), None, "<E><Body><a><b><c/></b></a></Body></E>"))
        .await
        .unwrap();
    assert_eq!(too_deep.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        read_text(too_deep).await,
        "XML nesting exceeds maximum depth 4"
    );
}

// ============================================================================
// Envelope structure
// ============================================================================

#[test]
fn test_fault_with_deep_details() {
    let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
<soap:Body>
<soap:Fault>
<faultcode>soap:Client</faultcode>
<faultstring>Invalid request</faultstring>
<detail>
<d1 level="1">a<d2 level="2">b<d3 level="3">c<d4 level="4">d<d5 level="5">e</d5></d4></d3></d2></d1>
<other/>
</detail>
</soap:Fault>
</soap:Body>
</soap:Envelope>"#;

    let envelope = parse_envelope(xml.as_bytes()).unwrap();
    let fault = envelope.fault().unwrap();
    assert_eq!(fault.code, "soap:Client");
    assert_eq!(fault.string, "Invalid request");
    assert!(fault.actor.is_empty());

    let names: Vec<&str> = fault
        .detail
        .sub_faults
        .iter()
        .map(|d| d.name.local.as_str())
        .collect();
    assert_eq!(names, vec!["d1", "other"]);

    let mut node = &fault.detail.sub_faults[0];
    assert_eq!(node.depth(), 5);
    for (i, text) in ["a", "b", "c", "d", "e"].iter().enumerate() {
        let level = (i + 1).to_string();
        assert_eq!(node.name.local, format!("d{}", level));
        assert_eq!(node.attr("level"), Some(level.as_str()));
        assert_eq!(node.content, *text);
        if let Some(next) = node.children.first() {
            node = next;
        }
    }
}

#[test]
fn test_vendor_sub_headers_preserved() {
    let xml = r#"<Envelope xmlns:v="urn:vendor">
<Header>
  <v:Auth v:scheme="token" v:realm="x"><v:Token>abc</v:Token><v:Scope>read</v:Scope><v:Scope>write</v:Scope></v:Auth>
  <v:Trace id="t1"/>
</Header>
<Body/>
</Envelope>"#;

    let envelope = parse_envelope(xml.as_bytes()).unwrap();
    let header = envelope.header.unwrap();
    assert_eq!(header.sub_headers.len(), 2);

    let auth = &header.sub_headers[0];
    assert_eq!(auth.name.namespace.as_deref(), Some("urn:vendor"));
    let attrs: Vec<(&str, Option<&str>, &str)> = auth
        .attrs
        .iter()
        .map(|a| (a.name.local.as_str(), a.name.namespace.as_deref(), a.value.as_str()))
        .collect();
    assert_eq!(
        attrs,
        vec![("scheme", Some("urn:vendor"), "token"), ("realm", Some("urn:vendor"), "x")]
    );
    let children: Vec<(&str, &str)> = auth
        .children
        .iter()
        .map(|c| (c.name.local.as_str(), c.content.as_str()))
        .collect();
    assert_eq!(children, vec![("Token", "abc"), ("Scope", "read"), ("Scope", "write")]);

    assert_eq!(header.sub_headers[1].attr("id"), Some("t1"));
}

// ============================================================================
// Configuration-driven server
// ============================================================================

#[tokio::test]
async fn test_config_driven_router() {
    let config = SoapDispatchConfig::from_yaml_str(
        r#"
server:
  path: /services/soap
actions:
  - action: '"urn:GetQuote"'
    body: "<soap:Envelope><soap:Body><Quote>1.5</Quote></soap:Body></soap:Envelope>"
"#,
    )
    .unwrap();
    let router = build_router(&config.server, build_dispatcher(&config).unwrap().into_service());

    let request = Request::builder()
        .method("POST")
        .uri("/services/soap")
        .header("SOAPAction", "\"urn:GetQuote\"")
        .body(Body::from("<Envelope><Body><GetQuote/></Body></Envelope>"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(read_text(response).await.contains("<Quote>1.5</Quote>"));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests() {
    let capture = Capture::default();
    let mut dispatcher = SoapDispatcher::default();
    dispatcher.register("A", capture.clone());
    let service = dispatcher.into_service();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            let body = format!("<E><Body><n>{}</n></Body></E>", i);
            let response = service.oneshot(post(Some("A"), None, &body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(capture.calls(), 32);
    let metrics = service.dispatcher().metrics();
    assert_eq!(metrics.requests, 32);
    assert_eq!(metrics.dispatched, 32);
    assert_eq!(metrics.parse_failures, 0);
}
