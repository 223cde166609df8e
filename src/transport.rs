//! HTTP exchange types and the pluggable [`Transport`].
//!
//! The executor only builds [`HttpRequest`] values and reads [`HttpResponse`]
//! values; connection handling, TLS, pooling, and cancellation belong to the
//! transport.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;
use url::Url;

use crate::error::TransportError;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for outgoing calls (30 seconds).
#[cfg(feature = "remote")]
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully prepared request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// First value of header `name` as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// A response as received from the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    /// A response carrying `value` as `application/json`.
    pub fn json(status: StatusCode, value: &Value) -> Self {
        Self::new(status)
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(value.to_string().into_bytes())
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of header `name` as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Media type of the body without parameters, lowercased.
    pub fn media_type(&self) -> Option<String> {
        let raw = self.header(CONTENT_TYPE.as_str())?;
        let essence = raw.split(';').next().unwrap_or(raw).trim();
        (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
    }

    /// Body as UTF-8 text, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends one request and returns the raw response.
///
/// Implementations must be safe to share across concurrent calls.
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns `TransportError` for connection failures, timeouts, and
    /// cancellation. HTTP error statuses are responses, not errors.
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport backed by `reqwest`.
#[cfg(feature = "remote")]
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "remote")]
impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns `TransportError` when the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(CALL_TIMEOUT)
            .build()
            .map_err(|e| TransportError::with_source("cannot build HTTP client", e))?;
        Ok(Self { client })
    }

    /// Use a preconfigured client (proxies, certificates, timeouts).
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "remote")]
impl Transport for ReqwestTransport {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.url.to_string();
        let mut builder = self
            .client
            .request(request.method, request.url.as_str())
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        let response = builder
            .send()
            .map_err(|e| TransportError::with_source(format!("request to {url} failed"), e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .map_err(|e| TransportError::with_source(format!("reading response from {url} failed"), e))?;
        Ok(HttpResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn media_type_strips_parameters() {
        let response = HttpResponse::new(StatusCode::OK).with_header(
            CONTENT_TYPE,
            HeaderValue::from_static("Application/JSON; charset=utf-8"),
        );
        assert_eq!(response.media_type().as_deref(), Some("application/json"));
        assert_eq!(HttpResponse::new(StatusCode::OK).media_type(), None);
    }

    #[test]
    fn json_response_helper() {
        let response = HttpResponse::json(StatusCode::CREATED, &json!({"id": 1}));
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.text(), r#"{"id":1}"#);
    }

    #[cfg(feature = "remote")]
    #[test]
    fn reqwest_transport_round_trip() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/pets?limit=2")
            .match_header("x-trace", "abc")
            .match_body(r#"{"name":"rex"}"#)
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":7}"#)
            .create();

        let url = Url::parse(&format!("{}/pets?limit=2", server.url())).unwrap();
        let mut request = HttpRequest::new(Method::POST, url);
        request
            .headers
            .insert("x-trace", HeaderValue::from_static("abc"));
        request.body = Some(br#"{"name":"rex"}"#.to_vec());

        let response = ReqwestTransport::new().unwrap().send(request).unwrap();
        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.text(), r#"{"id":7}"#);
        mock.assert();
    }

    #[cfg(feature = "remote")]
    #[test]
    fn reqwest_transport_connection_failure() {
        let url = Url::parse("http://127.0.0.1:9/unreachable").unwrap();
        let result = ReqwestTransport::new()
            .unwrap()
            .send(HttpRequest::new(Method::GET, url));
        assert!(result.is_err());
    }
}
