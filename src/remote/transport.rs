//! Raw HTTP exchange with the pipeline server.
//!
//! The `Transport` trait is the seam between connection policy
//! (`RemoteClient`) and the wire. `HttpTransport` is the production
//! implementation over a blocking `reqwest` client.

use std::{io, path::Path, time::Duration};

use reqwest::blocking::{Client, RequestBuilder, multipart::Form};
use serde_json::Value;

/// Errors from a single HTTP exchange.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Other(String),
}

/// A completed HTTP exchange: status, declared content type and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body parsed as JSON, or `None` if it is not JSON.
    pub fn json(&self) -> Option<Value> {
        serde_json::from_slice(&self.body).ok()
    }

    pub fn is_json(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.starts_with("application/json"))
    }
}

/// Performs HTTP requests against absolute URLs.
pub trait Transport: Send + Sync {
    fn get(&self, url: &str, timeout: Duration) -> Result<Response, TransportError>;

    /// POST with an optional JSON body.
    fn post(&self, url: &str, body: Option<&Value>, timeout: Duration)
    -> Result<Response, TransportError>;

    /// POST a file as the `file` part of a multipart form.
    fn upload(&self, url: &str, file: &Path, timeout: Duration)
    -> Result<Response, TransportError>;

    fn delete(&self, url: &str, timeout: Duration) -> Result<Response, TransportError>;
}

/// Transport over a shared blocking `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }

    fn send(request: RequestBuilder, timeout: Duration) -> Result<Response, TransportError> {
        let response = request.timeout(timeout).send()?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes()?.to_vec();
        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, timeout: Duration) -> Result<Response, TransportError> {
        Self::send(self.client.get(url), timeout)
    }

    fn post(
        &self,
        url: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        let request = match body {
            Some(body) => self.client.post(url).json(body),
            None => self.client.post(url),
        };
        Self::send(request, timeout)
    }

    fn upload(
        &self,
        url: &str,
        file: &Path,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        let form = Form::new().file("file", file)?;
        Self::send(self.client.post(url).multipart(form), timeout)
    }

    fn delete(&self, url: &str, timeout: Duration) -> Result<Response, TransportError> {
        Self::send(self.client.delete(url), timeout)
    }
}
