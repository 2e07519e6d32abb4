//! HTTP transport seam.
//!
//! Everything above this module builds fully-signed requests and interprets
//! status codes and bodies; the transport only moves bytes. Keeping the seam
//! this narrow lets the integration tests drive the whole session against a
//! scripted transport with no network.

use std::collections::BTreeMap;
use std::io::Read;

use crate::error::{Result, S3Error};

/// A fully prepared request: signed headers, final URL, payload.
#[derive(Debug)]
pub struct TransportRequest<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub headers: &'a BTreeMap<String, String>,
    pub body: &'a [u8],
    pub disable_ssl_verify: bool,
}

/// Receives the response incrementally, headers first and then body chunks
/// in arrival order.
pub trait ResponseSink {
    fn on_header(&mut self, name: &str, value: &str);
    fn on_body(&mut self, chunk: &[u8]);
}

/// Blocking request executor. Returns the HTTP status code; transport-level
/// failures (connect, TLS, read) are errors, HTTP error statuses are not.
pub trait Transport {
    fn perform(&mut self, request: &TransportRequest<'_>, sink: &mut dyn ResponseSink)
        -> Result<u16>;
}

const BODY_READ_CHUNK: usize = 16 * 1024;

/// Default transport on a blocking reqwest client.
///
/// The client is rebuilt only when the TLS-verification flag changes, so
/// connection pooling survives across requests.
pub struct HttpTransport {
    client: Option<(bool, reqwest::blocking::Client)>,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { client: None }
    }

    fn client(&mut self, disable_ssl_verify: bool) -> Result<&reqwest::blocking::Client> {
        let needs_rebuild = match &self.client {
            Some((flag, _)) => *flag != disable_ssl_verify,
            None => true,
        };
        if needs_rebuild {
            if disable_ssl_verify {
                tracing::warn!("TLS certificate verification is disabled");
            }
            let client = reqwest::blocking::Client::builder()
                .danger_accept_invalid_certs(disable_ssl_verify)
                .build()
                .map_err(|e| S3Error::RequestError(e.to_string()))?;
            self.client = Some((disable_ssl_verify, client));
        }
        match &self.client {
            Some((_, client)) => Ok(client),
            None => Err(S3Error::Impossible),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn perform(
        &mut self,
        request: &TransportRequest<'_>,
        sink: &mut dyn ResponseSink,
    ) -> Result<u16> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| S3Error::RequestError(e.to_string()))?;

        let mut header_map = reqwest::header::HeaderMap::new();
        for (name, value) in request.headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| S3Error::RequestError(e.to_string()))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| S3Error::RequestError(e.to_string()))?;
            header_map.insert(name, value);
        }

        let client = self.client(request.disable_ssl_verify)?;
        let mut response = client
            .request(method, request.url)
            .headers(header_map)
            .body(request.body.to_vec())
            .send()
            .map_err(|e| S3Error::RequestError(e.to_string()))?;

        let status = response.status().as_u16();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                sink.on_header(name.as_str(), value);
            }
        }

        let mut chunk = [0u8; BODY_READ_CHUNK];
        loop {
            let n = response
                .read(&mut chunk)
                .map_err(|e| S3Error::RequestError(e.to_string()))?;
            if n == 0 {
                break;
            }
            sink.on_body(&chunk[..n]);
        }

        Ok(status)
    }
}
