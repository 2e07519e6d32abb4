//! Scripted transport for driving a session without a network.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};

use tinys3::{ResponseSink, Result, S3Error, Transport, TransportRequest};

/// One canned response, replayed in script order.
#[derive(Debug, Clone)]
pub struct ScriptedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl ScriptedResponse {
    pub fn new(status: u16, body: &[u8]) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_vec(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// What the session actually sent, captured for assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

pub type LogHandle = Arc<Mutex<Vec<RecordedRequest>>>;

pub struct MockTransport {
    script: VecDeque<ScriptedResponse>,
    log: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    pub fn new(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            script: responses.into(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle for inspecting requests after the transport has been boxed
    /// into a session.
    pub fn log(&self) -> LogHandle {
        Arc::clone(&self.log)
    }
}

impl Transport for MockTransport {
    fn perform(
        &mut self,
        request: &TransportRequest<'_>,
        sink: &mut dyn ResponseSink,
    ) -> Result<u16> {
        self.log.lock().unwrap().push(RecordedRequest {
            method: request.method.to_string(),
            url: request.url.to_string(),
            headers: request.headers.clone(),
            body: request.body.to_vec(),
        });

        let response = self
            .script
            .pop_front()
            .ok_or_else(|| S3Error::RequestError("mock script exhausted".to_string()))?;

        for (name, value) in &response.headers {
            sink.on_header(name, value);
        }
        // Split the body so streamed accumulation is exercised.
        let mid = response.body.len() / 2;
        if mid > 0 {
            sink.on_body(&response.body[..mid]);
        }
        sink.on_body(&response.body[mid..]);

        Ok(response.status)
    }
}

pub fn requests(log: &LogHandle) -> Vec<RecordedRequest> {
    log.lock().unwrap().clone()
}
