//! HTTP agent and structured responses

use attest_core::{EntityId, JsonSnapshot, JsonSnapshotable, Relation};
use attest_journal::{BoxSink, Journal, Metadata};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use std::sync::Arc;

use crate::{Error, HttpScrubber, NoopScrubber, Result};

/// Outcome of one HTTP exchange
///
/// Either a status code with the response body, or the transport error
/// that kept a response from arriving. Transport failures never
/// propagate out of the agent as errors; they arrive here as data.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    http_code: Option<u16>,
    output: Option<String>,
    error: Option<String>,
}

impl HttpResponse {
    /// A response that arrived with a status code
    pub fn received(http_code: u16, output: impl Into<String>) -> Self {
        Self {
            http_code: Some(http_code),
            output: Some(output.into()),
            error: None,
        }
    }

    /// An exchange that failed in transport
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            http_code: None,
            output: None,
            error: Some(error.into()),
        }
    }

    /// The HTTP status code, if a response arrived
    pub fn http_code(&self) -> Option<u16> {
        self.http_code
    }

    /// The response body, if a response arrived
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// The transport error, if the exchange failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the status code indicates success (2xx)
    pub fn ok(&self) -> bool {
        matches!(self.http_code, Some(code) if (200..300).contains(&code))
    }

    /// What went wrong, if anything: the transport error, else the
    /// response body of a non-2xx response
    pub fn error_message(&self) -> Option<&str> {
        if self.ok() {
            return None;
        }
        self.error.as_deref().or(self.output.as_deref())
    }

    /// Error out unless the response is 2xx
    pub fn check_ok(&self) -> Result<()> {
        if self.ok() {
            return Ok(());
        }
        Err(Error::UnexpectedResponse {
            code: self.http_code,
            body: self.error_message().unwrap_or("").to_string(),
        })
    }

    /// Snapshot export with a payload `format` tag on the output edge
    pub fn export_with_format(
        &self,
        snapshot: &mut JsonSnapshot,
        entity: EntityId,
        format: Option<&str>,
    ) -> attest_core::Result<()> {
        let mut builder = snapshot.edge_builder();
        let code = builder.make(
            entity,
            "HTTP Code",
            match self.http_code {
                Some(code) => serde_json::Value::from(code),
                None => serde_json::Value::Null,
            },
        );
        if !self.ok() {
            code.set_relation(Relation::Error);
        }
        if let Some(error) = &self.error {
            builder.make_error(entity, "Response Error", error);
        }
        if let Some(output) = &self.output {
            let edge = builder.make_output(entity, "Response Output", output.as_str());
            if let Some(format) = format {
                edge.add_metadata("format", format);
            }
        }
        Ok(())
    }
}

impl std::fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "http_code={:?} output={:?} error={:?}",
            self.http_code, self.output, self.error
        )
    }
}

impl JsonSnapshotable for HttpResponse {
    fn export_to_json_snapshot(
        &self,
        snapshot: &mut JsonSnapshot,
        entity: EntityId,
    ) -> attest_core::Result<()> {
        self.export_with_format(snapshot, entity, None)
    }

    fn snapshot_summary(&self) -> Option<String> {
        Some(match self.http_code {
            Some(code) => format!("HTTP {}", code),
            None => "HTTP transport failure".to_string(),
        })
    }
}

/// Synchronous HTTP driver for one service under test
///
/// Joins paths onto a base URL, applies default headers, scrubs URLs
/// and payloads, and - when a journal is attached - records every
/// request and response as provenance.
pub struct HttpAgent {
    base_url: String,
    headers: Vec<(String, String)>,
    client: Client,
    scrubber: Arc<dyn HttpScrubber>,
    journal: Option<Arc<Journal<BoxSink>>>,
}

impl HttpAgent {
    /// Create an agent for the service at `base_url`
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self {
            base_url: base_url.into(),
            headers: Vec::new(),
            client,
            scrubber: Arc::new(NoopScrubber),
            journal: None,
        })
    }

    /// The bound base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Add a header sent with every request that follows
    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.push((key.into(), value.into()));
    }

    /// Add an `Authorization` header for HTTP basic authentication
    pub fn add_basic_auth_header(&mut self, user: &str, password: &str) {
        let encoded = BASE64.encode(format!("{}:{}", user, password));
        self.add_header("Authorization", format!("Basic {}", encoded));
    }

    /// Replace the scrubber applied before journaling and logging
    pub fn set_scrubber(&mut self, scrubber: impl HttpScrubber + 'static) {
        self.scrubber = Arc::new(scrubber);
    }

    /// Record every exchange of this agent into `journal`
    pub fn attach_journal(&mut self, journal: Arc<Journal<BoxSink>>) {
        self.journal = Some(journal);
    }

    /// Perform an HTTP GET
    pub fn get(&self, path: &str) -> Result<HttpResponse> {
        self.request(Method::GET, path, None, None)
    }

    /// Perform an HTTP POST with a JSON payload
    pub fn post(&self, path: &str, payload: &str) -> Result<HttpResponse> {
        self.request(Method::POST, path, Some(payload), None)
    }

    /// Perform an HTTP PUT with a JSON payload
    pub fn put(&self, path: &str, payload: &str) -> Result<HttpResponse> {
        self.request(Method::PUT, path, Some(payload), None)
    }

    /// Perform an HTTP DELETE, optionally with a JSON payload
    pub fn delete(&self, path: &str, payload: Option<&str>) -> Result<HttpResponse> {
        self.request(Method::DELETE, path, payload, None)
    }

    /// Perform an arbitrary HTTP exchange
    ///
    /// `content_type` defaults to `application/json` when a payload is
    /// present. Transport failures come back inside the response; only
    /// journaling failures propagate as errors, because an unrecorded
    /// exchange would corrupt provenance.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&str>,
        content_type: Option<&str>,
    ) -> Result<HttpResponse> {
        let url = self.join_url(path);
        let scrubbed_url = self.scrubber.scrub_url(&url);
        log::debug!("{} {}", method, scrubbed_url);

        if let Some(journal) = &self.journal {
            let mut metadata = Metadata::new();
            metadata.insert("context".to_string(), "request".into());
            metadata.insert("method".to_string(), method.as_str().into());
            if let Some(payload) = payload {
                metadata.insert(
                    "payload".to_string(),
                    self.scrubber.scrub_request(payload).into(),
                );
            }
            journal.write_message_with(&format!("{} {}", method, scrubbed_url), metadata)?;
        }

        let mut request = self.client.request(method, &url);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        if let Some(payload) = payload {
            request = request
                .header(CONTENT_TYPE, content_type.unwrap_or("application/json"))
                .body(payload.to_string());
        }

        let response = match request.send() {
            Ok(response) => {
                let code = response.status().as_u16();
                match response.text() {
                    Ok(output) => HttpResponse::received(code, output),
                    Err(err) => HttpResponse {
                        http_code: Some(code),
                        output: None,
                        error: Some(err.to_string()),
                    },
                }
            }
            Err(err) => {
                log::warn!("{} failed: {}", scrubbed_url, err);
                HttpResponse::failed(err.to_string())
            }
        };

        if let Some(journal) = &self.journal {
            let mut metadata = Metadata::new();
            metadata.insert("context".to_string(), "response".into());
            if let Some(output) = response.output() {
                metadata.insert(
                    "output".to_string(),
                    self.scrubber.scrub_response(output).into(),
                );
            }
            let message = match (response.http_code(), response.error()) {
                (Some(code), _) => format!("HTTP {}", code),
                (None, Some(error)) => format!("HTTP request failed: {}", error),
                (None, None) => "HTTP request failed".to_string(),
            };
            journal.write_message_with(&message, metadata)?;
        }

        Ok(response)
    }

    fn join_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, path)
        }
    }
}

impl JsonSnapshotable for HttpAgent {
    fn export_to_json_snapshot(
        &self,
        snapshot: &mut JsonSnapshot,
        entity: EntityId,
    ) -> attest_core::Result<()> {
        snapshot
            .edge_builder()
            .make_control(entity, "Base URL", self.base_url.as_str());
        Ok(())
    }

    fn snapshot_summary(&self) -> Option<String> {
        Some(format!("HttpAgent({})", self.base_url))
    }
}
