//! Session provider: the only place a request meets the network.
//!
//! # Design
//! Services hold an `Arc<dyn Session>` and never talk to a socket directly.
//! Logging in and refreshing tokens belong to whoever constructs the session;
//! a `Session` only knows its base URL and how to execute one request.

use std::borrow::Cow;
use std::time::Duration;

use tracing::{debug, error};

use crate::error::{OdkError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Authenticated HTTP transport shared by every resource service.
pub trait Session: Send + Sync {
    /// Server root without the `/v1` API prefix and without a trailing slash.
    fn base_url(&self) -> &str;

    /// Perform one blocking round-trip. Non-2xx statuses are returned as data.
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `{base_url}/v1/{path}`, with `path` stripped of surrounding slashes.
pub fn api_url(session: &dyn Session, path: &str) -> String {
    format!("{}/v1/{}", session.base_url(), path.trim_matches('/'))
}

/// Percent-encode one identifier for use as a single path segment, so that
/// `/`, `?`, `#` and spaces inside it cannot change the request target.
pub fn path_segment(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Blocking [`Session`] backed by a `ureq` agent.
///
/// Status codes are never turned into transport errors here; interpreting
/// them is the response validator's job.
#[derive(Debug, Clone)]
pub struct UreqSession {
    base_url: String,
    token: Option<String>,
    agent: ureq::Agent,
}

impl UreqSession {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            agent,
        }
    }

    /// Attach a bearer token obtained elsewhere.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn decorate<B>(&self, mut builder: ureq::RequestBuilder<B>, request: &HttpRequest) -> ureq::RequestBuilder<B> {
        if let Some(token) = &self.token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (key, value) in &request.query {
            builder = builder.query(key.as_str(), value.as_str());
        }
        builder
    }

    /// Send the body as JSON unless the caller already set a content type.
    fn send(
        &self,
        builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
        request: &HttpRequest,
    ) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        let Some(body) = &request.body else {
            return builder.send_empty();
        };
        let has_content_type = request
            .headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
        if has_content_type {
            builder.send(body.as_bytes())
        } else {
            builder.content_type("application/json").send(body.as_bytes())
        }
    }
}

impl Session for UreqSession {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = request.method.as_str(), url = %request.url, "sending request");

        let url = request.url.as_str();
        let result = match request.method {
            HttpMethod::Get => self.decorate(self.agent.get(url), &request).call(),
            HttpMethod::Delete => self.decorate(self.agent.delete(url), &request).call(),
            HttpMethod::Post => self.send(self.decorate(self.agent.post(url), &request), &request),
            HttpMethod::Put => self.send(self.decorate(self.agent.put(url), &request), &request),
            HttpMethod::Patch => self.send(self.decorate(self.agent.patch(url), &request), &request),
        };
        let mut response = result.map_err(|e| {
            error!(error = %e, url = %request.url, "transport failure");
            OdkError::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| OdkError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}



#[cfg(test)]
mod tests {
    use super::wire::{capture_one_request, header_count};
    use super::*;
    use crate::error::log_capture::error_events;

    #[test]
    fn trailing_slash_is_stripped() {
        let session = UreqSession::new("https://central.example.com/");
        assert_eq!(session.base_url(), "https://central.example.com");
    }

    #[test]
    fn connection_failure_is_a_transport_error() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let base = format!("http://{addr}");
        let session = UreqSession::with_timeout(&base, Duration::from_secs(2));
        let (result, errors) = error_events(|| session.execute(HttpRequest::get(format!("{base}/v1/projects"))));
        assert!(matches!(result, Err(OdkError::Transport(_))));
        assert_eq!(errors, 1);
    }

    fn post_with_headers(headers: Vec<(String, String)>) -> String {
        let (base, rx) = capture_one_request();
        let session = UreqSession::with_timeout(&base, Duration::from_secs(5));
        let mut request = HttpRequest::get(format!("{base}/v1/projects"));
        request.method = HttpMethod::Post;
        request.headers = headers;
        request.body = Some(r#"{"name":"x"}"#.to_string());
        let response = session.execute(request).unwrap();
        assert_eq!(response.status, 200);
        rx.recv_timeout(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn body_gets_json_content_type_once() {
        let raw = post_with_headers(Vec::new());
        assert_eq!(header_count(&raw, "content-type"), 1, "{raw}");
        assert!(raw.to_ascii_lowercase().contains("content-type: application/json"), "{raw}");
        assert!(raw.contains(r#"{"name":"x"}"#), "{raw}");
    }

    #[test]
    fn caller_content_type_is_not_duplicated() {
        let raw = post_with_headers(vec![("Content-Type".to_string(), "application/json".to_string())]);
        assert_eq!(header_count(&raw, "content-type"), 1, "{raw}");
    }

    #[test]
    fn caller_content_type_wins() {
        let raw = post_with_headers(vec![("content-type".to_string(), "text/xml".to_string())]);
        assert_eq!(header_count(&raw, "content-type"), 1, "{raw}");
        assert!(raw.to_ascii_lowercase().contains("content-type: text/xml"), "{raw}");
    }

    #[test]
    fn path_segment_encodes_reserved_characters() {
        assert_eq!(path_segment("range"), "range");
        assert_eq!(path_segment("uuid:a"), "uuid%3Aa");
        assert_eq!(path_segment("a b/c?d#e"), "a%20b%2Fc%3Fd%23e");
        assert_eq!(path_segment("Submissions.children.child"), "Submissions.children.child");
    }
}
