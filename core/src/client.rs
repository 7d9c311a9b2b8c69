//! Entry point tying configuration, session and resource services together.
//!
//! # Design
//! `Client` owns no mutable state. The effective default project id is
//! computed once in the constructor (explicit override, else the configured
//! value) and handed to each service, so services never consult globals.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::forms::FormService;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::projects::ProjectService;
use crate::session::{api_url, Session, UreqSession};
use crate::submissions::SubmissionService;

#[derive(Clone)]
pub struct Client {
    config: Config,
    session: Arc<dyn Session>,
    projects: ProjectService,
    forms: FormService,
    submissions: SubmissionService,
}

impl Client {
    /// Build a client over an already-authenticated session.
    pub fn new(config: Config, session: Arc<dyn Session>) -> Self {
        let default_project_id = config.central.default_project_id;
        Self::assemble(config, session, default_project_id)
    }

    /// Build a client with a `ureq` session pointed at `config.central.base_url`.
    ///
    /// `token` is a Central session token obtained by the caller.
    pub fn connect(config: Config, token: Option<String>) -> Self {
        let mut session = UreqSession::new(&config.central.base_url);
        if let Some(token) = token {
            session = session.with_token(token);
        }
        Self::new(config, Arc::new(session))
    }

    /// Use `project_id` as the default for every service, overriding the config.
    pub fn with_project_id(self, project_id: u64) -> Self {
        Self::assemble(self.config, self.session, Some(project_id))
    }

    fn assemble(config: Config, session: Arc<dyn Session>, default_project_id: Option<u64>) -> Self {
        Self {
            projects: ProjectService::new(session.clone(), default_project_id),
            forms: FormService::new(session.clone(), default_project_id),
            submissions: SubmissionService::new(session.clone(), default_project_id),
            config,
            session,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn project_id(&self) -> Option<u64> {
        self.projects.default_project_id()
    }

    pub fn projects(&self) -> &ProjectService {
        &self.projects
    }

    pub fn forms(&self) -> &FormService {
        &self.forms
    }

    pub fn submissions(&self) -> &SubmissionService {
        &self.submissions
    }

    /// `{base_url}/v1/{path}` for a path with or without surrounding slashes.
    pub fn full_url(&self, path: &str) -> String {
        api_url(self.session.as_ref(), path)
    }

    /// Send an arbitrary request under `/v1`. The response is returned as-is.
    pub fn request(&self, method: HttpMethod, path: &str, body: Option<String>) -> Result<HttpResponse> {
        let mut request = HttpRequest::get(self.full_url(path));
        request.method = method;
        if body.is_some() {
            request.headers.push(("content-type".to_string(), "application/json".to_string()));
        }
        request.body = body;
        self.session.execute(request)
    }

    pub fn get(&self, path: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Get, path, None)
    }

    pub fn post(&self, path: &str, body: Option<String>) -> Result<HttpResponse> {
        self.request(HttpMethod::Post, path, body)
    }

    pub fn put(&self, path: &str, body: Option<String>) -> Result<HttpResponse> {
        self.request(HttpMethod::Put, path, body)
    }

    pub fn patch(&self, path: &str, body: Option<String>) -> Result<HttpResponse> {
        self.request(HttpMethod::Patch, path, body)
    }

    pub fn delete(&self, path: &str) -> Result<HttpResponse> {
        self.request(HttpMethod::Delete, path, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CentralConfig;
    use crate::session::fake::FakeSession;
    use crate::session::wire::{capture_one_request, header_count};

    fn config(default_project_id: Option<u64>) -> Config {
        Config {
            central: CentralConfig {
                base_url: "https://central.example.com".to_string(),
                username: "admin@example.com".to_string(),
                password: "secret".to_string(),
                default_project_id,
            },
        }
    }

    #[test]
    fn full_url_normalises_slashes() {
        let client = Client::new(config(None), Arc::new(FakeSession::new(200, "")));
        for path in ["/users", "users", "users/"] {
            assert_eq!(client.full_url(path), "https://central.example.com/v1/users");
        }
        assert_eq!(
            client.full_url("/projects/17/forms"),
            "https://central.example.com/v1/projects/17/forms"
        );
    }

    #[test]
    fn configured_default_reaches_services() {
        let session = Arc::new(FakeSession::new(200, "[]"));
        let client = Client::new(config(Some(4)), session.clone());
        assert_eq!(client.project_id(), Some(4));
        client.forms().read_all(None).unwrap();
        assert_eq!(session.urls(), vec!["https://central.example.com/v1/projects/4/forms"]);
    }

    #[test]
    fn override_replaces_configured_default() {
        let session = Arc::new(FakeSession::new(200, "[]"));
        let client = Client::new(config(Some(4)), session.clone()).with_project_id(9);
        assert_eq!(client.project_id(), Some(9));
        client.submissions().read_all("range", None).unwrap();
        assert_eq!(
            session.urls(),
            vec!["https://central.example.com/v1/projects/9/forms/range/submissions"]
        );
    }

    #[test]
    fn raw_requests_are_not_validated() {
        let session = Arc::new(FakeSession::new(418, "teapot"));
        let client = Client::new(config(None), session.clone());
        let response = client.post("/projects", Some(r#"{"name":"x"}"#.to_string())).unwrap();
        assert_eq!(response.status, 418);

        let requests = session.requests.lock().unwrap();
        assert_eq!(requests[0].method, HttpMethod::Post);
        assert_eq!(requests[0].body.as_deref(), Some(r#"{"name":"x"}"#));
    }

    #[test]
    fn raw_post_sends_one_content_type_header() {
        let (base, rx) = capture_one_request();
        let mut config = config(None);
        config.central.base_url = base;
        let client = Client::connect(config, Some("tok".to_string()));
        let response = client.post("/projects", Some(r#"{"name":"x"}"#.to_string())).unwrap();
        assert_eq!(response.status, 200);

        let raw = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert!(raw.starts_with("POST /v1/projects "), "{raw}");
        assert_eq!(header_count(&raw, "content-type"), 1, "{raw}");
        assert_eq!(header_count(&raw, "authorization"), 1, "{raw}");
    }
}
