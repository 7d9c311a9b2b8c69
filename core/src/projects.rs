//! Projects: the top-level container for forms and app users.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};
use crate::record::{self, wire_time, FieldKind, FieldSpec, PayloadReader, RawPayload, Record};
use crate::resolve::resolve_project_id;
use crate::session::{api_url, Session};
use crate::validate::error_if_not_200;

/// A project as returned by `GET /v1/projects[/{id}]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub key_id: Option<u64>,
    pub archived: bool,
    #[serde(serialize_with = "wire_time::required")]
    pub created_at: DateTime<Utc>,
    pub app_users: Option<u64>,
    pub forms: Option<u64>,
    pub last_submission: Option<String>,
    #[serde(serialize_with = "wire_time::optional")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "wire_time::optional")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Record for Project {
    const NAME: &'static str = "Project";
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("id", FieldKind::Integer),
        FieldSpec::required("name", FieldKind::Text),
        FieldSpec::optional("description", FieldKind::Text),
        FieldSpec::optional("keyId", FieldKind::Integer),
        FieldSpec::required("archived", FieldKind::Boolean),
        FieldSpec::required("createdAt", FieldKind::Timestamp),
        FieldSpec::optional("appUsers", FieldKind::Integer),
        FieldSpec::optional("forms", FieldKind::Integer),
        FieldSpec::optional("lastSubmission", FieldKind::Text),
        FieldSpec::optional("updatedAt", FieldKind::Timestamp),
        FieldSpec::optional("deletedAt", FieldKind::Timestamp),
    ];

    fn from_payload(raw: &RawPayload) -> Result<Self> {
        let r = PayloadReader::of::<Self>(raw);
        Ok(Self {
            id: r.integer("id")?,
            name: r.text("name")?,
            description: r.opt_text("description")?,
            key_id: r.opt_integer("keyId")?,
            archived: r.boolean("archived")?,
            created_at: r.timestamp("createdAt")?,
            app_users: r.opt_integer("appUsers")?,
            forms: r.opt_integer("forms")?,
            last_submission: r.opt_text("lastSubmission")?,
            updated_at: r.opt_timestamp("updatedAt")?,
            deleted_at: r.opt_timestamp("deletedAt")?,
        })
    }
}

/// Read access to `/v1/projects`.
#[derive(Clone)]
pub struct ProjectService {
    session: Arc<dyn Session>,
    default_project_id: Option<u64>,
}

impl ProjectService {
    pub fn new(session: Arc<dyn Session>, default_project_id: Option<u64>) -> Self {
        Self {
            session,
            default_project_id,
        }
    }

    pub fn default_project_id(&self) -> Option<u64> {
        self.default_project_id
    }

    pub fn build_read_all(&self) -> HttpRequest {
        HttpRequest::get(api_url(self.session.as_ref(), "projects"))
    }

    pub fn parse_read_all(&self, response: HttpResponse) -> Result<Vec<Project>> {
        let raw = error_if_not_200(response, "project listing")?;
        record::map_all(&raw)
    }

    /// Read the details of all projects, in server order.
    pub fn read_all(&self) -> Result<Vec<Project>> {
        let response = self.session.execute(self.build_read_all())?;
        self.parse_read_all(response)
    }

    pub fn build_read(&self, project_id: Option<u64>) -> Result<HttpRequest> {
        let pid = resolve_project_id(project_id, self.default_project_id)?;
        Ok(HttpRequest::get(api_url(self.session.as_ref(), &format!("projects/{pid}"))))
    }

    pub fn parse_read(&self, response: HttpResponse) -> Result<Project> {
        let raw = error_if_not_200(response, "project read")?;
        record::map_one(&raw)
    }

    /// Read one project; `project_id` falls back to the service default.
    pub fn read(&self, project_id: Option<u64>) -> Result<Project> {
        let request = self.build_read(project_id)?;
        let response = self.session.execute(request)?;
        self.parse_read(response)
    }
}
