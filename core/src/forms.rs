//! Forms within a project, addressed by their `xmlFormId`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};
use crate::record::{self, wire_time, FieldKind, FieldSpec, PayloadReader, RawPayload, Record};
use crate::resolve::{resolve_project_id, validate_form_id};
use crate::session::{api_url, path_segment, Session};
use crate::validate::{error_if_not_200, text_if_not_200};

/// A form as returned by `GET /v1/projects/{pid}/forms[/{xmlFormId}]`.
///
/// `state` is one of `open`, `closing`, `closed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub project_id: u64,
    pub xml_form_id: String,
    pub name: String,
    pub version: Option<String>,
    pub enketo_id: Option<String>,
    pub hash: Option<String>,
    pub key_id: Option<u64>,
    pub state: String,
    #[serde(serialize_with = "wire_time::required")]
    pub created_at: DateTime<Utc>,
    #[serde(serialize_with = "wire_time::optional")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "wire_time::optional")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Record for Form {
    const NAME: &'static str = "Form";
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("projectId", FieldKind::Integer),
        FieldSpec::required("xmlFormId", FieldKind::Text),
        FieldSpec::required("name", FieldKind::Text),
        FieldSpec::optional("version", FieldKind::Text),
        FieldSpec::optional("enketoId", FieldKind::Text),
        FieldSpec::optional("hash", FieldKind::Text),
        FieldSpec::optional("keyId", FieldKind::Integer),
        FieldSpec::required("state", FieldKind::Text),
        FieldSpec::required("createdAt", FieldKind::Timestamp),
        FieldSpec::optional("updatedAt", FieldKind::Timestamp),
        FieldSpec::optional("publishedAt", FieldKind::Timestamp),
    ];

    fn from_payload(raw: &RawPayload) -> Result<Self> {
        let r = PayloadReader::of::<Self>(raw);
        Ok(Self {
            project_id: r.integer("projectId")?,
            xml_form_id: r.text("xmlFormId")?,
            name: r.text("name")?,
            version: r.opt_text("version")?,
            enketo_id: r.opt_text("enketoId")?,
            hash: r.opt_text("hash")?,
            key_id: r.opt_integer("keyId")?,
            state: r.text("state")?,
            created_at: r.timestamp("createdAt")?,
            updated_at: r.opt_timestamp("updatedAt")?,
            published_at: r.opt_timestamp("publishedAt")?,
        })
    }
}

/// Read access to `/v1/projects/{pid}/forms`.
#[derive(Clone)]
pub struct FormService {
    session: Arc<dyn Session>,
    default_project_id: Option<u64>,
}

impl FormService {
    pub fn new(session: Arc<dyn Session>, default_project_id: Option<u64>) -> Self {
        Self {
            session,
            default_project_id,
        }
    }

    pub fn build_read_all(&self, project_id: Option<u64>) -> Result<HttpRequest> {
        let pid = resolve_project_id(project_id, self.default_project_id)?;
        Ok(HttpRequest::get(api_url(self.session.as_ref(), &format!("projects/{pid}/forms"))))
    }

    pub fn parse_read_all(&self, response: HttpResponse) -> Result<Vec<Form>> {
        let raw = error_if_not_200(response, "form listing")?;
        record::map_all(&raw)
    }

    /// Read the details of all forms in a project.
    pub fn read_all(&self, project_id: Option<u64>) -> Result<Vec<Form>> {
        let request = self.build_read_all(project_id)?;
        self.parse_read_all(self.session.execute(request)?)
    }

    pub fn build_read(&self, form_id: &str, project_id: Option<u64>) -> Result<HttpRequest> {
        let pid = resolve_project_id(project_id, self.default_project_id)?;
        let fid = path_segment(validate_form_id(form_id)?);
        Ok(HttpRequest::get(api_url(
            self.session.as_ref(),
            &format!("projects/{pid}/forms/{fid}"),
        )))
    }

    pub fn parse_read(&self, response: HttpResponse) -> Result<Form> {
        let raw = error_if_not_200(response, "form read")?;
        record::map_one(&raw)
    }

    /// Read one form by its `xmlFormId`.
    pub fn read(&self, form_id: &str, project_id: Option<u64>) -> Result<Form> {
        let request = self.build_read(form_id, project_id)?;
        self.parse_read(self.session.execute(request)?)
    }

    pub fn build_read_odata_metadata(&self, form_id: &str, project_id: Option<u64>) -> Result<HttpRequest> {
        let pid = resolve_project_id(project_id, self.default_project_id)?;
        let fid = path_segment(validate_form_id(form_id)?);
        Ok(HttpRequest::get(api_url(
            self.session.as_ref(),
            &format!("projects/{pid}/forms/{fid}.svc/$metadata"),
        )))
    }

    /// Read the OData metadata document (EDMX XML) describing a form's tables.
    pub fn read_odata_metadata(&self, form_id: &str, project_id: Option<u64>) -> Result<String> {
        let request = self.build_read_odata_metadata(form_id, project_id)?;
        text_if_not_200(self.session.execute(request)?, "metadata read")
    }
}
