//! Submissions to a form, plus the form's OData table view.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse};
use crate::record::{self, wire_time, FieldKind, FieldSpec, PayloadReader, RawPayload, Record};
use crate::resolve::{resolve_project_id, validate_form_id, validate_instance_id, validate_table_name};
use crate::session::{api_url, path_segment, Session};
use crate::validate::error_if_not_200;

/// Submission metadata as returned by `GET .../forms/{fid}/submissions[/{instanceId}]`.
///
/// `review_state` is one of `edited`, `hasIssues`, `rejected`, `approved`, or absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub instance_id: String,
    pub submitter_id: u64,
    pub device_id: Option<String>,
    #[serde(serialize_with = "wire_time::required")]
    pub created_at: DateTime<Utc>,
    pub review_state: Option<String>,
    pub user_agent: Option<String>,
    pub instance_name: Option<String>,
    #[serde(serialize_with = "wire_time::optional")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Submission {
    const NAME: &'static str = "Submission";
    const SCHEMA: &'static [FieldSpec] = &[
        FieldSpec::required("instanceId", FieldKind::Text),
        FieldSpec::required("submitterId", FieldKind::Integer),
        FieldSpec::optional("deviceId", FieldKind::Text),
        FieldSpec::required("createdAt", FieldKind::Timestamp),
        FieldSpec::optional("reviewState", FieldKind::Text),
        FieldSpec::optional("userAgent", FieldKind::Text),
        FieldSpec::optional("instanceName", FieldKind::Text),
        FieldSpec::optional("updatedAt", FieldKind::Timestamp),
    ];

    fn from_payload(raw: &RawPayload) -> Result<Self> {
        let r = PayloadReader::of::<Self>(raw);
        Ok(Self {
            instance_id: r.text("instanceId")?,
            submitter_id: r.integer("submitterId")?,
            device_id: r.opt_text("deviceId")?,
            created_at: r.timestamp("createdAt")?,
            review_state: r.opt_text("reviewState")?,
            user_agent: r.opt_text("userAgent")?,
            instance_name: r.opt_text("instanceName")?,
            updated_at: r.opt_timestamp("updatedAt")?,
        })
    }
}

/// OData query options for [`SubmissionService::read_all_table`].
///
/// Only options that are set are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableQuery {
    /// `Submissions`, or a repeat table such as `Submissions.children.child`.
    pub table_name: String,
    /// `$skip`: omit the first n rows.
    pub skip: Option<u64>,
    /// `$top`: return at most n rows.
    pub top: Option<u64>,
    /// `$count`: add `@odata.count` with the total row count, ignoring paging.
    pub count: Option<bool>,
    /// `$wkt`: return geo data as Well-Known Text instead of GeoJSON.
    pub wkt: Option<bool>,
    /// `$filter`: e.g. `__system/submitterId eq 5`.
    pub filter: Option<String>,
    /// `$expand`: only `*` is supported by the server.
    pub expand: Option<String>,
}

impl Default for TableQuery {
    fn default() -> Self {
        Self {
            table_name: "Submissions".to_string(),
            skip: None,
            top: None,
            count: None,
            wkt: None,
            filter: None,
            expand: None,
        }
    }
}

impl TableQuery {
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(skip) = self.skip {
            params.push(("$skip".to_string(), skip.to_string()));
        }
        if let Some(top) = self.top {
            params.push(("$top".to_string(), top.to_string()));
        }
        if let Some(count) = self.count {
            params.push(("$count".to_string(), count.to_string()));
        }
        if let Some(wkt) = self.wkt {
            params.push(("$wkt".to_string(), wkt.to_string()));
        }
        if let Some(filter) = &self.filter {
            params.push(("$filter".to_string(), filter.clone()));
        }
        if let Some(expand) = &self.expand {
            params.push(("$expand".to_string(), expand.clone()));
        }
        params
    }
}

/// Read access to `/v1/projects/{pid}/forms/{fid}/submissions`.
#[derive(Clone)]
pub struct SubmissionService {
    session: Arc<dyn Session>,
    default_project_id: Option<u64>,
}

impl SubmissionService {
    pub fn new(session: Arc<dyn Session>, default_project_id: Option<u64>) -> Self {
        Self {
            session,
            default_project_id,
        }
    }

    pub fn build_read_all(&self, form_id: &str, project_id: Option<u64>) -> Result<HttpRequest> {
        let pid = resolve_project_id(project_id, self.default_project_id)?;
        let fid = path_segment(validate_form_id(form_id)?);
        Ok(HttpRequest::get(api_url(
            self.session.as_ref(),
            &format!("projects/{pid}/forms/{fid}/submissions"),
        )))
    }

    pub fn parse_read_all(&self, response: HttpResponse) -> Result<Vec<Submission>> {
        let raw = error_if_not_200(response, "submission listing")?;
        record::map_all(&raw)
    }

    /// Read the metadata of every submission to a form.
    pub fn read_all(&self, form_id: &str, project_id: Option<u64>) -> Result<Vec<Submission>> {
        let request = self.build_read_all(form_id, project_id)?;
        self.parse_read_all(self.session.execute(request)?)
    }

    pub fn build_read(&self, form_id: &str, instance_id: &str, project_id: Option<u64>) -> Result<HttpRequest> {
        let pid = resolve_project_id(project_id, self.default_project_id)?;
        let fid = path_segment(validate_form_id(form_id)?);
        let iid = path_segment(validate_instance_id(instance_id)?);
        Ok(HttpRequest::get(api_url(
            self.session.as_ref(),
            &format!("projects/{pid}/forms/{fid}/submissions/{iid}"),
        )))
    }

    pub fn parse_read(&self, response: HttpResponse) -> Result<Submission> {
        let raw = error_if_not_200(response, "submission read")?;
        record::map_one(&raw)
    }

    /// Read one submission by its `instanceId`.
    pub fn read(&self, form_id: &str, instance_id: &str, project_id: Option<u64>) -> Result<Submission> {
        let request = self.build_read(form_id, instance_id, project_id)?;
        self.parse_read(self.session.execute(request)?)
    }

    pub fn build_read_all_table(
        &self,
        form_id: &str,
        project_id: Option<u64>,
        query: &TableQuery,
    ) -> Result<HttpRequest> {
        let pid = resolve_project_id(project_id, self.default_project_id)?;
        let fid = path_segment(validate_form_id(form_id)?);
        let table = path_segment(validate_table_name(&query.table_name)?);
        let mut request = HttpRequest::get(api_url(
            self.session.as_ref(),
            &format!("projects/{pid}/forms/{fid}.svc/{table}"),
        ));
        request.query = query.params();
        Ok(request)
    }

    /// Read submission data as an OData table. The document is returned
    /// unmapped (`value`, optional `@odata.count`, `@odata.context`).
    pub fn read_all_table(&self, form_id: &str, project_id: Option<u64>, query: &TableQuery) -> Result<Value> {
        let request = self.build_read_all_table(form_id, project_id, query)?;
        error_if_not_200(self.session.execute(request)?, "table read")
    }
}
