//! In-memory stand-in for the read side of the ODK Central v1 API.
//!
//! Serves a fixed [`Store`] of projects, forms and submissions with the same
//! paths, JSON shapes and 404 body that Central uses. No authentication.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: u64,
    pub name: String,
    pub description: Option<String>,
    pub key_id: Option<u64>,
    pub archived: bool,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Form {
    pub project_id: u64,
    pub xml_form_id: String,
    pub name: String,
    pub version: String,
    pub enketo_id: Option<String>,
    pub hash: String,
    pub key_id: Option<u64>,
    pub state: String,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    #[serde(skip)]
    pub project_id: u64,
    #[serde(skip)]
    pub xml_form_id: String,
    pub instance_id: String,
    pub submitter_id: u64,
    pub device_id: Option<String>,
    pub created_at: String,
    pub review_state: Option<String>,
    pub user_agent: Option<String>,
    pub instance_name: Option<String>,
    pub updated_at: Option<String>,
}

/// Everything the server knows. Listing order is insertion order.
#[derive(Clone, Debug, Default)]
pub struct Store {
    pub projects: Vec<Project>,
    pub forms: Vec<Form>,
    pub submissions: Vec<Submission>,
}

impl Store {
    /// Two projects; `range` and `survey` forms in project 1 with three
    /// submissions between them.
    pub fn seeded() -> Self {
        let projects = vec![
            Project {
                id: 1,
                name: "Default Project".to_string(),
                description: Some("Field data".to_string()),
                key_id: None,
                archived: false,
                created_at: "2021-01-01T00:00:00.000Z".to_string(),
                updated_at: Some("2021-06-01T12:30:00.000Z".to_string()),
                deleted_at: None,
            },
            Project {
                id: 2,
                name: "Archive".to_string(),
                description: None,
                key_id: Some(3),
                archived: true,
                created_at: "2020-05-05T08:00:00.000Z".to_string(),
                updated_at: None,
                deleted_at: None,
            },
        ];
        let forms = ["range", "survey"]
            .iter()
            .enumerate()
            .map(|(i, id)| Form {
                project_id: 1,
                xml_form_id: id.to_string(),
                name: format!("{id} form"),
                version: format!("2021010{}", i + 1),
                enketo_id: Some(format!("enk{i}")),
                hash: format!("{:032x}", i + 1),
                key_id: None,
                state: "open".to_string(),
                created_at: "2021-01-02T00:00:00.000Z".to_string(),
                updated_at: None,
                published_at: Some("2021-01-03T00:00:00.000Z".to_string()),
            })
            .collect();
        let submissions = [("range", 5, Some("approved")), ("range", 5, None), ("survey", 6, Some("hasIssues"))]
            .iter()
            .enumerate()
            .map(|(i, (form, submitter, review))| Submission {
                project_id: 1,
                xml_form_id: form.to_string(),
                instance_id: format!("uuid:{}", Uuid::new_v4()),
                submitter_id: *submitter,
                device_id: None,
                created_at: format!("2021-02-0{}T10:00:00.{:03}Z", i + 1, i * 111),
                review_state: review.map(str::to_string),
                user_agent: Some("Collect/v2023.1".to_string()),
                instance_name: None,
                updated_at: None,
            })
            .collect();
        Self {
            projects,
            forms,
            submissions,
        }
    }

    fn project(&self, id: u64) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    fn form(&self, project_id: u64, form_id: &str) -> Option<&Form> {
        self.forms
            .iter()
            .find(|f| f.project_id == project_id && f.xml_form_id == form_id)
    }

    fn submissions_of<'a>(&'a self, project_id: u64, form_id: &'a str) -> impl Iterator<Item = &'a Submission> {
        self.submissions
            .iter()
            .filter(move |s| s.project_id == project_id && s.xml_form_id == form_id)
    }
}

pub type Db = Arc<Store>;

type NotFound = (StatusCode, Json<Value>);

fn not_found() -> NotFound {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "code": 404.1,
            "message": "Could not find the resource you were looking for."
        })),
    )
}

pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(store);
    Router::new()
        .route("/v1/projects", get(list_projects))
        .route("/v1/projects/{project_id}", get(get_project))
        .route("/v1/projects/{project_id}/forms", get(list_forms))
        .route("/v1/projects/{project_id}/forms/{form_id}", get(get_form))
        .route("/v1/projects/{project_id}/forms/{form_id}/submissions", get(list_submissions))
        .route(
            "/v1/projects/{project_id}/forms/{form_id}/submissions/{instance_id}",
            get(get_submission),
        )
        .route("/v1/projects/{project_id}/forms/{form_id}/{table}", get(odata))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, store: Store) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(store)).await
}

async fn list_projects(State(db): State<Db>) -> Json<Vec<Project>> {
    Json(db.projects.clone())
}

async fn get_project(State(db): State<Db>, Path(project_id): Path<u64>) -> Result<Json<Project>, NotFound> {
    db.project(project_id).cloned().map(Json).ok_or_else(not_found)
}

async fn list_forms(State(db): State<Db>, Path(project_id): Path<u64>) -> Result<Json<Vec<Form>>, NotFound> {
    db.project(project_id).ok_or_else(not_found)?;
    let forms = db.forms.iter().filter(|f| f.project_id == project_id).cloned().collect();
    Ok(Json(forms))
}

async fn get_form(
    State(db): State<Db>,
    Path((project_id, form_id)): Path<(u64, String)>,
) -> Result<Json<Form>, NotFound> {
    db.form(project_id, &form_id).cloned().map(Json).ok_or_else(not_found)
}

async fn list_submissions(
    State(db): State<Db>,
    Path((project_id, form_id)): Path<(u64, String)>,
) -> Result<Json<Vec<Submission>>, NotFound> {
    db.form(project_id, &form_id).ok_or_else(not_found)?;
    Ok(Json(db.submissions_of(project_id, &form_id).cloned().collect()))
}

async fn get_submission(
    State(db): State<Db>,
    Path((project_id, form_id, instance_id)): Path<(u64, String, String)>,
) -> Result<Json<Submission>, NotFound> {
    db.submissions_of(project_id, &form_id)
        .find(|s| s.instance_id == instance_id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

/// `forms/{id}.svc/$metadata` and `forms/{id}.svc/Submissions`.
async fn odata(
    State(db): State<Db>,
    Path((project_id, form_svc, table)): Path<(u64, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, NotFound> {
    let form_id = form_svc.strip_suffix(".svc").ok_or_else(not_found)?;
    let form = db.form(project_id, form_id).ok_or_else(not_found)?;

    match table.as_str() {
        "$metadata" => {
            let xml = format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><edmx:Edmx Version="4.0" xmlns:edmx="http://docs.oasis-open.org/odata/ns/edmx"><edmx:DataServices><Schema Namespace="org.opendatakit.user.{}"/></edmx:DataServices></edmx:Edmx>"#,
                form.xml_form_id
            );
            Ok(([(header::CONTENT_TYPE, "application/xml")], xml).into_response())
        }
        "Submissions" => {
            let rows: Vec<Value> = db
                .submissions_of(project_id, form_id)
                .map(|s| {
                    json!({
                        "__id": s.instance_id,
                        "__system": {
                            "submissionDate": s.created_at,
                            "submitterId": s.submitter_id.to_string(),
                            "reviewState": s.review_state,
                        }
                    })
                })
                .collect();
            let total = rows.len();
            let skip = parse_usize(&params, "$skip").unwrap_or(0);
            let top = parse_usize(&params, "$top").unwrap_or(usize::MAX);
            let page: Vec<Value> = rows.into_iter().skip(skip).take(top).collect();

            let mut doc = json!({
                "@odata.context": format!("/v1/projects/{project_id}/forms/{form_svc}/$metadata#Submissions"),
                "value": page,
            });
            if params.get("$count").map(String::as_str) == Some("true") {
                doc["@odata.count"] = json!(total);
            }
            Ok(Json(doc).into_response())
        }
        _ => Err(not_found()),
    }
}

fn parse_usize(params: &HashMap<String, String>, key: &str) -> Option<usize> {
    params.get(key).and_then(|v| v.parse().ok())
}
