//! Typed, blocking client for the ODK Central REST API.
//!
//! # Overview
//! Projects, forms and submissions are exposed through one service each.
//! Every read is a single GET: resolve identifiers, send the request through
//! a [`Session`], check the status, then map the JSON into a typed record.
//!
//! # Design
//! - Services split each operation into `build_*` (produces an
//!   [`HttpRequest`]) and `parse_*` (consumes an [`HttpResponse`]), composed
//!   by `read` / `read_all`. The split keeps mapping testable without I/O.
//! - Records are built by validating constructors from a static field table;
//!   timestamps are `chrono::DateTime<Utc>` from the moment a record exists.
//! - Errors are logged with `tracing` where they are first detected and then
//!   returned unchanged. The crate never installs a subscriber.
//! - Login is out of scope: callers pass a session token or their own
//!   [`Session`] implementation.

pub mod client;
pub mod config;
pub mod error;
pub mod forms;
pub mod http;
pub mod projects;
pub mod record;
pub mod resolve;
pub mod session;
pub mod submissions;
pub mod validate;

pub use client::Client;
pub use config::{CentralConfig, Config};
pub use error::{OdkError, Result};
pub use forms::{Form, FormService};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use projects::{Project, ProjectService};
pub use record::{FieldKind, FieldSpec, RawPayload, Record};
pub use session::{Session, UreqSession};
pub use submissions::{Submission, SubmissionService, TableQuery};
