//! Response validation shared by every service.
//!
//! Only 200 counts as success. Anything else becomes `OdkError::Request`
//! carrying the action label, status and raw body, logged once here.

use serde_json::Value;
use tracing::error;

use crate::error::{OdkError, Result};
use crate::http::HttpResponse;

/// Return the parsed JSON body of a 200 response.
pub fn error_if_not_200(response: HttpResponse, action: &str) -> Result<Value> {
    let body = text_if_not_200(response, action)?;
    serde_json::from_str(&body).map_err(|e| {
        let err = OdkError::Parsing(format!("{action} response is not valid JSON: {e}"));
        error!(error = %err, "response body rejected");
        err
    })
}

/// Return the raw body of a 200 response, for endpoints that do not speak JSON.
pub fn text_if_not_200(response: HttpResponse, action: &str) -> Result<String> {
    if response.status == 200 {
        return Ok(response.body);
    }
    let err = OdkError::Request {
        action: action.to_string(),
        status: response.status,
        body: response.body,
    };
    error!(error = %err, "request failed");
    Err(err)
}
