//! Identifier resolution and argument checks.
//!
//! An explicit identifier always wins over the service's default. These
//! functions are pure apart from the error log emitted on failure.

use tracing::error;

use crate::error::{OdkError, Result};

/// Pick `explicit` if present, else `default`, else fail naming `what`.
pub fn resolve_id<T>(what: &str, explicit: Option<T>, default: Option<T>) -> Result<T> {
    explicit.or(default).ok_or_else(|| {
        let err = OdkError::Configuration(format!(
            "a {what} is required, but none was supplied and no default is configured"
        ));
        error!(error = %err, "identifier resolution failed");
        err
    })
}

pub fn resolve_project_id(explicit: Option<u64>, default: Option<u64>) -> Result<u64> {
    resolve_id("project id", explicit, default)
}

pub fn validate_form_id(form_id: &str) -> Result<&str> {
    non_empty("form id", form_id)
}

pub fn validate_instance_id(instance_id: &str) -> Result<&str> {
    non_empty("instance id", instance_id)
}

pub fn validate_table_name(table_name: &str) -> Result<&str> {
    non_empty("table name", table_name)
}

fn non_empty<'a>(what: &str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        let err = OdkError::Configuration(format!("a {what} is required, but an empty value was supplied"));
        error!(error = %err, "argument rejected");
        return Err(err);
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_wins_over_default() {
        assert_eq!(resolve_project_id(Some(7), Some(1)).unwrap(), 7);
    }

    #[test]
    fn default_used_when_explicit_absent() {
        assert_eq!(resolve_project_id(None, Some(1)).unwrap(), 1);
    }

    #[test]
    fn missing_both_is_configuration_error() {
        let err = resolve_project_id(None, None).unwrap_err();
        assert!(matches!(err, OdkError::Configuration(ref msg) if msg.contains("project id")));
    }

    #[test]
    fn generic_resolver_names_the_identifier() {
        let err = resolve_id::<String>("form id", None, None).unwrap_err();
        assert!(err.to_string().contains("form id"));
    }

    #[test]
    fn blank_form_id_is_rejected() {
        assert!(matches!(validate_form_id("  "), Err(OdkError::Configuration(_))));
        assert_eq!(validate_form_id(" range ").unwrap(), "range");
    }

    #[test]
    fn blank_instance_and_table_are_rejected() {
        assert!(validate_instance_id("").is_err());
        assert!(validate_table_name("").is_err());
        assert_eq!(validate_table_name("Submissions").unwrap(), "Submissions");
    }
}
