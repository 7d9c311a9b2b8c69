//! Error types for the Central API client.
//!
//! # Design
//! Every failure a caller can see lands in one `OdkError`. `Configuration`
//! covers missing identifiers and unreadable config files, `Request` carries
//! the raw status and body of any non-200 response, and `Parsing` covers
//! payloads that do not fit the record they are mapped into. `Transport` is
//! reserved for the session provider (connection refused, timeouts).

use thiserror::Error;

/// Errors returned by the client, its services and the session provider.
#[derive(Debug, Error)]
pub enum OdkError {
    /// A required identifier or setting was not supplied and has no default.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The server answered with a status other than 200.
    #[error("the {action} request failed. Status: {status}, content: {body}")]
    Request {
        action: String,
        status: u16,
        body: String,
    },

    /// A response body or payload field could not be coerced to its declared type.
    #[error("parsing error: {0}")]
    Parsing(String),

    /// The HTTP round-trip itself failed before a response was received.
    #[error("transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, OdkError>;
