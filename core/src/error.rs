//! Error types for the Sigfox API client.
//!
//! # Design
//! HTTP statuses are never errors here: a 404 or a 500 comes back as an
//! ordinary `ApiResponse`. `ApiError` covers only what stops a request from
//! being built or a response from being read.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// A `{name}` placeholder in a path template had no argument.
    #[error("no value supplied for url placeholder `{{{0}}}`")]
    MissingPlaceholder(String),

    /// The path template itself could not be parsed.
    #[error("malformed url template `{template}`: {reason}")]
    MalformedTemplate {
        template: String,
        reason: &'static str,
    },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The response body was not empty and was not valid JSON.
    #[error("deserialization failed: {0}")]
    Deserialization(#[source] serde_json::Error),

    /// DNS, connection, TLS or body read failure.
    #[error("http transport error: {0}")]
    Transport(#[from] ureq::Error),
}
