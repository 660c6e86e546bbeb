//! Domain error types.

use thiserror::Error;

use crate::services::source::SourceError;

/// Errors surfaced by domain services to the API boundary.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Missing or wrong credential.
    #[error("{0}")]
    AuthorizationFailure(String),

    /// Request is missing required fields or carries invalid values.
    #[error("{0}")]
    ValidationFailure(String),

    /// Reading from the tracking server failed.
    #[error("Unable to fetch data from tracking server")]
    UpstreamUnavailable(#[source] SourceError),

    /// The tracking server refused to create a device.
    #[error("Tracking server error: {0}")]
    UpstreamRejected(#[source] SourceError),
}

impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut messages: Vec<String> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |e| match &e.message {
                    Some(m) => format!("{}: {}", field, m),
                    None => format!("{}: invalid value", field),
                })
            })
            .collect();
        messages.sort();

        DomainError::ValidationFailure(messages.join("; "))
    }
}
