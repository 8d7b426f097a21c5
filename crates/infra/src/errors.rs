//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use trailhead_domain::TrailheadError;

/// Error newtype that keeps conversions on the infrastructure side and can
/// be converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TrailheadError);

impl From<InfraError> for TrailheadError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TrailheadError> for InfraError {
    fn from(value: TrailheadError) -> Self {
        InfraError(value)
    }
}

impl From<std::io::Error> for InfraError {
    fn from(err: std::io::Error) -> Self {
        InfraError(TrailheadError::Storage(err.to_string()))
    }
}

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        if err.is_timeout() {
            InfraError(TrailheadError::Network("request timed out".into()))
        } else if err.is_connect() {
            InfraError(TrailheadError::Network(format!("connection failed: {err}")))
        } else {
            InfraError(TrailheadError::Network(err.to_string()))
        }
    }
}
