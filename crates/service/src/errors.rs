use models::ModelError;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the target service and every storage backend.
///
/// Backends produce `NotFound`, `Conflict` and `Storage`; the service produces
/// `Validation` before any backend is touched. `Other` covers registry misses
/// and backend initialisation failures.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {text}")]
    Storage {
        text: String,
        #[source]
        source: Option<BoxError>,
    },
    #[error("{text}")]
    Other {
        text: String,
        #[source]
        source: Option<BoxError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Storage,
    Other,
}

impl ServiceError {
    pub fn not_found(id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("target {} was not found", id))
    }

    pub fn conflict(id: impl std::fmt::Display) -> Self {
        Self::Conflict(format!("target {} already exists", id))
    }

    pub fn storage(text: impl Into<String>, err: impl Into<BoxError>) -> Self {
        Self::Storage { text: text.into(), source: Some(err.into()) }
    }

    pub fn other(text: impl Into<String>) -> Self {
        Self::Other { text: text.into(), source: None }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::Storage { .. } => ErrorKind::Storage,
            ServiceError::Other { .. } => ErrorKind::Other,
        }
    }

    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 1001,
            ErrorKind::Conflict => 1002,
            ErrorKind::NotFound => 1003,
            ErrorKind::Storage => 1200,
            ErrorKind::Other => 1300,
        }
    }
}

impl From<ModelError> for ServiceError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Validation(msg) => ServiceError::Validation(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn storage_error_keeps_its_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = ServiceError::storage("couldn't open file", io);
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert_eq!(err.to_string(), "storage error: couldn't open file");
        let cause = err.source().expect("cause");
        assert_eq!(cause.to_string(), "no such file");
    }

    #[test]
    fn model_validation_maps_to_validation_kind() {
        let err: ServiceError = ModelError::Validation("name is empty".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.code(), 1001);
    }

    #[test]
    fn codes_are_distinct_per_kind() {
        let codes = [
            ServiceError::Validation(String::new()).code(),
            ServiceError::not_found("a").code(),
            ServiceError::conflict("a").code(),
            ServiceError::Storage { text: String::new(), source: None }.code(),
            ServiceError::other("x").code(),
        ];
        let mut sorted = codes.to_vec();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }
}
