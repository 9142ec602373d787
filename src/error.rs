use serde_json::json;
use thiserror::Error;

/// Failure reported by a score source adapter. Always surfaced to callers as
/// [`GradeError::DataUnavailable`] so "could not check" never reads as a zero.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("score query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("malformed {table} row {id}: {reason}")]
    Malformed {
        table: &'static str,
        id: String,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum GradeError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("score data unavailable: {0}")]
    DataUnavailable(#[from] SourceError),
}

impl GradeError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>, details: Option<serde_json::Value>) -> Self {
        Self::Validation {
            message: message.into(),
            details,
        }
    }

    /// Stable IPC error code.
    pub fn code(&self) -> &'static str {
        match self {
            GradeError::NotFound { .. } => "not_found",
            GradeError::Validation { .. } => "validation_failed",
            GradeError::DataUnavailable(_) => "data_unavailable",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GradeError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            GradeError::Validation { details, .. } => details.clone(),
            GradeError::DataUnavailable(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct_per_kind() {
        let nf = GradeError::not_found("assignment", "a-1");
        let val = GradeError::validation("score out of range", None);
        let du = GradeError::from(SourceError::Query(rusqlite::Error::InvalidQuery));
        assert_eq!(nf.code(), "not_found");
        assert_eq!(val.code(), "validation_failed");
        assert_eq!(du.code(), "data_unavailable");
        assert_eq!(nf.to_string(), "assignment not found");
        assert_eq!(
            nf.details(),
            Some(json!({ "entity": "assignment", "id": "a-1" }))
        );
    }
}
