//! Line-delimited JSON request/response protocol.
//!
//! Requests carry an `id`, a `method` name, and method-specific
//! `params`. Responses echo the id with either a `result` or an
//! `error {code, message}`. The error codes are the dispatcher-facing
//! projection of the library's error kinds.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, StoreError};
use crate::models::Metadata;

/// Dispatcher error codes.
pub mod codes {
    pub const PARSE_ERROR: &str = "PARSE_ERROR";
    pub const METHOD_NOT_FOUND: &str = "METHOD_NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const EMBEDDING_ERROR: &str = "EMBEDDING_ERROR";
    pub const STORE_NOT_FOUND: &str = "STORE_NOT_FOUND";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsertParams {
    pub text: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FindParams {
    pub text: String,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeleteParams {
    pub doc_id: String,
    #[serde(default)]
    pub db_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateParams {
    pub db_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl Response {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody {
                code,
                message: message.into(),
            }),
        }
    }
}

/// Map a pipeline error onto a dispatcher error code.
pub fn error_code(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::Validation(_) | PipelineError::EmptyChunks => codes::VALIDATION_ERROR,
        PipelineError::Embedding(_) => codes::EMBEDDING_ERROR,
        PipelineError::Store(StoreError::NotFound(_)) => codes::STORE_NOT_FOUND,
        PipelineError::Store(StoreError::DocumentNotFound(_)) => codes::NOT_FOUND,
        PipelineError::Store(StoreError::InvalidName(_)) => codes::VALIDATION_ERROR,
        PipelineError::Store(_) => codes::STORAGE_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_parses_with_defaults() {
        let request: Request =
            serde_json::from_str(r#"{"method":"insert_document","params":{"text":"hi"}}"#)
                .expect("parse");
        assert_eq!(request.method, "insert_document");
        assert!(request.id.is_null());
        let params: InsertParams = serde_json::from_value(request.params).expect("params");
        assert_eq!(params.text, "hi");
        assert!(params.metadata.is_none());
        assert!(params.db_name.is_none());
    }

    #[test]
    fn test_response_shapes() {
        let ok = Response::success(serde_json::json!(1), serde_json::json!({"x": 1}));
        let encoded = serde_json::to_string(&ok).expect("encode");
        assert!(encoded.contains("\"result\""));
        assert!(!encoded.contains("\"error\""));

        let err = Response::failure(Value::Null, codes::PARSE_ERROR, "bad json");
        let encoded = serde_json::to_string(&err).expect("encode");
        assert!(encoded.contains("PARSE_ERROR"));
        assert!(!encoded.contains("\"result\""));
    }

    #[test]
    fn test_error_code_mapping() {
        assert_eq!(
            error_code(&PipelineError::Validation("x".into())),
            codes::VALIDATION_ERROR
        );
        assert_eq!(error_code(&PipelineError::EmptyChunks), codes::VALIDATION_ERROR);
        assert_eq!(
            error_code(&PipelineError::Store(StoreError::NotFound("db".into()))),
            codes::STORE_NOT_FOUND
        );
        assert_eq!(
            error_code(&PipelineError::Store(StoreError::DocumentNotFound("id".into()))),
            codes::NOT_FOUND
        );
        assert_eq!(
            error_code(&PipelineError::Store(StoreError::Corrupt("blob".into()))),
            codes::STORAGE_ERROR
        );
    }
}
