//! Query gateway request/response types
//!
//! The gateway accepts one JSON document carrying a query string and its
//! variables, and always answers with one JSON result. Problems with the query
//! itself come back as entries in `errors`, not as transport failures.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request body posted to the gateway
///
/// # Examples
///
/// ```
/// use cookbook_common::api::types::QueryRequest;
/// use serde_json::json;
///
/// let request = QueryRequest::new("query { recipe { list } }")
///     .with_variables(json!({ "limit": 10 }));
/// assert_eq!(request.variables["limit"], 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Query document
    pub query: String,
    /// Variables referenced by the document
    #[serde(default)]
    pub variables: Value,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            variables: Value::Object(Default::default()),
        }
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }
}

/// One query-layer error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryError {
    /// Human-readable error message
    pub message: String,
    /// Path to the field that failed (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
        }
    }
}

impl std::fmt::Display for QueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => {
                let joined: Vec<String> = path
                    .iter()
                    .map(|p| match p {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                write!(f, "{} (at {})", self.message, joined.join("."))
            }
            None => write!(f, "{}", self.message),
        }
    }
}

/// Response body returned by the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse<T> {
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<QueryError>,
}

impl<T> QueryResponse<T> {
    /// Successful response
    pub fn ok(data: T) -> Self {
        Self {
            data: Some(data),
            errors: Vec::new(),
        }
    }

    /// Response carrying only errors
    pub fn failed(errors: Vec<QueryError>) -> Self {
        Self { data: None, errors }
    }

    /// Split into data or the error list
    ///
    /// Any error entry fails the whole response, even when partial data is
    /// present.
    pub fn into_result(self) -> Result<Option<T>, Vec<QueryError>> {
        if self.errors.is_empty() {
            Ok(self.data)
        } else {
            Err(self.errors)
        }
    }
}
