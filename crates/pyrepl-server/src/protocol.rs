//! Wire types for the HTTP protocol.

use serde::{Deserialize, Serialize};

use pyrepl_core::{ExecutionOutcome, ExecutionRequest};

/// Body of `POST /execute`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteBody {
    /// Source lines, in order.
    pub code: Vec<String>,
}

impl From<ExecuteBody> for ExecutionRequest {
    fn from(body: ExecuteBody) -> Self {
        Self::new(body.code)
    }
}

/// Body of a `POST /execute` response.
///
/// Interpreter-level failures keep HTTP 200; `success` and `error` carry
/// the distinction. Non-2xx statuses are reserved for the server itself
/// being unable to process the request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteReply {
    pub output: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub success: bool,
}

impl From<ExecutionOutcome> for ExecuteReply {
    fn from(outcome: ExecutionOutcome) -> Self {
        Self {
            output: outcome.output,
            error: outcome.error,
            value: outcome.value,
            success: outcome.success,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReply {
    pub status: String,
    pub session_id: String,
}

/// Body of a successful `POST /reset`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
}

/// Error body for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_body_parses_the_documented_shape() {
        let body: ExecuteBody =
            serde_json::from_str(r#"{"code": ["x = 1", "x"]}"#).expect("valid body");
        assert_eq!(body.code, vec!["x = 1", "x"]);

        let request = ExecutionRequest::from(body);
        assert_eq!(request.source(), "x = 1\nx");
    }

    #[test]
    fn execute_body_rejects_non_list_code() {
        assert!(serde_json::from_str::<ExecuteBody>(r#"{"code": "x = 1"}"#).is_err());
        assert!(serde_json::from_str::<ExecuteBody>(r"{}").is_err());
    }

    #[test]
    fn reply_omits_value_when_nothing_was_echoed() {
        let reply = ExecuteReply::from(ExecutionOutcome::empty());
        let json = serde_json::to_string(&reply).expect("serializes");
        assert!(!json.contains("value"));
        assert!(json.contains(r#""success":true"#));
    }
}
