//! JSON-lines request/response envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ChannelError;

/// One method call: `{"id": 1, "method": "streamInfo", "args": {"id": "..."}}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Request {
    /// Opaque correlation value echoed back in the response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

/// Reply to one request: `{"id": 1, "result": ...}` or `{"id": 1, "error": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Result(Value),
    Error(ErrorReply),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub code: String,
    pub message: String,
}

impl Response {
    pub const fn ok(id: Option<Value>, result: Value) -> Self {
        Self {
            id,
            outcome: Outcome::Result(result),
        }
    }

    pub fn error(id: Option<Value>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            outcome: Outcome::Error(ErrorReply {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    pub fn from_result(id: Option<Value>, result: Result<Value, ChannelError>) -> Self {
        match result {
            Ok(value) => Self::ok(id, value),
            Err(e) => Self::error(id, e.code(), e.to_string()),
        }
    }

    pub const fn is_error(&self) -> bool {
        matches!(self.outcome, Outcome::Error(_))
    }
}
