//! Response: the result of executing one `Command`.

use serde::{Deserialize, Serialize};

use crate::error::Result;


/// Outcome of a dispatched command: formatted text or an error message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok { output: String },
    Error { message: String },
}

impl Response {
    pub fn is_ok(&self) -> bool {
        matches!(self, Response::Ok { .. })
    }

    /// The text body regardless of outcome.
    pub fn text(&self) -> &str {
        match self {
            Response::Ok { output } => output,
            Response::Error { message } => message,
        }
    }
}

impl From<Result<String>> for Response {
    fn from(result: Result<String>) -> Self {
        match result {
            Ok(output) => Response::Ok { output },
            Err(e) => Response::Error { message: e.to_string() },
        }
    }
}
