//! Backend question/answer client.

#![allow(missing_docs)]

use std::time::Duration;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use thiserror::Error;

/// Failure modes of a backend call. All of them end in the fallback reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Connection, timeout or transport failure.
    #[error("backend request failed: {0}")]
    Request(SmolStr),

    /// Non-2xx response.
    #[error("backend returned status {status}")]
    Status { status: u16, body: String },

    /// 2xx response without a usable `answer`.
    #[error("backend response malformed: {reason}")]
    Decode { reason: SmolStr, body: String },
}

impl BackendError {
    /// Status code of the backend response, when one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Body of the backend response, when one was received.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } | Self::Decode { body, .. } => Some(body.as_str()),
            Self::Request(_) => None,
        }
    }
}

/// Answer generator behind the relay.
pub trait Backend: Send + Sync {
    fn ask(&self, question: &str, sender: &str) -> Result<String, BackendError>;
}

#[derive(Debug, Serialize)]
pub struct AskRequest<'a> {
    pub question: &'a str,
    pub sender: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AskResponse {
    pub answer: String,
}

/// JSON-over-HTTP backend (`POST {question, sender}` → `{answer}`).
#[derive(Clone)]
pub struct HttpBackend {
    url: SmolStr,
    agent: ureq::Agent,
}

impl std::fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpBackend")
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl HttpBackend {
    #[must_use]
    pub fn new(url: impl Into<SmolStr>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();
        Self {
            url: url.into(),
            agent,
        }
    }
}

impl Backend for HttpBackend {
    fn ask(&self, question: &str, sender: &str) -> Result<String, BackendError> {
        let payload = serde_json::to_string(&AskRequest { question, sender })
            .map_err(|err| BackendError::Request(format!("encode request: {err}").into()))?;
        let mut response = self
            .agent
            .post(self.url.as_str())
            .header("Content-Type", "application/json")
            .send(payload.as_str())
            .map_err(|err| BackendError::Request(err.to_string().into()))?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|err| BackendError::Request(format!("read body: {err}").into()))?;
        if !(200..300).contains(&status) {
            return Err(BackendError::Status { status, body });
        }
        parse_answer(&body)
    }
}

fn parse_answer(body: &str) -> Result<String, BackendError> {
    serde_json::from_str::<AskResponse>(body)
        .map(|response| response.answer)
        .map_err(|err| BackendError::Decode {
            reason: err.to_string().into(),
            body: body.to_string(),
        })
}
