//! Versioned command/response envelopes for the host bridge.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Contract version for host envelopes.
pub const CONTRACT_VERSION: u32 = 1;

/// Commands a host may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "search")]
    Search,
    #[serde(rename = "tiers.list")]
    TiersList,
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "host.version")]
    HostVersion,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
}

impl CommandName {
    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::TiersList => "tiers.list",
            Self::HostPing => "host.ping",
            Self::HostVersion => "host.version",
            Self::RuntimeStop => "runtime.stop",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "search" => Some(Self::Search),
            "tiers.list" => Some(Self::TiersList),
            "host.ping" => Some(Self::HostPing),
            "host.version" => Some(Self::HostVersion),
            "runtime.stop" => Some(Self::RuntimeStop),
            _ => None,
        }
    }
}

/// A command from the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: CONTRACT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    ///
    /// # Errors
    ///
    /// [`AppError::Protocol`] for an unsupported version or blank request id.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.v != CONTRACT_VERSION {
            return Err(AppError::Protocol(format!(
                "unsupported contract version {}; expected {CONTRACT_VERSION}",
                self.v
            )));
        }
        if self.request_id.trim().is_empty() {
            return Err(AppError::Protocol("request_id cannot be empty".to_owned()));
        }
        Ok(())
    }
}

/// The reply to one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
    /// Stable error category, e.g. `validation` or `quota_exceeded`.
    pub error_kind: Option<String>,
}

impl ResponseEnvelope {
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: CONTRACT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
            error_kind: None,
        }
    }

    #[must_use]
    pub fn error(
        request_id: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            v: CONTRACT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
            error_kind: Some(kind.into()),
        }
    }

    /// Error envelope for `err`. Internal failures carry a generic message.
    #[must_use]
    pub fn failure(request_id: impl Into<String>, err: &AppError) -> Self {
        let message = if err.kind() == "internal" {
            "internal error".to_owned()
        } else {
            err.to_string()
        };
        Self::error(request_id, err.kind(), message)
    }
}
