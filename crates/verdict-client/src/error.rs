// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for verdict-client.

use thiserror::Error;
use verdict_protocol::ChannelError;

/// Result type using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by workspace and controller operations.
///
/// Failures of a run or a submission after it started are not errors here:
/// they are recorded as the `errored`/`failed` phase of the state machine.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Run or submit with empty or whitespace-only code.
    #[error("code is empty")]
    EmptyCode,

    /// The other state machine holds the workspace.
    #[error("busy: {0}")]
    Busy(&'static str),

    /// Interactive operation without a running session.
    #[error("no run in progress")]
    NotRunning,

    /// Interactive input before the execution channel is ready.
    #[error("execution channel is still connecting")]
    NotReady,

    /// Channel operation failed.
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    /// One-shot API call failed.
    #[error("api error: {0}")]
    Api(#[from] ApiError),
}

/// Errors from the create-submission call.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request could not be sent or the response could not be read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("server error [{status}]: {message}")]
    Server { status: u16, message: String },

    /// The judge refused the submission (ERROR frame before CREATED).
    #[error("submission rejected: {0}")]
    Rejected(String),

    /// Channel failure while waiting for the acknowledgement.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ApiError {
    /// Text to show the user: the server's own words where there are any.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Server { message, .. } | ApiError::Rejected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ChannelError> for ApiError {
    fn from(err: ChannelError) -> Self {
        ApiError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_prefers_server_text() {
        let err = ApiError::Server {
            status: 400,
            message: "Code is too long".to_string(),
        };
        assert_eq!(err.user_message(), "Code is too long");
        assert_eq!(err.to_string(), "server error [400]: Code is too long");

        let err = ApiError::Transport("connection reset".to_string());
        assert_eq!(err.user_message(), "transport error: connection reset");
    }

    #[test]
    fn test_channel_error_converts() {
        let err: ClientError = ChannelError::Closed.into();
        assert!(matches!(err, ClientError::Channel(ChannelError::Closed)));

        let err: ApiError = ChannelError::Timeout(100).into();
        assert!(err.to_string().contains("timed out after 100ms"));
    }
}
