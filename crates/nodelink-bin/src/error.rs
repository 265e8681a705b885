// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI error type.

use thiserror::Error;

use nodelink_core::error::FlowError;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A bridge operation failed.
    #[error("{0}")]
    Flow(#[from] FlowError),

    /// The requested command needs the production transport.
    #[error("Command '{command}' requires the 'real-transport' feature")]
    TransportUnavailable {
        /// The command that was requested.
        command: String,
    },

    /// Invalid command line input.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong.
        message: String,
    },

    /// The remote operation reported a failure on the status channel.
    #[error("{message}")]
    OperationFailed {
        /// The status-channel error message.
        message: String,
    },
}

impl CliError {
    /// Creates a transport-unavailable error.
    pub fn transport_unavailable(command: impl Into<String>) -> Self {
        Self::TransportUnavailable {
            command: command.into(),
        }
    }

    /// Creates an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an operation-failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        Self::OperationFailed {
            message: message.into(),
        }
    }

    /// Returns the process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } => 2,
            _ => 1,
        }
    }
}

/// Convenience result alias for CLI commands.
pub type CliResult<T> = Result<T, CliError>;
