// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for labelscan.
//
// Errors are classified into Configuration (fix and restart), Transient
// (absorbed into the retry loop) and Fatal (session torn down).

use thiserror::Error;

use crate::config::StageKind;

/// Top-level error type for all labelscan operations.
#[derive(Debug, Error)]
pub enum ScanError {
    // -- Input errors --
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Pipeline errors --
    #[error("preprocessing failed at {stage} stage: {reason}")]
    Preprocessing { stage: StageKind, reason: String },

    #[error("recognition engine unavailable: {0}")]
    RecognitionUnavailable(String),

    #[error("recognition failed: {0}")]
    RecognitionFailed(String),

    // -- Device errors --
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    // -- Session errors --
    #[error("operation `{operation}` not allowed in state {state}")]
    InvalidState {
        operation: &'static str,
        state: String,
    },

    // -- Configuration persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanError {
    /// Shorthand for a stage failure.
    pub fn stage(stage: StageKind, reason: impl Into<String>) -> Self {
        Self::Preprocessing {
            stage,
            reason: reason.into(),
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanError>;

/// How the session reacts to an error raised during an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed configuration. Unrecoverable for this session.
    Configuration,
    /// Reported to the user, then the session goes back to capturing.
    Transient,
    /// Device or engine gone. The session is cancelled and torn down.
    Fatal,
}

/// Classify a `ScanError` for the session's retry decision.
pub fn classify_error(err: &ScanError) -> ErrorClass {
    match err {
        ScanError::InvalidConfig(_) => ErrorClass::Configuration,

        ScanError::DeviceUnavailable(_) | ScanError::RecognitionUnavailable(_) => {
            ErrorClass::Fatal
        }

        // A bad frame or a failed stage only affects the current attempt.
        ScanError::InvalidFrame(_)
        | ScanError::Preprocessing { .. }
        | ScanError::RecognitionFailed(_)
        | ScanError::InvalidState { .. } => ErrorClass::Transient,

        ScanError::Io(_) | ScanError::Serialization(_) => ErrorClass::Configuration,
    }
}
