// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages shown by the scanner UI.
//
// Every error that reaches the user is mapped to a short plain-English message
// with a suggestion. Severity drives how the UI presents it.

use crate::error::ScanError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The scanner keeps running; the user just tries again.
    Transient,
    /// The user must do something (grant camera access, reopen the scanner).
    ActionRequired,
    /// The scanner is misconfigured and cannot run until that is fixed.
    Permanent,
}

/// A human-readable error with a plain English message and a suggestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanError {
    /// Short summary (shown in the scanner overlay).
    pub message: String,
    /// What the user should try.
    pub suggestion: String,
    /// Whether the scanner stays open for another attempt.
    pub retriable: bool,
    pub severity: Severity,
}

impl std::fmt::Display for HumanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.message, self.suggestion)
    }
}

/// Convert a `ScanError` into a message for the scanner overlay.
pub fn humanize_error(err: &ScanError) -> HumanError {
    match err {
        ScanError::DeviceUnavailable(detail) => {
            let lower = detail.to_ascii_lowercase();
            if lower.contains("permission") || lower.contains("denied") {
                HumanError {
                    message: "Could not start scanner.".into(),
                    suggestion: "Please ensure camera permissions are granted, then open the scanner again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "The camera stopped working.".into(),
                    suggestion: "Close the scanner and open it again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            }
        }

        ScanError::RecognitionUnavailable(_) => HumanError {
            message: "Text recognition is not ready.".into(),
            suggestion: "Close the scanner and open it again.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        ScanError::RecognitionFailed(_)
        | ScanError::Preprocessing { .. }
        | ScanError::InvalidFrame(_) => HumanError {
            message: "Scan failed.".into(),
            suggestion: "Please try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanError::InvalidState { .. } => HumanError {
            message: "The scanner is busy.".into(),
            suggestion: "Wait for the current step to finish, then try again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        ScanError::InvalidConfig(detail) => HumanError {
            message: "The scanner settings are invalid.".into(),
            suggestion: format!("Fix the scanner settings and restart. (Detail: {detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        ScanError::Io(_) | ScanError::Serialization(_) => HumanError {
            message: "The scanner settings could not be read.".into(),
            suggestion: "Check the settings file, or delete it to restore the defaults.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}
