// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Session states and per-step outcomes.

use labelscan_core::PendingConfirmation;
use labelscan_core::human_errors::HumanError;

/// Where a [`ScanSession`](crate::ScanSession) is.
///
/// `Committed` and `Cancelled` are terminal. `Failed` is passed through on
/// the way back to `Capturing` (transient errors) or on to `Cancelled`
/// (fatal ones).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Capturing,
    ExtractingFrame,
    Preprocessing,
    Recognizing,
    Matching,
    AwaitingConfirmation(PendingConfirmation),
    Retrying,
    Committed(String),
    Cancelled,
    Failed,
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Capturing => "capturing",
            SessionState::ExtractingFrame => "extracting_frame",
            SessionState::Preprocessing => "preprocessing",
            SessionState::Recognizing => "recognizing",
            SessionState::Matching => "matching",
            SessionState::AwaitingConfirmation(_) => "awaiting_confirmation",
            SessionState::Retrying => "retrying",
            SessionState::Committed(_) => "committed",
            SessionState::Cancelled => "cancelled",
            SessionState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Committed(_) | SessionState::Cancelled)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one "scan this frame" request.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    /// Recognized text was empty or too short. The session is capturing again.
    NoText,
    /// A catalog entry matched. The session awaits confirmation.
    Candidate(PendingConfirmation),
    /// Nothing in the catalog was close enough; the raw text is proposed.
    Unmatched(PendingConfirmation),
    /// A stage failed for this attempt only. The session is capturing again.
    Failed(HumanError),
}

/// What a confirm/reject decision led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The accepted string; the session has released its resources.
    Committed(String),
    /// The proposal was rejected; the session is capturing again.
    Retrying,
}
