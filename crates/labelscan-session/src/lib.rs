// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelscan-session — drives capture → recognize → match → confirm until the
// user accepts a label or the session is stopped.
//
// A session exclusively owns its capture stream and recognition engine. Both
// are released exactly once: on commit, on stop, on a fatal error, or when
// the session is dropped.

pub mod events;
pub mod session;
pub mod state;

pub use events::SessionEvent;
pub use session::ScanSession;
pub use state::{AttemptOutcome, Resolution, SessionState};
