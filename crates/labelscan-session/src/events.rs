// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Notifications broadcast by a session for the surrounding UI.

use crate::state::SessionState;

/// Something the UI may want to show.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    /// A short user-facing message ("Text not found. Try again.").
    Notice(String),
}

/// Capacity of the broadcast channel. Slow subscribers lose the oldest events.
pub(crate) const EVENT_CHANNEL_CAPACITY: usize = 64;
