// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelscan — Core types, configuration, and error definitions shared across
// all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;

pub use config::{
    Binarization, BlurKind, ChannelSelect, Clahe, ColorMode, HsvBound, HsvChannel,
    MIN_TEXT_LEN, MatcherConfig, Morphology, PreprocessConfig, PreprocessConfigBuilder, RoiFractions,
    ScorerKind, SessionConfig, Stage, StageKind,
};
pub use error::{ErrorClass, ScanError, classify_error};
pub use types::*;
