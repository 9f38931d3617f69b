// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the labelscan engine.

use chrono::{DateTime, Utc};
use image::{GrayImage, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, ScanError};

/// Unique identifier for a scan session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// A single captured frame.
///
/// Pixels are stored as interleaved RGBA8. A frame is immutable once
/// constructed; the attempt that captured it owns it and drops it when the
/// attempt ends.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbaImage,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Wrap an RGBA buffer, stamping it with the current time.
    pub fn from_image(image: RgbaImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    /// Build a frame from raw interleaved RGBA8 bytes.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let len = data.len();
        let image = RgbaImage::from_raw(width, height, data).ok_or_else(|| {
            ScanError::InvalidFrame(format!(
                "RGBA buffer of {len} bytes does not match {width}x{height}"
            ))
        })?;
        Ok(Self::from_image(image))
    }

    /// Build a frame from raw interleaved RGB8 bytes.
    pub fn from_rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let len = data.len();
        let rgb = RgbImage::from_raw(width, height, data).ok_or_else(|| {
            ScanError::InvalidFrame(format!(
                "RGB buffer of {len} bytes does not match {width}x{height}"
            ))
        })?;
        let rgba = RgbaImage::from_fn(width, height, |x, y| {
            let image::Rgb([r, g, b]) = *rgb.get_pixel(x, y);
            image::Rgba([r, g, b, 255])
        });
        Ok(Self::from_image(rgba))
    }

    /// Replace the capture timestamp (used by sources that stamp frames
    /// themselves, and by crops that inherit their source's time).
    pub fn with_timestamp(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Borrow the RGBA pixel buffer.
    pub fn as_rgba(&self) -> &RgbaImage {
        &self.image
    }

    /// True when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

/// Region of interest inside a frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

// ---------------------------------------------------------------------------
// Binary images
// ---------------------------------------------------------------------------

/// Single-channel image whose pixels are all 0 or 255.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryImage {
    pixels: GrayImage,
}

impl BinaryImage {
    /// Value of a foreground (set) pixel.
    pub const ON: u8 = 255;
    /// Value of a background (clear) pixel.
    pub const OFF: u8 = 0;

    /// Wrap a gray image, rejecting any pixel that is not 0 or 255.
    pub fn from_gray(pixels: GrayImage) -> Result<Self> {
        if let Some(bad) = pixels.as_raw().iter().find(|&&v| v != Self::ON && v != Self::OFF) {
            return Err(ScanError::InvalidFrame(format!(
                "binary image contains non-binary value {bad}"
            )));
        }
        Ok(Self { pixels })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn into_gray(self) -> GrayImage {
        self.pixels
    }

    /// Raw row-major pixel bytes.
    pub fn as_raw(&self) -> &[u8] {
        self.pixels.as_raw()
    }

    /// Number of 255-valued pixels.
    pub fn foreground_count(&self) -> usize {
        self.pixels.as_raw().iter().filter(|&&v| v == Self::ON).count()
    }
}

// ---------------------------------------------------------------------------
// Recognition
// ---------------------------------------------------------------------------

/// Characters the recognizer is allowed to emit: alphanumerics, space, hyphen.
pub const DEFAULT_CHAR_WHITELIST: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 -";

/// Recognition engine's internal model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Fast neural (LSTM-style) recognizer.
    #[default]
    Neural,
    /// Legacy pattern-based recognizer.
    Legacy,
    /// Both models combined.
    Combined,
}

/// How the engine segments the page. The scanner only ever reads one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentationMode {
    #[default]
    SingleLine,
}

/// Parameters handed to the recognizer on every call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionParams {
    pub engine_mode: EngineMode,
    pub char_whitelist: String,
    pub segmentation: SegmentationMode,
}

impl Default for RecognitionParams {
    fn default() -> Self {
        Self {
            engine_mode: EngineMode::Neural,
            char_whitelist: DEFAULT_CHAR_WHITELIST.to_string(),
            segmentation: SegmentationMode::SingleLine,
        }
    }
}

/// Raw output of one recognition call.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Recognized lines in reading order.
    pub lines: Vec<String>,
    /// Engine confidence (0–100) when the engine reports one.
    pub confidence: Option<f32>,
}

impl RecognitionResult {
    /// Split a newline-separated engine output into lines.
    pub fn from_text(text: &str, confidence: Option<f32>) -> Self {
        Self {
            lines: text.split('\n').map(str::to_string).collect(),
            confidence,
        }
    }

    /// The first line, trimmed. Empty when the engine produced nothing.
    pub fn first_line(&self) -> &str {
        self.lines.first().map(|line| line.trim()).unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Catalog matching
// ---------------------------------------------------------------------------

/// A canonical catalog string together with its position in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub index: usize,
    pub text: String,
}

/// A scored catalog entry. Lower scores are better; scores lie in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub entry: CatalogEntry,
    pub score: f64,
}

/// What the session asks the user to confirm.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    /// First line of the recognized text, trimmed.
    pub raw_text: String,
    /// Best catalog match, if any candidate survived the threshold.
    pub candidate: Option<MatchCandidate>,
}

impl PendingConfirmation {
    /// The string that will be committed on confirmation.
    pub fn proposed(&self) -> &str {
        match &self.candidate {
            Some(candidate) => &candidate.entry.text,
            None => &self.raw_text,
        }
    }

    /// Whether the proposal came from the catalog.
    pub fn is_matched(&self) -> bool {
        self.candidate.is_some()
    }
}

/// Answer from the confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Reject,
}

impl From<bool> for Decision {
    fn from(accepted: bool) -> Self {
        if accepted { Decision::Confirm } else { Decision::Reject }
    }
}
