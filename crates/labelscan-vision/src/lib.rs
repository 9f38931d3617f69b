// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelscan-vision — Image side of the label scanner.
//
// Crops the region of interest out of a captured frame and runs the
// configured transform chain (colorspace, noise reduction, contrast,
// binarization, dilation, polarity) to produce a clean binary image for the
// text recognizer.

pub mod frame;
pub mod preprocess;

#[cfg(feature = "ocr")]
pub mod ocr;

// Re-export the primary structs so callers can use `labelscan_vision::ImagePreprocessor` etc.
pub use frame::FrameExtractor;
pub use preprocess::{ImagePreprocessor, process};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrsRecognizer, OcrsRecognizerFactory};
