// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Frame extractor — crops the centred region of interest out of a captured
// frame.

use labelscan_core::error::{Result, ScanError};
use labelscan_core::{Frame, Roi, RoiFractions};
use tracing::{debug, instrument};

/// Crops a fixed-proportion, centred region of interest from each frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameExtractor {
    fractions: RoiFractions,
}

impl Default for FrameExtractor {
    /// 30% of the frame width, 10% of its height.
    fn default() -> Self {
        Self {
            fractions: RoiFractions::default(),
        }
    }
}

impl FrameExtractor {
    /// Create an extractor for the given fractions.
    pub fn new(fractions: RoiFractions) -> Result<Self> {
        fractions.validate()?;
        Ok(Self { fractions })
    }

    pub fn fractions(&self) -> RoiFractions {
        self.fractions
    }

    /// Compute the ROI rectangle for a `width` x `height` frame.
    ///
    /// The rectangle is at least 1x1 and always lies inside the frame.
    pub fn roi(&self, width: u32, height: u32) -> Result<Roi> {
        if width == 0 || height == 0 {
            return Err(ScanError::InvalidFrame(format!(
                "frame has zero dimension ({width}x{height})"
            )));
        }

        let roi_w = ((width as f64 * self.fractions.width as f64).floor() as u32).clamp(1, width);
        let roi_h =
            ((height as f64 * self.fractions.height as f64).floor() as u32).clamp(1, height);

        Ok(Roi {
            x: (width - roi_w) / 2,
            y: (height - roi_h) / 2,
            width: roi_w,
            height: roi_h,
        })
    }

    /// Crop the ROI out of `frame`. The crop keeps the source timestamp.
    #[instrument(skip_all, fields(width = frame.width(), height = frame.height()))]
    pub fn extract(&self, frame: &Frame) -> Result<Frame> {
        let roi = self.roi(frame.width(), frame.height())?;
        debug!(x = roi.x, y = roi.y, w = roi.width, h = roi.height, "Extracting ROI");

        let cropped =
            image::imageops::crop_imm(frame.as_rgba(), roi.x, roi.y, roi.width, roi.height)
                .to_image();
        Ok(Frame::from_image(cropped).with_timestamp(frame.captured_at()))
    }
}
