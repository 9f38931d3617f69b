// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image preprocessor — runs the configured stage chain over an ROI frame and
// produces a binary mask for the recognizer.
//
// Stages run in the order the config lists them. Each stage takes the working
// image by value and returns a new one, so a failing stage never leaves a
// half-transformed image behind.

pub mod colorspace;
pub mod contrast;
pub mod morphology;
pub mod threshold;

use image::buffer::ConvertBuffer;
use image::{GrayImage, RgbImage};
use imageproc::filter::{gaussian_blur_f32, median_filter};
use labelscan_core::error::{Result, ScanError};
use labelscan_core::{
    Binarization, BinaryImage, BlurKind, ColorMode, Frame, PreprocessConfig, Stage, StageKind,
};
use tracing::{debug, info, instrument};

use self::colorspace::HsvImage;

/// Pixel data between stages.
enum Working {
    Rgb(RgbImage),
    Gray(GrayImage),
    Hsv(HsvImage),
    Binary(GrayImage),
}

impl Working {
    fn label(&self) -> &'static str {
        match self {
            Working::Rgb(_) => "rgb",
            Working::Gray(_) => "gray",
            Working::Hsv(_) => "hsv",
            Working::Binary(_) => "binary",
        }
    }
}

/// Turns ROI frames into binary masks.
///
/// Holds a validated [`PreprocessConfig`]; the same preprocessor can be used
/// for every attempt in a session.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    config: PreprocessConfig,
}

impl ImagePreprocessor {
    /// Validate `config` and build a preprocessor for it.
    pub fn new(config: PreprocessConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Run the stage chain over `frame`.
    #[instrument(skip_all, fields(width = frame.width(), height = frame.height(), stages = self.config.stages.len()))]
    pub fn process(&self, frame: &Frame) -> Result<BinaryImage> {
        run_chain(frame, &self.config)
    }
}

/// One-shot preprocessing. Validates `config` before touching the frame.
pub fn process(frame: &Frame, config: &PreprocessConfig) -> Result<BinaryImage> {
    config.validate()?;
    run_chain(frame, config)
}

fn run_chain(frame: &Frame, config: &PreprocessConfig) -> Result<BinaryImage> {
    if frame.is_empty() {
        return Err(ScanError::InvalidFrame(format!(
            "cannot preprocess an empty {}x{} frame",
            frame.width(),
            frame.height()
        )));
    }

    let rgb: RgbImage = frame.as_rgba().convert();
    let mut working = Working::Rgb(rgb);

    for stage in &config.stages {
        debug!(stage = %stage.kind(), input = working.label(), "Applying stage");
        working = apply(stage, working)?;
    }

    let mask = match working {
        Working::Binary(mask) => mask,
        other => {
            return Err(ScanError::stage(
                StageKind::Binarization,
                format!("chain ended on {} data, not a binary mask", other.label()),
            ));
        }
    };

    let mask = if config.invert_output {
        invert(mask)
    } else {
        mask
    };

    let binary = BinaryImage::from_gray(mask)
        .map_err(|err| ScanError::stage(StageKind::Polarity, err.to_string()))?;
    info!(
        width = binary.width(),
        height = binary.height(),
        foreground = binary.foreground_count(),
        "Preprocessing complete"
    );
    Ok(binary)
}

fn apply(stage: &Stage, working: Working) -> Result<Working> {
    let kind = stage.kind();
    let mismatch =
        |working: &Working| ScanError::stage(kind, format!("cannot run on {} data", working.label()));

    match stage {
        Stage::Colorspace(mode) => {
            let rgb = match working {
                Working::Rgb(rgb) => rgb,
                other => return Err(mismatch(&other)),
            };
            Ok(match mode {
                ColorMode::Grayscale => Working::Gray(colorspace::to_grayscale(&rgb)),
                ColorMode::Hsv { isolate: None } => Working::Hsv(colorspace::to_hsv(&rgb)),
                ColorMode::Hsv {
                    isolate: Some(channel),
                } => Working::Gray(colorspace::to_hsv(&rgb).plane(*channel)),
                ColorMode::ChannelIsolation { channel } => {
                    Working::Gray(colorspace::isolate_channel(&rgb, *channel))
                }
            })
        }

        Stage::Blur(blur) => match working {
            Working::Rgb(rgb) => Ok(Working::Rgb(match blur {
                BlurKind::Gaussian { sigma } => gaussian_blur_f32(&rgb, *sigma),
                BlurKind::Median { radius } => median_filter(&rgb, *radius, *radius),
            })),
            Working::Gray(gray) => Ok(Working::Gray(blur_gray(&gray, blur))),
            // HSV: smooth the value plane only.
            Working::Hsv(hsv) => Ok(Working::Hsv(HsvImage {
                value: blur_gray(&hsv.value, blur),
                ..hsv
            })),
            other => Err(mismatch(&other)),
        },

        Stage::Contrast(clahe) => match working {
            Working::Gray(gray) => Ok(Working::Gray(contrast::equalize(&gray, clahe)?)),
            Working::Hsv(hsv) => {
                let value = contrast::equalize(&hsv.value, clahe)?;
                Ok(Working::Hsv(HsvImage { value, ..hsv }))
            }
            other => Err(mismatch(&other)),
        },

        Stage::Binarize(method) => {
            let mask = match (method, &working) {
                (Binarization::HsvRange { low, high }, Working::Hsv(hsv)) => {
                    threshold::hsv_range(hsv, low, high)
                }
                (Binarization::HsvRange { .. }, _) => return Err(mismatch(&working)),
                (_, Working::Gray(gray)) => binarize_gray(gray, method),
                (_, Working::Hsv(hsv)) => binarize_gray(&hsv.value, method),
                _ => return Err(mismatch(&working)),
            };
            Ok(Working::Binary(mask))
        }

        Stage::Dilate(params) => match working {
            Working::Binary(mask) => Ok(Working::Binary(morphology::dilate(&mask, params))),
            other => Err(mismatch(&other)),
        },
    }
}

fn blur_gray(gray: &GrayImage, blur: &BlurKind) -> GrayImage {
    match blur {
        BlurKind::Gaussian { sigma } => gaussian_blur_f32(gray, *sigma),
        BlurKind::Median { radius } => median_filter(gray, *radius, *radius),
    }
}

fn binarize_gray(gray: &GrayImage, method: &Binarization) -> GrayImage {
    match method {
        Binarization::AdaptiveMean { block_size, c } => {
            threshold::adaptive_mean(gray, *block_size, *c)
        }
        Binarization::AdaptiveGaussian { block_size, c } => {
            threshold::adaptive_gaussian(gray, *block_size, *c)
        }
        Binarization::Otsu => {
            let t = threshold::otsu_threshold(&threshold::histogram(gray));
            debug!(threshold = t, "Otsu threshold computed");
            threshold::global(gray, t)
        }
        // Gray data never carries hue; validation rejects this combination.
        Binarization::HsvRange { .. } => GrayImage::new(gray.width(), gray.height()),
    }
}

fn invert(mut mask: GrayImage) -> GrayImage {
    for pixel in mask.pixels_mut() {
        pixel.0[0] = 255 - pixel.0[0];
    }
    mask
}
