// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanner configuration.
//
// Everything here is a plain value: it is built once, validated, handed to a
// session and never mutated while the session runs.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ScanError};
use crate::types::RecognitionParams;

// ---------------------------------------------------------------------------
// Region of interest
// ---------------------------------------------------------------------------

/// Size of the region of interest as fractions of the frame, centred.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoiFractions {
    pub width: f32,
    pub height: f32,
}

impl Default for RoiFractions {
    fn default() -> Self {
        Self {
            width: 0.30,
            height: 0.10,
        }
    }
}

impl RoiFractions {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ScanError::InvalidConfig(format!(
                    "ROI {name} fraction must be in (0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing stages
// ---------------------------------------------------------------------------

/// Which transform stage an error or log line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Colorspace,
    NoiseReduction,
    Contrast,
    Binarization,
    Morphology,
    Polarity,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StageKind::Colorspace => "colorspace",
            StageKind::NoiseReduction => "noise reduction",
            StageKind::Contrast => "contrast",
            StageKind::Binarization => "binarization",
            StageKind::Morphology => "morphology",
            StageKind::Polarity => "polarity",
        };
        f.write_str(name)
    }
}

/// An HSV plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HsvChannel {
    Hue,
    Saturation,
    Value,
}

/// Which RGB channel to keep when isolating a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelSelect {
    Red,
    Green,
    Blue,
    /// Pick the channel in which a background of this hue (degrees) is
    /// darkest, so light label text stands out against it.
    ForBackgroundHue { hue: u16 },
}

/// Colorspace conversion applied to the RGB frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ColorMode {
    Grayscale,
    Hsv { isolate: Option<HsvChannel> },
    ChannelIsolation { channel: ChannelSelect },
}

/// Noise reduction filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum BlurKind {
    Gaussian { sigma: f32 },
    Median { radius: u32 },
}

/// Contrast-limited adaptive histogram equalization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Clahe {
    pub clip_limit: f32,
    /// Tile grid as `[columns, rows]`.
    pub tile_grid: [u32; 2],
}

impl Default for Clahe {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tile_grid: [8, 2],
        }
    }
}

/// One end of an HSV range. Hue is in degrees (0–359).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvBound {
    pub hue: u16,
    pub saturation: u8,
    pub value: u8,
}

/// Binarization method.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Binarization {
    AdaptiveMean { block_size: u32, c: f32 },
    AdaptiveGaussian { block_size: u32, c: f32 },
    Otsu,
    /// Background band in HSV space. When `low.hue > high.hue` the band wraps
    /// through 0°.
    HsvRange { low: HsvBound, high: HsvBound },
}

/// Square dilation of the binary foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Morphology {
    pub kernel_size: u32,
    pub iterations: u32,
}

/// A single preprocessing stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "params", rename_all = "snake_case")]
pub enum Stage {
    Colorspace(ColorMode),
    Blur(BlurKind),
    Contrast(Clahe),
    Binarize(Binarization),
    Dilate(Morphology),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Colorspace(_) => StageKind::Colorspace,
            Stage::Blur(_) => StageKind::NoiseReduction,
            Stage::Contrast(_) => StageKind::Contrast,
            Stage::Binarize(_) => StageKind::Binarization,
            Stage::Dilate(_) => StageKind::Morphology,
        }
    }
}

/// What kind of pixel data a stage receives, tracked during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataKind {
    Rgb,
    Gray,
    Hsv,
    Binary,
}

/// Ordered preprocessing chain plus the final polarity flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    pub stages: Vec<Stage>,
    /// Invert the final mask so text is dark on light.
    pub invert_output: bool,
}

impl Default for PreprocessConfig {
    /// Blue-channel isolation with adaptive Gaussian thresholding.
    fn default() -> Self {
        Self::channel_isolation()
    }
}

impl PreprocessConfig {
    /// Start a builder. Stages added through the builder are emitted in
    /// canonical order regardless of call order.
    pub fn builder() -> PreprocessConfigBuilder {
        PreprocessConfigBuilder::default()
    }

    /// Blue channel + adaptive Gaussian (15, 5). Suited to light text on a
    /// red label, where the blue channel gives the strongest separation.
    pub fn channel_isolation() -> Self {
        Self::builder()
            .colorspace(ColorMode::ChannelIsolation {
                channel: ChannelSelect::Blue,
            })
            .binarize(Binarization::AdaptiveGaussian {
                block_size: 15,
                c: 5.0,
            })
            .build()
    }

    /// Grayscale + light blur + Otsu + a small dilation. Expects bright text
    /// on a darker label, so the output is inverted.
    pub fn grayscale_otsu() -> Self {
        Self::builder()
            .colorspace(ColorMode::Grayscale)
            .blur(BlurKind::Gaussian { sigma: 1.0 })
            .binarize(Binarization::Otsu)
            .dilate(Morphology {
                kernel_size: 2,
                iterations: 1,
            })
            .invert_output(true)
            .build()
    }

    /// Grayscale + median + CLAHE + adaptive mean (15, 5) for dark text on
    /// unevenly lit light labels.
    pub fn grayscale_adaptive() -> Self {
        Self::builder()
            .colorspace(ColorMode::Grayscale)
            .blur(BlurKind::Median { radius: 1 })
            .contrast(Clahe::default())
            .binarize(Binarization::AdaptiveMean {
                block_size: 15,
                c: 5.0,
            })
            .build()
    }

    /// HSV masking of a red background band (wrapping through 0°), inverted
    /// so the text becomes foreground, then dilated.
    pub fn hsv_background() -> Self {
        Self::builder()
            .colorspace(ColorMode::Hsv { isolate: None })
            .binarize(Binarization::HsvRange {
                low: HsvBound {
                    hue: 340,
                    saturation: 80,
                    value: 50,
                },
                high: HsvBound {
                    hue: 20,
                    saturation: 255,
                    value: 255,
                },
            })
            .dilate(Morphology {
                kernel_size: 2,
                iterations: 1,
            })
            .invert_output(true)
            .build()
    }

    /// Check parameters and stage order.
    pub fn validate(&self) -> Result<()> {
        let mut data = DataKind::Rgb;
        let mut colorspace_seen = false;

        for (position, stage) in self.stages.iter().enumerate() {
            let invalid = |reason: String| {
                ScanError::InvalidConfig(format!(
                    "stage {position} ({}): {reason}",
                    stage.kind()
                ))
            };

            if data == DataKind::Binary && !matches!(stage, Stage::Dilate(_)) {
                return Err(invalid(
                    "only dilation may follow binarization".to_string(),
                ));
            }

            match stage {
                Stage::Colorspace(mode) => {
                    if colorspace_seen {
                        return Err(invalid("at most one colorspace stage is allowed".into()));
                    }
                    colorspace_seen = true;
                    data = match mode {
                        ColorMode::Grayscale => DataKind::Gray,
                        ColorMode::Hsv { isolate: None } => DataKind::Hsv,
                        ColorMode::Hsv { isolate: Some(_) } => DataKind::Gray,
                        ColorMode::ChannelIsolation { channel } => {
                            if let ChannelSelect::ForBackgroundHue { hue } = channel {
                                check_hue(*hue).map_err(invalid)?;
                            }
                            DataKind::Gray
                        }
                    };
                }
                Stage::Blur(BlurKind::Gaussian { sigma }) => {
                    if !(sigma.is_finite() && *sigma > 0.0) {
                        return Err(invalid(format!("Gaussian sigma must be > 0, got {sigma}")));
                    }
                }
                Stage::Blur(BlurKind::Median { radius }) => {
                    if *radius == 0 {
                        return Err(invalid("median radius must be >= 1".into()));
                    }
                }
                Stage::Contrast(clahe) => {
                    if data == DataKind::Rgb {
                        return Err(invalid(
                            "contrast normalization needs a colorspace stage first".into(),
                        ));
                    }
                    if !(clahe.clip_limit.is_finite() && clahe.clip_limit > 0.0) {
                        return Err(invalid(format!(
                            "clip limit must be > 0, got {}",
                            clahe.clip_limit
                        )));
                    }
                    if clahe.tile_grid.contains(&0) {
                        return Err(invalid("tile grid must be at least 1x1".into()));
                    }
                }
                Stage::Binarize(method) => {
                    match method {
                        Binarization::AdaptiveMean { block_size, c }
                        | Binarization::AdaptiveGaussian { block_size, c } => {
                            if *block_size < 3 || block_size % 2 == 0 {
                                return Err(invalid(format!(
                                    "block size must be odd and >= 3, got {block_size}"
                                )));
                            }
                            if !c.is_finite() {
                                return Err(invalid("constant C must be finite".into()));
                            }
                            if data == DataKind::Rgb {
                                return Err(invalid(
                                    "adaptive threshold needs a colorspace stage first".into(),
                                ));
                            }
                        }
                        Binarization::Otsu => {
                            if data == DataKind::Rgb {
                                return Err(invalid(
                                    "Otsu threshold needs a colorspace stage first".into(),
                                ));
                            }
                        }
                        Binarization::HsvRange { low, high } => {
                            if data != DataKind::Hsv {
                                return Err(invalid(
                                    "HSV range masking needs un-isolated HSV data".into(),
                                ));
                            }
                            check_hue(low.hue).map_err(invalid)?;
                            check_hue(high.hue).map_err(invalid)?;
                            if low.saturation > high.saturation || low.value > high.value {
                                return Err(invalid(
                                    "HSV range low bound exceeds high bound".into(),
                                ));
                            }
                        }
                    }
                    data = DataKind::Binary;
                }
                Stage::Dilate(morphology) => {
                    if data != DataKind::Binary {
                        return Err(invalid(
                            "dilation requested before binarization".into(),
                        ));
                    }
                    if morphology.kernel_size == 0 || morphology.iterations == 0 {
                        return Err(invalid(
                            "kernel size and iterations must be >= 1".into(),
                        ));
                    }
                }
            }
        }

        if data != DataKind::Binary {
            return Err(ScanError::InvalidConfig(
                "preprocessing chain has no binarization stage".into(),
            ));
        }
        Ok(())
    }
}

fn check_hue(hue: u16) -> std::result::Result<(), String> {
    if hue >= 360 {
        Err(format!("hue must be in 0..360 degrees, got {hue}"))
    } else {
        Ok(())
    }
}

/// Builder producing stages in canonical order: colorspace, blur, contrast,
/// binarization, dilation.
#[derive(Debug, Default)]
pub struct PreprocessConfigBuilder {
    colorspace: Option<ColorMode>,
    blur: Option<BlurKind>,
    contrast: Option<Clahe>,
    binarize: Option<Binarization>,
    dilate: Option<Morphology>,
    invert_output: bool,
}

impl PreprocessConfigBuilder {
    pub fn colorspace(mut self, mode: ColorMode) -> Self {
        self.colorspace = Some(mode);
        self
    }

    pub fn blur(mut self, blur: BlurKind) -> Self {
        self.blur = Some(blur);
        self
    }

    pub fn contrast(mut self, clahe: Clahe) -> Self {
        self.contrast = Some(clahe);
        self
    }

    pub fn binarize(mut self, method: Binarization) -> Self {
        self.binarize = Some(method);
        self
    }

    pub fn dilate(mut self, morphology: Morphology) -> Self {
        self.dilate = Some(morphology);
        self
    }

    pub fn invert_output(mut self, invert: bool) -> Self {
        self.invert_output = invert;
        self
    }

    pub fn build(self) -> PreprocessConfig {
        let stages = [
            self.colorspace.map(Stage::Colorspace),
            self.blur.map(Stage::Blur),
            self.contrast.map(Stage::Contrast),
            self.binarize.map(Stage::Binarize),
            self.dilate.map(Stage::Dilate),
        ]
        .into_iter()
        .flatten()
        .collect();

        PreprocessConfig {
            stages,
            invert_output: self.invert_output,
        }
    }
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Similarity function used to score recognized text against the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    /// Bigram overlap, whitespace-insensitive.
    #[default]
    SorensenDice,
    NormalizedLevenshtein,
    JaroWinkler,
}

/// Catalog matcher settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Candidates scoring above this are discarded (0 = exact, 1 = unrelated).
    pub threshold: f64,
    pub scorer: ScorerKind,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            scorer: ScorerKind::SorensenDice,
        }
    }
}

impl MatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(ScanError::InvalidConfig(format!(
                "match threshold must be in [0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Floor for [`SessionConfig::min_text_len`]. Anything shorter is never
/// worth matching against the catalog.
pub const MIN_TEXT_LEN: usize = 4;

/// Everything a scan session needs, supplied once at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub roi: RoiFractions,
    pub preprocess: PreprocessConfig,
    pub recognition: RecognitionParams,
    pub matcher: MatcherConfig,
    /// Recognized text shorter than this (after trimming) is treated as
    /// "no text" and never reaches the matcher. At least [`MIN_TEXT_LEN`].
    pub min_text_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            roi: RoiFractions::default(),
            preprocess: PreprocessConfig::default(),
            recognition: RecognitionParams::default(),
            matcher: MatcherConfig::default(),
            min_text_len: MIN_TEXT_LEN,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<()> {
        self.roi.validate()?;
        self.preprocess.validate()?;
        self.matcher.validate()?;
        if self.recognition.char_whitelist.is_empty() {
            return Err(ScanError::InvalidConfig(
                "character whitelist must not be empty".into(),
            ));
        }
        if self.min_text_len < MIN_TEXT_LEN {
            return Err(ScanError::InvalidConfig(format!(
                "min_text_len must be at least {MIN_TEXT_LEN}, got {}",
                self.min_text_len
            )));
        }
        Ok(())
    }

    /// Read a JSON configuration file and validate it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)?;
        let config: SessionConfig = serde_json::from_str(&data)?;
        config.validate()?;
        info!(path = %path.display(), stages = config.preprocess.stages.len(), "Session config loaded");
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        debug!(path = %path.as_ref().display(), "Session config saved");
        Ok(())
    }
}
