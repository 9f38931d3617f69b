// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text recognizer backed by the `ocrs` crate, a pure-Rust OCR engine running
// neural network models through `rten`.
//
// # Feature Gate
//
// Only available with the `ocr` feature:
//
// ```toml
// labelscan-vision = { path = "crates/labelscan-vision", features = ["ocr"] }
// ```
//
// # Model Setup
//
// The engine needs `text-detection.rten` and `text-recognition.rten`. Running
// `ocrs-cli` once downloads both to `$XDG_CACHE_HOME/ocrs` (typically
// `~/.cache/ocrs`), which is where the default config looks.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use labelscan_bridge::{RecognizerFactory, TextRecognizer};
use labelscan_core::error::{Result, ScanError};
use labelscan_core::{BinaryImage, EngineMode, RecognitionParams, RecognitionResult};
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument, warn};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// `$XDG_CACHE_HOME/ocrs`, falling back to `~/.cache/ocrs`.
fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Where to find the two model files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expects `dir` to contain `text-detection.rten` and
    /// `text-recognition.rten`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    /// Check that both model files exist.
    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(ScanError::RecognitionUnavailable(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

/// Load both models and build an engine. Blocking.
fn load_engine(config: &OcrConfig) -> Result<OcrEngine> {
    config.validate()?;

    let load = |path: &Path| {
        Model::load_file(path).map_err(|err| {
            ScanError::RecognitionUnavailable(format!(
                "failed to load model from {}: {err}",
                path.display()
            ))
        })
    };

    info!("Loading OCR models");
    let detection_model = load(&config.detection_model_path)?;
    let recognition_model = load(&config.recognition_model_path)?;

    OcrEngine::new(OcrEngineParams {
        detection_model: Some(detection_model),
        recognition_model: Some(recognition_model),
        ..Default::default()
    })
    .map_err(|err| {
        ScanError::RecognitionUnavailable(format!("failed to initialise OCR engine: {err}"))
    })
}

/// A loaded `ocrs` engine.
///
/// Recognition runs on tokio's blocking pool. After
/// [`terminate`](TextRecognizer::terminate) every call fails with
/// `RecognitionUnavailable`.
pub struct OcrsRecognizer {
    engine: Option<Arc<OcrEngine>>,
}

impl OcrsRecognizer {
    /// Load the models synchronously.
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: &OcrConfig) -> Result<Self> {
        let engine = load_engine(config)?;
        info!("OCR engine initialised");
        Ok(Self {
            engine: Some(Arc::new(engine)),
        })
    }

    pub fn is_ready(&self) -> bool {
        self.engine.is_some()
    }
}

impl TextRecognizer for OcrsRecognizer {
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    async fn recognize(
        &mut self,
        image: &BinaryImage,
        params: &RecognitionParams,
    ) -> Result<RecognitionResult> {
        let engine = self.engine.clone().ok_or_else(|| {
            ScanError::RecognitionUnavailable("OCR engine has been terminated".into())
        })?;

        if params.engine_mode != EngineMode::Neural {
            warn!(mode = ?params.engine_mode, "ocrs only has a neural model; using it");
        }

        // ocrs expects RGB8.
        let (width, height) = image.dimensions();
        let rgb: Vec<u8> = image.as_raw().iter().flat_map(|&v| [v, v, v]).collect();

        let text = tokio::task::spawn_blocking(move || -> std::result::Result<String, String> {
            let source = ImageSource::from_bytes(&rgb, (width, height))
                .map_err(|err| format!("failed to create image source ({width}x{height}): {err}"))?;
            let input = engine
                .prepare_input(source)
                .map_err(|err| format!("OCR input preparation failed: {err}"))?;
            engine
                .get_text(&input)
                .map_err(|err| format!("OCR text recognition failed: {err}"))
        })
        .await
        .map_err(|err| ScanError::RecognitionFailed(format!("recognition task aborted: {err}")))?
        .map_err(ScanError::RecognitionFailed)?;

        let filtered = filter_whitelist(&text, &params.char_whitelist);
        debug!(
            lines = filtered.lines().count(),
            chars = filtered.len(),
            "OCR recognition complete"
        );
        Ok(RecognitionResult::from_text(&filtered, None))
    }

    fn terminate(&mut self) {
        if self.engine.take().is_some() {
            info!("OCR engine terminated");
        }
    }
}

/// Drop every character not in `whitelist`, keeping line breaks.
fn filter_whitelist(text: &str, whitelist: &str) -> String {
    text.chars()
        .filter(|c| *c == '\n' || whitelist.contains(*c))
        .collect()
}

/// Loads an [`OcrsRecognizer`] on the blocking pool when a session starts.
#[derive(Debug, Clone, Default)]
pub struct OcrsRecognizerFactory {
    config: OcrConfig,
}

impl OcrsRecognizerFactory {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

impl RecognizerFactory for OcrsRecognizerFactory {
    type Recognizer = OcrsRecognizer;

    async fn create(&mut self, _params: &RecognitionParams) -> Result<OcrsRecognizer> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || OcrsRecognizer::new(&config))
            .await
            .map_err(|err| {
                ScanError::RecognitionUnavailable(format!("model loading task aborted: {err}"))
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelscan_core::DEFAULT_CHAR_WHITELIST;

    #[test]
    fn default_config_points_to_cache_dir() {
        let config = OcrConfig::default();
        assert!(config.detection_model_path.ends_with(DETECTION_MODEL_FILENAME));
        assert!(config.recognition_model_path.ends_with(RECOGNITION_MODEL_FILENAME));
    }

    #[test]
    fn config_from_dir() {
        let config = OcrConfig::from_dir("/tmp/my-models");
        assert_eq!(
            config.detection_model_path,
            PathBuf::from("/tmp/my-models/text-detection.rten")
        );
    }

    #[test]
    fn missing_models_are_unavailable() {
        let config = OcrConfig::from_dir("/nonexistent/path/ocr-models");
        assert!(matches!(
            config.validate(),
            Err(ScanError::RecognitionUnavailable(_))
        ));
    }

    #[test]
    fn whitelist_strips_punctuation_but_keeps_lines() {
        let filtered = filter_whitelist("Red Brick, Tile!\nA-12_b", DEFAULT_CHAR_WHITELIST);
        assert_eq!(filtered, "Red Brick Tile\nA-12b");
    }

    #[tokio::test]
    async fn terminated_recognizer_is_unavailable() {
        let mut recognizer = OcrsRecognizer { engine: None };
        assert!(!recognizer.is_ready());

        let image = BinaryImage::from_gray(image::GrayImage::new(4, 4)).unwrap();
        let result = recognizer
            .recognize(&image, &RecognitionParams::default())
            .await;
        assert!(matches!(result, Err(ScanError::RecognitionUnavailable(_))));

        // Terminating twice is harmless.
        recognizer.terminate();
        recognizer.terminate();
        assert!(!recognizer.is_ready());
    }

    #[tokio::test]
    async fn factory_without_models_fails_unavailable() {
        let mut factory = OcrsRecognizerFactory::new(OcrConfig::from_dir("/nonexistent/ocr"));
        let result = factory.create(&RecognitionParams::default()).await;
        assert!(matches!(result, Err(ScanError::RecognitionUnavailable(_))));
    }
}
