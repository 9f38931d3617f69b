// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub collaborators for builds without a camera or recognition engine.
//
// Every method fails with the matching "unavailable" error, so a session
// built on them ends in a clean, user-visible failure instead of a panic.

use labelscan_core::error::{Result, ScanError};
use labelscan_core::{BinaryImage, Frame, RecognitionParams, RecognitionResult};

use crate::traits::*;

/// Camera that is never available.
#[derive(Debug, Default)]
pub struct StubCamera;

/// Stream type for [`StubCamera`]. Never constructed by `open`.
#[derive(Debug)]
pub struct StubStream;

impl CaptureDevice for StubCamera {
    type Stream = StubStream;

    async fn open(&mut self) -> Result<StubStream> {
        tracing::warn!("CaptureDevice::open called on stub camera");
        Err(ScanError::DeviceUnavailable(
            "no capture device on this platform".into(),
        ))
    }
}

impl CaptureStream for StubStream {
    async fn current_frame(&mut self) -> Result<Frame> {
        tracing::warn!("CaptureStream::current_frame called on stub stream");
        Err(ScanError::DeviceUnavailable(
            "no capture device on this platform".into(),
        ))
    }

    fn close(&mut self) {}
}

/// Factory for builds without an OCR engine.
#[derive(Debug, Default)]
pub struct StubRecognizerFactory;

/// Recognizer type for [`StubRecognizerFactory`]. Never constructed.
#[derive(Debug)]
pub struct StubRecognizer;

impl RecognizerFactory for StubRecognizerFactory {
    type Recognizer = StubRecognizer;

    async fn create(&mut self, _params: &RecognitionParams) -> Result<StubRecognizer> {
        tracing::warn!("RecognizerFactory::create called on stub factory");
        Err(ScanError::RecognitionUnavailable(
            "built without a text recognition engine".into(),
        ))
    }
}

impl TextRecognizer for StubRecognizer {
    async fn recognize(
        &mut self,
        _image: &BinaryImage,
        _params: &RecognitionParams,
    ) -> Result<RecognitionResult> {
        Err(ScanError::RecognitionUnavailable(
            "built without a text recognition engine".into(),
        ))
    }

    fn terminate(&mut self) {}
}
