// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for the scanner's collaborators.
//
// Every method that may wait on hardware, a model, or a person returns a
// future. These are the session's suspension points.

use std::future::Future;

use labelscan_core::error::Result;
use labelscan_core::{
    BinaryImage, Decision, Frame, PendingConfirmation, RecognitionParams, RecognitionResult,
};

/// A camera (or any frame source) that can be opened into a stream.
pub trait CaptureDevice: Send {
    type Stream: CaptureStream;

    /// Acquire the stream. Permission problems and missing hardware are
    /// reported as `ScanError::DeviceUnavailable`.
    fn open(&mut self) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// An open capture stream. The session owns it exclusively.
pub trait CaptureStream: Send {
    /// The frame currently showing. Fails with `DeviceUnavailable` when the
    /// device stops delivering.
    fn current_frame(&mut self) -> impl Future<Output = Result<Frame>> + Send;

    /// Release the device. Called exactly once by the owner.
    fn close(&mut self);
}

/// Builds recognition engine instances.
///
/// Engine creation is typically expensive (model loading), so the session
/// creates one instance and reuses it until it stops.
pub trait RecognizerFactory: Send {
    type Recognizer: TextRecognizer;

    fn create(
        &mut self,
        params: &RecognitionParams,
    ) -> impl Future<Output = Result<Self::Recognizer>> + Send;
}

/// A live text recognition engine.
pub trait TextRecognizer: Send {
    /// Read the text in `image`.
    ///
    /// Fails with `RecognitionUnavailable` after [`terminate`](Self::terminate)
    /// and `RecognitionFailed` on any internal engine error.
    fn recognize(
        &mut self,
        image: &BinaryImage,
        params: &RecognitionParams,
    ) -> impl Future<Output = Result<RecognitionResult>> + Send;

    /// Dispose of the engine. Called exactly once by the owner.
    fn terminate(&mut self);
}

/// Asks the user whether to accept a proposal. May wait indefinitely.
pub trait ConfirmationPrompt: Send {
    fn confirm(&mut self, pending: &PendingConfirmation) -> impl Future<Output = Decision> + Send;
}
