// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// labelscan-bridge — the seams between the scan session and the outside
// world: the camera, the text recognition engine, and the user.
//
// The session is generic over these traits, so platform code (a browser
// camera, a V4L2 device, a mobile SDK) plugs in without the session knowing.

pub mod replay;
pub mod stub;
pub mod traits;

pub use replay::{ReplayCamera, ReplayStream};
pub use stub::{StubCamera, StubRecognizerFactory};
pub use traits::{
    CaptureDevice, CaptureStream, ConfirmationPrompt, RecognizerFactory, TextRecognizer,
};
