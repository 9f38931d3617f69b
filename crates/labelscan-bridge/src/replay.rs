// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Replay camera — serves a fixed set of still frames in a loop.
//
// Useful for decoding photos of labels and for driving a session without
// hardware.

use std::sync::Arc;

use labelscan_core::error::{Result, ScanError};
use labelscan_core::Frame;
use tracing::debug;

use crate::traits::{CaptureDevice, CaptureStream};

/// A capture device backed by in-memory frames.
#[derive(Debug, Clone)]
pub struct ReplayCamera {
    frames: Arc<[Frame]>,
}

impl ReplayCamera {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Open stream over a [`ReplayCamera`]'s frames.
#[derive(Debug)]
pub struct ReplayStream {
    frames: Arc<[Frame]>,
    cursor: usize,
    closed: bool,
}

impl CaptureDevice for ReplayCamera {
    type Stream = ReplayStream;

    async fn open(&mut self) -> Result<ReplayStream> {
        if self.is_empty() {
            return Err(ScanError::DeviceUnavailable(
                "replay camera has no frames".into(),
            ));
        }
        debug!(frames = self.len(), "Replay stream opened");
        Ok(ReplayStream {
            frames: Arc::clone(&self.frames),
            cursor: 0,
            closed: false,
        })
    }
}

impl CaptureStream for ReplayStream {
    async fn current_frame(&mut self) -> Result<Frame> {
        if self.closed {
            return Err(ScanError::DeviceUnavailable("stream closed".into()));
        }
        let frame = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor += 1;
        Ok(frame)
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[tokio::test]
    async fn frames_are_served_in_a_loop() {
        let frames = vec![
            Frame::from_image(RgbaImage::new(2, 2)),
            Frame::from_image(RgbaImage::new(3, 3)),
        ];
        let mut camera = ReplayCamera::new(frames);
        assert_eq!(camera.len(), 2);
        let mut stream = camera.open().await.unwrap();

        let sizes: Vec<u32> = [
            stream.current_frame().await.unwrap().width(),
            stream.current_frame().await.unwrap().width(),
            stream.current_frame().await.unwrap().width(),
        ]
        .into();
        assert_eq!(sizes, vec![2, 3, 2]);
    }

    #[tokio::test]
    async fn closed_stream_reports_device_unavailable() {
        let mut camera = ReplayCamera::new(vec![Frame::from_image(RgbaImage::new(1, 1))]);
        let mut stream = camera.open().await.unwrap();
        stream.close();
        assert!(matches!(
            stream.current_frame().await,
            Err(ScanError::DeviceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn empty_replay_cannot_open() {
        let mut camera = ReplayCamera::new(Vec::new());
        assert!(camera.is_empty());
        assert!(camera.open().await.is_err());
    }
}
