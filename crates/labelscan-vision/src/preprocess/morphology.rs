// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binary dilation with a square structuring element.

use image::GrayImage;
use labelscan_core::Morphology;

/// Dilate the 255-valued foreground of `mask`.
///
/// The kernel is `kernel_size` pixels square, anchored at `kernel_size / 2`,
/// so even sizes extend one pixel further right and down than left and up.
/// Pixels outside the image are ignored.
pub fn dilate(mask: &GrayImage, params: &Morphology) -> GrayImage {
    let mut current = mask.clone();
    for _ in 0..params.iterations {
        current = dilate_once(&current, params.kernel_size);
    }
    current
}

fn dilate_once(mask: &GrayImage, kernel_size: u32) -> GrayImage {
    let (width, height) = mask.dimensions();
    let (w, h) = (width as usize, height as usize);
    let anchor = (kernel_size / 2) as i64;
    let reach = kernel_size as i64 - 1 - anchor;
    let src = mask.as_raw();

    // A square max filter is separable: rows first, then columns.
    let mut rows = vec![0u8; w * h];
    for y in 0..h {
        for x in 0..w {
            let lo = (x as i64 - anchor).max(0) as usize;
            let hi = (x as i64 + reach).min(w as i64 - 1) as usize;
            rows[y * w + x] = src[y * w + lo..=y * w + hi].iter().copied().max().unwrap_or(0);
        }
    }

    let mut out = vec![0u8; w * h];
    for x in 0..w {
        for y in 0..h {
            let lo = (y as i64 - anchor).max(0) as usize;
            let hi = (y as i64 + reach).min(h as i64 - 1) as usize;
            out[y * w + x] = (lo..=hi).map(|sy| rows[sy * w + x]).max().unwrap_or(0);
        }
    }

    GrayImage::from_raw(width, height, out).unwrap_or_else(|| GrayImage::new(width, height))
}
