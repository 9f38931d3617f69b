// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Binarization — local adaptive thresholds, global Otsu, and HSV band masking.
//
// Every function here returns a mask whose pixels are 0 or 255.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::integral_image;
use labelscan_core::HsvBound;

use super::colorspace::HsvImage;

const ON: u8 = 255;
const OFF: u8 = 0;

// -- Adaptive thresholds -------------------------------------------------------

/// Local mean threshold over a `block_size` square window.
///
/// A pixel is set when it is brighter than the window mean minus `c`. Near
/// the border the window shrinks to the part inside the image.
pub fn adaptive_mean(gray: &GrayImage, block_size: u32, c: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let sums: ImageBuffer<Luma<u64>, Vec<u64>> = integral_image::<_, u64>(gray);
    let radius = block_size / 2;

    GrayImage::from_fn(width, height, |x, y| {
        let left = x.saturating_sub(radius);
        let top = y.saturating_sub(radius);
        let right = (x + radius + 1).min(width);
        let bottom = (y + radius + 1).min(height);
        let mean = window_sum(&sums, left, top, right, bottom) as f64
            / ((right - left) * (bottom - top)) as f64;

        let src = gray.get_pixel(x, y).0[0] as f64;
        Luma([if src > mean - c as f64 { ON } else { OFF }])
    })
}

/// Sum over `[left, right) x [top, bottom)` read off an integral image, which
/// carries a leading zero row and column.
fn window_sum(
    sums: &ImageBuffer<Luma<u64>, Vec<u64>>,
    left: u32,
    top: u32,
    right: u32,
    bottom: u32,
) -> u64 {
    let at = |x: u32, y: u32| sums.get_pixel(x, y).0[0];
    at(right, bottom) + at(left, top) - at(left, bottom) - at(right, top)
}

/// Gaussian-weighted local threshold over a `block_size` window.
///
/// The kernel sigma follows the usual derivation from the block size, and
/// borders replicate the edge pixel.
pub fn adaptive_gaussian(gray: &GrayImage, block_size: u32, c: f32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let kernel = gaussian_kernel(block_size);
    let half = (kernel.len() / 2) as i64;
    let (w, h) = (width as usize, height as usize);

    let src: Vec<f32> = gray.as_raw().iter().map(|&v| v as f32).collect();

    // Horizontal pass.
    let mut rows = vec![0f32; w * h];
    for y in 0..h {
        let line = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sx = (x as i64 + k as i64 - half).clamp(0, w as i64 - 1) as usize;
                acc += weight * line[sx];
            }
            rows[y * w + x] = acc;
        }
    }

    // Vertical pass, thresholding as we go.
    let mut output = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let mut mean = 0f32;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as i64 + k as i64 - half).clamp(0, h as i64 - 1) as usize;
                mean += weight * rows[sy * w + x];
            }
            let value = if src[y * w + x] > mean - c { ON } else { OFF };
            output.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }

    output
}

/// Normalized 1-D Gaussian kernel of `size` taps.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let size = size.max(1) as usize;
    let sigma = 0.3 * ((size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    let half = (size / 2) as f32;

    let mut kernel: Vec<f32> = (0..size)
        .map(|i| {
            let d = i as f32 - half;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

// -- Otsu -----------------------------------------------------------------------

/// 256-bin intensity histogram.
pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for pixel in gray.pixels() {
        hist[pixel.0[0] as usize] += 1;
    }
    hist
}

/// Otsu's threshold for a histogram.
///
/// Returns the cutoff `t` maximizing the between-class variance of the
/// classes `<= t` and `> t`, which is the same as minimizing the intra-class
/// variance. The lowest such `t` wins ties.
pub fn otsu_threshold(hist: &[u64; 256]) -> u8 {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 128;
    }
    let level_sum: f64 = hist
        .iter()
        .zip(0u32..)
        .map(|(&count, level)| f64::from(level) * count as f64)
        .sum();

    let mut below = 0u64;
    let mut below_sum = 0f64;
    let mut best = (0u8, 0f64);

    for (&count, level) in hist.iter().zip(0u8..=255) {
        below += count;
        below_sum += f64::from(level) * count as f64;
        let above = total - below;
        if below == 0 {
            continue;
        }
        if above == 0 {
            break;
        }

        let gap = below_sum / below as f64 - (level_sum - below_sum) / above as f64;
        let spread = below as f64 * above as f64 * gap * gap;
        if spread > best.1 {
            best = (level, spread);
        }
    }

    best.0
}

/// Global threshold: pixels above `threshold` are set.
pub fn global(gray: &GrayImage, threshold: u8) -> GrayImage {
    let (w, h) = gray.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        Luma([if gray.get_pixel(x, y).0[0] > threshold { ON } else { OFF }])
    })
}

// -- HSV band -------------------------------------------------------------------

/// Whether an HSV triple lies in the band `[low, high]`.
///
/// When `low.hue > high.hue` the hue range wraps through 0°.
pub fn in_band(hue: u16, saturation: u8, value: u8, low: &HsvBound, high: &HsvBound) -> bool {
    let hue_ok = if low.hue <= high.hue {
        hue >= low.hue && hue <= high.hue
    } else {
        hue >= low.hue || hue <= high.hue
    };
    hue_ok
        && (low.saturation..=high.saturation).contains(&saturation)
        && (low.value..=high.value).contains(&value)
}

/// Mask out the background band. Background pixels become 0, everything else
/// (the text) 255.
pub fn hsv_range(hsv: &HsvImage, low: &HsvBound, high: &HsvBound) -> GrayImage {
    let (w, h) = hsv.dimensions();
    GrayImage::from_fn(w, h, |x, y| {
        let background = in_band(
            hsv.hue.get_pixel(x, y).0[0],
            hsv.saturation.get_pixel(x, y).0[0],
            hsv.value.get_pixel(x, y).0[0],
            low,
            high,
        );
        Luma([if background { OFF } else { ON }])
    })
}
