// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contrast-limited adaptive histogram equalization (CLAHE).
//
// The image is divided into a grid of tiles. Each tile gets its own clipped
// histogram and lookup table; pixels are mapped by bilinear interpolation
// between the four nearest tile LUTs so tile seams do not show.

use image::{GrayImage, Luma};
use labelscan_core::error::{Result, ScanError};
use labelscan_core::{Clahe, StageKind};

/// Equalize `gray` tile by tile.
///
/// Fails when the tile grid has more columns or rows than the image has
/// pixels.
pub fn equalize(gray: &GrayImage, params: &Clahe) -> Result<GrayImage> {
    let (width, height) = gray.dimensions();
    let [cols, rows] = params.tile_grid;

    if cols == 0 || rows == 0 {
        return Err(ScanError::stage(StageKind::Contrast, "tile grid must be at least 1x1"));
    }
    if cols > width || rows > height {
        return Err(ScanError::stage(
            StageKind::Contrast,
            format!("tile grid {cols}x{rows} larger than image {width}x{height}"),
        ));
    }

    let luts = build_luts(gray, params.clip_limit, cols, rows);
    let tile_w = width as f32 / cols as f32;
    let tile_h = height as f32 / rows as f32;

    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in gray.enumerate_pixels() {
        let (c0, c1, wx) = neighbours(x, tile_w, cols);
        let (r0, r1, wy) = neighbours(y, tile_h, rows);
        let v = pixel.0[0] as usize;

        let lut = |r: u32, c: u32| luts[(r * cols + c) as usize][v] as f32;
        let top = lut(r0, c0) * (1.0 - wx) + lut(r0, c1) * wx;
        let bottom = lut(r1, c0) * (1.0 - wx) + lut(r1, c1) * wx;
        let mapped = top * (1.0 - wy) + bottom * wy;

        output.put_pixel(x, y, Luma([mapped.round().clamp(0.0, 255.0) as u8]));
    }

    Ok(output)
}

/// The two tile indices bracketing `pos` along one axis and the weight of the
/// second one.
fn neighbours(pos: u32, tile_len: f32, count: u32) -> (u32, u32, f32) {
    let f = (pos as f32 + 0.5) / tile_len - 0.5;
    if f <= 0.0 {
        return (0, 0, 0.0);
    }
    let i0 = (f.floor() as u32).min(count - 1);
    let i1 = (i0 + 1).min(count - 1);
    let weight = if i1 == i0 { 0.0 } else { f - i0 as f32 };
    (i0, i1, weight)
}

/// Pixel span `[start, end)` of tile `index` along an axis of `len` pixels.
fn tile_span(index: u32, count: u32, len: u32) -> (u32, u32) {
    let start = (index as u64 * len as u64 / count as u64) as u32;
    let end = ((index as u64 + 1) * len as u64 / count as u64) as u32;
    (start, end)
}

fn build_luts(gray: &GrayImage, clip_limit: f32, cols: u32, rows: u32) -> Vec<[u8; 256]> {
    let (width, height) = gray.dimensions();
    let mut luts = Vec::with_capacity((cols * rows) as usize);

    for r in 0..rows {
        let (y0, y1) = tile_span(r, rows, height);
        for c in 0..cols {
            let (x0, x1) = tile_span(c, cols, width);

            let mut hist = [0u32; 256];
            for y in y0..y1 {
                for x in x0..x1 {
                    hist[gray.get_pixel(x, y).0[0] as usize] += 1;
                }
            }

            let area = (x1 - x0) * (y1 - y0);
            luts.push(clipped_lut(&mut hist, clip_limit, area));
        }
    }

    luts
}

/// Clip the histogram, spread the excess evenly, and turn the CDF into a LUT.
fn clipped_lut(hist: &mut [u32; 256], clip_limit: f32, area: u32) -> [u8; 256] {
    let clip = ((clip_limit * area as f32 / 256.0) as u32).max(1);

    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > clip {
            excess += *bin - clip;
            *bin = clip;
        }
    }

    let per_bin = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += per_bin;
        if i < remainder {
            *bin += 1;
        }
    }

    let mut lut = [0u8; 256];
    if area == 0 {
        return lut;
    }
    let scale = 255.0 / area as f32;
    let mut cdf = 0u32;
    for (i, &count) in hist.iter().enumerate() {
        cdf += count;
        lut[i] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
