// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colorspace stage — grayscale, HSV and single-channel isolation.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use labelscan_core::{ChannelSelect, HsvChannel};

/// Hue plane in whole degrees (0–359).
pub type HuePlane = ImageBuffer<Luma<u16>, Vec<u16>>;

/// An image split into hue, saturation and value planes.
///
/// Saturation and value are scaled to 0–255.
#[derive(Debug, Clone)]
pub struct HsvImage {
    pub hue: HuePlane,
    pub saturation: GrayImage,
    pub value: GrayImage,
}

impl HsvImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.value.dimensions()
    }

    /// One plane as an 8-bit image. Hue is rescaled from 0–359 to 0–255.
    pub fn plane(&self, channel: HsvChannel) -> GrayImage {
        match channel {
            HsvChannel::Hue => {
                let (w, h) = self.hue.dimensions();
                GrayImage::from_fn(w, h, |x, y| {
                    let hue = self.hue.get_pixel(x, y).0[0] as u32;
                    Luma([(hue * 255 / 359) as u8])
                })
            }
            HsvChannel::Saturation => self.saturation.clone(),
            HsvChannel::Value => self.value.clone(),
        }
    }
}

/// Convert one RGB pixel to `(hue°, saturation, value)`.
pub fn pixel_to_hsv(r: u8, g: u8, b: u8) -> (u16, u8, u8) {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max == 0 {
        0
    } else {
        ((255 * delta + max / 2) / max) as u8
    };

    let hue = if delta == 0 {
        0.0
    } else if max == r {
        60.0 * (g - b) as f32 / delta as f32
    } else if max == g {
        120.0 + 60.0 * (b - r) as f32 / delta as f32
    } else {
        240.0 + 60.0 * (r - g) as f32 / delta as f32
    };
    let hue = (hue.rem_euclid(360.0).round() as u16) % 360;

    (hue, saturation, max as u8)
}

pub fn to_hsv(rgb: &RgbImage) -> HsvImage {
    let (w, h) = rgb.dimensions();
    let mut hue = HuePlane::new(w, h);
    let mut saturation = GrayImage::new(w, h);
    let mut value = GrayImage::new(w, h);

    for (x, y, pixel) in rgb.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let (hh, ss, vv) = pixel_to_hsv(r, g, b);
        hue.put_pixel(x, y, Luma([hh]));
        saturation.put_pixel(x, y, Luma([ss]));
        value.put_pixel(x, y, Luma([vv]));
    }

    HsvImage {
        hue,
        saturation,
        value,
    }
}

pub fn to_grayscale(rgb: &RgbImage) -> GrayImage {
    image::imageops::grayscale(rgb)
}

/// Keep a single RGB channel as a gray image.
pub fn isolate_channel(rgb: &RgbImage, channel: ChannelSelect) -> GrayImage {
    let index = channel_index(channel);
    let (w, h) = rgb.dimensions();
    GrayImage::from_fn(w, h, |x, y| Luma([rgb.get_pixel(x, y).0[index]]))
}

fn channel_index(channel: ChannelSelect) -> usize {
    match channel {
        ChannelSelect::Red => 0,
        ChannelSelect::Green => 1,
        ChannelSelect::Blue => 2,
        ChannelSelect::ForBackgroundHue { hue } => darkest_channel_for_hue(hue),
    }
}

/// Index of the RGB channel in which a fully saturated color of `hue` is
/// darkest. Ties go to blue, then green.
pub fn darkest_channel_for_hue(hue: u16) -> usize {
    let h = (hue % 360) as f32 / 60.0;
    // HSV -> RGB at s = v = 1: f(n) = 1 - max(0, min(k, 4 - k, 1)), k = (n + h) mod 6
    let component = |n: f32| {
        let k = (n + h).rem_euclid(6.0);
        1.0 - k.min(4.0 - k).clamp(0.0, 1.0)
    };
    let rgb = [component(5.0), component(3.0), component(1.0)];

    [2usize, 1, 0]
        .into_iter()
        .fold(2, |best, idx| if rgb[idx] < rgb[best] { idx } else { best })
}
