//! Hue rotation in HSV space.
//!
//! Every pixel is converted to hue/saturation/value, its hue is rotated by a
//! fraction of a full turn and the result is converted back. Alpha is never
//! touched and the output always has the dimensions of the input.

use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// How a `[0, 1]` channel value is turned back into an 8-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Quantize {
    /// Multiply by 255 and drop the fractional part.
    #[default]
    Truncate,
    /// Multiply by 255 and round to the nearest integer.
    Round,
}

impl Quantize {
    /// Saturates at 0 and 255.
    pub fn apply(self, value: f64) -> u8 {
        let scaled = value * 255.0;
        match self {
            Quantize::Truncate => scaled as u8,
            Quantize::Round => scaled.round() as u8,
        }
    }
}

/// Converts normalized RGB to `(hue, saturation, value)`, all in `[0, 1]`.
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let value = max;

    if max == min {
        return (0.0, 0.0, value);
    }

    let range = max - min;
    let saturation = range / max;

    let rc = (max - r) / range;
    let gc = (max - g) / range;
    let bc = (max - b) / range;

    let hue = if r == max {
        bc - gc
    } else if g == max {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };

    ((hue / 6.0).rem_euclid(1.0), saturation, value)
}

/// Inverse of [`rgb_to_hsv`].
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (v, v, v);
    }

    let sector = (h * 6.0).floor();
    let f = h * 6.0 - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    match (sector as i64).rem_euclid(6) {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    }
}

/// Rotates the hue of `image` by `shift` turns.
///
/// The source is normalized to RGBA8 first, so images without an alpha
/// channel come out fully opaque. `shift` may be any real number; it wraps
/// around the color wheel. A non-finite shift leaves the colors as they are.
pub fn shift_hue(image: &DynamicImage, shift: f64, quantize: Quantize) -> RgbaImage {
    let shift = if shift.is_finite() {
        shift.rem_euclid(1.0)
    } else {
        0.0
    };

    let mut output = image.to_rgba8();

    for pixel in output.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        let (h, s, v) = rgb_to_hsv(
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
        );

        let (r, g, b) = hsv_to_rgb((h + shift).rem_euclid(1.0), s, v);

        pixel.0[0] = quantize.apply(r);
        pixel.0[1] = quantize.apply(g);
        pixel.0[2] = quantize.apply(b);
    }

    output
}
