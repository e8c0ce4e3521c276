//! RGBA color value type.
//!
//! [`Color`] keeps two representations in sync: packed 0–255 channel bytes and
//! normalized 0.0–1.0 floats. Every RGBA mutation goes through a setter that
//! updates both. An HSV triple is computed lazily on first read and cached until
//! the next RGBA mutation marks it dirty.
//!
//! Serialized as a `[r, g, b, a]` byte array.

use std::cell::Cell;

use serde::{Deserialize, Serialize};

/// Hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hsv {
    pub h: f32,
    pub s: f32,
    pub v: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "[u8; 4]", into = "[u8; 4]")]
pub struct Color {
    bytes: [u8; 4],
    floats: [f32; 4],
    hsv: Cell<Hsv>,
    hsv_dirty: Cell<bool>,
}

impl Color {
    pub const WHITE: [u8; 4] = [255, 255, 255, 255];
    pub const BLACK: [u8; 4] = [0, 0, 0, 255];
    pub const TRANSPARENT: [u8; 4] = [0, 0, 0, 0];

    /// Create a color from 0–255 channel bytes.
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        let mut color = Self {
            bytes: [0; 4],
            floats: [0.0; 4],
            hsv: Cell::new(Hsv::default()),
            hsv_dirty: Cell::new(true),
        };
        color.set_rgba(r, g, b, a);
        color
    }

    /// Create a color from normalized floats. Values are clamped to `[0, 1]`.
    pub fn from_floats(r: f32, g: f32, b: f32, a: f32) -> Self {
        let mut color = Self::new(0, 0, 0, 0);
        color.set_rgba_f32(r, g, b, a);
        color
    }

    /// Create an opaque color from HSV components.
    pub fn from_hsv(h: f32, s: f32, v: f32) -> Self {
        let mut color = Self::new(0, 0, 0, 255);
        color.set_hsv(h, s, v);
        color
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 && hex.len() != 8 {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?, a))
    }

    pub fn to_hex(&self) -> String {
        let [r, g, b, a] = self.bytes;
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }

    pub fn r(&self) -> u8 {
        self.bytes[0]
    }
    pub fn g(&self) -> u8 {
        self.bytes[1]
    }
    pub fn b(&self) -> u8 {
        self.bytes[2]
    }
    pub fn a(&self) -> u8 {
        self.bytes[3]
    }

    /// Packed channel bytes `[r, g, b, a]`.
    pub fn bytes(&self) -> [u8; 4] {
        self.bytes
    }

    /// Normalized channel floats `[r, g, b, a]`.
    pub fn floats(&self) -> [f32; 4] {
        self.floats
    }

    pub fn set_rgba(&mut self, r: u8, g: u8, b: u8, a: u8) {
        self.bytes = [r, g, b, a];
        self.floats = self.bytes.map(|c| c as f32 / 255.0);
        self.hsv_dirty.set(true);
    }

    pub fn set_rgba_f32(&mut self, r: f32, g: f32, b: f32, a: f32) {
        self.floats = [r, g, b, a].map(|c| c.clamp(0.0, 1.0));
        self.bytes = self.floats.map(|c| (c * 255.0).round() as u8);
        self.hsv_dirty.set(true);
    }

    /// Set a single channel (0 = r, 1 = g, 2 = b, 3 = a) from a byte.
    pub fn set_channel(&mut self, index: usize, value: u8) {
        if index < 4 {
            self.bytes[index] = value;
            self.floats[index] = value as f32 / 255.0;
            self.hsv_dirty.set(true);
        }
    }

    pub fn set_alpha(&mut self, a: u8) {
        self.set_channel(3, a);
    }

    /// Current HSV triple, recomputed only if an RGBA mutation happened since
    /// the last read.
    pub fn hsv(&self) -> Hsv {
        if self.hsv_dirty.get() {
            self.hsv.set(rgb_to_hsv(self.floats[0], self.floats[1], self.floats[2]));
            self.hsv_dirty.set(false);
        }
        self.hsv.get()
    }

    /// Replace RGB from HSV, keeping alpha. The given triple becomes the cached
    /// HSV so hue survives a round trip through grey.
    pub fn set_hsv(&mut self, h: f32, s: f32, v: f32) {
        let h = h.rem_euclid(360.0);
        let s = s.clamp(0.0, 1.0);
        let v = v.clamp(0.0, 1.0);
        let (r, g, b) = hsv_to_rgb(h, s, v);
        let a = self.floats[3];
        self.set_rgba_f32(r, g, b, a);
        self.hsv.set(Hsv { h, s, v });
        self.hsv_dirty.set(false);
    }

    /// Component-wise multiply (used for tint modulation).
    pub fn multiply(&self, other: &Color) -> Color {
        let mut out = [0u8; 4];
        for (i, c) in out.iter_mut().enumerate() {
            *c = ((self.bytes[i] as u16 * other.bytes[i] as u16) / 255) as u8;
        }
        out.into()
    }

    /// Interpolate in normalized RGBA space.
    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let [r, g, b, a] = std::array::from_fn(|i| {
            self.floats[i] + (other.floats[i] - self.floats[i]) * t
        });
        Color::from_floats(r, g, b, a)
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::WHITE.into()
    }
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for Color {}

impl From<[u8; 4]> for Color {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Color::new(r, g, b, a)
    }
}

impl From<Color> for [u8; 4] {
    fn from(color: Color) -> Self {
        color.bytes
    }
}

fn rgb_to_hsv(r: f32, g: f32, b: f32) -> Hsv {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta <= f32::EPSILON {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let s = if max <= f32::EPSILON { 0.0 } else { delta / max };

    Hsv { h, s, v: max }
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let hp = h / 60.0;
    let x = c * (1.0 - (hp.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match hp as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = v - c;
    (r + m, g + m, b + m)
}
