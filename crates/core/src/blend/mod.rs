//! Per-pixel merge functions.
//!
//! Every function takes `s`, the newly produced pixel, and `d`, the content
//! already in the destination. The argument order matters for callers even
//! though the four modes defined here happen to be commutative per pair; none
//! of them should be assumed associative across three or more surfaces.
//! The output alpha is always 1.

use std::fmt;
use std::str::FromStr;

use crate::surface::{Rgba, Surface};
use crate::Result;

/// How a new surface is merged into existing content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// `s`
    #[default]
    Replace,
    /// `min(s + d, 1)`
    Additive,
    /// `(s + d) / 2`
    Average,
    /// `s * d`
    Multiply,
}

impl BlendMode {
    pub const ALL: [BlendMode; 4] = [
        BlendMode::Replace,
        BlendMode::Additive,
        BlendMode::Average,
        BlendMode::Multiply,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlendMode::Replace => "REPLACE",
            BlendMode::Additive => "ADDITIVE",
            BlendMode::Average => "AVERAGE",
            BlendMode::Multiply => "MULTIPLY",
        }
    }
}

impl fmt::Display for BlendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlendMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        BlendMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| format!("unknown blend mode `{s}`"))
    }
}

/// How an EffectList seeds its working surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InputMode {
    /// Start from a copy of the parent frame.
    #[default]
    Replace,
    /// Start blank.
    Ignore,
}

impl InputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            InputMode::Replace => "REPLACE",
            InputMode::Ignore => "IGNORE",
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "REPLACE" => Ok(InputMode::Replace),
            "IGNORE" => Ok(InputMode::Ignore),
            other => Err(format!("unknown input mode `{other}`")),
        }
    }
}

pub fn blend_pixel(mode: BlendMode, s: Rgba, d: Rgba) -> Rgba {
    let mut out = [0.0, 0.0, 0.0, 1.0];
    for c in 0..3 {
        out[c] = match mode {
            BlendMode::Replace => s[c],
            BlendMode::Additive => (s[c] + d[c]).clamp(0.0, 1.0),
            BlendMode::Average => (s[c] + d[c]) * 0.5,
            BlendMode::Multiply => s[c] * d[c],
        };
    }
    out
}

/// Merges `src` into `dst` in place.
pub fn blend_into(mode: BlendMode, src: &Surface, dst: &mut Surface) -> Result<()> {
    dst.ensure_same_size(src)?;
    for (d, s) in dst.pixels_mut().iter_mut().zip(src.pixels()) {
        *d = blend_pixel(mode, *s, *d);
    }
    Ok(())
}

/// Merges a constant colour into every pixel of `dst`.
pub fn blend_color(mode: BlendMode, color: Rgba, dst: &mut Surface) {
    for d in dst.pixels_mut() {
        *d = blend_pixel(mode, color, *d);
    }
}
