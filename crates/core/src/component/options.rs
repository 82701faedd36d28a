//! Typed readers over a component's option map.

use std::fmt;

use serde_json::Value;

use crate::blend::BlendMode;
use crate::preset::Options;
use crate::surface::Rgba;

/// A single option failed validation. The loader attaches the tree path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionError {
    pub key: String,
    pub message: String,
}

impl OptionError {
    pub fn new(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn unknown(key: &str) -> Self {
        Self::new(key, "unknown option")
    }
}

impl fmt::Display for OptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "option `{}`: {}", self.key, self.message)
    }
}

impl std::error::Error for OptionError {}

pub type OptionResult<T> = std::result::Result<T, OptionError>;

fn lookup<'a>(options: &'a Options, key: &str) -> OptionResult<&'a Value> {
    options
        .get(key)
        .ok_or_else(|| OptionError::new(key, "missing value"))
}

pub fn bool_value(key: &str, value: &Value) -> OptionResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| OptionError::new(key, format!("expected a boolean, got {value}")))
}

pub fn u32_value(key: &str, value: &Value) -> OptionResult<u32> {
    value
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| OptionError::new(key, format!("expected a non-negative integer, got {value}")))
}

pub fn str_value<'a>(key: &str, value: &'a Value) -> OptionResult<&'a str> {
    value
        .as_str()
        .ok_or_else(|| OptionError::new(key, format!("expected a string, got {value}")))
}

pub fn blend_value(key: &str, value: &Value) -> OptionResult<BlendMode> {
    str_value(key, value)?
        .parse()
        .map_err(|message: String| OptionError::new(key, message))
}

/// Accepts `"#rrggbb"` or an `[r, g, b]` array of channel values in `[0, 1]`.
pub fn color_value(key: &str, value: &Value) -> OptionResult<Rgba> {
    match value {
        Value::String(text) => parse_hex_color(text)
            .ok_or_else(|| OptionError::new(key, format!("malformed colour `{text}`"))),
        Value::Array(items) if items.len() == 3 => {
            let mut out = [0.0, 0.0, 0.0, 1.0];
            for (slot, item) in out.iter_mut().zip(items) {
                let channel = item
                    .as_f64()
                    .filter(|c| (0.0..=1.0).contains(c))
                    .ok_or_else(|| OptionError::new(key, format!("channel {item} out of range")))?;
                *slot = channel as f32;
            }
            Ok(out)
        }
        other => Err(OptionError::new(key, format!("expected a colour, got {other}"))),
    }
}

fn parse_hex_color(text: &str) -> Option<Rgba> {
    let hex = text.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16)
            .ok()
            .map(|v| f32::from(v) / 255.0)
    };
    Some([channel(0..2)?, channel(2..4)?, channel(4..6)?, 1.0])
}

pub fn get_bool(options: &Options, key: &str) -> OptionResult<bool> {
    bool_value(key, lookup(options, key)?)
}

pub fn get_u32(options: &Options, key: &str) -> OptionResult<u32> {
    u32_value(key, lookup(options, key)?)
}

pub fn get_str<'a>(options: &'a Options, key: &str) -> OptionResult<&'a str> {
    str_value(key, lookup(options, key)?)
}

pub fn get_blend(options: &Options, key: &str) -> OptionResult<BlendMode> {
    blend_value(key, lookup(options, key)?)
}

pub fn get_color(options: &Options, key: &str) -> OptionResult<Rgba> {
    color_value(key, lookup(options, key)?)
}
