//! Pipeline configuration.
//!
//! A [`Config`] selects between permissive and strict broadcasting and sets
//! the precision used by [`Chain::round_default`](crate::pipeline::Chain::round_default).
//! It deserializes from JSON with every field optional.

use serde::{Deserialize, Serialize};

use crate::round::DEFAULT_PRECISION;

/// How a pipeline reacts to operands that do not broadcast cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// NaN, infinities and pass-through leaves; never an error.
    #[default]
    Permissive,
    /// The first shape or type problem is latched as a
    /// [`BroadcastError`](crate::error::BroadcastError).
    Strict,
}

/// Settings carried by a [`Pipeline`](crate::pipeline::Pipeline).
///
/// # Examples
/// ```
/// use u_numchain::config::{Config, Mode};
/// let cfg = Config::from_json(r#"{"mode": "strict"}"#).unwrap();
/// assert_eq!(cfg.mode, Mode::Strict);
/// assert_eq!(cfg.precision, 10);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub mode: Mode,
    /// Decimal digits kept by `round_default`.
    pub precision: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: Mode::Permissive,
            precision: DEFAULT_PRECISION,
        }
    }
}

impl Config {
    /// Parses a configuration from a JSON document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Sets the broadcasting mode.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the default rounding precision.
    pub fn precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }
}
