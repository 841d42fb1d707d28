use log::warn;
use serde::Deserialize;

pub const STANDARD_RAMP: &str = " .:-=+*#%@";
pub const DETAILED_RAMP: &str =
    " .'`^\",:;Il!i><~+_-?][}{1)(|\\/tfjrxnuvczXYUJCLQ0OZmwqpdbkhao*#MW&8%B@$";
pub const BLOCKS_RAMP: &str = " ░▒▓█";
pub const DOTS_RAMP: &str = " .·•●";
pub const BINARY_RAMP: &str = " 01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RampPreset {
    Standard,
    Detailed,
    Blocks,
    Dots,
    Binary,
}

impl RampPreset {
    pub fn characters(self) -> &'static str {
        match self {
            Self::Standard => STANDARD_RAMP,
            Self::Detailed => DETAILED_RAMP,
            Self::Blocks => BLOCKS_RAMP,
            Self::Dots => DOTS_RAMP,
            Self::Binary => BINARY_RAMP,
        }
    }
}

/// A ramp as named in a scene: `standard` or `{ custom: " .oO@" }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RampChoice {
    Preset(RampPreset),
    Custom { custom: String },
}

impl RampChoice {
    pub fn resolve(&self) -> CharacterRamp {
        match self {
            Self::Preset(preset) => CharacterRamp::preset(*preset),
            Self::Custom { custom } => CharacterRamp::custom(custom),
        }
    }
}

/// Characters ordered from emptiest to densest. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterRamp {
    chars: Vec<char>,
}

impl CharacterRamp {
    pub fn preset(preset: RampPreset) -> Self {
        Self {
            chars: preset.characters().chars().collect(),
        }
    }

    /// Line breaks are dropped; an empty result falls back to the standard ramp.
    pub fn custom(source: &str) -> Self {
        let chars = source
            .chars()
            .filter(|ch| *ch != '\n' && *ch != '\r')
            .collect::<Vec<_>>();
        if chars.is_empty() {
            warn!("custom ramp is empty, using the standard ramp");
            return Self::preset(RampPreset::Standard);
        }
        Self { chars }
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Position of `value` on the ramp: `floor(value * (len - 1))`, clamped.
    pub fn quantize(&self, value: f64) -> usize {
        let last = self.chars.len().saturating_sub(1);
        if last == 0 {
            return 0;
        }
        let value = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        ((value * last as f64).floor() as usize).min(last)
    }

    pub fn map_to_char(&self, value: f64) -> char {
        self.chars.get(self.quantize(value)).copied().unwrap_or(' ')
    }
}

impl Default for CharacterRamp {
    fn default() -> Self {
        Self::preset(RampPreset::Standard)
    }
}

pub fn map_to_char(value: f64, ramp: &CharacterRamp) -> char {
    ramp.map_to_char(value)
}
