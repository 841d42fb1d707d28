//! Two-field compositing.
//!
//! The scalar blend and the color blend share [`BlendConfig`] but not their
//! formulas: the scalar path pulls `v2` toward 0.5 by `amount` before
//! combining, the color path uses `v1 * v2 * amount` as a single lerp factor.

use crate::glyph::CharacterRamp;
use crate::schema::{BlendConfig, BlendMode, Rgb};

/// Ramp switch point for `v1 * v2 * amount`.
pub const RAMP_SWITCH_THRESHOLD: f64 = 0.5;

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn overlay_unit(base: f64, top: f64) -> f64 {
    if base < 0.5 {
        2.0 * base * top
    } else {
        1.0 - 2.0 * (1.0 - base) * (1.0 - top)
    }
}

/// Combines two normalized field values into one in `[0, 1]`.
pub fn blend(v1: f64, v2: f64, mode: BlendMode, amount: f64) -> f64 {
    let amount = amount.clamp(0.0, 1.0);
    let damped = lerp(0.5, v2, amount);
    let value = match mode {
        BlendMode::Add => v1 + damped - 0.5,
        BlendMode::Multiply => v1 * damped,
        BlendMode::Overlay => overlay_unit(v1, damped),
        BlendMode::Difference => (v1 - damped).abs(),
        BlendMode::Screen => 1.0 - (1.0 - v1) * (1.0 - damped),
        BlendMode::Normal => v1,
    };
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        v1.clamp(0.0, 1.0)
    }
}

/// Blends two colors weighted by the local factor `v1 * v2 * amount`.
pub fn blend_color(c1: Rgb, c2: Rgb, mode: BlendMode, v1: f64, v2: f64, amount: f64) -> Rgb {
    let local = (v1 * v2 * amount.clamp(0.0, 1.0)).clamp(0.0, 1.0);
    let local = if local.is_finite() { local } else { 0.0 };
    let channel = |a: u8, b: u8| -> u8 {
        let a = f64::from(a);
        let b = f64::from(b);
        let mixed = match mode {
            BlendMode::Add => a + b * local,
            BlendMode::Multiply => lerp(a, a * b / 255.0, local),
            BlendMode::Overlay => {
                let overlaid = if a < 128.0 {
                    2.0 * a * b / 255.0
                } else {
                    255.0 - 2.0 * (255.0 - a) * (255.0 - b) / 255.0
                };
                lerp(a, overlaid, local)
            }
            BlendMode::Difference => lerp(a, (a - b).abs(), local),
            BlendMode::Screen => lerp(a, 255.0 - (255.0 - a) * (255.0 - b) / 255.0, local),
            BlendMode::Normal => lerp(a, b, local),
        };
        mixed.clamp(0.0, 255.0).round() as u8
    };
    Rgb::new(channel(c1.r, c2.r), channel(c1.g, c2.g), channel(c1.b, c2.b))
}

/// Picks the secondary ramp once the blend weight reaches the switch point.
pub fn select_ramp<'a>(
    v1: f64,
    v2: f64,
    amount: f64,
    primary: &'a CharacterRamp,
    secondary: &'a CharacterRamp,
) -> &'a CharacterRamp {
    if v1 * v2 * amount < RAMP_SWITCH_THRESHOLD {
        primary
    } else {
        secondary
    }
}

/// The blended scalar, color and ramp for one cell with both slots active.
pub struct Composite<'a> {
    pub value: f64,
    pub color: Rgb,
    pub ramp: &'a CharacterRamp,
}

pub fn composite<'a>(
    v1: f64,
    v2: f64,
    c1: Rgb,
    c2: Rgb,
    config: &BlendConfig,
    primary: &'a CharacterRamp,
    secondary: &'a CharacterRamp,
) -> Composite<'a> {
    Composite {
        value: blend(v1, v2, config.mode, config.amount),
        color: blend_color(c1, c2, config.mode, v1, v2, config.amount),
        ramp: select_ramp(v1, v2, config.amount, primary, secondary),
    }
}
