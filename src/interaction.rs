use log::debug;

use crate::schema::{GridSpec, InteractionKind, InteractiveConfig};

/// Seconds a click ripple lives for.
pub const CLICK_LIFE: f64 = 3.0;

/// Remaining life at or below this counts as expired. Summing `1/60`
/// steps leaves residue around `1e-15` where exact arithmetic gives zero.
const LIFE_EPSILON: f64 = 1e-9;

/// Last known pointer position in normalized grid space, if over the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    pub position: Option<(f64, f64)>,
}

impl PointerState {
    pub fn at(x: f64, y: f64) -> Self {
        Self {
            position: Some((x, y)),
        }
    }

    pub fn absent() -> Self {
        Self { position: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickEffect {
    pub x: f64,
    pub y: f64,
    pub life: f64,
    pub max_life: f64,
    pub strength: f64,
    pub radius: f64,
}

impl ClickEffect {
    pub fn new(x: f64, y: f64, config: &InteractiveConfig) -> Self {
        Self {
            x: x.clamp(0.0, 1.0),
            y: y.clamp(0.0, 1.0),
            life: CLICK_LIFE,
            max_life: CLICK_LIFE,
            strength: config.strength,
            radius: config.radius,
        }
    }

    /// Remaining amplitude fraction in `[0, 1]`.
    pub fn fade(&self) -> f64 {
        if self.max_life <= 0.0 {
            return 0.0;
        }
        (self.life / self.max_life).clamp(0.0, 1.0)
    }
}

/// Live click ripples. Order is irrelevant; contributions are summed.
#[derive(Debug, Clone, Default)]
pub struct ClickEffects {
    effects: Vec<ClickEffect>,
}

impl ClickEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, effect: ClickEffect) {
        self.effects.push(effect);
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClickEffect> {
        self.effects.iter()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    /// Ages every effect by `frame_delta` and drops the expired ones.
    pub fn decay(&mut self, frame_delta: f64) -> usize {
        for effect in &mut self.effects {
            effect.life -= frame_delta;
        }
        let before = self.effects.len();
        self.effects.retain(|effect| effect.life > LIFE_EPSILON);
        let removed = before - self.effects.len();
        if removed > 0 {
            debug!("pruned {removed} expired click effects");
        }
        removed
    }
}

/// Adds hover and click perturbations to `base` and clamps to `[0, 1]`.
///
/// `elapsed` is the wall-clock seconds the render loop has been running; it
/// drives the ripple and distortion phases.
pub fn apply(
    col: u32,
    row: u32,
    grid: &GridSpec,
    base: f64,
    pointer: &PointerState,
    clicks: &ClickEffects,
    config: &InteractiveConfig,
    elapsed: f64,
) -> f64 {
    let (nx, ny) = grid.normalized(col, row);
    let mut value = base;

    if let Some((px, py)) = pointer.position {
        let dx = nx - px;
        let dy = ny - py;
        let distance = (dx * dx + dy * dy).sqrt();
        if distance < config.radius {
            let strength = (1.0 - distance / config.radius) * config.strength;
            value += match config.kind {
                InteractionKind::Ripple => {
                    (20.0 * distance - 5.0 * elapsed).sin() * strength * 0.3
                }
                InteractionKind::Attract => 0.5 * strength,
                InteractionKind::Repel => -0.5 * strength,
                InteractionKind::Trail => 0.4 * strength * (2.0 * elapsed).sin(),
                InteractionKind::Distort => {
                    (4.0 * dy.atan2(dx) + 3.0 * elapsed).sin() * strength * 0.3
                }
            };
        }
    }

    for effect in clicks.iter() {
        let dx = nx - effect.x;
        let dy = ny - effect.y;
        let distance = (dx * dx + dy * dy).sqrt();
        if effect.radius > 0.0 && distance < effect.radius {
            let strength = (1.0 - distance / effect.radius) * effect.strength * effect.fade();
            value += (20.0 * distance - 5.0 * elapsed).sin() * strength * 0.3;
        }
    }

    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        base.clamp(0.0, 1.0)
    }
}
