use anyhow::Result;
use log::warn;
use serde::{Deserialize, Deserializer};

use crate::error_codes::{CodedError, E_GRID_DIMENSIONS};
use crate::glyph::RampChoice;

const DEFAULT_SPEED: f64 = 0.01;
const DEFAULT_SCALE: f64 = 0.05;
const MIN_INTERACTION_RADIUS: f64 = 1e-3;

/// Dimensions of the character grid. Both axes are strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridSpec {
    cols: u32,
    rows: u32,
}

impl GridSpec {
    pub fn new(cols: u32, rows: u32) -> Result<Self> {
        if cols == 0 || rows == 0 {
            return Err(CodedError::config(
                E_GRID_DIMENSIONS,
                format!("grid must be at least 1x1, got {cols}x{rows}"),
            )
            .into());
        }
        Ok(Self { cols, rows })
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cell_count(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Cell-corner normalized coordinates: `(col / cols, row / rows)`.
    pub fn normalized(&self, col: u32, row: u32) -> (f64, f64) {
        (
            f64::from(col) / f64::from(self.cols),
            f64::from(row) / f64::from(self.rows),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parses `#rrggbb`, `rrggbb`, `#rgb` or `rgb`.
    pub fn parse_hex(value: &str) -> Option<Self> {
        let digits = value.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);
        if !digits.chars().all(|ch| ch.is_ascii_hexdigit()) {
            return None;
        }
        match digits.len() {
            6 => {
                let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16);
                Some(Self::new(
                    channel(0..2).ok()?,
                    channel(2..4).ok()?,
                    channel(4..6).ok()?,
                ))
            }
            3 => {
                let mut channels = [0_u8; 3];
                for (slot, ch) in channels.iter_mut().zip(digits.chars()) {
                    let nibble = ch.to_digit(16)? as u8;
                    *slot = nibble * 17;
                }
                Some(Self::new(channels[0], channels[1], channels[2]))
            }
            _ => None,
        }
    }

    /// Malformed input yields white.
    pub fn from_hex_or_white(value: &str) -> Self {
        Self::parse_hex(value).unwrap_or_else(|| {
            warn!("malformed color '{value}', using white");
            Self::WHITE
        })
    }

    pub fn as_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let source = String::deserialize(deserializer)?;
        Ok(Self::from_hex_or_white(&source))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Waves,
    Ripples,
    Noise,
    Spiral,
    Checkerboard,
    Stripes,
    Plasma,
    Mandelbrot,
    Julia,
    Cellular,
    Voronoi,
    Tunnel,
    Mosaic,
}

impl PatternKind {
    pub const ALL: [PatternKind; 13] = [
        Self::Waves,
        Self::Ripples,
        Self::Noise,
        Self::Spiral,
        Self::Checkerboard,
        Self::Stripes,
        Self::Plasma,
        Self::Mandelbrot,
        Self::Julia,
        Self::Cellular,
        Self::Voronoi,
        Self::Tunnel,
        Self::Mosaic,
    ];

    /// Kinds whose value depends on simulation state carried between frames.
    pub fn is_stateful(self) -> bool {
        matches!(self, Self::Cellular | Self::Voronoi)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waves => "waves",
            Self::Ripples => "ripples",
            Self::Noise => "noise",
            Self::Spiral => "spiral",
            Self::Checkerboard => "checkerboard",
            Self::Stripes => "stripes",
            Self::Plasma => "plasma",
            Self::Mandelbrot => "mandelbrot",
            Self::Julia => "julia",
            Self::Cellular => "cellular",
            Self::Voronoi => "voronoi",
            Self::Tunnel => "tunnel",
            Self::Mosaic => "mosaic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoiseVariant {
    #[default]
    Simplex,
    Turbulence,
    Ridged,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternConfig {
    pub kind: PatternKind,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default = "default_color")]
    pub color: Rgb,
    #[serde(default)]
    pub glow: bool,
    #[serde(default)]
    pub noise_variant: NoiseVariant,
}

impl PatternConfig {
    pub fn new(kind: PatternKind) -> Self {
        Self {
            kind,
            speed: DEFAULT_SPEED,
            scale: DEFAULT_SCALE,
            color: default_color(),
            glow: false,
            noise_variant: NoiseVariant::default(),
        }
    }

    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_glow(mut self, glow: bool) -> Self {
        self.glow = glow;
        self
    }

    pub fn sanitize(&mut self, label: &str) {
        if !self.speed.is_finite() {
            warn!("{label}.speed is not finite, using {DEFAULT_SPEED}");
            self.speed = DEFAULT_SPEED;
        }
        if !self.scale.is_finite() {
            warn!("{label}.scale is not finite, using {DEFAULT_SCALE}");
            self.scale = DEFAULT_SCALE;
        }
    }
}

/// The optional second pattern slot.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecondaryConfig {
    #[serde(default)]
    pub enabled: bool,
    pub pattern: PatternConfig,
}

impl SecondaryConfig {
    pub fn active(&self) -> Option<&PatternConfig> {
        self.enabled.then_some(&self.pattern)
    }
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pattern: PatternConfig::new(PatternKind::Plasma).with_color(Rgb::new(255, 0, 170)),
        }
    }
}

/// `Normal` is also where unrecognized mode names land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    Add,
    Multiply,
    #[default]
    Overlay,
    Difference,
    Screen,
    #[serde(other)]
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlendConfig {
    #[serde(default)]
    pub mode: BlendMode,
    #[serde(default = "default_blend_amount")]
    pub amount: f64,
}

impl BlendConfig {
    pub fn new(mode: BlendMode, amount: f64) -> Self {
        let mut config = Self { mode, amount };
        config.sanitize();
        config
    }

    pub fn sanitize(&mut self) {
        let clamped = if self.amount.is_finite() {
            self.amount.clamp(0.0, 1.0)
        } else {
            default_blend_amount()
        };
        if clamped != self.amount {
            warn!("blend.amount {} outside [0, 1], using {clamped}", self.amount);
            self.amount = clamped;
        }
    }
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            mode: BlendMode::default(),
            amount: default_blend_amount(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    #[default]
    Ripple,
    Attract,
    Repel,
    Trail,
    Distort,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InteractiveConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub kind: InteractionKind,
    #[serde(default = "default_interaction_strength")]
    pub strength: f64,
    #[serde(default = "default_interaction_radius")]
    pub radius: f64,
    #[serde(default = "default_true")]
    pub click_enabled: bool,
}

impl InteractiveConfig {
    pub fn sanitize(&mut self) {
        if !self.strength.is_finite() {
            warn!("interactive.strength is not finite, using default");
            self.strength = default_interaction_strength();
        }
        let radius = if self.radius.is_finite() {
            self.radius.clamp(MIN_INTERACTION_RADIUS, 1.0)
        } else {
            default_interaction_radius()
        };
        if radius != self.radius {
            warn!("interactive.radius {} outside (0, 1], using {radius}", self.radius);
            self.radius = radius;
        }
    }
}

impl Default for InteractiveConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: InteractionKind::default(),
            strength: default_interaction_strength(),
            radius: default_interaction_radius(),
            click_enabled: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Ramps {
    #[serde(default = "default_primary_ramp")]
    pub primary: RampChoice,
    #[serde(default = "default_secondary_ramp")]
    pub secondary: RampChoice,
}

impl Default for Ramps {
    fn default() -> Self {
        Self {
            primary: default_primary_ramp(),
            secondary: default_secondary_ramp(),
        }
    }
}

/// How the voronoi swarm's simulation clock is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SwarmClock {
    /// One `advance(frame_delta)` per rendered frame.
    #[default]
    PerFrame,
    /// One `advance(frame_delta)` per field query, so the swarm speeds up
    /// with grid resolution.
    PerQuery,
}

/// Frame pacing. An omitted `frame_delta` is `1 / fps`, so one tick covers
/// exactly one frame interval of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(from = "TimingDocument")]
pub struct Timing {
    pub fps: u32,
    /// Seconds per frame.
    pub frame_delta: f64,
    /// Pattern time units per second.
    pub speed_multiplier: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TimingDocument {
    #[serde(default = "default_fps")]
    fps: u32,
    #[serde(default)]
    frame_delta: Option<f64>,
    #[serde(default = "default_speed_multiplier")]
    speed_multiplier: f64,
}

impl From<TimingDocument> for Timing {
    fn from(document: TimingDocument) -> Self {
        Self {
            fps: document.fps,
            frame_delta: document
                .frame_delta
                .unwrap_or_else(|| frame_interval(document.fps)),
            speed_multiplier: document.speed_multiplier,
        }
    }
}

impl Timing {
    pub fn sanitize(&mut self) {
        if self.fps == 0 {
            warn!("timing.fps must be >= 1, using 1");
            self.fps = 1;
        }
        if !self.frame_delta.is_finite() || self.frame_delta <= 0.0 {
            warn!("timing.frame_delta must be > 0, using 1/fps");
            self.frame_delta = frame_interval(self.fps);
        }
        if !self.speed_multiplier.is_finite() {
            warn!("timing.speed_multiplier is not finite, using default");
            self.speed_multiplier = default_speed_multiplier();
        }
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            frame_delta: frame_interval(default_fps()),
            speed_multiplier: default_speed_multiplier(),
        }
    }
}

/// Grid dimensions as written in a scene file, before validation.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridDimensions {
    pub cols: i64,
    pub rows: i64,
}

impl GridDimensions {
    pub fn to_grid(self) -> Result<GridSpec> {
        let (Ok(cols), Ok(rows)) = (u32::try_from(self.cols), u32::try_from(self.rows)) else {
            let bound = if self.cols < 0 || self.rows < 0 {
                "at least 1x1"
            } else {
                "at most 4294967295 per side"
            };
            return Err(CodedError::config(
                E_GRID_DIMENSIONS,
                format!("grid must be {bound}, got {}x{}", self.cols, self.rows),
            )
            .into());
        };
        GridSpec::new(cols, rows)
    }
}

/// A scene document exactly as deserialized.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneDocument {
    pub grid: GridDimensions,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub timing: Timing,
    pub primary: PatternConfig,
    #[serde(default)]
    pub secondary: SecondaryConfig,
    #[serde(default)]
    pub blend: BlendConfig,
    #[serde(default)]
    pub interactive: InteractiveConfig,
    #[serde(default)]
    pub ramps: Ramps,
    #[serde(default)]
    pub swarm_clock: SwarmClock,
}

impl SceneDocument {
    pub fn into_scene(self) -> Result<Scene> {
        let grid = self.grid.to_grid()?;
        let mut scene = Scene {
            grid,
            seed: self.seed,
            timing: self.timing,
            primary: self.primary,
            secondary: self.secondary,
            blend: self.blend,
            interactive: self.interactive,
            ramps: self.ramps,
            swarm_clock: self.swarm_clock,
        };
        scene.sanitize();
        Ok(scene)
    }
}

/// A validated scene: everything the render loop needs besides pointer input.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub grid: GridSpec,
    pub seed: Option<u64>,
    pub timing: Timing,
    pub primary: PatternConfig,
    pub secondary: SecondaryConfig,
    pub blend: BlendConfig,
    pub interactive: InteractiveConfig,
    pub ramps: Ramps,
    pub swarm_clock: SwarmClock,
}

impl Scene {
    pub fn new(grid: GridSpec, primary: PatternConfig) -> Self {
        Self {
            grid,
            seed: None,
            timing: Timing::default(),
            primary,
            secondary: SecondaryConfig::default(),
            blend: BlendConfig::default(),
            interactive: InteractiveConfig::default(),
            ramps: Ramps::default(),
            swarm_clock: SwarmClock::default(),
        }
    }

    pub fn sanitize(&mut self) {
        self.timing.sanitize();
        self.primary.sanitize("primary");
        self.secondary.pattern.sanitize("secondary");
        self.blend.sanitize();
        self.interactive.sanitize();
    }
}

fn default_speed() -> f64 {
    DEFAULT_SPEED
}

fn default_scale() -> f64 {
    DEFAULT_SCALE
}

fn default_color() -> Rgb {
    Rgb::new(0, 255, 136)
}

fn default_blend_amount() -> f64 {
    0.5
}

fn default_interaction_strength() -> f64 {
    1.0
}

fn default_interaction_radius() -> f64 {
    0.2
}

fn default_true() -> bool {
    true
}

fn default_fps() -> u32 {
    60
}

/// Seconds between frames at `fps`; a zero rate counts as 1 fps.
fn frame_interval(fps: u32) -> f64 {
    1.0 / f64::from(fps.max(1))
}

fn default_speed_multiplier() -> f64 {
    60.0
}

fn default_primary_ramp() -> RampChoice {
    RampChoice::Preset(crate::glyph::RampPreset::Standard)
}

fn default_secondary_ramp() -> RampChoice {
    RampChoice::Preset(crate::glyph::RampPreset::Blocks)
}

#[cfg(test)]
mod tests {
    use super::{
        BlendConfig, BlendMode, GridDimensions, GridSpec, InteractiveConfig, PatternConfig, PatternKind, Rgb,
        SceneDocument, Timing,
    };
    use crate::error_codes::{find_coded_error, E_GRID_DIMENSIONS};

    #[test]
    fn grid_rejects_zero_dimensions() {
        let error = GridSpec::new(0, 4).expect_err("zero cols must fail");
        let coded = find_coded_error(&error).expect("grid error should be coded");
        assert_eq!(coded.code, E_GRID_DIMENSIONS);
        assert!(GridSpec::new(3, 0).is_err());
        assert!(GridSpec::new(1, 1).is_ok());
    }

    #[test]
    fn normalized_coordinates_use_cell_corners() {
        let grid = GridSpec::new(4, 2).expect("grid should build");
        assert_eq!(grid.normalized(0, 0), (0.0, 0.0));
        assert_eq!(grid.normalized(2, 1), (0.5, 0.5));
    }

    #[test]
    fn hex_colors_parse_and_malformed_falls_back_to_white() {
        assert_eq!(Rgb::parse_hex("#ff8000"), Some(Rgb::new(255, 128, 0)));
        assert_eq!(Rgb::parse_hex("0f0"), Some(Rgb::new(0, 255, 0)));
        assert_eq!(Rgb::parse_hex("#12345"), None);
        assert_eq!(Rgb::from_hex_or_white("not-a-color"), Rgb::WHITE);
        assert_eq!(Rgb::new(1, 2, 255).to_hex(), "#0102ff");
    }

    #[test]
    fn pattern_config_applies_defaults() {
        let config: PatternConfig =
            serde_yaml::from_str("kind: spiral").expect("pattern should parse");
        assert_eq!(config.kind, PatternKind::Spiral);
        assert_eq!(config.speed, 0.01);
        assert!(!config.glow);
    }

    #[test]
    fn unknown_blend_mode_falls_back_to_normal() {
        let mode: BlendMode = serde_yaml::from_str("hard_light").expect("mode should parse");
        assert_eq!(mode, BlendMode::Normal);
    }

    #[test]
    fn interactive_radius_is_clamped() {
        let mut config: InteractiveConfig =
            serde_yaml::from_str("{ enabled: true, radius: 4.0 }").expect("config should parse");
        config.sanitize();
        assert_eq!(config.radius, 1.0);
        assert!(config.click_enabled);
    }

    #[test]
    fn scene_document_validates_grid_and_clamps_amount() {
        let document: SceneDocument = serde_yaml::from_str(
            r#"
grid: { cols: 12, rows: 6 }
primary: { kind: waves }
blend: { mode: screen, amount: 3.5 }
"#,
        )
        .expect("scene should parse");
        let scene = document.into_scene().expect("scene should validate");
        assert_eq!(scene.grid.cols(), 12);
        assert_eq!(scene.blend.amount, 1.0);
        assert!(scene.secondary.active().is_none());

        let negative: SceneDocument =
            serde_yaml::from_str("grid: { cols: -2, rows: 6 }\nprimary: { kind: waves }")
                .expect("scene should parse");
        let error = negative.into_scene().expect_err("negative grid must fail");
        assert_eq!(
            find_coded_error(&error).map(|coded| coded.code),
            Some(E_GRID_DIMENSIONS)
        );
    }

    #[test]
    fn oversized_grid_reports_the_requested_size() {
        let error = GridDimensions {
            cols: 5_000_000_000,
            rows: 3,
        }
        .to_grid()
        .expect_err("grid above u32 must fail");
        let coded = find_coded_error(&error).expect("grid error should be coded");
        assert_eq!(coded.code, E_GRID_DIMENSIONS);
        assert!(coded.message.contains("5000000000x3"), "{}", coded.message);
    }

    #[test]
    fn omitted_frame_delta_follows_fps() {
        let default = Timing::default();
        assert!((default.frame_delta * f64::from(default.fps) - 1.0).abs() < 1e-12);

        let document: SceneDocument =
            serde_yaml::from_str("grid: { cols: 4, rows: 2 }\nprimary: { kind: waves }")
                .expect("scene should parse");
        let scene = document.into_scene().expect("scene should validate");
        assert!((scene.timing.frame_delta * f64::from(scene.timing.fps) - 1.0).abs() < 1e-12);

        let timing: Timing = serde_yaml::from_str("fps: 24").expect("timing should parse");
        assert_eq!(timing.frame_delta, 1.0 / 24.0);
        let explicit: Timing =
            serde_yaml::from_str("{ fps: 24, frame_delta: 0.5 }").expect("timing should parse");
        assert_eq!(explicit.frame_delta, 0.5);
    }

    #[test]
    fn builder_helpers_set_fields() {
        let config = PatternConfig::new(PatternKind::Stripes).with_speed(0.25);
        assert_eq!(config.speed, 0.25);
        let blend = BlendConfig::new(BlendMode::Multiply, 0.3);
        assert_eq!((blend.mode, blend.amount), (BlendMode::Multiply, 0.3));
    }

    #[test]
    fn stateful_kinds_are_cellular_and_voronoi() {
        let stateful = PatternKind::ALL
            .iter()
            .filter(|kind| kind.is_stateful())
            .collect::<Vec<_>>();
        assert_eq!(stateful, vec![&PatternKind::Cellular, &PatternKind::Voronoi]);
    }
}
