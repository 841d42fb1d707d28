//! Per-frame orchestration.
//!
//! [`composite_frame`] turns one snapshot of configuration into a grid of
//! [`Cell`]s. [`RenderState`] owns everything that changes between frames
//! (time, simulated sources, click ripples, pointer) and is what the CLI's
//! playback and export paths drive.

use std::time::{Duration, Instant};

use log::{debug, info};

use crate::compositor::composite;
use crate::field::{evaluate_pattern, FieldState};
use crate::glyph::CharacterRamp;
use crate::interaction::{self, ClickEffect, ClickEffects, PointerState};
use crate::schema::{
    BlendConfig, GridSpec, InteractiveConfig, PatternConfig, Ramps, Rgb, Scene, SecondaryConfig,
};
use crate::text_frame::TextFrame;

const GLOW_EXPONENT: f64 = 0.7;

/// Halo request for a glowing cell; sizing is up to the rasterizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlowHint {
    pub intensity: f64,
}

impl GlowHint {
    pub fn from_source(value: f64) -> Self {
        Self {
            intensity: value.clamp(0.0, 1.0).powf(GLOW_EXPONENT),
        }
    }

    /// Halo radius in pixels for a cell of the given height.
    pub fn radius(&self, cell_height: f32) -> f32 {
        cell_height * (0.6 + self.intensity as f32)
    }

    /// Peak halo opacity in `[0, 0.35]`.
    pub fn opacity(&self) -> f32 {
        0.35 * self.intensity as f32
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub glyph: char,
    /// Final composited value the glyph was chosen from.
    pub value: f64,
    pub color: Rgb,
    pub glow: Option<GlowHint>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    grid: GridSpec,
    time: f64,
    cells: Vec<Cell>,
}

impl Frame {
    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, col: u32, row: u32) -> Option<&Cell> {
        if col >= self.grid.cols() || row >= self.grid.rows() {
            return None;
        }
        self.cells
            .get(row as usize * self.grid.cols() as usize + col as usize)
    }

    pub fn glyphs(&self) -> impl Iterator<Item = char> + '_ {
        self.cells.iter().map(|cell| cell.glyph)
    }

    pub fn to_text_frame(&self) -> TextFrame {
        TextFrame::from_glyphs(
            self.glyphs(),
            self.grid.cols() as usize,
            self.grid.rows() as usize,
        )
    }
}

/// Both character ramps, resolved from the scene's choices.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRamps {
    pub primary: CharacterRamp,
    pub secondary: CharacterRamp,
}

impl ResolvedRamps {
    pub fn from_choices(ramps: &Ramps) -> Self {
        Self {
            primary: ramps.primary.resolve(),
            secondary: ramps.secondary.resolve(),
        }
    }
}

impl Default for ResolvedRamps {
    fn default() -> Self {
        Self::from_choices(&Ramps::default())
    }
}

pub struct CompositeArgs<'a> {
    pub grid: &'a GridSpec,
    pub time: f64,
    /// Wall-clock seconds, for interaction phases.
    pub elapsed: f64,
    pub primary: &'a PatternConfig,
    pub secondary: Option<&'a PatternConfig>,
    pub blend: &'a BlendConfig,
    pub interactive: Option<&'a InteractiveConfig>,
    pub pointer: &'a PointerState,
    pub clicks: &'a ClickEffects,
    pub ramps: &'a ResolvedRamps,
}

/// Evaluates every cell of the grid once.
pub fn composite_frame(
    args: &CompositeArgs,
    primary_state: &mut FieldState,
    secondary_state: &mut FieldState,
) -> Frame {
    let grid = args.grid;
    let mut cells = Vec::with_capacity(grid.cell_count());

    for row in 0..grid.rows() {
        for col in 0..grid.cols() {
            let v1 = evaluate_pattern(col, row, grid, args.time, args.primary, primary_state);
            let mut glow_source = args.primary.glow.then_some(v1);

            let (mut value, color, ramp) = match args.secondary {
                Some(secondary) => {
                    let v2 = evaluate_pattern(col, row, grid, args.time, secondary, secondary_state);
                    if secondary.glow {
                        glow_source = Some(glow_source.map_or(v2, |v1| v1.max(v2)));
                    }
                    let blended = composite(
                        v1,
                        v2,
                        args.primary.color,
                        secondary.color,
                        args.blend,
                        &args.ramps.primary,
                        &args.ramps.secondary,
                    );
                    (blended.value, blended.color, blended.ramp)
                }
                None => (v1, args.primary.color, &args.ramps.primary),
            };

            if let Some(interactive) = args.interactive {
                value = interaction::apply(
                    col,
                    row,
                    grid,
                    value,
                    args.pointer,
                    args.clicks,
                    interactive,
                    args.elapsed,
                );
            }

            cells.push(Cell {
                glyph: ramp.map_to_char(value),
                value,
                color,
                glow: glow_source.map(GlowHint::from_source),
            });
        }
    }

    Frame {
        grid: *grid,
        time: args.time,
        cells,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Paused,
}

/// Mutable render-loop state for one scene.
#[derive(Debug, Clone)]
pub struct RenderState {
    scene: Scene,
    ramps: ResolvedRamps,
    primary_state: FieldState,
    secondary_state: FieldState,
    time: f64,
    elapsed: f64,
    frame_index: u64,
    run_state: RunState,
    armed: bool,
    pointer: PointerState,
    clicks: ClickEffects,
}

impl RenderState {
    pub fn new(scene: Scene) -> Self {
        let frame_delta = scene.timing.frame_delta;
        let mut primary_state = FieldState::new(scene.seed, scene.swarm_clock, frame_delta);
        let mut secondary_state = FieldState::new(
            scene.seed.map(|seed| seed.wrapping_add(1)),
            scene.swarm_clock,
            frame_delta,
        );
        primary_state.activate(scene.primary.kind);
        secondary_state.activate(scene.secondary.pattern.kind);

        Self {
            ramps: ResolvedRamps::from_choices(&scene.ramps),
            armed: scene.interactive.enabled,
            scene,
            primary_state,
            secondary_state,
            time: 0.0,
            elapsed: 0.0,
            frame_index: 0,
            run_state: RunState::Running,
            pointer: PointerState::default(),
            clicks: ClickEffects::new(),
        }
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Jumps the pattern clock; simulated sources are not replayed.
    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn run_state(&self) -> RunState {
        self.run_state
    }

    pub fn clicks(&self) -> &ClickEffects {
        &self.clicks
    }

    pub fn primary_state(&self) -> &FieldState {
        &self.primary_state
    }

    pub fn primary_state_mut(&mut self) -> &mut FieldState {
        &mut self.primary_state
    }

    pub fn pause(&mut self) {
        if self.run_state == RunState::Running {
            info!("paused at t={:.3}", self.time);
            self.run_state = RunState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.run_state == RunState::Paused {
            info!("resumed at t={:.3}", self.time);
            self.run_state = RunState::Running;
        }
    }

    pub fn toggle_pause(&mut self) -> RunState {
        match self.run_state {
            RunState::Running => self.pause(),
            RunState::Paused => self.resume(),
        }
        self.run_state
    }

    pub fn arm(&mut self) {
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.clicks.clear();
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn interaction_live(&self) -> bool {
        self.armed && self.scene.interactive.enabled
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        self.pointer = PointerState::at(x, y);
    }

    pub fn pointer_leave(&mut self) {
        self.pointer = PointerState::absent();
    }

    /// Spawns a click ripple at `(x, y)` if clicks are live. Returns whether one was added.
    pub fn pointer_down(&mut self, x: f64, y: f64) -> bool {
        if !self.interaction_live() || !self.scene.interactive.click_enabled {
            return false;
        }
        self.clicks
            .push(ClickEffect::new(x, y, &self.scene.interactive));
        debug!("click effect at ({x:.3}, {y:.3}), {} live", self.clicks.len());
        true
    }

    pub fn set_grid(&mut self, grid: GridSpec) {
        self.scene.grid = grid;
    }

    pub fn set_primary(&mut self, mut config: PatternConfig) {
        config.sanitize("primary");
        if config.kind != self.scene.primary.kind {
            self.primary_state.activate(config.kind);
        }
        self.scene.primary = config;
    }

    pub fn set_secondary(&mut self, mut config: SecondaryConfig) {
        config.pattern.sanitize("secondary");
        let switched = config.pattern.kind != self.scene.secondary.pattern.kind
            || (config.enabled && !self.scene.secondary.enabled);
        if switched {
            self.secondary_state.activate(config.pattern.kind);
        }
        self.scene.secondary = config;
    }

    pub fn set_blend(&mut self, mut config: BlendConfig) {
        config.sanitize();
        self.scene.blend = config;
    }

    pub fn set_interactive(&mut self, mut config: InteractiveConfig) {
        config.sanitize();
        self.scene.interactive = config;
    }

    pub fn set_ramps(&mut self, ramps: Ramps) {
        self.ramps = ResolvedRamps::from_choices(&ramps);
        self.scene.ramps = ramps;
    }

    /// Moves time forward one frame and updates the simulated sources.
    /// Does nothing while paused.
    pub fn advance(&mut self, frame_delta: f64) -> bool {
        if self.run_state == RunState::Paused {
            return false;
        }
        self.time += frame_delta * self.scene.timing.speed_multiplier;
        self.elapsed += frame_delta;
        self.frame_index += 1;

        self.primary_state.set_frame_delta(frame_delta);
        self.secondary_state.set_frame_delta(frame_delta);
        self.primary_state
            .prepare_frame(self.time, &self.scene.primary, frame_delta);
        if let Some(secondary) = self.scene.secondary.active() {
            self.secondary_state
                .prepare_frame(self.time, secondary, frame_delta);
        }
        self.clicks.decay(frame_delta);
        true
    }

    /// Composites the grid at the current accumulated time.
    pub fn render(&mut self) -> Frame {
        self.render_at(self.time)
    }

    /// Composites the grid at an arbitrary time without touching the accumulator.
    pub fn render_at(&mut self, time: f64) -> Frame {
        let interactive = self
            .interaction_live()
            .then_some(&self.scene.interactive);
        let args = CompositeArgs {
            grid: &self.scene.grid,
            time,
            elapsed: self.elapsed,
            primary: &self.scene.primary,
            secondary: self.scene.secondary.active(),
            blend: &self.scene.blend,
            interactive,
            pointer: &self.pointer,
            clicks: &self.clicks,
            ramps: &self.ramps,
        };
        composite_frame(&args, &mut self.primary_state, &mut self.secondary_state)
    }

    /// `advance` followed by `render`; `None` while paused.
    pub fn tick(&mut self, frame_delta: f64) -> Option<Frame> {
        if self.advance(frame_delta) {
            Some(self.render())
        } else {
            None
        }
    }
}

/// Accepts at most `fps` ticks per second of wall-clock time.
#[derive(Debug, Clone)]
pub struct FrameLimiter {
    min_interval: Duration,
    last: Option<Instant>,
    skipped: u64,
}

impl FrameLimiter {
    pub fn new(fps: u32) -> Self {
        Self {
            min_interval: Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1))),
            last: None,
            skipped: 0,
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.min_interval => {
                self.skipped += 1;
                debug!("frame skipped by limiter ({} total)", self.skipped);
                false
            }
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    /// Time left until the next tick would be accepted.
    pub fn remaining(&self, now: Instant) -> Duration {
        match self.last {
            Some(last) => self
                .min_interval
                .saturating_sub(now.saturating_duration_since(last)),
            None => Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{FrameLimiter, GlowHint, RenderState, RunState};
    use crate::schema::{
        BlendMode, GridSpec, InteractiveConfig, PatternConfig, PatternKind, Rgb, Scene,
        SecondaryConfig, SwarmClock,
    };

    fn scene(kind: PatternKind) -> Scene {
        let grid = GridSpec::new(8, 6).expect("grid should build");
        let mut scene = Scene::new(grid, PatternConfig::new(kind));
        scene.seed = Some(5);
        scene
    }

    #[test]
    fn frame_has_one_cell_per_grid_position() {
        let mut state = RenderState::new(scene(PatternKind::Plasma));
        let frame = state.render();
        assert_eq!(frame.cells().len(), 48);
        assert!(frame.cell(7, 5).is_some());
        assert!(frame.cell(8, 0).is_none());
    }

    #[test]
    fn single_pattern_cells_use_primary_color_without_glow() {
        let mut base = scene(PatternKind::Spiral);
        base.primary.color = Rgb::new(1, 2, 3);
        let mut state = RenderState::new(base);
        let frame = state.render();
        assert!(frame
            .cells()
            .iter()
            .all(|cell| cell.color == Rgb::new(1, 2, 3) && cell.glow.is_none()));
    }

    #[test]
    fn glow_follows_the_glowing_slot() {
        let mut base = scene(PatternKind::Waves);
        base.primary.glow = true;
        let mut state = RenderState::new(base);
        let frame = state.render();
        assert!(frame.cells().iter().all(|cell| cell.glow.is_some()));

        let hint = GlowHint::from_source(1.0);
        assert_eq!(hint.intensity, 1.0);
        assert_eq!(GlowHint::from_source(0.0).opacity(), 0.0);
    }

    #[test]
    fn secondary_slot_blends_colors() {
        let mut base = scene(PatternKind::Waves);
        base.primary.color = Rgb::BLACK;
        base.secondary = SecondaryConfig {
            enabled: true,
            pattern: PatternConfig::new(PatternKind::Waves).with_color(Rgb::WHITE),
        };
        base.blend.mode = BlendMode::Normal;
        base.blend.amount = 1.0;
        let mut state = RenderState::new(base);
        let frame = state.render();
        assert!(frame.cells().iter().any(|cell| cell.color != Rgb::BLACK));
    }

    #[test]
    fn pause_freezes_time_and_suppresses_frames() {
        let mut state = RenderState::new(scene(PatternKind::Waves));
        assert!(state.tick(1.0 / 60.0).is_some());
        let frozen = state.time();
        assert_eq!(state.toggle_pause(), RunState::Paused);
        assert!(state.tick(1.0 / 60.0).is_none());
        assert_eq!(state.time(), frozen);
        state.resume();
        assert!(state.tick(1.0 / 60.0).is_some());
        assert!(state.time() > frozen);
    }

    #[test]
    fn time_advances_by_delta_times_multiplier() {
        let mut state = RenderState::new(scene(PatternKind::Waves));
        state.advance(0.5);
        assert_eq!(state.time(), 30.0);
        assert_eq!(state.elapsed(), 0.5);
        assert_eq!(state.frame_index(), 1);
    }

    #[test]
    fn clicks_require_armed_interaction() {
        let mut state = RenderState::new(scene(PatternKind::Waves));
        assert!(!state.is_armed());
        assert!(!state.pointer_down(0.5, 0.5));

        state.set_interactive(InteractiveConfig {
            enabled: true,
            ..InteractiveConfig::default()
        });
        state.arm();
        assert!(state.is_armed());
        assert!(state.pointer_down(0.5, 0.5));
        assert_eq!(state.clicks().len(), 1);

        state.disarm();
        assert!(!state.is_armed());
        assert!(state.clicks().is_empty());
        assert!(!state.pointer_down(0.5, 0.5));
    }

    #[test]
    fn switching_to_cellular_reseeds_the_board() {
        let mut state = RenderState::new(scene(PatternKind::Waves));
        state.primary_state_mut().cellular_mut().clear();
        state.set_primary(PatternConfig::new(PatternKind::Cellular));
        assert!(state.primary_state().cellular().live_count() > 0);
    }

    #[test]
    fn per_query_swarm_stays_in_the_unit_square_over_many_frames() {
        let grid = GridSpec::new(40, 20).expect("grid should build");
        let mut base = Scene::new(grid, PatternConfig::new(PatternKind::Voronoi));
        base.seed = Some(99);
        base.swarm_clock = SwarmClock::PerQuery;
        let mut state = RenderState::new(base);
        for _ in 0..200 {
            state.tick(1.0 / 60.0).expect("running state should tick");
        }
        let points = state.primary_state().swarm().points();
        assert!(!points.is_empty());
        for point in points {
            assert!((0.0..=1.0).contains(&point.x), "x out of range: {}", point.x);
            assert!((0.0..=1.0).contains(&point.y), "y out of range: {}", point.y);
        }
    }

    #[test]
    fn limiter_skips_ticks_inside_the_interval() {
        let mut limiter = FrameLimiter::new(10);
        assert_eq!(limiter.min_interval(), Duration::from_millis(100));
        let start = Instant::now();
        assert!(limiter.ready(start));
        assert!(!limiter.ready(start + Duration::from_millis(50)));
        assert!(limiter.ready(start + Duration::from_millis(100)));
        assert_eq!(limiter.skipped(), 1);
        assert_eq!(
            limiter.remaining(start + Duration::from_millis(130)),
            Duration::from_millis(70)
        );
    }
}
