//! Scalar pattern fields.
//!
//! [`ScalarFieldLibrary`] holds the closed-form patterns: given normalized
//! cell-corner coordinates and a phase (`time * speed`) it returns a raw value
//! in `[-1, 1]`. [`FieldState`] adds the two simulated sources (cellular and
//! voronoi) for one pattern slot, and [`evaluate_pattern`] is the normalized
//! `[0, 1]` entry point used by the render loop and exporters.

use std::f64::consts::TAU;

use log::debug;
use noise::{NoiseFn, OpenSimplex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cellular::{step_due, CellularAutomaton};
use crate::schema::{GridSpec, NoiseVariant, PatternConfig, PatternKind, SwarmClock};
use crate::voronoi::VoronoiSwarm;

const NOISE_SEED: u32 = 0x5eed;
const TURBULENCE_OCTAVES: u32 = 4;
const MANDELBROT_MAX_ITERATIONS: u32 = 20;
const JULIA_MAX_ITERATIONS: u32 = 15;
const JULIA_C: (f64, f64) = (-0.7, 0.27015);
const RADIUS_EPSILON: f64 = 0.1;
const MOSAIC_HASH_X: i64 = 73_856_093;
const MOSAIC_HASH_Y: i64 = 19_349_663;
const MOSAIC_MODULUS: i64 = 1_000_000;

/// The stateless patterns.
#[derive(Clone)]
pub struct ScalarFieldLibrary {
    noise: OpenSimplex,
}

impl ScalarFieldLibrary {
    pub fn new() -> Self {
        Self {
            noise: OpenSimplex::new(NOISE_SEED),
        }
    }

    /// Raw value in `[-1, 1]` for a stateless kind, `None` for cellular/voronoi.
    pub fn sample(
        &self,
        kind: PatternKind,
        nx: f64,
        ny: f64,
        phase: f64,
        config: &PatternConfig,
    ) -> Option<f64> {
        let scale = config.scale;
        let value = match kind {
            PatternKind::Waves => waves(nx, ny, phase),
            PatternKind::Ripples => ripples(nx, ny, phase),
            PatternKind::Noise => self.noise(nx, ny, phase, scale, config.noise_variant),
            PatternKind::Spiral => spiral(nx, ny, phase),
            PatternKind::Checkerboard => checkerboard(nx, ny, phase, scale),
            PatternKind::Stripes => stripes(nx, ny, phase, scale),
            PatternKind::Plasma => plasma(nx, ny, phase),
            PatternKind::Mandelbrot => mandelbrot(nx, ny, phase),
            PatternKind::Julia => julia(nx, ny, phase),
            PatternKind::Tunnel => tunnel(nx, ny, phase),
            PatternKind::Mosaic => mosaic(nx, ny, phase, scale),
            PatternKind::Cellular | PatternKind::Voronoi => return None,
        };
        Some(value)
    }

    fn noise(&self, nx: f64, ny: f64, phase: f64, scale: f64, variant: NoiseVariant) -> f64 {
        let point = [nx * scale * 100.0, ny * scale * 100.0, phase * 10.0];
        match variant {
            NoiseVariant::Simplex => self.noise_at(point),
            NoiseVariant::Turbulence => {
                let mut sum = 0.0;
                let mut amplitude = 1.0;
                let mut frequency = 1.0;
                let mut total_amplitude = 0.0;
                for _ in 0..TURBULENCE_OCTAVES {
                    let scaled = [point[0] * frequency, point[1] * frequency, point[2] * frequency];
                    sum += self.noise_at(scaled) * amplitude;
                    total_amplitude += amplitude;
                    amplitude *= 0.5;
                    frequency *= 2.0;
                }
                sum / total_amplitude
            }
            NoiseVariant::Ridged => {
                let unit = (self.noise_at(point) + 1.0) * 0.5;
                2.0 * (1.0 - (2.0 * unit - 1.0).abs()) - 1.0
            }
        }
    }

    fn noise_at(&self, point: [f64; 3]) -> f64 {
        self.noise.get(point).clamp(-1.0, 1.0)
    }
}

impl Default for ScalarFieldLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ScalarFieldLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalarFieldLibrary")
            .field("noise_seed", &NOISE_SEED)
            .finish()
    }
}

fn polar(nx: f64, ny: f64) -> (f64, f64) {
    let dx = nx - 0.5;
    let dy = ny - 0.5;
    (dy.atan2(dx), (dx * dx + dy * dy).sqrt())
}

fn waves(nx: f64, ny: f64, phase: f64) -> f64 {
    0.5 * ((nx * 10.0 + phase * 5.0).sin() + (ny * 6.0 + phase * 3.0).sin())
}

fn ripples(nx: f64, ny: f64, phase: f64) -> f64 {
    let (_, radius) = polar(nx, ny);
    (radius * 30.0 - phase * 5.0).sin()
}

fn spiral(nx: f64, ny: f64, phase: f64) -> f64 {
    let (angle, radius) = polar(nx, ny);
    (3.0 * angle + 20.0 * radius + phase).sin()
}

fn checkerboard(nx: f64, ny: f64, phase: f64, scale: f64) -> f64 {
    let sum = (nx * scale * 100.0).floor() + (ny * scale * 100.0).floor() + (phase * 100.0).floor();
    if !sum.is_finite() {
        return 0.0;
    }
    if (sum as i64).rem_euclid(2) == 0 {
        1.0
    } else {
        -1.0
    }
}

fn stripes(nx: f64, ny: f64, phase: f64, scale: f64) -> f64 {
    ((nx + ny) * scale * 200.0 + phase * 100.0).sin()
}

fn plasma(nx: f64, ny: f64, phase: f64) -> f64 {
    let (_, radius) = polar(nx, ny);
    let v1 = (nx * 10.0 + phase * 2.0).sin();
    let v2 = (ny * 8.0 + phase * 3.0).sin();
    let v3 = ((nx + ny) * 6.0 + phase * 1.5).sin();
    let v4 = (radius * 12.0 - phase * 2.5).sin();
    (v1 + v2 + v3 + v4) / 4.0
}

/// Iterations of `z <- z^2 + c` before `|z|^2 > 4`, mapped onto `[-1, 1]`.
fn escape_time(mut zx: f64, mut zy: f64, cx: f64, cy: f64, max_iterations: u32) -> f64 {
    let mut iterations = 0;
    while iterations < max_iterations && zx * zx + zy * zy <= 4.0 {
        let next_x = zx * zx - zy * zy + cx;
        zy = 2.0 * zx * zy + cy;
        zx = next_x;
        iterations += 1;
    }
    f64::from(iterations) / f64::from(max_iterations) * 2.0 - 1.0
}

fn mandelbrot(nx: f64, ny: f64, phase: f64) -> f64 {
    let cx = (nx - 0.5) * 3.0 - 0.5 + 0.2 * phase.sin();
    let cy = (ny - 0.5) * 2.4 + 0.2 * phase.cos();
    escape_time(0.0, 0.0, cx, cy, MANDELBROT_MAX_ITERATIONS)
}

fn julia(nx: f64, ny: f64, phase: f64) -> f64 {
    let zx = (nx - 0.5) * 3.0 + 0.3 * phase.sin();
    let zy = (ny - 0.5) * 2.0 + 0.3 * phase.cos();
    escape_time(zx, zy, JULIA_C.0, JULIA_C.1, JULIA_MAX_ITERATIONS)
}

fn tunnel(nx: f64, ny: f64, phase: f64) -> f64 {
    let (angle, radius) = polar(nx, ny);
    let depth = 1.0 / (radius + RADIUS_EPSILON);
    (angle * 4.0 + phase).sin() * (depth * 2.0 - phase * 3.0).sin()
}

fn mosaic(nx: f64, ny: f64, phase: f64, scale: f64) -> f64 {
    let tile_x = (nx * scale * 200.0).floor();
    let tile_y = (ny * scale * 200.0).floor();
    if !tile_x.is_finite() || !tile_y.is_finite() {
        return 0.0;
    }
    let hash = ((tile_x as i64).wrapping_mul(MOSAIC_HASH_X)
        ^ (tile_y as i64).wrapping_mul(MOSAIC_HASH_Y))
    .rem_euclid(MOSAIC_MODULUS);
    let unit = hash as f64 / MOSAIC_MODULUS as f64;
    (unit * 2.0 - 1.0) * 0.8 + 0.2 * (phase * 10.0 + unit * TAU).sin()
}

/// Everything one pattern slot needs to be sampled: the pure library plus the
/// simulated sources for the stateful kinds.
#[derive(Debug, Clone)]
pub struct FieldState {
    library: ScalarFieldLibrary,
    cellular: CellularAutomaton,
    swarm: VoronoiSwarm,
    swarm_clock: SwarmClock,
    frame_delta: f64,
    rng: StdRng,
}

impl FieldState {
    pub fn new(seed: Option<u64>, swarm_clock: SwarmClock, frame_delta: f64) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let swarm = VoronoiSwarm::new(&mut rng);
        let mut cellular = CellularAutomaton::new();
        cellular.reseed(&mut rng);
        Self {
            library: ScalarFieldLibrary::new(),
            cellular,
            swarm,
            swarm_clock,
            frame_delta,
            rng,
        }
    }

    pub fn cellular(&self) -> &CellularAutomaton {
        &self.cellular
    }

    pub fn cellular_mut(&mut self) -> &mut CellularAutomaton {
        &mut self.cellular
    }

    pub fn swarm(&self) -> &VoronoiSwarm {
        &self.swarm
    }

    pub fn set_frame_delta(&mut self, frame_delta: f64) {
        self.frame_delta = frame_delta;
    }

    /// Called when a slot switches to `kind`: cellular boards are re-seeded.
    pub fn activate(&mut self, kind: PatternKind) {
        if kind == PatternKind::Cellular {
            self.cellular.reseed(&mut self.rng);
        }
    }

    /// Once-per-frame simulation update for the slot's current kind.
    pub fn prepare_frame(&mut self, time: f64, config: &PatternConfig, frame_delta: f64) {
        match config.kind {
            PatternKind::Cellular => {
                if step_due(time, config.speed) {
                    self.cellular.step();
                    debug!("cellular generation {}", self.cellular.generation());
                }
            }
            PatternKind::Voronoi => {
                if self.swarm_clock == SwarmClock::PerFrame {
                    self.swarm.advance(frame_delta);
                }
            }
            _ => {}
        }
    }

    /// Raw value for one cell. Only voronoi in `per_query` mode mutates here.
    pub fn sample(
        &mut self,
        col: u32,
        row: u32,
        grid: &GridSpec,
        time: f64,
        config: &PatternConfig,
    ) -> f64 {
        let (nx, ny) = grid.normalized(col, row);
        let phase = time * config.speed;
        match config.kind {
            PatternKind::Cellular => self.cellular.query(nx, ny),
            PatternKind::Voronoi => {
                if self.swarm_clock == SwarmClock::PerQuery {
                    self.swarm.advance(self.frame_delta);
                }
                self.swarm.query(nx, ny, phase)
            }
            kind => self
                .library
                .sample(kind, nx, ny, phase, config)
                .unwrap_or(0.0),
        }
    }
}

/// `(raw + 1) / 2`, clamped to `[0, 1]`; non-finite values read as 0.5.
pub fn normalize(raw: f64) -> f64 {
    if !raw.is_finite() {
        return 0.5;
    }
    ((raw + 1.0) * 0.5).clamp(0.0, 1.0)
}

/// Normalized pattern value in `[0, 1]` for cell `(col, row)` at `time`.
pub fn evaluate_pattern(
    col: u32,
    row: u32,
    grid: &GridSpec,
    time: f64,
    config: &PatternConfig,
    state: &mut FieldState,
) -> f64 {
    normalize(state.sample(col, row, grid, time, config))
}

#[cfg(test)]
mod tests {
    use super::{evaluate_pattern, normalize, FieldState, ScalarFieldLibrary};
    use crate::schema::{GridSpec, NoiseVariant, PatternConfig, PatternKind, SwarmClock};

    fn state() -> FieldState {
        FieldState::new(Some(42), SwarmClock::PerFrame, 1.0 / 60.0)
    }

    #[test]
    fn every_kind_stays_in_unit_range() {
        let grid = GridSpec::new(17, 11).expect("grid should build");
        let mut state = state();
        for kind in PatternKind::ALL {
            for variant in [
                NoiseVariant::Simplex,
                NoiseVariant::Turbulence,
                NoiseVariant::Ridged,
            ] {
                let mut config = PatternConfig::new(kind);
                config.noise_variant = variant;
                for time in [0.0, 1.0, 37.5, 1_000.0, -12.0] {
                    for row in 0..grid.rows() {
                        for col in 0..grid.cols() {
                            let value = evaluate_pattern(col, row, &grid, time, &config, &mut state);
                            assert!(
                                (0.0..=1.0).contains(&value),
                                "{} out of range: {value}",
                                kind.as_str()
                            );
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn stateless_kinds_are_idempotent() {
        let library = ScalarFieldLibrary::new();
        for kind in PatternKind::ALL.into_iter().filter(|kind| !kind.is_stateful()) {
            let config = PatternConfig::new(kind);
            let first = library.sample(kind, 0.3, 0.7, 2.5, &config);
            let second = library.sample(kind, 0.3, 0.7, 2.5, &config);
            assert!(first.is_some(), "{} should be stateless", kind.as_str());
            assert_eq!(first, second, "{} is not idempotent", kind.as_str());
        }
    }

    #[test]
    fn stateful_kinds_are_not_served_by_the_library() {
        let library = ScalarFieldLibrary::new();
        let config = PatternConfig::new(PatternKind::Cellular);
        assert_eq!(library.sample(PatternKind::Cellular, 0.1, 0.1, 0.0, &config), None);
        assert_eq!(library.sample(PatternKind::Voronoi, 0.1, 0.1, 0.0, &config), None);
    }

    #[test]
    fn waves_at_origin_is_midpoint() {
        let library = ScalarFieldLibrary::new();
        let config = PatternConfig::new(PatternKind::Waves);
        let raw = library
            .sample(PatternKind::Waves, 0.0, 0.0, 0.0, &config)
            .expect("waves is stateless");
        assert_eq!(normalize(raw), 0.5);
    }

    #[test]
    fn checkerboard_alternates_between_neighbors() {
        let library = ScalarFieldLibrary::new();
        let mut config = PatternConfig::new(PatternKind::Checkerboard);
        config.scale = 0.1;
        let a = library.sample(PatternKind::Checkerboard, 0.05, 0.05, 0.0, &config);
        let b = library.sample(PatternKind::Checkerboard, 0.15, 0.05, 0.0, &config);
        assert_eq!(a, Some(1.0));
        assert_eq!(b, Some(-1.0));
    }

    #[test]
    fn fractals_saturate_inside_the_set() {
        let library = ScalarFieldLibrary::new();
        let config = PatternConfig::new(PatternKind::Mandelbrot);
        // c = -0.5 + 0.2i after the pan at phase 0 sits inside the main cardioid.
        let inside = library
            .sample(PatternKind::Mandelbrot, 0.5, 0.5, 0.0, &config)
            .expect("mandelbrot is stateless");
        assert_eq!(inside, 1.0);
        let far = library
            .sample(PatternKind::Julia, 0.0, 0.0, 0.0, &config)
            .expect("julia is stateless");
        assert!(far < 0.0);
    }

    #[test]
    fn non_finite_raw_values_normalize_to_midpoint() {
        assert_eq!(normalize(f64::NAN), 0.5);
        assert_eq!(normalize(5.0), 1.0);
        assert_eq!(normalize(-5.0), 0.0);
    }

    #[test]
    fn per_query_clock_moves_swarm_on_every_sample() {
        let grid = GridSpec::new(4, 4).expect("grid should build");
        let config = PatternConfig::new(PatternKind::Voronoi);

        let mut per_query = FieldState::new(Some(1), SwarmClock::PerQuery, 0.5);
        let before = per_query.swarm().points().to_vec();
        per_query.sample(0, 0, &grid, 0.0, &config);
        assert_ne!(per_query.swarm().points(), before.as_slice());

        let mut per_frame = FieldState::new(Some(1), SwarmClock::PerFrame, 0.5);
        let before = per_frame.swarm().points().to_vec();
        per_frame.sample(0, 0, &grid, 0.0, &config);
        assert_eq!(per_frame.swarm().points(), before.as_slice());
        per_frame.prepare_frame(0.0, &config, 0.5);
        assert_ne!(per_frame.swarm().points(), before.as_slice());
    }
}
