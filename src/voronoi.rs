use rand::Rng;

pub const SWARM_POINTS: usize = 8;
/// Per-axis speed bound, in normalized units per second.
const MAX_VELOCITY: f64 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwarmPoint {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

/// Eight points bouncing inside the unit square.
///
/// Simulation (`advance`) and sampling (`query`) are separate; the caller
/// decides how often the swarm moves.
#[derive(Debug, Clone)]
pub struct VoronoiSwarm {
    points: Vec<SwarmPoint>,
}

impl VoronoiSwarm {
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut swarm = Self { points: Vec::new() };
        swarm.scatter(rng);
        swarm
    }

    pub fn from_points(points: Vec<SwarmPoint>) -> Self {
        Self { points }
    }

    pub fn scatter<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.points = (0..SWARM_POINTS)
            .map(|_| SwarmPoint {
                x: rng.gen_range(0.0..1.0),
                y: rng.gen_range(0.0..1.0),
                vx: rng.gen_range(-MAX_VELOCITY..MAX_VELOCITY),
                vy: rng.gen_range(-MAX_VELOCITY..MAX_VELOCITY),
            })
            .collect();
    }

    pub fn points(&self) -> &[SwarmPoint] {
        &self.points
    }

    /// Moves every point by `velocity * dt`, reflecting off the unit-square walls.
    pub fn advance(&mut self, dt: f64) {
        if !dt.is_finite() {
            return;
        }
        for point in &mut self.points {
            point.x += point.vx * dt;
            point.y += point.vy * dt;
            reflect(&mut point.x, &mut point.vx);
            reflect(&mut point.y, &mut point.vy);
        }
    }

    /// Distances to the nearest and second-nearest points.
    pub fn nearest_two(&self, nx: f64, ny: f64) -> (f64, f64) {
        let mut nearest = f64::INFINITY;
        let mut second = f64::INFINITY;
        for point in &self.points {
            let distance = ((point.x - nx).powi(2) + (point.y - ny).powi(2)).sqrt();
            if distance < nearest {
                second = nearest;
                nearest = distance;
            } else if distance < second {
                second = distance;
            }
        }
        (nearest, second)
    }

    /// Edge-emphasis value around `[-1, 1]`; not strictly bounded.
    pub fn query(&self, nx: f64, ny: f64, phase: f64) -> f64 {
        let (nearest, second) = self.nearest_two(nx, ny);
        if !second.is_finite() {
            return -1.0;
        }
        let combined = (second - nearest) * 10.0 + (phase * 100.0).sin();
        combined * 0.5 - 0.5
    }
}

fn reflect(position: &mut f64, velocity: &mut f64) {
    if *position < 0.0 {
        *position = 0.0;
        *velocity = velocity.abs();
    } else if *position > 1.0 {
        *position = 1.0;
        *velocity = -velocity.abs();
    }
}
