use log::debug;
use rand::Rng;

pub const CELLULAR_COLS: usize = 40;
pub const CELLULAR_ROWS: usize = 30;
const SEED_DENSITY: f64 = 0.4;
const STEP_PERIOD: i64 = 30;

/// Game of Life on a fixed 40x30 board, independent of the render grid.
///
/// Edges do not wrap; neighbors outside the board count as dead.
#[derive(Debug, Clone)]
pub struct CellularAutomaton {
    cells: Vec<bool>,
    next: Vec<bool>,
    generation: u64,
}

impl CellularAutomaton {
    pub fn new() -> Self {
        Self {
            cells: vec![false; CELLULAR_COLS * CELLULAR_ROWS],
            next: vec![false; CELLULAR_COLS * CELLULAR_ROWS],
            generation: 0,
        }
    }

    pub fn from_cells(cells: &[bool]) -> Self {
        let mut automaton = Self::new();
        for (slot, alive) in automaton.cells.iter_mut().zip(cells) {
            *slot = *alive;
        }
        automaton
    }

    pub fn reseed<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        for cell in &mut self.cells {
            *cell = rng.gen_bool(SEED_DENSITY);
        }
        self.generation = 0;
        debug!(
            "cellular reseeded with {} live cells",
            self.cells.iter().filter(|alive| **alive).count()
        );
    }

    pub fn clear(&mut self) {
        self.cells.fill(false);
        self.generation = 0;
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn live_count(&self) -> usize {
        self.cells.iter().filter(|alive| **alive).count()
    }

    pub fn is_alive(&self, x: i64, y: i64) -> bool {
        if x < 0 || y < 0 || x >= CELLULAR_COLS as i64 || y >= CELLULAR_ROWS as i64 {
            return false;
        }
        self.cells[y as usize * CELLULAR_COLS + x as usize]
    }

    pub fn set(&mut self, x: usize, y: usize, alive: bool) {
        if x < CELLULAR_COLS && y < CELLULAR_ROWS {
            self.cells[y * CELLULAR_COLS + x] = alive;
        }
    }

    fn live_neighbors(&self, x: i64, y: i64) -> u8 {
        let mut count = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if (dx != 0 || dy != 0) && self.is_alive(x + dx, y + dy) {
                    count += 1;
                }
            }
        }
        count
    }

    /// One generation, written to the back buffer and swapped in.
    pub fn step(&mut self) {
        for y in 0..CELLULAR_ROWS {
            for x in 0..CELLULAR_COLS {
                let neighbors = self.live_neighbors(x as i64, y as i64);
                let alive = self.cells[y * CELLULAR_COLS + x];
                self.next[y * CELLULAR_COLS + x] =
                    matches!((alive, neighbors), (true, 2) | (true, 3) | (false, 3));
            }
        }
        std::mem::swap(&mut self.cells, &mut self.next);
        self.generation += 1;
    }

    /// `+1` for a live cell and `-1` for a dead one at normalized `(nx, ny)`.
    pub fn query(&self, nx: f64, ny: f64) -> f64 {
        let x = (nx * CELLULAR_COLS as f64).floor();
        let y = (ny * CELLULAR_ROWS as f64).floor();
        if !x.is_finite() || !y.is_finite() {
            return -1.0;
        }
        if self.is_alive(x as i64, y as i64) {
            1.0
        } else {
            -1.0
        }
    }
}

impl Default for CellularAutomaton {
    fn default() -> Self {
        Self::new()
    }
}

/// The automaton only advances on frames where `floor(phase * 100) % 30 == 0`.
pub fn step_due(time: f64, speed: f64) -> bool {
    let tick = (time * speed * 100.0).floor();
    tick.is_finite() && (tick as i64).rem_euclid(STEP_PERIOD) == 0
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::{step_due, CellularAutomaton, CELLULAR_COLS, CELLULAR_ROWS};

    #[test]
    fn dead_cell_with_three_neighbors_is_born() {
        let mut life = CellularAutomaton::new();
        life.set(4, 4, true);
        life.set(5, 4, true);
        life.set(6, 4, true);
        life.step();
        assert!(life.is_alive(5, 3));
        assert!(life.is_alive(5, 5));
        assert!(life.is_alive(5, 4));
        assert!(!life.is_alive(4, 4));
        assert!(!life.is_alive(6, 4));
    }

    #[test]
    fn live_cell_with_one_neighbor_dies() {
        let mut life = CellularAutomaton::new();
        life.set(10, 10, true);
        life.set(11, 10, true);
        life.step();
        assert_eq!(life.live_count(), 0);
    }

    #[test]
    fn live_cell_with_three_neighbors_survives() {
        let mut life = CellularAutomaton::new();
        for (x, y) in [(1, 1), (2, 1), (1, 2), (2, 2)] {
            life.set(x, y, true);
        }
        life.step();
        assert_eq!(life.live_count(), 4);
        assert!(life.is_alive(1, 1));
    }

    #[test]
    fn empty_board_stays_empty() {
        let mut life = CellularAutomaton::new();
        life.step();
        assert_eq!(life.live_count(), 0);
        assert_eq!(life.generation(), 1);
    }

    #[test]
    fn reseed_is_deterministic_for_a_seeded_rng() {
        let mut first = CellularAutomaton::new();
        let mut second = CellularAutomaton::new();
        first.reseed(&mut StdRng::seed_from_u64(9));
        second.reseed(&mut StdRng::seed_from_u64(9));

        let total = CELLULAR_COLS * CELLULAR_ROWS;
        assert_eq!(first.live_count(), second.live_count());
        assert!(first.live_count() > total / 5 && first.live_count() < total * 3 / 5);
    }

    #[test]
    fn query_outside_board_reads_dead() {
        let mut life = CellularAutomaton::new();
        life.set(0, 0, true);
        assert_eq!(life.query(0.0, 0.0), 1.0);
        assert_eq!(life.query(1.0, 0.0), -1.0);
        assert_eq!(life.query(-0.2, 0.5), -1.0);
        assert_eq!(life.query(f64::NAN, 0.5), -1.0);
    }

    #[test]
    fn step_gate_fires_every_thirty_ticks() {
        assert!(step_due(0.0, 0.01));
        assert!(!step_due(1.0, 0.01));
        assert!(step_due(30.0, 0.01));
        assert!(step_due(30.5, 0.01));
        assert!(!step_due(31.0, 0.01));
    }
}
