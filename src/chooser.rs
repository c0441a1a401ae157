use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Which neighbor a player throws the potato to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Random source owned by a single process, injected into the state machines.
pub struct Chooser<R: Rng + ?Sized> {
    pub rng: Box<R>,
}

impl Chooser<SmallRng> {
    pub fn new(seed: &[u8; 32]) -> Self {
        Self {
            rng: Box::new(SmallRng::from_seed(*seed)),
        }
    }

    /// Function that seeds a chooser from this process' identity and the clock.
    pub fn for_process() -> Self {
        Self::new(&process_seed())
    }

    pub fn from_u64(seed: u64) -> Self {
        Self {
            rng: Box::new(SmallRng::seed_from_u64(seed)),
        }
    }
}

impl<R: Rng + ?Sized> Chooser<R> {
    /// Function that flips a fair coin between the two neighbors.
    pub fn side(&mut self) -> Side {
        if self.rng.random_bool(0.5) {
            Side::Left
        } else {
            Side::Right
        }
    }

    /// Function that picks a slot uniformly in `0..ring_size`.
    pub fn slot(&mut self, ring_size: usize) -> usize {
        self.rng.random_range(0..ring_size)
    }
}

/// Function that derives a seed that differs between concurrently started processes.
pub fn process_seed() -> [u8; 32] {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos())
        .unwrap_or_default();

    let mut seed = [0u8; 32];
    seed[..16].copy_from_slice(&nanos.to_le_bytes());
    seed[16..20].copy_from_slice(&std::process::id().to_le_bytes());
    // rest comes from the OS
    rand::rng().fill(&mut seed[20..]);
    seed
}
