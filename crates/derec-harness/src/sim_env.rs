//! Virtual-time Environment implementation for deterministic testing.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use derec_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Simulation environment with a manual clock and seeded RNG.
///
/// - **Virtual Time**: `now()` is a fixed origin plus the total passed to
///   [`SimEnv::advance`]. Nothing moves it otherwise.
/// - **Seeded RNG**: `random_bytes()` draws from a `ChaCha20Rng`, so a seed
///   reproduces a run exactly.
///
/// Clones share the clock and the RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    origin: Instant,
    elapsed: Arc<Mutex<Duration>>,
    rng: Arc<Mutex<ChaCha20Rng>>,
}

impl SimEnv {
    /// Create a SimEnv with the default seed (0)
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Create a SimEnv with a specific seed
    pub fn with_seed(seed: u64) -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
        }
    }

    /// Move the clock forward by `duration`
    pub fn advance(&self, duration: Duration) {
        *lock(&self.elapsed) += duration;
    }

    /// Virtual time passed since creation
    pub fn elapsed(&self) -> Duration {
        *lock(&self.elapsed)
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        lock(&self.rng).fill_bytes(buffer);
    }
}

/// The simulation is single threaded; a poisoned lock still holds valid data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
