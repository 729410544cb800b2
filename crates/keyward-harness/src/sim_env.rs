//! Deterministic environment for simulation.
//!
//! Randomness comes from a seeded `ChaCha20Rng`; the wall clock only moves
//! when a test moves it. Clones share both, so a KDC, a server and a client
//! built from one `SimEnv` see the same clock and draw from one stream.

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, Ordering},
};

use keyward_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Wall clock every fresh `SimEnv` starts at (2023-11-14T22:13:20Z).
pub const SIM_EPOCH_SECS: u64 = 1_700_000_000;

/// Simulation environment: seeded RNG plus a settable wall clock.
#[derive(Debug, Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock: Arc<AtomicU64>,
}

impl SimEnv {
    /// Environment with seed 0.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment whose random stream is fully determined by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock: Arc::new(AtomicU64::new(SIM_EPOCH_SECS)),
        }
    }

    /// Environment with its own clock that shares this one's RNG.
    ///
    /// Used to model a peer whose clock has drifted.
    pub fn with_independent_clock(&self, now: u64) -> Self {
        Self { rng: Arc::clone(&self.rng), clock: Arc::new(AtomicU64::new(now)) }
    }

    /// Set the wall clock.
    pub fn set_wall_clock(&self, secs: u64) {
        self.clock.store(secs, Ordering::SeqCst);
    }

    /// Move the wall clock forward.
    pub fn advance(&self, secs: u64) {
        self.clock.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn wall_clock_secs(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        // Poisoning leaves the RNG state intact
        let mut rng = self.rng.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        rng.fill_bytes(buffer);
    }
}
