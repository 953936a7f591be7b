use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::{rngs::StdRng, Rng, SeedableRng};

/// Upper bound (inclusive) of generated seeds.
pub const MAX_SEED: u64 = 1_000_000_000;

/// Produces a seed when the caller did not pass one.
pub trait SeedSource: Send + Sync {
    /// Return the seed for the next augmentation run.
    fn seed(&self) -> u64;
}

impl<F> SeedSource for F
where
    F: Fn() -> u64 + Send + Sync,
{
    fn seed(&self) -> u64 {
        self()
    }
}

/// Derives seeds from the wall clock, so unseeded runs differ.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeSeedSource;

static CALLS: AtomicU64 = AtomicU64::new(0);

impl SeedSource for TimeSeedSource {
    fn seed(&self) -> u64 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        // two calls within the clock resolution still get different streams
        let call = CALLS.fetch_add(1, Ordering::Relaxed);
        let mut rng = StdRng::seed_from_u64(nanos ^ call.rotate_left(32));
        rng.random_range(0..=MAX_SEED)
    }
}

/// Always returns the same seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSeed(pub u64);

impl SeedSource for FixedSeed {
    fn seed(&self) -> u64 {
        self.0
    }
}
