use rand::distr::Alphanumeric;
use rand::{rng, rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;

/// Pseudorandom stream owned by a single simulation.
///
/// Seeded once at construction; when no seed is given one is drawn from the
/// thread RNG and kept so the run can be replayed.
#[derive(Debug, Clone)]
pub struct SimRng {
    inner: StdRng,
    seed: u64,
}

impl SimRng {
    pub fn new(seed: Option<u64>) -> Self {
        let seed = seed.unwrap_or_else(|| rng().random());
        Self {
            inner: StdRng::seed_from_u64(seed),
            seed,
        }
    }

    /// Seed this stream was created from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform draw in `[0, 1)`.
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.inner.random::<f64>()
    }

    /// Uniform heading in `[-pi, pi)`.
    #[inline]
    pub fn angle(&mut self) -> f64 {
        (self.uniform() - 0.5) * 2.0 * PI
    }

    /// Random alphanumeric token, e.g. for naming diagnostic dumps.
    pub fn token(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(self.inner.sample(Alphanumeric)))
            .collect()
    }
}
