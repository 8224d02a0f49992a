//! Random source: uniform draws, Bernoulli trials, bounded integers, and
//! permutations. Every evolutionary operator in this crate takes an `&mut
//! impl Rng` rather than reaching for a thread-local, so tests can seed a
//! reproducible generator.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;

/// Construct a small, fast, non-cryptographic RNG seeded from the OS.
/// Used by the CLI and outer loop; tests seed their own via
/// `SmallRng::seed_from_u64`.
pub fn default_rng() -> SmallRng {
    SmallRng::from_os_rng()
}

/// Uniform draw in `[0, 1)`.
pub fn uniform(rng: &mut impl Rng) -> f64 {
    rng.random::<f64>()
}

/// Bernoulli trial: `true` with probability `percent` (expressed in `[0,
/// 1]`, not percent-as-100 despite the name inherited from the original
/// `Random::chance(double percent)`).
pub fn chance(rng: &mut impl Rng, percent: f64) -> bool {
    uniform(rng) < percent
}

/// Uniform integer in `[0, max_len]` inclusive, matching the original
/// `Random::randomInt(int maxLength)` which is inclusive of its bound.
pub fn random_int(rng: &mut impl Rng, max_len: usize) -> usize {
    rng.random_range(0..=max_len)
}

/// Identity permutation `[0, 1, ..., max_len)`.
pub fn default_permutation(max_len: usize) -> Vec<usize> {
    (0..max_len).collect()
}

/// A uniformly random permutation of `[0, max_len)`.
pub fn random_permutation(rng: &mut impl Rng, max_len: usize) -> Vec<usize> {
    let mut perm = default_permutation(max_len);
    perm.shuffle(rng);
    perm
}
