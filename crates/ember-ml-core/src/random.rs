use rand::rngs::StdRng;
use rand::SeedableRng;

/// Build a generator from an optional seed.
///
/// Every source of randomness in the workspace (weight initialization,
/// shuffling, k-means seeding, bootstrap resampling, dropout masks) routes
/// through this single point: a supplied seed yields exact run-to-run
/// reproducibility, `None` draws fresh entropy.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}
