// Lucky Draw Engine - Winner selection
use rand::{seq::SliceRandom, Rng};

/// Pick `count` distinct entries of `pool` uniformly at random.
///
/// Runs a partial Fisher-Yates shuffle over a copy of the pool, so the input
/// is never reordered. `count` is clamped to the pool size.
pub fn select_winners<T: Clone, R: Rng + ?Sized>(pool: &[T], count: usize, rng: &mut R) -> Vec<T> {
    let count = count.min(pool.len());
    if count == 0 {
        return Vec::new();
    }

    let mut candidates = pool.to_vec();
    let (chosen, _) = candidates.partial_shuffle(rng, count);
    chosen.to_vec()
}
