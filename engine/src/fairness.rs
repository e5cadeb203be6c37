//! Bad-luck protection: the per-bracket weight tables, the weighted draw,
//! and the post-assignment feedback that nudges weights around.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use tokio::sync::Mutex;

use booking::model::Bracket;
use booking::store::FairnessStore;
use gateway::UserId;

use crate::settings::FairnessTuning;

/// Serialized access to one instance's weight tables.
///
/// Every read-modify-write cycle runs under the handle's mutex, so two
/// bookings resolving at the same time cannot lose each other's updates.
pub struct FairnessHandle {
    store: Arc<dyn FairnessStore>,
    instance: String,
    guard: Mutex<()>,
}

impl FairnessHandle {
    pub fn new(store: Arc<dyn FairnessStore>, instance: String) -> Self {
        Self {
            store,
            instance,
            guard: Mutex::new(()),
        }
    }

    /// Current table contents. Unrecorded users are implicitly weight 1.
    pub async fn snapshot(&self, bracket: Bracket) -> anyhow::Result<HashMap<UserId, f64>> {
        let _g = self.guard.lock().await;
        self.store.load(&self.instance, bracket).await
    }

    /// Atomically load, mutate and persist the table for `bracket`.
    pub async fn adjust<F, T>(&self, bracket: Bracket, mutate: F) -> anyhow::Result<T>
    where
        F: FnOnce(&mut HashMap<UserId, f64>) -> T,
    {
        let _g = self.guard.lock().await;
        let mut table = self.store.load(&self.instance, bracket).await?;
        let out = mutate(&mut table);
        self.store.save(&self.instance, bracket, &table).await?;
        Ok(out)
    }

    pub async fn set_weight(
        &self,
        bracket: Bracket,
        user: UserId,
        value: f64,
    ) -> anyhow::Result<()> {
        self.adjust(bracket, |table| {
            table.insert(user, value);
        })
        .await
    }
}

/// Weight used for sampling. Negative weights are floored at 0.1 rather
/// than excluded, so a heavily-penalized booster keeps a nonzero chance.
/// An exact zero stays zero.
pub fn sampling_weight(w: f64) -> f64 {
    if w < 0.0 { 0.1 } else { w }
}

/// Single weighted draw over `candidates`. Users missing from `weights`
/// count as weight 1. Falls back to a uniform draw if every sampling
/// weight is zero.
pub fn weighted_draw<R: Rng>(
    rng: &mut R,
    candidates: &[UserId],
    weights: &HashMap<UserId, f64>,
) -> Option<UserId> {
    if candidates.is_empty() {
        return None;
    }

    let sampled: Vec<f64> = candidates
        .iter()
        .map(|u| sampling_weight(weights.get(u).copied().unwrap_or(1.0)))
        .collect();

    match WeightedIndex::new(&sampled) {
        Ok(dist) => Some(candidates[dist.sample(rng)]),
        Err(_) => Some(candidates[rng.gen_range(0..candidates.len())]),
    }
}

/// After a big enough win, pull the winner's weight down and push every
/// other reactor's up, proportionally to the cut. Returns whether an
/// adjustment happened.
pub fn apply_big_win_feedback(
    table: &mut HashMap<UserId, f64>,
    reactors: &[UserId],
    winner: UserId,
    cut: i64,
    tuning: &FairnessTuning,
) -> bool {
    if cut <= tuning.big_win_threshold {
        return false;
    }

    let delta = cut as f64 * tuning.modifier;
    let precision = 10f64.powi(tuning.weight_decimals as i32);
    let round_to = |v: f64| (v * precision).round() / precision;

    for user in reactors {
        let entry = table.entry(*user).or_insert(1.0);
        *entry = round_to(if *user == winner {
            *entry - delta
        } else {
            *entry + delta
        });
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn draw_converges_to_normalized_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        let candidates = vec![1u64, 2, 3];
        let mut weights = HashMap::new();
        weights.insert(1u64, 1.0);
        weights.insert(2u64, 3.0);
        // User 3 is unseen: implicit weight 1.

        let trials = 50_000;
        let mut counts: HashMap<UserId, u32> = HashMap::new();
        for _ in 0..trials {
            let winner = weighted_draw(&mut rng, &candidates, &weights).unwrap();
            *counts.entry(winner).or_default() += 1;
        }

        let share = |u: UserId| counts[&u] as f64 / trials as f64;
        assert!((share(1) - 0.2).abs() < 0.02);
        assert!((share(2) - 0.6).abs() < 0.02);
        assert!((share(3) - 0.2).abs() < 0.02);
    }

    #[test]
    fn negative_weight_samples_as_a_tenth() {
        let mut rng = StdRng::seed_from_u64(11);
        let candidates = vec![1u64, 2];
        let mut weights = HashMap::new();
        weights.insert(1u64, -5.0); // sampled as 0.1
        weights.insert(2u64, 0.9);

        let trials = 50_000;
        let mut hits = 0u32;
        for _ in 0..trials {
            if weighted_draw(&mut rng, &candidates, &weights).unwrap() == 1 {
                hits += 1;
            }
        }

        // 0.1 / (0.1 + 0.9) = 10%, not 0% and not the literal negative.
        let share = hits as f64 / trials as f64;
        assert!((share - 0.1).abs() < 0.02, "share was {share}");
    }

    #[test]
    fn zero_weight_is_not_floored() {
        assert_eq!(sampling_weight(0.0), 0.0);
        assert_eq!(sampling_weight(-0.0001), 0.1);
        assert_eq!(sampling_weight(2.5), 2.5);
    }

    #[test]
    fn all_zero_weights_fall_back_to_uniform() {
        let mut rng = StdRng::seed_from_u64(3);
        let candidates = vec![1u64, 2];
        let mut weights = HashMap::new();
        weights.insert(1u64, 0.0);
        weights.insert(2u64, 0.0);

        // Must still pick somebody.
        assert!(weighted_draw(&mut rng, &candidates, &weights).is_some());
    }

    #[test]
    fn feedback_moves_winner_down_and_others_up() {
        let tuning = FairnessTuning::default();
        let mut table = HashMap::new();
        table.insert(1u64, 1.0);

        let reactors = vec![1u64, 2, 3];
        let adjusted = apply_big_win_feedback(&mut table, &reactors, 1, 500_000, &tuning);
        assert!(adjusted);

        // delta = 500_000 * 1e-7 = 0.05
        assert_eq!(table[&1], 0.95);
        assert_eq!(table[&2], 1.05);
        assert_eq!(table[&3], 1.05);
    }

    #[test]
    fn feedback_skips_small_wins() {
        let tuning = FairnessTuning::default();
        let mut table = HashMap::new();
        table.insert(1u64, 1.0);

        let adjusted = apply_big_win_feedback(&mut table, &[1, 2], 1, 100_000, &tuning);
        assert!(!adjusted);
        assert_eq!(table[&1], 1.0);
        assert!(!table.contains_key(&2));
    }

    #[test]
    fn feedback_rounds_to_configured_decimals() {
        let tuning = FairnessTuning {
            big_win_threshold: 0,
            modifier: 0.000_000_123,
            weight_decimals: 5,
        };
        let mut table = HashMap::new();
        // delta = 1_000_000 * 1.23e-7 = 0.123 exactly at 5 decimals
        apply_big_win_feedback(&mut table, &[1, 2], 1, 1_000_000, &tuning);
        assert!((table[&1] - 0.877).abs() < 1e-9);
        assert!((table[&2] - 1.123).abs() < 1e-9);
    }
}
