use rand::Rng;

use crate::node::NodeRecord;

/// Exploration constant, `sqrt(2)`.
pub fn exploration_constant() -> f64 {
    std::f64::consts::SQRT_2
}

/// Smallest positive normal `f64`, used throughout to avoid division by
/// zero without biasing unvisited children toward infinity.
pub fn epsilon() -> f64 {
    f64::MIN_POSITIVE
}

/// Stochastic UCT score used during selection. Lower measured runtime is a
/// *better* outcome, so the parent/child average-value difference is
/// subtracted (not added) before the exploration bonus: a child whose
/// average is below its parent's scores higher.
pub fn uct(parent: &NodeRecord, child: &NodeRecord, rng: &mut impl Rng) -> f64 {
    let eps = epsilon();
    let c = exploration_constant();

    let parent_avg = parent.value / (parent.visits as f64 + eps);
    let child_avg = child.value / (child.visits as f64 + eps);
    let value = parent_avg - child_avg;

    let jitter: f64 = rng.gen_range(0.0..1.0);
    let bonus = eps * jitter;

    value / (child.visits as f64 + eps)
        + bonus
        + c * ((parent.visits as f64 + 1.0).ln() / (child.visits as f64 + eps)).sqrt()
}

/// Deterministic variant used for the best-assignment readout: no jitter,
/// no epsilon smoothing, and children with zero visits score 0 rather than
/// being divided by near-zero.
pub fn uct_deterministic(parent: &NodeRecord, child: &NodeRecord) -> f64 {
    if child.visits == 0 {
        return 0.0;
    }
    let c = exploration_constant();
    let parent_avg = if parent.visits == 0 { 0.0 } else { parent.value / parent.visits as f64 };
    let child_avg = child.value / child.visits as f64;
    let value = parent_avg - child_avg;

    value / child.visits as f64
        + c * (((parent.visits as f64) + 1.0).ln() / (child.visits as f64)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(value: f64, visits: u64) -> NodeRecord {
        NodeRecord { assignments: vec![], children: None, value, visits }
    }

    #[test]
    fn lower_average_runtime_scores_higher() {
        let mut rng = rand::thread_rng();
        let parent = node(100.0, 10);
        let fast_child = node(1.0, 5);
        let slow_child = node(50.0, 5);
        // Average out jitter by comparing many draws.
        let fast: f64 = (0..100).map(|_| uct(&parent, &fast_child, &mut rng)).sum::<f64>() / 100.0;
        let slow: f64 = (0..100).map(|_| uct(&parent, &slow_child, &mut rng)).sum::<f64>() / 100.0;
        assert!(fast > slow, "fast={fast} slow={slow}");
    }

    #[test]
    fn deterministic_variant_ignores_unvisited_children() {
        let parent = node(100.0, 10);
        let unvisited = node(0.0, 0);
        assert_eq!(uct_deterministic(&parent, &unvisited), 0.0);
    }
}
