//! Inner fitness refinement: a nested evolutionary loop over a single
//! tree's constant vector (spec §4.8).

use crate::Scalar;
use crate::config::Parameters;
use crate::node::{Pool, Root, ops};
use crate::rng::uniform;
use rand::Rng;

struct Candidate {
    values: Vec<Scalar>,
    score: Scalar,
}

fn subsample<'a>(
    rng: &mut impl Rng,
    data: &'a [(Vec<Scalar>, Scalar)],
    fraction: f64,
) -> Vec<&'a (Vec<Scalar>, Scalar)> {
    let want = ((data.len() as f64 * fraction).round() as usize)
        .clamp(1, data.len());
    crate::rng::random_permutation(rng, data.len())
        .into_iter()
        .take(want)
        .map(|i| &data[i])
        .collect()
}

fn score_with_values(
    pool: &Pool,
    root_id: crate::node::NodeId,
    constants: &[crate::node::NodeId],
    values: &[Scalar],
    data: &[&(Vec<Scalar>, Scalar)],
    params: &Parameters,
) -> Scalar {
    for (&c, &v) in constants.iter().zip(values) {
        pool.set_value(c, crate::node::Value::of(v));
    }
    if data.is_empty() {
        return Scalar::INFINITY;
    }
    let clamp = |v: Scalar| {
        if params.use_rms_clamp {
            v.clamp(params.min_rms_clamp, params.max_rms_clamp)
        } else {
            v
        }
    };
    let mut sum = 0.0;
    for (inputs, target) in data {
        let predicted = clamp(ops::compute(pool, root_id, inputs));
        let actual = clamp(*target);
        if predicted.is_nan() || actual.is_nan() {
            return Scalar::INFINITY;
        }
        let diff = predicted - actual;
        sum += diff * diff;
    }
    let mean = sum / data.len() as Scalar;
    if mean.is_nan() {
        Scalar::INFINITY
    } else if params.use_sqrt_rms {
        mean.sqrt()
    } else {
        mean
    }
}

/// Multiplicatively jitter each finite constant with probability
/// `change_chance`, up to ±50% (spec §4.8 candidate generation).
fn mutate_change_vector(rng: &mut impl Rng, base: &[Scalar], change_chance: f64) -> Vec<Scalar> {
    base.iter()
        .map(|&v| {
            if v.is_finite() && crate::rng::chance(rng, change_chance) {
                v * (1.0 + (uniform(rng) - 0.5))
            } else {
                v
            }
        })
        .collect()
}

/// Uniform crossover of two parent vectors with a single shared threshold
/// `r`, guaranteeing at least one position is drawn from `a` (spec §4.8).
fn mutate_cross(rng: &mut impl Rng, a: &[Scalar], b: &[Scalar]) -> Vec<Scalar> {
    let r = uniform(rng);
    let mut took_a = false;
    let mut out: Vec<Scalar> = a
        .iter()
        .zip(b)
        .map(|(&av, &bv)| {
            if uniform(rng) <= r {
                took_a = true;
                av
            } else {
                bv
            }
        })
        .collect();
    if !took_a && !out.is_empty() {
        let idx = crate::rng::random_int(rng, out.len() - 1);
        out[idx] = a[idx];
    }
    out
}

/// Refine `root`'s constant leaves in place against a random subsample of
/// `data`. Returns the refined RMS score. A no-op (returning `root.score`
/// unchanged) when the tree has at most one constant.
pub fn refine(root: &mut Root, data: &[(Vec<Scalar>, Scalar)], params: &Parameters, rng: &mut impl Rng) -> Scalar {
    let list = ops::list_of_nodes(root.pool(), root.root());
    let constants = list.constants;
    if constants.len() <= 1 {
        return root.score;
    }

    let sample = subsample(rng, data, params.fitness.sample_ratio);
    let fit = &params.fitness;

    let base: Vec<Scalar> = constants.iter().map(|&c| root.pool().value(c).scalar).collect();
    let mut pool_candidates = vec![Candidate {
        values: base.clone(),
        score: 0.0,
    }];
    for _ in 1..fit.population_size {
        pool_candidates.push(Candidate {
            values: mutate_change_vector(rng, &base, fit.change_chance),
            score: 0.0,
        });
    }
    for c in &mut pool_candidates {
        c.score = score_with_values(root.pool(), root.root(), &constants, &c.values, &sample, params);
    }
    pool_candidates.sort_by(|a, b| a.score.total_cmp(&b.score));

    let cutoff = ((fit.population_size as f64 * fit.survival_ratio).round() as usize)
        .clamp(1, fit.population_size);

    for _ in 0..fit.iteration_count {
        for i in cutoff..pool_candidates.len() {
            let a_idx = crate::rng::random_int(rng, cutoff - 1);
            let mut b_idx = crate::rng::random_int(rng, cutoff.saturating_sub(2).max(0));
            if b_idx >= a_idx {
                b_idx += 1;
            }
            let b_idx = b_idx.min(cutoff - 1);
            let crossed = mutate_cross(rng, &pool_candidates[a_idx].values, &pool_candidates[b_idx].values);
            let jittered = mutate_change_vector(rng, &crossed, fit.change_chance);
            let score = score_with_values(root.pool(), root.root(), &constants, &jittered, &sample, params);
            pool_candidates[i] = Candidate {
                values: jittered,
                score,
            };
        }
        pool_candidates.sort_by(|a, b| a.score.total_cmp(&b.score));
    }

    let winner = &pool_candidates[0];
    for (&c, &v) in constants.iter().zip(&winner.values) {
        root.pool().set_value(c, crate::node::Value::of(v));
    }
    winner.score
}
