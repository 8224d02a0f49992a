//! `Root`: one expression tree plus its score, complexity, cached form, and
//! the pool that backs it (spec §3 "Root wrapper").

use super::ops::{self, free_all, random_operator};
use super::pool::Pool;
use super::{NodeId, mutate};
use crate::Scalar;
use crate::config::{ComplexityEntry, Parameters};
use crate::op::Kind;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};

/// One individual in the population: a tree, its own arena, and the scalar
/// bookkeeping the outer loop reads and writes each generation.
pub struct Root {
    pool: Pool,
    root: NodeId,
    /// Sorting key for the current phase: equal to `raw_score` except
    /// between the parsimony reweight and the next full rescoring, when it
    /// holds the weighted value instead (spec §4.6, §4.7 step 7).
    pub score: Scalar,
    /// Unweighted RMS score as of the last `score_against` call. Unlike
    /// `score`, parsimony reweighting never touches this field, so
    /// termination and logging always read the true accuracy figure.
    pub raw_score: Scalar,
    pub complexity: Scalar,
    form: String,
    /// Set by the dispatcher once this slot's work for the current phase
    /// is done (spec §4.10); cleared before each new phase dispatch.
    complete: AtomicBool,
}

impl Root {
    /// Build a random tree: one random operator, then three `mutate_add`
    /// steps, matching the outer loop's initial-population recipe (§4.7).
    pub fn random(rng: &mut impl Rng, params: &Parameters, num_vars: usize) -> Self {
        let pool = Pool::new();
        let mut root = random_operator(
            &pool,
            rng,
            &params.operator_functions,
            num_vars,
            params.constant_chance,
        );
        mutate::mutate_add(&pool, &mut root, rng, params, num_vars, 3);
        let form = ops::form(&pool, root);
        Root {
            pool,
            root,
            score: Scalar::INFINITY,
            raw_score: Scalar::INFINITY,
            complexity: params.default_complexity,
            form,
            complete: AtomicBool::new(false),
        }
    }

    /// Parse `expr` as a tree; `None` on any parse failure (caller falls
    /// back to [`Root::random`], per spec §4.7's slot-0 recipe).
    pub fn from_expr(expr: &str) -> Option<Self> {
        let pool = Pool::new();
        let root = crate::parser::parse(&pool, expr).ok()?;
        let form = ops::form(&pool, root);
        Some(Root {
            pool,
            root,
            score: Scalar::INFINITY,
            raw_score: Scalar::INFINITY,
            complexity: 0.0,
            form,
            complete: AtomicBool::new(false),
        })
    }

    /// Apply the top-level mutation dispatcher to this tree in place
    /// (spec §4.5), then refresh the cached form string.
    pub fn mutate(&mut self, rng: &mut impl Rng, params: &Parameters, num_vars: usize, k: usize) {
        mutate::mutate(&self.pool, &mut self.root, rng, params, num_vars, k);
        self.refresh_form();
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
    pub fn root(&self) -> NodeId {
        self.root
    }
    pub fn form(&self) -> &str {
        &self.form
    }
    pub fn refresh_form(&mut self) {
        self.form = ops::form(&self.pool, self.root);
    }

    pub fn is_complete(&self) -> bool {
        self.complete.load(Ordering::Acquire)
    }
    pub fn clear_complete(&self) {
        self.complete.store(false, Ordering::Release);
    }
    pub fn mark_complete(&self) {
        self.complete.store(true, Ordering::Release);
    }

    pub fn compute(&self, vars: &[Scalar]) -> Scalar {
        ops::compute(&self.pool, self.root, vars)
    }

    pub fn string(&self, decimal_places: i32) -> String {
        ops::string(&self.pool, self.root, decimal_places)
    }

    /// RMS score over `samples` (spec §4.6). `samples` rows are
    /// `(inputs, target)`; both prediction and target are clamped to
    /// `[min_rms_clamp, max_rms_clamp]` when `use_rms_clamp` is set. Any
    /// `NaN` intermediate collapses the whole score to `+∞`.
    pub fn score_against(&mut self, samples: &[(Vec<Scalar>, Scalar)], params: &Parameters) {
        if samples.is_empty() {
            self.score = Scalar::INFINITY;
            self.raw_score = Scalar::INFINITY;
            return;
        }
        let clamp = |v: Scalar| {
            if params.use_rms_clamp {
                v.clamp(params.min_rms_clamp, params.max_rms_clamp)
            } else {
                v
            }
        };
        let mut sum = 0.0;
        for (inputs, target) in samples {
            let predicted = clamp(self.compute(inputs));
            let actual = clamp(*target);
            if predicted.is_nan() || actual.is_nan() {
                self.score = Scalar::INFINITY;
                self.raw_score = Scalar::INFINITY;
                return;
            }
            let diff = predicted - actual;
            sum += diff * diff;
        }
        let mean = sum / samples.len() as Scalar;
        let rms = if mean.is_nan() {
            Scalar::INFINITY
        } else if params.use_sqrt_rms {
            mean.sqrt()
        } else {
            mean
        };
        self.score = rms;
        self.raw_score = rms;
    }

    /// Structural complexity (spec §4.6): leaves are 0; an operator node is
    /// its children's complexity plus the best-matching `table_entry`, or
    /// `default_complexity` when no entry matches.
    pub fn recompute_complexity(&mut self, weights: &std::collections::HashMap<Kind, Vec<ComplexityEntry>>, default_complexity: Scalar) {
        self.complexity = ops::complexity_of(&self.pool, self.root, weights, default_complexity);
    }

    /// Free every node in this tree and install `new_root` in its place.
    /// Used when the outer loop replaces a slot's tree wholesale
    /// (`repopulate`) or installs a simplifier's result.
    pub fn replace_tree(&mut self, new_root: NodeId) {
        free_all(&self.pool, self.root);
        self.root = new_root;
        self.refresh_form();
    }

    /// Install `new_root` without freeing the old tree. Used when the new
    /// root *is* (part of) the old tree, as after `simplify_to_fixed_point`
    /// (which already frees whatever it supersedes internally).
    pub fn set_root(&mut self, new_root: NodeId) {
        self.root = new_root;
        self.refresh_form();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn random_root_scores_as_finite_after_scoring() {
        let mut rng = SmallRng::seed_from_u64(5);
        let params = Parameters::default();
        let mut root = Root::random(&mut rng, &params, 1);
        root.score_against(&[(vec![1.0], 2.0), (vec![2.0], 4.0)], &params);
        assert!(root.score.is_finite() || root.score.is_infinite());
    }

    #[test]
    fn leaf_complexity_is_zero() {
        let mut root = Root::from_expr("var0").unwrap();
        let weights = std::collections::HashMap::new();
        root.recompute_complexity(&weights, 1.0);
        assert_eq!(root.complexity, 0.0);
    }

    #[test]
    fn operator_complexity_falls_back_to_default_when_no_entry_matches() {
        let mut root = Root::from_expr("add(var0, var0)").unwrap();
        let weights = std::collections::HashMap::new();
        root.recompute_complexity(&weights, 2.5);
        assert_eq!(root.complexity, 2.5);
    }
}
