//! Outer generational loop (spec §4.7): evolves a population of `Root`
//! trees against a dataset until the best tree's accuracy clears
//! `accuracy_completion` or `generation_count` is exhausted.
//!
//! Parallel phases (repopulate, score, inner fitness refinement, simplify)
//! are striped across `dispatch::dispatch_mut`; sorting, the duplicate
//! sweep, and the population-copy safeguard run on the calling thread, the
//! same split the teacher keeps between its parallel solve passes and its
//! single-threaded bookkeeping.

use crate::Scalar;
use crate::config::Parameters;
use crate::dispatch::{self, dispatch_mut};
use crate::fitness;
use crate::io::csv::Samples;
use crate::node::{NodeId, Pool, Root, ops};
use crate::op::Kind;
use crate::rng::{chance, random_int};
use crate::viz::{LoggingSurface, Surface};
use rand::Rng;
use std::collections::VecDeque;

/// A parsed substitution tree for one variable index (spec §4.6 "variable
/// descriptors"). Lives in its own arena, independent of any root's pool.
struct Descriptor {
    pool: Pool,
    root: NodeId,
}

/// The evolving population plus the dataset and knobs it runs against.
pub struct Engine {
    pub population: Vec<Root>,
    pub samples: Samples,
    pub params: Parameters,
    pub generation: usize,
    pub score_history: VecDeque<Scalar>,
    descriptors: Vec<Option<Descriptor>>,
    surface: Box<dyn Surface>,
}

impl Engine {
    /// Build the initial population (spec §4.7 "Initial state"): slot 0
    /// tries `precalculated_tree`, every other slot (and slot 0 on parse
    /// failure) is `Root::random`. Scores once and sorts ascending.
    pub fn new(params: Parameters, samples: Samples, rng: &mut impl Rng) -> Self {
        let pop_size = params.population_size.max(1);
        let mut population = Vec::with_capacity(pop_size);
        let slot0 = params
            .precalculated_tree
            .as_deref()
            .and_then(Root::from_expr)
            .unwrap_or_else(|| Root::random(rng, &params, samples.num_vars));
        population.push(slot0);
        for _ in 1..pop_size {
            population.push(Root::random(rng, &params, samples.num_vars));
        }

        let descriptors = params
            .variable_descriptors
            .iter()
            .map(|expr| {
                let pool = Pool::new();
                match crate::parser::parse(&pool, expr) {
                    Ok(root) => Some(Descriptor { pool, root }),
                    Err(e) => {
                        log::warn!("variable descriptor {expr:?} failed to parse: {e}");
                        None
                    }
                }
            })
            .collect();

        let mut engine = Engine {
            population,
            samples,
            params,
            generation: 0,
            score_history: VecDeque::new(),
            descriptors,
            surface: Box::new(LoggingSurface),
        };
        engine.score_all();
        engine.sort();
        engine
    }

    fn threads(&self) -> usize {
        dispatch::thread_count(self.params.single_threaded)
    }

    fn sort(&mut self) {
        self.population.sort_by(|a, b| a.score.total_cmp(&b.score));
    }

    /// `round(popSize · survival_ratio)`, used by repopulate and the inner
    /// fitness refinement cutoff (spec §4.7 steps 1 and 4).
    fn cutoff(&self) -> usize {
        ((self.population.len() as f64 * self.params.survival_ratio).round() as usize)
            .clamp(0, self.population.len())
    }

    /// Step 2: score every root against the full dataset, in parallel.
    fn score_all(&mut self) {
        let threads = self.threads();
        let params = &self.params;
        let samples = &self.samples;
        let len = self.population.len();
        dispatch_mut(&mut self.population, 0, len, threads, |_, root| {
            root.clear_complete();
            root.score_against(&samples.rows, params);
            root.mark_complete();
        });
    }

    /// Step 1: replace every tail slot with a crossover of two elites, then
    /// sweep duplicate forms (spec §4.7 step 1).
    fn repopulate(&mut self) {
        let threads = self.threads();
        let cutoff = self.cutoff();
        if cutoff == 0 || cutoff >= self.population.len() {
            return;
        }
        let num_vars = self.samples.num_vars;
        let (elite, tail) = self.population.split_at_mut(cutoff);
        let params = &self.params;
        let tail_len = tail.len();
        dispatch_mut(tail, 0, tail_len, threads, |_, slot| {
            let mut rng = crate::rng::default_rng();
            slot.clear_complete();
            let a_idx = pick_parent(&mut rng, elite.len(), params);
            let b_idx = pick_parent(&mut rng, elite.len(), params);
            let tree_a = &elite[a_idx];
            let tree_b = &elite[b_idx];
            let to = random_node(tree_a.pool(), tree_a.root(), &mut rng);
            let from = random_node(tree_b.pool(), tree_b.root(), &mut rng);
            let new_root = ops::copy_with_graft(
                tree_a.pool(),
                slot.pool(),
                tree_a.root(),
                to,
                tree_b.pool(),
                from,
            );
            slot.replace_tree(new_root);
            if chance(&mut rng, params.mutation_chance) {
                slot.mutate(&mut rng, params, num_vars, params.mutation_count);
            }
            slot.mark_complete();
        });
        self.remove_duplicates(cutoff);
    }

    /// Re-mutate tail slots that share a form with an earlier tail slot,
    /// up to `max_duplicate_removal` passes, stopping as soon as a pass
    /// finds nothing to fix.
    fn remove_duplicates(&mut self, cutoff: usize) {
        let num_vars = self.samples.num_vars;
        let mut rng = crate::rng::default_rng();
        for _ in 0..self.params.max_duplicate_removal {
            let mut seen = std::collections::HashSet::new();
            let mut any_dup = false;
            for i in cutoff..self.population.len() {
                let form = self.population[i].form().to_string();
                if seen.contains(&form) {
                    any_dup = true;
                    self.population[i].mutate(&mut rng, &self.params, num_vars, 3);
                } else {
                    seen.insert(form);
                }
            }
            if !any_dup {
                break;
            }
        }
    }

    /// Step 4: refine the top `cutoff` roots' constants in parallel
    /// (spec §4.8), writing the refined RMS back into both score fields.
    fn refine_top(&mut self) {
        if !self.params.fitness.enabled {
            return;
        }
        let cutoff = self.cutoff();
        if cutoff == 0 {
            return;
        }
        let threads = self.threads();
        let params = &self.params;
        let samples = &self.samples;
        let top = &mut self.population[..cutoff];
        dispatch_mut(top, 0, cutoff, threads, |_, slot| {
            slot.clear_complete();
            let mut rng = crate::rng::default_rng();
            let refined = fitness::refine(slot, &samples.rows, params, &mut rng);
            slot.score = refined;
            slot.raw_score = refined;
            slot.mark_complete();
        });
    }

    /// Step 5: overwrite the last `population_copy_count` slots with fresh
    /// copies of the top-ranked trees, protecting elite diversity against
    /// the simplify pass that follows.
    fn population_copy_safeguard(&mut self) {
        let len = self.population.len();
        let pop_save = self.params.population_copy_count.min(len);
        if pop_save == 0 {
            return;
        }
        if pop_save * 2 > len {
            log::warn!(
                "population_copy_count {pop_save} overlaps the elite half of a population of {len}; proceeding with overlap"
            );
        }
        for s in 0..pop_save {
            let target_idx = len - pop_save + s;
            if target_idx == s {
                continue;
            }
            let new_root = {
                let source = &self.population[s];
                let target_pool = self.population[target_idx].pool();
                ops::copy(source.pool(), target_pool, source.root())
            };
            self.population[target_idx].replace_tree(new_root);
        }
    }

    /// Step 6: simplify every tree to a fixed point, recompute complexity
    /// (folding in the variable-descriptor shadow when configured), and
    /// rescore — all in parallel.
    fn simplify_complexity_score(&mut self) {
        let threads = self.threads();
        let params = &self.params;
        let samples = &self.samples;
        let descriptors = &self.descriptors;
        let len = self.population.len();
        dispatch_mut(&mut self.population, 0, len, threads, |_, slot| {
            slot.clear_complete();
            let new_root = crate::simplify::simplify_to_fixed_point(slot.pool(), slot.root(), params);
            slot.set_root(new_root);
            slot.recompute_complexity(&params.complexity_weights, params.default_complexity);
            if let Some(shadow) = shadow_complexity(slot, descriptors, params) {
                slot.complexity = slot.complexity.min(shadow);
            }
            slot.score_against(&samples.rows, params);
            slot.mark_complete();
        });
    }

    /// Step 7: `score ← a·(score/minScore) + (1−a)·max(0, (complexity −
    /// target)/target)`, where `minScore` is the score at the
    /// `⌊survival_ratio · N⌋`-th rank (spec §4.6).
    fn parsimony_reweight(&mut self) {
        let len = self.population.len();
        if len == 0 {
            return;
        }
        let idx = ((len as f64) * self.params.survival_ratio).floor() as usize;
        let min_score = self.population[idx.min(len - 1)].score;
        let a = self.params.parsimony_ratio;
        let target = self.params.target_complexity;
        for root in &mut self.population {
            let accuracy_term = if min_score.is_finite() && min_score != 0.0 {
                root.score / min_score
            } else if root.score == min_score {
                0.0
            } else {
                root.score
            };
            let complexity_term = ((root.complexity - target) / target).max(0.0);
            root.score = a * accuracy_term + (1.0 - a) * complexity_term;
        }
    }

    /// Step 8: drop the best raw score into the bounded history.
    fn record_history(&mut self) {
        if let Some(best) = self.population.first() {
            self.score_history.push_back(best.raw_score);
        }
        while self.score_history.len() > self.params.max_score_history {
            self.score_history.pop_front();
        }
    }

    /// Step 9: stop when the best tree's unweighted RMS clears the
    /// accuracy target, or the generation cap is reached.
    pub fn is_complete(&self) -> bool {
        let best = self.population.first().map(|r| r.raw_score).unwrap_or(Scalar::INFINITY);
        best <= self.params.accuracy_completion || self.generation >= self.params.generation_count
    }

    /// Run one full generation (spec §4.7 steps 1–8).
    pub fn step(&mut self) {
        self.repopulate();
        self.score_all();
        self.sort();
        self.refine_top();
        self.population_copy_safeguard();
        self.simplify_complexity_score();
        self.sort();
        self.parsimony_reweight();
        self.sort();
        self.record_history();
        self.generation += 1;
    }

    /// Run generations until [`Engine::is_complete`], logging each
    /// generation's best tree and a final summary line (spec §6 Outputs).
    pub fn run(&mut self) {
        while !self.is_complete() {
            self.step();
            self.log_best("gen");
        }
        self.log_best("Final");
    }

    fn log_best(&self, tag: &str) {
        let Some(best) = self.population.first() else {
            return;
        };
        log::info!(
            "{tag} {}: {} | score={:.6} raw={:.6} complexity={:.4}",
            self.generation,
            best.string(self.params.decimal_precision),
            best.score,
            best.raw_score,
            best.complexity,
        );
        self.draw_best();
    }

    /// Forward the best tree's predicted-vs-sample point sequence to the
    /// configured visualization surface (spec §4.13, §6 "drawn point
    /// sequences forwarded to a visualization surface").
    fn draw_best(&self) {
        let Some(best) = self.population.first() else {
            return;
        };
        let points: Vec<(f64, f64)> = self
            .samples
            .rows
            .iter()
            .map(|(vars, _)| (vars.first().copied().unwrap_or(0.0), best.compute(vars)))
            .collect();
        self.surface.draw_points(&points);
    }
}

/// Select a parent index in `[0, cutoff)`: by repeated Bernoulli trials
/// when `weighed_mutation` is set (first success wins, index 0 if none),
/// otherwise a uniform draw (spec §4.7 step 1).
fn pick_parent(rng: &mut impl Rng, cutoff: usize, params: &Parameters) -> usize {
    if cutoff == 0 {
        return 0;
    }
    if params.weighed_mutation {
        for idx in 0..cutoff {
            if chance(rng, params.weight_chance) {
                return idx;
            }
        }
        0
    } else {
        random_int(rng, cutoff - 1)
    }
}

fn random_node(pool: &Pool, root: NodeId, rng: &mut impl Rng) -> NodeId {
    let list = ops::list_of_nodes(pool, root);
    list.all[random_int(rng, list.all.len() - 1)]
}

/// Build `root`'s shadow tree (spec §4.6 "variable descriptors"): every
/// `VARIABLE` leaf with a configured descriptor is replaced by a fresh
/// copy of that descriptor's tree, the result is simplified, and its
/// complexity is returned. `None` when no descriptor is configured at all.
fn shadow_complexity(root: &Root, descriptors: &[Option<Descriptor>], params: &Parameters) -> Option<Scalar> {
    if descriptors.is_empty() {
        return None;
    }
    let shadow_pool = Pool::new();
    let shadow_root = substitute_descriptors(root.pool(), root.root(), &shadow_pool, descriptors);
    let simplified = crate::simplify::simplify_to_fixed_point(&shadow_pool, shadow_root, params);
    Some(ops::complexity_of(
        &shadow_pool,
        simplified,
        &params.complexity_weights,
        params.default_complexity,
    ))
}

fn substitute_descriptors(src: &Pool, id: NodeId, dst: &Pool, descriptors: &[Option<Descriptor>]) -> NodeId {
    let kind = src.kind(id);
    if kind == Kind::Variable {
        let idx = src.value(id).scalar as usize;
        if let Some(Some(d)) = descriptors.get(idx) {
            return ops::copy(&d.pool, dst, d.root);
        }
        return dst
            .allocate_var(kind, src.value(id), None)
            .expect("node pool exhausted during shadow substitution");
    }
    if kind.is_leaf() {
        return dst
            .allocate_var(kind, src.value(id), None)
            .expect("node pool exhausted during shadow substitution");
    }
    let arity = kind.arity() as usize;
    let mut children = [None; 2];
    for i in 0..arity {
        if let Some(c) = src.child(id, i) {
            children[i] = Some(substitute_descriptors(src, c, dst, descriptors));
        }
    }
    dst.allocate_op(kind, children, None)
        .expect("node pool exhausted during shadow substitution")
}
