//! The three tree-mutation primitives and the top-level `mutate` dispatcher
//! (spec §4.5).

use super::ops::{free_all, list_of_nodes, random_leaf, random_operator};
use super::pool::Pool;
use super::{NodeId, Value};
use crate::config::Parameters;
use crate::op::Kind;
use crate::rng::{chance, random_int};
use rand::Rng;

/// `k` times: wrap a uniform random node in a freshly allocated random
/// operator whose remaining children are random leaves, reattaching to the
/// node's original parent.
pub fn mutate_add(pool: &Pool, root: &mut NodeId, rng: &mut impl Rng, params: &Parameters, num_vars: usize, k: usize) {
    for _ in 0..k {
        let list = list_of_nodes(pool, *root);
        let target = list.all[random_int(rng, list.all.len() - 1)];
        let parent = pool.parent(target);
        let wrapper_kind =
            params.operator_functions[random_int(rng, params.operator_functions.len() - 1)];
        let arity = wrapper_kind.arity() as usize;
        let slot = random_int(rng, arity - 1);
        let mut children = [None; 2];
        for i in 0..arity {
            children[i] = Some(if i == slot {
                target
            } else {
                random_leaf(pool, rng, num_vars, params.constant_chance)
            });
        }
        let wrapper = pool
            .allocate_op(wrapper_kind, children, parent)
            .expect("node pool exhausted during mutate_add");
        match parent {
            Some(p) => {
                let idx = (0..pool.kind(p).arity() as usize)
                    .find(|&i| pool.child(p, i) == Some(target))
                    .expect("target must be a child of its recorded parent");
                pool.set_child(p, idx, Some(wrapper));
            }
            None => *root = wrapper,
        }
    }
}

/// `k` times: pick a uniform random operator node `n`, pick a uniform random
/// child `i`, replace `n` with that child in `n`'s parent, and free `n`'s
/// other children plus `n` itself.
pub fn mutate_remove(pool: &Pool, root: &mut NodeId, rng: &mut impl Rng, k: usize) {
    for _ in 0..k {
        let list = list_of_nodes(pool, *root);
        if list.operators.is_empty() {
            return;
        }
        let n = list.operators[random_int(rng, list.operators.len() - 1)];
        let arity = pool.kind(n).arity() as usize;
        let keep_idx = random_int(rng, arity - 1);
        let keep = pool.child(n, keep_idx);
        for i in 0..arity {
            if i != keep_idx {
                if let Some(c) = pool.child(n, i) {
                    free_all(pool, c);
                }
            }
        }
        let parent = pool.parent(n);
        match (parent, keep) {
            (Some(p), Some(keep)) => {
                let idx = (0..pool.kind(p).arity() as usize)
                    .find(|&i| pool.child(p, i) == Some(n))
                    .expect("n must be a child of its recorded parent");
                pool.set_child(p, idx, Some(keep));
            }
            (None, Some(keep)) => {
                pool.set_parent(keep, None);
                *root = keep;
            }
            (_, None) => continue,
        }
        pool.deallocate(n);
    }
}

/// `k` times: pick a uniform random node and reshape it to a freshly drawn
/// kind in place, creating leaves for new slots and freeing shed ones.
pub fn mutate_change(
    pool: &Pool,
    root: &mut NodeId,
    rng: &mut impl Rng,
    params: &Parameters,
    num_vars: usize,
    k: usize,
) {
    for _ in 0..k {
        let list = list_of_nodes(pool, *root);
        let n = list.all[random_int(rng, list.all.len() - 1)];
        let old_kind = pool.kind(n);
        let old_arity = old_kind.arity() as usize;

        let new_kind = if chance(rng, params.operator_chance) {
            params.operator_functions[random_int(rng, params.operator_functions.len() - 1)]
        } else if chance(rng, params.constant_chance) {
            Kind::Constant
        } else {
            Kind::Variable
        };
        let new_arity = new_kind.arity() as usize;

        if old_kind.is_operator() {
            for i in new_arity..old_arity {
                if let Some(c) = pool.child(n, i) {
                    free_all(pool, c);
                }
            }
        }

        if new_kind.is_leaf() {
            let value = if new_kind == Kind::Variable {
                Value::of(random_int(rng, num_vars.saturating_sub(1)) as f64)
            } else {
                Value::of(rng.random::<f64>() * 2.0 - 1.0)
            };
            pool.set_kind_leaf(n, new_kind, value);
        } else {
            let mut children = [None; 2];
            for i in 0..new_arity {
                children[i] = if old_kind.is_operator() && i < old_arity {
                    pool.child(n, i)
                } else {
                    Some(random_leaf(pool, rng, num_vars, params.constant_chance))
                };
            }
            pool.set_kind_op(n, new_kind, children);
        }
    }
}

/// With probability `change_chance`, call `mutate_change`; otherwise call
/// `mutate_add` or `mutate_remove` with equal probability (spec §4.5).
pub fn mutate(pool: &Pool, root: &mut NodeId, rng: &mut impl Rng, params: &Parameters, num_vars: usize, k: usize) {
    if chance(rng, params.change_chance) {
        mutate_change(pool, root, rng, params, num_vars, k);
    } else if rng.random_bool(0.5) {
        mutate_add(pool, root, rng, params, num_vars, k);
    } else {
        mutate_remove(pool, root, rng, k);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ops::{compute, form};
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn leaf(pool: &Pool, v: f64) -> NodeId {
        pool.allocate_var(Kind::Constant, Value::of(v), None).unwrap()
    }

    #[test]
    fn mutate_add_grows_the_tree() {
        let pool = Pool::new();
        let mut root = leaf(&pool, 1.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let params = Parameters::default();
        let before = form(&pool, root);
        mutate_add(&pool, &mut root, &mut rng, &params, 2, 1);
        assert_ne!(form(&pool, root), before);
    }

    #[test]
    fn mutate_remove_shrinks_an_operator_tree() {
        let pool = Pool::new();
        let a = leaf(&pool, 1.0);
        let b = leaf(&pool, 2.0);
        let mut root = pool.allocate_op(Kind::Add, [Some(a), Some(b)], None).unwrap();
        let mut rng = SmallRng::seed_from_u64(9);
        mutate_remove(&pool, &mut root, &mut rng, 1);
        assert!(pool.kind(root).is_leaf());
    }

    #[test]
    fn mutate_change_preserves_evaluability() {
        let pool = Pool::new();
        let a = leaf(&pool, 1.0);
        let b = leaf(&pool, 2.0);
        let mut root = pool.allocate_op(Kind::Add, [Some(a), Some(b)], None).unwrap();
        let mut rng = SmallRng::seed_from_u64(11);
        let params = Parameters::default();
        mutate_change(&pool, &mut root, &mut rng, &params, 2, 3);
        let _ = compute(&pool, root, &[1.0, 2.0]);
    }
}
