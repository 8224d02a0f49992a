//! Tree operations: copy, copy-with-graft, pre-order enumeration, pretty
//! printing, and evaluation (spec §4.3).

use super::pool::Pool;
use super::{NodeId, ReasonCode, Value, normalize_constant};
use crate::Scalar;
use crate::config::{ComplexityEntry, OperandTag};
use crate::op::Kind;
use std::collections::HashMap;

/// Pre-order enumeration of a tree's nodes, bucketed by role (spec §4.3
/// `list_of_nodes`).
#[derive(Debug, Default, Clone)]
pub struct NodeList {
    pub operators: Vec<NodeId>,
    pub variables: Vec<NodeId>,
    pub constants: Vec<NodeId>,
    pub all: Vec<NodeId>,
}

impl NodeList {
    fn push(&mut self, pool: &Pool, id: NodeId) {
        self.all.push(id);
        match pool.kind(id) {
            Kind::Variable => self.variables.push(id),
            Kind::Constant => self.constants.push(id),
            _ => self.operators.push(id),
        }
    }
}

/// Pre-order walk of `root`'s tree, bucketing nodes by role.
pub fn list_of_nodes(pool: &Pool, root: NodeId) -> NodeList {
    let mut out = NodeList::default();
    walk(pool, root, &mut out);
    out
}

fn walk(pool: &Pool, id: NodeId, out: &mut NodeList) {
    out.push(pool, id);
    if pool.kind(id).is_operator() {
        for i in 0..pool.kind(id).arity() as usize {
            if let Some(c) = pool.child(id, i) {
                walk(pool, c, out);
            }
        }
    }
}

/// Recursively clone the subtree rooted at `id` (in `src`) into `dst`,
/// preserving kind and constant/variable value. Caller attaches the
/// returned id to a parent (or installs it as a new tree root).
pub fn copy(src: &Pool, dst: &Pool, id: NodeId) -> NodeId {
    copy_with_graft_inner(src, dst, id, None, None)
}

/// Like [`copy`], but when traversal reaches `to` (identity-compared against
/// `id` as it walks `src`), the corresponding output subtree is a fresh copy
/// of `from` (drawn from `from_pool`) instead of a clone of `to` itself.
pub fn copy_with_graft(
    src: &Pool,
    dst: &Pool,
    id: NodeId,
    to: NodeId,
    from_pool: &Pool,
    from: NodeId,
) -> NodeId {
    copy_with_graft_inner(src, dst, id, Some((to, from_pool, from)))
}

fn copy_with_graft_inner(
    src: &Pool,
    dst: &Pool,
    id: NodeId,
    graft: Option<(NodeId, &Pool, NodeId)>,
) -> NodeId {
    if let Some((to, from_pool, from)) = graft {
        if to == id {
            return copy(from_pool, dst, from);
        }
    }
    let kind = src.kind(id);
    if kind.is_leaf() {
        dst.allocate_var(kind, src.value(id), None)
            .expect("node pool exhausted during copy")
    } else {
        let arity = kind.arity() as usize;
        let mut children = [None; 2];
        for i in 0..arity {
            if let Some(c) = src.child(id, i) {
                children[i] = Some(copy_with_graft_inner(src, dst, c, graft));
            }
        }
        dst.allocate_op(kind, children, None)
            .expect("node pool exhausted during copy")
    }
}

/// Recursively evaluate the tree rooted at `id`. A `VARIABLE` index outside
/// `vars` evaluates to 0 with a warning (spec §4.3).
pub fn compute(pool: &Pool, id: NodeId, vars: &[Scalar]) -> Scalar {
    let kind = pool.kind(id);
    match kind {
        Kind::Constant => pool.value(id).scalar,
        Kind::Variable => {
            let idx = pool.value(id).scalar as usize;
            match vars.get(idx) {
                Some(v) => *v,
                None => {
                    log::warn!("variable index {idx} out of bounds ({} vars)", vars.len());
                    0.0
                }
            }
        }
        _ => {
            let arity = kind.arity() as usize;
            let x = pool
                .child(id, 0)
                .map(|c| compute(pool, c, vars))
                .unwrap_or(0.0);
            let y = if arity == 2 {
                pool.child(id, 1)
                    .map(|c| compute(pool, c, vars))
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            kind.apply(x, y)
        }
    }
}

/// Structural signature of a tree: kinds and shape only, never values (spec
/// §3 invariant 7). Used for duplicate-form detection.
pub fn form(pool: &Pool, id: NodeId) -> String {
    let mut out = String::new();
    form_into(pool, id, &mut out);
    out
}

fn form_into(pool: &Pool, id: NodeId, out: &mut String) {
    let kind = pool.kind(id);
    out.push_str(kind.name());
    if kind.is_operator() {
        out.push('(');
        for i in 0..kind.arity() as usize {
            if i > 0 {
                out.push(',');
            }
            if let Some(c) = pool.child(id, i) {
                form_into(pool, c, out);
            }
        }
        out.push(')');
    }
}

/// Parser-target pretty-printer: `op(arg[, arg])` for operators, `N[.M]`
/// for constants, `varK` for variables (spec §6 "Tree string form").
pub fn string(pool: &Pool, id: NodeId, decimal_places: i32) -> String {
    let mut out = String::new();
    string_into(pool, id, decimal_places, &mut out);
    out
}

fn string_into(pool: &Pool, id: NodeId, decimal_places: i32, out: &mut String) {
    let kind = pool.kind(id);
    match kind {
        Kind::Constant => {
            let v = normalize_constant(pool.value(id).scalar, decimal_places, 0.0, Scalar::INFINITY);
            out.push_str(&format!("{:.*}", decimal_places.max(0) as usize, v));
        }
        Kind::Variable => {
            out.push_str(&format!("var{}", pool.value(id).scalar as i64));
        }
        _ => {
            out.push_str(kind.name());
            out.push('(');
            for i in 0..kind.arity() as usize {
                if i > 0 {
                    out.push_str(", ");
                }
                if let Some(c) = pool.child(id, i) {
                    string_into(pool, c, decimal_places, out);
                }
            }
            out.push(')');
        }
    }
}

/// Free the subtree rooted at `id`, recursing into children before freeing
/// the node itself (the original's `free_all`, as distinct from `Pool`'s
/// single-node `deallocate`).
pub fn free_all(pool: &Pool, id: NodeId) {
    let kind = pool.kind(id);
    if kind.is_operator() {
        for i in 0..kind.arity() as usize {
            if let Some(c) = pool.child(id, i) {
                free_all(pool, c);
            }
        }
    }
    pool.deallocate(id);
}

/// Structural validity of a whole tree (spec §7 item 4): walk every node,
/// checking kind, arity, leaf values, and parent/child linkage agree with
/// each other. Returns the first problem found, or `Success`.
pub fn validate_node_tree(pool: &Pool, root: NodeId) -> ReasonCode {
    validate_at(pool, root, None)
}

fn validate_at(pool: &Pool, id: NodeId, expected_parent: Option<NodeId>) -> ReasonCode {
    let kind = pool.kind(id);
    if matches!(kind, Kind::None | Kind::RandomOp | Kind::RandomVar) {
        return ReasonCode::InvalidKind;
    }
    if pool.parent(id) != expected_parent {
        return ReasonCode::ParentLinkBroken;
    }
    if kind.is_leaf() {
        return if pool.value(id).is_set {
            ReasonCode::Success
        } else {
            ReasonCode::UnsetValue
        };
    }
    let arity = kind.arity() as usize;
    for idx in 0..2 {
        let child = pool.child(id, idx);
        if idx >= arity {
            if child.is_some() {
                return ReasonCode::Arity;
            }
            continue;
        }
        let Some(c) = child else {
            return ReasonCode::MissingChild(idx as u8);
        };
        if pool.parent(c) != Some(id) {
            return ReasonCode::ChildLinkBroken(idx as u8);
        }
        let result = validate_at(pool, c, Some(id));
        if result != ReasonCode::Success {
            return result;
        }
    }
    ReasonCode::Success
}

fn tag_of(pool: &Pool, child: Option<NodeId>) -> OperandTag {
    match child {
        None => OperandTag::None,
        Some(c) => {
            if pool.kind(c).is_operator() {
                OperandTag::Operator
            } else {
                OperandTag::Constant
            }
        }
    }
}

/// Structural complexity (spec §4.6): a leaf is 0; an operator node is its
/// children's complexity plus the best-matching `table_entry`, falling
/// back to `default_complexity` when no entry matches.
pub fn complexity_of(
    pool: &Pool,
    id: NodeId,
    weights: &HashMap<Kind, Vec<ComplexityEntry>>,
    default_complexity: Scalar,
) -> Scalar {
    let kind = pool.kind(id);
    if kind.is_leaf() {
        return 0.0;
    }
    let arity = kind.arity() as usize;
    let mut total = 0.0;
    for i in 0..arity {
        if let Some(c) = pool.child(id, i) {
            total += complexity_of(pool, c, weights, default_complexity);
        }
    }
    let lhs = tag_of(pool, pool.child(id, 0));
    let rhs = if arity == 2 {
        tag_of(pool, pool.child(id, 1))
    } else {
        OperandTag::None
    };
    let entry_weight = weights
        .get(&kind)
        .and_then(|entries| entries.iter().find(|e| e.lhs == lhs && e.rhs == rhs))
        .map(|e| e.weight);
    total + entry_weight.unwrap_or(default_complexity)
}

/// Construct a single random leaf: a `VARIABLE` with a uniform index in
/// `[0, num_vars)`, or a `CONSTANT` drawn uniformly in `[-1, 1]` if
/// `num_vars == 0`.
pub fn random_leaf(
    pool: &Pool,
    rng: &mut impl rand::Rng,
    num_vars: usize,
    constant_chance: f64,
) -> NodeId {
    use crate::rng::{chance, random_int, uniform};
    if num_vars == 0 || chance(rng, constant_chance) {
        let c = uniform(rng) * 2.0 - 1.0;
        pool.allocate_var(Kind::Constant, Value::of(c), None)
            .expect("node pool exhausted during random_leaf")
    } else {
        let idx = random_int(rng, num_vars - 1);
        pool.allocate_var(Kind::Variable, Value::of(idx as Scalar), None)
            .expect("node pool exhausted during random_leaf")
    }
}

/// Construct a random operator node from `operator_functions`, with random
/// variable-or-constant leaves for every child slot.
pub fn random_operator(
    pool: &Pool,
    rng: &mut impl rand::Rng,
    operator_functions: &[Kind],
    num_vars: usize,
    constant_chance: f64,
) -> NodeId {
    use crate::rng::random_int;
    let kind = operator_functions[random_int(rng, operator_functions.len() - 1)];
    let mut children = [None; 2];
    for i in 0..kind.arity() as usize {
        children[i] = Some(random_leaf(pool, rng, num_vars, constant_chance));
    }
    pool.allocate_op(kind, children, None)
        .expect("node pool exhausted during random_operator")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Value;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn compute_evaluates_simple_tree() {
        let pool = Pool::new();
        let a = pool.allocate_var(Kind::Constant, Value::of(2.0), None).unwrap();
        let b = pool.allocate_var(Kind::Constant, Value::of(3.0), None).unwrap();
        let add = pool.allocate_op(Kind::Add, [Some(a), Some(b)], None).unwrap();
        assert_eq!(compute(&pool, add, &[]), 5.0);
    }

    #[test]
    fn compute_warns_and_zeros_out_of_bounds_variable() {
        let pool = Pool::new();
        let v = pool
            .allocate_var(Kind::Variable, Value::of(5.0), None)
            .unwrap();
        assert_eq!(compute(&pool, v, &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn form_ignores_constant_value() {
        let pool = Pool::new();
        let a = pool.allocate_var(Kind::Constant, Value::of(1.0), None).unwrap();
        let b = pool.allocate_var(Kind::Constant, Value::of(99.0), None).unwrap();
        assert_eq!(form(&pool, a), form(&pool, b));
    }

    #[test]
    fn copy_duplicates_structure_into_a_fresh_pool() {
        let src = Pool::new();
        let dst = Pool::new();
        let a = src.allocate_var(Kind::Constant, Value::of(7.0), None).unwrap();
        let b = src.allocate_var(Kind::Variable, Value::of(0.0), None).unwrap();
        let add = src.allocate_op(Kind::Add, [Some(a), Some(b)], None).unwrap();
        let cloned = copy(&src, &dst, add);
        assert_eq!(form(&src, add), form(&dst, cloned));
        assert_eq!(compute(&dst, cloned, &[1.0]), compute(&src, add, &[1.0]));
    }

    #[test]
    fn copy_with_graft_substitutes_at_the_named_node() {
        let src = Pool::new();
        let other = Pool::new();
        let dst = Pool::new();
        let a = src.allocate_var(Kind::Constant, Value::of(1.0), None).unwrap();
        let b = src.allocate_var(Kind::Constant, Value::of(2.0), None).unwrap();
        let add = src.allocate_op(Kind::Add, [Some(a), Some(b)], None).unwrap();
        let replacement = other
            .allocate_var(Kind::Constant, Value::of(42.0), None)
            .unwrap();
        let grafted = copy_with_graft(&src, &dst, add, b, &other, replacement);
        let list = list_of_nodes(&dst, grafted);
        assert!(list.constants.iter().any(|&c| dst.value(c).scalar == 42.0));
    }

    #[test]
    fn random_operator_picks_from_the_given_set() {
        let pool = Pool::new();
        let mut rng = SmallRng::seed_from_u64(1);
        let id = random_operator(&pool, &mut rng, &[Kind::Add], 2, 0.5);
        assert_eq!(pool.kind(id), Kind::Add);
    }

    // Scenario (spec §8): `validate_node_tree(root) == SUCCESS` for a
    // freshly built, well-formed tree.
    #[test]
    fn validate_node_tree_succeeds_on_a_well_formed_tree() {
        let pool = Pool::new();
        let a = pool.allocate_var(Kind::Constant, Value::of(1.0), None).unwrap();
        let b = pool.allocate_var(Kind::Variable, Value::of(0.0), None).unwrap();
        let add = pool.allocate_op(Kind::Add, [Some(a), Some(b)], None).unwrap();
        assert_eq!(validate_node_tree(&pool, add), ReasonCode::Success);
    }

    #[test]
    fn validate_node_tree_flags_an_unset_leaf_value() {
        let pool = Pool::new();
        let bad = pool.allocate_var(Kind::Constant, Value::unset(), None).unwrap();
        assert_eq!(validate_node_tree(&pool, bad), ReasonCode::UnsetValue);
    }

    #[test]
    fn validate_node_tree_flags_a_missing_child() {
        let pool = Pool::new();
        let a = pool.allocate_var(Kind::Constant, Value::of(1.0), None).unwrap();
        let add = pool.allocate_op(Kind::Add, [Some(a), None], None).unwrap();
        assert_eq!(validate_node_tree(&pool, add), ReasonCode::MissingChild(1));
    }

    #[test]
    fn validate_node_tree_flags_a_broken_child_link() {
        let pool = Pool::new();
        let a = pool.allocate_var(Kind::Constant, Value::of(1.0), None).unwrap();
        let b = pool.allocate_var(Kind::Constant, Value::of(2.0), None).unwrap();
        let add = pool.allocate_op(Kind::Add, [Some(a), Some(b)], None).unwrap();
        // sever the child's parent pointer without updating the operator
        pool.set_parent(b, None);
        assert_eq!(validate_node_tree(&pool, add), ReasonCode::ChildLinkBroken(1));
    }

    #[test]
    fn validate_node_tree_flags_an_unexpected_parent_on_the_root() {
        let pool = Pool::new();
        let other = pool.allocate_var(Kind::Constant, Value::of(9.0), None).unwrap();
        let leaf = pool.allocate_var(Kind::Constant, Value::of(1.0), Some(other)).unwrap();
        assert_eq!(validate_node_tree(&pool, leaf), ReasonCode::ParentLinkBroken);
    }
}
