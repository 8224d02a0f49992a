//! Bottom-up, fixed-point algebraic simplifier (spec §4.4). Every matched
//! rule constructs its replacement out of fresh nodes (folded constants, or
//! copies of existing subtrees); the node it replaces is then freed in its
//! entirety, so there is never a dangling or aliased slot. This trades a
//! little allocation churn for never needing `unsafe` to reason about
//! partially-freed subtrees.

use crate::config::Parameters;
use crate::node::ops::{self, free_all};
use crate::node::{NodeId, Pool, Value, normalize_constant};
use crate::op::Kind;

fn leaf_const(pool: &Pool, value: f64, params: &Parameters) -> NodeId {
    let v = normalize_constant(value, params.decimal_precision, params.min_constant, params.max_constant);
    pool.allocate_var(Kind::Constant, Value::of(v), None)
        .expect("node pool exhausted during simplify")
}

fn copy_of(pool: &Pool, id: NodeId) -> NodeId {
    ops::copy(pool, pool, id)
}

fn as_const(pool: &Pool, id: NodeId) -> Option<f64> {
    (pool.kind(id) == Kind::Constant).then(|| pool.value(id).scalar)
}

fn unary(pool: &Pool, kind: Kind, child: NodeId) -> NodeId {
    pool.allocate_op(kind, [Some(child), None], None)
        .expect("node pool exhausted during simplify")
}

fn binary(pool: &Pool, kind: Kind, a: NodeId, b: NodeId) -> NodeId {
    pool.allocate_op(kind, [Some(a), Some(b)], None)
        .expect("node pool exhausted during simplify")
}

fn deep_equal(pool: &Pool, a: NodeId, b: NodeId) -> bool {
    let ka = pool.kind(a);
    let kb = pool.kind(b);
    if ka != kb {
        return false;
    }
    if ka.is_leaf() {
        return pool.value(a).scalar == pool.value(b).scalar;
    }
    (0..ka.arity() as usize).all(|i| match (pool.child(a, i), pool.child(b, i)) {
        (Some(ca), Some(cb)) => deep_equal(pool, ca, cb),
        (None, None) => true,
        _ => false,
    })
}

/// Run [`simplify_once`] repeatedly until it reports no further change,
/// returning the (possibly different) root node id.
pub fn simplify_to_fixed_point(pool: &Pool, mut root: NodeId, params: &Parameters) -> NodeId {
    while let Some(replacement) = simplify_once(pool, root, params) {
        root = replacement;
    }
    root
}

/// One bottom-up pass. `None` means nothing changed anywhere in the
/// subtree rooted at `id`. `Some(new_id)` means `id` (and any of its
/// now-superseded children) has been fully freed; `new_id` is the node the
/// caller should install in `id`'s place.
fn simplify_once(pool: &Pool, id: NodeId, params: &Parameters) -> Option<NodeId> {
    let kind = pool.kind(id);
    if kind.is_leaf() {
        return None;
    }
    let arity = kind.arity() as usize;
    let mut children = [pool.child(id, 0), pool.child(id, 1)];
    let mut child_changed = false;
    for slot in children.iter_mut().take(arity) {
        if let Some(c) = *slot {
            if let Some(new_c) = simplify_once(pool, c, params) {
                *slot = Some(new_c);
                child_changed = true;
            }
        }
    }
    if child_changed {
        for (i, slot) in children.iter().enumerate().take(arity) {
            pool.set_child(id, i, *slot);
        }
    }

    if params.deny_simplify_operator == Some(kind) {
        return if child_changed { Some(id) } else { None };
    }

    let c0 = children[0];
    let c1 = children[1];
    let rewritten = match kind {
        Kind::Inverse => c0.and_then(|a| simplify_inverse(pool, a, params)),
        Kind::Negative => c0.and_then(|a| simplify_negative(pool, a, params)),
        Kind::Add => match (c0, c1) {
            (Some(a), Some(b)) => simplify_add(pool, a, b, params),
            _ => None,
        },
        Kind::Subtract => match (c0, c1) {
            (Some(a), Some(b)) => simplify_subtract(pool, a, b, params),
            _ => None,
        },
        Kind::Multiply => match (c0, c1) {
            (Some(a), Some(b)) => simplify_multiply(pool, a, b, params),
            _ => None,
        },
        Kind::Divide => match (c0, c1) {
            (Some(a), Some(b)) => simplify_divide(pool, a, b, params),
            _ => None,
        },
        Kind::Power => match (c0, c1) {
            (Some(a), Some(b)) => simplify_power(pool, a, b, params),
            _ => None,
        },
        Kind::Abs => c0.and_then(|a| simplify_abs(pool, a, params)),
        Kind::Sin | Kind::Cos | Kind::Tan => c0.and_then(|a| simplify_trig(pool, kind, a, params)),
        _ => None,
    };

    if let Some(result) = rewritten {
        free_all(pool, id);
        return Some(result);
    }
    if child_changed { Some(id) } else { None }
}

fn simplify_inverse(pool: &Pool, a: NodeId, params: &Parameters) -> Option<NodeId> {
    if let Some(c) = as_const(pool, a) {
        return Some(leaf_const(pool, 1.0 / c, params));
    }
    match pool.kind(a) {
        Kind::Inverse => {
            let inner = pool.child(a, 0)?;
            Some(copy_of(pool, inner))
        }
        Kind::Power => {
            let base = pool.child(a, 0)?;
            let exp = pool.child(a, 1)?;
            if let Some(c) = as_const(pool, exp) {
                let neg_exp = leaf_const(pool, -c, params);
                Some(binary(pool, Kind::Power, copy_of(pool, base), neg_exp))
            } else {
                let neg_exp = unary(pool, Kind::Negative, copy_of(pool, exp));
                Some(binary(pool, Kind::Power, copy_of(pool, base), neg_exp))
            }
        }
        Kind::Divide => {
            let lhs = pool.child(a, 0)?;
            let rhs = pool.child(a, 1)?;
            Some(binary(pool, Kind::Divide, copy_of(pool, rhs), copy_of(pool, lhs)))
        }
        _ => None,
    }
}

fn simplify_negative(pool: &Pool, a: NodeId, params: &Parameters) -> Option<NodeId> {
    if let Some(c) = as_const(pool, a) {
        return Some(leaf_const(pool, -c, params));
    }
    match pool.kind(a) {
        Kind::Negative => {
            let inner = pool.child(a, 0)?;
            Some(copy_of(pool, inner))
        }
        Kind::Subtract => {
            let lhs = pool.child(a, 0)?;
            let rhs = pool.child(a, 1)?;
            Some(binary(pool, Kind::Subtract, copy_of(pool, rhs), copy_of(pool, lhs)))
        }
        Kind::Add => {
            let lhs = pool.child(a, 0)?;
            let rhs = pool.child(a, 1)?;
            let c = as_const(pool, lhs)?;
            let neg_c = leaf_const(pool, -c, params);
            Some(binary(pool, Kind::Subtract, neg_c, copy_of(pool, rhs)))
        }
        _ => None,
    }
}

fn simplify_add(pool: &Pool, a: NodeId, b: NodeId, params: &Parameters) -> Option<NodeId> {
    if let (Some(x), Some(y)) = (as_const(pool, a), as_const(pool, b)) {
        return Some(leaf_const(pool, x + y, params));
    }
    if pool.kind(a) == Kind::Negative && pool.kind(b) == Kind::Negative {
        let inner_a = pool.child(a, 0)?;
        let inner_b = pool.child(b, 0)?;
        let sum = binary(pool, Kind::Add, copy_of(pool, inner_a), copy_of(pool, inner_b));
        return Some(unary(pool, Kind::Negative, sum));
    }
    if as_const(pool, b).is_some() && as_const(pool, a).is_none() {
        return Some(binary(pool, Kind::Add, copy_of(pool, b), copy_of(pool, a)));
    }
    if let Some(x) = as_const(pool, a) {
        if x == 0.0 {
            return Some(copy_of(pool, b));
        }
        if pool.kind(b) == Kind::Add {
            if let Some(y) = as_const(pool, pool.child(b, 0)?) {
                let merged = leaf_const(pool, x + y, params);
                let rest = pool.child(b, 1)?;
                return Some(binary(pool, Kind::Add, merged, copy_of(pool, rest)));
            }
        }
    }
    if pool.kind(a) == Kind::Add && pool.kind(b) == Kind::Add {
        if let (Some(x), Some(y)) = (
            pool.child(a, 0).and_then(|c| as_const(pool, c)),
            pool.child(b, 0).and_then(|c| as_const(pool, c)),
        ) {
            let merged = leaf_const(pool, x + y, params);
            let rest_a = pool.child(a, 1)?;
            let rest_b = pool.child(b, 1)?;
            let rest = binary(pool, Kind::Add, copy_of(pool, rest_a), copy_of(pool, rest_b));
            return Some(binary(pool, Kind::Add, merged, rest));
        }
    }
    if pool.kind(b) == Kind::Negative {
        let inner_b = pool.child(b, 0)?;
        return Some(binary(pool, Kind::Subtract, copy_of(pool, a), copy_of(pool, inner_b)));
    }
    let a_is_repeatable = pool.kind(a) == Kind::Variable
        || (pool.kind(a).arity() == 1 && pool.kind(a).is_unary_simplify_class());
    if a_is_repeatable && deep_equal(pool, a, b) {
        return Some(binary(pool, Kind::Multiply, copy_of(pool, a), leaf_const(pool, 2.0, params)));
    }
    None
}

fn simplify_subtract(pool: &Pool, a: NodeId, b: NodeId, params: &Parameters) -> Option<NodeId> {
    if let (Some(x), Some(y)) = (as_const(pool, a), as_const(pool, b)) {
        return Some(leaf_const(pool, x - y, params));
    }
    if let Some(c) = as_const(pool, b) {
        let neg_c = leaf_const(pool, -c, params);
        let rebuilt = binary(pool, Kind::Add, copy_of(pool, a), neg_c);
        return Some(simplify_to_fixed_point(pool, rebuilt, params));
    }
    if pool.kind(b) == Kind::Negative {
        let inner_b = pool.child(b, 0)?;
        let rebuilt = binary(pool, Kind::Add, copy_of(pool, a), copy_of(pool, inner_b));
        return Some(simplify_to_fixed_point(pool, rebuilt, params));
    }
    if pool.kind(a) == Kind::Negative {
        let inner_a = pool.child(a, 0)?;
        let sum = binary(pool, Kind::Add, copy_of(pool, inner_a), copy_of(pool, b));
        return Some(unary(pool, Kind::Negative, sum));
    }
    if let Some(x) = as_const(pool, a) {
        if x == 0.0 {
            return Some(unary(pool, Kind::Negative, copy_of(pool, b)));
        }
    }
    if deep_equal(pool, a, b) {
        return Some(leaf_const(pool, 0.0, params));
    }
    None
}

fn simplify_multiply(pool: &Pool, a: NodeId, b: NodeId, params: &Parameters) -> Option<NodeId> {
    if let (Some(x), Some(y)) = (as_const(pool, a), as_const(pool, b)) {
        return Some(leaf_const(pool, x * y, params));
    }
    let a_leadable = as_const(pool, a).is_some() || pool.kind(a) == Kind::Variable;
    let b_leadable = as_const(pool, b).is_some() || pool.kind(b) == Kind::Variable;
    if b_leadable && !a_leadable {
        return Some(binary(pool, Kind::Multiply, copy_of(pool, b), copy_of(pool, a)));
    }
    if let Some(x) = as_const(pool, a) {
        if pool.kind(b) == Kind::Multiply {
            if let Some(y) = as_const(pool, pool.child(b, 0)?) {
                let merged = leaf_const(pool, x * y, params);
                let rest = pool.child(b, 1)?;
                return Some(binary(pool, Kind::Multiply, merged, copy_of(pool, rest)));
            }
        }
    }
    if pool.kind(a) == Kind::Multiply && pool.kind(b) == Kind::Multiply {
        if let (Some(x), Some(y)) = (
            pool.child(a, 0).and_then(|c| as_const(pool, c)),
            pool.child(b, 0).and_then(|c| as_const(pool, c)),
        ) {
            let merged = leaf_const(pool, x * y, params);
            let rest_a = pool.child(a, 1)?;
            let rest_b = pool.child(b, 1)?;
            let rest = binary(pool, Kind::Multiply, copy_of(pool, rest_a), copy_of(pool, rest_b));
            return Some(binary(pool, Kind::Multiply, merged, rest));
        }
    }
    if pool.kind(a) == Kind::Negative && pool.kind(b) == Kind::Negative {
        let inner_a = pool.child(a, 0)?;
        let inner_b = pool.child(b, 0)?;
        return Some(binary(pool, Kind::Multiply, copy_of(pool, inner_a), copy_of(pool, inner_b)));
    }
    if let Some(x) = as_const(pool, a) {
        if x == 0.0 {
            return Some(leaf_const(pool, 0.0, params));
        }
        if x == 1.0 {
            return Some(copy_of(pool, b));
        }
        if x == -1.0 {
            return Some(unary(pool, Kind::Negative, copy_of(pool, b)));
        }
    }
    if pool.kind(a) == Kind::Inverse && pool.kind(b) == Kind::Inverse {
        let inner_a = pool.child(a, 0)?;
        let inner_b = pool.child(b, 0)?;
        let prod = binary(pool, Kind::Multiply, copy_of(pool, inner_a), copy_of(pool, inner_b));
        return Some(unary(pool, Kind::Inverse, prod));
    }
    if pool.kind(b) == Kind::Inverse {
        let inner_b = pool.child(b, 0)?;
        return Some(binary(pool, Kind::Divide, copy_of(pool, a), copy_of(pool, inner_b)));
    }
    if pool.kind(a) == Kind::Variable && deep_equal(pool, a, b) {
        return Some(binary(pool, Kind::Power, copy_of(pool, a), leaf_const(pool, 2.0, params)));
    }
    let a_unary = pool.kind(a).arity() == 1 && pool.kind(a).is_unary_simplify_class();
    if a_unary && deep_equal(pool, a, b) {
        let squared = binary(pool, Kind::Power, copy_of(pool, a), leaf_const(pool, 2.0, params));
        return Some(squared);
    }
    if pool.kind(a) == Kind::Variable && pool.kind(b) == Kind::Multiply {
        let inner0 = pool.child(b, 0)?;
        if deep_equal(pool, a, inner0) {
            let rest = pool.child(b, 1)?;
            let sq = binary(pool, Kind::Power, copy_of(pool, a), leaf_const(pool, 2.0, params));
            return Some(binary(pool, Kind::Multiply, sq, copy_of(pool, rest)));
        }
    }
    if pool.kind(a) == Kind::Variable && pool.kind(b) == Kind::Divide {
        let inner0 = pool.child(b, 0)?;
        if deep_equal(pool, a, inner0) {
            let rest = pool.child(b, 1)?;
            let sq = binary(pool, Kind::Power, copy_of(pool, a), leaf_const(pool, 2.0, params));
            return Some(binary(pool, Kind::Divide, sq, copy_of(pool, rest)));
        }
    }
    None
}

fn simplify_divide(pool: &Pool, a: NodeId, b: NodeId, params: &Parameters) -> Option<NodeId> {
    if let (Some(x), Some(y)) = (as_const(pool, a), as_const(pool, b)) {
        let result = if y == 0.0 { 0.0 } else { x / y };
        return Some(leaf_const(pool, result, params));
    }
    if pool.kind(a) == Kind::Inverse {
        let inner_a = pool.child(a, 0)?;
        let prod = binary(pool, Kind::Multiply, copy_of(pool, inner_a), copy_of(pool, b));
        return Some(unary(pool, Kind::Inverse, prod));
    }
    if pool.kind(b) == Kind::Inverse {
        let inner_b = pool.child(b, 0)?;
        return Some(binary(pool, Kind::Multiply, copy_of(pool, a), copy_of(pool, inner_b)));
    }
    if let Some(x) = as_const(pool, a) {
        if x == 0.0 {
            return Some(leaf_const(pool, 0.0, params));
        }
        if x == 1.0 {
            return Some(unary(pool, Kind::Inverse, copy_of(pool, b)));
        }
    }
    if deep_equal(pool, a, b) {
        return Some(leaf_const(pool, 1.0, params));
    }
    if pool.kind(a) == Kind::Multiply {
        let lhs = pool.child(a, 0)?;
        let rhs = pool.child(a, 1)?;
        if deep_equal(pool, lhs, b) {
            return Some(copy_of(pool, rhs));
        }
        if deep_equal(pool, rhs, b) {
            return Some(copy_of(pool, lhs));
        }
    }
    if pool.kind(b) == Kind::Multiply {
        let lhs = pool.child(b, 0)?;
        let rhs = pool.child(b, 1)?;
        if deep_equal(pool, a, lhs) {
            return Some(unary(pool, Kind::Inverse, copy_of(pool, rhs)));
        }
        if deep_equal(pool, a, rhs) {
            return Some(unary(pool, Kind::Inverse, copy_of(pool, lhs)));
        }
    }
    let a_unary = pool.kind(a).arity() == 1 && pool.kind(a).is_unary_simplify_class();
    if a_unary && pool.kind(a) == pool.kind(b) && deep_equal(pool, a, b) {
        return Some(leaf_const(pool, 1.0, params));
    }
    if pool.kind(a) == Kind::Sin && pool.kind(b) == Kind::Cos {
        let inner_a = pool.child(a, 0)?;
        let inner_b = pool.child(b, 0)?;
        if deep_equal(pool, inner_a, inner_b) {
            return Some(unary(pool, Kind::Tan, copy_of(pool, inner_a)));
        }
    }
    None
}

fn simplify_power(pool: &Pool, a: NodeId, b: NodeId, params: &Parameters) -> Option<NodeId> {
    if let (Some(x), Some(y)) = (as_const(pool, a), as_const(pool, b)) {
        return Some(leaf_const(pool, x.powf(y), params));
    }
    if let Some(y) = as_const(pool, b) {
        if y == 0.0 {
            return Some(leaf_const(pool, 1.0, params));
        }
        if y == 1.0 {
            return Some(copy_of(pool, a));
        }
    }
    if let Some(x) = as_const(pool, a) {
        if x == 1.0 {
            return Some(leaf_const(pool, 1.0, params));
        }
    }
    if pool.kind(a) == Kind::Power {
        let base = pool.child(a, 0)?;
        let exp = pool.child(a, 1)?;
        if let (Some(e1), Some(e2)) = (as_const(pool, exp), as_const(pool, b)) {
            let merged = leaf_const(pool, e1 * e2, params);
            return Some(binary(pool, Kind::Power, copy_of(pool, base), merged));
        }
    }
    if pool.kind(a) == Kind::Inverse {
        let inner_a = pool.child(a, 0)?;
        if let Some(c) = as_const(pool, b) {
            let neg_c = leaf_const(pool, -c, params);
            return Some(binary(pool, Kind::Power, copy_of(pool, inner_a), neg_c));
        }
        let pow = binary(pool, Kind::Power, copy_of(pool, inner_a), copy_of(pool, b));
        return Some(unary(pool, Kind::Inverse, pow));
    }
    None
}

fn simplify_abs(pool: &Pool, a: NodeId, params: &Parameters) -> Option<NodeId> {
    if let Some(c) = as_const(pool, a) {
        return Some(leaf_const(pool, c.abs(), params));
    }
    match pool.kind(a) {
        Kind::Abs => Some(copy_of(pool, a)),
        Kind::Negative => {
            let inner = pool.child(a, 0)?;
            Some(unary(pool, Kind::Abs, copy_of(pool, inner)))
        }
        _ => None,
    }
}

fn simplify_trig(pool: &Pool, kind: Kind, a: NodeId, params: &Parameters) -> Option<NodeId> {
    let c = as_const(pool, a)?;
    let v = match kind {
        Kind::Sin => c.sin(),
        Kind::Cos => c.cos(),
        Kind::Tan => c.tan(),
        _ => unreachable!(),
    };
    Some(leaf_const(pool, v, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ops;
    use crate::parser::parse;

    fn simplified_form(expr: &str) -> String {
        let pool = Pool::new();
        let params = Parameters::default();
        let root = parse(&pool, expr).unwrap();
        let root = simplify_to_fixed_point(&pool, root, &params);
        ops::form(&pool, root)
    }

    #[test]
    fn folds_constant_arithmetic() {
        let pool = Pool::new();
        let params = Parameters::default();
        let root = parse(&pool, "add(1, 2)").unwrap();
        let root = simplify_to_fixed_point(&pool, root, &params);
        assert_eq!(pool.kind(root), Kind::Constant);
        assert_eq!(pool.value(root).scalar, 3.0);
    }

    #[test]
    fn drops_additive_identity() {
        assert_eq!(simplified_form("add(mul(1, var0), sub(var0, var0))"), "var");
    }

    #[test]
    fn double_negative_cancels() {
        let pool = Pool::new();
        let params = Parameters::default();
        let root = parse(&pool, "neg(neg(var0))").unwrap();
        let root = simplify_to_fixed_point(&pool, root, &params);
        assert_eq!(pool.kind(root), Kind::Variable);
    }

    #[test]
    fn double_inverse_cancels() {
        let pool = Pool::new();
        let params = Parameters::default();
        let root = parse(&pool, "inv(inv(var0))").unwrap();
        let root = simplify_to_fixed_point(&pool, root, &params);
        assert_eq!(pool.kind(root), Kind::Variable);
    }

    #[test]
    fn repeated_addend_becomes_a_product() {
        let pool = Pool::new();
        let params = Parameters::default();
        let root = parse(&pool, "add(var0, var0)").unwrap();
        let root = simplify_to_fixed_point(&pool, root, &params);
        assert_eq!(pool.kind(root), Kind::Multiply);
    }

    #[test]
    fn deny_simplify_operator_blocks_its_own_rewrites() {
        let pool = Pool::new();
        let mut params = Parameters::default();
        params.deny_simplify_operator = Some(Kind::Add);
        let root = parse(&pool, "add(1, 2)").unwrap();
        let root = simplify_to_fixed_point(&pool, root, &params);
        assert_eq!(pool.kind(root), Kind::Add);
    }
}
