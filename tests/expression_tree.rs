//! Parser, simplifier, and tree-operation invariants (spec §8 "Invariants"
//! and "Algebraic identities", scenario 4).

use symreg::node::ops;
use symreg::node::{Pool, Root};

#[test]
fn parse_then_string_round_trips_the_form() {
    let pool = Pool::new();
    let id = symreg::parser::parse(&pool, "add(mul(2, var0), sin(var1))").unwrap();
    let text = ops::string(&pool, id, 4);
    let pool2 = Pool::new();
    let id2 = symreg::parser::parse(&pool2, &text).unwrap();
    assert_eq!(ops::form(&pool, id), ops::form(&pool2, id2));
}

#[test]
fn copy_preserves_score_against_the_same_data() {
    let params = symreg::config::Parameters::default();
    let data = vec![(vec![1.0, 2.0], 5.0), (vec![3.0, 4.0], 11.0)];
    let mut a = Root::from_expr("add(mul(2, var0), var1)").unwrap();
    a.score_against(&data, &params);

    let copy_pool = Pool::new();
    let copy_root = ops::copy(a.pool(), &copy_pool, a.root());
    let mut b = Root::from_expr("var0").unwrap();
    b.replace_tree(ops::copy(&copy_pool, b.pool(), copy_root));
    b.score_against(&data, &params);

    assert_eq!(a.score, b.score);
}

// Scenario 4: parse `add(mul(1, var0), sub(var0, var0))`, simplify to a
// fixed point, expect the string form to reduce to `var0`.
#[test]
fn simplifier_reduces_additive_and_multiplicative_identities_to_a_bare_variable() {
    let params = symreg::config::Parameters::default();
    let pool = Pool::new();
    let id = symreg::parser::parse(&pool, "add(mul(1, var0), sub(var0, var0))").unwrap();
    let simplified = symreg::simplify::simplify_to_fixed_point(&pool, id, &params);
    assert_eq!(ops::string(&pool, simplified, 4), "var0");
}

#[test]
fn double_inverse_and_double_negative_cancel() {
    let params = symreg::config::Parameters::default();

    let pool = Pool::new();
    let id = symreg::parser::parse(&pool, "inv(inv(var0))").unwrap();
    let simplified = symreg::simplify::simplify_to_fixed_point(&pool, id, &params);
    assert_eq!(ops::string(&pool, simplified, 4), "var0");

    let pool2 = Pool::new();
    let id2 = symreg::parser::parse(&pool2, "neg(neg(var0))").unwrap();
    let simplified2 = symreg::simplify::simplify_to_fixed_point(&pool2, id2, &params);
    assert_eq!(ops::string(&pool2, simplified2, 4), "var0");
}

#[test]
fn simplifier_is_idempotent_at_its_own_fixed_point() {
    let params = symreg::config::Parameters::default();
    let pool = Pool::new();
    let id = symreg::parser::parse(&pool, "add(mul(0, var0), sub(var1, var1))").unwrap();
    let once = symreg::simplify::simplify_to_fixed_point(&pool, id, &params);
    let twice = symreg::simplify::simplify_to_fixed_point(&pool, once, &params);
    assert_eq!(ops::string(&pool, once, 4), ops::string(&pool, twice, 4));
}

// Testable property (spec §8): `validate_node_tree(root) == SUCCESS` for
// any tree produced by the public parser/random-construction paths.
#[test]
fn validate_node_tree_succeeds_on_parsed_and_random_trees() {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use symreg::node::ReasonCode;

    let pool = Pool::new();
    let id = symreg::parser::parse(&pool, "add(mul(2, var0), sin(var1))").unwrap();
    assert_eq!(ops::validate_node_tree(&pool, id), ReasonCode::Success);

    let mut rng = SmallRng::seed_from_u64(7);
    let params = symreg::config::Parameters::default();
    let root = Root::random(&mut rng, &params, 3);
    assert_eq!(ops::validate_node_tree(root.pool(), root.root()), ReasonCode::Success);
}

#[test]
fn complexity_of_a_leaf_is_zero_and_a_matched_operator_entry_applies() {
    let mut weights = std::collections::HashMap::new();
    weights.insert(
        symreg::op::Kind::Add,
        vec![symreg::config::ComplexityEntry {
            lhs: symreg::config::OperandTag::Constant,
            rhs: symreg::config::OperandTag::Constant,
            weight: 3.0,
        }],
    );
    let pool = Pool::new();
    let leaf = symreg::parser::parse(&pool, "var0").unwrap();
    let tree = symreg::parser::parse(&pool, "add(var0, var1)").unwrap();
    let leaf_complexity = ops::complexity_of(&pool, leaf, &weights, 1.0);
    let tree_complexity = ops::complexity_of(&pool, tree, &weights, 1.0);
    assert_eq!(leaf_complexity, 0.0);
    assert_eq!(tree_complexity, 3.0);
}
