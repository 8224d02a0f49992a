//! Scenario 6 (spec §8 "pool memory"): build a tree, mutate it many times,
//! free it, and confirm its pool's live count returns to zero.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use symreg::config::Parameters;
use symreg::node::Root;
use symreg::node::ops::free_all;

#[test]
fn ten_thousand_random_mutations_then_a_free_drains_the_pool() {
    let mut rng = SmallRng::seed_from_u64(99);
    let params = Parameters::default();
    let mut root = Root::random(&mut rng, &params, 3);

    for _ in 0..10_000 {
        root.mutate(&mut rng, &params, 3, 1);
    }

    assert!(root.pool().live_count() > 0);
    free_all(root.pool(), root.root());
    assert_eq!(root.pool().live_count(), 0);
}

#[test]
fn freeing_a_freshly_parsed_tree_drains_its_own_pool_only() {
    let pool_a = symreg::node::Pool::new();
    let id_a = symreg::parser::parse(&pool_a, "add(mul(2, var0), sin(var1))").unwrap();
    let pool_b = symreg::node::Pool::new();
    let _id_b = symreg::parser::parse(&pool_b, "var0").unwrap();

    assert!(pool_a.live_count() > 0);
    assert!(pool_b.live_count() > 0);

    free_all(&pool_a, id_a);

    assert_eq!(pool_a.live_count(), 0);
    assert_eq!(pool_b.live_count(), 1);
}
