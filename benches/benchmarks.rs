criterion::criterion_main!(benches);
criterion::criterion_group! {
    name = benches;
    config = criterion::Criterion::default()
        .without_plots()
        .noise_threshold(3.0)
        .significance_level(0.01)
        .sample_size(10)
        .measurement_time(std::time::Duration::from_secs(1));
    targets =
        parsing_an_expression,
        simplifying_to_a_fixed_point,
        scoring_a_tree_against_samples,
        mutating_a_tree,
        stepping_the_evolutionary_engine,
}

fn parsing_an_expression(c: &mut criterion::Criterion) {
    let pool = symreg::node::Pool::new();
    c.bench_function("parse a nested expression", |b| {
        b.iter(|| symreg::parser::parse(&pool, "add(mul(2, var0), sin(sub(var1, 1)))"))
    });
}

fn simplifying_to_a_fixed_point(c: &mut criterion::Criterion) {
    let params = symreg::config::Parameters::default();
    let pool = symreg::node::Pool::new();
    let id = symreg::parser::parse(&pool, "add(mul(1, var0), sub(var0, var0))").unwrap();
    c.bench_function("simplify an expression to its fixed point", |b| {
        b.iter(|| symreg::simplify::simplify_to_fixed_point(&pool, id, &params))
    });
}

fn scoring_a_tree_against_samples(c: &mut criterion::Criterion) {
    let params = symreg::config::Parameters::default();
    let samples: Vec<(Vec<f64>, f64)> = (0..50)
        .map(|i| {
            let x = i as f64 * 0.1;
            (vec![x], 2.0 * x + 1.0)
        })
        .collect();
    c.bench_function("score a tree against 50 samples", |b| {
        b.iter(|| {
            let mut root = symreg::node::Root::from_expr("add(mul(2, var0), 1)").unwrap();
            root.score_against(&samples, &params);
            root.score
        })
    });
}

fn mutating_a_tree(c: &mut criterion::Criterion) {
    let params = symreg::config::Parameters::default();
    let mut rng = symreg::rng::default_rng();
    c.bench_function("mutate a tree a hundred times", |b| {
        b.iter(|| {
            let mut root = symreg::node::Root::random(&mut rng, &params, 3);
            for _ in 0..100 {
                root.mutate(&mut rng, &params, 3, 1);
            }
        })
    });
}

fn stepping_the_evolutionary_engine(c: &mut criterion::Criterion) {
    let params = symreg::config::Parameters {
        population_size: 40,
        ..symreg::config::Parameters::default()
    };
    let samples = symreg::io::csv::Samples {
        num_vars: 1,
        rows: (0..30)
            .map(|i| {
                let x = i as f64 * 0.1;
                (vec![x], 2.0 * x + 1.0)
            })
            .collect(),
    };
    let mut rng = symreg::rng::default_rng();
    let mut engine = symreg::ga::Engine::new(params, samples, &mut rng);
    c.bench_function("step the evolutionary engine once", |b| {
        b.iter(|| engine.step())
    });
}
