//! Configuration: the `Parameters` struct enumerated in spec §6, loaded from
//! JSON. Unlike a blind `serde_json::from_str::<Parameters>`, each
//! recognised field is converted and validated individually so a single
//! malformed entry degrades to a warning and a default rather than aborting
//! the whole load (§7 item 1). A missing or top-level-invalid file is a
//! Data error and aborts (§7 item 2).

use crate::error::ConfigError;
use crate::op::Kind;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One row of a per-operator complexity table: `table_entry(kind, lhs, rhs)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperandTag {
    None,
    Constant,
    Operator,
}

#[derive(Debug, Clone, Copy)]
pub struct ComplexityEntry {
    pub lhs: OperandTag,
    pub rhs: OperandTag,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct FitnessConfig {
    pub enabled: bool,
    pub sample_ratio: f64,
    pub population_size: usize,
    pub iteration_count: usize,
    pub survival_ratio: f64,
    pub change_chance: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_ratio: 0.2,
            population_size: 30,
            iteration_count: 40,
            survival_ratio: 0.3,
            change_chance: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Parameters {
    pub population_size: usize,
    pub generation_count: usize,
    pub max_score_history: usize,
    pub survival_ratio: f64,
    pub target_complexity: f64,
    pub default_complexity: f64,
    pub parsimony_ratio: f64,
    pub accuracy_completion: f64,
    pub weighed_mutation: bool,
    pub weight_chance: f64,
    pub max_duplicate_removal: usize,
    pub population_copy_count: usize,
    pub mutation_count: usize,
    pub decimal_precision: i32,
    pub min_constant: f64,
    pub max_constant: f64,
    pub min_rms_clamp: f64,
    pub max_rms_clamp: f64,
    pub use_rms_clamp: bool,
    pub constant_chance: f64,
    pub operator_chance: f64,
    pub change_chance: f64,
    pub mutation_chance: f64,
    pub use_sqrt_rms: bool,
    pub default_csv: Option<String>,
    pub precalculated_tree: Option<String>,
    pub single_threaded: bool,
    pub operator_functions: Vec<Kind>,
    pub deny_simplify_operator: Option<Kind>,
    pub complexity_weights: HashMap<Kind, Vec<ComplexityEntry>>,
    pub variable_descriptors: Vec<String>,
    pub fitness: FitnessConfig,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            population_size: crate::DEFAULT_POPULATION_SIZE,
            generation_count: crate::DEFAULT_GENERATION_COUNT,
            max_score_history: crate::DEFAULT_MAX_SCORE_HISTORY,
            survival_ratio: crate::DEFAULT_SURVIVAL_RATIO,
            target_complexity: crate::DEFAULT_TARGET_COMPLEXITY,
            default_complexity: 1.0,
            parsimony_ratio: crate::DEFAULT_PARSIMONY_RATIO,
            accuracy_completion: crate::DEFAULT_ACCURACY,
            weighed_mutation: false,
            weight_chance: 0.5,
            max_duplicate_removal: 5,
            population_copy_count: 1,
            mutation_count: 1,
            decimal_precision: 4,
            min_constant: 1e-6,
            max_constant: 1e6,
            min_rms_clamp: -1e6,
            max_rms_clamp: 1e6,
            use_rms_clamp: true,
            constant_chance: 0.5,
            operator_chance: 0.5,
            change_chance: 0.3,
            mutation_chance: 0.8,
            use_sqrt_rms: true,
            default_csv: None,
            precalculated_tree: None,
            single_threaded: false,
            operator_functions: crate::op::ALL_OPERATORS.to_vec(),
            deny_simplify_operator: None,
            complexity_weights: HashMap::new(),
            variable_descriptors: Vec::new(),
            fitness: FitnessConfig::default(),
        }
    }
}

/// Mirrors the JSON document shape. Every field is optional so a partially
/// specified config still parses; absent fields fall back to
/// `Parameters::default()` during `reify`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawParameters {
    population_size: Option<usize>,
    generation_count: Option<usize>,
    max_score_history: Option<usize>,
    survival_ratio: Option<f64>,
    target_complexity: Option<f64>,
    default_complexity: Option<f64>,
    parsimony_ratio: Option<f64>,
    accuracy_completion: Option<f64>,
    weighed_mutation: Option<bool>,
    weight_chance: Option<f64>,
    max_duplicate_removal: Option<usize>,
    population_copy_count: Option<usize>,
    mutation_count: Option<usize>,
    decimal_precision: Option<i32>,
    min_constant: Option<f64>,
    max_constant: Option<f64>,
    min_rms_clamp: Option<f64>,
    max_rms_clamp: Option<f64>,
    use_rms_clamp: Option<bool>,
    constant_chance: Option<f64>,
    operator_chance: Option<f64>,
    change_chance: Option<f64>,
    mutation_chance: Option<f64>,
    use_sqrt_rms: Option<bool>,
    default_csv: Option<String>,
    precalculated_tree: Option<String>,
    single_threaded: Option<bool>,
    operator_functions: Option<Vec<String>>,
    deny_simplify_operator: Option<String>,
    complexity_weights: Option<HashMap<String, Vec<(String, String, f64)>>>,
    variable_descriptors: Option<Vec<String>>,
    fitness_algo: Option<RawFitness>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawFitness {
    enabled: Option<bool>,
    sample_ratio: Option<f64>,
    population_size: Option<usize>,
    iteration_count: Option<usize>,
    survival_ratio: Option<f64>,
    change_chance: Option<f64>,
}

fn parse_tag(s: &str) -> Option<OperandTag> {
    match s {
        "none" => Some(OperandTag::None),
        "const" | "constant" => Some(OperandTag::Constant),
        "op" | "operator" => Some(OperandTag::Operator),
        _ => None,
    }
}

/// Read and parse a config file. A missing file or invalid top-level JSON
/// is a Data error (§7 item 2) and aborts. Once the JSON parses, every
/// recognised field is individually validated; a malformed one logs a
/// warning and falls back to its default (§7 item 1) rather than failing
/// the whole load.
pub fn load(path: &Path) -> Result<Parameters, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Unreadable(path.to_path_buf(), e))?;
    let raw: RawParameters = serde_json::from_str(&text)
        .map_err(|e| ConfigError::Malformed(path.to_path_buf(), e))?;
    Ok(reify(raw))
}

fn reify(raw: RawParameters) -> Parameters {
    let defaults = Parameters::default();
    let mut params = defaults.clone();

    macro_rules! take {
        ($field:ident) => {
            if let Some(v) = raw.$field {
                params.$field = v;
            }
        };
    }
    take!(population_size);
    take!(generation_count);
    take!(max_score_history);
    take!(survival_ratio);
    take!(target_complexity);
    take!(default_complexity);
    take!(parsimony_ratio);
    take!(accuracy_completion);
    take!(weighed_mutation);
    take!(weight_chance);
    take!(max_duplicate_removal);
    take!(population_copy_count);
    take!(mutation_count);
    take!(decimal_precision);
    take!(min_constant);
    take!(max_constant);
    take!(min_rms_clamp);
    take!(max_rms_clamp);
    take!(use_rms_clamp);
    take!(constant_chance);
    take!(operator_chance);
    take!(change_chance);
    take!(mutation_chance);
    take!(use_sqrt_rms);
    take!(default_csv);
    take!(precalculated_tree);
    take!(single_threaded);
    take!(variable_descriptors);

    if let Some(names) = raw.operator_functions {
        let mut kinds = Vec::with_capacity(names.len());
        for name in names {
            match Kind::from_name(&name) {
                Some(k) => kinds.push(k),
                None => log::warn!("unknown operator {name:?} in operatorFunctions, skipping"),
            }
        }
        if kinds.is_empty() {
            log::warn!("operatorFunctions resolved to no known operators, using default set");
        } else {
            params.operator_functions = kinds;
        }
    }

    if let Some(name) = raw.deny_simplify_operator {
        match Kind::from_name(&name) {
            Some(k) => params.deny_simplify_operator = Some(k),
            None => log::warn!("unknown operator {name:?} in denySimplifyOperator, ignoring"),
        }
    }

    if let Some(table) = raw.complexity_weights {
        let mut weights = HashMap::new();
        for (op_name, rows) in table {
            let Some(kind) = Kind::from_name(&op_name) else {
                log::warn!("unknown operator {op_name:?} in complexityWeights, skipping");
                continue;
            };
            let mut entries = Vec::with_capacity(rows.len());
            for (lhs, rhs, weight) in rows {
                match (parse_tag(&lhs), parse_tag(&rhs)) {
                    (Some(lhs), Some(rhs)) => entries.push(ComplexityEntry { lhs, rhs, weight }),
                    _ => log::warn!(
                        "malformed complexityWeights entry for {op_name:?}: ({lhs:?}, {rhs:?})"
                    ),
                }
            }
            weights.insert(kind, entries);
        }
        params.complexity_weights = weights;
    }

    if let Some(fit) = raw.fitness_algo {
        let mut f = FitnessConfig::default();
        if let Some(v) = fit.enabled {
            f.enabled = v;
        }
        if let Some(v) = fit.sample_ratio {
            f.sample_ratio = v;
        }
        if let Some(v) = fit.population_size {
            f.population_size = v;
        }
        if let Some(v) = fit.iteration_count {
            f.iteration_count = v;
        }
        if let Some(v) = fit.survival_ratio {
            f.survival_ratio = v;
        }
        if let Some(v) = fit.change_chance {
            f.change_chance = v;
        }
        params.fitness = f;
    }

    params
}
