pub mod config;
pub mod dispatch;
pub mod error;
pub mod fitness;
pub mod ga;
pub mod io;
pub mod logging;
pub mod node;
pub mod op;
pub mod parser;
pub mod rng;
pub mod simplify;
pub mod viz;

/// scalar type used throughout the evaluator; matches the original `VTYPE`
pub type Scalar = f64;
/// RMS scores, parsimony weights, and mutation probabilities
pub type Probability = f64;

// node pool geometry
/// number of slots per arena slab
pub const SLAB_SIZE: usize = 48;

// defaults mirrored from `config::Parameters::default()`; kept here as the
// single source of truth the way the teacher keeps its tuning constants in
// `lib.rs` rather than scattering them across modules
pub const DEFAULT_POPULATION_SIZE: usize = 200;
pub const DEFAULT_GENERATION_COUNT: usize = 2_000;
pub const DEFAULT_SURVIVAL_RATIO: f64 = 0.4;
pub const DEFAULT_TARGET_COMPLEXITY: f64 = 10.0;
pub const DEFAULT_PARSIMONY_RATIO: f64 = 0.9;
pub const DEFAULT_ACCURACY: f64 = 0.01;
pub const DEFAULT_MAX_SCORE_HISTORY: usize = 50;
