//! Command-line entry point (spec §4.14): `run`, `parse`, and `check`
//! subcommands over a single `clap`-derived enum, matching the teacher's
//! own flat `#[derive(Parser)] enum Query` shape.

use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use symreg::config;
use symreg::ga::Engine;
use symreg::io::csv;
use symreg::node::Root;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
enum Command {
    #[command(about = "Run the evolutionary search to completion")]
    Run {
        #[arg(long, required = true)]
        config: PathBuf,
        #[arg(long, required = true)]
        csv: PathBuf,
    },
    #[command(about = "Parse a single expression and print its round-tripped form")]
    Parse {
        #[arg(required = true)]
        expr: String,
    },
    #[command(about = "Load and validate a configuration file")]
    Check {
        #[arg(long, required = true)]
        config: PathBuf,
    },
}

/// Every recognised config key, in the camelCase spelling `config::load`
/// accepts, used by `check` to report which ones fell back to a default.
const RECOGNISED_KEYS: &[&str] = &[
    "populationSize",
    "generationCount",
    "maxScoreHistory",
    "survivalRatio",
    "targetComplexity",
    "defaultComplexity",
    "parsimonyRatio",
    "accuracyCompletion",
    "weighedMutation",
    "weightChance",
    "maxDuplicateRemoval",
    "populationCopyCount",
    "mutationCount",
    "decimalPrecision",
    "minConstant",
    "maxConstant",
    "minRmsClamp",
    "maxRmsClamp",
    "useRmsClamp",
    "constantChance",
    "operatorChance",
    "changeChance",
    "mutationChance",
    "useSqrtRms",
    "defaultCsv",
    "precalculatedTree",
    "singleThreaded",
    "operatorFunctions",
    "denySimplifyOperator",
    "complexityWeights",
    "variableDescriptors",
    "fitnessAlgo",
];

fn main() -> anyhow::Result<()> {
    symreg::logging::init();
    match Command::parse() {
        Command::Run { config: config_path, csv: csv_path } => run(&config_path, &csv_path),
        Command::Parse { expr } => parse_expr(&expr),
        Command::Check { config: config_path } => check(&config_path),
    }
}

fn run(config_path: &Path, csv_path: &Path) -> anyhow::Result<()> {
    let params = config::load(config_path)?;
    let samples = csv::load_samples(csv_path)?;
    let mut rng = symreg::rng::default_rng();
    let mut engine = Engine::new(params, samples, &mut rng);
    engine.run();
    Ok(())
}

fn parse_expr(expr: &str) -> anyhow::Result<()> {
    let root = Root::from_expr(expr).ok_or_else(|| anyhow::anyhow!("failed to parse {expr:?}"))?;
    println!("{}", root.string(4).green());
    Ok(())
}

fn check(config_path: &Path) -> anyhow::Result<()> {
    let params = config::load(config_path)?;
    let text = std::fs::read_to_string(config_path)?;
    let raw: serde_json::Value = serde_json::from_str(&text)?;
    for &key in RECOGNISED_KEYS {
        if raw.get(key).is_none() {
            println!("{} {}", key.yellow(), "defaulted".dimmed());
        }
    }
    println!(
        "{} populationSize={} generationCount={}",
        "loaded".green().bold(),
        params.population_size,
        params.generation_count
    );
    Ok(())
}
