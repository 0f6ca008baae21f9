//! Configuration types for a tuning run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::KfGenome;

/// Top-level tuning run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunerConfig {
    /// Population and generation settings.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Crossover and mutation settings.
    #[serde(default)]
    pub operators: OperatorConfig,
    /// External evaluator settings.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Final report hand-off settings.
    #[serde(default)]
    pub reporting: ReportingConfig,
    /// Directory that holds one `run_<id>` directory per run.
    #[serde(default = "default_runs_dir")]
    pub runs_dir: PathBuf,
    /// Genome given to every agent of generation 0.
    #[serde(default)]
    pub initial_genome: KfGenome,
    /// Random seed for reproducibility.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            population: PopulationConfig::default(),
            operators: OperatorConfig::default(),
            evaluation: EvaluationConfig::default(),
            reporting: ReportingConfig::default(),
            runs_dir: default_runs_dir(),
            initial_genome: KfGenome::default(),
            random_seed: None,
        }
    }
}

fn default_runs_dir() -> PathBuf {
    PathBuf::from("runs")
}

/// Population and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopulationConfig {
    /// Number of agents in every generation.
    #[serde(default = "default_population_size")]
    pub size: usize,
    /// Last generation number that gets evaluated (generations `0..=max_generations` run).
    #[serde(default = "default_max_generations")]
    pub max_generations: u32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            size: default_population_size(),
            max_generations: default_max_generations(),
        }
    }
}

fn default_population_size() -> usize {
    5
}
fn default_max_generations() -> u32 {
    3
}

/// How a child genome is derived from its two parents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CrossoverPolicy {
    /// Arithmetic mean of the parents' fields.
    #[default]
    Average,
    /// Each field copied from one parent, chosen with equal probability.
    UniformPick,
    /// Each field blended with its own random weight in `[0, 1)`.
    Blend,
}

/// Multiplicative Gaussian mutation applied to freshly crossed genomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationConfig {
    /// Probability that a given field is perturbed (0.0-1.0).
    #[serde(default = "default_mutation_rate")]
    pub rate: f64,
    /// Relative standard deviation of the perturbation.
    #[serde(default = "default_mutation_strength")]
    pub strength: f64,
    /// Lower clamp for mutated values.
    #[serde(default = "default_mutation_floor")]
    pub min_value: f64,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            rate: default_mutation_rate(),
            strength: default_mutation_strength(),
            min_value: default_mutation_floor(),
        }
    }
}

fn default_mutation_rate() -> f64 {
    0.1
}
fn default_mutation_strength() -> f64 {
    0.1
}
fn default_mutation_floor() -> f64 {
    1e-9
}

/// Genome operator settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Crossover policy.
    #[serde(default)]
    pub crossover: CrossoverPolicy,
    /// Mutation; `None` disables it.
    #[serde(default)]
    pub mutation: Option<MutationConfig>,
}

/// External evaluator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Program that runs the simulation.
    #[serde(default = "default_evaluator_program")]
    pub program: String,
    /// Arguments placed before the output directory and output name.
    #[serde(default = "default_evaluator_args")]
    pub args: Vec<String>,
    /// Kill the simulation after this many seconds (no limit when unset).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Extra attempts after a failed evaluation before the run aborts.
    #[serde(default)]
    pub max_retries: u32,
    /// Concurrent evaluations (1 = sequential, 0 = one per CPU).
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            program: default_evaluator_program(),
            args: default_evaluator_args(),
            timeout_secs: None,
            max_retries: 0,
            parallel_workers: default_parallel_workers(),
        }
    }
}

fn default_evaluator_program() -> String {
    "bash".to_string()
}
fn default_evaluator_args() -> Vec<String> {
    vec!["run_sim.sh".to_string()]
}
fn default_parallel_workers() -> usize {
    1
}

/// Final report hand-off settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Whether to invoke the reporter once the run is done.
    #[serde(default = "default_reporting_enabled")]
    pub enabled: bool,
    /// Reporter program.
    #[serde(default = "default_reporter_program")]
    pub program: String,
    /// Arguments placed before the summary path and the combined flag.
    #[serde(default = "default_reporter_args")]
    pub args: Vec<String>,
    /// Ask the reporter for a combined view.
    #[serde(default = "default_combined")]
    pub combined: bool,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            enabled: default_reporting_enabled(),
            program: default_reporter_program(),
            args: default_reporter_args(),
            combined: default_combined(),
        }
    }
}

fn default_reporting_enabled() -> bool {
    true
}
fn default_reporter_program() -> String {
    "Rscript".to_string()
}
fn default_reporter_args() -> Vec<String> {
    vec![
        "--vanilla".to_string(),
        "functions/plot_cl_fitness.R".to_string(),
    ]
}
fn default_combined() -> bool {
    true
}

impl TunerConfig {
    /// Load a configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.population.size == 0 {
            return Err(ConfigError::EmptyPopulation);
        }

        if let Some(mutation) = &self.operators.mutation {
            if !(0.0..=1.0).contains(&mutation.rate) {
                return Err(ConfigError::InvalidMutationRate(mutation.rate));
            }
            if !mutation.strength.is_finite() || mutation.strength < 0.0 {
                return Err(ConfigError::InvalidMutationStrength(mutation.strength));
            }
            if !mutation.min_value.is_finite() || mutation.min_value <= 0.0 {
                return Err(ConfigError::InvalidMutationFloor(mutation.min_value));
            }
        }

        if self.evaluation.program.trim().is_empty() {
            return Err(ConfigError::MissingEvaluatorProgram);
        }
        if self.reporting.enabled && self.reporting.program.trim().is_empty() {
            return Err(ConfigError::MissingReporterProgram);
        }

        if let Some((field, value)) = self.initial_genome.first_invalid_field() {
            return Err(ConfigError::InvalidGenomeValue { field, value });
        }

        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Population size must be non-zero")]
    EmptyPopulation,
    #[error("Mutation rate {0} must be within [0, 1]")]
    InvalidMutationRate(f64),
    #[error("Mutation strength {0} must be finite and non-negative")]
    InvalidMutationStrength(f64),
    #[error("Mutation floor {0} must be finite and positive")]
    InvalidMutationFloor(f64),
    #[error("Evaluator program must be set")]
    MissingEvaluatorProgram,
    #[error("Reporter program must be set when reporting is enabled")]
    MissingReporterProgram,
    #[error("Initial genome field {field} = {value} must be finite and positive")]
    InvalidGenomeValue { field: &'static str, value: f64 },
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
