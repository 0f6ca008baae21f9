//! Kalman filter covariance tuning with a generational genetic algorithm.
//!
//! A population of candidate `P`, `Q` and `R` diagonals ("agents") is scored
//! by an external simulation, ranked by error (lower is better) and bred with
//! linear rank-weighted selection and crossover, one generation at a time.
//!
//! # Architecture
//!
//! - `schema`: configuration, genome, evaluator result and summary record types
//! - `evolution`: agents, id allocation, genome operators and population management
//! - `run`: run context, summary persistence, evaluator/reporter collaborators
//!   and the run controller
//!
//! # Example
//!
//! ```rust
//! use kf_tuner::run::{EvaluationError, EvaluationRequest, NoopReporter, RunContext, RunController};
//! use kf_tuner::schema::{EvaluationResult, TunerConfig};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let mut config = TunerConfig::default();
//! config.population.size = 4;
//! config.population.max_generations = 1;
//! config.random_seed = Some(42);
//!
//! // Stand-in for the simulation: prefer small process noise.
//! let evaluator = |request: &EvaluationRequest<'_>| -> Result<EvaluationResult, EvaluationError> {
//!     Ok(EvaluationResult::from_score(request.genome.q.iter().sum()))
//! };
//!
//! let context = RunContext::provision(dir.path(), "example").unwrap();
//! let mut controller = RunController::new(config, context, evaluator, NoopReporter).unwrap();
//! let summary = controller.run().unwrap();
//!
//! assert_eq!(summary.total_evaluations, 8);
//! ```

pub mod evolution;
pub mod run;
pub mod schema;

// Re-export commonly used types
pub use evolution::{Agent, IdAllocator, PopulationManager};
pub use run::{RunContext, RunController, RunSummary};
pub use schema::{KfGenome, TunerConfig};
