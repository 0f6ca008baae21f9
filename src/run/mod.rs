//! Run orchestration: run identity, persistence, external collaborators and the generation loop.
//!
//! # Example
//!
//! ```rust,no_run
//! use kf_tuner::run::{CommandEvaluator, RunContext, RunController, reporter_from_config, timestamp_run_id};
//! use kf_tuner::schema::TunerConfig;
//!
//! let config = TunerConfig::default();
//! let context = RunContext::provision(&config.runs_dir, timestamp_run_id()).unwrap();
//! let evaluator = CommandEvaluator::from_config(&config.evaluation);
//! let reporter = reporter_from_config(&config.reporting);
//!
//! let mut controller = RunController::new(config, context, evaluator, reporter).unwrap();
//! let summary = controller.run().unwrap();
//! println!("Best: {:?}", summary.best);
//! ```

mod context;
mod controller;
mod evaluator;
mod reporter;
mod summary;

pub use context::{ProvisionError, RUN_ID_FORMAT, RunContext, timestamp_run_id};
pub use controller::{GenerationStats, RunController, RunError, RunPhase, RunProgress, RunSummary};
pub use evaluator::{
    CommandEvaluator, EvaluationError, EvaluationRequest, Evaluator, GENOME_PATH_ENV,
    JsonResultsReader, OutputLocation, ResultsReader,
};
pub use reporter::{CommandReporter, NoopReporter, ReportError, Reporter, reporter_from_config};
pub use summary::{SummaryError, SummaryWriter, read_summary};
