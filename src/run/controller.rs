//! Run controller: drives evaluation, persistence and selection generation by generation.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::evolution::{
    Agent, AgentError, GenomeOperators, IdAllocator, PopulationManager, SelectionError,
};
use crate::schema::{AgentRecord, ConfigError, EvaluationResult, TunerConfig};

use super::context::RunContext;
use super::evaluator::{EvaluationError, EvaluationRequest, Evaluator, OutputLocation};
use super::reporter::{ReportError, Reporter};
use super::summary::SummaryError;

/// Where the run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Building generation 0.
    Init,
    /// Scoring the agents of a generation.
    Evaluating(u32),
    /// Breeding the next generation from a scored one.
    Selecting(u32),
    /// All generations evaluated and the report handed off.
    Done,
}

/// Fitness statistics of one evaluated generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    pub generation: u32,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub best_agent_id: u64,
    pub evaluations: usize,
}

/// Progress update passed to the run callback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    /// Current phase.
    pub phase: RunPhase,
    /// Last generation that will be evaluated.
    pub max_generations: u32,
    /// Agents per generation.
    pub population_size: usize,
    /// Agents evaluated so far in the current generation.
    pub evaluated_in_generation: usize,
    /// Agents evaluated so far in the run.
    pub total_evaluations: u64,
    /// Best record of the run so far.
    pub best: Option<AgentRecord>,
    /// Record written by the evaluation that triggered this update.
    pub latest: Option<AgentRecord>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub summary_path: PathBuf,
    /// Number of generations evaluated.
    pub generations: u32,
    pub total_evaluations: u64,
    /// Lowest-fitness record of the run.
    pub best: Option<AgentRecord>,
    /// Per-generation statistics.
    pub history: Vec<GenerationStats>,
    pub elapsed_seconds: f64,
}

/// Run bookkeeping updated as rows are persisted.
#[derive(Debug, Default)]
struct Ledger {
    total_evaluations: u64,
    evaluated_in_generation: usize,
    best: Option<AgentRecord>,
    history: Vec<GenerationStats>,
}

impl Ledger {
    fn observe(&mut self, record: &AgentRecord) {
        self.total_evaluations += 1;
        self.evaluated_in_generation += 1;
        let improves = self.best.as_ref().is_none_or(|best| {
            record
                .fitness
                .total_cmp(&best.fitness)
                .then(record.agent_id.cmp(&best.agent_id))
                .is_lt()
        });
        if improves {
            self.best = Some(record.clone());
        }
    }
}

/// Drives a tuning run through `Init → Evaluating → Selecting → … → Done`.
///
/// Generations `0..=max_generations` are evaluated. Every evaluation is
/// appended to the run's summary before the next one starts (or, with parallel
/// workers, as soon as it finishes).
pub struct RunController<E, R> {
    config: TunerConfig,
    context: RunContext,
    evaluator: E,
    reporter: R,
    manager: PopulationManager,
    ids: IdAllocator,
    ledger: Ledger,
    phase: RunPhase,
    cancelled: Arc<AtomicBool>,
}

impl<E: Evaluator, R: Reporter> RunController<E, R> {
    /// Create a controller. Fails before anything is evaluated if `config` is invalid.
    pub fn new(
        config: TunerConfig,
        context: RunContext,
        evaluator: E,
        reporter: R,
    ) -> Result<Self, RunError> {
        config.validate()?;

        let seed = config.random_seed.unwrap_or_else(rand::random);
        log::info!("Run {} using random seed {}", context.run_id(), seed);

        let operators = GenomeOperators::new(&config.operators, seed);
        let manager = PopulationManager::new(operators).with_initial_genome(config.initial_genome);

        Ok(Self {
            config,
            context,
            evaluator,
            reporter,
            manager,
            ids: IdAllocator::new(),
            ledger: Ledger::default(),
            phase: RunPhase::Init,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get cancellation handle. Setting it stops the run before the next evaluation.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Per-generation statistics recorded so far.
    pub fn history(&self) -> &[GenerationStats] {
        &self.ledger.history
    }

    /// Run to completion (blocking).
    pub fn run(&mut self) -> Result<RunSummary, RunError> {
        self.run_with_callback(|_| {})
    }

    /// Run to completion, reporting progress after every evaluation and phase change.
    pub fn run_with_callback<F>(&mut self, callback: F) -> Result<RunSummary, RunError>
    where
        F: Fn(&RunProgress) + Sync,
    {
        let start_time = Instant::now();
        let max_generations = self.config.population.max_generations;

        self.enter(RunPhase::Init, &callback);
        let mut population = self
            .manager
            .initialize(self.config.population.size, &self.ids);

        while let Some(generation) = population.first().map(Agent::generation) {
            if generation > max_generations {
                break;
            }

            self.ledger.evaluated_in_generation = 0;
            self.enter(RunPhase::Evaluating(generation), &callback);
            self.evaluate_generation(&mut population, &callback)?;

            let stats = generation_stats(generation, &population)?;
            log::info!(
                "Generation {}/{}: best fitness {:.6} (agent {}), mean {:.6}",
                generation,
                max_generations,
                stats.best_fitness,
                stats.best_agent_id,
                stats.mean_fitness
            );
            self.ledger.history.push(stats);

            self.enter(RunPhase::Selecting(generation), &callback);
            population = self.manager.advance(&population, &self.ids)?;
        }

        self.enter(RunPhase::Done, &callback);
        let summary_path = self.context.summary_path().to_path_buf();
        log::info!(
            "Run {} finished: {} rows in {}, {} agents created",
            self.context.run_id(),
            self.context.summary().rows(),
            summary_path.display(),
            self.ids.allocated()
        );
        if let Err(err) = self
            .reporter
            .report(&summary_path, self.config.reporting.combined)
        {
            log::error!("Reporting {} failed: {}", summary_path.display(), err);
            return Err(err.into());
        }

        Ok(RunSummary {
            run_id: self.context.run_id().to_string(),
            summary_path,
            generations: self.ledger.history.len() as u32,
            total_evaluations: self.ledger.total_evaluations,
            best: self.ledger.best.clone(),
            history: self.ledger.history.clone(),
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        })
    }

    fn enter<F: Fn(&RunProgress)>(&mut self, phase: RunPhase, callback: &F) {
        log::debug!("Entering {:?}", phase);
        self.phase = phase;
        callback(&progress(&self.ledger, phase, &self.config, None));
    }

    /// Evaluate and persist every agent of one generation.
    fn evaluate_generation<F>(
        &mut self,
        population: &mut [Agent],
        callback: &F,
    ) -> Result<(), RunError>
    where
        F: Fn(&RunProgress) + Sync,
    {
        let phase = self.phase;
        let config = &self.config;
        let evaluator = &self.evaluator;
        let cancelled = &self.cancelled;
        let run_dir = self.context.run_dir().to_path_buf();
        let sink = Mutex::new((&mut self.context, &mut self.ledger));

        let evaluate_one = |agent: &mut Agent| -> Result<(), RunError> {
            if cancelled.load(Ordering::Relaxed) {
                log::warn!("Run cancelled before agent {}", agent.id());
                return Err(RunError::Cancelled);
            }

            let result = {
                let request = EvaluationRequest {
                    agent_id: agent.id(),
                    generation: agent.generation(),
                    genome: agent.genome(),
                    output: OutputLocation::for_agent(&run_dir, agent.id()),
                };
                evaluate_with_retries(evaluator, &request, config.evaluation.max_retries)?
            };
            agent.record_result(result);
            let record = agent.to_record()?;

            let update = {
                let mut guard = sink.lock().unwrap_or_else(PoisonError::into_inner);
                let (context, ledger) = &mut *guard;
                context.summary_mut().append(&record).map_err(|source| {
                    log::error!(
                        "Failed to persist agent {} (generation {}): {}",
                        record.agent_id,
                        record.generation_number,
                        source
                    );
                    RunError::Persistence {
                        agent_id: record.agent_id,
                        generation: record.generation_number,
                        source,
                    }
                })?;
                ledger.observe(&record);
                progress(ledger, phase, config, Some(record))
            };
            callback(&update);
            Ok(())
        };

        match config.evaluation.parallel_workers {
            1 => population.iter_mut().try_for_each(&evaluate_one),
            workers => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()?;
                pool.install(|| population.par_iter_mut().try_for_each(&evaluate_one))
            }
        }
    }
}

fn progress(
    ledger: &Ledger,
    phase: RunPhase,
    config: &TunerConfig,
    latest: Option<AgentRecord>,
) -> RunProgress {
    RunProgress {
        phase,
        max_generations: config.population.max_generations,
        population_size: config.population.size,
        evaluated_in_generation: ledger.evaluated_in_generation,
        total_evaluations: ledger.total_evaluations,
        best: ledger.best.clone(),
        latest,
    }
}

/// Evaluate one agent, retrying up to `max_retries` extra times.
fn evaluate_with_retries<E: Evaluator + ?Sized>(
    evaluator: &E,
    request: &EvaluationRequest<'_>,
    max_retries: u32,
) -> Result<EvaluationResult, RunError> {
    let attempts = max_retries + 1;
    let mut attempt = 1;
    loop {
        match evaluator.evaluate(request) {
            Ok(result) => {
                log::debug!(
                    "Agent {} (generation {}) scored {}",
                    request.agent_id,
                    request.generation,
                    result.score
                );
                return Ok(result);
            }
            Err(err) if attempt < attempts => {
                log::warn!(
                    "Agent {} (generation {}) attempt {}/{} failed: {}",
                    request.agent_id,
                    request.generation,
                    attempt,
                    attempts,
                    err
                );
                attempt += 1;
            }
            Err(source) => {
                log::error!(
                    "Agent {} (generation {}) failed after {} attempt(s): {}",
                    request.agent_id,
                    request.generation,
                    attempts,
                    source
                );
                return Err(RunError::Evaluation {
                    agent_id: request.agent_id,
                    generation: request.generation,
                    attempts,
                    source,
                });
            }
        }
    }
}

fn generation_stats(generation: u32, population: &[Agent]) -> Result<GenerationStats, RunError> {
    let ranked = crate::evolution::rank(population)?;
    let best = ranked[0];
    let total: f64 = ranked.iter().filter_map(|agent| agent.fitness()).sum();
    Ok(GenerationStats {
        generation,
        best_fitness: best.fitness().unwrap_or(f64::NAN),
        mean_fitness: total / ranked.len() as f64,
        best_agent_id: best.id(),
        evaluations: ranked.len(),
    })
}

/// Run failures. Every variant aborts the run; rows already persisted stay on disk.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(
        "Evaluation of agent {agent_id} (generation {generation}) failed after {attempts} attempt(s): {source}"
    )]
    Evaluation {
        agent_id: u64,
        generation: u32,
        attempts: u32,
        source: EvaluationError,
    },
    #[error("Failed to persist agent {agent_id} (generation {generation}): {source}")]
    Persistence {
        agent_id: u64,
        generation: u32,
        source: SummaryError,
    },
    #[error("Selection failed: {0}")]
    Selection(#[from] SelectionError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("Reporting failed: {0}")]
    Report(#[from] ReportError),
    #[error("Failed to build evaluation thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Run cancelled")]
    Cancelled,
}
