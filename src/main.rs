//! kf-tuner CLI - Tune Kalman filter covariances from a JSON configuration.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use kf_tuner::{
    run::{CommandEvaluator, RunContext, RunController, reporter_from_config, timestamp_run_id},
    schema::TunerConfig,
};

#[derive(Parser)]
#[command(name = "kf-tuner")]
#[command(about = "Tune Kalman filter covariances with a genetic algorithm", long_about = None)]
struct Cli {
    /// Path to the tuning configuration (defaults are used when omitted)
    config: Option<PathBuf>,

    /// Print the default configuration and exit
    #[arg(long)]
    example: bool,

    /// Agents per generation
    #[arg(long)]
    population: Option<usize>,

    /// Last generation to evaluate
    #[arg(long)]
    max_generations: Option<u32>,

    /// Directory that receives the run directory
    #[arg(long)]
    runs_dir: Option<PathBuf>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the final report
    #[arg(long)]
    no_report: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    if cli.example {
        println!("{}", serde_json::to_string_pretty(&TunerConfig::default())?);
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => TunerConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TunerConfig::default(),
    };
    if let Some(size) = cli.population {
        config.population.size = size;
    }
    if let Some(max_generations) = cli.max_generations {
        config.population.max_generations = max_generations;
    }
    if let Some(runs_dir) = cli.runs_dir {
        config.runs_dir = runs_dir;
    }
    if let Some(seed) = cli.seed {
        config.random_seed = Some(seed);
    }
    if cli.no_report {
        config.reporting.enabled = false;
    }
    config.validate().context("invalid configuration")?;

    println!("Kalman Filter Tuning");
    println!("====================");
    println!("Population: {}", config.population.size);
    println!("Generations: 0..={}", config.population.max_generations);
    println!("Crossover: {:?}", config.operators.crossover);
    println!(
        "Evaluator: {} {}",
        config.evaluation.program,
        config.evaluation.args.join(" ")
    );
    println!();

    let context = RunContext::provision(&config.runs_dir, timestamp_run_id())
        .context("provisioning run directory")?;
    println!("Run directory: {}", context.run_dir().display());

    let evaluator = CommandEvaluator::from_config(&config.evaluation);
    let reporter = reporter_from_config(&config.reporting);
    let mut controller = RunController::new(config, context, evaluator, reporter)?;

    let summary = controller.run_with_callback(|progress| {
        if let Some(record) = &progress.latest {
            println!(
                "  Generation {} agent {}: fitness {:.6} ({}/{})",
                record.generation_number,
                record.agent_id,
                record.fitness,
                progress.evaluated_in_generation,
                progress.population_size
            );
        }
    })?;

    println!();
    println!("Summary: {}", summary.summary_path.display());
    println!(
        "Evaluations: {} over {} generations in {:.1}s",
        summary.total_evaluations, summary.generations, summary.elapsed_seconds
    );
    for stats in &summary.history {
        println!(
            "  Generation {}: best {:.6} (agent {}), mean {:.6}",
            stats.generation, stats.best_fitness, stats.best_agent_id, stats.mean_fitness
        );
    }
    if let Some(best) = &summary.best {
        println!("Best agent: {} (fitness {:.6})", best.agent_id, best.fitness);
        for (name, value) in best.genome().named_fields() {
            println!("  {name} = {value}");
        }
    }

    Ok(())
}
