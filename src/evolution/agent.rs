//! Agents: one candidate genome with identity, generation tag and fitness.

use crate::schema::{AgentRecord, EvaluationResult, KfGenome};

use super::ids::IdAllocator;
use super::operators::GenomeOperators;

/// A candidate covariance parameter set.
///
/// The genome is fixed at creation. Fitness stays unset until the agent has
/// been evaluated; lower fitness is better.
#[derive(Debug, Clone)]
pub struct Agent {
    id: u64,
    generation: u32,
    genome: KfGenome,
    fitness: Option<f64>,
    results: Option<EvaluationResult>,
    parents: Option<(u64, u64)>,
}

impl Agent {
    /// Create an unevaluated agent.
    pub fn new(id: u64, generation: u32, genome: KfGenome) -> Self {
        Self {
            id,
            generation,
            genome,
            fitness: None,
            results: None,
            parents: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn genome(&self) -> &KfGenome {
        &self.genome
    }

    /// Fitness, if evaluated.
    pub fn fitness(&self) -> Option<f64> {
        self.fitness
    }

    /// Raw evaluator output, if recorded.
    pub fn results(&self) -> Option<&EvaluationResult> {
        self.results.as_ref()
    }

    /// Ids of the two parents this agent was crossed from.
    pub fn parents(&self) -> Option<(u64, u64)> {
        self.parents
    }

    pub fn is_evaluated(&self) -> bool {
        self.fitness.is_some()
    }

    /// Set fitness. A repeated call overwrites the previous score.
    pub fn evaluate(&mut self, score: f64) {
        self.fitness = Some(score);
    }

    /// Keep the evaluator output and take fitness from its `Score`.
    pub fn record_result(&mut self, result: EvaluationResult) {
        self.evaluate(result.score);
        self.results = Some(result);
    }

    /// Summary row for this agent.
    pub fn to_record(&self) -> Result<AgentRecord, AgentError> {
        let fitness = self
            .fitness
            .ok_or(AgentError::Unevaluated { id: self.id })?;
        Ok(AgentRecord::new(
            self.id,
            self.generation,
            &self.genome,
            fitness,
        ))
    }

    /// Produce a child of `self` and `other` in the next generation.
    pub fn crossover(
        &self,
        other: &Agent,
        ids: &IdAllocator,
        operators: &mut GenomeOperators,
    ) -> Agent {
        let genome = operators.crossover(&self.genome, &other.genome);
        Agent {
            id: ids.next(),
            generation: self.generation + 1,
            genome,
            fitness: None,
            results: None,
            parents: Some((self.id, other.id)),
        }
    }
}

/// Agent misuse errors.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Agent {id} has not been evaluated")]
    Unevaluated { id: u64 },
}
