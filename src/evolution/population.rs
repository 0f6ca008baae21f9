//! Population lifecycle: initial population and rank-weighted reproduction.

use rand::distributions::{Distribution, WeightedIndex};

use crate::schema::KfGenome;

use super::agent::Agent;
use super::ids::IdAllocator;
use super::operators::GenomeOperators;

/// Builds generation 0 and breeds every following generation.
pub struct PopulationManager {
    operators: GenomeOperators,
    initial_genome: KfGenome,
}

impl PopulationManager {
    /// Create a manager that seeds generation 0 with the default genome.
    pub fn new(operators: GenomeOperators) -> Self {
        Self {
            operators,
            initial_genome: KfGenome::default(),
        }
    }

    /// Seed generation 0 with `genome` instead of the default.
    pub fn with_initial_genome(mut self, genome: KfGenome) -> Self {
        self.initial_genome = genome;
        self
    }

    /// Create `size` unevaluated agents of generation 0, ids ascending.
    pub fn initialize(&self, size: usize, ids: &IdAllocator) -> Vec<Agent> {
        (0..size)
            .map(|_| Agent::new(ids.next(), 0, self.initial_genome))
            .collect()
    }

    /// Breed the next generation from a fully evaluated one.
    ///
    /// Agents are ranked by fitness (ties by id), sorted position `i` is given
    /// weight `N - i`, `2N` parents are drawn with replacement, and child `k` is
    /// the crossover of draws `k` and `k + N`.
    pub fn advance(
        &mut self,
        population: &[Agent],
        ids: &IdAllocator,
    ) -> Result<Vec<Agent>, SelectionError> {
        let ranked = rank(population)?;
        let n = ranked.len();

        let dist = WeightedIndex::new(rank_weights(n)).map_err(SelectionError::Weights)?;
        let rng = self.operators.rng_mut();
        let parents: Vec<&Agent> = (0..2 * n).map(|_| ranked[dist.sample(rng)]).collect();

        log::debug!(
            "Generation {} ranked: best id {} (fitness {:?})",
            ranked[0].generation(),
            ranked[0].id(),
            ranked[0].fitness()
        );

        Ok((0..n)
            .map(|k| parents[k].crossover(parents[k + n], ids, &mut self.operators))
            .collect())
    }
}

/// Sort agents best-first: ascending fitness, ties broken by ascending id.
///
/// Fails if the population is empty or any agent is unevaluated.
pub fn rank(population: &[Agent]) -> Result<Vec<&Agent>, SelectionError> {
    if population.is_empty() {
        return Err(SelectionError::EmptyPopulation);
    }

    let mut ranked = Vec::with_capacity(population.len());
    for agent in population {
        let fitness = agent.fitness().ok_or(SelectionError::MissingFitness {
            id: agent.id(),
            generation: agent.generation(),
        })?;
        ranked.push((fitness, agent));
    }

    ranked.sort_by(|(fa, a), (fb, b)| fa.total_cmp(fb).then(a.id().cmp(&b.id())));
    Ok(ranked.into_iter().map(|(_, agent)| agent).collect())
}

/// Linear rank weights: `[n, n - 1, ..., 1]`.
pub fn rank_weights(n: usize) -> Vec<u64> {
    (0..n).map(|i| (n - i) as u64).collect()
}

/// Selection errors.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Cannot select parents from an empty population")]
    EmptyPopulation,
    #[error("Agent {id} of generation {generation} has no fitness")]
    MissingFitness { id: u64, generation: u32 },
    #[error("Invalid selection weights: {0}")]
    Weights(rand::distributions::WeightedError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OperatorConfig;
    use std::collections::HashSet;

    fn manager(seed: u64) -> PopulationManager {
        PopulationManager::new(GenomeOperators::new(&OperatorConfig::default(), seed))
    }

    fn evaluated(agents: Vec<Agent>, scores: &[f64]) -> Vec<Agent> {
        agents
            .into_iter()
            .zip(scores)
            .map(|(mut agent, score)| {
                agent.evaluate(*score);
                agent
            })
            .collect()
    }

    #[test]
    fn test_initialize() {
        let ids = IdAllocator::new();
        let population = manager(1).initialize(5, &ids);

        assert_eq!(population.len(), 5);
        let agent_ids: Vec<u64> = population.iter().map(Agent::id).collect();
        assert_eq!(agent_ids, vec![1, 2, 3, 4, 5]);
        assert!(population.iter().all(|a| a.generation() == 0));
        assert!(population.iter().all(|a| !a.is_evaluated()));
        assert!(population.iter().all(|a| a.genome() == &KfGenome::default()));
    }

    #[test]
    fn test_initial_genome_override() {
        let ids = IdAllocator::new();
        let genome = KfGenome::default().map(|v| v * 2.0);
        let population = manager(1).with_initial_genome(genome).initialize(2, &ids);
        assert!(population.iter().all(|a| a.genome() == &genome));
    }

    #[test]
    fn test_rank_ties_by_id() {
        let population = evaluated(
            vec![
                Agent::new(1, 0, KfGenome::default()),
                Agent::new(2, 0, KfGenome::default()),
                Agent::new(3, 0, KfGenome::default()),
            ],
            &[5.0, 2.0, 2.0],
        );

        let ranked: Vec<u64> = rank(&population).unwrap().iter().map(|a| a.id()).collect();
        assert_eq!(ranked, vec![2, 3, 1]);
        assert_eq!(rank_weights(3), vec![3, 2, 1]);
    }

    #[test]
    fn test_rank_rejects_unevaluated() {
        let mut population = vec![
            Agent::new(1, 2, KfGenome::default()),
            Agent::new(2, 2, KfGenome::default()),
        ];
        population[0].evaluate(1.0);

        assert!(matches!(
            rank(&population),
            Err(SelectionError::MissingFitness { id: 2, generation: 2 })
        ));
        assert!(matches!(rank(&[]), Err(SelectionError::EmptyPopulation)));
    }

    #[test]
    fn test_advance_sizes_and_ids() {
        let ids = IdAllocator::new();
        let mut manager = manager(7);
        let mut population = manager.initialize(6, &ids);
        let mut seen: HashSet<u64> = population.iter().map(Agent::id).collect();

        for generation in 1..=4u32 {
            let scores: Vec<f64> = (0..population.len()).map(|i| (i * 7 % 5) as f64).collect();
            let scored = evaluated(population, &scores);
            let max_prev = scored.iter().map(Agent::id).max().unwrap();

            population = manager.advance(&scored, &ids).unwrap();
            assert_eq!(population.len(), 6);
            for agent in &population {
                assert_eq!(agent.generation(), generation);
                assert!(agent.id() > max_prev);
                assert!(seen.insert(agent.id()), "duplicate id {}", agent.id());
                let (p1, p2) = agent.parents().unwrap();
                assert!(scored.iter().any(|a| a.id() == p1));
                assert!(scored.iter().any(|a| a.id() == p2));
            }
        }
    }

    #[test]
    fn test_advance_single_agent() {
        let ids = IdAllocator::new();
        let mut manager = manager(3);
        let population = evaluated(manager.initialize(1, &ids), &[1.0]);

        let next = manager.advance(&population, &ids).unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].parents(), Some((1, 1)));
    }

    #[test]
    fn test_advance_equal_fitness() {
        let ids = IdAllocator::new();
        let mut manager = manager(11);
        let population = evaluated(manager.initialize(4, &ids), &[3.0; 4]);
        assert_eq!(manager.advance(&population, &ids).unwrap().len(), 4);
    }

    #[test]
    fn test_selection_distribution() {
        // Each child's first parent is one weighted draw, so parent frequencies
        // must follow (N - i) / sum(N - j).
        let n = 5usize;
        let ids = IdAllocator::new();
        let mut manager = manager(2024);
        // Distinct fitness in reverse id order: id 5 is best.
        let population = evaluated(manager.initialize(n, &ids), &[5.0, 4.0, 3.0, 2.0, 1.0]);

        let mut counts = [0usize; 5];
        let rounds = 4000;
        for _ in 0..rounds {
            for child in manager.advance(&population, &ids).unwrap() {
                let (p1, p2) = child.parents().unwrap();
                for parent in [p1, p2] {
                    // id 5 -> rank 0, id 1 -> rank 4
                    counts[(n as u64 - parent) as usize] += 1;
                }
            }
        }

        let total: usize = counts.iter().sum();
        assert_eq!(total, rounds * 2 * n);
        let weight_sum: u64 = rank_weights(n).iter().sum();
        for (i, count) in counts.iter().enumerate() {
            let expected = (n - i) as f64 / weight_sum as f64;
            let observed = *count as f64 / total as f64;
            assert!(
                (observed - expected).abs() < 0.01,
                "rank {i}: observed {observed:.4}, expected {expected:.4}"
            );
        }
    }
}
