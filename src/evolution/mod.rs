//! Evolutionary engine for covariance tuning.
//!
//! # Overview
//!
//! - **Agents** (`agent`): genome, identity, generation tag and fitness
//! - **Id Allocation** (`ids`): run-wide unique, monotonically increasing ids
//! - **Genome Operators** (`operators`): crossover and optional mutation
//! - **Population Management** (`population`): generation 0 and rank-weighted reproduction
//!
//! # Example
//!
//! ```rust
//! use kf_tuner::evolution::{GenomeOperators, IdAllocator, PopulationManager};
//! use kf_tuner::schema::OperatorConfig;
//!
//! let ids = IdAllocator::new();
//! let mut manager = PopulationManager::new(GenomeOperators::new(&OperatorConfig::default(), 42));
//!
//! let mut population = manager.initialize(4, &ids);
//! for (i, agent) in population.iter_mut().enumerate() {
//!     agent.evaluate(i as f64);
//! }
//!
//! let next = manager.advance(&population, &ids).unwrap();
//! assert_eq!(next.len(), 4);
//! assert!(next.iter().all(|agent| agent.generation() == 1));
//! ```

mod agent;
mod ids;
mod operators;
mod population;

pub use agent::{Agent, AgentError};
pub use ids::IdAllocator;
pub use operators::GenomeOperators;
pub use population::{PopulationManager, SelectionError, rank, rank_weights};
