//! Persisted summary record schema.

use serde::{Deserialize, Serialize};

use super::KfGenome;

/// Summary file header, in column order.
pub const SUMMARY_HEADER: [&str; 15] = [
    "agent_id",
    "generation_number",
    "p_11",
    "p_22",
    "p_33",
    "p_44",
    "q_11",
    "q_22",
    "q_33",
    "q_44",
    "r_11",
    "r_22",
    "r_33",
    "r_44",
    "fitness",
];

/// One summary row: an evaluated agent.
///
/// Field order matches [`SUMMARY_HEADER`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub agent_id: u64,
    pub generation_number: u32,
    pub p_11: f64,
    pub p_22: f64,
    pub p_33: f64,
    pub p_44: f64,
    pub q_11: f64,
    pub q_22: f64,
    pub q_33: f64,
    pub q_44: f64,
    pub r_11: f64,
    pub r_22: f64,
    pub r_33: f64,
    pub r_44: f64,
    pub fitness: f64,
}

impl AgentRecord {
    /// Assemble a record from its parts.
    pub fn new(agent_id: u64, generation_number: u32, genome: &KfGenome, fitness: f64) -> Self {
        let [p_11, p_22, p_33, p_44] = genome.p;
        let [q_11, q_22, q_33, q_44] = genome.q;
        let [r_11, r_22, r_33, r_44] = genome.r;
        Self {
            agent_id,
            generation_number,
            p_11,
            p_22,
            p_33,
            p_44,
            q_11,
            q_22,
            q_33,
            q_44,
            r_11,
            r_22,
            r_33,
            r_44,
            fitness,
        }
    }

    /// Genome stored in this record.
    pub fn genome(&self) -> KfGenome {
        KfGenome {
            p: [self.p_11, self.p_22, self.p_33, self.p_44],
            q: [self.q_11, self.q_22, self.q_33, self.q_44],
            r: [self.r_11, self.r_22, self.r_33, self.r_44],
        }
    }
}
