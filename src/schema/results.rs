//! Evaluator result schema.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the result field that becomes an agent's fitness.
pub const SCORE_FIELD: &str = "Score";

/// Raw output of one evaluation.
///
/// Only `Score` is interpreted; every other field is carried along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Error score of the run (lower is better).
    #[serde(rename = "Score")]
    pub score: f64,
    /// Auxiliary diagnostic fields.
    #[serde(flatten)]
    pub diagnostics: Map<String, Value>,
}

impl EvaluationResult {
    /// Result carrying only a score.
    pub fn from_score(score: f64) -> Self {
        Self {
            score,
            diagnostics: Map::new(),
        }
    }

    /// Build from a parsed JSON document.
    ///
    /// Fails when the document is not an object or `Score` is missing or not a finite number.
    pub fn from_json(value: Value) -> Result<Self, ResultSchemaError> {
        let Value::Object(mut fields) = value else {
            return Err(ResultSchemaError::NotAnObject);
        };
        let score = match fields.remove(SCORE_FIELD) {
            None => return Err(ResultSchemaError::MissingScore),
            Some(raw) => raw
                .as_f64()
                .filter(|score| score.is_finite())
                .ok_or(ResultSchemaError::InvalidScore(raw))?,
        };
        Ok(Self {
            score,
            diagnostics: fields,
        })
    }
}

/// Result document shape errors.
#[derive(Debug, thiserror::Error)]
pub enum ResultSchemaError {
    #[error("Result document must be a JSON object")]
    NotAnObject,
    #[error("Result document has no `Score` field")]
    MissingScore,
    #[error("`Score` must be a finite number, got {0}")]
    InvalidScore(Value),
}
