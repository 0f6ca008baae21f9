//! Schema module - Configuration, genome and persisted record types for tuning runs.

mod config;
mod genome;
mod record;
mod results;

pub use config::*;
pub use genome::*;
pub use record::*;
pub use results::*;
