//! Run identity and on-disk layout.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::evaluator::OutputLocation;
use super::summary::{SummaryError, SummaryWriter};

/// Timestamp format of run ids; sorts chronologically.
pub const RUN_ID_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Run id derived from the current local time.
pub fn timestamp_run_id() -> String {
    chrono::Local::now().format(RUN_ID_FORMAT).to_string()
}

/// Everything a run owns on disk: its identity, directory and summary sink.
///
/// ```text
/// <runs_dir>/run_<run_id>/
///   summary_<run_id>.csv
///   kf_output_<agent_id>.*   (evaluator outputs)
/// ```
pub struct RunContext {
    run_id: String,
    run_dir: PathBuf,
    summary: SummaryWriter,
}

impl RunContext {
    /// Create the run directory and its summary file (header included).
    ///
    /// Fails if the run directory already exists, so two runs never share files.
    pub fn provision<P: AsRef<Path>, S: Into<String>>(
        runs_dir: P,
        run_id: S,
    ) -> Result<Self, ProvisionError> {
        let run_id = run_id.into();
        let runs_dir = runs_dir.as_ref();
        fs::create_dir_all(runs_dir).map_err(|source| ProvisionError::CreateDir {
            path: runs_dir.to_path_buf(),
            source,
        })?;

        let run_dir = runs_dir.join(format!("run_{run_id}"));
        fs::create_dir(&run_dir).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                ProvisionError::RunExists(run_dir.clone())
            } else {
                ProvisionError::CreateDir {
                    path: run_dir.clone(),
                    source,
                }
            }
        })?;

        let summary = SummaryWriter::create(run_dir.join(format!("summary_{run_id}.csv")))?;
        log::info!("Provisioned run {} at {}", run_id, run_dir.display());

        Ok(Self {
            run_id,
            run_dir,
            summary,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn summary_path(&self) -> &Path {
        self.summary.path()
    }

    pub fn summary(&self) -> &SummaryWriter {
        &self.summary
    }

    pub fn summary_mut(&mut self) -> &mut SummaryWriter {
        &mut self.summary
    }

    /// Evaluator output location for an agent of this run.
    pub fn output_location(&self, agent_id: u64) -> OutputLocation {
        OutputLocation::for_agent(&self.run_dir, agent_id)
    }
}

/// Run provisioning errors.
#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    #[error("Run directory {0} already exists")]
    RunExists(PathBuf),
    #[error("Failed to create {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("Failed to create summary: {0}")]
    Summary(#[from] SummaryError),
}
