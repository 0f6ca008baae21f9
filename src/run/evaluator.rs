//! External evaluation: the simulation that turns a genome into a score.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::schema::{EvaluationConfig, EvaluationResult, KfGenome, ResultSchemaError};

/// Environment variable pointing the simulation at the genome file.
pub const GENOME_PATH_ENV: &str = "KF_GENOME_PATH";

/// How often a running simulation is polled when a timeout is set.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Where an evaluation writes its output: a directory plus a base file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLocation {
    pub dir: PathBuf,
    pub name: String,
}

impl OutputLocation {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(dir: P, name: S) -> Self {
        Self {
            dir: dir.into(),
            name: name.into(),
        }
    }

    /// Output location of an agent inside a run directory (`kf_output_<id>`).
    pub fn for_agent<P: AsRef<Path>>(run_dir: P, agent_id: u64) -> Self {
        Self::new(run_dir.as_ref(), format!("kf_output_{agent_id}"))
    }

    /// `<dir>/<name>.<extension>`
    pub fn file(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, extension))
    }
}

/// Everything an evaluator needs to score one agent.
#[derive(Debug, Clone)]
pub struct EvaluationRequest<'a> {
    pub agent_id: u64,
    pub generation: u32,
    pub genome: &'a KfGenome,
    pub output: OutputLocation,
}

/// Scores a genome. Lower scores are better.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<EvaluationResult, EvaluationError>;
}

impl<F> Evaluator for F
where
    F: Fn(&EvaluationRequest<'_>) -> Result<EvaluationResult, EvaluationError> + Send + Sync,
{
    fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<EvaluationResult, EvaluationError> {
        self(request)
    }
}

/// Turns an evaluator's output into a result.
pub trait ResultsReader: Send + Sync {
    fn read(&self, output: &OutputLocation) -> Result<EvaluationResult, EvaluationError>;

    /// Remove output left by an earlier attempt, so only a fresh run can be read.
    fn clear(&self, output: &OutputLocation) -> Result<(), EvaluationError>;
}

/// Reads `<dir>/<name>.json`: a JSON object with a numeric `Score`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResultsReader;

impl ResultsReader for JsonResultsReader {
    fn read(&self, output: &OutputLocation) -> Result<EvaluationResult, EvaluationError> {
        let path = output.file("json");
        let text = fs::read_to_string(&path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                EvaluationError::MissingResults { path: path.clone() }
            } else {
                EvaluationError::ReadResults {
                    path: path.clone(),
                    source,
                }
            }
        })?;

        let value: Value =
            serde_json::from_str(&text).map_err(|source| EvaluationError::ParseResults {
                path: path.clone(),
                source,
            })?;

        EvaluationResult::from_json(value)
            .map_err(|source| EvaluationError::Schema { path, source })
    }

    fn clear(&self, output: &OutputLocation) -> Result<(), EvaluationError> {
        let path = output.file("json");
        match fs::remove_file(&path) {
            Ok(()) => {
                log::debug!("Removed stale results {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(EvaluationError::ClearResults { path, source }),
        }
    }
}

/// Runs the simulation as a child process.
///
/// The genome is written to `<dir>/<name>.genome.json` and exposed through
/// [`GENOME_PATH_ENV`]; the process is invoked as `<program> <args..> <dir> <name>`
/// and must exit with status 0. Its results are then read with `R`.
#[derive(Debug, Clone)]
pub struct CommandEvaluator<R = JsonResultsReader> {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    reader: R,
}

impl CommandEvaluator {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
            reader: JsonResultsReader,
        }
    }

    pub fn from_config(config: &EvaluationConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
            .with_timeout(config.timeout_secs.map(Duration::from_secs))
    }
}

impl<R: ResultsReader> CommandEvaluator<R> {
    /// Kill the process and fail the evaluation after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a different results reader.
    pub fn with_reader<R2: ResultsReader>(self, reader: R2) -> CommandEvaluator<R2> {
        CommandEvaluator {
            program: self.program,
            args: self.args,
            timeout: self.timeout,
            reader,
        }
    }

    fn write_genome(&self, request: &EvaluationRequest<'_>) -> Result<PathBuf, EvaluationError> {
        let path = request.output.file("genome.json");
        serde_json::to_vec_pretty(request.genome)
            .map_err(io::Error::from)
            .and_then(|bytes| fs::write(&path, bytes))
            .map_err(|source| EvaluationError::WriteGenome {
                path: path.clone(),
                source,
            })?;
        Ok(path)
    }
}

impl<R: ResultsReader> Evaluator for CommandEvaluator<R> {
    fn evaluate(
        &self,
        request: &EvaluationRequest<'_>,
    ) -> Result<EvaluationResult, EvaluationError> {
        self.reader.clear(&request.output)?;
        let genome_path = self.write_genome(request)?;

        log::debug!(
            "Agent {}: running {} {:?} {} {}",
            request.agent_id,
            self.program,
            self.args,
            request.output.dir.display(),
            request.output.name
        );

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&request.output.dir)
            .arg(&request.output.name)
            .env(GENOME_PATH_ENV, &genome_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        if self.timeout.is_some() {
            // A timed out simulation is killed together with everything it started.
            own_process_group(&mut command);
        }

        let mut child = command.spawn().map_err(|source| EvaluationError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let status = wait_with_timeout(&mut child, self.timeout).map_err(|err| match err {
            WaitError::Io(source) => EvaluationError::Wait(source),
            WaitError::TimedOut(timeout) => EvaluationError::TimedOut {
                program: self.program.clone(),
                timeout,
            },
        })?;

        if !status.success() {
            return Err(EvaluationError::NonZeroExit {
                program: self.program.clone(),
                status,
            });
        }

        self.reader.read(&request.output)
    }
}

enum WaitError {
    Io(io::Error),
    TimedOut(Duration),
}

fn wait_with_timeout(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus, WaitError> {
    let Some(timeout) = timeout else {
        return child.wait().map_err(WaitError::Io);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait().map_err(WaitError::Io)? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            kill_process_group(child);
            // Reap it so no zombie is left behind.
            if let Err(err) = child.wait() {
                log::warn!("Failed to reap timed out process {}: {}", child.id(), err);
            }
            return Err(WaitError::TimedOut(timeout));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn own_process_group(command: &mut Command) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_command: &mut Command) {}

/// Kill `child` and every process in its group (the group id is the child's pid).
#[cfg(unix)]
fn kill_process_group(child: &mut Child) {
    let group = format!("-{}", child.id());
    let status = Command::new("kill")
        .args(["-KILL", "--", group.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => {}
        Ok(status) => {
            log::warn!(
                "kill {} exited with {}; killing {} only",
                group,
                status,
                child.id()
            );
            kill_child(child);
        }
        Err(err) => {
            log::warn!(
                "Failed to run kill for group {}: {}; killing {} only",
                group,
                err,
                child.id()
            );
            kill_child(child);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) {
    kill_child(child);
}

fn kill_child(child: &mut Child) {
    if let Err(err) = child.kill() {
        log::warn!("Failed to kill timed out process {}: {}", child.id(), err);
    }
}

/// Evaluation failures.
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Failed to write genome to {path}: {source}")]
    WriteGenome { path: PathBuf, source: io::Error },
    #[error("Failed to start {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("Failed waiting for evaluator: {0}")]
    Wait(io::Error),
    #[error("{program} exited with {status}")]
    NonZeroExit { program: String, status: ExitStatus },
    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
    #[error("Results file {path} was not produced")]
    MissingResults { path: PathBuf },
    #[error("Failed to remove stale results {path}: {source}")]
    ClearResults { path: PathBuf, source: io::Error },
    #[error("Failed to read results {path}: {source}")]
    ReadResults { path: PathBuf, source: io::Error },
    #[error("Failed to parse results {path}: {source}")]
    ParseResults {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid results {path}: {source}")]
    Schema {
        path: PathBuf,
        source: ResultSchemaError,
    },
    #[error("{0}")]
    Failed(String),
}
