//! Final report hand-off once a run is done.

use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};

use crate::schema::ReportingConfig;

/// Consumes a finished summary file.
pub trait Reporter: Send + Sync {
    fn report(&self, summary_path: &Path, combined: bool) -> Result<(), ReportError>;
}

impl<T: Reporter + ?Sized> Reporter for &T {
    fn report(&self, summary_path: &Path, combined: bool) -> Result<(), ReportError> {
        (**self).report(summary_path, combined)
    }
}

impl<T: Reporter + ?Sized> Reporter for Box<T> {
    fn report(&self, summary_path: &Path, combined: bool) -> Result<(), ReportError> {
        (**self).report(summary_path, combined)
    }
}

/// Runs `<program> <args..> <summary_path> <true|false>`.
#[derive(Debug, Clone)]
pub struct CommandReporter {
    program: String,
    args: Vec<String>,
}

impl CommandReporter {
    pub fn new<S: Into<String>>(program: S, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

impl Reporter for CommandReporter {
    fn report(&self, summary_path: &Path, combined: bool) -> Result<(), ReportError> {
        log::info!(
            "Reporting {} with {} (combined: {})",
            summary_path.display(),
            self.program,
            combined
        );

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(summary_path)
            .arg(if combined { "true" } else { "false" })
            .status()
            .map_err(|source| ReportError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ReportError::NonZeroExit {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}

/// Skips reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn report(&self, summary_path: &Path, _combined: bool) -> Result<(), ReportError> {
        log::debug!("Reporting disabled; summary at {}", summary_path.display());
        Ok(())
    }
}

/// Reporter described by `config`: the command when enabled, otherwise a no-op.
pub fn reporter_from_config(config: &ReportingConfig) -> Box<dyn Reporter> {
    if config.enabled {
        Box::new(CommandReporter::new(
            config.program.clone(),
            config.args.clone(),
        ))
    } else {
        Box::new(NoopReporter)
    }
}

/// Reporting failures.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Failed to start reporter {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("Reporter {program} exited with {status}")]
    NonZeroExit { program: String, status: ExitStatus },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_reporting_is_noop() {
        let config = ReportingConfig {
            enabled: false,
            program: "kf-tuner-no-such-program".to_string(),
            ..Default::default()
        };
        assert!(reporter_from_config(&config).report(Path::new("x.csv"), true).is_ok());
    }

    #[test]
    fn test_missing_reporter_program() {
        let reporter = CommandReporter::new("kf-tuner-no-such-program", vec![]);
        assert!(matches!(
            reporter.report(Path::new("x.csv"), true),
            Err(ReportError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_command_reporter_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("args.txt");
        let script = format!(r#"printf '%s %s' "$1" "$2" > '{}'"#, marker.display());
        let reporter = CommandReporter::new("sh", vec!["-c".into(), script, "sh".into()]);

        reporter.report(Path::new("summary_x.csv"), true).unwrap();
        assert_eq!(
            std::fs::read_to_string(&marker).unwrap(),
            "summary_x.csv true"
        );

        let failing = CommandReporter::new("sh", vec!["-c".into(), "exit 1".into()]);
        assert!(matches!(
            failing.report(Path::new("summary_x.csv"), false),
            Err(ReportError::NonZeroExit { .. })
        ));
    }
}
