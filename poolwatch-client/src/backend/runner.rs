//! Running the scheduler's command-line tools

use std::path::Path;
use std::process::Command;

use tracing::debug;

/// Captured result of one tool invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs an external program to completion
pub trait CommandRunner {
    /// Run `program` with `args`; `env` entries set (`Some`) or remove
    /// (`None`) variables for this invocation only
    fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &[(String, Option<String>)],
    ) -> std::io::Result<CommandOutput>;
}

/// Runner backed by `std::process::Command`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(
        &self,
        program: &Path,
        args: &[String],
        env: &[(String, Option<String>)],
    ) -> std::io::Result<CommandOutput> {
        let mut command = Command::new(program);
        command.args(args);
        for (name, value) in env {
            match value {
                Some(value) => command.env(name, value),
                None => command.env_remove(name),
            };
        }

        debug!("Running {} {}", program.display(), args.join(" "));
        let output = command.output()?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", program.display(), stderr.trim());
        }

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_system_runner_applies_env_per_call() {
        let output = SystemRunner
            .run(
                Path::new("sh"),
                &["-c".to_string(), "echo $_CONDOR_SPOOL".to_string()],
                &[("_CONDOR_SPOOL".to_string(), Some("/x".to_string()))],
            )
            .unwrap();

        assert!(output.success());
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "/x");
        assert!(std::env::var("_CONDOR_SPOOL").is_err());
    }

    #[test]
    fn test_system_runner_reports_exit_code() {
        let output = SystemRunner
            .run(Path::new("sh"), &["-c".to_string(), "exit 3".to_string()], &[])
            .unwrap();
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
    }

    #[test]
    fn test_system_runner_missing_program() {
        let result = SystemRunner.run(Path::new("/nonexistent/condor_q"), &[], &[]);
        assert!(result.is_err());
    }
}
