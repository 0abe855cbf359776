//! Bounded-time execution of the external tools used for probing and
//! actuation (`ping`, `hue`, `flux_led`).

use crate::error::{ActuatorError, ProbeError};
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

const POLL_STEP: Duration = Duration::from_millis(20);

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
}

/// Run `program args..` and wait at most `timeout` for it to exit. The child is
/// killed when the deadline passes.
pub fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    debug!(program, ?args, "Running command");
    let spawn_err = |source| CommandError::Spawn {
        program: program.to_string(),
        source,
    };

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(spawn_err)?;

    // Drain stdout while waiting so a chatty child cannot block on a full pipe.
    let pipe = child.stdout.take();
    let reader = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let start = Instant::now();
    let status = loop {
        match child.try_wait().map_err(spawn_err)? {
            Some(status) => break status,
            None if start.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(CommandError::Timeout {
                    program: program.to_string(),
                    timeout,
                });
            }
            None => std::thread::sleep(POLL_STEP),
        }
    };

    let stdout = reader.join().unwrap_or_default();
    Ok(CommandOutput {
        success: status.success(),
        code: status.code(),
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
    })
}

impl From<CommandError> for ProbeError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Spawn { program, source } => ProbeError::Spawn { program, source },
            CommandError::Timeout { program, timeout } => ProbeError::Timeout {
                program,
                timeout_ms: timeout.as_millis(),
            },
        }
    }
}

impl From<CommandError> for ActuatorError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Spawn { program, source } => ActuatorError::Spawn { program, source },
            CommandError::Timeout { program, timeout } => ActuatorError::Timeout {
                program,
                timeout_ms: timeout.as_millis(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_spawn_error() {
        let result = run_with_timeout(
            "home-presence-definitely-not-a-binary",
            &[],
            Duration::from_secs(1),
        );

        assert!(matches!(result, Err(CommandError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_of_finished_command() -> Result<(), CommandError> {
        let output = run_with_timeout("echo", &["1 received".to_string()], Duration::from_secs(2))?;

        assert!(output.success);
        assert_eq!(output.stdout.trim(), "1 received");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn large_output_does_not_stall_the_child() -> Result<(), CommandError> {
        let output = run_with_timeout(
            "sh",
            &["-c".to_string(), "yes received | head -n 40000".to_string()],
            Duration::from_secs(5),
        )?;

        assert!(output.success);
        assert_eq!(output.stdout.lines().count(), 40000);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn slow_command_is_killed_at_deadline() {
        let result = run_with_timeout("sleep", &["5".to_string()], Duration::from_millis(100));

        assert!(matches!(result, Err(CommandError::Timeout { .. })));
    }

    #[test]
    fn command_errors_convert_into_collaborator_errors() {
        let probe: ProbeError = CommandError::Timeout {
            program: "ping".to_string(),
            timeout: Duration::from_secs(2),
        }
        .into();
        assert_eq!(probe.to_string(), "ping timed out after 2000ms");

        let actuator: ActuatorError = CommandError::Timeout {
            program: "hue".to_string(),
            timeout: Duration::from_millis(500),
        }
        .into();
        assert_eq!(actuator.to_string(), "hue timed out after 500ms");
    }
}
