use crate::command::run_with_timeout;
use crate::error::ProbeError;
use crate::member::Member;
use crate::probe::PresenceProbe;
use std::time::Duration;

pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);
// ping enforces its own deadline; this covers process start-up on top of it.
const SPAWN_SLACK: Duration = Duration::from_secs(1);

/// ICMP echo through the system `ping` binary.
#[derive(Debug, Clone)]
pub struct PingProbe {
    program: String,
    deadline: Duration,
}

impl PingProbe {
    pub fn new(deadline: Duration) -> Self {
        Self {
            program: "ping".to_string(),
            deadline,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Longest a single probe can block the caller.
    pub fn worst_case(&self) -> Duration {
        self.deadline + SPAWN_SLACK
    }

    fn args(&self, member: &Member) -> Vec<String> {
        let deadline_secs = self.deadline.as_secs().max(1);
        vec![
            "-c".to_string(),
            "1".to_string(),
            "-w".to_string(),
            deadline_secs.to_string(),
            member.identity().ip.to_string(),
        ]
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PING_TIMEOUT)
    }
}

impl PresenceProbe for PingProbe {
    fn probe(&mut self, member: &Member) -> Result<bool, ProbeError> {
        let output = run_with_timeout(&self.program, &self.args(member), self.worst_case())?;
        match replies_received(&output.stdout) {
            Some(count) => Ok(count > 0),
            // No summary line: 0 = replied, 1 = no reply, anything else is a ping failure.
            None => match output.code {
                Some(0) => Ok(true),
                Some(1) => Ok(false),
                code => Err(ProbeError::Other(format!(
                    "{} exited with {code:?} and no summary",
                    self.program
                ))),
            },
        }
    }

    fn name(&self) -> &'static str {
        "ping"
    }
}

/// Parses the `N received` count out of a ping summary line.
fn replies_received(stdout: &str) -> Option<u32> {
    stdout.lines().find_map(|line| {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        tokens.windows(2).find_map(|pair| {
            if pair[1].trim_end_matches(',') == "received" {
                pair[0].parse().ok()
            } else {
                None
            }
        })
    })
}
