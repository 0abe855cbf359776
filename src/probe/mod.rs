use crate::error::ProbeError;
use crate::member::Member;
use tracing::debug;

pub mod arp;
pub mod mock;
pub mod ping;

/// Answers "is this member's device reachable right now?".
///
/// `Ok(false)` means the device did not answer. `Err` is reserved for the
/// mechanism itself failing (tool missing, timeout, unreadable table).
pub trait PresenceProbe {
    fn probe(&mut self, member: &Member) -> Result<bool, ProbeError>;

    fn name(&self) -> &'static str;
}

impl PresenceProbe for Box<dyn PresenceProbe + Send> {
    fn probe(&mut self, member: &Member) -> Result<bool, ProbeError> {
        (**self).probe(member)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Several mechanisms asked in order. Present if any reports present; an
/// error only when every mechanism errored.
pub struct CombinedProbe {
    probes: Vec<Box<dyn PresenceProbe + Send>>,
}

impl CombinedProbe {
    pub fn new(probes: Vec<Box<dyn PresenceProbe + Send>>) -> Self {
        Self { probes }
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

impl PresenceProbe for CombinedProbe {
    fn probe(&mut self, member: &Member) -> Result<bool, ProbeError> {
        let mut last_err = None;
        let mut answered = false;
        for probe in &mut self.probes {
            match probe.probe(member) {
                Ok(true) => {
                    debug!(member = member.name(), mechanism = probe.name(), "Device responded");
                    return Ok(true);
                }
                Ok(false) => answered = true,
                Err(err) => {
                    debug!(
                        member = member.name(),
                        mechanism = probe.name(),
                        error = %err,
                        "Probe mechanism failed"
                    );
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) if !answered => Err(err),
            _ => Ok(false),
        }
    }

    fn name(&self) -> &'static str {
        "combined"
    }
}
