use crate::error::ProbeError;
use crate::member::Member;
use crate::probe::PresenceProbe;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockReply {
    Present,
    Absent,
    Fail,
}

#[derive(Debug, Default)]
struct MockState {
    standing: HashMap<String, MockReply>,
    queued: HashMap<String, VecDeque<MockReply>>,
    calls: HashMap<String, usize>,
}

/// Scriptable probe. Clones share state, so a test can keep a handle while the
/// control loop owns the probe.
#[derive(Debug, Clone)]
pub struct MockProbe {
    default: MockReply,
    state: Arc<Mutex<MockState>>,
}

impl MockProbe {
    pub fn new(default: MockReply) -> Self {
        Self {
            default,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Reply for `member` on every call until changed.
    pub fn set(&self, member: &str, reply: MockReply) {
        if let Ok(mut state) = self.state.lock() {
            state.standing.insert(member.to_string(), reply);
        }
    }

    /// One-shot replies consumed before the standing reply.
    pub fn push(&self, member: &str, reply: MockReply) {
        if let Ok(mut state) = self.state.lock() {
            state
                .queued
                .entry(member.to_string())
                .or_default()
                .push_back(reply);
        }
    }

    pub fn calls(&self, member: &str) -> usize {
        self.state
            .lock()
            .map(|state| state.calls.get(member).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl PresenceProbe for MockProbe {
    fn probe(&mut self, member: &Member) -> Result<bool, ProbeError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ProbeError::Other("mock state poisoned".to_string()))?;
        *state.calls.entry(member.name().to_string()).or_default() += 1;

        let queued = state
            .queued
            .get_mut(member.name())
            .and_then(VecDeque::pop_front);
        let standing = state.standing.get(member.name()).copied();
        let reply = queued.or(standing).unwrap_or(self.default);

        match reply {
            MockReply::Present => Ok(true),
            MockReply::Absent => Ok(false),
            MockReply::Fail => Err(ProbeError::Other("mock transport failure".to_string())),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
