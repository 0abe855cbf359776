use crate::error::AppError;
use crate::member::Member;
use crate::policy::LightAction;
use crate::tracker::HouseholdStatus;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq)]
pub struct MemberSnapshot {
    pub name: String,
    pub ip: String,
    pub mac: String,
    pub home: bool,
    pub home_count: u32,
    pub leave_count: u32,
    pub home_time: SystemTime,
    pub leave_time: SystemTime,
    pub last_seen: SystemTime,
    pub longest_idle: Duration,
}

impl From<&Member> for MemberSnapshot {
    fn from(member: &Member) -> Self {
        Self {
            name: member.name().to_string(),
            ip: member.identity().ip.to_string(),
            mac: member.identity().mac.to_string(),
            home: member.is_home(),
            home_count: member.home_count(),
            leave_count: member.leave_count(),
            home_time: member.home_time(),
            leave_time: member.leave_time(),
            last_seen: member.last_seen(),
            longest_idle: member.longest_idle(),
        }
    }
}

/// What the control loop last published after an iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdSnapshot {
    pub status: HouseholdStatus,
    pub members: Vec<MemberSnapshot>,
    pub last_action: LightAction,
    pub iteration: u64,
    pub timestamp: SystemTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterationFailure {
    pub reason: String,
    pub timestamp: SystemTime,
}

/// Lower bound on how old a snapshot may get before health reports `ko`.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

/// Read side for the status API. Only the control loop writes.
#[derive(Debug)]
pub struct AppState {
    snapshot: Option<HouseholdSnapshot>,
    snapshot_tx: watch::Sender<Option<HouseholdSnapshot>>,
    last_failure: Option<IterationFailure>,
    stale_after: Duration,
}

impl AppState {
    pub fn new() -> Self {
        let (snapshot_tx, _snapshot_rx) = watch::channel(None);
        Self {
            snapshot: None,
            snapshot_tx,
            last_failure: None,
            stale_after: DEFAULT_STALE_AFTER,
        }
    }

    /// Age past which the published snapshot means the loop has stalled.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn snapshot(&self) -> Option<&HouseholdSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<Option<HouseholdSnapshot>> {
        self.snapshot_tx.subscribe()
    }

    /// Stores the snapshot; subscribers are notified when any exist.
    pub fn set_snapshot(&mut self, snapshot: HouseholdSnapshot) -> Result<(), AppError> {
        self.snapshot = Some(snapshot.clone());
        if self.snapshot_tx.receiver_count() == 0 {
            return Ok(());
        }
        self.snapshot_tx
            .send(Some(snapshot))
            .map_err(|_| AppError::WatchSend)
    }

    pub fn last_failure(&self) -> Option<&IterationFailure> {
        self.last_failure.as_ref()
    }

    pub fn set_last_failure(&mut self, failure: Option<IterationFailure>) {
        self.last_failure = failure;
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
