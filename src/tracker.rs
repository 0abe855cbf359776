use crate::member::Member;
use crate::probe::PresenceProbe;
use serde::Serialize;
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

pub const DEFAULT_DEPARTURE_DEBOUNCE: Duration = Duration::from_secs(120);

/// Household-level view derived from the members plus the lighting bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HouseholdStatus {
    /// Latched darkness reading.
    pub dark: bool,
    /// Last commanded light state, not observed state.
    pub lights_on: bool,
    pub someone_home: bool,
    pub everyone_home: bool,
    /// An occupancy-affecting event happened since the last status emission.
    pub dirty: bool,
}

/// Result of one arrival or departure pass.
#[derive(Debug, Default)]
pub struct Scan {
    /// Members that changed state, as they are after the change.
    pub changed: Vec<Member>,
    /// Members whose probe errored this pass; their state is untouched.
    pub failed: Vec<String>,
}

#[derive(Debug)]
pub struct OccupancyTracker {
    members: Vec<Member>,
    status: HouseholdStatus,
}

impl OccupancyTracker {
    pub fn new(members: Vec<Member>) -> Self {
        let mut tracker = Self {
            members,
            status: HouseholdStatus::default(),
        };
        tracker.recompute_aggregates();
        tracker.status.dirty = false;
        tracker
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members.iter().find(|member| member.name() == name)
    }

    pub fn status(&self) -> &HouseholdStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut HouseholdStatus {
        &mut self.status
    }

    /// Clears the dirty flag, returning whether it was set.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.status.dirty)
    }

    pub fn scan_for_arrivals<P>(&mut self, probe: &mut P) -> Scan
    where
        P: PresenceProbe + ?Sized,
    {
        self.scan_for_arrivals_at(probe, SystemTime::now())
    }

    /// Probe every absent member; a positive answer is an arrival. Members
    /// already home are never probed here, so an arrival fires at most once.
    pub fn scan_for_arrivals_at<P>(&mut self, probe: &mut P, now: SystemTime) -> Scan
    where
        P: PresenceProbe + ?Sized,
    {
        let mut scan = Scan::default();
        for member in self.members.iter_mut().filter(|member| !member.home) {
            match probe.probe(member) {
                Ok(true) => {
                    member.home = true;
                    member.home_time = now;
                    member.home_count += 1;
                    member.mark_seen(now);
                    self.status.dirty = true;
                    debug!(
                        member = member.name(),
                        home_count = member.home_count,
                        "Member arrived"
                    );
                    scan.changed.push(member.clone());
                }
                Ok(false) => {}
                Err(err) => {
                    warn!(
                        member = member.name(),
                        mechanism = probe.name(),
                        error = %err,
                        "Arrival probe failed, treating as not seen"
                    );
                    scan.failed.push(member.name().to_string());
                }
            }
        }
        scan
    }

    pub fn scan_for_departures<P>(&mut self, probe: &mut P, debounce: Duration) -> Scan
    where
        P: PresenceProbe + ?Sized,
    {
        self.scan_for_departures_at(probe, debounce, SystemTime::now())
    }

    /// Probe every present member. A reply refreshes `last_seen`; a member is
    /// declared gone once unseen for longer than `debounce`. A failed probe
    /// counts as a negative reply, and a zero window means a single one is
    /// enough. Members whose arrival was recorded at `now` are skipped.
    pub fn scan_for_departures_at<P>(
        &mut self,
        probe: &mut P,
        debounce: Duration,
        now: SystemTime,
    ) -> Scan
    where
        P: PresenceProbe + ?Sized,
    {
        let mut scan = Scan::default();
        for member in self
            .members
            .iter_mut()
            .filter(|member| member.home && member.home_time != now)
        {
            member.note_idle(now);
            let unseen = |idle: Duration| debounce.is_zero() || idle > debounce;
            let gone = match probe.probe(member) {
                Ok(true) => {
                    member.mark_seen(now);
                    false
                }
                Ok(false) => unseen(member.idle_at(now)),
                Err(err) => {
                    warn!(
                        member = member.name(),
                        mechanism = probe.name(),
                        error = %err,
                        "Departure probe failed, treating as not seen"
                    );
                    scan.failed.push(member.name().to_string());
                    unseen(member.idle_at(now))
                }
            };

            if !gone {
                debug!(
                    member = member.name(),
                    idle_secs = member.idle_at(now).as_secs(),
                    "Member still considered home"
                );
                continue;
            }

            member.home = false;
            member.leave_time = now;
            member.leave_count += 1;
            self.status.dirty = true;
            debug!(
                member = member.name(),
                leave_count = member.leave_count,
                unseen_secs = member.idle_at(now).as_secs(),
                "Member left"
            );
            scan.changed.push(member.clone());
        }
        scan
    }

    /// Re-derive `someone_home` / `everyone_home`; marks the status dirty and
    /// returns true when either changed.
    pub fn recompute_aggregates(&mut self) -> bool {
        let someone_home = self.members.iter().any(Member::is_home);
        let everyone_home = self.members.iter().all(Member::is_home);
        let changed =
            someone_home != self.status.someone_home || everyone_home != self.status.everyone_home;
        self.status.someone_home = someone_home;
        self.status.everyone_home = everyone_home;
        if changed {
            self.status.dirty = true;
        }
        changed
    }
}
