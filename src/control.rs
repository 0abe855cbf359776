//! The polling loop: darkness, actuation, presence scans, status.

use crate::audit::AuditSink;
use crate::daylight::DaylightOracle;
use crate::error::AppError;
use crate::lights::{FlashPattern, LightActuator, flash};
use crate::member::Member;
use crate::policy::{DarknessChange, DarknessLatch, LightAction, decide, should_flash};
use crate::probe::PresenceProbe;
use crate::state::{AppState, HouseholdSnapshot, IterationFailure, MemberSnapshot};
use crate::tracker::{DEFAULT_DEPARTURE_DEBOUNCE, OccupancyTracker, Scan};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, error, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_ERROR_PAUSE: Duration = Duration::from_secs(1);
pub const DEFAULT_STATUS_INTERVAL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy)]
pub struct ControlSettings {
    pub poll_interval: Duration,
    pub error_pause: Duration,
    pub departure_debounce: Duration,
    pub status_interval: Duration,
    pub defer_dusk_while_home: bool,
    pub flash: FlashPattern,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            error_pause: DEFAULT_ERROR_PAUSE,
            departure_debounce: DEFAULT_DEPARTURE_DEBOUNCE,
            status_interval: DEFAULT_STATUS_INTERVAL,
            defer_dusk_while_home: true,
            flash: FlashPattern::default(),
        }
    }
}

/// What one iteration did. Collaborator failures land here instead of
/// aborting the iteration.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IterationReport {
    pub darkness: Option<DarknessChange>,
    pub oracle_failed: bool,
    pub arrivals: Vec<String>,
    pub departures: Vec<String>,
    pub probe_failures: Vec<String>,
    pub actions: Vec<LightAction>,
    pub flashed: Vec<String>,
    pub actuator_failures: u32,
    pub audit_failures: u32,
    pub status_emitted: bool,
}

impl IterationReport {
    pub fn last_action(&self) -> LightAction {
        self.actions.last().copied().unwrap_or(LightAction::NoAction)
    }
}

/// Owns every piece of process state for the lifetime of the loop.
pub struct ControlLoop<P, D, L, A> {
    tracker: OccupancyTracker,
    latch: DarknessLatch,
    probe: P,
    daylight: D,
    lights: L,
    audit: A,
    settings: ControlSettings,
    shared: Option<Arc<RwLock<AppState>>>,
    last_status: Option<SystemTime>,
    last_action: LightAction,
    iteration: u64,
}

impl<P, D, L, A> ControlLoop<P, D, L, A>
where
    P: PresenceProbe,
    D: DaylightOracle,
    L: LightActuator,
    A: AuditSink,
{
    pub fn new(
        members: Vec<Member>,
        probe: P,
        daylight: D,
        lights: L,
        audit: A,
        settings: ControlSettings,
    ) -> Self {
        Self {
            tracker: OccupancyTracker::new(members),
            latch: DarknessLatch::new(settings.defer_dusk_while_home),
            probe,
            daylight,
            lights,
            audit,
            settings,
            shared: None,
            last_status: None,
            last_action: LightAction::NoAction,
            iteration: 0,
        }
    }

    /// Publish a snapshot into `state` after every iteration.
    pub fn with_shared_state(mut self, state: Arc<RwLock<AppState>>) -> Self {
        self.shared = Some(state);
        self
    }

    pub fn tracker(&self) -> &OccupancyTracker {
        &self.tracker
    }

    pub fn run_iteration(&mut self) -> Result<IterationReport, AppError> {
        self.run_iteration_at(SystemTime::now())
    }

    /// One pass. Arrivals are scanned before departures, and a member that
    /// arrived in this pass is not considered for departure until the next.
    pub fn run_iteration_at(&mut self, now: SystemTime) -> Result<IterationReport, AppError> {
        self.iteration += 1;
        let mut report = IterationReport::default();

        self.refresh_darkness(now, &mut report);

        if !self.tracker.status().someone_home {
            self.settle_lights(now, &mut report);
            let scan = self.tracker.scan_for_arrivals_at(&mut self.probe, now);
            self.handle_arrivals(scan, now, &mut report);
        } else {
            self.settle_lights(now, &mut report);
            if !self.tracker.status().everyone_home {
                let scan = self.tracker.scan_for_arrivals_at(&mut self.probe, now);
                self.handle_arrivals(scan, now, &mut report);
            }
            let scan = self.tracker.scan_for_departures_at(
                &mut self.probe,
                self.settings.departure_debounce,
                now,
            );
            self.handle_departures(scan, now, &mut report);
        }

        self.tracker.recompute_aggregates();
        self.settle_lights(now, &mut report);

        let interval_elapsed = match self.last_status {
            None => true,
            Some(last) => now
                .duration_since(last)
                .map(|elapsed| elapsed >= self.settings.status_interval)
                .unwrap_or(true),
        };
        if self.tracker.status().dirty || interval_elapsed {
            self.emit_status(now, &mut report);
        }

        if let Some(action) = report.actions.last() {
            self.last_action = *action;
        }
        self.publish(now)?;
        Ok(report)
    }

    /// Loop until `stop` is set, then emit a final status dump.
    pub fn run(&mut self, stop: &AtomicBool) {
        info!(
            members = self.tracker.members().len(),
            poll_ms = self.settings.poll_interval.as_millis(),
            debounce_secs = self.settings.departure_debounce.as_secs(),
            "Control loop starting"
        );

        while !stop.load(Ordering::Relaxed) {
            let cycle_start = Instant::now();
            match self.run_iteration() {
                Ok(report) => {
                    debug!(iteration = self.iteration, ?report, "Iteration complete");
                    self.record_failure(None);
                }
                Err(err) => {
                    error!(iteration = self.iteration, error = %err, "Iteration failed");
                    self.record_failure(Some(IterationFailure {
                        reason: err.to_string(),
                        timestamp: SystemTime::now(),
                    }));
                    sleep_with_stop(self.settings.error_pause, stop, Instant::now());
                }
            }
            sleep_with_stop(self.settings.poll_interval, stop, cycle_start);
        }

        let mut report = IterationReport::default();
        self.emit_status(SystemTime::now(), &mut report);
        info!(iterations = self.iteration, "Control loop stopped");
    }

    fn refresh_darkness(&mut self, now: SystemTime, report: &mut IterationReport) {
        match self.daylight.is_dark() {
            Ok(reading) => {
                let someone_home = self.tracker.status().someone_home;
                if let Some(change) = self.latch.observe(reading, someone_home) {
                    let text = match change {
                        DarknessChange::Dusk => "Darkness comes!",
                        DarknessChange::Dawn => "Sun has risen!",
                    };
                    self.event(text, now, report);
                    report.darkness = Some(change);
                } else if reading != self.latch.is_dark() {
                    debug!(reading, "Dusk deferred while someone is home");
                }
            }
            Err(err) => {
                warn!(error = %err, dark = self.latch.is_dark(), "Darkness check failed, keeping previous value");
                report.oracle_failed = true;
            }
        }
        self.tracker.status_mut().dark = self.latch.is_dark();
    }

    fn settle_lights(&mut self, now: SystemTime, report: &mut IterationReport) {
        let status = *self.tracker.status();
        let action = decide(
            status.someone_home,
            status.everyone_home,
            status.dark,
            status.lights_on,
        );
        let (result, lights_on, text) = match action {
            LightAction::NoAction => return,
            LightAction::TurnOn => (self.lights.turn_on(), true, "Lights on!"),
            LightAction::TurnOff => (self.lights.turn_off(), false, "Lights off!"),
        };
        if let Err(err) = result {
            warn!(?action, error = %err, "Light command failed");
            report.actuator_failures += 1;
        }
        // Bookkeeping follows the intent; the bulbs are never read back.
        self.tracker.status_mut().lights_on = lights_on;
        self.event(text, now, report);
        report.actions.push(action);
    }

    fn handle_arrivals(&mut self, scan: Scan, now: SystemTime, report: &mut IterationReport) {
        report.probe_failures.extend(scan.failed);
        for member in scan.changed {
            self.event(&format!("{} is home!", member.name()), now, report);
            self.tracker.recompute_aggregates();
            if should_flash(self.tracker.status().lights_on) {
                flash(&mut self.lights, member.color(), self.settings.flash);
                report.flashed.push(member.name().to_string());
            }
            report.arrivals.push(member.name().to_string());
        }
    }

    fn handle_departures(&mut self, scan: Scan, now: SystemTime, report: &mut IterationReport) {
        report.probe_failures.extend(scan.failed);
        for member in scan.changed {
            self.event(&format!("{} has left!", member.name()), now, report);
            report.departures.push(member.name().to_string());
        }
    }

    fn event(&mut self, text: &str, now: SystemTime, report: &mut IterationReport) {
        if let Err(err) = self.audit.record_event(text, now) {
            warn!(event = text, error = %err, "Failed to record event");
            report.audit_failures += 1;
        }
    }

    fn emit_status(&mut self, now: SystemTime, report: &mut IterationReport) {
        self.tracker.take_dirty();
        self.last_status = Some(now);
        let status = *self.tracker.status();
        match self
            .audit
            .record_status_snapshot(self.tracker.members(), &status, now)
        {
            Ok(()) => report.status_emitted = true,
            Err(err) => {
                warn!(error = %err, "Failed to record status");
                report.audit_failures += 1;
            }
        }
    }

    fn publish(&self, now: SystemTime) -> Result<(), AppError> {
        let Some(shared) = &self.shared else {
            return Ok(());
        };
        let snapshot = HouseholdSnapshot {
            status: *self.tracker.status(),
            members: self.tracker.members().iter().map(MemberSnapshot::from).collect(),
            last_action: self.last_action,
            iteration: self.iteration,
            timestamp: now,
        };
        let mut guard = shared.write().map_err(|_| AppError::StateLock)?;
        guard.set_snapshot(snapshot)
    }

    fn record_failure(&self, failure: Option<IterationFailure>) {
        let Some(shared) = &self.shared else {
            return;
        };
        match shared.write() {
            Ok(mut guard) => guard.set_last_failure(failure),
            Err(_) => warn!("State lock poisoned while recording iteration failure"),
        }
    }
}

fn sleep_with_stop(duration: Duration, stop: &AtomicBool, start: Instant) {
    let elapsed = start.elapsed();
    if elapsed >= duration {
        return;
    }
    let remaining = duration - elapsed;
    let step = Duration::from_millis(100).min(remaining);
    let mut slept = Duration::ZERO;

    while slept < remaining {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        std::thread::sleep(step);
        slept += step;
    }
}
