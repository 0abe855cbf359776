use home_presence::audit::MemoryAudit;
use home_presence::control::{ControlLoop, ControlSettings};
use home_presence::daylight::{MockDaylight, MockSky};
use home_presence::error::AppError;
use home_presence::lights::FlashPattern;
use home_presence::lights::mock::{LightCommand, RecordingActuator};
use home_presence::member::{LightColor, Member, NetworkIdentity};
use home_presence::policy::{DarknessChange, LightAction};
use home_presence::probe::mock::{MockProbe, MockReply};
use home_presence::state::AppState;
use home_presence::tracker::OccupancyTracker;
use std::net::Ipv4Addr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type Household = ControlLoop<MockProbe, MockDaylight, RecordingActuator, MemoryAudit>;

const START: u64 = 1_700_000_000;

fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(START + secs)
}

fn member(name: &str, color: &str, last_octet: u8) -> Member {
    Member::new_at(
        name,
        LightColor(color.to_string()),
        NetworkIdentity {
            mac: format!("a4:5e:60:d1:22:{last_octet:02x}")
                .parse()
                .expect("valid mac"),
            ip: Ipv4Addr::new(192, 168, 0, last_octet),
        },
        at(0),
    )
}

fn household(
    sky: MockSky,
) -> (Household, MockProbe, MockDaylight, RecordingActuator, MemoryAudit) {
    let probe = MockProbe::new(MockReply::Absent);
    let daylight = MockDaylight::new(sky);
    let lights = RecordingActuator::new();
    let audit = MemoryAudit::new();
    let settings = ControlSettings {
        departure_debounce: Duration::from_secs(60),
        flash: FlashPattern {
            count: 1,
            delay: Duration::ZERO,
        },
        ..ControlSettings::default()
    };
    let control = ControlLoop::new(
        vec![member("alice", "red", 40), member("bob", "blue", 41)],
        probe.clone(),
        daylight.clone(),
        lights.clone(),
        audit.clone(),
        settings,
    );
    (control, probe, daylight, lights, audit)
}

fn assert_aggregates(tracker: &OccupancyTracker) {
    let members = tracker.members();
    let status = tracker.status();
    assert_eq!(status.someone_home, members.iter().any(Member::is_home));
    assert_eq!(status.everyone_home, members.iter().all(Member::is_home));
}

#[test]
fn first_arrival_after_dark_turns_lights_on() -> Result<(), AppError> {
    let (mut control, probe, _daylight, lights, audit) = household(MockSky::Dark);
    probe.set("alice", MockReply::Present);

    let report = control.run_iteration_at(at(1))?;

    let alice = control.tracker().member("alice").ok_or(AppError::StateLock)?;
    assert!(alice.is_home());
    assert_eq!(alice.home_count(), 1);
    assert_eq!(report.darkness, Some(DarknessChange::Dusk));
    assert_eq!(report.last_action(), LightAction::TurnOn);
    assert!(control.tracker().status().lights_on);
    assert_eq!(lights.commands(), vec![LightCommand::On]);
    assert!(audit.events().contains(&"alice is home!".to_string()));
    assert_aggregates(control.tracker());
    Ok(())
}

#[test]
fn one_member_leaving_keeps_lights_on_until_last_leaves() -> Result<(), AppError> {
    let (mut control, probe, _daylight, lights, _audit) = household(MockSky::Dark);
    probe.set("alice", MockReply::Present);
    probe.set("bob", MockReply::Present);
    control.run_iteration_at(at(0))?;
    assert!(control.tracker().status().everyone_home);
    assert!(control.tracker().status().lights_on);

    probe.set("alice", MockReply::Absent);
    let report = control.run_iteration_at(at(30))?;
    assert!(report.departures.is_empty());

    let report = control.run_iteration_at(at(61))?;
    assert_eq!(report.departures, vec!["alice".to_string()]);
    assert_eq!(report.last_action(), LightAction::NoAction);
    assert!(control.tracker().status().lights_on);
    assert!(control.tracker().status().someone_home);
    assert!(!control.tracker().status().everyone_home);
    assert_aggregates(control.tracker());

    probe.set("bob", MockReply::Absent);
    let report = control.run_iteration_at(at(100))?;
    assert!(report.departures.is_empty());

    let report = control.run_iteration_at(at(122))?;
    assert_eq!(report.departures, vec!["bob".to_string()]);
    assert_eq!(report.last_action(), LightAction::TurnOff);
    assert!(!control.tracker().status().lights_on);
    assert!(!control.tracker().status().someone_home);
    assert_eq!(lights.commands().last(), Some(&LightCommand::Off));
    assert_aggregates(control.tracker());

    let bob = control.tracker().member("bob").ok_or(AppError::StateLock)?;
    assert_eq!(bob.leave_count(), 1);
    assert_eq!(bob.leave_time(), at(122));
    Ok(())
}

#[test]
fn dusk_while_away_waits_for_first_arrival() -> Result<(), AppError> {
    let (mut control, probe, daylight, lights, _audit) = household(MockSky::Light);
    control.run_iteration_at(at(0))?;

    daylight.set(MockSky::Dark);
    let report = control.run_iteration_at(at(1))?;
    assert_eq!(report.darkness, Some(DarknessChange::Dusk));
    assert!(report.actions.is_empty());
    assert!(control.tracker().status().dark);
    assert!(!control.tracker().status().lights_on);
    assert!(lights.commands().is_empty());

    probe.set("bob", MockReply::Present);
    let report = control.run_iteration_at(at(2))?;
    assert_eq!(report.arrivals, vec!["bob".to_string()]);
    assert_eq!(report.actions, vec![LightAction::TurnOn]);
    Ok(())
}

#[test]
fn dusk_is_deferred_while_someone_is_home() -> Result<(), AppError> {
    let (mut control, probe, daylight, lights, _audit) = household(MockSky::Light);
    probe.set("alice", MockReply::Present);
    control.run_iteration_at(at(0))?;

    daylight.set(MockSky::Dark);
    let report = control.run_iteration_at(at(10))?;
    assert_eq!(report.darkness, None);
    assert!(!control.tracker().status().dark);
    assert!(lights.commands().is_empty());

    probe.set("alice", MockReply::Absent);
    control.run_iteration_at(at(20))?;
    let report = control.run_iteration_at(at(71))?;
    assert_eq!(report.departures, vec!["alice".to_string()]);

    let report = control.run_iteration_at(at(72))?;
    assert_eq!(report.darkness, Some(DarknessChange::Dusk));
    assert!(report.actions.is_empty());

    probe.set("alice", MockReply::Present);
    let report = control.run_iteration_at(at(73))?;
    assert_eq!(report.actions, vec![LightAction::TurnOn]);
    Ok(())
}

#[test]
fn probe_failure_leaves_state_unchanged_and_loop_continues() -> Result<(), AppError> {
    let (mut control, probe, _daylight, _lights, audit) = household(MockSky::Dark);
    probe.set("alice", MockReply::Fail);

    let report = control.run_iteration_at(at(0))?;
    assert_eq!(report.probe_failures, vec!["alice".to_string()]);
    assert!(report.status_emitted);

    let alice = control.tracker().member("alice").ok_or(AppError::StateLock)?;
    assert!(!alice.is_home());
    assert_eq!(alice.home_count(), 0);

    let report = control.run_iteration_at(at(1))?;
    assert!(!report.status_emitted);
    let report = control.run_iteration_at(at(4))?;
    assert!(report.status_emitted);
    assert_eq!(audit.snapshots().len(), 2);
    Ok(())
}

#[test]
fn probe_failure_on_present_member_departs_only_after_window() -> Result<(), AppError> {
    let (mut control, probe, _daylight, _lights, _audit) = household(MockSky::Light);
    probe.set("alice", MockReply::Present);
    control.run_iteration_at(at(0))?;

    probe.set("alice", MockReply::Fail);
    let report = control.run_iteration_at(at(60))?;
    assert_eq!(report.probe_failures, vec!["alice".to_string()]);
    assert!(report.departures.is_empty());

    let report = control.run_iteration_at(at(61))?;
    assert_eq!(report.departures, vec!["alice".to_string()]);
    Ok(())
}

#[test]
fn arrival_with_lights_on_flashes_member_color() -> Result<(), AppError> {
    let (mut control, probe, _daylight, lights, _audit) = household(MockSky::Dark);
    probe.set("alice", MockReply::Present);
    control.run_iteration_at(at(0))?;
    lights.clear();

    probe.set("bob", MockReply::Present);
    let report = control.run_iteration_at(at(5))?;

    assert_eq!(report.flashed, vec!["bob".to_string()]);
    assert!(report.actions.is_empty());
    assert_eq!(
        lights.commands(),
        vec![LightCommand::Color("blue".to_string()), LightCommand::Reset]
    );
    assert!(control.tracker().status().everyone_home);
    Ok(())
}

#[test]
fn dawn_leaves_lights_alone_while_someone_is_home() -> Result<(), AppError> {
    let (mut control, probe, daylight, lights, audit) = household(MockSky::Dark);
    probe.set("alice", MockReply::Present);
    probe.set("bob", MockReply::Present);
    control.run_iteration_at(at(0))?;
    assert!(control.tracker().status().lights_on);

    daylight.set(MockSky::Light);
    let report = control.run_iteration_at(at(1))?;

    assert_eq!(report.darkness, Some(DarknessChange::Dawn));
    assert!(report.actions.is_empty());
    assert!(!control.tracker().status().dark);
    assert!(control.tracker().status().lights_on);
    assert_eq!(lights.commands(), vec![LightCommand::On]);
    assert!(audit.events().contains(&"Sun has risen!".to_string()));
    Ok(())
}

#[test]
fn iterations_publish_snapshots_to_shared_state() -> Result<(), AppError> {
    let (control, probe, _daylight, _lights, _audit) = household(MockSky::Dark);
    let state = Arc::new(RwLock::new(AppState::new()));
    let mut receiver = {
        let guard = state.read().map_err(|_| AppError::StateLock)?;
        guard.subscribe_snapshot()
    };
    let mut control = control.with_shared_state(Arc::clone(&state));
    probe.set("bob", MockReply::Present);

    control.run_iteration_at(at(3))?;

    assert!(receiver.has_changed().unwrap_or(false));
    let published = receiver.borrow_and_update().clone().ok_or(AppError::StateLock)?;
    assert_eq!(published.iteration, 1);
    assert_eq!(published.last_action, LightAction::TurnOn);
    assert_eq!(published.timestamp, at(3));
    let bob = published
        .members
        .iter()
        .find(|member| member.name == "bob")
        .ok_or(AppError::StateLock)?;
    assert!(bob.home);
    assert_eq!(bob.home_count, 1);
    assert_eq!(bob.ip, "192.168.0.41");
    Ok(())
}
