//! Append-only event and status records.

use crate::error::AppError;
use crate::member::Member;
use crate::tracker::HouseholdStatus;
use serde::Deserialize;
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::info;

pub const DEFAULT_EVENT_LOG: &str = "event.txt";
pub const DEFAULT_STATUS_LOG: &str = "out.txt";

/// What reaches the console. Files are written in every mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusMode {
    /// Events plus periodic status dumps.
    #[default]
    Interval,
    EventsOnly,
    Silent,
}

impl StatusMode {
    pub fn echo_events(self) -> bool {
        !matches!(self, StatusMode::Silent)
    }

    pub fn echo_status(self) -> bool {
        matches!(self, StatusMode::Interval)
    }
}

pub trait AuditSink {
    fn record_event(&mut self, text: &str, now: SystemTime) -> Result<(), AppError>;

    fn record_status_snapshot(
        &mut self,
        members: &[Member],
        status: &HouseholdStatus,
        now: SystemTime,
    ) -> Result<(), AppError>;
}

impl AuditSink for Box<dyn AuditSink + Send> {
    fn record_event(&mut self, text: &str, now: SystemTime) -> Result<(), AppError> {
        (**self).record_event(text, now)
    }

    fn record_status_snapshot(
        &mut self,
        members: &[Member],
        status: &HouseholdStatus,
        now: SystemTime,
    ) -> Result<(), AppError> {
        (**self).record_status_snapshot(members, status, now)
    }
}

pub fn format_timestamp(at: SystemTime) -> Result<String, time::error::Format> {
    OffsetDateTime::from(at).format(&Rfc3339)
}

/// Human-readable dump. Members that were never home are left out.
pub fn render_status(members: &[Member], status: &HouseholdStatus, now: SystemTime) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "dark:      {}", status.dark);
    let _ = writeln!(out, "lights on: {}", status.lights_on);
    for member in members.iter().filter(|member| member.home_count() > 0) {
        let (count, since) = if member.is_home() {
            (member.home_count(), member.home_time())
        } else {
            (member.leave_count(), member.leave_time())
        };
        let duration = now.duration_since(since).unwrap_or(Duration::ZERO);
        let _ = writeln!(out);
        let _ = writeln!(out, "{} [{}]:", member.name(), member.identity().ip);
        let _ = writeln!(out, "    home:     {}", member.is_home());
        let _ = writeln!(out, "    count:    {count}");
        let _ = writeln!(out, "    duration: {:.2}", duration.as_secs_f64());
        let _ = writeln!(out, "    seen:     {:.2}", member.idle_at(now).as_secs_f64());
    }
    out
}

/// Writes events and status dumps to two files, opening them per write so no
/// handle outlives a call.
#[derive(Debug, Clone)]
pub struct FileAudit {
    event_log: PathBuf,
    status_log: PathBuf,
    mode: StatusMode,
}

impl FileAudit {
    pub fn new(event_log: impl Into<PathBuf>, status_log: impl Into<PathBuf>, mode: StatusMode) -> Self {
        Self {
            event_log: event_log.into(),
            status_log: status_log.into(),
            mode,
        }
    }

    fn append(path: &Path, text: &str) -> Result<(), AppError> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(text.as_bytes())?;
        Ok(())
    }
}

impl AuditSink for FileAudit {
    fn record_event(&mut self, text: &str, now: SystemTime) -> Result<(), AppError> {
        if self.mode.echo_events() {
            info!("{text}");
        }
        let stamp = format_timestamp(now)?;
        Self::append(&self.event_log, &format!("[{stamp}]: {text}\n"))
    }

    fn record_status_snapshot(
        &mut self,
        members: &[Member],
        status: &HouseholdStatus,
        now: SystemTime,
    ) -> Result<(), AppError> {
        let report = render_status(members, status, now);
        if self.mode.echo_status() {
            println!("\n{report}");
        }
        Self::append(&self.status_log, &format!("\n{report}"))
    }
}

#[derive(Debug, Default)]
struct Memory {
    events: Vec<String>,
    snapshots: Vec<HouseholdStatus>,
}

/// In-memory sink; clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryAudit {
    inner: Arc<Mutex<Memory>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.inner
            .lock()
            .map(|inner| inner.events.clone())
            .unwrap_or_default()
    }

    pub fn snapshots(&self) -> Vec<HouseholdStatus> {
        self.inner
            .lock()
            .map(|inner| inner.snapshots.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAudit {
    fn record_event(&mut self, text: &str, _now: SystemTime) -> Result<(), AppError> {
        let mut inner = self.inner.lock().map_err(|_| AppError::StateLock)?;
        inner.events.push(text.to_string());
        Ok(())
    }

    fn record_status_snapshot(
        &mut self,
        _members: &[Member],
        status: &HouseholdStatus,
        _now: SystemTime,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().map_err(|_| AppError::StateLock)?;
        inner.snapshots.push(*status);
        Ok(())
    }
}
