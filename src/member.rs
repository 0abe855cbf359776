use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed MAC address: {0:?}")]
pub struct MacParseError(pub String);

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// Accepts `aa:bb:cc:dd:ee:ff` or `aa-bb-cc-dd-ee-ff`, any case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(MacParseError(s.to_string()));
        }
        let mut octets = [0u8; 6];
        for (slot, part) in octets.iter_mut().zip(parts) {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(MacParseError(s.to_string()));
            }
            *slot = u8::from_str_radix(part, 16).map_err(|_| MacParseError(s.to_string()))?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

/// How a member's device is found on the LAN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkIdentity {
    pub mac: MacAddress,
    pub ip: Ipv4Addr,
}

/// Color the lights pulse when this member arrives. Passed verbatim to the
/// light back-end (`red` for the hue CLI, `255,0,0` for flux_led).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LightColor(pub String);

impl LightColor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LightColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    name: String,
    color: LightColor,
    identity: NetworkIdentity,
    pub(crate) home: bool,
    pub(crate) home_time: SystemTime,
    pub(crate) leave_time: SystemTime,
    pub(crate) home_count: u32,
    pub(crate) leave_count: u32,
    pub(crate) last_seen: SystemTime,
    pub(crate) longest_idle: Duration,
}

impl Member {
    pub fn new(name: impl Into<String>, color: LightColor, identity: NetworkIdentity) -> Self {
        Self::new_at(name, color, identity, SystemTime::now())
    }

    pub fn new_at(
        name: impl Into<String>,
        color: LightColor,
        identity: NetworkIdentity,
        created: SystemTime,
    ) -> Self {
        Self {
            name: name.into(),
            color,
            identity,
            home: false,
            home_time: created,
            leave_time: created,
            home_count: 0,
            leave_count: 0,
            last_seen: created,
            longest_idle: Duration::ZERO,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> &LightColor {
        &self.color
    }

    pub fn identity(&self) -> &NetworkIdentity {
        &self.identity
    }

    pub fn is_home(&self) -> bool {
        self.home
    }

    pub fn home_time(&self) -> SystemTime {
        self.home_time
    }

    pub fn leave_time(&self) -> SystemTime {
        self.leave_time
    }

    pub fn home_count(&self) -> u32 {
        self.home_count
    }

    pub fn leave_count(&self) -> u32 {
        self.leave_count
    }

    pub fn last_seen(&self) -> SystemTime {
        self.last_seen
    }

    pub fn longest_idle(&self) -> Duration {
        self.longest_idle
    }

    /// Time since the last successful probe; zero if the clock went backwards.
    pub fn idle_at(&self, now: SystemTime) -> Duration {
        now.duration_since(self.last_seen).unwrap_or(Duration::ZERO)
    }

    pub(crate) fn mark_seen(&mut self, now: SystemTime) {
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    pub(crate) fn note_idle(&mut self, now: SystemTime) {
        let idle = self.idle_at(now);
        if idle > self.longest_idle {
            self.longest_idle = idle;
        }
    }
}
