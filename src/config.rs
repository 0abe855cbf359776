use crate::audit::{DEFAULT_EVENT_LOG, DEFAULT_STATUS_LOG, FileAudit, StatusMode};
use crate::control::{
    ControlSettings, DEFAULT_ERROR_PAUSE, DEFAULT_POLL_INTERVAL, DEFAULT_STATUS_INTERVAL,
};
use crate::daylight::solar::SolarDaylight;
use crate::daylight::{DaylightOracle, StaticDaylight};
use crate::error::OracleError;
use crate::lights::flux::FluxLed;
use crate::lights::hue::HueCli;
use crate::lights::{
    DEFAULT_BLINK_DELAY, DEFAULT_COMMAND_TIMEOUT, DEFAULT_FLASH_COUNT, FlashPattern,
    LightActuator, NoLights,
};
use crate::member::{LightColor, MacAddress, Member, NetworkIdentity};
use crate::probe::arp::{ArpTableProbe, DEFAULT_ARP_TABLE_PATH};
use crate::probe::ping::{DEFAULT_PING_TIMEOUT, PingProbe};
use crate::probe::{CombinedProbe, PresenceProbe};
use crate::state::DEFAULT_STALE_AFTER;
use crate::tracker::DEFAULT_DEPARTURE_DEBOUNCE;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const CONFIG_PATH_ENV: &str = "HOME_PRESENCE_CONFIG";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub members: Vec<MemberEntry>,
    #[serde(default)]
    pub control: ControlSection,
    #[serde(default)]
    pub probe: ProbeSection,
    #[serde(default)]
    pub daylight: DaylightSection,
    #[serde(default)]
    pub lights: LightsSection,
    #[serde(default)]
    pub audit: AuditSection,
    #[serde(default)]
    pub server: Option<ServerSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemberEntry {
    pub name: String,
    /// Color passed to the light back-end on arrival
    pub color: String,
    pub mac: String,
    pub ip: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ControlSection {
    pub poll_interval_ms: Option<u64>,
    pub error_pause_ms: Option<u64>,
    /// Unseen time before a present member is declared gone (0 = first miss)
    pub departure_debounce_secs: Option<u64>,
    pub status_interval_secs: Option<u64>,
    #[serde(default)]
    pub status_mode: StatusMode,
    pub defer_dusk_while_home: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ProbeSection {
    pub ping_timeout_secs: Option<u64>,
    pub arp_table_path: Option<PathBuf>,
    pub use_ping: Option<bool>,
    pub use_arp: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DaylightSection {
    #[serde(default)]
    pub always_dark: bool,
    pub latitude: Option<f64>,
    /// East-positive degrees
    pub longitude: Option<f64>,
    pub utc_offset_hours: Option<i8>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    Hue,
    MagicLight,
    #[default]
    None,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct LightsSection {
    #[serde(default)]
    pub kind: LightKind,
    pub hue_lights: Option<String>,
    pub hue_flash_lights: Option<String>,
    #[serde(default)]
    pub magic_light_hosts: Vec<String>,
    pub command_timeout_secs: Option<u64>,
    pub flash_count: Option<u32>,
    pub blink_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuditSection {
    pub event_log: Option<PathBuf>,
    pub status_log: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port for the status API
    pub port: Option<u16>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("no members configured")]
    NoMembers,
    #[error("invalid member {name:?}: {reason}")]
    InvalidMember { name: String, reason: String },
    #[error("invalid lights section: {0}")]
    InvalidLights(String),
    #[error("invalid daylight section: {0}")]
    InvalidDaylight(#[from] OracleError),
}

/// Loads from `$HOME_PRESENCE_CONFIG` when set, otherwise the default path.
pub fn load_default() -> Result<Config, ConfigError> {
    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(path) => load_from_path(PathBuf::from(path)),
        None => load_from_path(DEFAULT_CONFIG_PATH),
    }
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Validated member list; names must be unique and identities parseable.
    pub fn members(&self) -> Result<Vec<Member>, ConfigError> {
        if self.members.is_empty() {
            return Err(ConfigError::NoMembers);
        }
        let mut seen = HashSet::new();
        let mut members = Vec::with_capacity(self.members.len());
        for entry in &self.members {
            let invalid = |reason: String| ConfigError::InvalidMember {
                name: entry.name.clone(),
                reason,
            };
            let name = entry.name.trim();
            if name.is_empty() {
                return Err(invalid("empty name".to_string()));
            }
            if !seen.insert(name) {
                return Err(invalid("duplicate name".to_string()));
            }
            let mac: MacAddress = entry.mac.parse().map_err(|err| invalid(format!("{err}")))?;
            let ip: Ipv4Addr = entry
                .ip
                .trim()
                .parse()
                .map_err(|_| invalid(format!("malformed IP address: {:?}", entry.ip)))?;
            members.push(Member::new(
                name,
                LightColor(entry.color.clone()),
                NetworkIdentity { mac, ip },
            ));
        }
        Ok(members)
    }

    pub fn control_settings(&self) -> ControlSettings {
        let control = &self.control;
        ControlSettings {
            poll_interval: control
                .poll_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            error_pause: control
                .error_pause_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_ERROR_PAUSE),
            departure_debounce: control
                .departure_debounce_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_DEPARTURE_DEBOUNCE),
            status_interval: control
                .status_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STATUS_INTERVAL),
            defer_dusk_while_home: control.defer_dusk_while_home.unwrap_or(true),
            flash: FlashPattern {
                count: self.lights.flash_count.unwrap_or(DEFAULT_FLASH_COUNT),
                delay: self
                    .lights
                    .blink_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(DEFAULT_BLINK_DELAY),
            },
        }
    }

    /// Ping then ARP lookup, each unless disabled.
    pub fn probe(&self) -> CombinedProbe {
        let mut probes: Vec<Box<dyn PresenceProbe + Send>> = Vec::new();
        if let Some(ping) = self.ping_probe() {
            probes.push(Box::new(ping));
        }
        if self.probe.use_arp.unwrap_or(true) {
            let path = self
                .probe
                .arp_table_path
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARP_TABLE_PATH));
            probes.push(Box::new(ArpTableProbe::new(path)));
        }
        CombinedProbe::new(probes)
    }

    /// Static when `always_dark` is set or no coordinates are configured.
    pub fn daylight(&self) -> Result<Box<dyn DaylightOracle + Send>, ConfigError> {
        let section = &self.daylight;
        if section.always_dark {
            return Ok(Box::new(StaticDaylight::new(true)));
        }
        match (section.latitude, section.longitude) {
            (Some(latitude), Some(longitude)) => {
                let hours = section.utc_offset_hours.unwrap_or(0);
                let offset = time::UtcOffset::from_hms(hours, 0, 0).map_err(|err| {
                    OracleError::Clock(format!("utc_offset_hours {hours}: {err}"))
                })?;
                Ok(Box::new(SolarDaylight::new(latitude, longitude, offset)?))
            }
            _ => Ok(Box::new(StaticDaylight::new(false))),
        }
    }

    pub fn lights(&self) -> Result<Box<dyn LightActuator + Send>, ConfigError> {
        let section = &self.lights;
        let timeout = self.light_command_timeout();
        match section.kind {
            LightKind::None => Ok(Box::new(NoLights)),
            LightKind::Hue => {
                let lights = section
                    .hue_lights
                    .clone()
                    .ok_or_else(|| ConfigError::InvalidLights("hue_lights missing".to_string()))?;
                let flash_lights = section.hue_flash_lights.clone().unwrap_or_else(|| lights.clone());
                Ok(Box::new(HueCli::new(lights, flash_lights).with_timeout(timeout)))
            }
            LightKind::MagicLight => {
                let hosts = section
                    .magic_light_hosts
                    .iter()
                    .map(|host| {
                        host.trim().parse::<Ipv4Addr>().map_err(|_| {
                            ConfigError::InvalidLights(format!("malformed light host: {host:?}"))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if hosts.is_empty() {
                    return Err(ConfigError::InvalidLights(
                        "magic_light_hosts is empty".to_string(),
                    ));
                }
                Ok(Box::new(FluxLed::new(hosts).with_timeout(timeout)))
            }
        }
    }

    pub fn audit(&self) -> FileAudit {
        FileAudit::new(
            self.audit
                .event_log
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EVENT_LOG)),
            self.audit
                .status_log
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATUS_LOG)),
            self.control.status_mode,
        )
    }

    fn ping_probe(&self) -> Option<PingProbe> {
        if !self.probe.use_ping.unwrap_or(true) {
            return None;
        }
        let timeout = self
            .probe
            .ping_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_PING_TIMEOUT);
        Some(PingProbe::new(timeout))
    }

    fn light_command_timeout(&self) -> Duration {
        self.lights
            .command_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_COMMAND_TIMEOUT)
    }

    /// Age after which `/api/health` calls the loop stalled: twice the
    /// longest iteration this household can take, never below
    /// `DEFAULT_STALE_AFTER`. Every member may be probed once and flashed once,
    /// and the lights switched at both ends of the pass.
    pub fn health_stale_after(&self, members: usize) -> Duration {
        let settings = self.control_settings();
        let members = u32::try_from(members).unwrap_or(u32::MAX);
        let probe = self
            .ping_probe()
            .map(|ping| ping.worst_case())
            .unwrap_or(Duration::ZERO);
        let command = match self.lights.kind {
            LightKind::None => Duration::ZERO,
            LightKind::Hue | LightKind::MagicLight => self.light_command_timeout(),
        };
        let flash = (settings.flash.delay + command)
            .saturating_mul(2)
            .saturating_mul(settings.flash.count);
        let iteration = probe
            .saturating_mul(members)
            .saturating_add(flash.saturating_mul(members))
            .saturating_add(command.saturating_mul(2))
            .saturating_add(settings.poll_interval)
            .saturating_add(settings.error_pause);
        iteration.saturating_mul(2).max(DEFAULT_STALE_AFTER)
    }

    /// Status API port; `None` keeps the API off.
    pub fn server_port(&self) -> Option<u16> {
        self.server.as_ref().and_then(|s| s.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    const MINIMAL: &str = r#"
[app]
name = "home-presence"

[logging]
level = "info"

[[members]]
name = "alice"
color = "red"
mac = "AA:BB:CC:00:11:22"
ip = "192.168.0.40"
"#;

    fn parse(extra: &str) -> Result<Config, ConfigError> {
        Ok(toml::from_str(&format!("{MINIMAL}{extra}"))?)
    }

    #[test]
    fn default_config_builds_every_collaborator() -> Result<(), Box<dyn std::error::Error>> {
        let config = load_from_path(DEFAULT_CONFIG_PATH)?;

        assert!(!config.members()?.is_empty());
        let _ = config.daylight()?;
        let _ = config.lights()?;
        assert!(!config.probe().is_empty());
        Ok(())
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() -> Result<(), ConfigError> {
        let config = parse("")?;
        let settings = config.control_settings();

        assert_eq!(settings.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(settings.departure_debounce, DEFAULT_DEPARTURE_DEBOUNCE);
        assert_eq!(settings.status_interval, DEFAULT_STATUS_INTERVAL);
        assert!(settings.defer_dusk_while_home);
        assert_eq!(settings.flash.count, DEFAULT_FLASH_COUNT);
        assert_eq!(config.control.status_mode, StatusMode::Interval);
        assert_eq!(config.lights.kind, LightKind::None);
        assert_eq!(config.server_port(), None);
        Ok(())
    }

    #[test]
    fn control_section_overrides_defaults() -> Result<(), ConfigError> {
        let config = parse(
            r#"
[control]
poll_interval_ms = 250
departure_debounce_secs = 0
status_mode = "events_only"
defer_dusk_while_home = false

[lights]
flash_count = 5
blink_delay_ms = 50
"#,
        )?;
        let settings = config.control_settings();

        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.departure_debounce, Duration::ZERO);
        assert!(!settings.defer_dusk_while_home);
        assert_eq!(settings.flash.count, 5);
        assert_eq!(settings.flash.delay, Duration::from_millis(50));
        assert_eq!(config.control.status_mode, StatusMode::EventsOnly);
        Ok(())
    }

    #[test]
    fn stale_threshold_never_drops_below_default() -> Result<(), ConfigError> {
        let config = parse("")?;

        assert_eq!(config.health_stale_after(1), DEFAULT_STALE_AFTER);
        Ok(())
    }

    #[test]
    fn stale_threshold_grows_with_household() -> Result<(), ConfigError> {
        let probe_only = parse("")?;
        // 10 pings at 3 s, 10 flashes of 1.2 s, 1 s poll and 1 s pause, doubled.
        assert_eq!(probe_only.health_stale_after(10), Duration::from_secs(88));

        let hue = parse(
            r#"
[probe]
use_ping = false

[lights]
kind = "hue"
hue_lights = "1"
command_timeout_secs = 1
flash_count = 2
blink_delay_ms = 0
"#,
        )?;
        // 4 flashes of 4 s, 2 s of on/off, 1 s poll and 1 s pause, doubled.
        assert_eq!(hue.health_stale_after(4), Duration::from_secs(40));
        Ok(())
    }

    #[test]
    fn members_are_parsed_and_normalised() -> Result<(), ConfigError> {
        let members = parse("")?.members()?;

        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name(), "alice");
        assert_eq!(members[0].identity().mac.to_string(), "aa:bb:cc:00:11:22");
        assert_eq!(members[0].identity().ip, Ipv4Addr::new(192, 168, 0, 40));
        Ok(())
    }

    #[test]
    fn duplicate_member_is_rejected() -> Result<(), ConfigError> {
        let config = parse(
            r#"
[[members]]
name = "alice"
color = "blue"
mac = "AA:BB:CC:00:11:23"
ip = "192.168.0.41"
"#,
        )?;

        assert!(matches!(
            config.members(),
            Err(ConfigError::InvalidMember { ref reason, .. }) if reason == "duplicate name"
        ));
        Ok(())
    }

    #[test]
    fn malformed_identity_is_rejected() -> Result<(), ConfigError> {
        let bad_mac = parse(
            r#"
[[members]]
name = "bob"
color = "blue"
mac = "not-a-mac"
ip = "192.168.0.41"
"#,
        )?;
        let bad_ip = parse(
            r#"
[[members]]
name = "bob"
color = "blue"
mac = "AA:BB:CC:00:11:23"
ip = "192.168.0.300"
"#,
        )?;

        assert!(matches!(bad_mac.members(), Err(ConfigError::InvalidMember { .. })));
        assert!(matches!(bad_ip.members(), Err(ConfigError::InvalidMember { .. })));
        Ok(())
    }

    #[test]
    fn empty_member_list_is_fatal() -> Result<(), ConfigError> {
        let config: Config = toml::from_str(
            r#"
[app]
name = "home-presence"

[logging]
level = "info"
"#,
        )?;

        assert!(matches!(config.members(), Err(ConfigError::NoMembers)));
        Ok(())
    }

    #[test]
    fn hue_lights_require_ids() -> Result<(), ConfigError> {
        let config = parse("\n[lights]\nkind = \"hue\"\n")?;

        assert!(matches!(config.lights(), Err(ConfigError::InvalidLights(_))));
        Ok(())
    }

    #[test]
    fn magic_light_hosts_must_be_ips() -> Result<(), ConfigError> {
        let config = parse("\n[lights]\nkind = \"magic_light\"\nmagic_light_hosts = [\"lamp\"]\n")?;

        assert!(matches!(config.lights(), Err(ConfigError::InvalidLights(_))));
        Ok(())
    }

    #[test]
    fn bad_coordinates_are_a_config_error() -> Result<(), ConfigError> {
        let config = parse("\n[daylight]\nlatitude = 95.0\nlongitude = 0.0\n")?;

        assert!(matches!(config.daylight(), Err(ConfigError::InvalidDaylight(_))));
        Ok(())
    }

    #[test]
    fn probe_mechanisms_can_be_disabled() -> Result<(), ConfigError> {
        let config = parse("\n[probe]\nuse_ping = false\nuse_arp = false\n")?;

        assert!(config.probe().is_empty());
        Ok(())
    }

    #[test]
    fn missing_config_file_returns_read_error() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!("home-presence-missing-{unique}.toml"));

        let result = load_from_path(&path);

        assert!(matches!(result, Err(ConfigError::Read(_))));
    }

    #[test]
    fn invalid_toml_returns_parse_error() -> Result<(), Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let path = std::env::temp_dir().join(format!("home-presence-invalid-{unique}.toml"));
        fs::write(&path, "not = [valid")?;

        let result = load_from_path(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        Ok(())
    }
}
