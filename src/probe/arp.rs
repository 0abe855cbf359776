use crate::error::ProbeError;
use crate::member::{MacAddress, Member};
use crate::probe::PresenceProbe;
use std::path::PathBuf;

pub const DEFAULT_ARP_TABLE_PATH: &str = "/proc/net/arp";

// ATF_COM: the kernel has a completed hardware address for this entry.
const ATF_COM: u32 = 0x2;

/// Looks for a member's MAC among the completed entries of the kernel ARP
/// table. Pinging first keeps the table fresh.
#[derive(Debug, Clone)]
pub struct ArpTableProbe {
    path: PathBuf,
}

impl ArpTableProbe {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_table(&self) -> Result<Vec<MacAddress>, ProbeError> {
        let contents =
            std::fs::read_to_string(&self.path).map_err(|source| ProbeError::ArpTable {
                path: self.path.display().to_string(),
                source,
            })?;
        Ok(parse_arp_table(&contents))
    }
}

impl Default for ArpTableProbe {
    fn default() -> Self {
        Self::new(DEFAULT_ARP_TABLE_PATH)
    }
}

impl PresenceProbe for ArpTableProbe {
    fn probe(&mut self, member: &Member) -> Result<bool, ProbeError> {
        let table = self.read_table()?;
        Ok(table.contains(&member.identity().mac))
    }

    fn name(&self) -> &'static str {
        "arp"
    }
}

/// Completed hardware addresses from `/proc/net/arp` formatted text.
pub fn parse_arp_table(contents: &str) -> Vec<MacAddress> {
    contents
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                return None;
            }
            let flags = u32::from_str_radix(fields[2].trim_start_matches("0x"), 16).ok()?;
            if flags & ATF_COM == 0 {
                return None;
            }
            fields[3].parse().ok()
        })
        .collect()
}
