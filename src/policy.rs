//! Occupancy to lighting decisions. Everything here is pure: the control loop
//! feeds in the current readings and carries out whatever comes back.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LightAction {
    NoAction,
    TurnOn,
    TurnOff,
}

/// Rules in priority order: empty house with lights on turns them off;
/// occupied dark house with lights off turns them on; otherwise nothing.
/// `everyone_home` does not influence the result.
pub fn decide(someone_home: bool, _everyone_home: bool, dark: bool, lights_on: bool) -> LightAction {
    if !someone_home && lights_on {
        LightAction::TurnOff
    } else if someone_home && dark && !lights_on {
        LightAction::TurnOn
    } else {
        LightAction::NoAction
    }
}

/// The arrival flash is cosmetic and only rides on lights that are already on.
pub fn should_flash(lights_on: bool) -> bool {
    lights_on
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DarknessChange {
    Dusk,
    Dawn,
}

/// Holds the darkness value the lighting rules see.
///
/// With `defer_dusk_while_home`, nightfall is only latched once the house is
/// empty, so an occupied house is not lit up at sunset; the next arrival after
/// that sees a dark house and switches the lights on. Dawn is always latched.
#[derive(Debug, Clone, Copy)]
pub struct DarknessLatch {
    dark: bool,
    defer_dusk_while_home: bool,
}

impl DarknessLatch {
    pub fn new(defer_dusk_while_home: bool) -> Self {
        Self {
            dark: false,
            defer_dusk_while_home,
        }
    }

    pub fn is_dark(&self) -> bool {
        self.dark
    }

    pub fn observe(&mut self, reading: bool, someone_home: bool) -> Option<DarknessChange> {
        match (self.dark, reading) {
            (false, true) if self.defer_dusk_while_home && someone_home => None,
            (false, true) => {
                self.dark = true;
                Some(DarknessChange::Dusk)
            }
            (true, false) => {
                self.dark = false;
                Some(DarknessChange::Dawn)
            }
            _ => None,
        }
    }
}

impl Default for DarknessLatch {
    fn default() -> Self {
        Self::new(true)
    }
}
