use crate::error::ActuatorError;
use crate::lights::{DEFAULT_COMMAND_TIMEOUT, LightActuator, run_light_command};
use crate::member::LightColor;
use std::time::Duration;

/// Philips Hue bridge driven through the `hue` command line client.
#[derive(Debug, Clone)]
pub struct HueCli {
    program: String,
    lights: String,
    flash_lights: String,
    timeout: Duration,
}

impl HueCli {
    /// `lights` and `flash_lights` are the client's comma separated ids, e.g. `1,2,3,5`.
    pub fn new(lights: impl Into<String>, flash_lights: impl Into<String>) -> Self {
        Self {
            program: "hue".to_string(),
            lights: lights.into(),
            flash_lights: flash_lights.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(ids: &str, action: &str) -> Vec<String> {
        vec!["lights".to_string(), ids.to_string(), action.to_string()]
    }

    fn send(&self, ids: &str, action: &str) -> Result<(), ActuatorError> {
        run_light_command(&self.program, Self::args(ids, action), self.timeout).map(|_| ())
    }
}

impl LightActuator for HueCli {
    fn turn_on(&mut self) -> Result<(), ActuatorError> {
        self.send(&self.lights, "on")
    }

    fn turn_off(&mut self) -> Result<(), ActuatorError> {
        self.send(&self.lights, "off")
    }

    fn show_color(&mut self, color: &LightColor) -> Result<(), ActuatorError> {
        self.send(&self.flash_lights, color.as_str())
    }

    fn reset_color(&mut self) -> Result<(), ActuatorError> {
        self.send(&self.flash_lights, "reset")
    }
}
