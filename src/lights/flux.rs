use crate::error::ActuatorError;
use crate::lights::{DEFAULT_COMMAND_TIMEOUT, LightActuator, run_light_command};
use crate::member::LightColor;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Warm white level used as the neutral color after a flash.
const NEUTRAL_WHITE: &str = "80";

/// MagicHome bulbs driven through `python -m flux_led`.
#[derive(Debug, Clone)]
pub struct FluxLed {
    python: String,
    hosts: Vec<Ipv4Addr>,
    timeout: Duration,
}

impl FluxLed {
    pub fn new(hosts: Vec<Ipv4Addr>) -> Self {
        Self {
            python: "python".to_string(),
            hosts,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn args(&self, action: &[&str]) -> Vec<String> {
        let mut args = vec!["-m".to_string(), "flux_led".to_string()];
        args.extend(self.hosts.iter().map(ToString::to_string));
        args.extend(action.iter().map(|part| (*part).to_string()));
        args
    }

    fn send(&self, action: &[&str]) -> Result<(), ActuatorError> {
        if self.hosts.is_empty() {
            return Err(ActuatorError::Other("no flux_led hosts configured".to_string()));
        }
        run_light_command(&self.python, self.args(action), self.timeout).map(|_| ())
    }
}

impl LightActuator for FluxLed {
    fn turn_on(&mut self) -> Result<(), ActuatorError> {
        self.send(&["--on"])
    }

    fn turn_off(&mut self) -> Result<(), ActuatorError> {
        self.send(&["--off"])
    }

    fn show_color(&mut self, color: &LightColor) -> Result<(), ActuatorError> {
        self.send(&["-c", color.as_str()])
    }

    fn reset_color(&mut self) -> Result<(), ActuatorError> {
        self.send(&["-w", NEUTRAL_WHITE])
    }
}
