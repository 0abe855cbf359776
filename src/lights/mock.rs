use crate::error::ActuatorError;
use crate::lights::LightActuator;
use crate::member::LightColor;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LightCommand {
    On,
    Off,
    Color(String),
    Reset,
}

#[derive(Debug, Default)]
struct Recorded {
    commands: Vec<LightCommand>,
    failing: bool,
}

/// Records every command it is given. When failing, commands are still
/// recorded but return an error, like a bulb that is unplugged.
#[derive(Debug, Clone, Default)]
pub struct RecordingActuator {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing = failing;
        }
    }

    pub fn commands(&self) -> Vec<LightCommand> {
        self.inner
            .lock()
            .map(|inner| inner.commands.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.commands.clear();
        }
    }

    fn record(&mut self, command: LightCommand) -> Result<(), ActuatorError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| ActuatorError::Other("recorder poisoned".to_string()))?;
        inner.commands.push(command);
        if inner.failing {
            Err(ActuatorError::Other("lights unreachable".to_string()))
        } else {
            Ok(())
        }
    }
}

impl LightActuator for RecordingActuator {
    fn turn_on(&mut self) -> Result<(), ActuatorError> {
        self.record(LightCommand::On)
    }

    fn turn_off(&mut self) -> Result<(), ActuatorError> {
        self.record(LightCommand::Off)
    }

    fn show_color(&mut self, color: &LightColor) -> Result<(), ActuatorError> {
        self.record(LightCommand::Color(color.as_str().to_string()))
    }

    fn reset_color(&mut self) -> Result<(), ActuatorError> {
        self.record(LightCommand::Reset)
    }
}
