use crate::command::{CommandOutput, run_with_timeout};
use crate::error::ActuatorError;
use crate::member::LightColor;
use std::time::Duration;
use tracing::warn;

pub mod flux;
pub mod hue;
pub mod mock;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_FLASH_COUNT: u32 = 3;
pub const DEFAULT_BLINK_DELAY: Duration = Duration::from_millis(200);

/// Command sink for the household lights. Nothing reads the physical state
/// back, so a successful return only means the command was delivered.
pub trait LightActuator {
    fn turn_on(&mut self) -> Result<(), ActuatorError>;
    fn turn_off(&mut self) -> Result<(), ActuatorError>;
    fn show_color(&mut self, color: &LightColor) -> Result<(), ActuatorError>;
    /// Back to the neutral color after a flash.
    fn reset_color(&mut self) -> Result<(), ActuatorError>;
}

impl LightActuator for Box<dyn LightActuator + Send> {
    fn turn_on(&mut self) -> Result<(), ActuatorError> {
        (**self).turn_on()
    }
    fn turn_off(&mut self) -> Result<(), ActuatorError> {
        (**self).turn_off()
    }
    fn show_color(&mut self, color: &LightColor) -> Result<(), ActuatorError> {
        (**self).show_color(color)
    }
    fn reset_color(&mut self) -> Result<(), ActuatorError> {
        (**self).reset_color()
    }
}

/// For hosts without lights: every command is accepted and ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLights;

impl LightActuator for NoLights {
    fn turn_on(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
    fn turn_off(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
    fn show_color(&mut self, _color: &LightColor) -> Result<(), ActuatorError> {
        Ok(())
    }
    fn reset_color(&mut self) -> Result<(), ActuatorError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FlashPattern {
    pub count: u32,
    pub delay: Duration,
}

impl Default for FlashPattern {
    fn default() -> Self {
        Self {
            count: DEFAULT_FLASH_COUNT,
            delay: DEFAULT_BLINK_DELAY,
        }
    }
}

/// Pulse `color` then neutral, `pattern.count` times. Failures are logged and
/// the remaining pulses still run.
pub fn flash<A>(actuator: &mut A, color: &LightColor, pattern: FlashPattern)
where
    A: LightActuator + ?Sized,
{
    for pulse in 0..pattern.count {
        if let Err(err) = actuator.show_color(color) {
            warn!(pulse, color = %color, error = %err, "Flash color command failed");
        }
        std::thread::sleep(pattern.delay);
        if let Err(err) = actuator.reset_color() {
            warn!(pulse, error = %err, "Flash reset command failed");
        }
        std::thread::sleep(pattern.delay);
    }
}

fn run_light_command(
    program: &str,
    args: Vec<String>,
    timeout: Duration,
) -> Result<CommandOutput, ActuatorError> {
    let output = run_with_timeout(program, &args, timeout)?;
    if !output.success {
        return Err(ActuatorError::Exit {
            program: program.to_string(),
            code: output.code,
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::mock::{LightCommand, RecordingActuator};
    use super::*;

    #[test]
    fn flash_alternates_color_and_reset() {
        let mut lights = RecordingActuator::new();
        let pattern = FlashPattern {
            count: 2,
            delay: Duration::ZERO,
        };

        flash(&mut lights, &LightColor("red".to_string()), pattern);

        assert_eq!(
            lights.commands(),
            vec![
                LightCommand::Color("red".to_string()),
                LightCommand::Reset,
                LightCommand::Color("red".to_string()),
                LightCommand::Reset,
            ]
        );
    }

    #[test]
    fn flash_keeps_going_after_failures() {
        let mut lights = RecordingActuator::new();
        lights.set_failing(true);
        let pattern = FlashPattern {
            count: 3,
            delay: Duration::ZERO,
        };

        flash(&mut lights, &LightColor("blue".to_string()), pattern);

        assert_eq!(lights.commands().len(), 6);
    }

    #[test]
    fn failing_command_reports_exit_status() {
        #[cfg(unix)]
        {
            let result = run_light_command("false", Vec::new(), Duration::from_secs(2));
            assert!(matches!(result, Err(ActuatorError::Exit { .. })));
        }
    }
}
