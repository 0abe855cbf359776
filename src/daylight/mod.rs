use crate::error::OracleError;
use std::sync::{Arc, Mutex};

pub mod solar;

/// Answers "should lighting consider it night right now?".
pub trait DaylightOracle {
    fn is_dark(&mut self) -> Result<bool, OracleError>;
}

impl DaylightOracle for Box<dyn DaylightOracle + Send> {
    fn is_dark(&mut self) -> Result<bool, OracleError> {
        (**self).is_dark()
    }
}

/// Fixed answer, e.g. `always_dark` for daytime testing.
#[derive(Debug, Clone, Copy)]
pub struct StaticDaylight {
    dark: bool,
}

impl StaticDaylight {
    pub fn new(dark: bool) -> Self {
        Self { dark }
    }
}

impl DaylightOracle for StaticDaylight {
    fn is_dark(&mut self) -> Result<bool, OracleError> {
        Ok(self.dark)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockSky {
    Light,
    Dark,
    Fail,
}

/// Switchable oracle for tests; clones share the current reading.
#[derive(Debug, Clone)]
pub struct MockDaylight {
    sky: Arc<Mutex<MockSky>>,
}

impl MockDaylight {
    pub fn new(sky: MockSky) -> Self {
        Self {
            sky: Arc::new(Mutex::new(sky)),
        }
    }

    pub fn set(&self, sky: MockSky) {
        if let Ok(mut guard) = self.sky.lock() {
            *guard = sky;
        }
    }
}

impl DaylightOracle for MockDaylight {
    fn is_dark(&mut self) -> Result<bool, OracleError> {
        let sky = self
            .sky
            .lock()
            .map_err(|_| OracleError::Clock("mock sky poisoned".to_string()))?;
        match *sky {
            MockSky::Light => Ok(false),
            MockSky::Dark => Ok(true),
            MockSky::Fail => Err(OracleError::Clock("mock oracle failure".to_string())),
        }
    }
}
