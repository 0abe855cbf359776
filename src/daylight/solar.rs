//! Civil twilight from the sunrise equation.
//!
//! Dark means the sun is more than 6° below the horizon: before civil dawn or
//! after civil dusk of the local calendar day.

use crate::daylight::DaylightOracle;
use crate::error::OracleError;
use std::time::{SystemTime, UNIX_EPOCH};
use time::{Date, OffsetDateTime, UtcOffset};
use tracing::debug;

/// Sun altitude at civil dawn/dusk, degrees.
pub const CIVIL_DEPRESSION_DEG: f64 = -6.0;

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;
const OBLIQUITY_DEG: f64 = 23.4397;
const SECS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Twilight {
    /// Unix seconds of civil dawn and dusk.
    Window { dawn: f64, dusk: f64 },
    AlwaysDark,
    NeverDark,
}

#[derive(Debug, Clone, Copy)]
pub struct SolarDaylight {
    latitude: f64,
    longitude: f64,
    offset: UtcOffset,
}

impl SolarDaylight {
    /// `longitude` is east-positive; `offset` picks which calendar day is "today".
    pub fn new(latitude: f64, longitude: f64, offset: UtcOffset) -> Result<Self, OracleError> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(OracleError::InvalidCoordinates {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
            offset,
        })
    }

    pub fn is_dark_at(&self, now: SystemTime) -> Result<bool, OracleError> {
        let secs = now
            .duration_since(UNIX_EPOCH)
            .map_err(|err| OracleError::Clock(err.to_string()))?
            .as_secs_f64();
        let local = OffsetDateTime::from_unix_timestamp(secs.floor() as i64)
            .map_err(|err| OracleError::Clock(err.to_string()))?
            .to_offset(self.offset);

        let dark = match twilight(local.date(), self.latitude, self.longitude) {
            Twilight::Window { dawn, dusk } => {
                debug!(dawn, dusk, now = secs, "Civil twilight window");
                secs < dawn || secs > dusk
            }
            Twilight::AlwaysDark => true,
            Twilight::NeverDark => false,
        };
        Ok(dark)
    }
}

impl DaylightOracle for SolarDaylight {
    fn is_dark(&mut self) -> Result<bool, OracleError> {
        self.is_dark_at(SystemTime::now())
    }
}

/// Civil dawn and dusk around the solar noon of `date` at the given location.
pub fn twilight(date: Date, latitude: f64, longitude: f64) -> Twilight {
    let days = f64::from(date.to_julian_day()) - J2000;
    let mean_noon = days - longitude / 360.0;

    let anomaly = (357.5291 + 0.985_600_28 * mean_noon).rem_euclid(360.0);
    let m = anomaly.to_radians();
    let center = 1.9148 * m.sin() + 0.0200 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();
    let ecliptic = (anomaly + center + 180.0 + 102.9372).rem_euclid(360.0).to_radians();
    let transit = J2000 + mean_noon + 0.0053 * m.sin() - 0.0069 * (2.0 * ecliptic).sin();

    let declination = (ecliptic.sin() * OBLIQUITY_DEG.to_radians().sin()).asin();
    let phi = latitude.to_radians();
    let cos_hour_angle = (CIVIL_DEPRESSION_DEG.to_radians().sin() - phi.sin() * declination.sin())
        / (phi.cos() * declination.cos());

    if cos_hour_angle > 1.0 {
        return Twilight::AlwaysDark;
    }
    if cos_hour_angle < -1.0 {
        return Twilight::NeverDark;
    }

    let half_day = cos_hour_angle.acos().to_degrees() / 360.0;
    Twilight::Window {
        dawn: (transit - half_day - UNIX_EPOCH_JD) * SECS_PER_DAY,
        dusk: (transit + half_day - UNIX_EPOCH_JD) * SECS_PER_DAY,
    }
}
