//! Tunables of the signal processor.

use serde::Serialize;

use crate::error::{Error, Result};

/// Default radius within which a vehicle counts as near a stop.
pub const DEFAULT_PROXIMITY_THRESHOLD_KM: f64 = 0.5;
pub const DEFAULT_ARRIVING_WINDOW_MINUTES: u32 = 5;

pub const DEFAULT_INPUT_TOPIC: &str = "vehicle_positions";
pub const DEFAULT_OUTPUT_TOPIC: &str = "schedules";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorConfig {
    /// Maximum distance (km) at which a stop can be matched.
    pub proximity_threshold_km: f64,
    /// Reported on the info endpoint. Classification does not read it; the
    /// arriving state is decided by fixed distance and speed limits.
    pub arriving_window_minutes: u32,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            proximity_threshold_km: DEFAULT_PROXIMITY_THRESHOLD_KM,
            arriving_window_minutes: DEFAULT_ARRIVING_WINDOW_MINUTES,
        }
    }
}

impl ProcessorConfig {
    pub fn new(proximity_threshold_km: f64, arriving_window_minutes: u32) -> Result<Self> {
        let config = Self {
            proximity_threshold_km,
            arriving_window_minutes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.proximity_threshold_km.is_finite() || self.proximity_threshold_km <= 0.0 {
            return Err(Error::Config(format!(
                "proximity threshold must be a positive number of km, got {}",
                self.proximity_threshold_km
            )));
        }
        Ok(())
    }
}

/// Names of the consumed and produced streams.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topics {
    pub consumes: String,
    pub produces: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            consumes: DEFAULT_INPUT_TOPIC.to_string(),
            produces: DEFAULT_OUTPUT_TOPIC.to_string(),
        }
    }
}
