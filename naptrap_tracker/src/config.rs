use std::{path::Path, time::Duration};

use naptrap_lib::proximity::PROXIMITY_THRESHOLD_M;
use serde::{Deserialize, Serialize};

/// Largest event broadcast buffer a config may ask for.
pub const MAX_EVENT_CAPACITY: usize = 65_536;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationPriority {
    #[default]
    HighAccuracy,
    Balanced,
    LowPower,
}

/// What the tracker asks of the location source when a session starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationRequest {
    pub priority: LocationPriority,
    pub interval_ms: u64,
    pub min_interval_ms: u64,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            priority: LocationPriority::HighAccuracy,
            interval_ms: 10_000,
            min_interval_ms: 5_000,
        }
    }
}

impl LocationRequest {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub location: LocationRequest,
    pub proximity_threshold_m: f64,
    /// Capacity of the session event broadcast channel
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            location: LocationRequest::default(),
            proximity_threshold_m: PROXIMITY_THRESHOLD_M,
            event_capacity: 100,
        }
    }
}

impl TrackerConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.proximity_threshold_m > 0.) {
            return Err(ConfigError::Invalid(format!("proximity threshold must be positive, got {}", self.proximity_threshold_m)));
        }
        if self.event_capacity == 0 || self.event_capacity > MAX_EVENT_CAPACITY {
            return Err(ConfigError::Invalid(format!(
                "event capacity must be between 1 and {MAX_EVENT_CAPACITY}, got {}",
                self.event_capacity
            )));
        }
        if self.location.min_interval_ms > self.location.interval_ms {
            return Err(ConfigError::Invalid(format!(
                "min interval {}ms exceeds interval {}ms",
                self.location.min_interval_ms, self.location.interval_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_gps_cadence() {
        let config = TrackerConfig::default();
        assert_eq!(config.location.priority, LocationPriority::HighAccuracy);
        assert_eq!(config.location.interval(), Duration::from_secs(10));
        assert_eq!(config.location.min_interval(), Duration::from_secs(5));
        assert_eq!(config.proximity_threshold_m, 200.);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = TrackerConfig::parse(r#"{ "proximity_threshold_m": 350.0, "location": { "priority": "balanced" } }"#).unwrap();
        assert_eq!(config.proximity_threshold_m, 350.);
        assert_eq!(config.location.priority, LocationPriority::Balanced);
        assert_eq!(config.location.interval_ms, 10_000);
        assert_eq!(config.event_capacity, 100);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(TrackerConfig::parse(r#"{ "proximity_threshold_m": 0 }"#), Err(ConfigError::Invalid(_))));
        assert!(matches!(TrackerConfig::parse(r#"{ "event_capacity": 0 }"#), Err(ConfigError::Invalid(_))));
        assert!(matches!(TrackerConfig::parse(r#"{ "event_capacity": 65537 }"#), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            TrackerConfig::parse(r#"{ "event_capacity": 18446744073709551615 }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(TrackerConfig::parse(r#"{ "event_capacity": 65536 }"#).is_ok());
        assert!(matches!(
            TrackerConfig::parse(r#"{ "location": { "interval_ms": 1000, "min_interval_ms": 2000 } }"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(TrackerConfig::parse("not json"), Err(ConfigError::Parse(_))));
    }
}
