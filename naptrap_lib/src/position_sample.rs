use chrono::{DateTime, Utc};
use geo_types::{point, Point};
use serde::{Deserialize, Serialize};

/// A single fix from the location source. Accuracy is what the source reports, in meters,
/// and is not used for distance checks.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PositionSample {
    pub position: Point,
    pub timestamp: DateTime<Utc>,
    pub accuracy: Option<f32>,
}

impl PositionSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            position: point!(x: longitude, y: latitude),
            timestamp,
            accuracy: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }
}
