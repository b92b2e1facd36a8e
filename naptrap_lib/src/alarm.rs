use serde::{Deserialize, Serialize};

use crate::{destination::{Destination, DestinationId}, position_sample::PositionSample};

/// Raised once per destination per session, when a tracked destination first comes within range.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AlarmEvent {
    pub destination_id: DestinationId,
    pub destination_name: String,
    pub sample: PositionSample,
    pub distance_m: f64,
}

impl AlarmEvent {
    pub fn new(destination: &Destination, sample: PositionSample, distance_m: f64) -> Self {
        Self {
            destination_id: destination.id,
            destination_name: destination.name.clone(),
            sample,
            distance_m,
        }
    }
}
