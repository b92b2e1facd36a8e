use geo_types::{point, Point};
use serde::{Deserialize, Serialize};

pub type DestinationId = i64;

#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Destination {
    pub id: DestinationId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub is_tracked: bool,
}

impl Destination {
    pub fn new(id: DestinationId, name: String, latitude: f64, longitude: f64, is_tracked: bool) -> Self {
        Self {
            id,
            name,
            latitude,
            longitude,
            is_tracked,
        }
    }

    /// x is longitude, y is latitude.
    pub fn position(&self) -> Point {
        point!(x: self.longitude, y: self.latitude)
    }
}

/// A destination that has not been stored yet, so it has no id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewDestination {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl NewDestination {
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
        }
    }

    pub fn has_valid_coordinates(&self) -> bool {
        valid_coordinates(self.latitude, self.longitude)
    }

    pub fn into_destination(self, id: DestinationId) -> Destination {
        Destination::new(id, self.name, self.latitude, self.longitude, false)
    }
}

pub fn valid_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}
