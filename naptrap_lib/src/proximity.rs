use std::collections::HashSet;

use geo_types::Point;

use crate::{destination::{Destination, DestinationId}, position_sample::PositionSample};

pub const PROXIMITY_THRESHOLD_M: f64 = 200.0;

/// Mean earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in meters between two points given as (x: lon, y: lat).
pub fn haversine_distance(p1: Point, p2: Point) -> f64 {
    let d_lat = (p2.y() - p1.y()).to_radians();
    let d_lon = (p2.x() - p1.x()).to_radians();
    let lat1 = p1.y().to_radians();
    let lat2 = p2.y().to_radians();

    let a = f64::sin(d_lat / 2.).powi(2)
        + f64::cos(lat1) * f64::cos(lat2) * f64::sin(d_lon / 2.).powi(2);
    let c = 2. * f64::asin(f64::sqrt(a.min(1.)));

    EARTH_RADIUS_M * c
}

pub fn distance_to(sample: &PositionSample, destination: &Destination) -> f64 {
    haversine_distance(sample.position, destination.position())
}

/// Returns the candidates that are within [`PROXIMITY_THRESHOLD_M`] of the sample and have not
/// triggered yet, in the order they were given.
pub fn evaluate<'a>(
    sample: &PositionSample,
    candidates: impl IntoIterator<Item = &'a Destination>,
    already_triggered: &HashSet<DestinationId>,
) -> Vec<&'a Destination> {
    evaluate_with_threshold(sample, candidates, already_triggered, PROXIMITY_THRESHOLD_M)
}

pub fn evaluate_with_threshold<'a>(
    sample: &PositionSample,
    candidates: impl IntoIterator<Item = &'a Destination>,
    already_triggered: &HashSet<DestinationId>,
    threshold_m: f64,
) -> Vec<&'a Destination> {
    candidates
        .into_iter()
        .filter(|dest| !already_triggered.contains(&dest.id))
        .filter(|dest| distance_to(sample, dest) < threshold_m)
        .collect()
}
