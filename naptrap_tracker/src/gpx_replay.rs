use std::{io::Read, path::Path, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt};
use naptrap_lib::position_sample::PositionSample;

use crate::{config::LocationRequest, location::{LocationError, LocationSource, PositionStream}};

/// Replays the track points of a GPX file as if they were live fixes, one per interval.
/// After the last point the subscription stays open and silent, like a device standing still.
pub struct GpxReplaySource {
    samples: Vec<PositionSample>,
    pace: Option<Duration>,
}

impl GpxReplaySource {
    pub fn open(path: &Path) -> Result<Self, LocationError> {
        let file = std::fs::File::open(path)
            .map_err(|e| LocationError::Unavailable(format!("Failed to open {:?}: {e}", path)))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, LocationError> {
        let gpx = gpx::read(reader)
            .map_err(|e| LocationError::Unavailable(format!("Failed to parse GPX: {e}")))?;

        let mut samples = Vec::new();
        for track in gpx.tracks {
            for segment in track.segments {
                for point in segment.points {
                    let position = point.point();
                    let timestamp = point.time
                        .and_then(|t| t.format().ok())
                        .and_then(|t| DateTime::parse_from_rfc3339(&t).ok())
                        .map(|t| t.with_timezone(&Utc))
                        .unwrap_or_else(Utc::now);
                    samples.push(PositionSample::new(position.y(), position.x(), timestamp));
                }
            }
        }

        if samples.is_empty() {
            return Err(LocationError::Unavailable("GPX file has no track points".into()));
        }

        Ok(Self::from_samples(samples))
    }

    pub fn from_samples(samples: Vec<PositionSample>) -> Self {
        Self {
            samples,
            pace: None,
        }
    }

    /// Overrides the requested interval between replayed fixes. Still no faster than the
    /// request's minimum interval.
    pub fn with_pace(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }

    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }
}

#[async_trait]
impl LocationSource for GpxReplaySource {
    async fn subscribe(&self, request: &LocationRequest) -> Result<PositionStream, LocationError> {
        let pace = self.pace.unwrap_or_else(|| request.interval()).max(request.min_interval());
        tracing::info!("Replaying {} GPX points every {:?}", self.samples.len(), pace);

        let replay = stream::iter(self.samples.clone())
            .then(move |sample| async move {
                tokio::time::sleep(pace).await;
                // Stamp as a live fix would be
                Ok::<_, LocationError>(PositionSample { timestamp: Utc::now(), ..sample })
            });

        Ok(replay.chain(stream::pending()).boxed())
    }
}
