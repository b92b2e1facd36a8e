use async_trait::async_trait;
use futures::{stream::{self, BoxStream}, StreamExt};
use naptrap_lib::position_sample::PositionSample;
use tokio::sync::{mpsc, Mutex};

use crate::config::LocationRequest;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location provider disabled")]
    ProviderDisabled,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

/// Samples of one subscription. An `Err` item, or the end of the stream, means the
/// subscription is lost.
pub type PositionStream = BoxStream<'static, Result<PositionSample, LocationError>>;

#[async_trait]
pub trait LocationSource: Send + Sync {
    async fn subscribe(&self, request: &LocationRequest) -> Result<PositionStream, LocationError>;

    /// Releases whatever the source holds for the current subscription. Must be idempotent.
    async fn unsubscribe(&self) {}
}

/// A location source fed from outside, e.g. by a platform callback or a command line.
pub struct PushLocationSource {
    sender: Mutex<Option<mpsc::UnboundedSender<Result<PositionSample, LocationError>>>>,
    unavailable: Mutex<Option<LocationError>>,
}

impl PushLocationSource {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
            unavailable: Mutex::new(None),
        }
    }

    /// Returns false when nobody is subscribed and the sample went nowhere.
    pub async fn push(&self, sample: PositionSample) -> bool {
        match self.sender.lock().await.as_ref() {
            Some(tx) => tx.send(Ok(sample)).is_ok(),
            None => false,
        }
    }

    /// Ends the current subscription with `error`.
    pub async fn fail(&self, error: LocationError) {
        if let Some(tx) = self.sender.lock().await.take() {
            let _ = tx.send(Err(error));
        }
    }

    /// While set, new subscriptions are refused with this error.
    pub async fn set_unavailable(&self, error: Option<LocationError>) {
        *self.unavailable.lock().await = error;
    }

    pub async fn is_subscribed(&self) -> bool {
        self.sender.lock().await.as_ref().is_some_and(|tx| !tx.is_closed())
    }
}

impl Default for PushLocationSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationSource for PushLocationSource {
    async fn subscribe(&self, request: &LocationRequest) -> Result<PositionStream, LocationError> {
        if let Some(error) = self.unavailable.lock().await.clone() {
            return Err(error);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock().await = Some(tx);

        tracing::debug!("Push source subscribed with {:?}", request);

        let samples = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|sample| (sample, rx))
        });
        Ok(samples.boxed())
    }

    async fn unsubscribe(&self) {
        self.sender.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[tokio::test]
    async fn push_reaches_subscriber() {
        let source = PushLocationSource::new();
        assert!(!source.push(PositionSample::new(1., 2., Utc::now())).await);

        let mut stream = source.subscribe(&LocationRequest::default()).await.unwrap();
        assert!(source.is_subscribed().await);
        assert!(source.push(PositionSample::new(1., 2., Utc::now())).await);

        let sample = stream.next().await.unwrap().unwrap();
        assert_eq!((sample.latitude(), sample.longitude()), (1., 2.));
    }

    #[tokio::test]
    async fn fail_ends_subscription() {
        let source = PushLocationSource::new();
        let mut stream = source.subscribe(&LocationRequest::default()).await.unwrap();

        source.fail(LocationError::ProviderDisabled).await;

        assert_eq!(stream.next().await, Some(Err(LocationError::ProviderDisabled)));
        assert!(stream.next().await.is_none());
        assert!(!source.is_subscribed().await);
    }

    #[tokio::test]
    async fn unavailable_refuses_and_unsubscribe_is_idempotent() {
        let source = PushLocationSource::new();
        source.set_unavailable(Some(LocationError::PermissionDenied)).await;
        assert_eq!(source.subscribe(&LocationRequest::default()).await.err(), Some(LocationError::PermissionDenied));

        source.set_unavailable(None).await;
        let _stream = source.subscribe(&LocationRequest::default()).await.unwrap();
        source.unsubscribe().await;
        source.unsubscribe().await;
        assert!(!source.is_subscribed().await);
    }
}
