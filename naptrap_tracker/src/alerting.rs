use std::collections::BTreeSet;

use async_trait::async_trait;
use naptrap_lib::{alarm::AlarmEvent, destination::DestinationId};
use tokio::sync::Mutex;

/// Presents alarms to the user. Sound, vibration and full-screen takeover are up to the implementation.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn raise(&self, alarm: &AlarmEvent) -> anyhow::Result<()>;

    /// The user stopped the alarm for this destination.
    async fn silence(&self, destination_id: DestinationId) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlarmNotification {
    pub notification_id: DestinationId,
    pub title: String,
    pub text: String,
}

impl From<&AlarmEvent> for AlarmNotification {
    fn from(alarm: &AlarmEvent) -> Self {
        Self {
            notification_id: alarm.destination_id,
            title: "Approaching destination!".into(),
            text: format!("You are near {}", alarm.destination_name),
        }
    }
}

/// Writes alarms to the log and remembers which ones are still ringing.
#[derive(Default)]
pub struct LogAlerter {
    ringing: Mutex<BTreeSet<DestinationId>>,
}

impl LogAlerter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn ringing(&self) -> Vec<DestinationId> {
        self.ringing.lock().await.iter().copied().collect()
    }
}

#[async_trait]
impl Alerter for LogAlerter {
    async fn raise(&self, alarm: &AlarmEvent) -> anyhow::Result<()> {
        let notification = AlarmNotification::from(alarm);
        self.ringing.lock().await.insert(alarm.destination_id);
        tracing::warn!(
            destination = alarm.destination_id,
            distance_m = alarm.distance_m,
            "{}: {}", notification.title, notification.text
        );
        Ok(())
    }

    async fn silence(&self, destination_id: DestinationId) -> anyhow::Result<()> {
        if self.ringing.lock().await.remove(&destination_id) {
            tracing::info!("Alarm for destination {} stopped", destination_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use naptrap_lib::{destination::Destination, position_sample::PositionSample};

    use super::*;

    fn alarm() -> AlarmEvent {
        let dest = Destination::new(4, "Airport".into(), 23.8433, 90.3978, true);
        AlarmEvent::new(&dest, PositionSample::new(23.8433, 90.3978, Utc::now()), 0.)
    }

    #[test]
    fn notification_text() {
        let notification = AlarmNotification::from(&alarm());
        assert_eq!(notification.notification_id, 4);
        assert_eq!(notification.title, "Approaching destination!");
        assert_eq!(notification.text, "You are near Airport");
    }

    #[tokio::test]
    async fn ringing_until_silenced() {
        let alerter = LogAlerter::new();
        alerter.raise(&alarm()).await.unwrap();
        assert_eq!(alerter.ringing().await, vec![4]);

        alerter.silence(4).await.unwrap();
        alerter.silence(4).await.unwrap();
        assert!(alerter.ringing().await.is_empty());
    }
}
