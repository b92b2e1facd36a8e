#![allow(dead_code)]

use std::{sync::{atomic::{AtomicBool, Ordering}, Arc}, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use naptrap_data_management::DataManager;
use naptrap_lib::{destination::{Destination, DestinationId, NewDestination}, position_sample::PositionSample, store::{DestinationStore, StoreError}};
use naptrap_tracker::{alerting::LogAlerter, config::TrackerConfig, location::PushLocationSource, session::{SessionEvent, SessionHandle, SessionStatus}};
use tokio::sync::{broadcast, watch};

const WAIT: Duration = Duration::from_secs(5);

/// Sqlite-backed store whose reads can be failed or held open, and whose deletes can fail.
pub struct TestStore {
    pub inner: DataManager,
    fail_reads: AtomicBool,
    fail_deletes: AtomicBool,
    held: watch::Sender<bool>,
}

impl TestStore {
    pub async fn new() -> Self {
        Self {
            inner: DataManager::in_memory().await.unwrap(),
            fail_reads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            held: watch::Sender::new(false),
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn hold_reads(&self, hold: bool) {
        self.held.send_replace(hold);
    }
}

#[async_trait]
impl DestinationStore for TestStore {
    async fn list(&self) -> Result<Vec<Destination>, StoreError> {
        let mut held = self.held.subscribe();
        let _ = held.wait_for(|held| !held).await;

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated read failure".into()));
        }
        self.inner.list().await
    }

    async fn set_tracked(&self, id: DestinationId, is_tracked: bool) -> Result<(), StoreError> {
        DestinationStore::set_tracked(&self.inner, id, is_tracked).await
    }

    async fn delete(&self, id: DestinationId) -> Result<(), StoreError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated delete failure".into()));
        }
        self.inner.delete(id).await
    }

    async fn insert(&self, destination: NewDestination) -> Result<Destination, StoreError> {
        self.inner.insert(destination).await
    }
}

pub struct Harness {
    pub session: SessionHandle,
    pub store: Arc<TestStore>,
    pub source: Arc<PushLocationSource>,
    pub alerter: Arc<LogAlerter>,
    pub events: broadcast::Receiver<SessionEvent>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(TrackerConfig::default()).await
    }

    pub async fn with_config(config: TrackerConfig) -> Self {
        let store = Arc::new(TestStore::new().await);
        let source = Arc::new(PushLocationSource::new());
        let alerter = Arc::new(LogAlerter::new());

        let session = SessionHandle::spawn(store.clone(), source.clone(), alerter.clone(), config);
        let events = session.subscribe();

        Self {
            session,
            store,
            source,
            alerter,
            events,
        }
    }

    pub async fn add(&self, name: &str, latitude: f64, longitude: f64) -> Destination {
        self.store.inner.add_destination(NewDestination::new(name, latitude, longitude)).await.unwrap()
    }

    pub async fn is_tracked_in_store(&self, id: DestinationId) -> bool {
        self.store.inner.get_destination(id).await.unwrap().is_tracked
    }

    /// Pushes a fix and waits until the manager has finished with it.
    pub async fn feed(&self, latitude: f64, longitude: f64) -> SessionStatus {
        let before = self.session.status().await.unwrap().samples.received;
        assert!(self.source.push(PositionSample::new(latitude, longitude, Utc::now())).await, "no subscription to feed");
        self.wait_for(|status| {
            let samples = &status.samples;
            samples.received > before && samples.evaluated + samples.skipped + samples.dropped == samples.received
        }).await
    }

    pub async fn wait_for(&self, condition: impl Fn(&SessionStatus) -> bool) -> SessionStatus {
        tokio::time::timeout(WAIT, async {
            loop {
                let status = self.session.status().await.unwrap();
                if condition(&status) {
                    return status;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        }).await.expect("session never reached the expected state")
    }

    pub async fn wait_for_event(&mut self, matches: impl Fn(&SessionEvent) -> bool) -> SessionEvent {
        tokio::time::timeout(WAIT, async {
            loop {
                let event = self.events.recv().await.unwrap();
                if matches(&event) {
                    return event;
                }
            }
        }).await.expect("event never arrived")
    }

    /// Everything emitted so far that hasn't been read.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn alarms(events: &[SessionEvent]) -> Vec<DestinationId> {
        events.iter().filter_map(|event| match event {
            SessionEvent::Alarm(alarm) => Some(alarm.destination_id),
            _ => None,
        }).collect()
    }
}
