use std::{collections::{BTreeSet, HashSet}, sync::Arc};

use futures::StreamExt;
use naptrap_lib::{alarm::AlarmEvent, destination::{Destination, DestinationId}, position_sample::PositionSample, proximity, store::{DestinationStore, StoreError}};
use tokio::{sync::{broadcast, mpsc, oneshot}, task::{JoinError, JoinHandle}};

use crate::{alerting::Alerter, config::{TrackerConfig, MAX_EVENT_CAPACITY}, location::{LocationError, LocationSource, PositionStream}};

const COMMAND_CAPACITY: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("tracking session manager is not running")]
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A location subscription was opened for these destinations.
    Started { tracked: Vec<DestinationId> },
    Alarm(AlarmEvent),
    Untracked(DestinationId),
    /// The location subscription was closed and the session sets discarded.
    Ended,
    LocationLost(LocationError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Active,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleCounters {
    pub received: u64,
    /// Arrived while the store read for an earlier sample was outstanding
    pub dropped: u64,
    pub evaluated: u64,
    /// The store read failed
    pub skipped: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    pub tracked: Vec<DestinationId>,
    pub triggered: Vec<DestinationId>,
    pub samples: SampleCounters,
}

enum Command {
    Track { id: DestinationId, reply: oneshot::Sender<Result<(), SessionError>> },
    Untrack { id: DestinationId, reply: oneshot::Sender<Result<(), SessionError>> },
    StopAlarm { id: DestinationId, reply: oneshot::Sender<Result<(), SessionError>> },
    Delete { id: DestinationId, reply: oneshot::Sender<Result<(), SessionError>> },
    Resume { reply: oneshot::Sender<Result<Vec<DestinationId>, SessionError>> },
    Status { reply: oneshot::Sender<SessionStatus> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Cloneable handle to the tracking session manager. All state lives in one actor task,
/// so commands and samples are applied one at a time.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    /// Spawns the manager on the current tokio runtime. It starts idle; call [`SessionHandle::resume`]
    /// to pick up destinations that were tracked before.
    pub fn spawn(
        store: Arc<dyn DestinationStore>,
        source: Arc<dyn LocationSource>,
        alerter: Arc<dyn Alerter>,
        config: TrackerConfig,
    ) -> Self {
        let (commands, receiver) = mpsc::channel(COMMAND_CAPACITY);
        let (events, _) = broadcast::channel(config.event_capacity.clamp(1, MAX_EVENT_CAPACITY));

        let actor = SessionActor {
            store,
            source,
            alerter,
            config,
            events: events.clone(),
            state: SessionState::Idle,
            pending_read: None,
            generation: 0,
            counters: SampleCounters::default(),
        };
        tokio::spawn(actor.run(receiver));

        Self {
            commands,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Marks the destination as tracked and starts the session if it was idle.
    pub async fn track(&self, id: DestinationId) -> Result<(), SessionError> {
        self.request(|reply| Command::Track { id, reply }).await?
    }

    /// Clears the tracked mark. Ends the session when nothing is left to track.
    pub async fn untrack(&self, id: DestinationId) -> Result<(), SessionError> {
        self.request(|reply| Command::Untrack { id, reply }).await?
    }

    /// The user acknowledged the alarm for this destination.
    pub async fn stop_alarm(&self, id: DestinationId) -> Result<(), SessionError> {
        self.request(|reply| Command::StopAlarm { id, reply }).await?
    }

    pub async fn delete(&self, id: DestinationId) -> Result<(), SessionError> {
        self.request(|reply| Command::Delete { id, reply }).await?
    }

    /// Tracks every destination the store has marked as tracked. Returns their ids.
    pub async fn resume(&self) -> Result<Vec<DestinationId>, SessionError> {
        self.request(|reply| Command::Resume { reply }).await?
    }

    pub async fn status(&self) -> Result<SessionStatus, SessionError> {
        self.request(|reply| Command::Status { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.commands.send(command(reply)).await.map_err(|_| SessionError::Closed)?;
        response.await.map_err(|_| SessionError::Closed)
    }
}

struct ActiveSession {
    generation: u64,
    tracked: BTreeSet<DestinationId>,
    triggered: HashSet<DestinationId>,
    samples: PositionStream,
}

enum SessionState {
    Idle,
    Active(ActiveSession),
}

/// Session generation, the sample, and what the store returned for it.
type StoreRead = (u64, PositionSample, Result<Vec<Destination>, StoreError>);

struct SessionActor {
    store: Arc<dyn DestinationStore>,
    source: Arc<dyn LocationSource>,
    alerter: Arc<dyn Alerter>,
    config: TrackerConfig,
    events: broadcast::Sender<SessionEvent>,
    state: SessionState,
    pending_read: Option<JoinHandle<StoreRead>>,
    generation: u64,
    counters: SampleCounters,
}

impl SessionActor {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    if !self.handle(command).await {
                        break;
                    }
                },
                sample = next_sample(&mut self.state) => self.on_sample(sample).await,
                read = finish_read(&mut self.pending_read) => self.on_store_read(read).await,
            }
        }

        self.end_session().await;
        tracing::debug!("Tracking session manager stopped");
    }

    /// Returns false when the actor should stop.
    async fn handle(&mut self, command: Command) -> bool {
        match command {
            Command::Track { id, reply } => {
                let _ = reply.send(self.track(id).await);
            },
            Command::Untrack { id, reply } => {
                let _ = reply.send(self.untrack(id).await);
            },
            Command::StopAlarm { id, reply } => {
                let _ = reply.send(self.stop_alarm(id).await);
            },
            Command::Delete { id, reply } => {
                let _ = reply.send(self.delete(id).await);
            },
            Command::Resume { reply } => {
                let _ = reply.send(self.resume().await);
            },
            Command::Status { reply } => {
                let _ = reply.send(self.status());
            },
            Command::Shutdown { reply } => {
                self.end_session().await;
                let _ = reply.send(());
                return false;
            },
        }
        true
    }

    async fn track(&mut self, id: DestinationId) -> Result<(), SessionError> {
        self.store.set_tracked(id, true).await?;

        if let SessionState::Active(session) = &mut self.state {
            if session.tracked.insert(id) {
                tracing::info!("Tracking destination {}", id);
            }
            return Ok(());
        }

        self.start_session(BTreeSet::from([id])).await
    }

    async fn untrack(&mut self, id: DestinationId) -> Result<(), SessionError> {
        // Leave the session even if the store write fails, so a vanished destination can't keep it alive.
        let stored = self.store.set_tracked(id, false).await;
        self.remove_tracked(id).await;
        Ok(stored?)
    }

    async fn stop_alarm(&mut self, id: DestinationId) -> Result<(), SessionError> {
        if let Err(err) = self.alerter.silence(id).await {
            tracing::warn!("Failed to silence alarm for destination {}: {err:#}", id);
        }
        self.untrack(id).await
    }

    /// Clears the tracked flag before deleting, so a failed delete can't be resumed later.
    async fn delete(&mut self, id: DestinationId) -> Result<(), SessionError> {
        self.untrack(id).await?;
        self.store.delete(id).await?;
        Ok(())
    }

    async fn resume(&mut self) -> Result<Vec<DestinationId>, SessionError> {
        let tracked: BTreeSet<DestinationId> = self.store.list_tracked().await?
            .into_iter()
            .map(|dest| dest.id)
            .collect();
        let ids = tracked.iter().copied().collect();

        if tracked.is_empty() {
            tracing::debug!("Nothing to resume");
            return Ok(ids);
        }

        if let SessionState::Active(session) = &mut self.state {
            session.tracked.extend(tracked);
            return Ok(ids);
        }

        self.start_session(tracked).await?;
        Ok(ids)
    }

    fn status(&self) -> SessionStatus {
        match &self.state {
            SessionState::Idle => SessionStatus {
                phase: SessionPhase::Idle,
                tracked: Vec::new(),
                triggered: Vec::new(),
                samples: self.counters.clone(),
            },
            SessionState::Active(session) => {
                let mut triggered: Vec<_> = session.triggered.iter().copied().collect();
                triggered.sort_unstable();
                SessionStatus {
                    phase: SessionPhase::Active,
                    tracked: session.tracked.iter().copied().collect(),
                    triggered,
                    samples: self.counters.clone(),
                }
            },
        }
    }

    async fn start_session(&mut self, tracked: BTreeSet<DestinationId>) -> Result<(), SessionError> {
        let samples = self.source.subscribe(&self.config.location).await.inspect_err(|err| {
            tracing::warn!("Could not start tracking session: {err}");
        })?;

        self.generation += 1;
        let ids: Vec<_> = tracked.iter().copied().collect();
        tracing::info!("Tracking session {} started for destinations {:?}", self.generation, ids);

        self.state = SessionState::Active(ActiveSession {
            generation: self.generation,
            tracked,
            triggered: HashSet::new(),
            samples,
        });
        self.emit(SessionEvent::Started { tracked: ids });
        Ok(())
    }

    /// Drops the id from both session sets. Ending the session when the last one goes.
    async fn remove_tracked(&mut self, id: DestinationId) {
        let SessionState::Active(session) = &mut self.state else {
            return;
        };

        session.triggered.remove(&id);
        if !session.tracked.remove(&id) {
            return;
        }
        let now_empty = session.tracked.is_empty();

        tracing::info!("Stopped tracking destination {}", id);
        self.emit(SessionEvent::Untracked(id));

        if now_empty {
            self.end_session().await;
        }
    }

    /// Closes the subscription. Does nothing when already idle.
    async fn end_session(&mut self) {
        if let Some(read) = self.pending_read.take() {
            read.abort();
        }

        let SessionState::Active(session) = std::mem::replace(&mut self.state, SessionState::Idle) else {
            return;
        };
        drop(session.samples);
        self.source.unsubscribe().await;

        tracing::info!("Tracking session {} ended", session.generation);
        self.emit(SessionEvent::Ended);
    }

    async fn on_sample(&mut self, sample: Option<Result<PositionSample, LocationError>>) {
        let sample = match sample {
            Some(Ok(sample)) => sample,
            Some(Err(err)) => return self.lose_subscription(err).await,
            None => return self.lose_subscription(LocationError::Unavailable("location updates ended".into())).await,
        };

        self.counters.received += 1;

        if self.pending_read.is_some() {
            self.counters.dropped += 1;
            tracing::trace!("Dropping sample, store read still outstanding");
            return;
        }

        let SessionState::Active(session) = &self.state else {
            return;
        };
        let generation = session.generation;
        let store = self.store.clone();
        self.pending_read = Some(tokio::spawn(async move {
            let destinations = store.list().await;
            (generation, sample, destinations)
        }));
    }

    async fn on_store_read(&mut self, read: Result<StoreRead, JoinError>) {
        let (generation, sample, destinations) = match read {
            Ok(read) => read,
            Err(err) => {
                self.counters.skipped += 1;
                tracing::warn!("Store read task failed, skipping sample: {err}");
                return;
            },
        };

        let SessionState::Active(session) = &mut self.state else {
            return;
        };
        if session.generation != generation {
            tracing::debug!("Discarding sample from session {}", generation);
            return;
        }

        let destinations = match destinations {
            Ok(destinations) => destinations,
            Err(err) => {
                self.counters.skipped += 1;
                tracing::warn!("Failed to read destinations, skipping sample: {err}");
                return;
            },
        };

        let candidates = destinations.iter().filter(|dest| session.tracked.contains(&dest.id));
        let alarms: Vec<AlarmEvent> = proximity::evaluate_with_threshold(&sample, candidates, &session.triggered, self.config.proximity_threshold_m)
            .into_iter()
            .map(|dest| AlarmEvent::new(dest, sample, proximity::distance_to(&sample, dest)))
            .collect();

        for alarm in &alarms {
            session.triggered.insert(alarm.destination_id);
        }
        self.counters.evaluated += 1;

        tracing::debug!(
            "Sample ({:.5}, {:.5}) evaluated, {} new alarm(s)",
            sample.latitude(), sample.longitude(), alarms.len()
        );

        for alarm in alarms {
            self.fire(alarm).await;
        }
    }

    async fn fire(&mut self, alarm: AlarmEvent) {
        tracing::info!(
            "Destination {} ({}) is {:.0} m away, raising alarm",
            alarm.destination_id, alarm.destination_name, alarm.distance_m
        );

        if let Err(err) = self.alerter.raise(&alarm).await {
            tracing::error!("Failed to raise alarm for destination {}: {err:#}", alarm.destination_id);
        }
        self.emit(SessionEvent::Alarm(alarm));
    }

    /// Not retried. The store's tracked flags are kept, so [`SessionHandle::resume`] can restart later.
    async fn lose_subscription(&mut self, err: LocationError) {
        tracing::warn!("Location updates lost: {err}");
        self.emit(SessionEvent::LocationLost(err));
        self.end_session().await;
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

async fn next_sample(state: &mut SessionState) -> Option<Result<PositionSample, LocationError>> {
    match state {
        SessionState::Active(session) => session.samples.next().await,
        SessionState::Idle => std::future::pending().await,
    }
}

async fn finish_read(pending: &mut Option<JoinHandle<StoreRead>>) -> Result<StoreRead, JoinError> {
    let Some(handle) = pending.as_mut() else {
        return std::future::pending().await;
    };
    let read = handle.await;
    *pending = None;
    read
}
