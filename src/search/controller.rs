//! Drives a search session: the initial request, the fixed-period update
//! loop, and the application of responses to the owned session.
//!
//! I/O runs in one spawned worker task per session. The worker never touches
//! session state; it sends [`WorkerEvent`]s back over a channel and the
//! owner of the controller applies them with [`SearchController::apply`].
//! Events are tagged with the session generation so a worker that outlived
//! its session cannot affect the current one.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::{ApiError, SearchApi, SearchResults};
use crate::search::session::{
    Filters, MergeOutcome, PageDirection, Phase, PollHandle, SearchError, SearchSession,
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Whether the deployment serves `/api/search/update`.
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[derive(Debug)]
pub enum WorkerEvent {
    Initial {
        generation: u64,
        result: Result<SearchResults, ApiError>,
    },
    Update {
        generation: u64,
        results: SearchResults,
    },
}

impl WorkerEvent {
    pub fn generation(&self) -> u64 {
        match self {
            WorkerEvent::Initial { generation, .. } | WorkerEvent::Update { generation, .. } => {
                *generation
            }
        }
    }
}

/// What applying a worker event did to the session.
#[derive(Debug, PartialEq, Eq)]
pub enum SearchUpdate {
    /// Event belonged to a replaced session or arrived after settling.
    Stale,
    Initial(Phase),
    InitialFailed(String),
    Merged(MergeOutcome),
}

impl SearchUpdate {
    pub fn needs_render(&self) -> bool {
        match self {
            SearchUpdate::Stale => false,
            SearchUpdate::Initial(_) | SearchUpdate::InitialFailed(_) => true,
            SearchUpdate::Merged(outcome) => outcome.needs_render(),
        }
    }
}

pub struct SearchController {
    api: Arc<dyn SearchApi>,
    settings: PollSettings,
    session: SearchSession,
    last_generation: u64,
    tx: mpsc::UnboundedSender<WorkerEvent>,
    rx: mpsc::UnboundedReceiver<WorkerEvent>,
}

impl SearchController {
    pub fn new(api: Arc<dyn SearchApi>, settings: PollSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            api,
            settings,
            session: SearchSession::idle(),
            last_generation: 0,
            tx,
            rx,
        }
    }

    pub fn session(&self) -> &SearchSession {
        &self.session
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Validates the query, tears down the current session and its worker,
    /// and spawns the worker for the new one. Must run inside a tokio
    /// runtime. A rejected query leaves the current session untouched.
    pub fn start_search(&mut self, query: &str, filters: Filters) -> Result<(), SearchError> {
        let generation = self.last_generation + 1;
        let mut session = SearchSession::start(query, filters, generation)?;
        self.last_generation = generation;

        // Old worker is cancelled before the new one exists.
        self.session.cancel_poll();

        let handle = PollHandle::new(generation);
        let token = handle.worker_token();
        session.attach_poll(handle);
        let query = session.query().to_string();
        self.session = session;

        tokio::spawn(run_worker(
            self.api.clone(),
            query,
            self.settings,
            generation,
            token,
            self.tx.clone(),
        ));
        Ok(())
    }

    pub fn apply(&mut self, event: WorkerEvent) -> SearchUpdate {
        if event.generation() != self.session.generation() {
            debug!(
                event_generation = event.generation(),
                current = self.session.generation(),
                "dropping event from replaced session"
            );
            return SearchUpdate::Stale;
        }
        match event {
            WorkerEvent::Initial { result, .. } => {
                if self.session.phase() != Phase::Searching {
                    return SearchUpdate::Stale;
                }
                match result {
                    Ok(results) => {
                        SearchUpdate::Initial(self.session.apply_initial(results, self.settings.enabled))
                    }
                    Err(e) => {
                        error!(query = %self.session.query(), error = %e, "initial search failed");
                        self.session.fail();
                        SearchUpdate::InitialFailed(e.user_message())
                    }
                }
            }
            WorkerEvent::Update { results, .. } => {
                if self.session.phase() != Phase::Polling {
                    return SearchUpdate::Stale;
                }
                SearchUpdate::Merged(self.session.merge_update(results))
            }
        }
    }

    /// Applies every event already queued without waiting. Returns the
    /// updates that were not stale.
    pub fn drain(&mut self) -> Vec<SearchUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            let update = self.apply(event);
            if update != SearchUpdate::Stale {
                updates.push(update);
            }
        }
        updates
    }

    /// Waits for the next worker event. The controller holds a sender, so
    /// this only returns `None` if the channel is closed externally.
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.rx.recv().await
    }

    pub fn turn_page(&mut self, shop: &str, direction: PageDirection) -> bool {
        self.session.turn_page(shop, direction)
    }
}

async fn run_worker(
    api: Arc<dyn SearchApi>,
    query: String,
    settings: PollSettings,
    generation: u64,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<WorkerEvent>,
) {
    let result = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!(generation, "worker cancelled before initial response");
            return;
        }
        res = api.search(&query) => res,
    };
    let failed = result.is_err();
    if tx.send(WorkerEvent::Initial { generation, result }).is_err() || failed {
        return;
    }
    if !settings.enabled {
        return;
    }

    info!(generation, interval_ms = settings.interval.as_millis() as u64, "polling started");
    let query: Arc<str> = query.into();
    let mut ticker = tokio::time::interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // Each tick owns its request, so a stalled one cannot hold back the
        // next tick. Out-of-order replies are reconciled by the merge rule.
        tokio::spawn(poll_once(
            api.clone(),
            query.clone(),
            generation,
            token.clone(),
            tx.clone(),
        ));
    }
    debug!(generation, "poll worker stopped");
}

async fn poll_once(
    api: Arc<dyn SearchApi>,
    query: Arc<str>,
    generation: u64,
    token: CancellationToken,
    tx: mpsc::UnboundedSender<WorkerEvent>,
) {
    let res = tokio::select! {
        biased;
        _ = token.cancelled() => return,
        res = api.search_update(&query) => res,
    };
    match res {
        Ok(results) => {
            if tx.send(WorkerEvent::Update { generation, results }).is_err() {
                // Controller is gone.
                token.cancel();
            }
        }
        // Transient; the next tick retries.
        Err(e) => warn!(generation, error = %e, "poll tick failed"),
    }
}
