use crate::config::WorkerConfig;
use crate::queue::QueueReceiver;
use crate::worker::{IndexOutcome, Worker};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Instant, SystemTime};
use tokio::sync::{watch, Mutex as TokioMutex};
use tokio::task::JoinHandle;
use xref_protocol::{Origin, WorkItem};

const MAX_DURATION_HISTORY: usize = 20;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatcherHealth {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Items dropped at dequeue for exceeding the spider depth.
    pub dropped: u64,
    pub consecutive_failures: u32,
    pub last_success: Option<SystemTime>,
    pub last_error: Option<String>,
    pub in_flight: usize,
    pub pending: usize,
    pub last_duration_ms: Option<u64>,
    pub p95_duration_ms: Option<u64>,
}

impl DispatcherHealth {
    fn initial() -> Self {
        Self {
            processed: 0,
            succeeded: 0,
            failed: 0,
            dropped: 0,
            consecutive_failures: 0,
            last_success: None,
            last_error: None,
            in_flight: 0,
            pending: 0,
            last_duration_ms: None,
            p95_duration_ms: None,
        }
    }
}

struct HealthState {
    health: DispatcherHealth,
    durations: VecDeque<u64>,
}

struct SharedHealth {
    state: Mutex<HealthState>,
    tx: watch::Sender<DispatcherHealth>,
}

impl SharedHealth {
    fn update(&self, f: impl FnOnce(&mut HealthState)) {
        let snapshot = {
            let mut state = self.lock();
            f(&mut state);
            state.health.clone()
        };
        self.tx.send_replace(snapshot);
    }

    fn lock(&self) -> MutexGuard<'_, HealthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pool of tasks pulling work items off the queue and running the worker on
/// each. Failures are logged and never stop the pool.
pub struct Dispatcher {
    shutdown_tx: watch::Sender<bool>,
    health: Arc<SharedHealth>,
    handles: Vec<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn start(worker: Arc<Worker>, queue: QueueReceiver, config: &WorkerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        let (health_tx, _) = watch::channel(DispatcherHealth::initial());
        let health = Arc::new(SharedHealth {
            state: Mutex::new(HealthState {
                health: DispatcherHealth::initial(),
                durations: VecDeque::new(),
            }),
            tx: health_tx,
        });
        let queue = Arc::new(TokioMutex::new(queue));

        let handles = (0..config.workers.max(1))
            .map(|slot| {
                spawn_dispatch_loop(
                    slot,
                    worker.clone(),
                    queue.clone(),
                    config.max_spider_depth,
                    health.clone(),
                    shutdown_tx.subscribe(),
                )
            })
            .collect();

        log::info!(
            "dispatcher started workers={} max_spider_depth={}",
            config.workers.max(1),
            config.max_spider_depth
        );

        Self {
            shutdown_tx,
            health,
            handles,
        }
    }

    #[must_use]
    pub fn health_snapshot(&self) -> DispatcherHealth {
        self.health.lock().health.clone()
    }

    #[must_use]
    pub fn health_stream(&self) -> watch::Receiver<DispatcherHealth> {
        self.health.tx.subscribe()
    }

    /// Stop pulling work. In-flight invocations are abandoned at their next
    /// await point.
    pub async fn shutdown(mut self) {
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.drain(..) {
            if let Err(err) = handle.await {
                log::warn!("dispatch task ended abnormally: {err}");
            }
        }
        log::info!("dispatcher stopped");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}

fn spawn_dispatch_loop(
    slot: usize,
    worker: Arc<Worker>,
    queue: Arc<TokioMutex<QueueReceiver>>,
    max_spider_depth: u32,
    health: Arc<SharedHealth>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let next = tokio::select! {
                _ = shutdown_rx.changed() => break,
                next = async {
                    let mut queue = queue.lock().await;
                    let item = queue.recv().await;
                    (item, queue.pending())
                } => next,
            };
            let (item, pending) = match next {
                (Some(item), pending) => (item, pending),
                (None, _) => break,
            };

            if exceeds_depth(&item.origin, max_spider_depth) {
                log::warn!(
                    "dropping work item beyond spider depth repo={} origin={:?} max_depth={max_spider_depth}",
                    item.reference,
                    item.origin
                );
                health.update(|state| {
                    state.health.dropped += 1;
                    state.health.pending = pending;
                });
                continue;
            }

            health.update(|state| {
                state.health.in_flight += 1;
                state.health.pending = pending;
            });

            let started = Instant::now();
            let result = tokio::select! {
                _ = shutdown_rx.changed() => {
                    log::info!("abandoning in-flight work repo={} worker={slot}", item.reference);
                    health.update(|state| state.health.in_flight -= 1);
                    break;
                }
                result = worker.index_item(&item) => result,
            };
            let duration = started.elapsed().as_millis() as u64;

            match &result {
                Ok(outcome) => log_outcome(&item, outcome, duration),
                Err(err) => log::error!(
                    "index failed repo={} rev={} origin={} error={err}",
                    item.reference.name,
                    item.reference.revision,
                    origin_label(&item.origin)
                ),
            }

            health.update(|state| {
                let h = &mut state.health;
                h.in_flight -= 1;
                h.processed += 1;
                h.last_duration_ms = Some(duration);
                match &result {
                    Ok(_) => {
                        h.succeeded += 1;
                        h.consecutive_failures = 0;
                        h.last_success = Some(SystemTime::now());
                        h.last_error = None;
                    }
                    Err(err) => {
                        h.failed += 1;
                        h.consecutive_failures += 1;
                        h.last_error = Some(err.to_string());
                    }
                }
                record_duration(&mut state.durations, duration);
                state.health.p95_duration_ms = compute_p95(&state.durations);
            });
        }
    })
}

/// One-hop cap on spidering, checked when an item is taken off the queue.
fn exceeds_depth(origin: &Origin, max_spider_depth: u32) -> bool {
    origin.depth() > max_spider_depth
}

fn origin_label(origin: &Origin) -> String {
    match origin {
        Origin::Primary => "primary".to_string(),
        Origin::Discovered { parent, depth } => format!("discovered(parent={parent},depth={depth})"),
    }
}

fn log_outcome(item: &WorkItem, outcome: &IndexOutcome, duration_ms: u64) {
    match outcome {
        IndexOutcome::Indexed { commit, .. } => log::debug!(
            "index finished repo={} commit={commit} duration_ms={duration_ms}",
            item.reference
        ),
        IndexOutcome::AlreadyCurrent(reason) => log::debug!(
            "already indexed repo={} reason={reason:?}",
            item.reference
        ),
        IndexOutcome::ResolveFailureIgnored => {
            log::debug!("resolve failure ignored repo={}", item.reference);
        }
    }
}

fn record_duration(history: &mut VecDeque<u64>, duration: u64) {
    history.push_back(duration);
    if history.len() > MAX_DURATION_HISTORY {
        history.pop_front();
    }
}

fn compute_p95(history: &VecDeque<u64>) -> Option<u64> {
    if history.is_empty() {
        return None;
    }
    let mut sorted: Vec<u64> = history.iter().copied().collect();
    sorted.sort_unstable();
    let idx = ((sorted.len() as f32 - 1.0) * 0.95).round() as usize;
    sorted.get(idx).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use xref_protocol::RepoName;

    #[test]
    fn depth_cap_allows_one_hop() {
        let primary = Origin::Primary;
        let hop1 = primary.child(RepoName::from("github.com/a/app"));
        let hop2 = hop1.child(RepoName::from("github.com/a/lib"));
        assert!(!exceeds_depth(&primary, 1));
        assert!(!exceeds_depth(&hop1, 1));
        assert!(exceeds_depth(&hop2, 1));
        assert!(exceeds_depth(&hop1, 0));
    }

    #[test]
    fn p95_of_rolling_window() {
        let mut history = VecDeque::new();
        assert_eq!(compute_p95(&history), None);
        for d in 1..=30 {
            record_duration(&mut history, d);
        }
        assert_eq!(history.len(), MAX_DURATION_HISTORY);
        assert_eq!(history.front(), Some(&11));
        assert_eq!(compute_p95(&history), Some(29));
    }
}
