//! Periodic drain of the pending-event store.

use crate::{chunk_events, decode_pending_events, BatchDispatcher, MAX_BATCH_SIZE};
use collector_database::{DatabaseResult, EventStore, PendingEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for draining.
#[derive(Debug, Clone)]
pub struct DrainWorkerConfig {
    /// Maximum events per dispatched chunk.
    pub batch_size: usize,
    /// Time between scheduled drain cycles.
    pub interval: Duration,
}

impl Default for DrainWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: MAX_BATCH_SIZE,
            interval: Duration::from_secs(300),
        }
    }
}

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Rows claimed and removed from the store.
    pub claimed: usize,
    /// Claimed rows dropped because their payload did not decode.
    pub dropped: usize,
    /// Chunks handed to the dispatcher.
    pub batches: usize,
}

struct Schedule {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Claims everything pending and dispatches it in bounded chunks.
///
/// Holds no state between cycles besides the periodic trigger; the store
/// is the only coordination point, so overlapping cycles never send the
/// same row twice.
pub struct DrainWorker {
    config: DrainWorkerConfig,
    store: Arc<dyn EventStore>,
    dispatcher: Arc<dyn BatchDispatcher>,
    schedule: Mutex<Option<Schedule>>,
}

impl DrainWorker {
    pub fn new(
        config: DrainWorkerConfig,
        store: Arc<dyn EventStore>,
        dispatcher: Arc<dyn BatchDispatcher>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
            schedule: Mutex::new(None),
        }
    }

    /// Run one drain cycle.
    ///
    /// Never fails: an unready store, a store error, or an empty queue all
    /// yield an empty report. Dispatch happens after the claim transaction
    /// has committed.
    pub async fn run(&self) -> DrainReport {
        let rows = match self.claim().await {
            Ok(Some(rows)) => rows,
            Ok(None) => {
                debug!("Event store not ready, skipping drain");
                return DrainReport::default();
            }
            Err(e) => {
                warn!(error = %e, "Failed to claim pending events");
                return DrainReport::default();
            }
        };

        if rows.is_empty() {
            return DrainReport::default();
        }

        let claimed = rows.len();
        let (events, dropped) = decode_pending_events(rows);
        let batches = chunk_events(events, self.config.batch_size);

        for batch in &batches {
            self.dispatcher.dispatch(batch);
        }

        let report = DrainReport {
            claimed,
            dropped,
            batches: batches.len(),
        };
        info!(
            claimed = report.claimed,
            dropped = report.dropped,
            batches = report.batches,
            "Drain cycle complete"
        );
        report
    }

    /// Readiness check and claim, off the async threads.
    async fn claim(&self) -> DatabaseResult<Option<Vec<PendingEvent>>> {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || {
            if !store.is_ready() {
                return Ok(None);
            }
            store.claim_and_remove().map(Some)
        })
        .await;

        match result {
            Ok(claimed) => claimed,
            Err(e) => {
                warn!(error = %e, "Claim task did not complete");
                Ok(None)
            }
        }
    }

    /// Register the periodic trigger.
    ///
    /// The first cycle runs immediately, then every `interval`. Cycles never
    /// overlap. Returns `false` if a trigger is already registered.
    pub async fn schedule(self: &Arc<Self>) -> bool {
        let mut slot = self.schedule.lock().await;
        if slot.as_ref().is_some_and(|s| !s.task.is_finished()) {
            debug!("Drain schedule already registered");
            return false;
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let worker = Arc::clone(self);
        let period = self.config.interval;

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        worker.run().await;
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            debug!("Drain loop exited");
        });

        *slot = Some(Schedule { shutdown, task });
        info!(interval_ms = period.as_millis() as u64, "Drain schedule registered");
        true
    }

    pub async fn is_scheduled(&self) -> bool {
        self.schedule
            .lock()
            .await
            .as_ref()
            .is_some_and(|s| !s.task.is_finished())
    }

    /// Drain once, then deregister the periodic trigger.
    ///
    /// Waits for an in-flight scheduled cycle to finish before returning.
    /// Rows appended after the final claim stay in the store.
    pub async fn flush_and_stop(&self) -> DrainReport {
        let report = self.run().await;

        let schedule = self.schedule.lock().await.take();
        if let Some(schedule) = schedule {
            let _ = schedule.shutdown.send(true);
            if let Err(e) = schedule.task.await {
                warn!(error = %e, "Drain loop ended abnormally");
            }
            info!("Drain schedule deregistered");
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        AnalyticsRecord, CollectEvent, EventBatch, EventEnvelope, HttpBatchSender, SenderConfig,
    };
    use collector_database::{DatabasePool, PoolConfig};
    use std::collections::HashSet;
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Records the row ids of every dispatched batch.
    #[derive(Default)]
    struct RecordingDispatcher {
        batches: StdMutex<Vec<Vec<i64>>>,
    }

    impl RecordingDispatcher {
        fn batches(&self) -> Vec<Vec<i64>> {
            self.batches.lock().unwrap().clone()
        }
    }

    impl BatchDispatcher for RecordingDispatcher {
        fn dispatch(&self, batch: &EventBatch) {
            self.batches.lock().unwrap().push(batch.event_ids());
        }
    }

    fn payload(n: i64) -> String {
        CollectEvent {
            envelope: EventEnvelope {
                project_id: "proj".to_string(),
                session_id: String::new(),
                version: "0.1.0".to_string(),
            },
            analytics: AnalyticsRecord {
                time: n,
                ip: "Unknown".to_string(),
                ua: "Unknown".to_string(),
                url: format!("https://example.com/{}", n),
                method: "GET".to_string(),
                response_content_type: "text/html".to_string(),
            },
        }
        .to_payload()
        .unwrap()
    }

    fn open_store(dir: &TempDir, provision: bool) -> Arc<DatabasePool> {
        let path = dir.path().join("events.db");
        let pool = DatabasePool::open(&path, PoolConfig::default()).unwrap();
        if provision {
            pool.provision().unwrap();
        }
        Arc::new(pool)
    }

    fn fill(store: &DatabasePool, count: i64) {
        for n in 1..=count {
            store.append(&payload(n)).unwrap();
        }
    }

    fn worker(
        store: Arc<DatabasePool>,
        dispatcher: Arc<RecordingDispatcher>,
        batch_size: usize,
        interval: Duration,
    ) -> Arc<DrainWorker> {
        Arc::new(DrainWorker::new(
            DrainWorkerConfig {
                batch_size,
                interval,
            },
            store,
            dispatcher,
        ))
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    #[test]
    fn test_drain_config_default() {
        let config = DrainWorkerConfig::default();
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.interval, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_run_on_unprovisioned_store_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let store = open_store(&dir, false);
        let worker = worker(store, dispatcher.clone(), 50, Duration::from_secs(300));

        assert_eq!(worker.run().await, DrainReport::default());
        assert!(dispatcher.batches().is_empty());
    }

    #[tokio::test]
    async fn test_run_on_empty_store_dispatches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let store = open_store(&dir, true);
        let worker = worker(store, dispatcher.clone(), 50, Duration::from_secs(300));

        assert_eq!(worker.run().await, DrainReport::default());
        assert!(dispatcher.batches().is_empty());
    }

    #[tokio::test]
    async fn test_store_error_yields_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, true);
        fill(&store, 2);

        // Drop the table behind the cached readiness of `store`
        let path = dir.path().join("events.db");
        let other = DatabasePool::open(&path, PoolConfig::default()).unwrap();
        other.teardown().unwrap();
        assert!(store.is_ready());

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let worker = worker(store.clone(), dispatcher.clone(), 50, Duration::from_secs(300));

        assert_eq!(worker.run().await, DrainReport::default());
        assert!(dispatcher.batches().is_empty());
        assert!(store.claim_and_remove().is_err());
    }

    /// Store whose claim panics on the blocking thread.
    struct PanickingStore;

    impl EventStore for PanickingStore {
        fn is_ready(&self) -> bool {
            true
        }

        fn append(&self, _payload: &str) -> DatabaseResult<i64> {
            Ok(1)
        }

        fn claim_and_remove(&self) -> DatabaseResult<Vec<PendingEvent>> {
            panic!("claim exploded");
        }

        fn pending_count(&self) -> DatabaseResult<usize> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_failed_claim_task_yields_empty_report() {
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let worker = DrainWorker::new(
            DrainWorkerConfig::default(),
            Arc::new(PanickingStore),
            dispatcher.clone(),
        );

        assert_eq!(worker.run().await, DrainReport::default());
        assert!(dispatcher.batches().is_empty());
    }

    #[tokio::test]
    async fn test_run_chunks_in_id_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, true);
        fill(&store, 120);

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let worker = worker(store.clone(), dispatcher.clone(), 50, Duration::from_secs(300));

        let report = worker.run().await;
        assert_eq!(
            report,
            DrainReport {
                claimed: 120,
                dropped: 0,
                batches: 3
            }
        );

        let batches = dispatcher.batches();
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        let ids: Vec<i64> = batches.into_iter().flatten().collect();
        assert_eq!(ids, (1..=120).collect::<Vec<i64>>());
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_malformed_row_is_dropped_and_not_redelivered() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, true);
        store.append(&payload(1)).unwrap();
        store.append(&payload(2)).unwrap();
        store.append("{\"envelope\": \"broken\"").unwrap();
        store.append(&payload(4)).unwrap();
        store.append(&payload(5)).unwrap();

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let worker = worker(store.clone(), dispatcher.clone(), 50, Duration::from_secs(300));

        let report = worker.run().await;
        assert_eq!(report.claimed, 5);
        assert_eq!(report.dropped, 1);
        assert_eq!(dispatcher.batches(), vec![vec![1, 2, 4, 5]]);
        assert_eq!(store.pending_count().unwrap(), 0);

        assert_eq!(worker.run().await, DrainReport::default());
        assert_eq!(dispatcher.batches().len(), 1);
    }

    #[tokio::test]
    async fn test_all_rows_malformed_dispatches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, true);
        store.append("nope").unwrap();
        store.append("[]").unwrap();

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let worker = worker(store.clone(), dispatcher.clone(), 50, Duration::from_secs(300));

        let report = worker.run().await;
        assert_eq!(report.claimed, 2);
        assert_eq!(report.dropped, 2);
        assert_eq!(report.batches, 0);
        assert!(dispatcher.batches().is_empty());
    }

    #[tokio::test]
    async fn test_failed_sends_do_not_stop_later_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, true);
        fill(&store, 7);

        // Nothing listens on the discard port, every send fails
        let sender = HttpBatchSender::new(SenderConfig {
            endpoint: "http://127.0.0.1:9/collect".to_string(),
            timeout: Duration::from_millis(200),
            max_redirects: 5,
        })
        .unwrap();
        let worker = DrainWorker::new(
            DrainWorkerConfig {
                batch_size: 3,
                interval: Duration::from_secs(300),
            },
            store.clone(),
            Arc::new(sender),
        );

        let report = worker.run().await;
        assert_eq!(report.batches, 3);
        assert_eq!(store.pending_count().unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_runs_never_double_send() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, true);
        fill(&store, 100);

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let worker = worker(store.clone(), dispatcher.clone(), 10, Duration::from_secs(300));

        let (a, b) = tokio::join!(worker.run(), worker.run());
        assert_eq!(a.claimed + b.claimed, 100);

        let ids: Vec<i64> = dispatcher.batches().into_iter().flatten().collect();
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), 100);
        assert_eq!(unique.len(), 100);
    }

    #[tokio::test]
    async fn test_schedule_drains_periodically_until_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, true);
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let worker = worker(store.clone(), dispatcher.clone(), 50, Duration::from_millis(20));

        assert!(worker.schedule().await);
        assert!(!worker.schedule().await);
        assert!(worker.is_scheduled().await);

        fill(&store, 3);
        wait_for(|| dispatcher.batches().len() == 1).await;
        assert_eq!(dispatcher.batches(), vec![vec![1, 2, 3]]);

        store.append(&payload(4)).unwrap();
        wait_for(|| dispatcher.batches().len() == 2).await;

        worker.flush_and_stop().await;
        assert!(!worker.is_scheduled().await);

        // Appends after the stop stay pending for the next start
        store.append(&payload(5)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(dispatcher.batches().len(), 2);
        assert_eq!(store.pending_count().unwrap(), 1);

        // And the trigger can be registered again
        assert!(worker.schedule().await);
        wait_for(|| dispatcher.batches().len() == 3).await;
        worker.flush_and_stop().await;
    }

    #[tokio::test]
    async fn test_flush_and_stop_drains_without_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir, true);
        fill(&store, 4);

        let dispatcher = Arc::new(RecordingDispatcher::default());
        let worker = worker(store.clone(), dispatcher.clone(), 50, Duration::from_secs(300));

        let report = worker.flush_and_stop().await;
        assert_eq!(report.claimed, 4);
        assert_eq!(dispatcher.batches(), vec![vec![1, 2, 3, 4]]);
        assert!(!worker.is_scheduled().await);
    }
}
