//! Delivery engine: the dispatcher actor and its worker pool.

use std::{sync::Arc, time::Duration};

use rowan_core::{Clock, Metrics, StoredRequest};
use rowan_store::RequestStore;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    client::{ClientConfig, DeliveryClient},
    error::{DeliveryError, Result},
    retry::BackoffSchedule,
    worker::DeliveryWorker,
};

/// Each scan fetches this many records per worker. Some fetched records may
/// not be due yet and terminate the scan early; overfetching keeps the pool
/// saturated when a dense backlog is all due at once.
const OVERFETCH_FACTOR: usize = 2;

/// Configuration for the delivery engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of concurrent delivery workers.
    pub worker_count: usize,

    /// Outbound HTTP client configuration.
    pub client: ClientConfig,

    /// Backoff schedule applied to failed deliveries.
    pub backoff: BackoffSchedule,

    /// How long the dispatcher sleeps after a pass that handed nothing off.
    pub idle_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_count: crate::DEFAULT_WORKER_COUNT,
            client: ClientConfig::default(),
            backoff: BackoffSchedule::default(),
            idle_wait: Duration::from_millis(100),
        }
    }
}

/// Delivery engine coordinating one dispatcher and a fixed worker pool.
///
/// The dispatcher is the only task that selects and claims records; workers
/// only ever see records handed to them. Handoff is a rendezvous: an idle
/// worker queues a one-shot reply slot, and the dispatcher claims a record
/// only after reserving one, so the dispatcher can never mark more records
/// in-flight than there are workers to absorb them. A crash strands at
/// most `worker_count` claims, all healed by the store's startup recovery.
pub struct DeliveryEngine {
    store: Arc<RequestStore>,
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,
    client: Arc<DeliveryClient>,
    config: EngineConfig,
    shutdown: CancellationToken,
}

impl DeliveryEngine {
    /// Creates a new engine over the given store.
    pub fn new(
        store: Arc<RequestStore>,
        metrics: Arc<Metrics>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Result<Self> {
        let client = Arc::new(DeliveryClient::new(config.client.clone())?);
        Ok(Self {
            store,
            metrics,
            clock,
            client,
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// Returns a handle used to request shutdown.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs the engine until cancelled or a storage fault stops it.
    ///
    /// Spawns the worker pool, then drives the dispatch loop on the current
    /// task. On exit the ready queue is closed, every worker finishes the
    /// message in hand, and the first failure (if any) is returned after
    /// all workers have been joined.
    pub async fn run(self) -> Result<()> {
        // The ready queue carries one reply slot per idle worker; capacity
        // covers the whole pool so announcing readiness never blocks.
        let (ready_tx, mut ready_rx) =
            mpsc::channel::<oneshot::Sender<StoredRequest>>(self.config.worker_count.max(1));

        info!(
            worker_count = self.config.worker_count,
            "starting delivery engine"
        );

        let mut workers: Vec<JoinHandle<Result<()>>> =
            Vec::with_capacity(self.config.worker_count);
        for worker_id in 0..self.config.worker_count {
            let worker = DeliveryWorker::new(
                worker_id,
                self.store.clone(),
                self.client.clone(),
                self.metrics.clone(),
                self.config.backoff,
                self.clock.clone(),
                self.shutdown.clone(),
            );
            let ready = ready_tx.clone();
            workers.push(tokio::spawn(async move { worker.run(ready).await }));
        }
        // Workers hold the only remaining senders; the queue closes when
        // they all exit.
        drop(ready_tx);

        let mut result = self.scan_loop(&mut ready_rx).await;

        // Dropping the ready queue is the drain signal: each worker
        // finishes the message in hand and exits at its next announcement.
        drop(ready_rx);
        for (worker_id, handle) in workers.into_iter().enumerate() {
            match handle.await {
                Ok(Ok(())) => {},
                Ok(Err(worker_error)) => {
                    if result.is_ok() {
                        result = Err(worker_error);
                    }
                },
                Err(join_error) => {
                    error!(worker_id, error = %join_error, "worker task panicked");
                    if result.is_ok() {
                        result = Err(DeliveryError::WorkerPanic { worker_id });
                    }
                },
            }
        }

        info!("delivery engine stopped");
        result
    }

    /// The dispatcher loop: scan, claim, hand off, idle when nothing is due.
    async fn scan_loop(
        &self,
        ready: &mut mpsc::Receiver<oneshot::Sender<StoredRequest>>,
    ) -> Result<()> {
        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            match self.dispatch_due(ready).await {
                // Something was handed off; a dense backlog may hold more
                // due records, so scan again immediately.
                Ok(true) => {},
                Ok(false) => {
                    tokio::select! {
                        () = self.clock.sleep(self.config.idle_wait) => {},
                        () = self.shutdown.cancelled() => return Ok(()),
                    }
                },
                Err(storage_fault) => {
                    error!(error = %storage_fault, "storage failure while dispatching");
                    self.shutdown.cancel();
                    return Err(storage_fault);
                },
            }
        }
    }

    /// One dispatcher pass. Returns whether any record was handed off.
    async fn dispatch_due(
        &self,
        ready: &mut mpsc::Receiver<oneshot::Sender<StoredRequest>>,
    ) -> Result<bool> {
        let batch = self
            .store
            .next(self.config.worker_count * OVERFETCH_FACTOR)?;

        let now = self.clock.now_unix_nanos();
        let mut handed_off = false;

        for mut request in batch {
            if request.delivery_time > now {
                // Records arrive in key order; later ones are no earlier.
                break;
            }

            // Reserve an idle worker before touching the record, so claims
            // never outrun worker availability.
            let slot = tokio::select! {
                slot = ready.recv() => match slot {
                    Some(slot) => slot,
                    // All workers are gone; the engine is tearing down.
                    None => return Ok(handed_off),
                },
                () = self.shutdown.cancelled() => return Ok(handed_off),
            };

            // Persist the claim before handoff so a subsequent pass cannot
            // select the record while the worker processes it.
            request.scheduled = true;
            self.store.put(&request)?;

            if slot.send(request).is_err() {
                // The reserved worker died before taking the record; the
                // claim stays persisted and startup recovery reopens it.
                return Ok(handed_off);
            }
            handed_off = true;
        }

        Ok(handed_off)
    }
}
