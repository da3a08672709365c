//! Pool member consuming claimed requests one at a time.

use std::sync::Arc;

use rowan_core::{Clock, Metrics, StoredRequest};
use rowan_store::RequestStore;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    client::DeliveryClient,
    error::Result,
    retry::{self, BackoffSchedule},
};

/// Status label reported when the outbound call produced no response.
const TRANSPORT_FAILURE_CODE: u16 = 400;

/// Worker that attempts delivery of claimed requests.
///
/// Holds no state between messages: it announces readiness, receives one
/// claimed record, acts on it, and loops. Workers never communicate with
/// each other; the dispatcher's ready queue is their only coordination
/// point.
pub(crate) struct DeliveryWorker {
    id: usize,
    store: Arc<RequestStore>,
    client: Arc<DeliveryClient>,
    metrics: Arc<Metrics>,
    backoff: BackoffSchedule,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
}

impl DeliveryWorker {
    pub(crate) fn new(
        id: usize,
        store: Arc<RequestStore>,
        client: Arc<DeliveryClient>,
        metrics: Arc<Metrics>,
        backoff: BackoffSchedule,
        clock: Arc<dyn Clock>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            store,
            client,
            metrics,
            backoff,
            clock,
            shutdown,
        }
    }

    /// Consumes handoffs until the ready queue closes.
    ///
    /// Each pass announces readiness with a fresh reply slot; the
    /// dispatcher claims a record only after taking the slot, so an idle
    /// worker backs every claim. A message already in hand is always
    /// finished before exiting, so cancellation drains rather than
    /// abandons claimed records. Storage faults stop the whole engine:
    /// continuing after one would risk losing or double-delivering the
    /// record.
    pub(crate) async fn run(
        &self,
        ready: mpsc::Sender<oneshot::Sender<StoredRequest>>,
    ) -> Result<()> {
        debug!(worker_id = self.id, "delivery worker starting");

        loop {
            let (slot, handoff) = oneshot::channel();
            if ready.send(slot).await.is_err() {
                // Ready queue closed: the dispatcher has exited.
                break;
            }
            let Ok(request) = handoff.await else {
                // The dispatcher dropped the slot while shutting down.
                break;
            };

            if let Err(storage_fault) = self.process(request).await {
                error!(
                    worker_id = self.id,
                    error = %storage_fault,
                    "storage failure on delivery path"
                );
                self.shutdown.cancel();
                return Err(storage_fault);
            }
        }

        debug!(worker_id = self.id, "delivery worker stopped");
        Ok(())
    }

    /// Attempts one delivery and settles the record's fate in the store.
    async fn process(&self, request: StoredRequest) -> Result<()> {
        let outcome = self.client.deliver(&request).await;

        // Lag between the scheduled delivery time and response completion.
        let nanos_late = self.clock.now_unix_nanos() - request.delivery_time;
        #[allow(clippy::cast_precision_loss)]
        let delay_seconds = nanos_late as f64 / 1e9;

        match outcome {
            Ok(200) => {
                self.metrics.record_outbound(200, delay_seconds);
                self.store.delete(&request)?;
                info!(
                    worker_id = self.id,
                    uid = %request.uid,
                    retry = request.retry,
                    "request delivered"
                );
            },
            Ok(status) => {
                self.metrics.record_outbound(status, delay_seconds);
                warn!(
                    worker_id = self.id,
                    uid = %request.uid,
                    status,
                    retry = request.retry,
                    "upstream rejected delivery"
                );
                self.settle_failure(request)?;
            },
            Err(transport_error) => {
                self.metrics
                    .record_outbound(TRANSPORT_FAILURE_CODE, delay_seconds);
                warn!(
                    worker_id = self.id,
                    uid = %request.uid,
                    error = %transport_error,
                    retry = request.retry,
                    "delivery transport failure"
                );
                self.settle_failure(request)?;
            },
        }

        Ok(())
    }

    /// Applies the retry policy: reschedule, or drop when the TTL is spent.
    fn settle_failure(&self, request: StoredRequest) -> Result<()> {
        match retry::next_attempt(&request, self.clock.now_unix_nanos(), &self.backoff) {
            Some(next) => {
                self.store.reschedule(&request, &next)?;
                debug!(
                    worker_id = self.id,
                    uid = %request.uid,
                    retry = next.retry,
                    ttl = next.ttl,
                    delivery_time = next.delivery_time,
                    "retry scheduled"
                );
            },
            None => {
                self.store.delete(&request)?;
                warn!(
                    worker_id = self.id,
                    uid = %request.uid,
                    retry = request.retry,
                    "request expired, dropping"
                );
            },
        }
        Ok(())
    }
}
