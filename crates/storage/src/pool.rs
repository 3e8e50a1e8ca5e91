//! Bounded pool of in-flight interior chunk uploads.
//!
//! Each slot is a spawned task issuing one POST through the shared
//! executor. Failures are captured in the slot and only surface when the
//! slot is reconciled, so other chunks get to finish first.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use elliptics_client::RequestExecutor;
use elliptics_protocol::Method;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::StorageError;

/// Bookkeeping for one dispatched chunk.
struct Slot {
    offset: u64,
    handle: JoinHandle<Result<(), elliptics_client::Error>>,
}

/// Worker pool scoped to one upload session.
pub struct UploadPool {
    executor: Arc<RequestExecutor>,
    max_slots: usize,
    join_timeout: Duration,
    slots: Vec<Slot>,
}

impl UploadPool {
    /// `max_slots` of 0 is treated as 1.
    pub fn new(executor: Arc<RequestExecutor>, max_slots: usize, join_timeout: Duration) -> Self {
        let max_slots = max_slots.max(1);
        Self {
            executor,
            max_slots,
            join_timeout,
            slots: Vec::with_capacity(max_slots),
        }
    }

    /// Number of dispatched chunks not yet reconciled.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Dispatches one chunk upload, waiting for a free slot first.
    ///
    /// Errors returned here belong to earlier chunks reconciled while making
    /// room; the new chunk is not dispatched in that case.
    pub async fn submit(&mut self, url: String, offset: u64, body: Bytes) -> Result<(), StorageError> {
        if self.slots.len() >= self.max_slots {
            self.reap().await?;
        }
        if self.slots.len() >= self.max_slots {
            warn!(
                slots = self.slots.len(),
                offset = self.slots[0].offset,
                "all upload slots busy, waiting for oldest chunk"
            );
            let slot = self.slots.remove(0);
            self.reconcile(slot).await?;
        }

        let executor = Arc::clone(&self.executor);
        let len = body.len();
        let handle = tokio::spawn(async move {
            executor
                .execute_ok(Method::Post, &url, Some(body))
                .await
                .map(|_| ())
        });
        debug!(offset, len, slots = self.slots.len() + 1, "chunk dispatched");
        self.slots.push(Slot { offset, handle });
        Ok(())
    }

    /// Waits for every dispatched chunk.
    ///
    /// All slots are visited even after a failure; the first failure is
    /// returned and later ones are logged.
    pub async fn drain(&mut self) -> Result<(), StorageError> {
        let slots = std::mem::take(&mut self.slots);
        let count = slots.len();
        let mut first = None;
        for slot in slots {
            if let Err(e) = self.reconcile(slot).await {
                keep_first(&mut first, e);
            }
        }
        debug!(slots = count, failed = first.is_some(), "pool drained");
        first.map_or(Ok(()), Err)
    }

    /// Reconciles every slot whose task already finished, without blocking
    /// on the others.
    async fn reap(&mut self) -> Result<(), StorageError> {
        let (finished, busy): (Vec<_>, Vec<_>) = std::mem::take(&mut self.slots)
            .into_iter()
            .partition(|slot| slot.handle.is_finished());
        self.slots = busy;

        let mut first = None;
        for slot in finished {
            if let Err(e) = self.reconcile(slot).await {
                keep_first(&mut first, e);
            }
        }
        info!(
            slots_left = self.max_slots - self.slots.len(),
            "reaped finished chunk uploads"
        );
        first.map_or(Ok(()), Err)
    }

    async fn reconcile(&self, slot: Slot) -> Result<(), StorageError> {
        let Slot { offset, handle } = slot;
        match tokio::time::timeout(self.join_timeout, handle).await {
            Ok(Ok(result)) => result.map_err(StorageError::from),
            Ok(Err(join_err)) => Err(StorageError::Task(join_err.to_string())),
            Err(_) => {
                // The request keeps running detached; its outcome is unknown.
                warn!(offset, waited = ?self.join_timeout, "chunk upload did not finish in time");
                Err(StorageError::SlotTimeout {
                    offset,
                    waited: self.join_timeout,
                })
            }
        }
    }
}

fn keep_first(first: &mut Option<StorageError>, err: StorageError) {
    if first.is_some() {
        error!(error = %err, "further chunk upload failed");
    } else {
        *first = Some(err);
    }
}
