//! Outbox worker for periodic batch delivery to the remote store.
//!
//! Polls the SQLite-backed outbox for due entries, hands each one to the
//! reconciler, and updates local outbox status based on the outcome. Join
//! handles are tracked, cancellation is explicit, and batch processing is
//! wrapped in a timeout. Entries that keep failing are deferred on the
//! retry schedule and eventually parked as dead letters.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use loadout_infra::{OutboxWorker, OutboxWorkerConfig};
//!
//! # async fn example() -> Result<(), String> {
//! // ... create outbox_repo and reconciler ...
//! # let outbox_repo = todo!(); // Arc<dyn loadout_core::OutboxQueue>
//! # let reconciler = todo!(); // Arc<loadout_core::SyncReconciler>
//! let mut worker = OutboxWorker::new(
//!     outbox_repo,
//!     reconciler,
//!     OutboxWorkerConfig {
//!         batch_size: 50,
//!         poll_interval: Duration::from_secs(60),
//!         ..Default::default()
//!     },
//! );
//!
//! worker.start().await?;
//! // ... application runs ...
//! worker.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use loadout_core::{OutboxQueue, SyncReconciler};
use loadout_domain::{Result as DomainResult, SyncOutboxEntry};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::sync::retry::RetryPolicy;

/// Configuration for the outbox worker.
#[derive(Debug, Clone)]
pub struct OutboxWorkerConfig {
    /// Maximum number of entries to process per batch
    pub batch_size: usize,
    /// Interval between polling attempts
    pub poll_interval: Duration,
    /// Timeout for processing a single batch
    pub processing_timeout: Duration,
    /// Join timeout when stopping
    pub join_timeout: Duration,
    /// Backoff schedule and attempt budget for failing entries
    pub retry: RetryPolicy,
}

impl Default for OutboxWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            poll_interval: Duration::from_secs(60),
            processing_timeout: Duration::from_secs(300),
            join_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Interface for executing outbox entries against a remote destination.
#[async_trait]
pub trait EntryExecutor: Send + Sync {
    /// Execute one entry; an error schedules a retry.
    async fn execute_entry(&self, entry: &SyncOutboxEntry) -> DomainResult<()>;
}

#[async_trait]
impl EntryExecutor for SyncReconciler {
    async fn execute_entry(&self, entry: &SyncOutboxEntry) -> DomainResult<()> {
        self.execute(entry).await
    }
}

/// Outbox worker with explicit lifecycle management.
pub struct OutboxWorker {
    outbox_repo: Arc<dyn OutboxQueue>,
    executor: Arc<dyn EntryExecutor>,
    config: OutboxWorkerConfig,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl OutboxWorker {
    /// Create a new outbox worker with the given configuration.
    pub fn new(
        outbox_repo: Arc<dyn OutboxQueue>,
        executor: Arc<dyn EntryExecutor>,
        config: OutboxWorkerConfig,
    ) -> Self {
        Self {
            outbox_repo,
            executor,
            config,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the worker, spawning the background processing task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), String> {
        if self.is_running() {
            return Err("Worker already running".to_string());
        }

        info!("Starting outbox worker");

        // Create fresh cancellation token
        self.cancellation = CancellationToken::new();

        let outbox_repo = Arc::clone(&self.outbox_repo);
        let executor = Arc::clone(&self.executor);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::process_loop(outbox_repo, executor, config, cancel).await;
        });

        self.task_handle = Some(handle);
        info!("Outbox worker started");

        Ok(())
    }

    /// Stop the worker and wait for the processing task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<(), String> {
        if !self.is_running() {
            return Err("Worker not running".to_string());
        }

        info!("Stopping outbox worker");

        // Cancel background task
        self.cancellation.cancel();

        // Await join handle with timeout
        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.config.join_timeout;
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Worker task panicked: {}", e);
                    return Err("Worker task panicked".to_string());
                }
                Err(_) => {
                    warn!("Worker task did not complete within timeout");
                    return Err("Worker task timeout".to_string());
                }
            }
        }

        info!("Outbox worker stopped");
        self.cancellation = CancellationToken::new();

        Ok(())
    }

    /// Returns true when a worker instance is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.is_some()
    }

    /// Background processing loop.
    async fn process_loop(
        outbox_repo: Arc<dyn OutboxQueue>,
        executor: Arc<dyn EntryExecutor>,
        config: OutboxWorkerConfig,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Outbox worker process loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(config.poll_interval) => {
                    match tokio::time::timeout(
                        config.processing_timeout,
                        Self::process_batch(&outbox_repo, &executor, config.batch_size, &config.retry),
                    )
                    .await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            error!(error = %e, "Batch processing failed");
                        }
                        Err(_) => {
                            warn!(
                                timeout_secs = config.processing_timeout.as_secs(),
                                "Batch processing timed out"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Process a single batch of due outbox entries.
    async fn process_batch(
        outbox_repo: &Arc<dyn OutboxQueue>,
        executor: &Arc<dyn EntryExecutor>,
        batch_size: usize,
        retry: &RetryPolicy,
    ) -> Result<(), String> {
        let now = Utc::now().timestamp();
        let entries = outbox_repo
            .dequeue_due(now, batch_size)
            .await
            .map_err(|e| format!("Failed to dequeue batch: {e}"))?;

        if entries.is_empty() {
            debug!("No due entries to process");
            return Ok(());
        }

        info!(count = entries.len(), "Processing outbox batch");

        let mut fatal_errors: Vec<String> = Vec::new();
        let mut delivered = 0_u32;
        let mut failures = 0_u32;

        for entry in entries {
            match executor.execute_entry(&entry).await {
                Ok(()) => {
                    debug!(entry_id = %entry.id, "Delivered outbox entry");
                    if let Err(err) = outbox_repo.mark_sent(&entry.id, Utc::now().timestamp()).await
                    {
                        let msg = err.to_string();
                        warn!(entry_id = %entry.id, error = %msg, "mark_sent failed");
                        fatal_errors.push(format!("mark_sent error for {}: {}", entry.id, msg));
                    } else {
                        delivered = delivered.saturating_add(1);
                    }
                }
                Err(err) => {
                    let attempts_made = u32::try_from(entry.attempts).unwrap_or(0).saturating_add(1);
                    let next_attempt_at = retry.next_attempt_at(attempts_made, Utc::now().timestamp());
                    if next_attempt_at.is_none() {
                        warn!(
                            entry_id = %entry.id,
                            attempts = attempts_made,
                            error = %err,
                            "Entry exhausted its attempt budget; parking as dead letter"
                        );
                    } else {
                        warn!(entry_id = %entry.id, error = %err, "Delivering outbox entry failed");
                    }
                    if let Err(mark_err) =
                        outbox_repo.mark_failed(&entry.id, &err.to_string(), next_attempt_at).await
                    {
                        let msg = mark_err.to_string();
                        warn!(entry_id = %entry.id, error = %msg, "mark_failed failed");
                        fatal_errors.push(format!("mark_failed error for {}: {}", entry.id, msg));
                    }
                    failures = failures.saturating_add(1);
                }
            }
        }

        debug!(delivered = delivered, failures = failures, "Outbox batch completed");

        if !fatal_errors.is_empty() {
            return Err(fatal_errors.join("; "));
        }

        Ok(())
    }
}

impl Drop for OutboxWorker {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("OutboxWorker dropped while running; cancelling tasks");
            self.cancellation.cancel();
        }
    }
}
