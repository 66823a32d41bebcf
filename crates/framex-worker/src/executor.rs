//! Task executor.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use framex_models::{ExtractFramesTask, ProcessingOutcome};
use framex_queue::JobQueue;

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::packager::PackagerClient;
use crate::processor::FrameProcessor;

/// Executor that pulls tasks from the queue and runs the pipeline.
pub struct JobExecutor {
    config: WorkerConfig,
    queue: Arc<JobQueue>,
    processor: Arc<FrameProcessor>,
    packager: Arc<PackagerClient>,
    job_semaphore: Arc<Semaphore>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl JobExecutor {
    /// Create a new executor.
    pub fn new(
        config: WorkerConfig,
        queue: JobQueue,
        processor: FrameProcessor,
        packager: PackagerClient,
    ) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            config,
            queue: Arc::new(queue),
            processor: Arc::new(processor),
            packager: Arc::new(packager),
            job_semaphore,
            shutdown,
            consumer_name,
        }
    }

    /// Start the executor.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            "Starting executor '{}' with {} max concurrent jobs",
            self.consumer_name, self.config.max_concurrent_jobs
        );

        self.queue.init().await?;

        let mut shutdown_rx = self.shutdown.subscribe();

        // Periodically claim tasks abandoned by crashed workers
        let claim_task = {
            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            let packager = Arc::clone(&self.packager);
            let semaphore = Arc::clone(&self.job_semaphore);
            let consumer_name = self.consumer_name.clone();
            let claim_interval = self.config.claim_interval;
            let claim_min_idle = self.config.claim_min_idle.as_millis() as u64;
            let mut shutdown_rx = self.shutdown.subscribe();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(claim_interval);
                loop {
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        _ = interval.tick() => {
                            match queue.claim_pending(&consumer_name, claim_min_idle, 5).await {
                                Ok(tasks) if !tasks.is_empty() => {
                                    info!("Claimed {} pending tasks", tasks.len());
                                    for (message_id, task) in tasks {
                                        let Ok(permit) = semaphore.clone().acquire_owned().await else {
                                            return;
                                        };
                                        let queue = Arc::clone(&queue);
                                        let processor = Arc::clone(&processor);
                                        let packager = Arc::clone(&packager);

                                        tokio::spawn(async move {
                                            let _permit = permit;
                                            Self::execute_task(processor, packager, queue, message_id, task).await;
                                        });
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => {
                                    warn!("Failed to claim pending tasks: {}", e);
                                }
                            }
                        }
                    }
                }
            })
        };

        // Main consumption loop
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping executor");
                        break;
                    }
                }
                result = self.consume_tasks() => {
                    if let Err(e) = result {
                        error!("Error consuming tasks: {}", e);
                        // Back off on error
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        }

        claim_task.abort();

        info!("Waiting for in-flight jobs to complete...");
        let _ = tokio::time::timeout(self.config.shutdown_timeout, self.wait_for_jobs()).await;

        info!("Executor stopped");
        Ok(())
    }

    /// Consume and dispatch tasks from the queue.
    async fn consume_tasks(&self) -> WorkerResult<()> {
        let available = self.job_semaphore.available_permits();
        if available == 0 {
            // All slots busy, wait a bit
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Ok(());
        }

        let tasks = self
            .queue
            .consume(&self.consumer_name, 1000, available.min(5))
            .await?;

        if tasks.is_empty() {
            return Ok(());
        }

        debug!("Consumed {} tasks from queue", tasks.len());

        for (message_id, task) in tasks {
            let Ok(permit) = self.job_semaphore.clone().acquire_owned().await else {
                return Ok(());
            };
            let queue = Arc::clone(&self.queue);
            let processor = Arc::clone(&self.processor);
            let packager = Arc::clone(&self.packager);

            tokio::spawn(async move {
                let _permit = permit;
                Self::execute_task(processor, packager, queue, message_id, task).await;
            });
        }

        Ok(())
    }

    /// Execute one delivery end to end, with late ack and retry/DLQ handling.
    async fn execute_task(
        processor: Arc<FrameProcessor>,
        packager: Arc<PackagerClient>,
        queue: Arc<JobQueue>,
        message_id: String,
        task: ExtractFramesTask,
    ) {
        info!(job_ref = %task.job_ref, "Executing task");

        match processor.process(&task).await {
            Ok(outcome) => {
                if let ProcessingOutcome::Completed(descriptor) = &outcome {
                    counter!("framex_jobs_completed_total").increment(1);
                    // Handoff failures are a delivery concern: leave the
                    // message unacked so the transport redelivers.
                    if let Err(e) = packager.forward(descriptor).await {
                        error!(job_ref = %task.job_ref, "Handoff failed: {}", e);
                        Self::handle_failure(&queue, &message_id, &task, &e.to_string()).await;
                        return;
                    }
                } else {
                    counter!("framex_jobs_rejected_total").increment(1);
                }

                info!(job_ref = %task.job_ref, "Task finished");
                if let Err(e) = queue.ack(&message_id).await {
                    error!(job_ref = %task.job_ref, "Failed to ack task: {}", e);
                }
                // Clear dedup so the same job can be re-registered later
                if let Err(e) = queue.clear_dedup(&task).await {
                    warn!(job_ref = %task.job_ref, "Failed to clear dedup key: {}", e);
                }
            }
            Err(e) => {
                counter!("framex_jobs_failed_total").increment(1);
                error!(job_ref = %task.job_ref, "Task failed: {}", e);
                Self::handle_failure(&queue, &message_id, &task, &e.to_string()).await;
            }
        }
    }

    /// Count the failure against the delivery and dead-letter past the cap.
    async fn handle_failure(
        queue: &Arc<JobQueue>,
        message_id: &str,
        task: &ExtractFramesTask,
        error_text: &str,
    ) {
        let retry_count = queue.increment_retry(message_id).await.unwrap_or(u32::MAX);
        let max_retries = queue.max_retries();

        if retry_count >= max_retries {
            warn!(
                job_ref = %task.job_ref,
                "Task exceeded max retries ({}), moving to DLQ", max_retries
            );
            if let Err(dlq_err) = queue.dlq(message_id, task, error_text).await {
                error!(job_ref = %task.job_ref, "Failed to move task to DLQ: {}", dlq_err);
            }
            if let Err(e) = queue.clear_dedup(task).await {
                warn!(job_ref = %task.job_ref, "Failed to clear dedup key: {}", e);
            }
        } else {
            info!(
                job_ref = %task.job_ref,
                "Task will be redelivered (attempt {}/{})", retry_count, max_retries
            );
            // Redelivery happens after the visibility timeout elapses
        }
    }

    /// Wait for all in-flight jobs to complete.
    async fn wait_for_jobs(&self) {
        loop {
            if self.job_semaphore.available_permits() == self.config.max_concurrent_jobs {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }
}
