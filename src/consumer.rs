//! Drives position events from an [`Ingress`] through partition workers and
//! publishes the resulting schedule events to an [`Egress`].
//!
//! A delivery is routed to worker `partition % workers`, so every event of a
//! vehicle is handled by the same worker in delivery order. Each worker owns
//! its own [`SignalProcessor`] and therefore its own dedup state.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, warn};

use crate::config::ProcessorConfig;
use crate::error::Error;
use crate::processor::{Outcome, SignalProcessor};
use crate::stats::{ProcessorStats, StatsSnapshot};
use crate::stops::StopRegistry;
use crate::stream::{Delivery, Egress, Ingress};

const WORKER_QUEUE: usize = 256;

#[derive(Debug)]
enum Ack {
    Commit { partition: u32, offset: u64 },
    Withhold { partition: u32, offset: u64 },
}

/// What a finished run left behind.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub stats: StatsSnapshot,
    /// Deliveries whose processing failed; the source will redeliver them.
    pub uncommitted: Vec<(u32, u64)>,
    /// Dedup entries held across all workers when they stopped.
    pub dedup_entries: usize,
}

pub struct Consumer {
    registry: Arc<StopRegistry>,
    config: ProcessorConfig,
    egress: Arc<dyn Egress>,
    stats: Arc<ProcessorStats>,
    workers: usize,
}

impl Consumer {
    pub fn new(
        registry: Arc<StopRegistry>,
        config: ProcessorConfig,
        egress: Arc<dyn Egress>,
        stats: Arc<ProcessorStats>,
    ) -> Self {
        Self {
            registry,
            config,
            egress,
            stats,
            workers: 1,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Consumes `ingress` until it is exhausted.
    ///
    /// Successfully processed deliveries are committed whether or not their
    /// publish succeeded. Deliveries whose processing failed stay uncommitted.
    /// Malformed records never reach a worker and are skipped.
    ///
    /// # Errors
    ///
    /// Fails when the input stream itself breaks. Deliveries already handed to
    /// workers are still processed and acknowledged first.
    pub async fn run<I: Ingress + ?Sized>(&self, ingress: &mut I) -> Result<RunSummary> {
        let (ack_tx, mut ack_rx) = mpsc::unbounded_channel();
        let mut senders = Vec::with_capacity(self.workers);
        let mut handles = Vec::with_capacity(self.workers);

        for id in 0..self.workers {
            let (tx, rx) = mpsc::channel(WORKER_QUEUE);
            senders.push(tx);
            handles.push(self.spawn_worker(id, rx, ack_tx.clone()));
        }
        drop(ack_tx);

        self.stats.set_running(true);
        info!(workers = self.workers, stops = self.registry.len(), "Consumer started");

        let mut input_open = true;
        let mut input_error = None;
        loop {
            tokio::select! {
                biased;

                ack = ack_rx.recv() => match ack {
                    Some(Ack::Commit { partition, offset }) => {
                        ingress.commit(partition, offset).await?;
                    }
                    Some(Ack::Withhold { partition, offset }) => {
                        warn!(partition, offset, "Acknowledgment withheld, record will be redelivered");
                    }
                    None => break,
                },

                item = ingress.recv(), if input_open => match item {
                    Some(Ok(delivery)) => {
                        let event = &delivery.event;
                        info!(
                            partition = delivery.partition,
                            offset = delivery.offset,
                            vehicle_id = %delivery.key,
                            plate_number = event.plate_number.as_deref(),
                            latitude = event.latitude,
                            longitude = event.longitude,
                            speed_kmh = event.speed_kmh,
                            vehicle_status = event.status.as_deref(),
                            city = event.city.as_deref(),
                            passenger_count = event.passenger_count,
                            reported_at = ?event.timestamp,
                            "Position received"
                        );
                        let worker = delivery.partition as usize % senders.len();
                        senders[worker]
                            .send(delivery)
                            .await
                            .context("partition worker stopped unexpectedly")?;
                    }
                    Some(Err(e @ Error::Decode { .. })) => {
                        warn!(error = %e, "Skipping malformed record");
                        self.stats.record_malformed();
                    }
                    Some(Err(e)) => {
                        error!(error = %e, code = e.code(), "Input stream failed, draining workers");
                        input_error = Some(e);
                        input_open = false;
                        senders.clear();
                    }
                    None => {
                        info!("Input exhausted, draining workers");
                        input_open = false;
                        senders.clear();
                    }
                },
            }
        }

        let mut dedup_entries = 0;
        for handle in handles {
            dedup_entries += handle.await.context("partition worker panicked")?;
        }
        self.stats.set_running(false);

        if let Some(e) = input_error {
            return Err(e).context("consumer stopped before the end of input");
        }

        let summary = RunSummary {
            stats: self.stats.snapshot(),
            uncommitted: ingress.uncommitted(),
            dedup_entries,
        };
        info!(
            received = summary.stats.received,
            emitted = summary.stats.emitted,
            suppressed = summary.stats.suppressed,
            failed = summary.stats.failed,
            uncommitted = summary.uncommitted.len(),
            "Consumer finished"
        );
        Ok(summary)
    }

    fn spawn_worker(
        &self,
        id: usize,
        mut rx: mpsc::Receiver<Delivery>,
        acks: mpsc::UnboundedSender<Ack>,
    ) -> JoinHandle<usize> {
        let mut processor = SignalProcessor::new(Arc::clone(&self.registry), self.config.clone());
        let egress = Arc::clone(&self.egress);
        let stats = Arc::clone(&self.stats);
        let span = tracing::info_span!("partition_worker", worker = id);

        tokio::spawn(
            async move {
                while let Some(delivery) = rx.recv().await {
                    let ack = process_delivery(&mut processor, egress.as_ref(), &stats, &delivery).await;
                    if acks.send(ack).is_err() {
                        break;
                    }
                }
                debug!(dedup_entries = processor.store().len(), "Worker stopped");
                processor.store().len()
            }
            .instrument(span),
        )
    }
}

async fn process_delivery(
    processor: &mut SignalProcessor,
    egress: &dyn Egress,
    stats: &ProcessorStats,
    delivery: &Delivery,
) -> Ack {
    let Delivery {
        partition, offset, ..
    } = *delivery;
    stats.record_received();

    let outcome = match processor.process(&delivery.event) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(
                vehicle_id = %delivery.event.vehicle_id,
                partition,
                offset,
                code = e.code(),
                error = %e,
                "Failed to process position"
            );
            stats.record_failure();
            return Ack::Withhold { partition, offset };
        }
    };
    stats.record_outcome(&outcome);

    if let Outcome::Emit { event, .. } = outcome {
        match egress.publish(&event.vehicle_id, &event).await {
            Ok(()) => info!(
                vehicle_id = %event.vehicle_id,
                stop_id = %event.stop_id,
                stop_name = %event.stop_name,
                sequence_number = event.sequence_number,
                status = %event.status,
                estimated_time = %event.estimated_time,
                actual_time = %event.actual_time,
                delay_minutes = event.delay_minutes,
                "Schedule published"
            ),
            Err(e) => {
                error!(
                    vehicle_id = %event.vehicle_id,
                    stop_id = %event.stop_id,
                    status = %event.status,
                    error = %e,
                    "Failed to publish schedule"
                );
                stats.record_publish_failure();
            }
        }
    }

    Ack::Commit { partition, offset }
}
