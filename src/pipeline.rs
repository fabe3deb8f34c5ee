//! Transport-to-engine ingestion queue.
//!
//! The transport collaborator pushes raw notification payloads into a
//! bounded channel; a worker thread drains them into the engine. Decoding
//! problems drop the offending frame and the stream continues, so a noisy
//! link never stalls ingestion, and reconstruction requests on other
//! threads never block the producer.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};
use log::{debug, error, warn};

use crate::engine::{MeasurementHandle, SignalEngine};
use crate::errors::EngineError;

/// Payloads buffered between transport notifications and the worker.
const QUEUE_DEPTH: usize = 1024;

/// Counters for one ingestion stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    /// Payloads accepted into the channel bank.
    pub payloads: u64,
    /// Sample tuples appended across all accepted payloads.
    pub samples: u64,
    /// Malformed frames dropped.
    pub dropped_frames: u64,
    /// Payloads rejected for capacity or a vanished measurement.
    pub rejected_payloads: u64,
}

/// Owns the worker thread draining payloads into one measurement.
pub struct IngestPipeline {
    sender: Sender<Vec<u8>>,
    worker: JoinHandle<IngestStats>,
}

impl IngestPipeline {
    /// Spawn the ingestion worker for `handle`.
    pub fn spawn(engine: Arc<SignalEngine>, handle: MeasurementHandle) -> IngestPipeline {
        let (sender, receiver) = bounded::<Vec<u8>>(QUEUE_DEPTH);
        let worker = thread::spawn(move || {
            let mut stats = IngestStats::default();
            for payload in receiver.iter() {
                match engine.ingest(handle, &payload) {
                    Ok(added) => {
                        stats.payloads += 1;
                        stats.samples += u64::from(added);
                    }
                    Err(EngineError::MalformedFrame(reason)) => {
                        stats.dropped_frames += 1;
                        warn!("dropping malformed frame for {handle}: {reason}");
                    }
                    Err(EngineError::CapacityExhausted { count }) => {
                        stats.rejected_payloads += 1;
                        error!("{handle} out of sample capacity at {count}; payload rejected");
                    }
                    Err(err) => {
                        stats.rejected_payloads += 1;
                        error!("ingestion failed for {handle}: {err}");
                    }
                }
            }
            debug!("ingestion worker for {handle} drained: {stats:?}");
            stats
        });
        IngestPipeline { sender, worker }
    }

    /// Sender side, handed to the transport's notification callback.
    pub fn sender(&self) -> Sender<Vec<u8>> {
        self.sender.clone()
    }

    /// Close the queue and wait for the worker to drain it.
    ///
    /// Returns once every outstanding sender clone has been dropped.
    pub fn close(self) -> IngestStats {
        let IngestPipeline { sender, worker } = self;
        drop(sender);
        worker.join().unwrap_or_else(|_| {
            error!("ingestion worker panicked");
            IngestStats::default()
        })
    }
}
