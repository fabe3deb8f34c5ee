//! In-process measurement registry.
//!
//! Measurements live in an arena keyed by a plain integer handle; a
//! capture session owns its handle exclusively. Appends take the
//! measurement's write lock and reconstructions its read lock, so a
//! reader always observes a consistent length-and-data snapshot of the
//! append-only channel buffers.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use log::{debug, trace};

use crate::codec::{InterleavedI16, SampleCodec};
use crate::errors::{EngineError, Result};
use crate::measurement::Measurement;

/// Opaque id of one measurement in the engine arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeasurementHandle(pub u32);

impl fmt::Display for MeasurementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "measurement {}", self.0)
    }
}

/// Reconstructed output for display or export. Ephemeral: recomputed
/// from the channel buffers on every request.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructedSeries {
    pub timestamps: Vec<f64>,
    pub channels: Vec<Vec<f64>>,
}

pub struct SignalEngine {
    measurements: RwLock<HashMap<u32, Arc<RwLock<Measurement>>>>,
    next_id: AtomicU32,
}

impl Default for SignalEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalEngine {
    pub fn new() -> SignalEngine {
        SignalEngine {
            measurements: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    /// Allocate a measurement with the reference interleaved `i16` codec.
    pub fn create_measurement(&self, channel_count: u16) -> Result<MeasurementHandle> {
        self.create_measurement_with_codec(channel_count, Box::new(InterleavedI16))
    }

    /// Allocate a measurement decoding its sample regions with `codec`.
    pub fn create_measurement_with_codec(
        &self,
        channel_count: u16,
        codec: Box<dyn SampleCodec>,
    ) -> Result<MeasurementHandle> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let measurement = Measurement::new(id, channel_count, codec)?;
        self.measurements
            .write()
            .unwrap()
            .insert(id, Arc::new(RwLock::new(measurement)));
        debug!("created measurement {id} with {channel_count} channels");
        Ok(MeasurementHandle(id))
    }

    /// Shared reference to one measurement, for lifecycle transitions and
    /// direct inspection.
    pub fn measurement(&self, handle: MeasurementHandle) -> Result<Arc<RwLock<Measurement>>> {
        self.measurements
            .read()
            .unwrap()
            .get(&handle.0)
            .cloned()
            .ok_or(EngineError::UnknownMeasurement(handle.0))
    }

    /// Append one transport payload. Returns the sample tuples added.
    pub fn ingest(&self, handle: MeasurementHandle, payload: &[u8]) -> Result<u32> {
        let measurement = self.measurement(handle)?;
        let added = measurement.write().unwrap().ingest(payload)?;
        Ok(added)
    }

    /// Reconstruct aligned timestamp and channel arrays in one snapshot.
    pub fn reconstruct(
        &self,
        handle: MeasurementHandle,
        hz: f64,
        rate_scaler: f64,
        target_cardinality: Option<u64>,
    ) -> Result<ReconstructedSeries> {
        let measurement = self.measurement(handle)?;
        let guard = measurement.read().unwrap();
        let (_, timestamps) = guard.interpret_timestamps(hz, rate_scaler, target_cardinality)?;
        let (_, channels) = guard.copy_signals(target_cardinality)?;
        Ok(ReconstructedSeries {
            timestamps,
            channels,
        })
    }

    /// Full-resolution CSV text for the archival collaborator.
    pub fn archive(&self, handle: MeasurementHandle, hz: f64, rate_scaler: f64) -> Result<String> {
        let measurement = self.measurement(handle)?;
        let guard = measurement.read().unwrap();
        guard.archive(hz, rate_scaler)
    }

    /// Remove a measurement from the arena. Its buffers are released once
    /// the last outstanding reference drops.
    pub fn drop_measurement(&self, handle: MeasurementHandle) -> bool {
        let removed = self.measurements.write().unwrap().remove(&handle.0).is_some();
        trace!("dropped {handle}: {removed}");
        removed
    }
}
