//! Per-device capture session.
//!
//! A session owns at most one active measurement; starting a new one
//! retires the previous measurement into the finalized list first.
//! Lifecycle changes are mirrored to the sensor as control writes:
//! [`CMD_START`] begins streaming, [`CMD_HALT`] stops it. While paused
//! the device stops notifying, which is what actually stops ingestion;
//! the buffer store itself never refuses appends.

use std::io;
use std::sync::Arc;

use log::{debug, info, trace};

use crate::config::DeviceConfig;
use crate::engine::{MeasurementHandle, ReconstructedSeries, SignalEngine};
use crate::errors::{EngineError, Result};

/// Control command starting acquisition on the sensor.
pub const CMD_START: u8 = 0x69;
/// Control command halting acquisition.
pub const CMD_HALT: u8 = 0x00;

/// Writable characteristics of the sensor service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Characteristic {
    Control,
    DeviceName,
    HardwareVersion,
    UniqueIdentifier,
}

/// Write side of the transport collaborator.
pub trait ControlPort: Send {
    fn write(&mut self, characteristic: Characteristic, data: &[u8]) -> io::Result<()>;
}

pub struct CaptureSession<P: ControlPort> {
    engine: Arc<SignalEngine>,
    port: P,
    config: DeviceConfig,
    active: Option<MeasurementHandle>,
    finalized: Vec<MeasurementHandle>,
}

impl<P: ControlPort> CaptureSession<P> {
    pub fn new(engine: Arc<SignalEngine>, port: P, config: DeviceConfig) -> CaptureSession<P> {
        CaptureSession {
            engine,
            port,
            config,
            active: None,
            finalized: Vec::new(),
        }
    }

    pub fn active(&self) -> Option<MeasurementHandle> {
        self.active
    }

    /// Measurements retired by [`CaptureSession::stop_measurement`], still
    /// available for export.
    pub fn finalized(&self) -> &[MeasurementHandle] {
        &self.finalized
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut DeviceConfig {
        &mut self.config
    }

    fn rates(&self) -> Result<(f64, f64)> {
        let hz = self
            .config
            .signal_hz
            .ok_or(EngineError::NotConfigured("signal rate"))?;
        Ok((f64::from(hz), self.config.rate_scaler))
    }

    /// Create a fresh running measurement, retiring any active one first,
    /// and tell the sensor to stream.
    pub fn start_measurement(&mut self) -> Result<MeasurementHandle> {
        let channels = self
            .config
            .channel_count
            .ok_or(EngineError::NotConfigured("channel count"))?;
        if self.active.is_some() {
            self.stop_measurement()?;
        }

        let handle = self.engine.create_measurement(u16::from(channels))?;
        self.engine.measurement(handle)?.write().unwrap().begin();
        self.active = Some(handle);
        self.port.write(Characteristic::Control, &[CMD_START])?;
        info!("started {handle} with {channels} channels");
        Ok(handle)
    }

    /// Halt streaming without retiring the measurement.
    pub fn pause(&mut self) -> Result<()> {
        match self.active {
            Some(handle) => {
                self.engine.measurement(handle)?.write().unwrap().pause();
                self.port.write(Characteristic::Control, &[CMD_HALT])?;
                info!("paused {handle}");
            }
            None => debug!("no active measurement to pause"),
        }
        Ok(())
    }

    /// Resume streaming into the active measurement. Resuming while
    /// already running is a no-op apart from the control write.
    pub fn resume(&mut self) -> Result<()> {
        match self.active {
            Some(handle) => {
                self.engine.measurement(handle)?.write().unwrap().begin();
                self.port.write(Characteristic::Control, &[CMD_START])?;
                info!("resumed {handle}");
            }
            None => debug!("no active measurement to resume"),
        }
        Ok(())
    }

    /// End the active measurement and keep it for inspection and export.
    pub fn stop_measurement(&mut self) -> Result<()> {
        match self.active.take() {
            Some(handle) => {
                self.engine.measurement(handle)?.write().unwrap().finish();
                self.finalized.push(handle);
                self.port.write(Characteristic::Control, &[CMD_HALT])?;
                info!("stopped {handle}");
            }
            None => trace!("no active measurement to stop"),
        }
        Ok(())
    }

    /// Downsampled series of the active measurement for live display.
    pub fn preview(&self, target_cardinality: u64) -> Result<ReconstructedSeries> {
        let handle = self.active.ok_or(EngineError::NoActiveMeasurement)?;
        let (hz, scaler) = self.rates()?;
        self.engine
            .reconstruct(handle, hz, scaler, Some(target_cardinality))
    }

    /// Full-resolution archive text for an active or finalized handle.
    pub fn export(&self, handle: MeasurementHandle) -> Result<String> {
        let (hz, scaler) = self.rates()?;
        self.engine.archive(handle, hz, scaler)
    }

    /// Forget a finalized measurement and release its buffers.
    pub fn discard(&mut self, handle: MeasurementHandle) -> bool {
        self.finalized.retain(|kept| *kept != handle);
        self.engine.drop_measurement(handle)
    }

    /// Push a user-visible device name and remember it in the config.
    pub fn write_name(&mut self, name: &str) -> Result<()> {
        self.port.write(Characteristic::DeviceName, name.as_bytes())?;
        self.config.persisted_name = Some(name.to_owned());
        Ok(())
    }

    /// Push an edited hardware revision and remember it in the config.
    pub fn write_hardware_version(&mut self, version: &str) -> Result<()> {
        self.port
            .write(Characteristic::HardwareVersion, version.as_bytes())?;
        self.config.hardware_version = Some(version.to_owned());
        Ok(())
    }

    /// Push an edited unique identifier and remember it in the config.
    pub fn write_unique_identifier(&mut self, id: &str) -> Result<()> {
        self.port
            .write(Characteristic::UniqueIdentifier, id.as_bytes())?;
        self.config.unique_identifier = Some(id.to_owned());
        Ok(())
    }
}
