//! Wearable sensor stream reconstruction engine.
//!
//! This crate ingests the framed payloads a wireless biosignal sensor
//! streams to the host, accumulates per-channel sample buffers, and
//! reconstructs timestamp and signal arrays for live plotting and CSV
//! archival.
//!
//! # Timing and Synchronization
//!
//! The sensor samples on its own crystal and the wireless link introduces
//! variable latency, so payloads carry no per-sample wall-clock stamps.
//! Timing is reconstructed on the host:
//!
//! 1. The rolling payload counter tracks stream progress (diagnostics
//!    only; frames are assumed delivered in order).
//! 2. Sample timestamps derive from logical position alone:
//!    `index / (signal_hz * rate_scaler)` seconds since capture start.
//! 3. Live preview and archival share one deterministic downsampling
//!    stride, so both views agree on which logical samples they show.

pub mod archive;
pub mod codec;
pub mod config;
pub mod downsample;
pub mod engine;
pub mod errors;
pub mod frame;
pub mod logging;
pub mod measurement;
pub mod pipeline;
pub mod session;
pub mod store;

pub use archive::build_table;
pub use codec::{InterleavedI16, SampleCodec};
pub use config::DeviceConfig;
pub use downsample::Stride;
pub use engine::{MeasurementHandle, ReconstructedSeries, SignalEngine};
pub use errors::{EngineError, Result};
pub use frame::{Frame, HEADER_LEN, MAX_PAYLOAD_LEN};
pub use measurement::{Measurement, MeasurementState};
pub use pipeline::{IngestPipeline, IngestStats};
pub use session::{CaptureSession, Characteristic, ControlPort, CMD_HALT, CMD_START};
pub use store::{ChannelBank, SAMPLE_CEILING};
