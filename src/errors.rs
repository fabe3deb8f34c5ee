use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Frame failed header validation. The frame is dropped; the stream
    /// continues and no counters are touched.
    #[error("malformed frame: {0}")]
    MalformedFrame(&'static str),
    /// The sample counter reached the 32-bit-safe ceiling; the frame is
    /// rejected but the session is left for the caller to retire.
    #[error("sample capacity exhausted at {count} samples")]
    CapacityExhausted { count: u64 },
    #[error("sample count {count} too large to reconstruct")]
    ReconstructionOverflow { count: u64 },
    #[error("archive column mismatch: {timestamps} timestamps vs {samples} samples in channel {channel}")]
    ArchivalMismatch {
        timestamps: usize,
        samples: usize,
        channel: usize,
    },
    #[error("no measurement for handle {0}")]
    UnknownMeasurement(u32),
    #[error("no active measurement")]
    NoActiveMeasurement,
    #[error("channel count {0} out of range (1-255)")]
    InvalidChannelCount(u16),
    #[error("not configured: {0}")]
    NotConfigured(&'static str),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("config serialization error: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
