//! Row-oriented export table.
//!
//! The engine hands uncompressed CSV text to an external container step
//! (zip packaging, file naming, platform sharing); nothing here touches
//! the filesystem.

use std::fmt::Write as _;

use crate::errors::{EngineError, Result};

/// First column header of the export table.
pub const TIMESTAMP_COLUMN: &str = "TimestampSinceCaptureStart";

/// Join reconstructed timestamps and channel arrays into CSV text.
///
/// One header row, then one row per kept sample; channel values carry
/// exactly three decimal digits. Every channel must be as long as the
/// timestamp vector — callers reconstruct both at full resolution (no
/// target cardinality) for archival.
pub fn build_table(timestamps: &[f64], channels: &[Vec<f64>]) -> Result<String> {
    for (index, channel) in channels.iter().enumerate() {
        if channel.len() != timestamps.len() {
            return Err(EngineError::ArchivalMismatch {
                timestamps: timestamps.len(),
                samples: channel.len(),
                channel: index,
            });
        }
    }

    let mut table = String::with_capacity((timestamps.len() + 1) * (channels.len() + 1) * 8);
    table.push_str(TIMESTAMP_COLUMN);
    for index in 0..channels.len() {
        let _ = write!(table, ",Channel{index}");
    }
    for (row, stamp) in timestamps.iter().enumerate() {
        let _ = write!(table, "\n{stamp}");
        for channel in channels {
            let _ = write!(table, ",{:.3}", channel[row]);
        }
    }
    Ok(table)
}
