//! One capture session's accumulation and reconstruction state.
//!
//! A `Measurement` consumes transport payloads into its channel bank and
//! answers reconstruction requests: a timestamp axis derived from logical
//! position and the nominal rate, and per-channel sample arrays sharing
//! the same downsampling stride so both outputs stay index-aligned.

use std::time::SystemTime;

use log::{debug, error, trace};

use crate::codec::SampleCodec;
use crate::downsample::Stride;
use crate::errors::{EngineError, Result};
use crate::frame::{self, HEADER_OVERHEAD};
use crate::store::{ChannelBank, SAMPLE_CEILING};

/// Lifecycle of a measurement: `Initial -> Running <-> Paused -> Ended`.
///
/// Re-entering `Running` (resume) is a no-op. `Ended` is terminal; the
/// buffers stay readable for reconstruction and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MeasurementState {
    #[default]
    Initial,
    Running,
    Paused,
    Ended,
}

pub struct Measurement {
    id: u32,
    bank: ChannelBank,
    codec: Box<dyn SampleCodec>,
    state: MeasurementState,
    payload_count: u64,
    avg_effective_payload: f32,
    start_stamp: Option<SystemTime>,
}

impl Measurement {
    pub fn new(id: u32, channel_count: u16, codec: Box<dyn SampleCodec>) -> Result<Measurement> {
        debug!("allocating measurement {id} with {channel_count} channels");
        Ok(Measurement {
            id,
            bank: ChannelBank::new(channel_count)?,
            codec,
            state: MeasurementState::Initial,
            payload_count: 0,
            avg_effective_payload: 0.0,
            start_stamp: None,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> MeasurementState {
        self.state
    }

    pub fn channel_count(&self) -> usize {
        self.bank.channel_count()
    }

    pub fn sample_count(&self) -> u64 {
        self.bank.sample_count()
    }

    /// Payloads ingested since the last run stretch began.
    pub fn payload_count(&self) -> u64 {
        self.payload_count
    }

    /// Exponentially-smoothed effective payload size (bytes past the
    /// header overhead).
    pub fn avg_effective_payload(&self) -> f32 {
        self.avg_effective_payload
    }

    /// Wall-clock stamp of the first payload of the current run stretch.
    pub fn start_stamp(&self) -> Option<SystemTime> {
        self.start_stamp
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Enter `Running` from `Initial` or `Paused`; already running is a
    /// no-op. The start stamp is set lazily by the next ingested payload.
    pub fn begin(&mut self) {
        if self.state == MeasurementState::Running {
            return;
        }
        debug!("measurement {} running", self.id);
        self.state = MeasurementState::Running;
    }

    /// Enter `Paused` and clear the transient accumulators so the next
    /// run stretch stamps itself on its first payload.
    pub fn pause(&mut self) {
        debug!("measurement {} paused", self.id);
        self.state = MeasurementState::Paused;
        self.start_stamp = None;
        self.payload_count = 0;
    }

    /// Enter the terminal `Ended` state.
    pub fn finish(&mut self) {
        debug!("measurement {} ended", self.id);
        self.state = MeasurementState::Ended;
        self.start_stamp = None;
        self.payload_count = 0;
    }

    // ------------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------------

    /// Consume one transport payload.
    ///
    /// Returns the number of sample tuples appended to every channel. On
    /// any error the counters and buffers are left exactly as they were.
    pub fn ingest(&mut self, payload: &[u8]) -> Result<u32> {
        if self.bank.sample_count() >= SAMPLE_CEILING {
            error!("measurement {}: no headroom left for more samples", self.id);
            return Err(EngineError::CapacityExhausted {
                count: self.bank.sample_count(),
            });
        }

        let frame = frame::parse(payload)?;
        if frame.counter % 100 == 0 {
            trace!("measurement {}: payload counter {}", self.id, frame.counter);
        }

        let decoded = self.codec.decode(frame.sample_region, self.bank.channel_count());
        let added = self.bank.append(&decoded)?;

        self.payload_count += 1;
        self.avg_effective_payload =
            (self.avg_effective_payload + (payload.len() as f32 - HEADER_OVERHEAD as f32)) / 2.0;
        if self.state == MeasurementState::Running && self.start_stamp.is_none() {
            self.start_stamp = Some(SystemTime::now());
        }

        trace!(
            "measurement {}: added {added} samples for {} total",
            self.id,
            self.bank.sample_count()
        );
        Ok(added)
    }

    // ------------------------------------------------------------------------
    // Reconstruction
    // ------------------------------------------------------------------------

    fn checked_sample_count(&self) -> Result<u64> {
        let count = self.bank.sample_count();
        if count >= u32::MAX as u64 {
            return Err(EngineError::ReconstructionOverflow { count });
        }
        Ok(count)
    }

    /// Output capacity: next power of two above the sample count, capped
    /// at the 32-bit counter width.
    fn reconstruction_capacity(count: u64) -> usize {
        count.next_power_of_two().min(u32::MAX as u64) as usize
    }

    /// Reconstruct the timestamp axis, optionally downsampled.
    ///
    /// The transport supplies no per-sample wall-clock stamps, so the
    /// timestamp of the sample at logical position `i` derives purely
    /// from position and nominal rate: `i / (hz * rate_scaler)` seconds,
    /// starting at zero.
    pub fn interpret_timestamps(
        &self,
        hz: f64,
        rate_scaler: f64,
        target_cardinality: Option<u64>,
    ) -> Result<(u32, Vec<f64>)> {
        let count = self.checked_sample_count()?;
        let stride = Stride::for_target(count, target_cardinality);
        let rate = hz * rate_scaler;

        let mut timestamps = Vec::with_capacity(Self::reconstruction_capacity(count));
        for index in 0..count {
            if stride.keeps(index) {
                timestamps.push(index as f64 / rate);
            }
        }
        trace!(
            "measurement {}: interpreted {} timestamps",
            self.id,
            timestamps.len()
        );
        Ok((timestamps.len() as u32, timestamps))
    }

    /// Extract per-channel sample arrays with the same stride as
    /// [`Measurement::interpret_timestamps`], so index `k` of both
    /// outputs refers to the same logical sample.
    pub fn copy_signals(&self, target_cardinality: Option<u64>) -> Result<(u32, Vec<Vec<f64>>)> {
        let count = self.checked_sample_count()?;
        let stride = Stride::for_target(count, target_cardinality);

        let capacity = Self::reconstruction_capacity(count);
        let mut channels = vec![Vec::with_capacity(capacity); self.bank.channel_count()];
        for index in 0..count {
            if stride.keeps(index) {
                for (channel, out) in channels.iter_mut().enumerate() {
                    out.push(self.bank.channel(channel)[index as usize]);
                }
            }
        }
        let per_channel = channels.first().map(Vec::len).unwrap_or(0) as u32;
        trace!(
            "measurement {}: copied {per_channel} samples per channel across {}",
            self.id,
            channels.len()
        );
        Ok((per_channel, channels))
    }

    /// Full-resolution export table for the archival collaborator.
    pub fn archive(&self, hz: f64, rate_scaler: f64) -> Result<String> {
        let (num_timestamps, timestamps) = self.interpret_timestamps(hz, rate_scaler, None)?;
        let (per_channel, channels) = self.copy_signals(None)?;
        debug!(
            "measurement {}: archiving {num_timestamps} timestamps x {} channels of {per_channel} samples",
            self.id,
            channels.len()
        );
        crate::archive::build_table(&timestamps, &channels)
    }

    #[cfg(test)]
    pub(crate) fn force_sample_count(&mut self, count: u64) {
        self.bank.force_sample_count(count);
    }
}

#[cfg(test)]
mod tests {
    use assert_approx_eq::assert_approx_eq;

    use super::*;
    use crate::codec::InterleavedI16;

    const THREE_CHANNEL_PAYLOAD: [u8; 20] = [
        20, 0, // declared length
        0, 0, // reserved
        1, 0, 0, 0, // rolling counter
        0x10, 0x00, 0xff, 0xff, 0x00, 0xff, // tuple 0
        0x11, 0x00, 0x0f, 0xff, 0x00, 0x0f, // tuple 1
    ];

    fn measurement(channels: u16) -> Measurement {
        Measurement::new(1, channels, Box::new(InterleavedI16)).unwrap()
    }

    /// Payload carrying `tuples` single-channel samples counting up from
    /// `first`.
    fn counting_payload(counter: u32, first: i16, tuples: usize) -> Vec<u8> {
        let len = 8 + 2 * tuples;
        let mut payload = Vec::with_capacity(len);
        payload.extend_from_slice(&(len as u16).to_le_bytes());
        payload.extend_from_slice(&[0, 0]);
        payload.extend_from_slice(&counter.to_le_bytes());
        for offset in 0..tuples {
            payload.extend_from_slice(&(first + offset as i16).to_le_bytes());
        }
        payload
    }

    #[test]
    fn ingests_payload_into_all_channels() {
        let mut m = measurement(3);
        assert_eq!(m.ingest(&THREE_CHANNEL_PAYLOAD).unwrap(), 2);

        assert_eq!(m.sample_count(), 2);
        assert_eq!(m.payload_count(), 1);
        let (_, channels) = m.copy_signals(None).unwrap();
        assert_eq!(channels[0], vec![16.0, 17.0]);
        assert_eq!(channels[1], vec![-1.0, -241.0]);
        assert_eq!(channels[2], vec![-256.0, 3840.0]);
    }

    #[test]
    fn smooths_effective_payload_size() {
        let mut m = measurement(3);
        m.ingest(&THREE_CHANNEL_PAYLOAD).unwrap();
        // (0 + (20 - 7)) / 2
        assert_eq!(m.avg_effective_payload(), 6.5);
        m.ingest(&THREE_CHANNEL_PAYLOAD).unwrap();
        assert_eq!(m.avg_effective_payload(), 9.75);
    }

    #[test]
    fn start_stamp_is_set_lazily_while_running() {
        let mut m = measurement(3);
        m.ingest(&THREE_CHANNEL_PAYLOAD).unwrap();
        assert!(m.start_stamp().is_none(), "not running yet");

        m.begin();
        assert!(m.start_stamp().is_none(), "set by payload, not transition");
        m.ingest(&THREE_CHANNEL_PAYLOAD).unwrap();
        assert!(m.start_stamp().is_some());

        m.pause();
        assert!(m.start_stamp().is_none());
        assert_eq!(m.payload_count(), 0);
        m.ingest(&THREE_CHANNEL_PAYLOAD).unwrap();
        assert!(m.start_stamp().is_none(), "paused payloads do not stamp");

        m.begin();
        m.ingest(&THREE_CHANNEL_PAYLOAD).unwrap();
        assert!(m.start_stamp().is_some());
    }

    #[test]
    fn pause_keeps_the_smoothed_payload_size() {
        let mut m = measurement(3);
        m.begin();
        m.ingest(&THREE_CHANNEL_PAYLOAD).unwrap();
        let avg = m.avg_effective_payload();
        m.pause();
        assert_eq!(m.avg_effective_payload(), avg);
    }

    #[test]
    fn resume_while_running_is_a_no_op() {
        let mut m = measurement(3);
        m.begin();
        m.ingest(&THREE_CHANNEL_PAYLOAD).unwrap();
        let stamp = m.start_stamp();
        m.begin();
        assert_eq!(m.state(), MeasurementState::Running);
        assert_eq!(m.start_stamp(), stamp);
        assert_eq!(m.payload_count(), 1);
    }

    #[test]
    fn malformed_payload_leaves_counters_untouched() {
        let mut m = measurement(3);
        let err = m.ingest(&[1, 2, 3, 4]).unwrap_err();
        assert!(matches!(err, EngineError::MalformedFrame(_)));
        assert_eq!(m.sample_count(), 0);
        assert_eq!(m.payload_count(), 0);
        assert_eq!(m.avg_effective_payload(), 0.0);
    }

    #[test]
    fn rejects_ingest_without_headroom() {
        let mut m = measurement(1);
        m.force_sample_count(u32::MAX as u64 - 200);
        let err = m.ingest(&counting_payload(1, 0, 100)).unwrap_err();
        assert!(matches!(err, EngineError::CapacityExhausted { .. }));
        assert_eq!(m.sample_count(), u32::MAX as u64 - 200);
        assert_eq!(m.payload_count(), 0);
    }

    #[test]
    fn timestamps_are_linear_in_position() {
        let mut m = measurement(1);
        for payload in 0..21 {
            m.ingest(&counting_payload(payload, 0, 20)).unwrap();
        }
        assert_eq!(m.sample_count(), 420);

        let (count, timestamps) = m.interpret_timestamps(400.0, 1.0, None).unwrap();
        assert_eq!(count, 420);
        for index in [0usize, 1, 399, 400] {
            assert_eq!(timestamps[index], index as f64 / 400.0);
        }
    }

    #[test]
    fn rate_scaler_stretches_the_axis() {
        let mut m = measurement(1);
        m.ingest(&counting_payload(0, 0, 4)).unwrap();
        let (_, timestamps) = m.interpret_timestamps(100.0, 2.0, None).unwrap();
        assert_eq!(timestamps[1], 1.0 / 200.0);
    }

    #[test]
    fn reconstruction_is_idempotent() {
        let mut m = measurement(1);
        for payload in 0..50 {
            m.ingest(&counting_payload(payload, (payload * 3) as i16, 20)).unwrap();
        }
        let first = m.interpret_timestamps(400.0, 1.0, Some(100)).unwrap();
        let second = m.interpret_timestamps(400.0, 1.0, Some(100)).unwrap();
        assert_eq!(first, second);

        let signals_first = m.copy_signals(Some(100)).unwrap();
        let signals_second = m.copy_signals(Some(100)).unwrap();
        assert_eq!(signals_first, signals_second);
    }

    #[test]
    fn timestamps_and_signals_stay_aligned_under_downsampling() {
        let mut m = measurement(2);
        for payload in 0..100 {
            let mut body = Vec::new();
            for tuple in 0..10 {
                let sample = (payload * 10 + tuple) as i16;
                body.push(sample);
                body.push(-sample);
            }
            let len = 8 + 2 * body.len();
            let mut raw = Vec::with_capacity(len);
            raw.extend_from_slice(&(len as u16).to_le_bytes());
            raw.extend_from_slice(&[0, 0]);
            raw.extend_from_slice(&(payload as u32).to_le_bytes());
            for sample in body {
                raw.extend_from_slice(&sample.to_le_bytes());
            }
            m.ingest(&raw).unwrap();
        }
        assert_eq!(m.sample_count(), 1000);

        for target in [None, Some(100), Some(333), Some(5000)] {
            let (num_timestamps, timestamps) = m.interpret_timestamps(400.0, 1.0, target).unwrap();
            let (per_channel, channels) = m.copy_signals(target).unwrap();
            assert_eq!(num_timestamps, per_channel);
            for channel in &channels {
                assert_eq!(channel.len(), timestamps.len());
            }
            // Both channels carry the sample index (one negated), so the
            // kept values must match the kept timestamps' positions.
            for (stamp, value) in timestamps.iter().zip(&channels[0]) {
                assert_approx_eq!(stamp * 400.0, *value, 1e-9);
            }
        }
    }

    #[test]
    fn overflow_guard_blocks_reconstruction() {
        let mut m = measurement(1);
        m.force_sample_count(u32::MAX as u64);
        assert!(matches!(
            m.interpret_timestamps(400.0, 1.0, None),
            Err(EngineError::ReconstructionOverflow { .. })
        ));
        assert!(matches!(
            m.copy_signals(None),
            Err(EngineError::ReconstructionOverflow { .. })
        ));
    }
}
