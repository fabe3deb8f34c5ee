use std::f64::consts::TAU;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;

use sigflow::frame::HEADER_LEN;
use sigflow::{
    CaptureSession, Characteristic, ControlPort, DeviceConfig, IngestPipeline, SignalEngine,
};

#[derive(Parser, Debug)]
#[command(
    name = "sigflow-demo",
    about = "Simulate a sensor stream, reconstruct it, and write a CSV archive"
)]
struct Args {
    /// Signal channels to simulate (1-255)
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..))]
    channels: u8,
    /// Nominal sample rate in Hz
    #[arg(long, default_value_t = 400, value_parser = clap::value_parser!(u32).range(1..))]
    hz: u32,
    /// Payloads to stream
    #[arg(long, default_value_t = 500)]
    payloads: u32,
    /// Sample tuples per payload
    #[arg(long, default_value_t = 20)]
    samples_per_payload: usize,
    /// Target cardinality for the preview reconstruction
    #[arg(long, default_value_t = 1000)]
    preview: u64,
    /// Where to write the CSV archive
    #[arg(long, default_value = "capture.csv")]
    output: PathBuf,
}

/// Stand-in for the transport's write side.
struct LoggingPort;

impl ControlPort for LoggingPort {
    fn write(&mut self, characteristic: Characteristic, data: &[u8]) -> io::Result<()> {
        log::debug!("write to {characteristic:?}: {data:02x?}");
        Ok(())
    }
}

/// Pack one frame the way the sensor firmware does: 8-byte header, then
/// interleaved little-endian i16 samples.
fn encode_payload(counter: u32, tuples: &[Vec<i16>]) -> Vec<u8> {
    let samples: usize = tuples.iter().map(Vec::len).sum();
    let len = HEADER_LEN + 2 * samples;
    let mut payload = Vec::with_capacity(len);
    payload.extend_from_slice(&(len as u16).to_le_bytes());
    payload.extend_from_slice(&[0, 0]);
    payload.extend_from_slice(&counter.to_le_bytes());
    for tuple in tuples {
        for sample in tuple {
            payload.extend_from_slice(&sample.to_le_bytes());
        }
    }
    payload
}

/// Per-channel sine waves at 2, 3, 4, ... Hz, scaled to the i16 range the
/// firmware emits.
fn synth_tuple(sample_index: u64, channels: u8, hz: u32) -> Vec<i16> {
    let t = sample_index as f64 / f64::from(hz);
    (0..channels)
        .map(|channel| {
            let freq = f64::from(channel) + 2.0;
            (8000.0 * (TAU * freq * t).sin()) as i16
        })
        .collect()
}

fn main() {
    sigflow::logging::init_logging();
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    let mut samples_per_payload = args.samples_per_payload;
    let max_tuples = (sigflow::MAX_PAYLOAD_LEN - HEADER_LEN) / (2 * args.channels as usize);
    if samples_per_payload > max_tuples {
        log::warn!("clamping samples per payload to {max_tuples} to fit the frame cap");
        samples_per_payload = max_tuples;
    }

    let config = DeviceConfig {
        channel_count: Some(args.channels),
        signal_hz: Some(args.hz),
        ..DeviceConfig::default()
    };

    let engine = Arc::new(SignalEngine::new());
    let mut session = CaptureSession::new(engine.clone(), LoggingPort, config);

    println!(
        "--- Capturing {} payloads ({} channels @ {} Hz) ---",
        args.payloads, args.channels, args.hz
    );
    let handle = session.start_measurement()?;
    let pipeline = IngestPipeline::spawn(engine.clone(), handle);

    let sender = pipeline.sender();
    let channels = args.channels;
    let hz = args.hz;
    let payloads = args.payloads;
    let producer = thread::spawn(move || {
        let mut sample_index = 0u64;
        for counter in 0..payloads {
            let tuples: Vec<Vec<i16>> = (0..samples_per_payload)
                .map(|tuple| synth_tuple(sample_index + tuple as u64, channels, hz))
                .collect();
            sample_index += samples_per_payload as u64;
            if sender.send(encode_payload(counter, &tuples)).is_err() {
                break;
            }
        }
    });

    producer
        .join()
        .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
    let stats = pipeline.close();
    println!(
        "Ingested {} payloads / {} samples ({} dropped, {} rejected)",
        stats.payloads, stats.samples, stats.dropped_frames, stats.rejected_payloads
    );

    let series = session.preview(args.preview)?;
    println!(
        "Preview: {} points per channel across {} channels",
        series.timestamps.len(),
        series.channels.len()
    );

    session.stop_measurement()?;

    let table = session.export(handle)?;
    fs::write(&args.output, &table)
        .with_context(|| format!("writing archive to {}", args.output.display()))?;
    println!(
        "Wrote {} rows to {}",
        table.lines().count().saturating_sub(1),
        args.output.display()
    );
    Ok(())
}
