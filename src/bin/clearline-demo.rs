//! Live end-to-end check: open the microphone, run the enhancement
//! pipeline, and print a stats line once per second. The processed stream
//! is drained the way a transport layer would consume it.

use anyhow::Result;
use clap::Parser;
use clearline::capture::{self, CaptureHints};
use clearline::frame::{FRAME_SIZE, SAMPLE_RATE};
use clearline::{Pipeline, PipelineConfig};
use std::time::{Duration, Instant};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "clearline-demo", about = "Voice enhancement pipeline demo")]
struct Args {
    /// Disable the neural noise suppressor stage.
    #[arg(long)]
    no_noise_suppression: bool,

    /// Disable the echo-mitigation compressor.
    #[arg(long)]
    no_echo: bool,

    /// Disable the voice-formant equalizer.
    #[arg(long)]
    no_enhancement: bool,

    /// Disable automatic gain control.
    #[arg(long)]
    no_agc: bool,

    /// Seconds to run before exiting.
    #[arg(long, default_value_t = 10)]
    seconds: u64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let args = Args::parse();
    let config = PipelineConfig {
        noise_suppression: !args.no_noise_suppression,
        echo_cancellation: !args.no_echo,
        voice_enhancement: !args.no_enhancement,
        auto_gain_control: !args.no_agc,
        ..PipelineConfig::default()
    };

    let (capture, raw) = capture::open_mic(CaptureHints::default())?;
    let pipeline = Pipeline::initialize(config, SAMPLE_RATE)?;
    let mut enhanced = pipeline.process(raw);

    info!("running; the processed stream would attach to the transport here");

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    let mut frame = vec![0i16; FRAME_SIZE];
    let mut last_report = Instant::now();
    while Instant::now() < deadline {
        while enhanced.read(&mut frame) > 0 {}
        if last_report.elapsed() >= Duration::from_secs(1) {
            let s = pipeline.stats();
            info!(
                avg = %format!("{:.1}", s.average_level),
                peak = %format!("{:.1}", s.peak_level),
                voice = s.voice_activity,
                gain = %format!("{:.2}", s.gain),
                errors = pipeline.frame_errors(),
                "stats"
            );
            last_report = Instant::now();
        }
        std::thread::sleep(Duration::from_millis(5));
    }

    drop(capture);
    pipeline.destroy();
    Ok(())
}
