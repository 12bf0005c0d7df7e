//! Microphone acquisition: a cpal input stream feeding a [`PcmStream`].

use crate::error::PipelineError;
use crate::frame::SAMPLE_RATE;
use crate::stream::{pcm_channel, PcmStream};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{info, warn};

/// Platform-level processing hints passed with the capture request.
///
/// The OS audio stack may honor or ignore these independently of the
/// pipeline's own stages; both being active at once is an accepted
/// redundancy, not a conflict.
#[derive(Debug, Clone, Copy)]
pub struct CaptureHints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureHints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Keeps the platform stream alive; dropping it ends the capture and
/// closes the attached [`PcmStream`].
pub struct MicCapture {
    _stream: cpal::Stream,
}

/// Open the default input device at 48 kHz mono i16.
///
/// The chain is built for exactly 48 kHz; if the device cannot run at that
/// rate this fails instead of silently resampling.
pub fn open_mic(hints: CaptureHints) -> Result<(MicCapture, PcmStream), PipelineError> {
    let host = cpal::default_host();
    let dev = host
        .default_input_device()
        .ok_or(PipelineError::ContextCreationFailed("no input device"))?;

    let supports_48k = dev
        .supported_input_configs()
        .map_err(|_| PipelineError::ContextCreationFailed("input configs unavailable"))?
        .any(|c| {
            c.channels() >= 1
                && c.min_sample_rate() <= SAMPLE_RATE
                && c.max_sample_rate() >= SAMPLE_RATE
        });
    if !supports_48k {
        return Err(PipelineError::ContextCreationFailed(
            "input device cannot run at 48 kHz",
        ));
    }

    let cfg = cpal::StreamConfig {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        buffer_size: cpal::BufferSize::Default,
    };

    info!(
        echo = hints.echo_cancellation,
        noise = hints.noise_suppression,
        agc = hints.auto_gain_control,
        "opening capture at 48 kHz mono"
    );

    // ~1s of backlog before the sink starts dropping.
    let (mut sink, stream) = pcm_channel(SAMPLE_RATE, SAMPLE_RATE as usize);

    let cpal_stream = dev
        .build_input_stream(
            &cfg,
            move |data: &[i16], _| {
                sink.push(data);
            },
            move |err| {
                warn!("capture error: {err}");
            },
            None,
        )
        .map_err(|_| PipelineError::ContextCreationFailed("failed to build input stream"))?;
    cpal_stream
        .play()
        .map_err(|_| PipelineError::ContextCreationFailed("failed to start input stream"))?;

    Ok((
        MicCapture {
            _stream: cpal_stream,
        },
        stream,
    ))
}
