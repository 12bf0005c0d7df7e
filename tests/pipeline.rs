//! End-to-end pipeline behavior: identity pass-through, graceful
//! degradation, teardown semantics, and strategy equivalence.

use clearline::config::{ConfigUpdate, FreqRange, PipelineConfig};
use clearline::dsp::agc::GainState;
use clearline::dsp::strategy::RenderStrategy;
use clearline::dsp::suppressor::NeuralSuppressor;
use clearline::dsp::StageChain;
use clearline::frame::{FRAME_SIZE, SAMPLE_RATE};
use clearline::pipeline::{Pipeline, PipelineOptions};
use clearline::stream::pcm_channel;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn passthrough_config() -> PipelineConfig {
    PipelineConfig {
        noise_suppression: false,
        echo_cancellation: false,
        auto_gain_control: false,
        voice_enhancement: false,
        ..PipelineConfig::default()
    }
}

/// Zero load timeout forces the classical-only chain deterministically.
fn classical_options() -> PipelineOptions {
    PipelineOptions {
        model_load_timeout: Duration::ZERO,
        strategy: Some(RenderStrategy::RealTime),
    }
}

fn drain(stream: &mut clearline::PcmStream, expected: usize) -> Vec<i16> {
    let mut got = Vec::with_capacity(expected);
    let mut buf = [0i16; FRAME_SIZE];
    let deadline = Instant::now() + Duration::from_secs(5);
    while got.len() < expected && Instant::now() < deadline {
        let n = stream.read(&mut buf);
        if n == 0 {
            if stream.is_ended() {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
            continue;
        }
        got.extend_from_slice(&buf[..n]);
    }
    got
}

#[test]
fn disabled_stages_are_an_identity_transform() {
    let pipeline =
        Pipeline::with_options(passthrough_config(), SAMPLE_RATE, classical_options()).unwrap();
    let (mut sink, raw) = pcm_channel(SAMPLE_RATE, SAMPLE_RATE as usize);
    let mut out = pipeline.process(raw);

    let input: Vec<i16> = (0..FRAME_SIZE * 4)
        .map(|i| ((i as i32 * 37) % 20_001 - 10_000) as i16)
        .collect();
    sink.push(&input);
    sink.close();

    let got = drain(&mut out, input.len());
    assert_eq!(got, input);
    pipeline.destroy();
}

#[test]
fn load_failure_degrades_to_the_classical_chain() {
    // All stages on, but the model never loads: process() must still
    // return a working stream and stats must still answer.
    let pipeline =
        Pipeline::with_options(PipelineConfig::default(), SAMPLE_RATE, classical_options())
            .unwrap();
    let (mut sink, raw) = pcm_channel(SAMPLE_RATE, SAMPLE_RATE as usize);
    let mut out = pipeline.process(raw);

    let input = vec![1_000i16; FRAME_SIZE * 4];
    sink.push(&input);
    sink.close();

    let got = drain(&mut out, input.len());
    assert_eq!(got.len(), input.len());

    let stats = pipeline.stats();
    assert!(stats.gain >= 0.1 && stats.gain <= 3.0);
    pipeline.destroy();
}

#[test]
fn initialize_refuses_a_non_48k_context() {
    let err = Pipeline::initialize(PipelineConfig::default(), 44_100).unwrap_err();
    assert!(matches!(
        err,
        clearline::PipelineError::ContextCreationFailed(_)
    ));
}

#[test]
fn destroy_is_idempotent() {
    let pipeline =
        Pipeline::with_options(passthrough_config(), SAMPLE_RATE, classical_options()).unwrap();
    pipeline.destroy();
    pipeline.destroy();
    // Stats after teardown still answer with a best-effort record.
    let stats = pipeline.stats();
    assert_eq!(stats.average_level, 0.0);
}

#[test]
fn second_bind_fails_open_with_the_original_stream() {
    let pipeline =
        Pipeline::with_options(passthrough_config(), SAMPLE_RATE, classical_options()).unwrap();
    let (_sink1, raw1) = pcm_channel(SAMPLE_RATE, 4_800);
    let _out1 = pipeline.process(raw1);

    let (mut sink2, raw2) = pcm_channel(SAMPLE_RATE, 4_800);
    let mut out2 = pipeline.process(raw2);

    // out2 is raw2 itself: data pushed into sink2 arrives without any
    // worker in between.
    sink2.push(&[5, 6, 7]);
    let mut buf = [0i16; 8];
    assert_eq!(out2.read(&mut buf), 3);
    assert_eq!(&buf[..3], &[5, 6, 7]);
    pipeline.destroy();
}

#[test]
fn stats_never_fail_before_audio_flows() {
    let pipeline =
        Pipeline::with_options(PipelineConfig::default(), SAMPLE_RATE, classical_options())
            .unwrap();
    let stats = pipeline.stats();
    assert_eq!(stats.average_level, 0.0);
    assert_eq!(stats.peak_level, 0.0);
    assert!(!stats.voice_activity);
    assert!(stats.gain >= 0.1 && stats.gain <= 3.0);
    pipeline.destroy();
}

#[test]
fn update_settings_validates_before_committing() {
    let pipeline =
        Pipeline::with_options(PipelineConfig::default(), SAMPLE_RATE, classical_options())
            .unwrap();

    pipeline
        .update_settings(ConfigUpdate {
            background_noise_level: Some(0.5),
            ..ConfigUpdate::default()
        })
        .unwrap();

    let err = pipeline
        .update_settings(ConfigUpdate {
            background_noise_level: Some(1.5),
            ..ConfigUpdate::default()
        })
        .unwrap_err();
    assert!(matches!(err, clearline::PipelineError::InvalidConfig(_)));

    let err = pipeline
        .update_settings(ConfigUpdate {
            voice_frequency_range: Some(FreqRange { min: 300.0, max: 100.0 }),
            ..ConfigUpdate::default()
        })
        .unwrap_err();
    assert!(matches!(err, clearline::PipelineError::InvalidConfig(_)));
    pipeline.destroy();
}

#[test]
fn execution_strategies_produce_identical_samples() {
    // Same config, same model, same frames: the real-time path (one
    // frame per iteration) and the buffered path (two frames per drain)
    // must agree sample for sample.
    let errors = Arc::new(AtomicU64::new(0));
    let sup_rt = NeuralSuppressor::load(Duration::from_secs(10), errors.clone());
    let sup_buf = NeuralSuppressor::load(Duration::from_secs(10), errors);
    let mut rt = StageChain::new(sup_rt, GainState::new(), SAMPLE_RATE);
    let mut buffered = StageChain::new(sup_buf, GainState::new(), SAMPLE_RATE);
    assert!(rt.suppressor().is_ready() && buffered.suppressor().is_ready());

    let cfg = PipelineConfig {
        auto_gain_control: false, // no live AGC worker in this test
        ..PipelineConfig::default()
    };

    let frames = 12;
    let signal: Vec<f32> = (0..frames * FRAME_SIZE)
        .map(|i| 0.3 * (i as f32 * 0.013).sin() + 0.05 * (i as f32 * 0.21).sin())
        .collect();

    let mut out_rt = signal.clone();
    for chunk in out_rt.chunks_mut(RenderStrategy::RealTime.buffer_len()) {
        rt.process_float(chunk, &cfg);
    }

    let mut out_buf = signal;
    for chunk in out_buf.chunks_mut(RenderStrategy::Buffered.buffer_len()) {
        buffered.process_float(chunk, &cfg);
    }

    assert_eq!(out_rt, out_buf);
}

#[test]
fn partial_tail_passes_through_at_end_of_stream() {
    let pipeline = Pipeline::with_options(
        passthrough_config(),
        SAMPLE_RATE,
        PipelineOptions {
            model_load_timeout: Duration::from_secs(10),
            strategy: Some(RenderStrategy::RealTime),
        },
    )
    .unwrap();
    let (mut sink, raw) = pcm_channel(SAMPLE_RATE, SAMPLE_RATE as usize);
    let mut out = pipeline.process(raw);

    // One whole frame plus a short tail, then end of stream.
    let input: Vec<i16> = (0..FRAME_SIZE + 100).map(|i| (i % 3_000) as i16).collect();
    sink.push(&input);
    sink.close();

    let got = drain(&mut out, input.len());
    assert_eq!(got, input, "tail must arrive unreordered and unmodified");
    pipeline.destroy();
}
