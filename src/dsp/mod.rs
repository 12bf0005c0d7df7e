//! The stage chain: fixed-order DSP over mono frames.
//!
//! Order is constant regardless of configuration: noise suppression
//! (neural, or the classical gate when the model is unavailable), echo
//! mitigation, voice enhancement, then the AGC output gain. Disabled
//! stages are bypassed in place; the graph is never rewired mid-call.

pub mod agc;
pub mod biquad;
pub mod echo;
pub mod enhance;
pub mod gate;
pub mod strategy;
pub mod suppressor;

use crate::analysis::SpectrumAnalyzer;
use crate::config::PipelineConfig;
use crate::frame::{self, FRAME_SIZE};
use self::agc::GainState;
use self::echo::EchoSuppressor;
use self::enhance::VoiceEnhancer;
use self::gate::NoiseGate;
use self::suppressor::NeuralSuppressor;

pub struct StageChain {
    suppressor: NeuralSuppressor,
    gate: NoiseGate,
    echo: EchoSuppressor,
    enhancer: VoiceEnhancer,
    gain: GainState,
    scratch: Vec<f32>,
}

impl std::fmt::Debug for StageChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageChain").finish_non_exhaustive()
    }
}

impl StageChain {
    pub fn new(suppressor: NeuralSuppressor, gain: GainState, sample_rate: u32) -> Self {
        Self {
            suppressor,
            gate: NoiseGate::new(sample_rate),
            echo: EchoSuppressor::new(sample_rate),
            enhancer: VoiceEnhancer::new(sample_rate),
            gain,
            scratch: vec![0.0; strategy::BUFFERED_LEN],
        }
    }

    pub fn suppressor(&self) -> &NeuralSuppressor {
        &self.suppressor
    }

    /// Process one PCM buffer in place and feed the post-chain samples to
    /// the analyzer tap.
    pub fn process_pcm(
        &mut self,
        pcm: &mut [i16],
        cfg: &PipelineConfig,
        analyzer: &SpectrumAnalyzer,
    ) {
        let mut buf = std::mem::take(&mut self.scratch);
        if buf.len() < pcm.len() {
            buf.resize(pcm.len(), 0.0);
        }
        let samples = &mut buf[..pcm.len()];
        frame::pcm_to_float(pcm, samples);
        self.process_float(samples, cfg);
        frame::float_to_pcm(samples, pcm);
        analyzer.push(samples);
        self.scratch = buf;
    }

    /// The per-buffer routine both execution strategies share. Whole
    /// frames go through the suppressor; a trailing partial frame (end of
    /// stream) bypasses it rather than carrying state across calls.
    pub fn process_float(&mut self, samples: &mut [f32], cfg: &PipelineConfig) {
        if cfg.noise_suppression {
            if self.suppressor.is_ready() {
                for chunk in samples.chunks_exact_mut(FRAME_SIZE) {
                    self.suppressor.process_frame(chunk);
                }
            } else {
                self.gate
                    .process_buffer(samples, cfg.background_noise_level);
            }
        }
        if cfg.echo_cancellation {
            self.echo.process_buffer(samples);
        }
        if cfg.voice_enhancement {
            self.enhancer.process_buffer(samples);
        }
        if cfg.auto_gain_control {
            let gain = self.gain.get();
            for s in samples.iter_mut() {
                *s *= gain;
            }
        }
    }

    /// Stop the suppressor and reset filter state. Called at teardown.
    pub fn stop(&mut self) {
        self.suppressor.stop();
        self.gate.reset();
        self.echo.reset();
        self.enhancer.reset();
    }
}
