//! The audio graph manager.
//!
//! A [`Pipeline`] owns the whole processing context: the stage chain, the
//! spectrum analyzer, the shared gain cell, and the AGC and render
//! workers. It exposes the pipeline's public contract (`initialize`,
//! `process`, `update_settings`, `stats`, `destroy`) and enforces the
//! fail-open policy: nothing that goes wrong inside an active call may
//! take the audio down with it.

use crate::analysis::{PipelineStats, SpectrumAnalyzer};
use crate::config::{ConfigUpdate, PipelineConfig};
use crate::dsp::agc::{self, GainState};
use crate::dsp::strategy::RenderStrategy;
use crate::dsp::suppressor::{NeuralSuppressor, DEFAULT_LOAD_TIMEOUT};
use crate::dsp::StageChain;
use crate::error::PipelineError;
use crate::frame::SAMPLE_RATE;
use crate::stream::{pcm_channel, PcmSink, PcmStream};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Output ring capacity in samples (~1 s at 48 kHz).
const OUTPUT_CAPACITY: usize = SAMPLE_RATE as usize;

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// How long `initialize` waits for the neural module before
    /// downgrading to the classical chain.
    pub model_load_timeout: Duration,
    /// Force an execution strategy instead of probing the platform.
    pub strategy: Option<RenderStrategy>,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            model_load_timeout: DEFAULT_LOAD_TIMEOUT,
            strategy: None,
        }
    }
}

#[derive(Debug)]
pub struct Pipeline {
    config: Arc<RwLock<PipelineConfig>>,
    analyzer: Arc<SpectrumAnalyzer>,
    gain: GainState,
    strategy: RenderStrategy,
    chain: Mutex<Option<StageChain>>,
    frame_errors: Arc<AtomicU64>,
    stopped: Arc<AtomicBool>,
    destroyed: AtomicBool,
    agc_worker: Mutex<Option<JoinHandle<()>>>,
    render_worker: Mutex<Option<JoinHandle<()>>>,
}

impl Pipeline {
    /// Build the processing context.
    ///
    /// Fails rather than resamples when the platform context is not
    /// 48 kHz, and fails on malformed config. A neural-module load
    /// problem is NOT fatal: the pipeline logs it and downgrades to the
    /// classical chain.
    pub fn initialize(config: PipelineConfig, sample_rate: u32) -> Result<Self, PipelineError> {
        Self::with_options(config, sample_rate, PipelineOptions::default())
    }

    pub fn with_options(
        config: PipelineConfig,
        sample_rate: u32,
        opts: PipelineOptions,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        if sample_rate != SAMPLE_RATE {
            return Err(PipelineError::ContextCreationFailed(
                "pipeline requires a 48 kHz context",
            ));
        }

        let frame_errors = Arc::new(AtomicU64::new(0));
        // The model is loaded even when noise suppression starts disabled:
        // toggling a stage at runtime flips a bypass flag, it never builds
        // nodes mid-call.
        let suppressor = NeuralSuppressor::load(opts.model_load_timeout, frame_errors.clone());
        let gain = GainState::new();
        let analyzer = Arc::new(SpectrumAnalyzer::new());
        let config = Arc::new(RwLock::new(config));
        let stopped = Arc::new(AtomicBool::new(false));
        let strategy = opts.strategy.unwrap_or_else(RenderStrategy::probe);

        let chain = StageChain::new(suppressor, gain.clone(), sample_rate);
        let agc_worker = agc::spawn_agc_worker(
            analyzer.clone(),
            gain.clone(),
            config.clone(),
            stopped.clone(),
        )
        .map_err(|_| PipelineError::ContextCreationFailed("failed to start gain control worker"))?;

        info!(?strategy, suppressor = ?chain.suppressor().state(), "pipeline initialized");

        Ok(Self {
            config,
            analyzer,
            gain,
            strategy,
            chain: Mutex::new(Some(chain)),
            frame_errors,
            stopped,
            destroyed: AtomicBool::new(false),
            agc_worker: Mutex::new(Some(agc_worker)),
            render_worker: Mutex::new(None),
        })
    }

    /// Bind the chain to a capture stream and return the processed stream.
    ///
    /// Fail-open: if the chain cannot be bound (handle destroyed, already
    /// bound, worker spawn failure) the original stream comes back
    /// unmodified; a clear but unenhanced call beats a dropped one.
    pub fn process(&self, input: PcmStream) -> PcmStream {
        if self.destroyed.load(Ordering::SeqCst) {
            warn!("process() on a destroyed pipeline; passing capture through");
            return input;
        }
        let mut slot = self.chain.lock();
        let Some(chain) = slot.take() else {
            warn!("pipeline already bound to a stream; passing capture through");
            return input;
        };

        let (sink, output) = pcm_channel(input.sample_rate(), OUTPUT_CAPACITY);

        // The worker takes the chain and both stream ends through this
        // cell so everything can be recovered if the spawn itself fails.
        let carried = Arc::new(Mutex::new(Some((chain, input, sink))));
        let worker = RenderWorker {
            carried: carried.clone(),
            analyzer: self.analyzer.clone(),
            config: self.config.clone(),
            stopped: self.stopped.clone(),
            strategy: self.strategy,
        };
        match thread::Builder::new()
            .name("clearline-render".into())
            .spawn(move || worker.run())
        {
            Ok(handle) => {
                *self.render_worker.lock() = Some(handle);
                info!(strategy = ?self.strategy, "capture stream bound");
                output
            }
            Err(e) => {
                warn!("render worker spawn failed: {e}; passing capture through");
                let (chain, input, _sink) = carried
                    .lock()
                    .take()
                    .expect("spawn failed before the worker could take the chain");
                *slot = Some(chain);
                input
            }
        }
    }

    /// Merge changed fields into the live config.
    ///
    /// Validation happens against the merged result before anything is
    /// committed, so a rejected update leaves the running chain exactly
    /// as it was. Takes effect on the next processed buffer; the graph
    /// itself is never rewired.
    pub fn update_settings(&self, update: ConfigUpdate) -> Result<(), PipelineError> {
        let mut cfg = self.config.write();
        let mut merged = *cfg;
        update.apply(&mut merged);
        merged.validate()?;
        *cfg = merged;
        info!(config = ?merged, "pipeline settings updated");
        Ok(())
    }

    /// Best-effort snapshot of the live signal. Never fails; zeroed
    /// levels before audio flows.
    pub fn stats(&self) -> PipelineStats {
        let range = self.config.read().voice_frequency_range;
        let mut stats = self.analyzer.stats(range);
        stats.gain = self.gain.get();
        stats
    }

    /// Frames the suppressor had to pass through unprocessed.
    pub fn frame_errors(&self) -> u64 {
        self.frame_errors.load(Ordering::Relaxed)
    }

    pub fn strategy(&self) -> RenderStrategy {
        self.strategy
    }

    /// Tear the pipeline down: stop both workers cooperatively, join
    /// them, and drop every stage. Safe to call any number of times;
    /// repeat calls are no-ops.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stopped.store(true, Ordering::Relaxed);
        if let Some(handle) = self.agc_worker.lock().take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.render_worker.lock().take() {
            let _ = handle.join();
        }
        if let Some(mut chain) = self.chain.lock().take() {
            chain.stop();
        }
        info!("pipeline destroyed");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.destroy();
    }
}

struct RenderWorker {
    carried: Arc<Mutex<Option<(StageChain, PcmStream, PcmSink)>>>,
    analyzer: Arc<SpectrumAnalyzer>,
    config: Arc<RwLock<PipelineConfig>>,
    stopped: Arc<AtomicBool>,
    strategy: RenderStrategy,
}

impl RenderWorker {
    fn run(self) {
        let Some((mut chain, mut input, mut sink)) = self.carried.lock().take() else {
            return;
        };
        let buffer_len = self.strategy.buffer_len();
        let mut pcm = vec![0i16; buffer_len];

        loop {
            if self.stopped.load(Ordering::Relaxed) {
                break;
            }
            let available = input.available();
            if available >= buffer_len || (input.is_closed() && available > 0) {
                // Whole buffers while the stream lives; the final short
                // read only happens once the producer has closed.
                let want = available.min(buffer_len);
                let got = input.read(&mut pcm[..want]);
                if got == 0 {
                    continue;
                }
                let cfg = *self.config.read();
                chain.process_pcm(&mut pcm[..got], &cfg, &self.analyzer);
                sink.push(&pcm[..got]);
            } else if input.is_ended() {
                break;
            } else {
                thread::sleep(self.strategy.poll_interval());
            }
        }

        chain.stop();
        sink.close();
        debug!("render worker stopped");
    }
}
