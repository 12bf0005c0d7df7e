//! Neural noise suppressor: RNNoise (via `nnnoiseless`) run frame by
//! frame, with an explicit load state machine and per-frame error
//! containment.
//!
//! Load failure is non-fatal; the chain substitutes the classical gate.
//! A bad inference result never reaches the stream: the offending frame
//! passes through untouched and a counter records it.

use crate::frame::{FRAME_SIZE, PCM_SCALE};
use nnnoiseless::DenoiseState;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// How long `initialize` waits for the model before downgrading.
pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(2);

/// Minimum frames between two frame-error log lines (~1 s of audio).
const ERROR_LOG_INTERVAL_FRAMES: u64 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuppressorState {
    Unloaded,
    Loading,
    Ready,
    Processing,
    Failed,
    Stopped,
}

pub struct NeuralSuppressor {
    state: SuppressorState,
    denoiser: Option<Box<DenoiseState<'static>>>,
    model_in: [f32; FRAME_SIZE],
    model_out: [f32; FRAME_SIZE],
    last_vad: f32,
    frame_errors: Arc<AtomicU64>,
    frames_since_error_log: u64,
}

impl NeuralSuppressor {
    /// Load the inference module with a bounded timeout.
    ///
    /// Construction and warm-up run on a loader thread so a slow or wedged
    /// load cannot stall call setup. On timeout or spawn failure the
    /// module is abandoned, the state lands on `Failed`, and the caller
    /// falls back to the classical gate.
    pub fn load(timeout: Duration, frame_errors: Arc<AtomicU64>) -> Self {
        let mut this = Self {
            state: SuppressorState::Loading,
            denoiser: None,
            model_in: [0.0; FRAME_SIZE],
            model_out: [0.0; FRAME_SIZE],
            last_vad: 0.0,
            frame_errors,
            frames_since_error_log: 0,
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let spawned = thread::Builder::new()
            .name("clearline-model-load".into())
            .spawn(move || {
                let mut denoiser = DenoiseState::new();
                // Warm-up inference so the first live frame stays inside
                // the render budget.
                let silence = [0.0f32; FRAME_SIZE];
                let mut out = [0.0f32; FRAME_SIZE];
                denoiser.process_frame(&mut out, &silence);
                let _ = tx.send(denoiser);
            });

        match spawned {
            Ok(_) => match rx.recv_timeout(timeout) {
                Ok(denoiser) => {
                    this.denoiser = Some(denoiser);
                    this.state = SuppressorState::Ready;
                    debug!("noise suppression model ready");
                }
                Err(_) => {
                    this.state = SuppressorState::Failed;
                    warn!("noise suppression model load timed out; falling back to classical gate");
                }
            },
            Err(e) => {
                this.state = SuppressorState::Failed;
                warn!("noise suppression model loader failed to start: {e}");
            }
        }
        this
    }

    pub fn state(&self) -> SuppressorState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(
            self.state,
            SuppressorState::Ready | SuppressorState::Processing
        )
    }

    /// Voice-activity probability reported by the last processed frame.
    pub fn last_vad(&self) -> f32 {
        self.last_vad
    }

    pub fn frame_errors(&self) -> u64 {
        self.frame_errors.load(Ordering::Relaxed)
    }

    /// Denoise one frame in place. `frame` must hold exactly
    /// [`FRAME_SIZE`] samples in −1..1; shorter tails are the caller's
    /// pass-through case and never reach this function.
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        debug_assert_eq!(frame.len(), FRAME_SIZE);
        if !self.is_ready() {
            return;
        }
        let Some(denoiser) = self.denoiser.as_mut() else {
            return;
        };

        self.state = SuppressorState::Processing;
        for (m, &s) in self.model_in.iter_mut().zip(frame.iter()) {
            *m = s * PCM_SCALE;
        }
        self.last_vad = denoiser.process_frame(&mut self.model_out, &self.model_in);
        self.state = SuppressorState::Ready;

        if self.model_out.iter().any(|v| !v.is_finite()) {
            self.record_frame_error();
            return; // frame passes through as received
        }
        for (s, &m) in frame.iter_mut().zip(self.model_out.iter()) {
            *s = m / PCM_SCALE;
        }
    }

    fn record_frame_error(&mut self) {
        let total = self.frame_errors.fetch_add(1, Ordering::Relaxed) + 1;
        self.frames_since_error_log += 1;
        if total == 1 || self.frames_since_error_log >= ERROR_LOG_INTERVAL_FRAMES {
            warn!(errors = total, "suppressor produced a bad frame; passed through");
            self.frames_since_error_log = 0;
        }
    }

    /// Drop the model and refuse further processing.
    pub fn stop(&mut self) {
        self.denoiser = None;
        self.state = SuppressorState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Arc<AtomicU64> {
        Arc::new(AtomicU64::new(0))
    }

    #[test]
    fn load_reaches_ready() {
        let sup = NeuralSuppressor::load(Duration::from_secs(10), counter());
        assert_eq!(sup.state(), SuppressorState::Ready);
        assert!(sup.is_ready());
    }

    #[test]
    fn zero_timeout_fails_and_is_nonfatal() {
        let mut sup = NeuralSuppressor::load(Duration::ZERO, counter());
        assert_eq!(sup.state(), SuppressorState::Failed);
        assert!(!sup.is_ready());

        // Processing on a failed suppressor leaves the frame untouched.
        let mut frame = [0.25f32; FRAME_SIZE];
        sup.process_frame(&mut frame);
        assert!(frame.iter().all(|&s| s == 0.25));
        assert_eq!(sup.frame_errors(), 0);
    }

    #[test]
    fn processing_emits_finite_samples_and_a_vad() {
        let mut sup = NeuralSuppressor::load(Duration::from_secs(10), counter());
        let mut frame = [0.0f32; FRAME_SIZE];
        for (i, s) in frame.iter_mut().enumerate() {
            *s = 0.1 * (i as f32 * 0.05).sin();
        }
        sup.process_frame(&mut frame);
        assert!(frame.iter().all(|s| s.is_finite()));
        assert!((0.0..=1.0).contains(&sup.last_vad()));
        assert_eq!(sup.state(), SuppressorState::Ready);
    }

    #[test]
    fn identical_frame_sequences_denoise_identically() {
        // The module is deterministic, which is what makes the two
        // execution strategies numerically equivalent.
        let mut a = NeuralSuppressor::load(Duration::from_secs(10), counter());
        let mut b = NeuralSuppressor::load(Duration::from_secs(10), counter());
        for n in 0..10 {
            let mut fa = [0.0f32; FRAME_SIZE];
            for (i, s) in fa.iter_mut().enumerate() {
                *s = 0.2 * ((n * FRAME_SIZE + i) as f32 * 0.01).sin();
            }
            let mut fb = fa;
            a.process_frame(&mut fa);
            b.process_frame(&mut fb);
            assert_eq!(fa, fb);
        }
    }

    #[test]
    fn stop_drops_the_model() {
        let mut sup = NeuralSuppressor::load(Duration::from_secs(10), counter());
        sup.stop();
        assert_eq!(sup.state(), SuppressorState::Stopped);
        let mut frame = [0.5f32; FRAME_SIZE];
        sup.process_frame(&mut frame);
        assert!(frame.iter().all(|&s| s == 0.5));
    }
}
