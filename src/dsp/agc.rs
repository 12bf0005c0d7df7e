//! Automatic gain control: a damped proportional loop that drives a shared
//! gain cell toward a spectral-energy target.
//!
//! The controller runs on its own worker at ~60 Hz, decoupled from the
//! render rate, for the whole lifetime of the pipeline. Silence does not
//! freeze it; the gain just climbs until the clamp stops it.

use crate::analysis::SpectrumAnalyzer;
use crate::config::PipelineConfig;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

pub const MIN_GAIN: f32 = 0.1;
pub const MAX_GAIN: f32 = 3.0;

/// Damping applied to each proportional step; prevents pumping.
const DAMPING: f32 = 0.1;

/// Control tick interval (~60 Hz).
pub const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Shared gain cell: written only by the AGC tick, read by the render
/// path. Relaxed atomics: a one-buffer-stale gain is inaudible, while
/// blocking the render thread is not acceptable.
#[derive(Clone, Debug)]
pub struct GainState(Arc<AtomicU32>);

impl GainState {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU32::new(1.0f32.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub(crate) fn set(&self, gain: f32) {
        self.0.store(gain.to_bits(), Ordering::Relaxed);
    }
}

impl Default for GainState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AgcController {
    gain: GainState,
    target_level: f32,
    max_gain: f32,
}

impl AgcController {
    pub fn new(gain: GainState, target_db: f32, max_gain_db: f32) -> Self {
        let mut ctl = Self {
            gain,
            target_level: 1.0,
            max_gain: MAX_GAIN,
        };
        ctl.set_targets(target_db, max_gain_db);
        ctl
    }

    pub fn set_targets(&mut self, target_db: f32, max_gain_db: f32) {
        self.target_level = byte_level(target_db);
        self.max_gain = MAX_GAIN.min(10.0_f32.powf(max_gain_db / 20.0));
    }

    /// One control step against a measured average level (0–255 linear
    /// scale). Returns the committed gain.
    pub fn tick(&mut self, average_level: f32) -> f32 {
        let adjustment = (self.target_level - average_level) / self.target_level * DAMPING;
        let gain = (self.gain.get() + adjustment).clamp(MIN_GAIN, self.max_gain);
        self.gain.set(gain);
        gain
    }
}

/// Loudness target in dBFS mapped onto the analyzer's linear byte scale.
fn byte_level(db: f32) -> f32 {
    255.0 * 10.0_f32.powf(db / 20.0)
}

pub(crate) fn spawn_agc_worker(
    analyzer: Arc<SpectrumAnalyzer>,
    gain: GainState,
    config: Arc<RwLock<PipelineConfig>>,
    stopped: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("clearline-agc".into())
        .spawn(move || {
            let ticker = crossbeam_channel::tick(TICK_INTERVAL);
            let cfg = *config.read();
            let mut ctl = AgcController::new(gain, cfg.agc_target_db, cfg.agc_max_gain_db);
            while ticker.recv().is_ok() {
                if stopped.load(Ordering::Relaxed) {
                    break;
                }
                let cfg = *config.read();
                if !cfg.auto_gain_control {
                    continue;
                }
                ctl.set_targets(cfg.agc_target_db, cfg.agc_max_gain_db);
                ctl.tick(analyzer.average_level());
            }
            debug!("agc worker stopped");
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_stays_within_bounds_under_extremes() {
        let gain = GainState::new();
        let mut ctl = AgcController::new(gain.clone(), -20.0, 30.0);
        for _ in 0..1_000 {
            ctl.tick(0.0); // dead silence pushes gain up
        }
        assert_eq!(gain.get(), MAX_GAIN);

        for _ in 0..1_000 {
            ctl.tick(10_000.0); // blasting input pushes gain down
        }
        assert_eq!(gain.get(), MIN_GAIN);
    }

    #[test]
    fn caller_max_gain_tightens_the_ceiling() {
        let gain = GainState::new();
        // 6 dB ceiling → linear ~2.0, under the hard 3.0 clamp
        let mut ctl = AgcController::new(gain.clone(), -20.0, 6.0);
        for _ in 0..1_000 {
            ctl.tick(0.0);
        }
        assert!((gain.get() - 10.0_f32.powf(0.3)).abs() < 1e-3);
    }

    #[test]
    fn converges_onto_a_proportional_plant_and_stays() {
        let gain = GainState::new();
        let mut ctl = AgcController::new(gain.clone(), -20.0, 30.0);
        let target = byte_level(-20.0);
        // Plant: measured level proportional to the applied gain.
        let k = 20.0;

        let mut prev = gain.get();
        let mut grew = true;
        for _ in 0..50 {
            let g = ctl.tick(k * gain.get());
            if grew {
                // Monotone approach until inside the band, no overshoot
                // beyond a single tick step.
                assert!(g >= prev - 1e-6);
                if (k * g - target).abs() / target < 0.01 {
                    grew = false;
                }
            }
            prev = g;
        }
        let level = k * gain.get();
        assert!(
            (level - target).abs() / target < 0.05,
            "level {level}, target {target}"
        );

        // Held steady: no oscillation beyond one tick step.
        let settled = gain.get();
        let step = DAMPING; // upper bound of a single adjustment near target
        for _ in 0..50 {
            let g = ctl.tick(k * gain.get());
            assert!((g - settled).abs() <= step);
        }
    }
}
