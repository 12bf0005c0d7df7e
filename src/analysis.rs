//! Diagnostics over the live post-chain signal.
//!
//! The render path feeds processed samples into a rolling window; the AGC
//! loop and stats queries compute an FFT magnitude snapshot from it on
//! demand. Strictly a read path over the signal: nothing here mutates
//! pipeline state, and a query never fails (it reports zeros until a full
//! window has been captured).

use crate::config::FreqRange;
use crate::frame::SAMPLE_RATE;
use parking_lot::Mutex;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Analysis window length in samples.
pub const FFT_SIZE: usize = 1024;

/// Byte-scale voice level above which voice activity is reported.
pub const VOICE_ACTIVITY_THRESHOLD: f32 = 50.0;

/// Level/voice-activity snapshot, recomputed from the live window on every
/// query and never cached.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineStats {
    /// Mean spectral magnitude, 0–255 linear scale.
    pub average_level: f32,
    pub peak_level: f32,
    pub noise_floor: f32,
    pub voice_activity: bool,
    /// Mean magnitude over the configured voice band.
    pub voice_level: f32,
    /// Output gain currently applied by the AGC.
    pub gain: f32,
}

struct Window {
    samples: Vec<f32>,
    pos: usize,
    primed: bool,
}

pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    hann: Vec<f32>,
    window: Mutex<Window>,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer").finish_non_exhaustive()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let hann = (0..FFT_SIZE)
            .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f32 / FFT_SIZE as f32).cos())
            .collect();
        Self {
            fft,
            hann,
            window: Mutex::new(Window {
                samples: vec![0.0; FFT_SIZE],
                pos: 0,
                primed: false,
            }),
        }
    }

    /// Called from the render path. Never blocks: if a snapshot is in
    /// progress this update is skipped and the next buffer catches up.
    pub fn push(&self, samples: &[f32]) {
        let Some(mut w) = self.window.try_lock() else {
            return;
        };
        for &s in samples {
            let pos = w.pos;
            w.samples[pos] = s;
            w.pos = (pos + 1) % FFT_SIZE;
            if w.pos == 0 {
                w.primed = true;
            }
        }
    }

    /// Byte-scale (0–255, linear) magnitudes for the positive-frequency
    /// bins, or `None` until a full window has been captured.
    pub fn magnitudes(&self) -> Option<Vec<f32>> {
        let mut buf: Vec<Complex<f32>> = {
            let w = self.window.lock();
            if !w.primed {
                return None;
            }
            (0..FFT_SIZE)
                .map(|i| {
                    let s = w.samples[(w.pos + i) % FFT_SIZE];
                    Complex::new(s * self.hann[i], 0.0)
                })
                .collect()
        };
        self.fft.process(&mut buf);
        let norm = 2.0 / FFT_SIZE as f32;
        Some(
            buf[..FFT_SIZE / 2]
                .iter()
                .map(|c| (c.norm() * norm).clamp(0.0, 1.0) * 255.0)
                .collect(),
        )
    }

    /// Mean magnitude across the analyzed spectrum (the AGC's measurement).
    pub fn average_level(&self) -> f32 {
        match self.magnitudes() {
            Some(mags) => mags.iter().sum::<f32>() / mags.len() as f32,
            None => 0.0,
        }
    }

    /// Best-effort snapshot; zeroed until the window is primed. The gain
    /// field is filled in by the pipeline, which owns the gain cell.
    pub fn stats(&self, voice_range: FreqRange) -> PipelineStats {
        let Some(mags) = self.magnitudes() else {
            return PipelineStats::default();
        };
        let average = mags.iter().sum::<f32>() / mags.len() as f32;
        let peak = mags.iter().cloned().fold(0.0f32, f32::max);
        let floor = mags.iter().cloned().fold(f32::MAX, f32::min);

        let lo = bin_for(voice_range.min).clamp(1, FFT_SIZE / 2 - 1);
        let hi = bin_for(voice_range.max).clamp(lo, FFT_SIZE / 2 - 1);
        let band = &mags[lo..=hi];
        let voice = band.iter().sum::<f32>() / band.len() as f32;

        PipelineStats {
            average_level: average,
            peak_level: peak,
            noise_floor: floor,
            voice_activity: voice > VOICE_ACTIVITY_THRESHOLD,
            voice_level: voice,
            gain: 0.0,
        }
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Frequency in Hz to FFT bin index.
fn bin_for(freq: f32) -> usize {
    (freq * FFT_SIZE as f32 / SAMPLE_RATE as f32).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOICE_RANGE: FreqRange = FreqRange { min: 85.0, max: 255.0 };

    fn sine(freq: f32, amplitude: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    #[test]
    fn stats_are_zeroed_before_a_full_window() {
        let analyzer = SpectrumAnalyzer::new();
        assert_eq!(analyzer.stats(VOICE_RANGE), PipelineStats::default());
        analyzer.push(&[0.5; 100]);
        assert_eq!(analyzer.stats(VOICE_RANGE), PipelineStats::default());
    }

    #[test]
    fn tone_shows_up_in_the_right_bin() {
        let analyzer = SpectrumAnalyzer::new();
        // 1 kHz, amplitude 0.8: energy should land around bin 21.
        analyzer.push(&sine(1_000.0, 0.8, FFT_SIZE * 2));
        let mags = analyzer.magnitudes().unwrap();
        let peak_bin = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap()
            .0;
        let expected = bin_for(1_000.0);
        assert!(
            peak_bin.abs_diff(expected) <= 1,
            "peak at bin {peak_bin}, expected near {expected}"
        );
    }

    #[test]
    fn voice_band_tone_reports_activity() {
        let analyzer = SpectrumAnalyzer::new();
        analyzer.push(&sine(150.0, 1.0, FFT_SIZE * 2));
        let stats = analyzer.stats(VOICE_RANGE);
        assert!(stats.voice_level > VOICE_ACTIVITY_THRESHOLD);
        assert!(stats.voice_activity);
        assert!(stats.peak_level >= stats.voice_level);
    }

    #[test]
    fn out_of_band_tone_stays_quiet() {
        let analyzer = SpectrumAnalyzer::new();
        analyzer.push(&sine(4_000.0, 1.0, FFT_SIZE * 2));
        let stats = analyzer.stats(VOICE_RANGE);
        assert!(!stats.voice_activity, "voice level {}", stats.voice_level);
    }
}
