//! Classical noise-floor stage: a band-limiting filter pair followed by an
//! amplitude-gated mask.
//!
//! This is the fallback when the neural suppressor is unavailable. The
//! mask itself is pure and stateless: every sample below the configured
//! noise floor is cut to 10% of its value, everything else passes
//! untouched.

use super::biquad::{Biquad, FilterKind};

const HIGHPASS_HZ: f64 = 80.0;
const LOWPASS_HZ: f64 = 8_000.0;
const BAND_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Attenuation applied to sub-floor samples.
const MASK_ATTENUATION: f32 = 0.1;

pub struct NoiseGate {
    highpass: Biquad,
    lowpass: Biquad,
}

impl NoiseGate {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        Self {
            highpass: Biquad::new(FilterKind::HighPass, HIGHPASS_HZ, 0.0, BAND_Q, sr),
            lowpass: Biquad::new(FilterKind::LowPass, LOWPASS_HZ, 0.0, BAND_Q, sr),
        }
    }

    /// The amplitude mask. Deterministic per sample: same input, same
    /// noise floor, same output.
    #[inline]
    pub fn mask(sample: f32, noise_floor: f32) -> f32 {
        if sample.abs() < noise_floor {
            sample * MASK_ATTENUATION
        } else {
            sample
        }
    }

    pub fn process_buffer(&mut self, buf: &mut [f32], noise_floor: f32) {
        for s in buf.iter_mut() {
            let banded = self.lowpass.process_sample(self.highpass.process_sample(*s));
            *s = Self::mask(banded, noise_floor);
        }
    }

    pub fn reset(&mut self) {
        self.highpass.reset();
        self.lowpass.reset();
    }
}
