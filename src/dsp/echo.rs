//! Echo-mitigation stage: a downward compressor with fixed parameters.
//!
//! There is no far-end reference signal available at this point in the
//! graph, so this is gain shaping that tames residual echo energy, not a
//! true acoustic echo canceller. Known limitation, kept deliberately.

/// Fixed transfer-curve parameters.
const THRESHOLD_DB: f64 = -50.0;
const KNEE_DB: f64 = 40.0;
const RATIO: f64 = 12.0;
const ATTACK_MS: f64 = 0.0;
const RELEASE_MS: f64 = 250.0;

/// RMS envelope smoothing time constant.
const RMS_MS: f64 = 10.0;

pub struct EchoSuppressor {
    attack_coeff: f64,
    release_coeff: f64,
    rms_coeff: f64,
    envelope_db: f64,
    envelope_squared: f64,
}

impl EchoSuppressor {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        Self {
            attack_coeff: Self::coeff(ATTACK_MS, sr),
            release_coeff: Self::coeff(RELEASE_MS, sr),
            rms_coeff: Self::coeff(RMS_MS, sr),
            envelope_db: -120.0,
            envelope_squared: 0.0,
        }
    }

    /// Exponential smoothing coefficient for a time constant in ms. Zero
    /// means instant (no smoothing).
    fn coeff(time_ms: f64, sample_rate: f64) -> f64 {
        if time_ms <= 0.0 {
            return 0.0;
        }
        (-1.0 / (time_ms / 1000.0 * sample_rate)).exp()
    }

    /// Soft-knee gain reduction in dB for a given envelope level.
    fn gain_reduction_db(&self, level_db: f64) -> f64 {
        let knee_start = THRESHOLD_DB - KNEE_DB / 2.0;
        let knee_end = THRESHOLD_DB + KNEE_DB / 2.0;
        if level_db <= knee_start {
            0.0
        } else if level_db >= knee_end {
            (level_db - THRESHOLD_DB) * (1.0 - 1.0 / RATIO)
        } else {
            let t = (level_db - knee_start) / KNEE_DB;
            (level_db - knee_start) * (1.0 - 1.0 / RATIO) * t * t / 2.0
        }
    }

    #[inline]
    pub fn process_sample(&mut self, x: f32) -> f32 {
        let xf = x as f64;

        self.envelope_squared =
            self.rms_coeff * self.envelope_squared + (1.0 - self.rms_coeff) * xf * xf;
        let level_db = 20.0 * (self.envelope_squared.sqrt() + 1e-10).log10();

        let coeff = if level_db > self.envelope_db {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope_db = coeff * self.envelope_db + (1.0 - coeff) * level_db;

        let reduction = self.gain_reduction_db(self.envelope_db);
        (xf * 10.0_f64.powf(-reduction / 20.0)) as f32
    }

    pub fn process_buffer(&mut self, buf: &mut [f32]) {
        for s in buf.iter_mut() {
            *s = self.process_sample(*s);
        }
    }

    pub fn reset(&mut self) {
        self.envelope_db = -120.0;
        self.envelope_squared = 0.0;
    }
}
