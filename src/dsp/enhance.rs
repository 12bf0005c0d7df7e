//! Voice-enhancement stage: a fixed 7-band equalizer boosting the speech
//! formant range, peaking at +6 dB around 800 Hz and flat at the edges.

use super::biquad::{Biquad, FilterKind};

pub const NUM_BANDS: usize = 7;
pub const BAND_FREQUENCIES: [f64; NUM_BANDS] =
    [100.0, 200.0, 400.0, 800.0, 1_600.0, 3_200.0, 6_400.0];
pub const BAND_GAINS_DB: [f64; NUM_BANDS] = [0.0, 2.0, 4.0, 6.0, 4.0, 2.0, 0.0];
const BAND_Q: f64 = 1.0;

/// Bands run in series: low shelf, five peaking filters, high shelf.
pub struct VoiceEnhancer {
    bands: [Biquad; NUM_BANDS],
}

impl VoiceEnhancer {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f64;
        let bands = std::array::from_fn(|i| {
            let kind = match i {
                0 => FilterKind::LowShelf,
                n if n == NUM_BANDS - 1 => FilterKind::HighShelf,
                _ => FilterKind::Peaking,
            };
            Biquad::new(kind, BAND_FREQUENCIES[i], BAND_GAINS_DB[i], BAND_Q, sr)
        });
        Self { bands }
    }

    pub fn process_buffer(&mut self, buf: &mut [f32]) {
        for band in &mut self.bands {
            band.process_buffer(buf);
        }
    }

    pub fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }
}
