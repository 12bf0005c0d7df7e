//! Frame codec bridge between i16 PCM (the capture/transport
//! representation) and the float ranges the DSP chain and the neural
//! module expect.
//!
//! The chain works on mono −1..1 floats; RNNoise wants floats scaled to
//! the 16-bit integer range. Both conversions here are exact round trips
//! for every i16 value.

/// The one sample rate the pipeline runs at. The platform context must
/// match it; resampling is refused at acquisition time.
pub const SAMPLE_RATE: u32 = 48_000;

/// Samples per suppressor frame (10 ms at 48 kHz).
pub const FRAME_SIZE: usize = 480;

/// Maps [-1.0, 1.0] to the 16-bit range RNNoise expects.
pub const PCM_SCALE: f32 = 32768.0;

pub fn pcm_to_float(pcm: &[i16], out: &mut [f32]) {
    for (o, &s) in out.iter_mut().zip(pcm) {
        *o = s as f32 / PCM_SCALE;
    }
}

pub fn float_to_pcm(samples: &[f32], out: &mut [i16]) {
    for (o, &x) in out.iter_mut().zip(samples) {
        *o = (x * PCM_SCALE).round().clamp(-32768.0, 32767.0) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_matches_the_inference_module() {
        assert_eq!(FRAME_SIZE, nnnoiseless::DenoiseState::FRAME_SIZE);
    }

    #[test]
    fn pcm_round_trip_is_exact() {
        let input: Vec<i16> = vec![i16::MIN, -12345, -1, 0, 1, 100, 32767];
        let mut floats = vec![0.0f32; input.len()];
        let mut back = vec![0i16; input.len()];
        pcm_to_float(&input, &mut floats);
        float_to_pcm(&floats, &mut back);
        assert_eq!(back, input);
    }

    #[test]
    fn float_output_clamps_out_of_range() {
        let mut out = [0i16; 2];
        float_to_pcm(&[1.5, -1.5], &mut out);
        assert_eq!(out, [32767, -32768]);
    }
}
