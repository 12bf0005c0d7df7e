//! Typed pipeline configuration, validated at `initialize` and
//! `update_settings` time rather than read ad hoc.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Frequency band in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FreqRange {
    pub min: f32,
    pub max: f32,
}

/// Recognized pipeline options.
///
/// Field names follow the calling subsystem's JSON convention
/// (`noiseSuppression`, `agcTargetDb`, ...); unknown fields in incoming
/// documents are ignored, not rejected. Mutable at runtime through
/// [`ConfigUpdate`]; changes apply on the next processed buffer, never
/// retroactively.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    pub noise_suppression: bool,
    pub echo_cancellation: bool,
    pub auto_gain_control: bool,
    pub voice_enhancement: bool,
    /// Amplitude below which the classical gate attenuates (0..1).
    pub background_noise_level: f32,
    /// Band sampled for the voice-activity level.
    pub voice_frequency_range: FreqRange,
    /// AGC loudness target in dBFS.
    pub agc_target_db: f32,
    /// Caller-declared ceiling for AGC boost, in dB.
    pub agc_max_gain_db: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            noise_suppression: true,
            echo_cancellation: true,
            auto_gain_control: true,
            voice_enhancement: true,
            background_noise_level: 0.3,
            voice_frequency_range: FreqRange {
                min: 85.0,
                max: 255.0,
            },
            agc_target_db: -20.0,
            agc_max_gain_db: 30.0,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.background_noise_level.is_finite()
            || !(0.0..=1.0).contains(&self.background_noise_level)
        {
            return Err(PipelineError::InvalidConfig(
                "backgroundNoiseLevel must be within 0..1",
            ));
        }
        let range = self.voice_frequency_range;
        if !range.min.is_finite() || !range.max.is_finite() || range.min <= 0.0 || range.min >= range.max
        {
            return Err(PipelineError::InvalidConfig(
                "voiceFrequencyRange bounds are inverted or out of range",
            ));
        }
        if !self.agc_target_db.is_finite() || self.agc_target_db >= 0.0 {
            return Err(PipelineError::InvalidConfig(
                "agcTargetDb must be negative (dBFS)",
            ));
        }
        if !self.agc_max_gain_db.is_finite() || self.agc_max_gain_db <= 0.0 {
            return Err(PipelineError::InvalidConfig("agcMaxGainDb must be positive"));
        }
        Ok(())
    }
}

/// Partial update merged into the live config by
/// [`crate::Pipeline::update_settings`]. Absent fields keep their current
/// value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigUpdate {
    pub noise_suppression: Option<bool>,
    pub echo_cancellation: Option<bool>,
    pub auto_gain_control: Option<bool>,
    pub voice_enhancement: Option<bool>,
    pub background_noise_level: Option<f32>,
    pub voice_frequency_range: Option<FreqRange>,
    pub agc_target_db: Option<f32>,
    pub agc_max_gain_db: Option<f32>,
}

impl ConfigUpdate {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(v) = self.noise_suppression {
            config.noise_suppression = v;
        }
        if let Some(v) = self.echo_cancellation {
            config.echo_cancellation = v;
        }
        if let Some(v) = self.auto_gain_control {
            config.auto_gain_control = v;
        }
        if let Some(v) = self.voice_enhancement {
            config.voice_enhancement = v;
        }
        if let Some(v) = self.background_noise_level {
            config.background_noise_level = v;
        }
        if let Some(v) = self.voice_frequency_range {
            config.voice_frequency_range = v;
        }
        if let Some(v) = self.agc_target_db {
            config.agc_target_db = v;
        }
        if let Some(v) = self.agc_max_gain_db {
            config.agc_max_gain_db = v;
        }
    }
}
