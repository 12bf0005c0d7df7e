//! Real-time voice enhancement for telephony capture.
//!
//! A raw microphone stream flows through a fixed-order stage chain (neural
//! noise suppression (RNNoise) or its classical gate fallback, an
//! echo-mitigation compressor, a voice-formant equalizer, and an AGC-driven
//! output gain) and comes back out as a stream ready to hand to the
//! transport layer. See [`Pipeline`] for the public contract.

pub mod analysis;
pub mod capture;
pub mod config;
pub mod dsp;
pub mod error;
pub mod frame;
pub mod pipeline;
pub mod stream;

pub use analysis::PipelineStats;
pub use config::{ConfigUpdate, FreqRange, PipelineConfig};
pub use error::{PipelineError, PipelineResult};
pub use pipeline::{Pipeline, PipelineOptions};
pub use stream::{pcm_channel, PcmSink, PcmStream};
