//! Execution strategy for the render worker.
//!
//! The real-time path runs a dedicated render thread consuming one
//! 480-sample frame per iteration. Where that thread cannot be created
//! the pipeline falls back to a coarser buffered path that drains two
//! frames at a time, trading latency (still bounded under 20 ms of
//! buffer) for compatibility. Both paths run the same per-buffer routine,
//! so identical input produces numerically identical output; the drain
//! size is a whole-frame multiple precisely so no mid-stream partial
//! frames appear on either path.

use crate::frame::FRAME_SIZE;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Fallback drain size in samples (two frames, 20 ms).
pub const BUFFERED_LEN: usize = 2 * FRAME_SIZE;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStrategy {
    /// Dedicated render thread, one frame per iteration.
    RealTime,
    /// Coarser timer-style drains; higher but bounded latency.
    Buffered,
}

impl RenderStrategy {
    /// Probe once at bind time whether a dedicated render thread can be
    /// created. Never re-checked per frame.
    pub fn probe() -> Self {
        let ok = thread::Builder::new()
            .name("clearline-render-probe".into())
            .spawn(|| {})
            .map(|h| h.join().is_ok())
            .unwrap_or(false);
        if ok {
            RenderStrategy::RealTime
        } else {
            warn!("dedicated render thread unavailable; using buffered fallback");
            RenderStrategy::Buffered
        }
    }

    /// Samples consumed per render iteration.
    pub fn buffer_len(self) -> usize {
        match self {
            RenderStrategy::RealTime => FRAME_SIZE,
            RenderStrategy::Buffered => BUFFERED_LEN,
        }
    }

    /// Idle wait between polls of the capture ring.
    pub fn poll_interval(self) -> Duration {
        match self {
            RenderStrategy::RealTime => Duration::from_millis(2),
            RenderStrategy::Buffered => Duration::from_millis(8),
        }
    }
}
