//! Mono PCM stream hand-off between capture, the pipeline, and the
//! transport layer.
//!
//! A [`PcmSink`]/[`PcmStream`] pair is a single-producer single-consumer
//! ring of i16 samples plus a close flag. The ring bounds backlog (a
//! stalled consumer drops the overflow at the producer edge, it never
//! blocks the audio path); the close flag lets the consumer distinguish
//! "no data yet" from end of stream.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

pub struct PcmSink {
    prod: HeapProd<i16>,
    closed: Arc<AtomicBool>,
}

pub struct PcmStream {
    cons: HeapCons<i16>,
    closed: Arc<AtomicBool>,
    sample_rate: u32,
}

/// Create a connected sink/stream pair with room for `capacity` samples.
pub fn pcm_channel(sample_rate: u32, capacity: usize) -> (PcmSink, PcmStream) {
    let (prod, cons) = HeapRb::<i16>::new(capacity).split();
    let closed = Arc::new(AtomicBool::new(false));
    (
        PcmSink {
            prod,
            closed: closed.clone(),
        },
        PcmStream {
            cons,
            closed,
            sample_rate,
        },
    )
}

impl PcmSink {
    /// Push samples, dropping the overflow if the consumer has stalled.
    /// Returns how many samples were accepted.
    pub fn push(&mut self, pcm: &[i16]) -> usize {
        let mut accepted = 0;
        for &s in pcm {
            if self.prod.try_push(s).is_err() {
                break;
            }
            accepted += 1;
        }
        accepted
    }

    /// Mark end of stream. Buffered samples stay readable.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Drop for PcmSink {
    fn drop(&mut self) {
        self.close();
    }
}

impl PcmStream {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples currently buffered.
    pub fn available(&self) -> usize {
        self.cons.occupied_len()
    }

    /// The producer has closed its end; buffered samples may remain.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closed and fully drained.
    pub fn is_ended(&self) -> bool {
        self.is_closed() && self.cons.is_empty()
    }

    /// Pop up to `out.len()` samples; returns how many were read.
    pub fn read(&mut self, out: &mut [i16]) -> usize {
        let mut got = 0;
        while got < out.len() {
            match self.cons.try_pop() {
                Some(s) => {
                    out[got] = s;
                    got += 1;
                }
                None => break,
            }
        }
        got
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_read_preserves_order() {
        let (mut sink, mut stream) = pcm_channel(48_000, 16);
        assert_eq!(sink.push(&[1, 2, 3, 4]), 4);
        let mut out = [0i16; 8];
        assert_eq!(stream.read(&mut out), 4);
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn overflow_is_dropped_not_blocked() {
        let (mut sink, mut stream) = pcm_channel(48_000, 4);
        assert_eq!(sink.push(&[1, 2, 3, 4, 5, 6]), 4);
        let mut out = [0i16; 8];
        assert_eq!(stream.read(&mut out), 4);
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn close_semantics() {
        let (mut sink, mut stream) = pcm_channel(48_000, 8);
        sink.push(&[7, 8]);
        drop(sink);
        assert!(stream.is_closed());
        assert!(!stream.is_ended());
        let mut out = [0i16; 8];
        assert_eq!(stream.read(&mut out), 2);
        assert!(stream.is_ended());
    }
}
