//! Frame Ring Buffer (spec §4.1).
//!
//! Accepts arbitrary-length pushes of raw samples and yields a lazy
//! sequence of fixed-size `AudioFrame`s. Trailing samples that don't
//! complete a frame are retained until enough arrive, or until `flush`
//! is called.
//!
//! Grounded on the teacher's `ring.rs` (SPSC slot ring) and
//! `continuous/sliding_buffer.rs` (circular sample accumulator) for the
//! accumulate-then-slice shape, but simplified to a strict FIFO: the
//! spec's contract ("never blocks", "never drops or pads silently") is a
//! push/pop queue, not a bounded, generation-stamped slot ring — there is
//! exactly one producer and one consumer per session, so no
//! synchronization is needed here at all.
//!
//! `max_buffered` implements spec §5's backpressure rule for the
//! session's inbound side: when the unframed remainder would exceed
//! capacity, the *oldest* unframed samples are dropped to make room
//! (preferring to preserve already-accumulated-but-not-yet-framed audio
//! closest to the present, never the complete frames already handed to
//! the VAD). A plain `new()` ring stays exactly the unbounded §4.1
//! contract; only callers that opt into `bounded()` get this policy.

use crate::frame::AudioFrame;
use std::collections::VecDeque;

pub struct FrameRing {
    frame_size: usize,
    buffered: VecDeque<f32>,
    max_buffered: Option<usize>,
}

impl FrameRing {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size,
            buffered: VecDeque::new(),
            max_buffered: None,
        }
    }

    /// A ring that drops the oldest unframed samples once `max_buffered`
    /// samples are queued (spec §5 backpressure).
    pub fn bounded(frame_size: usize, max_buffered: usize) -> Self {
        Self {
            frame_size,
            buffered: VecDeque::new(),
            max_buffered: Some(max_buffered),
        }
    }

    /// Append samples. Never blocks. Returns the number of oldest
    /// samples dropped to stay within `max_buffered`, if any (0 for an
    /// unbounded ring, or whenever capacity wasn't exceeded).
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.buffered.extend(samples.iter().copied());

        let Some(cap) = self.max_buffered else {
            return 0;
        };
        let overflow = self.buffered.len().saturating_sub(cap);
        if overflow > 0 {
            self.buffered.drain(..overflow);
        }
        overflow
    }

    /// Pop one complete frame if enough samples are buffered.
    pub fn next_frame(&mut self) -> Option<AudioFrame> {
        if self.buffered.len() < self.frame_size {
            return None;
        }
        let samples: Vec<f32> = self.buffered.drain(..self.frame_size).collect();
        Some(AudioFrame::new(samples))
    }

    /// Drain every remaining sample regardless of frame size. Returns
    /// `None` if nothing is buffered. Used only at finalize/flush time.
    pub fn flush(&mut self) -> Option<Vec<f32>> {
        if self.buffered.is_empty() {
            return None;
        }
        Some(self.buffered.drain(..).collect())
    }

    pub fn pending_len(&self) -> usize {
        self.buffered.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_exact_size_frames_only() {
        let mut ring = FrameRing::new(512);
        ring.push(&vec![1.0; 600]);

        let frame = ring.next_frame().expect("one full frame");
        assert_eq!(frame.len(), 512);
        assert!(ring.next_frame().is_none());
        assert_eq!(ring.pending_len(), 88);
    }

    #[test]
    fn frames_span_multiple_pushes() {
        let mut ring = FrameRing::new(512);
        ring.push(&vec![1.0; 300]);
        assert!(ring.next_frame().is_none());
        ring.push(&vec![2.0; 212]);
        let frame = ring.next_frame().expect("completed by second push");
        assert_eq!(frame.len(), 512);
    }

    #[test]
    fn flush_returns_remainder_and_clears() {
        let mut ring = FrameRing::new(512);
        ring.push(&vec![1.0; 200]);
        let remainder = ring.flush().expect("nonempty remainder");
        assert_eq!(remainder.len(), 200);
        assert!(ring.flush().is_none());
        assert_eq!(ring.pending_len(), 0);
    }

    #[test]
    fn multiple_frames_drain_in_order() {
        let mut ring = FrameRing::new(4);
        ring.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(ring.next_frame().unwrap().samples, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(ring.next_frame().unwrap().samples, vec![5.0, 6.0, 7.0, 8.0]);
        assert!(ring.next_frame().is_none());
    }

    #[test]
    fn unbounded_ring_never_drops() {
        let mut ring = FrameRing::new(512);
        let dropped = ring.push(&vec![1.0; 10_000]);
        assert_eq!(dropped, 0);
        assert_eq!(ring.pending_len(), 10_000);
    }

    #[test]
    fn bounded_ring_drops_oldest_unframed_samples_first() {
        let mut ring = FrameRing::bounded(512, 1000);
        ring.push(&vec![1.0; 800]);
        // Pushing another 800 would reach 1600, 600 over the 1000 cap.
        let dropped = ring.push(&vec![2.0; 800]);
        assert_eq!(dropped, 600);
        assert_eq!(ring.pending_len(), 1000);

        // The retained 1000 samples are a contiguous suffix of the
        // stream: all 800 `2.0`s plus the last 200 `1.0`s.
        let remainder = ring.flush().unwrap();
        assert_eq!(remainder.len(), 1000);
        assert_eq!(remainder[..200].iter().filter(|&&s| s == 1.0).count(), 200);
        assert_eq!(remainder[200..].iter().filter(|&&s| s == 2.0).count(), 800);
    }

    #[test]
    fn bounded_ring_under_capacity_drops_nothing() {
        let mut ring = FrameRing::bounded(512, 1000);
        assert_eq!(ring.push(&vec![1.0; 500]), 0);
        assert_eq!(ring.pending_len(), 500);
    }
}
