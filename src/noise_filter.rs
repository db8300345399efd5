//! Optional pre-VAD noise filter (spec §4.3, §6.4).
//!
//! Frame-shape-preserving: consumes and emits exact VAD-sized frames so
//! it can sit on the same analysis cadence as the VAD gate without
//! resizing downstream. Shaped like the teacher's `Stage` trait
//! (`stage.rs`: `process`/`reset`) since a denoiser is exactly a
//! single-frame-in/single-frame-out pipeline stage in that vocabulary —
//! narrowed here to a synchronous, infallible-shape contract because the
//! spec requires the filter to preserve the frame size exactly.

use crate::error::NoiseFilterError;
use crate::frame::AudioFrame;

pub trait NoiseFilter: Send {
    /// Filter one frame in place, returning a frame of the same size.
    fn filter(&mut self, frame: AudioFrame) -> Result<AudioFrame, NoiseFilterError>;

    /// Reset any internal state between utterances/sessions.
    fn reset(&mut self) {}
}

/// No-op filter used when no noise suppression is configured (spec §4.3:
/// "If absent, input frames pass through.").
pub struct PassthroughFilter;

impl NoiseFilter for PassthroughFilter {
    fn filter(&mut self, frame: AudioFrame) -> Result<AudioFrame, NoiseFilterError> {
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_preserves_samples() {
        let mut filter = PassthroughFilter;
        let frame = AudioFrame::new(vec![0.1, 0.2, 0.3]);
        let out = filter.filter(frame.clone()).unwrap();
        assert_eq!(out.samples, frame.samples);
    }
}
