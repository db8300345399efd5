//! Energy-threshold VAD.
//!
//! Grounded on the teacher's `RmsThresholdVAD` (`vad/rms_threshold.rs`):
//! a fast, primitive volume gate that cannot distinguish speech from
//! background noise. This is the gateway's default/test `VoiceActivityModel`
//! since no real acoustic model ships in this repo (spec §1 — the VAD
//! model is an external collaborator). It doubles as the literal stub
//! used by spec §8's end-to-end scenarios: probability `1.0` for any
//! frame containing a nonzero sample, `0.0` for exact silence.

use super::VoiceActivityModel;
use crate::error::VadError;
use crate::frame::AudioFrame;
use async_trait::async_trait;

pub struct EnergyVad;

impl EnergyVad {
    pub fn new() -> Self {
        Self
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VoiceActivityModel for EnergyVad {
    async fn prob(&self, frame: &AudioFrame) -> Result<f32, VadError> {
        let has_signal = frame.samples.iter().any(|&s| s != 0.0);
        Ok(if has_signal { 1.0 } else { 0.0 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn silence_is_zero() {
        let vad = EnergyVad::new();
        let frame = AudioFrame::new(vec![0.0; 512]);
        assert_eq!(vad.prob(&frame).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn any_nonzero_sample_is_full_probability() {
        let vad = EnergyVad::new();
        let mut samples = vec![0.0; 512];
        samples[100] = 0.01;
        let frame = AudioFrame::new(samples);
        assert_eq!(vad.prob(&frame).await.unwrap(), 1.0);
    }
}
