//! Voice Activity Detection (spec §4.2, §6.3).
//!
//! The VAD model itself is an external collaborator (spec §1) — this
//! module only owns the frame-size contract and the gate that turns a
//! probability into a speech/silence classification. Modeled as a trait
//! object so any concrete backend can be swapped in, following the
//! teacher's `VoiceActivityDetection` polymorphism pattern in
//! `vad/mod.rs` ("runtime swappable implementations... like OpenCV
//! cv::Algorithm").

mod energy;

pub use energy::EnergyVad;

use crate::error::VadError;
use crate::frame::{AudioFrame, ALLOWED_FRAME_SIZES};
use async_trait::async_trait;
use parking_lot::Mutex;

/// An external voice-activity model: frame in, probability out.
///
/// Implementations must tolerate concurrent calls from independent
/// sessions; if the concrete backend is not thread-safe, guard it with a
/// lock inside the implementation (spec §5).
#[async_trait]
pub trait VoiceActivityModel: Send + Sync {
    /// Probability that `frame` contains speech, in `[0, 1]`.
    ///
    /// `frame.samples.len()` is guaranteed by the caller (`VadGate`) to be
    /// one of `ALLOWED_FRAME_SIZES`; a conforming implementation may
    /// assume this and need not re-validate.
    async fn prob(&self, frame: &AudioFrame) -> Result<f32, VadError>;
}

/// Wraps a `VoiceActivityModel`, owning the frame-size contract and the
/// threshold classification (spec §4.2).
pub struct VadGate<M: VoiceActivityModel> {
    model: M,
    threshold: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadDecision {
    pub probability: f32,
    pub is_speech: bool,
}

impl<M: VoiceActivityModel> VadGate<M> {
    pub fn new(model: M, threshold: f32) -> Self {
        Self { model, threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify a frame. Fails with `VadError::InvalidFrameSize` if the
    /// frame is not one of the strictly-allowed analysis sizes — this is
    /// treated by the session as a programming error (spec §7), never
    /// silently dropped or padded.
    pub async fn classify(&self, frame: &AudioFrame) -> Result<VadDecision, VadError> {
        if !frame.is_allowed_vad_size() {
            return Err(VadError::InvalidFrameSize {
                got: frame.len(),
                allowed: ALLOWED_FRAME_SIZES,
            });
        }

        let probability = self.model.prob(frame).await?;
        Ok(VadDecision {
            probability,
            is_speech: probability >= self.threshold,
        })
    }
}

/// A VAD backend that is not itself safe to call concurrently (e.g. a
/// model context with internal mutable scratch state, the shape of the
/// teacher's `static WHISPER_CTX: OnceCell<Arc<Mutex<...>>>` guard in
/// `stt/whisper.rs`). `RawModel::raw_prob` takes `&mut self`; `LockedModel`
/// serializes access behind a `parking_lot::Mutex` so the wrapped model can
/// still satisfy `VoiceActivityModel`'s `Sync` bound (spec §5: "if the
/// underlying model is not thread-safe, guard it with a short-critical-
/// section lock — VAD inference is milliseconds and contention is
/// acceptable").
pub trait RawModel: Send {
    fn raw_prob(&mut self, frame: &AudioFrame) -> Result<f32, VadError>;
}

pub struct LockedModel<T: RawModel>(Mutex<T>);

impl<T: RawModel> LockedModel<T> {
    pub fn new(inner: T) -> Self {
        Self(Mutex::new(inner))
    }
}

#[async_trait]
impl<T: RawModel> VoiceActivityModel for LockedModel<T> {
    async fn prob(&self, frame: &AudioFrame) -> Result<f32, VadError> {
        self.0.lock().raw_prob(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::AudioFrame;

    struct FixedVad(f32);

    #[async_trait]
    impl VoiceActivityModel for FixedVad {
        async fn prob(&self, _frame: &AudioFrame) -> Result<f32, VadError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn rejects_wrong_frame_size() {
        let gate = VadGate::new(FixedVad(1.0), 0.5);
        let frame = AudioFrame::new(vec![0.0; 900]);
        let err = gate.classify(&frame).await.unwrap_err();
        assert!(matches!(err, VadError::InvalidFrameSize { got: 900, .. }));
    }

    #[tokio::test]
    async fn classifies_against_threshold() {
        let gate = VadGate::new(FixedVad(0.7), 0.5);
        let frame = AudioFrame::new(vec![0.0; 512]);
        let decision = gate.classify(&frame).await.unwrap();
        assert!(decision.is_speech);
        assert_eq!(decision.probability, 0.7);
    }

    #[tokio::test]
    async fn below_threshold_is_silence() {
        let gate = VadGate::new(FixedVad(0.3), 0.5);
        let frame = AudioFrame::new(vec![0.0; 1024]);
        let decision = gate.classify(&frame).await.unwrap();
        assert!(!decision.is_speech);
    }

    struct CountingRawModel {
        calls: usize,
    }

    impl RawModel for CountingRawModel {
        fn raw_prob(&mut self, _frame: &AudioFrame) -> Result<f32, VadError> {
            self.calls += 1;
            Ok(1.0)
        }
    }

    #[tokio::test]
    async fn locked_model_serializes_access_to_a_non_sync_backend() {
        let gate = VadGate::new(LockedModel::new(CountingRawModel { calls: 0 }), 0.5);
        let frame = AudioFrame::new(vec![0.0; 512]);
        for _ in 0..3 {
            let decision = gate.classify(&frame).await.unwrap();
            assert!(decision.is_speech);
        }
    }
}
