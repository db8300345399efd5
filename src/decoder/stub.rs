//! Stub decoder (spec §8 test double): text is the cumulative sample
//! count seen for the current utterance, as a decimal string. Grounded
//! on the teacher's `stt/stub.rs::StubSTT`, which returns a fixed
//! canned transcript regardless of input — generalized here to a
//! value that's actually a function of the audio so driver/rollback
//! tests can assert on it deterministically.

use async_trait::async_trait;

use super::{DecodeOptions, DecoderState, StreamingDecoder};
use crate::error::DecoderError;

pub struct StubDecoder;

impl StubDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StubDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamingDecoder for StubDecoder {
    async fn init_streaming_state(
        &self,
        _prompt: &str,
        _context: &str,
        language: Option<&str>,
    ) -> DecoderState {
        DecoderState {
            text: "0".to_string(),
            language: language.map(str::to_string),
            internal: Some(Box::new(0usize)),
        }
    }

    async fn streaming_transcribe(
        &self,
        audio_samples: &[f32],
        state: DecoderState,
        _opts: DecodeOptions,
    ) -> Result<DecoderState, DecoderError> {
        let prior_count = state
            .internal
            .as_ref()
            .and_then(|b| b.downcast_ref::<usize>())
            .copied()
            .unwrap_or(0);
        let new_count = prior_count + audio_samples.len();

        Ok(DecoderState {
            text: new_count.to_string(),
            language: state.language,
            internal: Some(Box::new(new_count)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn text_tracks_cumulative_sample_count() {
        let decoder = StubDecoder::new();
        let state = decoder.init_streaming_state("", "", None).await;
        assert_eq!(state.text, "0");

        let opts = DecodeOptions {
            chunk_id: 0,
            unfixed_chunk_num: 4,
            unfixed_token_num: 5,
            rollback_prefix: None,
        };
        let state = decoder
            .streaming_transcribe(&[0.0; 100], state, opts.clone())
            .await
            .unwrap();
        assert_eq!(state.text, "100");

        let state = decoder
            .streaming_transcribe(&[0.0; 50], state, opts)
            .await
            .unwrap();
        assert_eq!(state.text, "150");
    }

    #[tokio::test]
    async fn language_is_preserved_across_calls() {
        let decoder = StubDecoder::new();
        let state = decoder.init_streaming_state("", "", Some("en")).await;
        let opts = DecodeOptions {
            chunk_id: 0,
            unfixed_chunk_num: 4,
            unfixed_token_num: 5,
            rollback_prefix: None,
        };
        let state = decoder.streaming_transcribe(&[0.0; 10], state, opts).await.unwrap();
        assert_eq!(state.language.as_deref(), Some("en"));
    }
}
