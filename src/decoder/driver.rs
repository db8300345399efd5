//! Decoder Driver (spec §4.5).
//!
//! Owns `pending_audio`, `chunk_id`, `last_partial_text` and the opaque
//! per-utterance `DecoderState`, chunking audio at `chunk_size_s` and
//! applying token-prefix rollback once `unfixed_chunk_num` chunks have
//! completed. Grounded on `continuous/sliding_buffer.rs`'s
//! accumulate-then-extract-with-overlap shape, generalized from a fixed
//! sample-count interval to the spec's duration-based chunking plus
//! rollback instead of fixed context overlap.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, warn};

use super::rollback::rollback_prefix;
use super::{DecodeOptions, DecoderState, StreamingDecoder};
use crate::error::DecoderError;
use crate::frame::SAMPLE_RATE_HZ;

/// Consecutive per-utterance `DecodeTransient` failures before the
/// driver escalates to `DecodeFatal` (spec §9 Open Question 3 — this
/// crate's chosen threshold, recorded in DESIGN.md).
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

pub enum DecodeEvent {
    /// New partial text differs from the last emitted partial.
    Partial { text: String, language: Option<String> },
    /// No new text, or audio hasn't reached a chunk boundary yet.
    None,
}

pub struct DecoderDriver<D: StreamingDecoder> {
    decoder: Arc<D>,
    state: DecoderState,
    pending_audio: Vec<f32>,
    chunk_id: u32,
    last_partial_text: String,
    consecutive_failures: u32,

    chunk_size_s: f64,
    unfixed_chunk_num: u32,
    unfixed_token_num: usize,
    decode_timeout: Duration,

    prompt: String,
    context: String,
    language: Option<String>,
}

impl<D: StreamingDecoder> DecoderDriver<D> {
    pub async fn new(
        decoder: Arc<D>,
        prompt: String,
        context: String,
        language: Option<String>,
        chunk_size_s: f64,
        unfixed_chunk_num: u32,
        unfixed_token_num: usize,
        decode_timeout: Duration,
    ) -> Self {
        let state = decoder
            .init_streaming_state(&prompt, &context, language.as_deref())
            .await;
        Self {
            decoder,
            state,
            pending_audio: Vec::new(),
            chunk_id: 0,
            last_partial_text: String::new(),
            consecutive_failures: 0,
            chunk_size_s,
            unfixed_chunk_num,
            unfixed_token_num,
            decode_timeout,
            prompt,
            context,
            language,
        }
    }

    pub fn last_partial_text(&self) -> &str {
        &self.last_partial_text
    }

    /// The decoder's currently-detected language for this utterance, the
    /// same source `Partial` events read from (spec §4.5) — distinct
    /// from the client-forced `language` field on `SessionConfig`.
    pub fn language(&self) -> Option<&str> {
        self.state.language.as_deref()
    }

    fn pending_duration_s(&self) -> f64 {
        self.pending_audio.len() as f64 / SAMPLE_RATE_HZ as f64
    }

    /// Append `samples` to the pending buffer and, if a chunk boundary is
    /// reached, run a decode call (spec §4.5 `SpeechContinue` handling).
    pub async fn on_audio(&mut self, samples: &[f32]) -> Result<DecodeEvent, DecoderError> {
        self.pending_audio.extend_from_slice(samples);

        if self.pending_duration_s() < self.chunk_size_s {
            return Ok(DecodeEvent::None);
        }

        self.run_decode().await
    }

    /// `SpeechEnd` flush (spec §4.5): decode any residual audio, emit the
    /// final text, then reset all per-utterance state. Propagates a
    /// decode failure instead of swallowing it — the caller applies the
    /// same §7 disposition (drop/close) it applies to `on_audio` errors.
    /// Per-utterance state is reset either way so the next utterance
    /// starts clean.
    pub async fn flush(&mut self) -> Result<String, DecoderError> {
        let result = if self.pending_audio.is_empty() {
            Ok(())
        } else {
            self.run_decode().await.map(|_| ())
        };

        let text = self.state.text.clone();
        self.reset_utterance().await;
        result.map(|()| text)
    }

    async fn run_decode(&mut self) -> Result<DecodeEvent, DecoderError> {
        let rollback_active = self.chunk_id >= self.unfixed_chunk_num && self.unfixed_token_num > 0;
        let rollback_text = if rollback_active {
            Some(rollback_prefix(&self.state.text, self.unfixed_token_num))
        } else {
            None
        };

        let opts = DecodeOptions {
            chunk_id: self.chunk_id,
            unfixed_chunk_num: self.unfixed_chunk_num,
            unfixed_token_num: self.unfixed_token_num,
            rollback_prefix: rollback_text,
        };

        let audio = std::mem::take(&mut self.pending_audio);
        let state = std::mem::replace(&mut self.state, DecoderState::new(self.language.clone()));

        let call = self.decoder.streaming_transcribe(&audio, state, opts);
        let result = match tokio::time::timeout(self.decode_timeout, call).await {
            Ok(inner) => inner,
            Err(_) => Err(DecoderError::Timeout),
        };

        match result {
            Ok(new_state) => {
                self.consecutive_failures = 0;
                self.chunk_id += 1;
                self.state = new_state;

                if self.state.text != self.last_partial_text {
                    self.last_partial_text = self.state.text.clone();
                    Ok(DecodeEvent::Partial {
                        text: self.state.text.clone(),
                        language: self.state.language.clone(),
                    })
                } else {
                    Ok(DecodeEvent::None)
                }
            }
            Err(e) => {
                // State wasn't consumed by a successful call; restore a
                // fresh placeholder carrying the previous text so future
                // decode calls still have continuity to roll back from.
                self.state = DecoderState {
                    text: self.last_partial_text.clone(),
                    language: self.language.clone(),
                    internal: None,
                };
                self.consecutive_failures += 1;

                if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    error!(failures = self.consecutive_failures, "decoder failing repeatedly, escalating to fatal");
                    Err(DecoderError::Fatal(e.to_string()))
                } else {
                    warn!(error = %e, "decode chunk dropped, session continues");
                    Err(e)
                }
            }
        }
    }

    async fn reset_utterance(&mut self) {
        self.pending_audio.clear();
        self.chunk_id = 0;
        self.last_partial_text.clear();
        self.consecutive_failures = 0;
        self.state = self
            .decoder
            .init_streaming_state(&self.prompt, &self.context, self.language.as_deref())
            .await;
    }
}
