//! Streaming decoder contract (spec §4.5, §6.2) and the driver that owns
//! per-session decode state.
//!
//! Grounded on the teacher's `SpeechToText` trait shape (`stt/stub.rs`,
//! `stt/whisper.rs`: `name`/`initialize`/`transcribe`), generalized to a
//! *stateful* streaming variant — the one-shot `transcribe(samples) ->
//! TranscriptResult` shape doesn't carry the cross-call attention/tokenizer
//! state the spec's decoder contract requires, so `streaming_transcribe`
//! here takes and returns an opaque `DecoderState` instead.

mod driver;
mod rollback;
mod stub;

pub use driver::{DecoderDriver, DecodeEvent};
pub use stub::StubDecoder;

use crate::error::DecoderError;
use async_trait::async_trait;
use std::any::Any;

/// Knobs the driver supplies to a decode call (spec §6.2). The rollback
/// mechanics themselves live inside the decoder; the driver only chooses
/// these numbers and, for convenience, hands back the UTF-8-safe text
/// prefix it computed (see `decoder::rollback`) so decoders that don't
/// want to re-derive it from `chunk_id`/`unfixed_*` don't have to.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub chunk_id: u32,
    pub unfixed_chunk_num: u32,
    pub unfixed_token_num: usize,
    pub rollback_prefix: Option<String>,
}

/// Opaque streaming state, owned by the driver and passed by value to
/// `streaming_transcribe`. The driver never inspects `internal` — only
/// `text` and `language` (spec §9 Design Notes).
pub struct DecoderState {
    pub text: String,
    pub language: Option<String>,
    pub internal: Option<Box<dyn Any + Send>>,
}

impl DecoderState {
    pub fn new(language: Option<String>) -> Self {
        Self {
            text: String::new(),
            language,
            internal: None,
        }
    }
}

#[async_trait]
pub trait StreamingDecoder: Send + Sync {
    /// Create fresh per-utterance streaming state.
    async fn init_streaming_state(
        &self,
        prompt: &str,
        context: &str,
        language: Option<&str>,
    ) -> DecoderState;

    /// Decode another chunk of audio against existing state, returning
    /// updated state. `audio_samples` covers only the new audio since the
    /// previous call (the driver does not re-send already-decoded audio;
    /// continuity comes from `state`).
    async fn streaming_transcribe(
        &self,
        audio_samples: &[f32],
        state: DecoderState,
        opts: DecodeOptions,
    ) -> Result<DecoderState, DecoderError>;
}
