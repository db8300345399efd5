//! Session (spec §4.6): binds one connection to one Endpointer + Decoder
//! Driver, holds `SessionConfig`, and serializes inbound/outbound events.
//!
//! Grounded on the teacher's `VoiceSession` (`ws_audio.rs`) for the
//! "one struct per connection, holding everything needed to drive the
//! pipeline for that connection" shape — generalized from raw i16
//! channel plumbing (which the Connection Handler owns here instead) to
//! the spec's VAD → Endpointer → Decoder Driver pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::SessionConfig;
use crate::decoder::{DecodeEvent, DecoderDriver, StreamingDecoder};
use crate::endpointer::{EndpointAction, Endpointer};
use crate::error::GatewayError;
use crate::event::Event;
use crate::frame::AudioFrame;
use crate::noise_filter::{NoiseFilter, PassthroughFilter};
use crate::ring::FrameRing;
use crate::session_id::SessionId;
use crate::vad::{VadGate, VoiceActivityModel};

pub struct Session<M: VoiceActivityModel, D: StreamingDecoder> {
    id: SessionId,
    vad_gate: Arc<VadGate<M>>,
    decoder: Arc<D>,
    decode_timeout: Duration,
    frame_size: usize,

    ring: FrameRing,
    noise_filter: Box<dyn NoiseFilter>,
    endpointer: Option<Endpointer>,
    driver: Option<DecoderDriver<D>>,
    config: Option<SessionConfig>,

    audio_processed: bool,
    closed: bool,
    started_at: Instant,
}

impl<M: VoiceActivityModel, D: StreamingDecoder> Session<M, D> {
    pub fn new(
        vad_gate: Arc<VadGate<M>>,
        decoder: Arc<D>,
        frame_size: usize,
        decode_timeout: Duration,
    ) -> Self {
        Self::with_max_buffered(vad_gate, decoder, frame_size, decode_timeout, None)
    }

    /// As `new`, but bounds the unframed remainder to `max_buffered`
    /// samples (spec §5 backpressure: when the session's inbound side
    /// can't keep up, the oldest unframed samples are dropped first,
    /// logged but never surfaced as an `Error` event).
    pub fn with_max_buffered(
        vad_gate: Arc<VadGate<M>>,
        decoder: Arc<D>,
        frame_size: usize,
        decode_timeout: Duration,
        max_buffered: Option<usize>,
    ) -> Self {
        let ring = match max_buffered {
            Some(cap) => FrameRing::bounded(frame_size, cap),
            None => FrameRing::new(frame_size),
        };
        Self {
            id: SessionId::new(),
            vad_gate,
            decoder,
            decode_timeout,
            frame_size,
            ring,
            noise_filter: Box::new(PassthroughFilter),
            endpointer: None,
            driver: None,
            config: None,
            audio_processed: false,
            closed: false,
            started_at: Instant::now(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn now(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Spec §4.6: installs config; idempotent before any audio, fails
    /// with `ConfigAfterAudio` afterwards.
    pub async fn apply_config(&mut self, cfg: SessionConfig) -> Result<(), GatewayError> {
        if self.closed {
            return Err(GatewayError::SessionClosed);
        }
        if self.audio_processed {
            return Err(GatewayError::ConfigAfterAudio);
        }

        let frame_duration_s = self.frame_size as f64 / crate::frame::SAMPLE_RATE_HZ as f64;
        self.endpointer = Some(Endpointer::new(
            frame_duration_s,
            cfg.silence_threshold_s,
            cfg.min_speech_duration_s,
        ));
        self.driver = Some(
            DecoderDriver::new(
                self.decoder.clone(),
                cfg.prompt.clone(),
                cfg.context.clone(),
                cfg.language.clone(),
                cfg.chunk_size_s,
                cfg.unfixed_chunk_num,
                cfg.unfixed_token_num,
                self.decode_timeout,
            )
            .await,
        );
        self.config = Some(cfg);
        Ok(())
    }

    /// Spec §4.6: pushes samples into the frame buffer and drives one
    /// pass of the pipeline; never blocks on the network.
    pub async fn ingest(&mut self, samples: &[f32]) -> Result<Vec<Event>, GatewayError> {
        if self.closed {
            return Err(GatewayError::SessionClosed);
        }
        if self.config.is_none() {
            return Err(GatewayError::ConfigRequired);
        }

        self.audio_processed = true;
        let dropped = self.ring.push(samples);
        if dropped > 0 {
            // §5: logged, never emitted as an `Error` event — that would
            // compound the congestion this is meant to relieve.
            warn!(session = %self.id, dropped, "inbound backpressure: dropped oldest unframed samples");
        }

        let mut events = Vec::new();
        while let Some(frame) = self.ring.next_frame() {
            match self.process_frame(frame).await {
                Ok(mut new_events) => events.append(&mut new_events),
                Err(e) => {
                    if e.is_fatal() {
                        self.closed = true;
                        events.push(Event::error(e.to_string()));
                        return Ok(events);
                    }
                    events.push(Event::error(e.to_string()));
                }
            }
        }
        Ok(events)
    }

    async fn process_frame(&mut self, frame: AudioFrame) -> Result<Vec<Event>, GatewayError> {
        let frame = self
            .noise_filter
            .filter(frame)
            .map_err(|e| GatewayError::BadMessage(e.to_string()))?;

        let decision = match self.vad_gate.classify(&frame).await {
            Ok(decision) => decision,
            Err(crate::error::VadError::InferenceFailed(msg)) => {
                // Fail-open per spec §7: a single bad VAD call is treated
                // as silence rather than aborting the utterance.
                warn!(error = %msg, "VAD inference failed, treating frame as silence");
                crate::vad::VadDecision {
                    probability: 0.0,
                    is_speech: false,
                }
            }
            Err(e @ crate::error::VadError::InvalidFrameSize { .. }) => {
                return Err(GatewayError::from(e));
            }
        };

        let now = self.now();
        let endpointer = self
            .endpointer
            .as_mut()
            .ok_or(GatewayError::ConfigRequired)?;
        let action = endpointer.process(frame, decision.is_speech);

        let driver = self.driver.as_mut().ok_or(GatewayError::ConfigRequired)?;
        let language = self.config.as_ref().and_then(|c| c.language.as_deref());

        match action {
            EndpointAction::Buffering | EndpointAction::Discarded => Ok(Vec::new()),
            EndpointAction::SpeechStart { buffered_audio } => {
                let mut events = Vec::new();
                for frame in buffered_audio {
                    if let Some(event) = Self::decode_event(driver, &frame, language, now).await? {
                        events.push(event);
                    }
                }
                Ok(events)
            }
            EndpointAction::SpeechContinue { frame } => {
                match Self::decode_event(driver, &frame, language, now).await? {
                    Some(event) => Ok(vec![event]),
                    None => Ok(Vec::new()),
                }
            }
            EndpointAction::SpeechEnd { final_frame } => {
                let mut events = Vec::new();
                if let Some(event) = Self::decode_event(driver, &final_frame, language, now).await? {
                    events.push(event);
                }
                events.push(self.flush_driver().await?);
                Ok(events)
            }
        }
    }

    async fn decode_event(
        driver: &mut DecoderDriver<D>,
        frame: &AudioFrame,
        language: Option<&str>,
        timestamp: f64,
    ) -> Result<Option<Event>, GatewayError> {
        match driver.on_audio(&frame.samples).await {
            Ok(DecodeEvent::Partial { text, language: decoded_language }) => {
                let lang = decoded_language.as_deref().or(language);
                Ok(Some(Event::partial(lang, text, timestamp)))
            }
            Ok(DecodeEvent::None) => Ok(None),
            Err(e) => Err(GatewayError::from(e)),
        }
    }

    async fn flush_driver(&mut self) -> Result<Event, GatewayError> {
        let config_language = self.config.as_ref().and_then(|c| c.language.clone());
        let driver = self.driver.as_mut().ok_or(GatewayError::ConfigRequired)?;
        let decoded_language = driver.language().map(str::to_string);
        let text = driver.flush().await?;
        let language = decoded_language.or(config_language);
        Ok(Event::r#final(language.as_deref(), text, self.now()))
    }

    /// Spec §4.6: forces a Speaking→Silent transition; no-op if already
    /// Silent.
    pub async fn finalize(&mut self) -> Result<Option<Event>, GatewayError> {
        if self.closed {
            return Err(GatewayError::SessionClosed);
        }
        if self.config.is_none() {
            return Err(GatewayError::ConfigRequired);
        }

        // Any remainder too short to complete a VAD frame is still part
        // of the utterance's trailing audio; hand it straight to the
        // driver rather than discarding it silently.
        if let Some(remainder) = self.ring.flush() {
            if let Some(driver) = self.driver.as_mut() {
                let _ = driver.on_audio(&remainder).await;
            }
        }

        let endpointer = self
            .endpointer
            .as_mut()
            .ok_or(GatewayError::ConfigRequired)?;
        if !endpointer.force_end() {
            debug!(session = %self.id, "finalize called while not speaking, no-op");
            return Ok(None);
        }

        let event = self.flush_driver().await?;
        Ok(Some(event))
    }

    /// Spec §4.6: releases resources; further calls fail with
    /// `SessionClosed`.
    pub fn close(&mut self) {
        self.closed = true;
    }
}
