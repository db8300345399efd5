//! Session configuration (spec §3, §6.1).
//!
//! `SessionConfig` is the internal, validated representation.
//! `ConfigMessage` is the wire shape the client sends — field names
//! differ slightly from the internal ones (`chunk_size_sec` vs
//! `chunk_size_s`, etc.), so deserialization goes through an explicit
//! `TryFrom` rather than deriving the wire struct directly onto the
//! runtime type. Grounded on the teacher's `ProductionVADConfig`
//! (`vad/production.rs`) for the "typed config struct with a `Default`
//! impl documenting each default inline" shape.

use serde::Deserialize;

use crate::error::GatewayError;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub vad_threshold: f32,
    pub silence_threshold_s: f64,
    pub min_speech_duration_s: f64,
    pub chunk_size_s: f64,
    pub unfixed_chunk_num: u32,
    pub unfixed_token_num: usize,
    pub language: Option<String>,
    pub prompt: String,
    pub context: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            vad_threshold: 0.5,
            silence_threshold_s: 0.8,
            min_speech_duration_s: 0.2,
            chunk_size_s: 1.0,
            unfixed_chunk_num: 4,
            unfixed_token_num: 5,
            language: None,
            prompt: String::new(),
            context: String::new(),
        }
    }
}

/// The wire shape of `{"type":"config", ...}` (spec §6.1). Every field is
/// optional; omitted fields fall back to `SessionConfig::default()`.
/// Unknown fields are ignored (`serde`'s default behavior when no
/// `#[serde(deny_unknown_fields)]` is present).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigMessage {
    pub context: Option<String>,
    pub language: Option<String>,
    pub prompt: Option<String>,
    pub unfixed_chunk_num: Option<u32>,
    pub unfixed_token_num: Option<usize>,
    pub chunk_size_sec: Option<f64>,
    pub vad_threshold: Option<f32>,
    pub silence_threshold: Option<f64>,
    pub min_speech_duration: Option<f64>,
}

impl TryFrom<ConfigMessage> for SessionConfig {
    type Error = GatewayError;

    fn try_from(msg: ConfigMessage) -> Result<Self, Self::Error> {
        let defaults = SessionConfig::default();
        let cfg = SessionConfig {
            vad_threshold: msg.vad_threshold.unwrap_or(defaults.vad_threshold),
            silence_threshold_s: msg.silence_threshold.unwrap_or(defaults.silence_threshold_s),
            min_speech_duration_s: msg
                .min_speech_duration
                .unwrap_or(defaults.min_speech_duration_s),
            chunk_size_s: msg.chunk_size_sec.unwrap_or(defaults.chunk_size_s),
            unfixed_chunk_num: msg.unfixed_chunk_num.unwrap_or(defaults.unfixed_chunk_num),
            unfixed_token_num: msg.unfixed_token_num.unwrap_or(defaults.unfixed_token_num),
            language: msg.language.or(defaults.language),
            prompt: msg.prompt.unwrap_or(defaults.prompt),
            context: msg.context.unwrap_or(defaults.context),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<(), GatewayError> {
        if !(0.0..=1.0).contains(&self.vad_threshold) {
            return Err(GatewayError::BadMessage(format!(
                "vad_threshold must be in [0,1], got {}",
                self.vad_threshold
            )));
        }
        if !self.silence_threshold_s.is_finite() || self.silence_threshold_s < 0.0 {
            return Err(GatewayError::BadMessage(
                "silence_threshold must be >= 0".into(),
            ));
        }
        if !self.min_speech_duration_s.is_finite() || self.min_speech_duration_s < 0.0 {
            return Err(GatewayError::BadMessage(
                "min_speech_duration must be >= 0".into(),
            ));
        }
        if !self.chunk_size_s.is_finite() || self.chunk_size_s <= 0.0 {
            return Err(GatewayError::BadMessage("chunk_size_sec must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_message_yields_defaults() {
        let cfg = SessionConfig::try_from(ConfigMessage::default()).unwrap();
        assert_eq!(cfg, SessionConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let msg = ConfigMessage {
            chunk_size_sec: Some(0.5),
            ..Default::default()
        };
        let cfg = SessionConfig::try_from(msg).unwrap();
        assert_eq!(cfg.chunk_size_s, 0.5);
        assert_eq!(cfg.vad_threshold, 0.5);
    }

    #[test]
    fn out_of_range_threshold_rejected() {
        let msg = ConfigMessage {
            vad_threshold: Some(1.5),
            ..Default::default()
        };
        assert!(SessionConfig::try_from(msg).is_err());
    }

    #[test]
    fn negative_chunk_size_rejected() {
        let msg = ConfigMessage {
            chunk_size_sec: Some(-1.0),
            ..Default::default()
        };
        assert!(SessionConfig::try_from(msg).is_err());
    }

    #[test]
    fn deserializes_from_wire_json() {
        let msg: ConfigMessage = serde_json::from_str(
            r#"{"type":"config","language":"en","chunk_size_sec":0.5,"unknown_field":123}"#,
        )
        .unwrap();
        let cfg = SessionConfig::try_from(msg).unwrap();
        assert_eq!(cfg.language.as_deref(), Some("en"));
        assert_eq!(cfg.chunk_size_s, 0.5);
    }
}
