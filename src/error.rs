//! Error taxonomy (spec §7).
//!
//! Lower-level components raise their own narrow `thiserror` enums
//! (`VadError`, `DecoderError`, `NoiseFilterError`), mirroring the
//! teacher's `AdapterError`/`StageError`/`VADError` split. The session
//! layer translates those into `GatewayError`, the taxonomy the
//! Connection Handler turns into wire-level `Error` events or a session
//! close.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VadError {
    #[error("frame size {got} is not one of the allowed VAD analysis sizes {allowed:?}")]
    InvalidFrameSize { got: usize, allowed: [usize; 3] },

    #[error("VAD inference failed: {0}")]
    InferenceFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NoiseFilterError {
    #[error("noise filter produced {got} samples, expected {expected}")]
    FrameSizeMismatch { got: usize, expected: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    #[error("decoder call failed: {0}")]
    Transient(String),

    #[error("decoder call timed out")]
    Timeout,

    #[error("decoder state corrupted: {0}")]
    Fatal(String),
}

/// The spec §7 taxonomy. One variant per row of the error table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("malformed control message: {0}")]
    BadMessage(String),

    #[error("config required before audio")]
    ConfigRequired,

    #[error("config cannot be changed after audio has been processed")]
    ConfigAfterAudio,

    #[error("invalid frame size fed to VAD: {0}")]
    InvalidFrameSize(#[from] VadErrorFatal),

    #[error("decoder call failed, chunk dropped: {0}")]
    DecodeTransient(String),

    #[error("decoder state corrupted, session closing: {0}")]
    DecodeFatal(String),

    #[error("server busy, max concurrent sessions reached")]
    ServerBusy,

    #[error("session already closed")]
    SessionClosed,
}

/// Newtype wrapper so `InvalidFrameSize` can carry a `VadError` via `#[from]`
/// without colliding with `VadError`'s other (non-fatal) variants being
/// accidentally convertible into a fatal gateway error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct VadErrorFatal(pub VadError);

impl GatewayError {
    /// Whether this error is fatal to the session per the §7 disposition
    /// column ("close session") vs. recoverable ("keep session").
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::InvalidFrameSize(_) | GatewayError::DecodeFatal(_)
        )
    }
}

impl From<VadError> for GatewayError {
    fn from(e: VadError) -> Self {
        match e {
            VadError::InvalidFrameSize { .. } => {
                GatewayError::InvalidFrameSize(VadErrorFatal(e))
            }
            // Per §7: "VAD failures on a single frame are treated as
            // silence (fail-open)." A non-size inference failure never
            // reaches GatewayError — callers handle it at the VadGate
            // layer by treating the frame as non-speech. This impl only
            // covers the one VadError variant that IS a protocol-level
            // error: a malformed frame size is a programming error, not
            // a transient inference hiccup.
            VadError::InferenceFailed(msg) => GatewayError::BadMessage(msg),
        }
    }
}

impl From<DecoderError> for GatewayError {
    fn from(e: DecoderError) -> Self {
        match e {
            DecoderError::Transient(msg) => GatewayError::DecodeTransient(msg),
            DecoderError::Timeout => GatewayError::DecodeTransient("decode timed out".into()),
            DecoderError::Fatal(msg) => GatewayError::DecodeFatal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_frame_size_is_fatal() {
        let e: GatewayError = VadError::InvalidFrameSize {
            got: 900,
            allowed: [512, 1024, 1536],
        }
        .into();
        assert!(e.is_fatal());
        assert!(matches!(e, GatewayError::InvalidFrameSize(_)));
    }

    #[test]
    fn decode_transient_is_not_fatal() {
        let e: GatewayError = DecoderError::Transient("boom".into()).into();
        assert!(!e.is_fatal());
    }

    #[test]
    fn decode_fatal_is_fatal() {
        let e: GatewayError = DecoderError::Fatal("corrupted".into()).into();
        assert!(e.is_fatal());
    }
}
