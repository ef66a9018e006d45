//! Crate-wide error type.

use crate::wav::WavError;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors surfaced by the streaming pipeline.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A call argument was empty, zero, or inconsistent (for example a chunk size
    /// that does not match the ping-pong buffer). Never retried.
    #[error("invalid parameter")]
    InvalidParam,
    /// The codec could not decode a frame at the current position. Handled
    /// internally by byte-skip resynchronization.
    #[error("not enough data to decode a frame")]
    NeedMoreData,
    /// The stream is exhausted and looping is disabled.
    #[error("end of stream")]
    EndOfFile,
    /// Unrecoverable codec failure.
    #[error("decoder failure")]
    Decode,
    /// The audio format is outside what the output path supports.
    #[error("unsupported audio format")]
    UnsupportedFormat,
    /// The operation is not valid in the current playback state.
    #[error("operation not valid in the current playback state")]
    InvalidState,
    /// The output peripheral rejected its configuration (unsupported rate, busy).
    #[error("output hardware configuration failed")]
    HardwareConfig,
    /// The output peripheral failed to start or stop a transfer.
    #[error("output transfer failed")]
    Transfer,
    /// The WAV container could not be parsed.
    #[error("WAV container error: {0}")]
    Wav(WavError),
}

impl From<WavError> for Error {
    fn from(wav_error: WavError) -> Self {
        Self::Wav(wav_error)
    }
}
