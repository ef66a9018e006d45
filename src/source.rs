//! The waveform source seam between the ping-pong controller and PCM producers.
//!
//! The controller is written once against [`WaveformSource`]; [`Source`] is the
//! tagged variant used when a session switches between a tone and a stream.

use crate::codec::FrameCodec;
use crate::format::AudioFormat;
use crate::stream_decoder::StreamDecoder;
use crate::tone::ToneGenerator;
use crate::Result;

/// End-of-stream behavior for decoded streams.
///
/// Tones are infinite and ignore this policy.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AtEnd {
    /// Restart from the beginning of the stream, inside the same chunk if needed.
    Loop,
    /// Pad the last chunk with silence and report the end of the stream.
    #[default]
    Stop,
}

impl From<bool> for AtEnd {
    fn from(loop_enabled: bool) -> Self {
        if loop_enabled { Self::Loop } else { Self::Stop }
    }
}

/// Outcome of a successful refill.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Refill {
    /// The half holds a full chunk of audio.
    Filled,
    /// The stream ended inside this chunk; the remainder is silence.
    Exhausted,
}

/// A producer of fixed-length interleaved PCM chunks.
pub trait WaveformSource {
    /// Format of the samples written by [`Self::refill`].
    fn format(&self) -> AudioFormat;

    /// Chunk length in frames this source was built for, or `None` when it can
    /// fill a half of any length.
    fn chunk_frames(&self) -> Option<usize>;

    /// Writes exactly `half.len()` samples into `half`.
    ///
    /// `half` is the fillable half of the ping-pong buffer and nothing else.
    fn refill(&mut self, half: &mut [i16]) -> Result<Refill>;

    /// Returns the source to its initial state.
    fn rewind(&mut self) -> Result<()>;

    /// Updates the end-of-stream policy. May be called during playback.
    fn set_at_end(&mut self, at_end: AtEnd);
}

/// Either kind of source a playback session can own.
pub enum Source<'d, C: FrameCodec> {
    /// Pure synthesis.
    Tone(ToneGenerator),
    /// Compressed stream decoded frame by frame.
    Stream(StreamDecoder<'d, C>),
}

impl<C: FrameCodec> From<ToneGenerator> for Source<'_, C> {
    fn from(tone_generator: ToneGenerator) -> Self {
        Self::Tone(tone_generator)
    }
}

impl<'d, C: FrameCodec> From<StreamDecoder<'d, C>> for Source<'d, C> {
    fn from(stream_decoder: StreamDecoder<'d, C>) -> Self {
        Self::Stream(stream_decoder)
    }
}

impl<C: FrameCodec> WaveformSource for Source<'_, C> {
    fn format(&self) -> AudioFormat {
        match self {
            Self::Tone(tone_generator) => tone_generator.format(),
            Self::Stream(stream_decoder) => stream_decoder.format(),
        }
    }

    fn chunk_frames(&self) -> Option<usize> {
        match self {
            Self::Tone(tone_generator) => tone_generator.chunk_frames(),
            Self::Stream(stream_decoder) => stream_decoder.chunk_frames(),
        }
    }

    fn refill(&mut self, half: &mut [i16]) -> Result<Refill> {
        match self {
            Self::Tone(tone_generator) => tone_generator.refill(half),
            Self::Stream(stream_decoder) => stream_decoder.refill(half),
        }
    }

    fn rewind(&mut self) -> Result<()> {
        match self {
            Self::Tone(tone_generator) => tone_generator.rewind(),
            Self::Stream(stream_decoder) => stream_decoder.rewind(),
        }
    }

    fn set_at_end(&mut self, at_end: AtEnd) {
        match self {
            Self::Tone(tone_generator) => tone_generator.set_at_end(at_end),
            Self::Stream(stream_decoder) => stream_decoder.set_at_end(at_end),
        }
    }
}
