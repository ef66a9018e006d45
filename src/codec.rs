//! The frame codec seam used by the stream decoder.
//!
//! A codec only turns the bytes at the front of its input into one frame of
//! PCM. Deciding when to decode, how much, and what to do with corrupt bytes
//! belongs to [`StreamDecoder`](crate::stream_decoder::StreamDecoder).
//!
//! Two codecs ship with the crate: [`PcmCodec`] for raw 16-bit PCM and
//! [`AdpcmCodec`] for IMA ADPCM blocks. [`WavCodec`] wraps whichever one a
//! WAV header asks for.

pub mod adpcm;
pub mod pcm;

pub use adpcm::AdpcmCodec;
pub use pcm::PcmCodec;

use crate::Result;
use crate::format::Channels;

/// Largest number of interleaved samples one frame may produce
/// (1152 stereo samples, the MPEG-1 Layer III maximum).
pub const MAX_FRAME_SAMPLES: usize = 1152 * 2;

/// What one successful [`FrameCodec::decode_frame`] call produced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecodedFrame {
    /// Bytes of input the frame occupied.
    pub bytes_consumed: usize,
    /// Samples per channel written to the PCM buffer.
    pub samples_per_channel: usize,
    /// Channel layout of the written samples.
    pub channels: Channels,
    /// Sample rate the frame was encoded at.
    pub sample_rate_hz: u32,
    /// Nominal bitrate of the frame.
    pub bitrate_kbps: u32,
}

impl DecodedFrame {
    /// Interleaved samples written to the PCM buffer.
    #[must_use]
    pub const fn sample_count(&self) -> usize {
        self.samples_per_channel * self.channels.count()
    }

    /// A frame that advanced the input and produced audio.
    #[must_use]
    pub const fn is_audible(&self) -> bool {
        self.bytes_consumed > 0 && self.samples_per_channel > 0
    }
}

/// Decodes one frame at a time from the front of a byte slice.
pub trait FrameCodec {
    /// Clears any inter-frame state so decoding can restart at offset zero.
    fn reset(&mut self);

    /// Decodes the frame starting at `input[0]` into `pcm` (interleaved).
    ///
    /// `pcm` holds at least [`MAX_FRAME_SAMPLES`] samples. Returning
    /// [`Error::NeedMoreData`](crate::Error::NeedMoreData), or a frame that is not
    /// [audible](DecodedFrame::is_audible), tells the caller there is no valid
    /// frame at this position. Any other error is unrecoverable.
    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> Result<DecodedFrame>;
}

/// Codec selected from a WAV `fmt ` chunk.
#[derive(Clone, Debug)]
pub enum WavCodec {
    /// 16-bit PCM.
    Pcm(PcmCodec),
    /// IMA ADPCM.
    Adpcm(AdpcmCodec),
}

impl FrameCodec for WavCodec {
    fn reset(&mut self) {
        match self {
            Self::Pcm(pcm_codec) => pcm_codec.reset(),
            Self::Adpcm(adpcm_codec) => adpcm_codec.reset(),
        }
    }

    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> Result<DecodedFrame> {
        match self {
            Self::Pcm(pcm_codec) => pcm_codec.decode_frame(input, pcm),
            Self::Adpcm(adpcm_codec) => adpcm_codec.decode_frame(input, pcm),
        }
    }
}
