//! Raw 16-bit little-endian PCM split into fixed-size frames.

use super::{DecodedFrame, FrameCodec, MAX_FRAME_SAMPLES};
use crate::format::Channels;
use crate::{Error, Result};

const BYTES_PER_SAMPLE: usize = 2;

/// Treats raw interleaved s16le PCM as a sequence of frames of
/// `frame_len` samples per channel.
///
/// Every byte offset decodes, so this codec never triggers resynchronization
/// except on a trailing partial sample.
#[derive(Clone, Debug)]
pub struct PcmCodec {
    sample_rate_hz: u32,
    channels: Channels,
    frame_len: usize,
}

impl PcmCodec {
    /// Creates a PCM codec; `frame_len` is in samples per channel.
    pub fn new(sample_rate_hz: u32, channels: Channels, frame_len: usize) -> Result<Self> {
        if sample_rate_hz == 0 || frame_len == 0 || frame_len * channels.count() > MAX_FRAME_SAMPLES {
            return Err(Error::InvalidParam);
        }
        Ok(Self {
            sample_rate_hz,
            channels,
            frame_len,
        })
    }

    /// Samples per channel in a full frame.
    #[must_use]
    pub const fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Bytes in a full frame.
    #[must_use]
    pub const fn frame_bytes(&self) -> usize {
        self.frame_len * self.channels.count() * BYTES_PER_SAMPLE
    }
}

impl FrameCodec for PcmCodec {
    fn reset(&mut self) {}

    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> Result<DecodedFrame> {
        let bytes_per_frame = self.channels.count() * BYTES_PER_SAMPLE;
        let samples_per_channel = (input.len() / bytes_per_frame).min(self.frame_len);
        if samples_per_channel == 0 {
            return Err(Error::NeedMoreData);
        }

        let bytes_consumed = samples_per_channel * bytes_per_frame;
        let sample_count = samples_per_channel * self.channels.count();
        let pcm = pcm.get_mut(..sample_count).ok_or(Error::InvalidParam)?;
        for (pcm_slot, sample_bytes) in pcm.iter_mut().zip(input[..bytes_consumed].chunks_exact(2)) {
            *pcm_slot = i16::from_le_bytes([sample_bytes[0], sample_bytes[1]]);
        }

        Ok(DecodedFrame {
            bytes_consumed,
            samples_per_channel,
            channels: self.channels,
            sample_rate_hz: self.sample_rate_hz,
            bitrate_kbps: self.sample_rate_hz * self.channels.count() as u32 * 16 / 1_000,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_whole_frames_then_the_short_tail() -> Result<()> {
        let mut pcm_codec = PcmCodec::new(48_000, Channels::Stereo, 2)?;
        let input: [u8; 10] = [1, 0, 2, 0, 3, 0, 4, 0, 0xFF, 0x7F];
        let mut pcm = [0_i16; MAX_FRAME_SAMPLES];

        let decoded_frame = pcm_codec.decode_frame(&input, &mut pcm)?;
        assert_eq!(decoded_frame.bytes_consumed, 8);
        assert_eq!(decoded_frame.samples_per_channel, 2);
        assert_eq!(&pcm[..4], &[1, 2, 3, 4]);
        assert_eq!(decoded_frame.bitrate_kbps, 1_536);

        // Two bytes are half a stereo frame.
        assert_eq!(pcm_codec.decode_frame(&input[8..], &mut pcm), Err(Error::NeedMoreData));
        Ok(())
    }

    #[test]
    fn rejects_frames_larger_than_the_scratch_buffer() {
        assert_eq!(
            PcmCodec::new(48_000, Channels::Stereo, MAX_FRAME_SAMPLES).err(),
            Some(Error::InvalidParam)
        );
        assert!(PcmCodec::new(48_000, Channels::Mono, MAX_FRAME_SAMPLES).is_ok());
        assert_eq!(PcmCodec::new(0, Channels::Mono, 16).err(), Some(Error::InvalidParam));
    }
}
