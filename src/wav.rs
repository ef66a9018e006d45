//! Minimal RIFF/WAVE reader that hands the `data` chunk to a frame codec.
//!
//! Only the `fmt ` and `data` chunks are interpreted; every other chunk is
//! skipped (honoring RIFF's even-byte padding).

use crate::codec::adpcm::samples_per_block;
use crate::codec::{AdpcmCodec, PcmCodec, WavCodec};
use crate::format::Channels;
use crate::{Error, Result};

/// Samples per channel in one PCM frame handed to the stream decoder.
pub const PCM_FRAME_LEN: usize = 576;

const WAVE_FORMAT_PCM: u16 = 0x0001;
const WAVE_FORMAT_IMA_ADPCM: u16 = 0x0011;

/// Why a byte slice is not a playable WAV file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WavError {
    /// Fewer than the 12 bytes of a RIFF header.
    #[error("file shorter than a RIFF header")]
    TooSmall,
    /// The first bytes are not `RIFF` .. `WAVE`.
    #[error("missing RIFF/WAVE signature")]
    NotWave,
    /// A chunk header declares more bytes than remain.
    #[error("chunk extends past the end of the file")]
    ChunkOverrun,
    /// The `fmt ` chunk cannot hold the PCM format fields.
    #[error("fmt chunk shorter than 16 bytes")]
    FmtTooSmall,
    /// The file has no `fmt ` chunk.
    #[error("no fmt chunk")]
    MissingFmt,
    /// The file has no `data` chunk.
    #[error("no data chunk")]
    MissingData,
    /// Format tag other than PCM (`0x0001`) or IMA ADPCM (`0x0011`).
    #[error("encoding tag {0:#06x} is not supported")]
    UnsupportedEncoding(u16),
    /// Channel count the selected codec cannot decode.
    #[error("{0} channels are not supported for this encoding")]
    UnsupportedChannels(u16),
    /// Bits per sample other than 16 for PCM or 4 for IMA ADPCM.
    #[error("{0} bits per sample are not supported for this encoding")]
    UnsupportedBitDepth(u16),
    /// Block alignment inconsistent with the channel count and encoding.
    #[error("block align {0} is invalid for this encoding")]
    BadBlockAlign(u16),
}

/// Sample encodings the reader can hand to a codec.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WavEncoding {
    /// 16-bit signed little-endian PCM.
    Pcm16,
    /// 4-bit IMA ADPCM, mono.
    ImaAdpcm,
}

/// A parsed WAV file borrowing its sample data.
#[derive(Clone, Copy, Debug)]
pub struct WavFile<'d> {
    encoding: WavEncoding,
    sample_rate_hz: u32,
    channels: Channels,
    block_align: usize,
    data: &'d [u8],
}

impl<'d> WavFile<'d> {
    /// Parses the RIFF header and locates the `fmt ` and `data` chunks.
    pub fn parse(wav_bytes: &'d [u8]) -> Result<Self> {
        if wav_bytes.len() < 12 {
            return Err(WavError::TooSmall.into());
        }
        if !wav_tag_eq(wav_bytes, 0, *b"RIFF") || !wav_tag_eq(wav_bytes, 8, *b"WAVE") {
            return Err(WavError::NotWave.into());
        }

        let mut chunk_offset = 12_usize;
        let mut fmt = None;
        let mut data = None;
        while chunk_offset + 8 <= wav_bytes.len() {
            let chunk_size = read_u32_le(wav_bytes, chunk_offset + 4)? as usize;
            let chunk_data_start = chunk_offset + 8;
            if chunk_size > wav_bytes.len() - chunk_data_start {
                return Err(WavError::ChunkOverrun.into());
            }
            let chunk_bytes = &wav_bytes[chunk_data_start..chunk_data_start + chunk_size];

            if wav_tag_eq(wav_bytes, chunk_offset, *b"fmt ") {
                fmt = Some(parse_fmt(chunk_bytes)?);
            } else if wav_tag_eq(wav_bytes, chunk_offset, *b"data") {
                data = Some(chunk_bytes);
            }

            let padded_chunk_size = chunk_size + (chunk_size & 1);
            chunk_offset = chunk_data_start.saturating_add(padded_chunk_size);
        }

        let (encoding, sample_rate_hz, channels, block_align) = fmt.ok_or(WavError::MissingFmt)?;
        let data = data.ok_or(WavError::MissingData)?;
        debug!(
            "wav: rate={} channels={} block_align={} data_len={}",
            sample_rate_hz,
            channels.count(),
            block_align,
            data.len()
        );
        Ok(Self {
            encoding,
            sample_rate_hz,
            channels,
            block_align,
            data,
        })
    }

    /// Sample encoding named by the `fmt ` chunk.
    #[must_use]
    pub const fn encoding(&self) -> WavEncoding {
        self.encoding
    }

    /// Sample rate stored in the header.
    #[must_use]
    pub const fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Channel layout stored in the header.
    #[must_use]
    pub const fn channels(&self) -> Channels {
        self.channels
    }

    /// Payload of the `data` chunk.
    #[must_use]
    pub const fn data(&self) -> &'d [u8] {
        self.data
    }

    /// Builds the frame codec matching this file's encoding.
    pub fn codec(&self) -> Result<WavCodec> {
        Ok(match self.encoding {
            WavEncoding::Pcm16 => {
                WavCodec::Pcm(PcmCodec::new(self.sample_rate_hz, self.channels, PCM_FRAME_LEN)?)
            }
            WavEncoding::ImaAdpcm => {
                WavCodec::Adpcm(AdpcmCodec::new(self.sample_rate_hz, self.block_align)?)
            }
        })
    }
}

fn parse_fmt(fmt_bytes: &[u8]) -> Result<(WavEncoding, u32, Channels, usize)> {
    if fmt_bytes.len() < 16 {
        return Err(WavError::FmtTooSmall.into());
    }
    let audio_format = read_u16_le(fmt_bytes, 0)?;
    let channel_count = read_u16_le(fmt_bytes, 2)?;
    let sample_rate_hz = read_u32_le(fmt_bytes, 4)?;
    let block_align = read_u16_le(fmt_bytes, 12)?;
    let bits_per_sample = read_u16_le(fmt_bytes, 14)?;

    let channels = Channels::from_count(channel_count)
        .map_err(|_| WavError::UnsupportedChannels(channel_count))?;
    let encoding = match audio_format {
        WAVE_FORMAT_PCM => {
            if bits_per_sample != 16 {
                return Err(WavError::UnsupportedBitDepth(bits_per_sample).into());
            }
            if usize::from(block_align) != channels.count() * 2 {
                return Err(WavError::BadBlockAlign(block_align).into());
            }
            WavEncoding::Pcm16
        }
        WAVE_FORMAT_IMA_ADPCM => {
            if channels != Channels::Mono {
                return Err(WavError::UnsupportedChannels(channel_count).into());
            }
            if bits_per_sample != 4 {
                return Err(WavError::UnsupportedBitDepth(bits_per_sample).into());
            }
            if block_align < 5 {
                return Err(WavError::BadBlockAlign(block_align).into());
            }
            // The extension's samples-per-block must agree with block_align.
            if fmt_bytes.len() >= 20
                && usize::from(read_u16_le(fmt_bytes, 18)?) != samples_per_block(usize::from(block_align))
            {
                return Err(WavError::BadBlockAlign(block_align).into());
            }
            WavEncoding::ImaAdpcm
        }
        other => return Err(WavError::UnsupportedEncoding(other).into()),
    };
    Ok((encoding, sample_rate_hz, channels, usize::from(block_align)))
}

fn wav_tag_eq(wav_bytes: &[u8], byte_offset: usize, tag_bytes: [u8; 4]) -> bool {
    wav_bytes.get(byte_offset..byte_offset + 4) == Some(&tag_bytes[..])
}

fn read_u16_le(bytes: &[u8], byte_offset: usize) -> Result<u16> {
    match bytes.get(byte_offset..byte_offset + 2) {
        Some(&[b0, b1]) => Ok(u16::from_le_bytes([b0, b1])),
        _ => Err(Error::Wav(WavError::TooSmall)),
    }
}

fn read_u32_le(bytes: &[u8], byte_offset: usize) -> Result<u32> {
    match bytes.get(byte_offset..byte_offset + 4) {
        Some(&[b0, b1, b2, b3]) => Ok(u32::from_le_bytes([b0, b1, b2, b3])),
        _ => Err(Error::Wav(WavError::TooSmall)),
    }
}
