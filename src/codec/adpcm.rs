//! IMA ADPCM (WAV format tag `0x0011`) block decoding.
//!
//! Each block is self-contained: a 4-byte header carrying the first sample and
//! the step index, followed by packed 4-bit deltas, low nibble first.

use super::{DecodedFrame, FrameCodec, MAX_FRAME_SAMPLES};
use crate::format::Channels;
use crate::{Error, Result};

const HEADER_LEN: usize = 4;
const MAX_STEP_INDEX: usize = 88;
const SIGN_BIT: u8 = 0x08;

/// Step index adjustment keyed by the three magnitude bits; the sign bit does not matter.
const STEP_INDEX_ADJUST: [i8; 8] = [-1, -1, -1, -1, 2, 4, 6, 8];
const STEP_SIZES: [i32; MAX_STEP_INDEX + 1] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

/// Decoded samples in a mono IMA ADPCM block of `block_align` bytes.
#[must_use]
pub const fn samples_per_block(block_align: usize) -> usize {
    (block_align.saturating_sub(HEADER_LEN) * 2) + 1
}

/// Mono IMA ADPCM codec; one frame is one block.
///
/// A block whose header is malformed (step index above 88 or a non-zero
/// reserved byte) yields no frame, which sends the stream decoder into
/// byte-skip resynchronization.
#[derive(Clone, Debug)]
pub struct AdpcmCodec {
    sample_rate_hz: u32,
    block_align: usize,
}

impl AdpcmCodec {
    /// Creates a codec for blocks of `block_align` bytes.
    pub fn new(sample_rate_hz: u32, block_align: usize) -> Result<Self> {
        if sample_rate_hz == 0
            || block_align <= HEADER_LEN
            || samples_per_block(block_align) > MAX_FRAME_SAMPLES
        {
            return Err(Error::InvalidParam);
        }
        Ok(Self {
            sample_rate_hz,
            block_align,
        })
    }

    /// Block size in bytes.
    #[must_use]
    pub const fn block_align(&self) -> usize {
        self.block_align
    }

    /// Decoded samples per block.
    #[must_use]
    pub const fn samples_per_block(&self) -> usize {
        samples_per_block(self.block_align)
    }
}

impl FrameCodec for AdpcmCodec {
    fn reset(&mut self) {}

    fn decode_frame(&mut self, input: &[u8], pcm: &mut [i16]) -> Result<DecodedFrame> {
        let Some(adpcm_block) = input.get(..self.block_align) else {
            return Err(Error::NeedMoreData);
        };
        let samples_per_block = self.samples_per_block();
        let pcm = pcm.get_mut(..samples_per_block).ok_or(Error::InvalidParam)?;

        let Some(mut ima_predictor) = ImaPredictor::from_header(adpcm_block)? else {
            return Err(Error::NeedMoreData);
        };

        pcm[0] = ima_predictor.sample();
        let mut samples_decoded_in_block = 1_usize;
        let nibbles = adpcm_block[HEADER_LEN..]
            .iter()
            .flat_map(|&adpcm_byte| [adpcm_byte & 0x0F, adpcm_byte >> 4]);
        for (pcm_sample, adpcm_nibble) in pcm[1..].iter_mut().zip(nibbles) {
            *pcm_sample = ima_predictor.decode(adpcm_nibble);
            samples_decoded_in_block += 1;
        }

        Ok(DecodedFrame {
            bytes_consumed: self.block_align,
            samples_per_channel: samples_decoded_in_block,
            channels: Channels::Mono,
            sample_rate_hz: self.sample_rate_hz,
            bitrate_kbps: (self.block_align as u64 * 8 * u64::from(self.sample_rate_hz)
                / (samples_per_block as u64 * 1_000)) as u32,
        })
    }
}

fn read_i16_le(bytes: &[u8], byte_offset: usize) -> Result<i16> {
    let Some(end_offset) = byte_offset.checked_add(2) else {
        return Err(Error::NeedMoreData);
    };
    if end_offset > bytes.len() {
        return Err(Error::NeedMoreData);
    }
    Ok(i16::from_le_bytes([bytes[byte_offset], bytes[byte_offset + 1]]))
}

/// Running predictor state for one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ImaPredictor {
    sample: i16,
    step_index: usize,
}

impl ImaPredictor {
    /// Reads the block header. `None` when the step index or reserved byte is invalid.
    fn from_header(adpcm_block: &[u8]) -> Result<Option<Self>> {
        let sample = read_i16_le(adpcm_block, 0)?;
        let (Some(&step_index), Some(&reserved)) = (adpcm_block.get(2), adpcm_block.get(3)) else {
            return Err(Error::NeedMoreData);
        };
        let step_index = usize::from(step_index);
        if step_index > MAX_STEP_INDEX || reserved != 0 {
            return Ok(None);
        }
        Ok(Some(Self { sample, step_index }))
    }

    const fn sample(&self) -> i16 {
        self.sample
    }

    fn decode(&mut self, adpcm_nibble: u8) -> i16 {
        let step = STEP_SIZES[self.step_index];
        let magnitude_bits = adpcm_nibble & 0x07;

        // Bits 2..0 weigh step, step/2, step/4 on top of the step/8 bias.
        let delta = (0_u8..3)
            .filter(|bit| magnitude_bits & (1 << *bit) != 0)
            .fold(step >> 3, |delta, bit| delta + (step >> (2 - bit)));

        let sample = i32::from(self.sample);
        let sample = if adpcm_nibble & SIGN_BIT == 0 {
            sample + delta
        } else {
            sample - delta
        };
        self.sample = sample.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;

        let adjust = STEP_INDEX_ADJUST[usize::from(magnitude_bits)];
        self.step_index = self
            .step_index
            .saturating_add_signed(isize::from(adjust))
            .min(MAX_STEP_INDEX);

        self.sample
    }
}
