//! Nearest-neighbor sample-rate conversion.
//!
//! Output sample `i` takes input sample `floor(i * input_rate / output_rate)`.
//! There is no filtering, so upward and downward conversions alias.

/// Index mapping between one input rate and one output rate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NearestResampler {
    input_rate_hz: u32,
    output_rate_hz: u32,
}

impl NearestResampler {
    /// Creates a mapping; a zero rate on either side is treated as pass-through.
    #[must_use]
    pub const fn new(input_rate_hz: u32, output_rate_hz: u32) -> Self {
        if input_rate_hz == 0 || output_rate_hz == 0 {
            Self {
                input_rate_hz: 1,
                output_rate_hz: 1,
            }
        } else {
            Self {
                input_rate_hz,
                output_rate_hz,
            }
        }
    }

    /// True when input and output rates match.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        self.input_rate_hz == self.output_rate_hz
    }

    /// Output frames produced from `input_len` input frames (rounded up).
    #[must_use]
    pub const fn output_len(&self, input_len: usize) -> usize {
        let numerator = input_len as u64 * self.output_rate_hz as u64;
        numerator.div_ceil(self.input_rate_hz as u64) as usize
    }

    /// Input frame that output frame `output_index` copies.
    #[must_use]
    pub const fn source_index(&self, output_index: usize) -> usize {
        (output_index as u64 * self.input_rate_hz as u64 / self.output_rate_hz as u64) as usize
    }
}

/// Resamples interleaved `input` into `output` and returns the samples written.
///
/// Conversion stops at whichever of the two buffers runs out first, always on a
/// whole-frame boundary.
pub fn resample_nearest(
    input: &[i16],
    channel_count: usize,
    input_rate_hz: u32,
    output: &mut [i16],
    output_rate_hz: u32,
) -> usize {
    if channel_count == 0 {
        return 0;
    }
    let resampler = NearestResampler::new(input_rate_hz, output_rate_hz);
    let input_frames = input.len() / channel_count;
    let output_frames = resampler.output_len(input_frames).min(output.len() / channel_count);

    for (output_index, output_frame) in output
        .chunks_exact_mut(channel_count)
        .take(output_frames)
        .enumerate()
    {
        let input_start = resampler.source_index(output_index) * channel_count;
        output_frame.copy_from_slice(&input[input_start..input_start + channel_count]);
    }
    output_frames * channel_count
}
