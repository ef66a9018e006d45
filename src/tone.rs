//! Phase-accumulator sine synthesis for the tone waveform source.
//!
//! See [`ToneGenerator`].

use core::f32::consts::TAU;

use crate::format::AudioFormat;
use crate::source::{Refill, WaveformSource};
use crate::{AtEnd, Result};

/// Frequency used when a requested frequency is out of range.
pub const DEFAULT_FREQUENCY_HZ: f32 = 100.0;
/// Highest accepted tone frequency.
pub const MAX_FREQUENCY_HZ: f32 = 1_000.0;
/// Sampling frequency used when the given one is not positive.
pub const DEFAULT_SAMPLING_FREQUENCY_HZ: f32 = 48_000.0;
/// Full-scale amplitude.
pub const FULL_SCALE: i16 = i16::MAX;

/// Returns the per-sample phase step for a tone, after validating both inputs.
///
/// Frequencies `<= 0` or above [`MAX_FREQUENCY_HZ`] become [`DEFAULT_FREQUENCY_HZ`];
/// a sampling frequency `<= 0` becomes [`DEFAULT_SAMPLING_FREQUENCY_HZ`].
#[must_use]
pub fn phase_increment(frequency_hz: f32, sampling_frequency_hz: f32) -> f32 {
    TAU * validated_frequency(frequency_hz) / validated_sampling_frequency(sampling_frequency_hz)
}

fn validated_frequency(frequency_hz: f32) -> f32 {
    // NaN fails both comparisons, so test for the accepted range instead.
    if frequency_hz > 0.0 && frequency_hz <= MAX_FREQUENCY_HZ {
        frequency_hz
    } else {
        DEFAULT_FREQUENCY_HZ
    }
}

fn validated_sampling_frequency(sampling_frequency_hz: f32) -> f32 {
    if sampling_frequency_hz > 0.0 {
        sampling_frequency_hz
    } else {
        DEFAULT_SAMPLING_FREQUENCY_HZ
    }
}

/// Infinite sine tone, identical on every output channel.
///
/// The phase is carried across calls and wrapped by subtracting `2π`, so
/// consecutive chunks join without a discontinuity.
///
/// ```
/// use gapless_audio::format::AudioFormat;
/// use gapless_audio::tone::ToneGenerator;
///
/// let mut tone_generator = ToneGenerator::new(AudioFormat::STEREO_48K, 440.0);
/// let mut half = [0_i16; 256];
/// tone_generator.generate(&mut half);
/// assert!(half.chunks_exact(2).all(|frame| frame[0] == frame[1]));
/// ```
#[derive(Clone, Debug)]
pub struct ToneGenerator {
    format: AudioFormat,
    frequency_hz: f32,
    amplitude: i16,
    phase: f32,
    phase_inc: f32,
}

impl ToneGenerator {
    /// Creates a full-scale tone at `frequency_hz` for `format`.
    #[must_use]
    pub fn new(format: AudioFormat, frequency_hz: f32) -> Self {
        let frequency_hz = validated_frequency(frequency_hz);
        Self {
            format,
            frequency_hz,
            amplitude: FULL_SCALE,
            phase: 0.0,
            phase_inc: phase_increment(frequency_hz, format.sample_rate_hz() as f32),
        }
    }

    /// Sets the peak amplitude (negative values are treated as their magnitude).
    #[must_use]
    pub fn with_amplitude(mut self, amplitude: i16) -> Self {
        self.amplitude = amplitude.saturating_abs();
        self
    }

    /// Retunes the tone without resetting its phase.
    pub fn set_frequency(&mut self, frequency_hz: f32) {
        self.frequency_hz = validated_frequency(frequency_hz);
        self.phase_inc = phase_increment(self.frequency_hz, self.format.sample_rate_hz() as f32);
        debug!("tone retuned: phase_inc={}", self.phase_inc);
    }

    /// Frequency actually in use after validation.
    #[must_use]
    pub fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    /// Current phase in radians, always in `[0, 2π)`.
    #[must_use]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Per-sample phase step in radians.
    #[must_use]
    pub fn phase_inc(&self) -> f32 {
        self.phase_inc
    }

    /// Restarts the tone at phase zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Fills `half` with whole interleaved frames of the tone.
    ///
    /// An empty slice is a no-op; a trailing partial frame is left untouched.
    pub fn generate(&mut self, half: &mut [i16]) {
        let amplitude = f32::from(self.amplitude);
        for frame in half.chunks_exact_mut(self.format.channel_count()) {
            let sample_i16 = (libm::sinf(self.phase) * amplitude) as i16;
            frame.fill(sample_i16);

            self.phase += self.phase_inc;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
    }
}

impl WaveformSource for ToneGenerator {
    fn format(&self) -> AudioFormat {
        self.format
    }

    fn chunk_frames(&self) -> Option<usize> {
        None
    }

    fn refill(&mut self, half: &mut [i16]) -> Result<Refill> {
        self.generate(half);
        Ok(Refill::Filled)
    }

    fn rewind(&mut self) -> Result<()> {
        self.reset();
        Ok(())
    }

    fn set_at_end(&mut self, _at_end: AtEnd) {}
}
