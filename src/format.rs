//! Output audio format shared by the hardware channel and every waveform source.

use crate::{Error, Result};

/// Bit depth of every sample in the pipeline (signed, interleaved).
pub const BITS_PER_SAMPLE: u32 = 16;

/// Sample rates the output channel can be configured for.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleRate {
    /// 44.1 kHz (CD rate).
    Hz44100,
    /// 48 kHz.
    #[default]
    Hz48000,
}

impl SampleRate {
    /// Rate in hertz.
    #[must_use]
    pub const fn hz(self) -> u32 {
        match self {
            Self::Hz44100 => 44_100,
            Self::Hz48000 => 48_000,
        }
    }

    /// Maps a rate in hertz onto a supported rate.
    pub const fn from_hz(sample_rate_hz: u32) -> Result<Self> {
        match sample_rate_hz {
            44_100 => Ok(Self::Hz44100),
            48_000 => Ok(Self::Hz48000),
            _ => Err(Error::UnsupportedFormat),
        }
    }
}

/// Interleaved channel layout of the output stream.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channels {
    /// One channel.
    Mono,
    /// Two interleaved channels, left first.
    #[default]
    Stereo,
}

impl Channels {
    /// Number of interleaved samples per frame.
    #[must_use]
    pub const fn count(self) -> usize {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
        }
    }

    /// Maps a channel count onto a supported layout.
    pub const fn from_count(channel_count: u16) -> Result<Self> {
        match channel_count {
            1 => Ok(Self::Mono),
            2 => Ok(Self::Stereo),
            _ => Err(Error::UnsupportedFormat),
        }
    }
}

/// Format of the PCM stream written into the ping-pong buffer.
///
/// Samples are always 16-bit signed and interleaved ([`BITS_PER_SAMPLE`]).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AudioFormat {
    /// Output sample rate.
    pub sample_rate: SampleRate,
    /// Output channel layout.
    pub channels: Channels,
}

impl AudioFormat {
    /// 48 kHz interleaved stereo.
    pub const STEREO_48K: Self = Self::from_parts(SampleRate::Hz48000, Channels::Stereo);
    /// 44.1 kHz interleaved stereo.
    pub const STEREO_44K1: Self = Self::from_parts(SampleRate::Hz44100, Channels::Stereo);

    /// Creates a format from already-validated parts.
    #[must_use]
    pub const fn from_parts(sample_rate: SampleRate, channels: Channels) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Creates a format from raw values, rejecting anything the output cannot play.
    pub const fn new(sample_rate_hz: u32, channel_count: u16) -> Result<Self> {
        let sample_rate = match SampleRate::from_hz(sample_rate_hz) {
            Ok(sample_rate) => sample_rate,
            Err(error) => return Err(error),
        };
        let channels = match Channels::from_count(channel_count) {
            Ok(channels) => channels,
            Err(error) => return Err(error),
        };
        Ok(Self::from_parts(sample_rate, channels))
    }

    /// Output rate in hertz.
    #[must_use]
    pub const fn sample_rate_hz(&self) -> u32 {
        self.sample_rate.hz()
    }

    /// Interleaved samples per frame.
    #[must_use]
    pub const fn channel_count(&self) -> usize {
        self.channels.count()
    }

    /// Interleaved samples needed to hold `chunk_frames` frames.
    #[must_use]
    pub const fn samples_per_chunk(&self, chunk_frames: usize) -> usize {
        chunk_frames * self.channel_count()
    }

    /// Playback time of one chunk in microseconds.
    ///
    /// This is the deadline a refill must meet before the hardware drains the
    /// opposite half.
    #[must_use]
    pub const fn chunk_duration_us(&self, chunk_frames: usize) -> u64 {
        (chunk_frames as u64 * 1_000_000) / self.sample_rate_hz() as u64
    }
}
