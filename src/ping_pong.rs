//! Two-half sample buffer shared between the refill path and the hardware
//! transfer.
//!
//! At most one half is in flight (being read by hardware). The refill path only
//! ever gets a `&mut` view of the other half, so the two roles cannot overlap.

use core::ptr::NonNull;

use crate::source::{Refill, WaveformSource};
use crate::{Error, Result};

/// One half of a [`PingPongBuffer`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Half {
    /// `[0, half_len)`.
    A,
    /// `[half_len, 2 * half_len)`.
    B,
}

impl Half {
    /// The opposite half.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Ping-pong buffer over caller-provided memory.
///
/// The memory is allocated once for the largest chunk the application needs;
/// [`configure`](Self::configure) selects how much of it a session uses.
pub struct PingPongBuffer<'b> {
    samples: &'b mut [i16],
    half_len: usize,
    in_flight: Option<Half>,
}

impl<'b> PingPongBuffer<'b> {
    /// Wraps `samples`, split into two equal halves.
    #[must_use]
    pub fn new(samples: &'b mut [i16]) -> Self {
        let half_len = samples.len() / 2;
        Self {
            samples,
            half_len,
            in_flight: None,
        }
    }

    /// Samples available for both halves together.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    /// Samples per half in the current configuration.
    #[must_use]
    pub const fn half_len(&self) -> usize {
        self.half_len
    }

    /// Sets the half length in samples and marks both halves idle.
    pub fn configure(&mut self, half_len: usize) -> Result<()> {
        if half_len == 0 || half_len > self.samples.len() / 2 {
            return Err(Error::InvalidParam);
        }
        self.half_len = half_len;
        self.in_flight = None;
        Ok(())
    }

    /// Fills both halves, A then B, before any transfer starts.
    ///
    /// Returns the half that holds the end of the stream, if the source ran
    /// out. If it ran out in A, B is silenced instead of refilled.
    pub fn prefill<S: WaveformSource + ?Sized>(&mut self, source: &mut S) -> Result<Option<Half>> {
        if self.in_flight.is_some() {
            return Err(Error::InvalidState);
        }
        let format = source.format();
        let chunk_matches = source
            .chunk_frames()
            .is_none_or(|chunk_frames| format.samples_per_chunk(chunk_frames) == self.half_len);
        if !chunk_matches || self.half_len % format.channel_count() != 0 {
            return Err(Error::InvalidParam);
        }

        let (half_a, half_b) = self.samples[..self.half_len * 2].split_at_mut(self.half_len);
        if source.refill(half_a)? == Refill::Exhausted {
            half_b.fill(0);
            return Ok(Some(Half::A));
        }
        Ok((source.refill(half_b)? == Refill::Exhausted).then_some(Half::B))
    }

    /// Hands `began` to the hardware; the other half becomes fillable.
    pub fn begin(&mut self, began: Half) {
        self.in_flight = Some(began);
    }

    /// Half currently owned by the hardware.
    #[must_use]
    pub const fn in_flight(&self) -> Option<Half> {
        self.in_flight
    }

    /// Half the refill path may write, once a transfer is running.
    #[must_use]
    pub fn fillable(&self) -> Option<Half> {
        self.in_flight.map(Half::other)
    }

    /// Splits into the in-flight half (read-only) and the fillable half.
    pub fn split(&mut self) -> Result<(&[i16], &mut [i16])> {
        let in_flight = self.in_flight.ok_or(Error::InvalidState)?;
        let (half_a, half_b) = self.samples[..self.half_len * 2].split_at_mut(self.half_len);
        Ok(match in_flight {
            Half::A => (&*half_a, half_b),
            Half::B => (&*half_b, half_a),
        })
    }

    /// Records that `began` is now draining and refills the other half.
    pub fn refill<S: WaveformSource + ?Sized>(&mut self, began: Half, source: &mut S) -> Result<Refill> {
        self.begin(began);
        let (_in_flight, fillable) = self.split()?;
        source.refill(fillable)
    }

    /// Writes silence into the fillable half.
    pub fn silence_fillable(&mut self) -> Result<()> {
        let (_in_flight, fillable) = self.split()?;
        fillable.fill(0);
        Ok(())
    }

    /// Read-only view of one half.
    #[must_use]
    pub fn half(&self, half: Half) -> &[i16] {
        match half {
            Half::A => &self.samples[..self.half_len],
            Half::B => &self.samples[self.half_len..self.half_len * 2],
        }
    }

    /// Both halves as one region, for handing to a circular transfer.
    ///
    /// The pointer stays valid for as long as this buffer is borrowed.
    pub fn dma_region(&mut self) -> NonNull<[i16]> {
        NonNull::from(&mut self.samples[..self.half_len * 2])
    }

    /// Marks both halves idle; the hardware no longer reads either.
    pub fn release(&mut self) {
        self.in_flight = None;
    }
}
