//! Chunked frame decoding for compressed streams.
//!
//! See [`StreamDecoder`] for usage.

use heapless::Vec;

use crate::codec::{DecodedFrame, FrameCodec, MAX_FRAME_SAMPLES, WavCodec};
use crate::format::{AudioFormat, Channels};
use crate::ping_pong::Half;
use crate::resample::NearestResampler;
use crate::source::{AtEnd, Refill, WaveformSource};
use crate::wav::WavFile;
use crate::{Error, Result};

/// Lifecycle of a [`StreamDecoder`].
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecoderState {
    /// No stream loaded.
    #[default]
    Idle,
    /// A stream is loaded and positioned at its start.
    Ready,
    /// At least one chunk has been produced.
    Playing,
    /// The stream ended with looping disabled.
    Finished,
    /// The codec failed or a looped pass held no decodable frame.
    Error,
}

/// Properties of the loaded stream, taken from its first decodable frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamInfo {
    /// Encoded sample rate.
    pub input_sample_rate_hz: u32,
    /// Encoded channel layout.
    pub input_channels: Channels,
    /// Nominal bitrate of the first frame.
    pub bitrate_kbps: u32,
    /// Format of the samples the decoder writes.
    pub output: AudioFormat,
}

/// Counters accumulated since the last [`StreamDecoder::load`] or
/// [`StreamDecoder::reset`].
///
/// Looping never resets them; they saturate instead of wrapping.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DecoderStats {
    /// Frames decoded successfully.
    pub frames_decoded: u32,
    /// Output frames written into chunks, silence padding excluded.
    pub output_frames: u64,
    /// Bytes skipped while resynchronizing past corrupt data.
    pub bytes_skipped: u32,
    /// Calls made into the codec.
    pub decode_attempts: u32,
    /// Times the stream restarted from offset zero.
    pub loops: u32,
}

/// Turns an in-memory compressed stream into fixed-length PCM chunks.
///
/// Each call to [`start`](Self::start) or [`next_chunk`](Self::next_chunk)
/// writes exactly `chunk_frames` frames in the output format:
///
/// - Frames that yield no samples are skipped one byte at a time, so
///   resynchronization never takes more decode attempts than there are
///   bytes left.
/// - Mono frames are copied to every output channel; stereo frames feeding a
///   mono output are averaged.
/// - Frames at another sample rate are resampled with
///   [`NearestResampler`].
/// - A decoded frame that does not fit in the current chunk carries over to
///   the next one.
///
/// When the stream runs out mid-chunk, [`AtEnd::Stop`] pads with silence and
/// reports [`Refill::Exhausted`]. [`AtEnd::Loop`] restarts at offset zero and
/// keeps filling the same chunk.
pub struct StreamDecoder<'d, C: FrameCodec> {
    codec: C,
    data: &'d [u8],
    cursor: usize,
    frame: Vec<i16, MAX_FRAME_SAMPLES>,
    frame_channels: Channels,
    frame_resampler: NearestResampler,
    emit_pos: usize,
    emit_len: usize,
    output: AudioFormat,
    chunk_frames: usize,
    at_end: AtEnd,
    info: Option<StreamInfo>,
    stats: DecoderStats,
    state: DecoderState,
    frames_in_pass: u32,
    last_filled: Option<Half>,
}

impl<'d> StreamDecoder<'d, WavCodec> {
    /// Builds a decoder for a parsed WAV file and loads its sample data.
    pub fn from_wav(wav_file: &WavFile<'d>, output: AudioFormat, chunk_frames: usize) -> Result<Self> {
        let mut stream_decoder = Self::new(wav_file.codec()?, output, chunk_frames)?;
        stream_decoder.load(wav_file.data())?;
        Ok(stream_decoder)
    }
}

impl<'d, C: FrameCodec> StreamDecoder<'d, C> {
    /// Creates an idle decoder writing `chunk_frames` frames of `output` per chunk.
    pub fn new(codec: C, output: AudioFormat, chunk_frames: usize) -> Result<Self> {
        if chunk_frames == 0 {
            return Err(Error::InvalidParam);
        }
        Ok(Self {
            codec,
            data: &[],
            cursor: 0,
            frame: Vec::new(),
            frame_channels: Channels::Mono,
            frame_resampler: NearestResampler::new(output.sample_rate_hz(), output.sample_rate_hz()),
            emit_pos: 0,
            emit_len: 0,
            output,
            chunk_frames,
            at_end: AtEnd::default(),
            info: None,
            stats: DecoderStats::default(),
            state: DecoderState::Idle,
            frames_in_pass: 0,
            last_filled: None,
        })
    }

    /// Binds the compressed bytes and rewinds to their start.
    pub fn load(&mut self, data: &'d [u8]) -> Result<()> {
        if data.is_empty() {
            return Err(Error::InvalidParam);
        }
        self.data = data;
        self.info = None;
        self.reset();
        info!("stream loaded: {} bytes", data.len());
        Ok(())
    }

    /// Rewinds to the start of the loaded stream and clears statistics.
    ///
    /// After `reset`, [`start`](Self::start) reproduces its earlier output
    /// exactly. Does nothing when no stream is loaded.
    pub fn reset(&mut self) {
        if self.data.is_empty() {
            return;
        }
        self.restart_pass();
        self.stats = DecoderStats::default();
        self.state = DecoderState::Ready;
        self.last_filled = None;
    }

    /// Decodes the first chunk into `half` (Half A of the ping-pong buffer).
    ///
    /// Fails with [`Error::EndOfFile`] (looping off) or [`Error::Decode`]
    /// (looping on) when the stream holds no decodable frame.
    pub fn start(&mut self, half: &mut [i16]) -> Result<Refill> {
        if self.state == DecoderState::Idle {
            return Err(Error::InvalidState);
        }
        self.check_half_len(half)?;
        if self.state != DecoderState::Ready {
            self.reset();
        }

        let refill = self.fill(half)?;
        if self.frames_in_pass == 0 {
            self.state = DecoderState::Finished;
            warn!("stream holds no decodable frame");
            return Err(Error::EndOfFile);
        }
        self.last_filled = Some(Half::A);
        if self.state == DecoderState::Ready {
            self.state = DecoderState::Playing;
        }
        Ok(refill)
    }

    /// Decodes the next chunk into `half`, the half opposite the one filled last.
    ///
    /// Once the stream has finished, `half` is silenced and
    /// [`Error::EndOfFile`] is returned.
    pub fn next_chunk(&mut self, half: &mut [i16]) -> Result<Refill> {
        self.check_half_len(half)?;
        match self.state {
            DecoderState::Idle | DecoderState::Ready => return Err(Error::InvalidState),
            DecoderState::Finished => {
                half.fill(0);
                return Err(Error::EndOfFile);
            }
            DecoderState::Error => return Err(Error::Decode),
            DecoderState::Playing => {}
        }

        self.last_filled = Some(self.last_filled.map_or(Half::A, Half::other));
        self.fill(half)
    }

    /// Decodes the whole stream from its start into `out`, without looping.
    ///
    /// Returns the number of samples written. Stops early when `out` is full.
    pub fn decode_all(&mut self, out: &mut [i16]) -> Result<usize> {
        if self.state == DecoderState::Idle {
            return Err(Error::InvalidState);
        }
        self.reset();

        let channel_count = self.output.channel_count();
        let total_frames = out.len() / channel_count;
        let mut written_frames = 0;
        while written_frames < total_frames {
            if self.emit_pos < self.emit_len {
                let pending = &mut out[written_frames * channel_count..total_frames * channel_count];
                written_frames += self.emit_into(pending);
            } else if !self.decode_next_frame()? {
                self.state = DecoderState::Finished;
                break;
            }
        }

        if self.state == DecoderState::Finished && self.frames_in_pass == 0 {
            return Err(Error::EndOfFile);
        }
        if self.state == DecoderState::Ready {
            self.state = DecoderState::Playing;
        }
        self.stats.output_frames = self.stats.output_frames.saturating_add(written_frames as u64);
        Ok(written_frames * channel_count)
    }

    /// Changes what happens when the stream runs out.
    pub fn set_at_end(&mut self, at_end: AtEnd) {
        self.at_end = at_end;
    }

    /// Current end-of-stream policy.
    #[must_use]
    pub const fn at_end(&self) -> AtEnd {
        self.at_end
    }

    /// Stream properties, available once a frame has been decoded.
    #[must_use]
    pub const fn info(&self) -> Option<StreamInfo> {
        self.info
    }

    /// Counters since the last load or reset.
    #[must_use]
    pub const fn stats(&self) -> DecoderStats {
        self.stats
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> DecoderState {
        self.state
    }

    /// Byte offset of the next frame.
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Ping-pong half the most recent chunk was written for.
    #[must_use]
    pub const fn last_filled(&self) -> Option<Half> {
        self.last_filled
    }

    fn check_half_len(&self, half: &[i16]) -> Result<()> {
        if half.len() == self.output.samples_per_chunk(self.chunk_frames) {
            Ok(())
        } else {
            Err(Error::InvalidParam)
        }
    }

    fn restart_pass(&mut self) {
        self.cursor = 0;
        self.codec.reset();
        self.frame.clear();
        self.emit_pos = 0;
        self.emit_len = 0;
        self.frames_in_pass = 0;
    }

    fn fill(&mut self, half: &mut [i16]) -> Result<Refill> {
        let channel_count = self.output.channel_count();
        let total_frames = half.len() / channel_count;
        let mut written_frames = 0;

        while written_frames < total_frames {
            if self.emit_pos < self.emit_len {
                written_frames += self.emit_into(&mut half[written_frames * channel_count..]);
                continue;
            }
            if self.decode_next_frame()? {
                continue;
            }

            match self.at_end {
                AtEnd::Stop => {
                    half[written_frames * channel_count..].fill(0);
                    self.stats.output_frames =
                        self.stats.output_frames.saturating_add(written_frames as u64);
                    self.state = DecoderState::Finished;
                    info!("stream ended after {} frames", self.stats.frames_decoded);
                    return Ok(Refill::Exhausted);
                }
                AtEnd::Loop => {
                    if self.frames_in_pass == 0 {
                        self.state = DecoderState::Error;
                        error!("looped pass decoded no frames");
                        return Err(Error::Decode);
                    }
                    self.restart_pass();
                    self.stats.loops = self.stats.loops.saturating_add(1);
                    debug!("stream looped at frame {}", written_frames);
                }
            }
        }

        self.stats.output_frames = self.stats.output_frames.saturating_add(written_frames as u64);
        Ok(Refill::Filled)
    }

    /// Decodes the next frame at the cursor, skipping corrupt bytes.
    /// Returns `false` once the data is exhausted.
    fn decode_next_frame(&mut self) -> Result<bool> {
        let data = self.data;
        let mut skipped_run = 0_u32;
        while self.cursor < data.len() {
            let remaining = &data[self.cursor..];
            self.stats.decode_attempts = self.stats.decode_attempts.saturating_add(1);
            self.frame.resize(MAX_FRAME_SAMPLES, 0).map_err(|()| Error::Decode)?;

            match self.codec.decode_frame(remaining, &mut self.frame) {
                Ok(decoded_frame)
                    if decoded_frame.is_audible()
                        && decoded_frame.bytes_consumed <= remaining.len()
                        && decoded_frame.sample_count() <= MAX_FRAME_SAMPLES =>
                {
                    if skipped_run > 0 {
                        debug!("resynced after skipping {} bytes", skipped_run);
                    }
                    self.cursor += decoded_frame.bytes_consumed;
                    self.begin_frame(&decoded_frame);
                    return Ok(true);
                }
                Ok(_) | Err(Error::NeedMoreData) => {
                    self.cursor += 1;
                    self.stats.bytes_skipped = self.stats.bytes_skipped.saturating_add(1);
                    skipped_run = skipped_run.saturating_add(1);
                }
                Err(error) => {
                    self.state = DecoderState::Error;
                    error!("codec failure at byte {}", self.cursor);
                    return Err(error);
                }
            }
        }
        self.frame.clear();
        if skipped_run > 0 {
            debug!("skipped {} trailing bytes", skipped_run);
        }
        Ok(false)
    }

    fn begin_frame(&mut self, decoded_frame: &DecodedFrame) {
        self.frame.truncate(decoded_frame.sample_count());
        self.frame_channels = decoded_frame.channels;
        self.frame_resampler =
            NearestResampler::new(decoded_frame.sample_rate_hz, self.output.sample_rate_hz());
        self.emit_pos = 0;
        self.emit_len = self.frame_resampler.output_len(decoded_frame.samples_per_channel);
        self.frames_in_pass = self.frames_in_pass.saturating_add(1);
        self.stats.frames_decoded = self.stats.frames_decoded.saturating_add(1);

        if self.info.is_none() {
            info!(
                "stream: {} Hz, {} ch, {} kbps",
                decoded_frame.sample_rate_hz,
                decoded_frame.channels.count(),
                decoded_frame.bitrate_kbps
            );
            self.info = Some(StreamInfo {
                input_sample_rate_hz: decoded_frame.sample_rate_hz,
                input_channels: decoded_frame.channels,
                bitrate_kbps: decoded_frame.bitrate_kbps,
                output: self.output,
            });
        }
    }

    /// Copies pending frames of the current decoded frame into `out` and
    /// returns how many output frames were written.
    fn emit_into(&mut self, out: &mut [i16]) -> usize {
        let output_channels = self.output.channels;
        let frame_channel_count = self.frame_channels.count();
        let frames_to_write = (self.emit_len - self.emit_pos).min(out.len() / output_channels.count());

        for (offset, output_frame) in out
            .chunks_exact_mut(output_channels.count())
            .take(frames_to_write)
            .enumerate()
        {
            let source_start = self.frame_resampler.source_index(self.emit_pos + offset) * frame_channel_count;
            let source_frame = &self.frame[source_start..source_start + frame_channel_count];
            match (self.frame_channels, output_channels) {
                (Channels::Mono, _) => output_frame.fill(source_frame[0]),
                (Channels::Stereo, Channels::Stereo) => output_frame.copy_from_slice(source_frame),
                (Channels::Stereo, Channels::Mono) => {
                    output_frame[0] = ((i32::from(source_frame[0]) + i32::from(source_frame[1])) / 2) as i16;
                }
            }
        }

        self.emit_pos += frames_to_write;
        frames_to_write
    }
}

impl<C: FrameCodec> WaveformSource for StreamDecoder<'_, C> {
    fn format(&self) -> AudioFormat {
        self.output
    }

    fn chunk_frames(&self) -> Option<usize> {
        Some(self.chunk_frames)
    }

    fn refill(&mut self, half: &mut [i16]) -> Result<Refill> {
        if self.state == DecoderState::Ready {
            self.start(half)
        } else {
            self.next_chunk(half)
        }
    }

    fn rewind(&mut self) -> Result<()> {
        if self.state == DecoderState::Idle {
            return Err(Error::InvalidState);
        }
        self.reset();
        Ok(())
    }

    fn set_at_end(&mut self, at_end: AtEnd) {
        self.at_end = at_end;
    }
}

#[cfg(test)]
mod host_tests;
