//! Playback session: output channel configuration, the circular transfer, and
//! the refill worker that answers half-transfer notifications.
//!
//! The hardware notification handler only calls [`PlaybackStatic::notify_half`]
//! (or one of its wrappers), which records the half that began and wakes the
//! worker. All decoding happens in [`PlaybackSession::run`].
//!
//! See [`PlaybackSession`] for the state machine and [`playback_resources!`]
//! for the usual way to allocate the static pieces.

use core::cell::Cell;
use core::ptr::NonNull;

use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::format::AudioFormat;
use crate::ping_pong::{Half, PingPongBuffer};
use crate::source::{AtEnd, Refill, WaveformSource};
use crate::{Error, Result};

/// Default chunk length in frames.
pub const DEFAULT_CHUNK_FRAMES: usize = 1024;

/// Hardware audio transfer engine (I2S, SAI, DAC DMA, ...).
pub trait OutputChannel {
    /// Format the peripheral is configured for, if any.
    fn current_format(&self) -> Option<AudioFormat>;

    /// Fully resets and configures the peripheral for `format`.
    ///
    /// Sample-rate changes are never applied to a running peripheral.
    fn configure(&mut self, format: AudioFormat) -> Result<()>;

    /// Starts a circular transfer that streams `region` until [`Self::stop`].
    ///
    /// The transfer must raise a notification when it crosses the middle of
    /// `region` and another when it wraps. `region` stays valid until `stop`
    /// is called.
    fn start_circular(&mut self, region: NonNull<[i16]>) -> Result<()>;

    /// Halts the transfer.
    fn stop(&mut self) -> Result<()>;
}

/// Where a [`PlaybackSession`] is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackState {
    /// Nothing configured.
    #[default]
    Idle,
    /// Both halves prefilled, transfer not started.
    Armed,
    /// Transfer running.
    Playing,
    /// Clean end: the stream finished or playback was stopped.
    Stopped,
    /// Configuration, transfer, or decoder failure.
    Faulted,
}

impl PlaybackState {
    /// `Stopped` or `Faulted`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Stopped | Self::Faulted)
    }
}

/// Runtime parameters of one playback session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamConfig {
    /// Format written into the ping-pong buffer and sent to the hardware.
    pub output: AudioFormat,
    /// Frames per chunk (per buffer half).
    pub chunk_frames: usize,
    /// End-of-stream policy applied to the source.
    pub at_end: AtEnd,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            output: AudioFormat::STEREO_48K,
            chunk_frames: DEFAULT_CHUNK_FRAMES,
            at_end: AtEnd::Stop,
        }
    }
}

impl StreamConfig {
    /// Samples in one buffer half.
    #[must_use]
    pub const fn half_len(&self) -> usize {
        self.output.samples_per_chunk(self.chunk_frames)
    }

    /// Samples the ping-pong buffer must hold.
    #[must_use]
    pub const fn buffer_len(&self) -> usize {
        self.half_len() * 2
    }
}

/// Commands delivered to the refill worker between notifications.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackCommand {
    /// Change the end-of-stream policy.
    SetAtEnd(AtEnd),
    /// Stop the transfer now.
    Stop,
}

/// Static resources shared between the notification handler, application code,
/// and the refill worker.
pub struct PlaybackStatic {
    refill_signal: Signal<CriticalSectionRawMutex, Half>,
    command_signal: Signal<CriticalSectionRawMutex, PlaybackCommand>,
    missed_notifications: Mutex<CriticalSectionRawMutex, Cell<u32>>,
}

impl PlaybackStatic {
    /// Creates static resources for one session.
    #[must_use]
    pub const fn new_static() -> Self {
        Self {
            refill_signal: Signal::new(),
            command_signal: Signal::new(),
            missed_notifications: Mutex::new(Cell::new(0)),
        }
    }

    /// Records that `began` started draining and wakes the worker.
    ///
    /// Safe to call from interrupt context. If the previous notification was
    /// never serviced, the refill it asked for is lost and counted as missed.
    pub fn notify_half(&self, began: Half) {
        if self.refill_signal.signaled() {
            self.missed_notifications.lock(|missed_notifications| {
                missed_notifications.set(missed_notifications.get().saturating_add(1));
            });
            warn!("refill notification missed");
        }
        self.refill_signal.signal(began);
    }

    /// Half-transfer-complete handler: Half A drained, Half B began.
    pub fn on_half_transfer_complete(&self) {
        self.notify_half(Half::B);
    }

    /// Transfer-complete handler: Half B drained, the transfer wrapped to Half A.
    pub fn on_transfer_complete(&self) {
        self.notify_half(Half::A);
    }

    /// Changes the end-of-stream policy of the running session.
    pub fn set_at_end(&self, at_end: AtEnd) {
        self.command_signal.signal(PlaybackCommand::SetAtEnd(at_end));
    }

    /// Stops the running session at the next opportunity.
    pub fn stop(&self) {
        self.command_signal.signal(PlaybackCommand::Stop);
    }

    /// Notifications that arrived while the previous one was still pending.
    #[must_use]
    pub fn missed_notifications(&self) -> u32 {
        self.missed_notifications.lock(Cell::get)
    }

    /// A notification is waiting for the worker.
    #[must_use]
    pub fn refill_pending(&self) -> bool {
        self.refill_signal.signaled()
    }

    /// A command is waiting for the worker.
    #[must_use]
    pub fn command_pending(&self) -> bool {
        self.command_signal.signaled()
    }

    /// Takes a pending notification without waiting.
    pub fn try_take_refill(&self) -> Option<Half> {
        self.refill_signal.try_take()
    }

    /// Waits for the next notification.
    pub async fn wait_refill(&self) -> Half {
        self.refill_signal.wait().await
    }

    async fn wait_command(&self) -> PlaybackCommand {
        self.command_signal.wait().await
    }

    fn clear_refill(&self) {
        self.refill_signal.reset();
    }
}

/// Drives one output channel from one waveform source through a ping-pong
/// buffer.
///
/// ```text
/// Idle --init--> Armed --start--> Playing --end of stream / stop--> Stopped
///   \              \                 \
///    +--------------+-----------------+--config/transfer/decode error--> Faulted
/// ```
///
/// With [`AtEnd::Stop`], the half holding the last audio plays out, the other
/// half is silenced, and the transfer stops on the following notification.
/// A new [`init`](Self::init) is accepted from any state except `Playing`.
pub struct PlaybackSession<'b, O: OutputChannel, S: WaveformSource> {
    output: O,
    buffer: PingPongBuffer<'b>,
    source: Option<S>,
    state: PlaybackState,
    ending: Option<Half>,
}

impl<'b, O: OutputChannel, S: WaveformSource> PlaybackSession<'b, O, S> {
    /// Creates an idle session over `buffer`.
    #[must_use]
    pub const fn new(output: O, buffer: PingPongBuffer<'b>) -> Self {
        Self {
            output,
            buffer,
            source: None,
            state: PlaybackState::Idle,
            ending: None,
        }
    }

    /// Takes ownership of `source`, configures the hardware for `format` when
    /// it differs, and prefills both halves.
    ///
    /// Sources with a fixed chunk length size the buffer halves; tones keep the
    /// current half length.
    pub fn init(&mut self, mut source: S, format: AudioFormat) -> Result<()> {
        if self.state == PlaybackState::Playing {
            return Err(Error::InvalidState);
        }
        if source.format() != format {
            return Err(Error::InvalidParam);
        }
        if let Some(chunk_frames) = source.chunk_frames() {
            self.buffer.configure(format.samples_per_chunk(chunk_frames))?;
        } else {
            self.buffer.release();
        }
        self.source = None;
        self.ending = None;

        if self.output.current_format() != Some(format) {
            info!(
                "output reconfigure: {} Hz, {} ch",
                format.sample_rate_hz(),
                format.channel_count()
            );
            if self.output.configure(format).is_err() {
                self.fault();
                return Err(Error::HardwareConfig);
            }
        }

        match self.buffer.prefill(&mut source) {
            Ok(ending) => self.ending = ending,
            Err(error) => {
                self.fault();
                return Err(error);
            }
        }

        self.source = Some(source);
        self.set_state(PlaybackState::Armed);
        Ok(())
    }

    /// Like [`init`](Self::init), first applying `config` to the buffer and
    /// the source's end-of-stream policy.
    pub fn init_with_config(&mut self, mut source: S, config: &StreamConfig) -> Result<()> {
        if self.state == PlaybackState::Playing {
            return Err(Error::InvalidState);
        }
        if source.chunk_frames().is_some_and(|chunk_frames| chunk_frames != config.chunk_frames) {
            return Err(Error::InvalidParam);
        }
        self.buffer.configure(config.half_len())?;
        source.set_at_end(config.at_end);
        self.init(source, config.output)
    }

    /// Starts the circular transfer over the whole buffer, Half A first.
    pub fn start(&mut self) -> Result<()> {
        if self.state != PlaybackState::Armed {
            return Err(Error::InvalidState);
        }
        let dma_region = self.buffer.dma_region();
        if let Err(error) = self.output.start_circular(dma_region) {
            self.fault();
            return Err(error);
        }
        self.buffer.begin(Half::A);
        self.set_state(PlaybackState::Playing);
        Ok(())
    }

    /// Services one notification: `began` is the half the hardware just started
    /// reading. Refills the other half, or winds down at end of stream.
    ///
    /// Notifications after the session stopped are ignored.
    pub fn handle_notification(&mut self, began: Half) -> Result<PlaybackState> {
        match self.state {
            PlaybackState::Playing => {}
            PlaybackState::Stopped => return Ok(PlaybackState::Stopped),
            _ => return Err(Error::InvalidState),
        }

        if let Some(last_half) = self.ending {
            if began == last_half {
                self.buffer.begin(began);
                self.buffer.silence_fillable()?;
            } else {
                info!("end of stream: stopping output");
                self.stop()?;
            }
            return Ok(self.state);
        }

        let Some(source) = self.source.as_mut() else {
            return Err(Error::InvalidState);
        };
        match self.buffer.refill(began, source) {
            Ok(Refill::Filled) => {}
            Ok(Refill::Exhausted) => self.ending = Some(began.other()),
            Err(Error::EndOfFile) => {
                info!("end of stream: stopping output");
                self.stop()?;
            }
            Err(error) => {
                error!("refill failed: {:?}", error);
                // The source error matters more than a failure to stop.
                let _ = self.output.stop();
                self.buffer.release();
                self.fault();
                return Err(error);
            }
        }
        Ok(self.state)
    }

    /// Halts the transfer. Both halves keep their last-written samples.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => {
                let stop_result = self.output.stop();
                self.buffer.release();
                if let Err(error) = stop_result {
                    self.fault();
                    return Err(error);
                }
                self.set_state(PlaybackState::Stopped);
            }
            PlaybackState::Armed => self.set_state(PlaybackState::Stopped),
            PlaybackState::Idle | PlaybackState::Stopped | PlaybackState::Faulted => {}
        }
        Ok(())
    }

    /// Changes the end-of-stream policy of the current source.
    pub fn set_at_end(&mut self, at_end: AtEnd) {
        if let Some(source) = self.source.as_mut() {
            source.set_at_end(at_end);
        }
    }

    /// Runs the refill worker until the session stops or faults.
    ///
    /// Starts the transfer first if the session is armed.
    pub async fn run(&mut self, playback_static: &PlaybackStatic) -> Result<PlaybackState> {
        if self.state == PlaybackState::Armed {
            playback_static.clear_refill();
            self.start()?;
        }
        if self.state != PlaybackState::Playing {
            return Err(Error::InvalidState);
        }

        while self.state == PlaybackState::Playing {
            match select(playback_static.wait_refill(), playback_static.wait_command()).await {
                Either::First(began) => {
                    self.handle_notification(began)?;
                }
                Either::Second(PlaybackCommand::SetAtEnd(at_end)) => self.set_at_end(at_end),
                Either::Second(PlaybackCommand::Stop) => self.stop()?,
            }
        }
        Ok(self.state)
    }

    /// Lifecycle state.
    #[must_use]
    pub const fn state(&self) -> PlaybackState {
        self.state
    }

    /// The ping-pong buffer.
    #[must_use]
    pub const fn buffer(&self) -> &PingPongBuffer<'b> {
        &self.buffer
    }

    /// The output channel.
    #[must_use]
    pub const fn output(&self) -> &O {
        &self.output
    }

    /// The current source, if one has been accepted by `init`.
    #[must_use]
    pub const fn source(&self) -> Option<&S> {
        self.source.as_ref()
    }

    /// Gives the source back, leaving the session idle.
    pub fn take_source(&mut self) -> Result<Option<S>> {
        self.stop()?;
        self.state = PlaybackState::Idle;
        self.ending = None;
        Ok(self.source.take())
    }

    fn fault(&mut self) {
        self.set_state(PlaybackState::Faulted);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("playback state {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}

impl<O: OutputChannel, S: WaveformSource> Drop for PlaybackSession<'_, O, S> {
    fn drop(&mut self) {
        // The transfer must not outlive the borrowed buffer.
        if self.state == PlaybackState::Playing {
            let _ = self.output.stop();
        }
    }
}

#[doc(hidden)]
pub use paste;
#[doc(hidden)]
pub use static_cell;

/// Declares the static resources one playback session needs.
///
/// `playback_resources!(Speaker, samples: 4096)` creates a unit struct
/// `Speaker` with:
/// - `Speaker::playback_static()`: the `&'static PlaybackStatic` the
///   notification handlers and the worker share.
/// - `Speaker::take_buffer()`: a [`PingPongBuffer`] over a `'static` array of
///   `samples` samples, returned once.
///
/// Size `samples` for the largest chunk the application will request
/// ([`StreamConfig::buffer_len`]).
#[macro_export]
macro_rules! playback_resources {
    ($vis:vis $name:ident, samples: $samples:expr $(,)?) => {
        $crate::playback::paste::paste! {
            static [<$name:upper _PLAYBACK_STATIC>]: $crate::playback::PlaybackStatic =
                $crate::playback::PlaybackStatic::new_static();
            static [<$name:upper _PING_PONG_CELL>]: $crate::playback::static_cell::StaticCell<[i16; $samples]> =
                $crate::playback::static_cell::StaticCell::new();

            $vis struct $name;

            impl $name {
                /// Samples in the ping-pong buffer.
                pub const BUFFER_SAMPLES: usize = $samples;

                /// Signals shared by the notification handlers and the worker.
                #[must_use]
                pub fn playback_static() -> &'static $crate::playback::PlaybackStatic {
                    &[<$name:upper _PLAYBACK_STATIC>]
                }

                /// The ping-pong buffer; `None` after the first call.
                #[must_use]
                pub fn take_buffer() -> Option<$crate::ping_pong::PingPongBuffer<'static>> {
                    [<$name:upper _PING_PONG_CELL>]
                        .try_init([0; $samples])
                        .map(|samples| $crate::ping_pong::PingPongBuffer::new(samples))
                }
            }
        }
    };
}

pub use playback_resources;
