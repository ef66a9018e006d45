#![doc = include_str!("../README.md")]
//!
//! # Glossary
//!
//! - **Ping-pong buffer:** two halves; hardware drains one while the refill
//!   worker writes the other, swapping every notification.
//! - **Chunk:** the samples one refill writes, exactly one buffer half.
//! - **Frame:** the smallest independently decodable unit of a compressed stream.
//!   (Also used for one sample per channel; context tells which.)
//! - **Underrun:** a refill that finished after the hardware needed its half.
#![cfg_attr(target_os = "none", no_std)]

// Must come first so the logging macros are visible in every module.
mod fmt;

pub mod codec;
mod error;
pub mod format;
pub mod ping_pong;
pub mod playback;
pub mod resample;
pub mod source;
pub mod stream_decoder;
pub mod tone;
pub mod wav;

// Re-export error types and result (used throughout)
pub use crate::error::{Error, Result};
pub use crate::format::{AudioFormat, Channels, SampleRate};
pub use crate::ping_pong::{Half, PingPongBuffer};
pub use crate::playback::{OutputChannel, PlaybackSession, PlaybackState, PlaybackStatic, StreamConfig};
pub use crate::source::{AtEnd, Refill, Source, WaveformSource};
pub use crate::stream_decoder::StreamDecoder;
pub use crate::tone::ToneGenerator;
