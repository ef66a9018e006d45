#![allow(missing_docs)]

use super::{DecoderState, StreamDecoder};
use crate::Error;
use crate::codec::{AdpcmCodec, PcmCodec};
use crate::format::{AudioFormat, Channels, SampleRate};
use crate::ping_pong::Half;
use crate::source::{AtEnd, Refill, WaveformSource};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const MONO_48K: AudioFormat = AudioFormat::from_parts(SampleRate::Hz48000, Channels::Mono);
const ADPCM_BLOCK_ALIGN: usize = 256;
const ADPCM_SAMPLES_PER_BLOCK: usize = 505;

fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|sample| sample.to_le_bytes()).collect()
}

fn adpcm_block(predictor: i16, step_index: u8, nibble_byte: u8) -> Vec<u8> {
    let mut block = Vec::with_capacity(ADPCM_BLOCK_ALIGN);
    block.extend_from_slice(&predictor.to_le_bytes());
    block.extend_from_slice(&[step_index, 0]);
    block.resize(ADPCM_BLOCK_ALIGN, nibble_byte);
    block
}

/// Three valid IMA ADPCM blocks followed by `corrupt_len` bytes no offset of
/// which parses as a block header.
fn adpcm_stream(corrupt_len: usize) -> Vec<u8> {
    let mut bytes = adpcm_block(1_000, 10, 0x17);
    bytes.extend(adpcm_block(-2_000, 20, 0x9A));
    bytes.extend(adpcm_block(3_000, 30, 0x35));
    bytes.resize(bytes.len() + corrupt_len, 0xFF);
    bytes
}

#[test]
fn start_yields_exactly_one_chunk_at_each_supported_rate() -> TestResult {
    const CHUNK_FRAMES: usize = 1024;
    for sample_rate in [SampleRate::Hz44100, SampleRate::Hz48000] {
        let output = AudioFormat::from_parts(sample_rate, Channels::Stereo);
        let samples: Vec<i16> = (0..6_000).map(|n| (n % 1_000) as i16).collect();
        let data = pcm_bytes(&samples);
        let pcm_codec = PcmCodec::new(sample_rate.hz(), Channels::Stereo, 576)?;
        let mut stream_decoder = StreamDecoder::new(pcm_codec, output, CHUNK_FRAMES)?;
        stream_decoder.load(&data)?;

        let mut half = vec![0_i16; CHUNK_FRAMES * 2];
        assert_eq!(stream_decoder.start(&mut half)?, Refill::Filled);
        assert_eq!(stream_decoder.stats().output_frames, CHUNK_FRAMES as u64);
        assert_eq!(&half[..], &samples[..CHUNK_FRAMES * 2]);
        assert_eq!(stream_decoder.state(), DecoderState::Playing);
    }
    Ok(())
}

#[test]
fn exhausted_chunk_is_padded_with_zeros() -> TestResult {
    let samples: Vec<i16> = (1..=100).collect();
    let data = pcm_bytes(&samples);
    let mut stream_decoder = StreamDecoder::new(PcmCodec::new(48_000, Channels::Mono, 32)?, MONO_48K, 64)?;
    stream_decoder.load(&data)?;
    let mut half = [7_i16; 64];

    assert_eq!(stream_decoder.start(&mut half)?, Refill::Filled);
    assert_eq!(&half[..], &samples[..64]);

    assert_eq!(stream_decoder.next_chunk(&mut half)?, Refill::Exhausted);
    assert_eq!(&half[..36], &samples[64..]);
    assert!(half[36..].iter().all(|sample| *sample == 0));
    assert_eq!(stream_decoder.state(), DecoderState::Finished);
    assert_eq!(stream_decoder.stats().output_frames, 100);

    half.fill(7);
    assert_eq!(stream_decoder.next_chunk(&mut half), Err(Error::EndOfFile));
    assert!(half.iter().all(|sample| *sample == 0));
    Ok(())
}

#[test]
fn reset_then_start_reproduces_the_first_chunk() -> TestResult {
    let data = adpcm_stream(0);
    let adpcm_codec = AdpcmCodec::new(48_000, ADPCM_BLOCK_ALIGN)?;
    let mut stream_decoder = StreamDecoder::new(adpcm_codec, AudioFormat::STEREO_48K, 1024)?;
    stream_decoder.load(&data)?;
    stream_decoder.set_at_end(AtEnd::Loop);

    let mut first_chunk = vec![0_i16; 2048];
    stream_decoder.start(&mut first_chunk)?;
    let mut half = vec![0_i16; 2048];
    stream_decoder.next_chunk(&mut half)?;
    stream_decoder.next_chunk(&mut half)?;
    assert_eq!(stream_decoder.last_filled(), Some(Half::A));

    stream_decoder.reset();
    assert_eq!(stream_decoder.state(), DecoderState::Ready);
    assert_eq!(stream_decoder.cursor(), 0);
    let mut replayed_chunk = vec![0_i16; 2048];
    stream_decoder.start(&mut replayed_chunk)?;
    assert_eq!(replayed_chunk, first_chunk);
    Ok(())
}

#[test]
fn looped_frame_aligned_stream_repeats_chunk_for_chunk() -> TestResult {
    let samples: Vec<i16> = (0..256).map(|n| n * 3 + 1).collect();
    let data = pcm_bytes(&samples);
    let pcm_codec = PcmCodec::new(48_000, Channels::Mono, 64)?;
    let mut stream_decoder = StreamDecoder::new(pcm_codec, AudioFormat::STEREO_48K, 128)?;
    stream_decoder.load(&data)?;
    stream_decoder.set_at_end(AtEnd::Loop);

    let mut chunks = Vec::new();
    for chunk_index in 0..8 {
        let mut half = vec![0_i16; 256];
        let refill = if chunk_index == 0 {
            stream_decoder.start(&mut half)?
        } else {
            stream_decoder.next_chunk(&mut half)?
        };
        assert_eq!(refill, Refill::Filled);
        chunks.push(half);
    }

    for (chunk_index, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk, &chunks[chunk_index % 2], "chunk {chunk_index}");
    }
    for (frame_index, frame) in chunks[1].chunks_exact(2).enumerate() {
        assert_eq!(frame, &[samples[128 + frame_index]; 2]);
    }
    assert_eq!(stream_decoder.stats().loops, 3);
    Ok(())
}

#[test]
fn loop_boundary_can_fall_inside_a_chunk() -> TestResult {
    let data = pcm_bytes(&[1, 2, 3]);
    let mut stream_decoder = StreamDecoder::new(PcmCodec::new(48_000, Channels::Mono, 3)?, MONO_48K, 8)?;
    stream_decoder.load(&data)?;
    stream_decoder.set_at_end(AtEnd::Loop);

    let mut half = [0_i16; 8];
    assert_eq!(stream_decoder.start(&mut half)?, Refill::Filled);
    assert_eq!(half, [1, 2, 3, 1, 2, 3, 1, 2]);
    assert_eq!(stream_decoder.next_chunk(&mut half)?, Refill::Filled);
    assert_eq!(half, [3, 1, 2, 3, 1, 2, 3, 1]);
    assert_eq!(stream_decoder.stats().loops, 5);

    // Turning looping off mid-stream ends at the next exhaustion.
    stream_decoder.set_at_end(AtEnd::Stop);
    assert_eq!(stream_decoder.next_chunk(&mut half)?, Refill::Exhausted);
    assert_eq!(half, [2, 3, 0, 0, 0, 0, 0, 0]);
    Ok(())
}

#[test]
fn corrupt_tail_is_skipped_and_looped_without_errors() -> TestResult {
    const CORRUPT_LEN: usize = 300;
    let data = adpcm_stream(CORRUPT_LEN);
    let adpcm_codec = AdpcmCodec::new(48_000, ADPCM_BLOCK_ALIGN)?;
    let mut stream_decoder = StreamDecoder::new(adpcm_codec, AudioFormat::STEREO_48K, 1024)?;
    stream_decoder.load(&data)?;
    stream_decoder.set_at_end(AtEnd::Loop);

    let mut half = vec![0_i16; 2048];
    assert_eq!(stream_decoder.start(&mut half)?, Refill::Filled);
    assert_eq!(half[0], 1_000);
    assert!(half.chunks_exact(2).all(|frame| frame[0] == frame[1]));
    assert_eq!(stream_decoder.stats().frames_decoded, 3);

    for _ in 0..20 {
        assert_eq!(stream_decoder.next_chunk(&mut half)?, Refill::Filled);
    }

    // 21 chunks of 1024 frames cover 14 full passes of 3 * 505 frames.
    let stats = stream_decoder.stats();
    assert_eq!(3 * ADPCM_SAMPLES_PER_BLOCK, 1_515);
    assert_eq!(stats.loops, 14);
    assert_eq!(stats.bytes_skipped, CORRUPT_LEN as u32 * stats.loops);
    assert_eq!(stats.output_frames, 21 * 1024);
    assert_eq!(stream_decoder.state(), DecoderState::Playing);
    Ok(())
}

#[test]
fn long_looped_playback_saturates_statistics() -> TestResult {
    let data = adpcm_stream(300);
    let adpcm_codec = AdpcmCodec::new(48_000, ADPCM_BLOCK_ALIGN)?;
    let mut stream_decoder = StreamDecoder::new(adpcm_codec, AudioFormat::STEREO_48K, 1024)?;
    stream_decoder.load(&data)?;
    stream_decoder.set_at_end(AtEnd::Loop);
    let mut half = vec![0_i16; 2048];
    stream_decoder.start(&mut half)?;

    stream_decoder.stats.decode_attempts = u32::MAX - 10;
    stream_decoder.stats.bytes_skipped = u32::MAX - 10;
    stream_decoder.stats.loops = u32::MAX - 1;
    stream_decoder.stats.frames_decoded = u32::MAX - 2;
    stream_decoder.stats.output_frames = u64::MAX - 5;

    // Five chunks span more than three passes over the corrupt tail.
    for _ in 0..5 {
        assert_eq!(stream_decoder.next_chunk(&mut half)?, Refill::Filled);
    }

    let stats = stream_decoder.stats();
    assert_eq!(stats.decode_attempts, u32::MAX);
    assert_eq!(stats.bytes_skipped, u32::MAX);
    assert_eq!(stats.loops, u32::MAX);
    assert_eq!(stats.frames_decoded, u32::MAX);
    assert_eq!(stats.output_frames, u64::MAX);
    assert_eq!(stream_decoder.state(), DecoderState::Playing);
    Ok(())
}

#[test]
fn all_invalid_input_takes_at_most_one_attempt_per_byte() -> TestResult {
    let data = [0xFF_u8; 37];

    let mut stream_decoder = StreamDecoder::new(AdpcmCodec::new(48_000, 8)?, MONO_48K, 16)?;
    stream_decoder.load(&data)?;
    let mut half = [0_i16; 16];
    assert_eq!(stream_decoder.start(&mut half), Err(Error::EndOfFile));
    assert_eq!(stream_decoder.stats().decode_attempts, 37);
    assert_eq!(stream_decoder.stats().bytes_skipped, 37);
    assert_eq!(stream_decoder.state(), DecoderState::Finished);

    let mut looping_decoder = StreamDecoder::new(AdpcmCodec::new(48_000, 8)?, MONO_48K, 16)?;
    looping_decoder.load(&data)?;
    looping_decoder.set_at_end(AtEnd::Loop);
    assert_eq!(looping_decoder.start(&mut half), Err(Error::Decode));
    assert_eq!(looping_decoder.stats().decode_attempts, 37);
    assert_eq!(looping_decoder.state(), DecoderState::Error);
    assert_eq!(looping_decoder.next_chunk(&mut half), Err(Error::Decode));
    Ok(())
}

#[test]
fn equal_rates_pass_samples_through_bit_exact() -> TestResult {
    let samples: Vec<i16> = (0_i32..200).map(|n| ((n * 7_919) % 65_536 - 32_768) as i16).collect();
    let data = pcm_bytes(&samples);
    let pcm_codec = PcmCodec::new(48_000, Channels::Stereo, 37)?;
    let mut stream_decoder = StreamDecoder::new(pcm_codec, AudioFormat::STEREO_48K, 100)?;
    stream_decoder.load(&data)?;

    let mut half = vec![0_i16; 200];
    stream_decoder.start(&mut half)?;
    assert_eq!(half, samples);
    Ok(())
}

#[test]
fn mono_44k1_stream_is_resampled_and_duplicated_to_stereo_48k() -> TestResult {
    let samples: Vec<i16> = (0..441).map(|n| n * 7).collect();
    let data = pcm_bytes(&samples);
    let pcm_codec = PcmCodec::new(44_100, Channels::Mono, 441)?;
    let mut stream_decoder = StreamDecoder::new(pcm_codec, AudioFormat::STEREO_48K, 480)?;
    stream_decoder.load(&data)?;

    let mut half = vec![0_i16; 960];
    assert_eq!(stream_decoder.start(&mut half)?, Refill::Filled);
    for (output_index, frame) in half.chunks_exact(2).enumerate() {
        let expected = samples[output_index * 441 / 480];
        assert_eq!(frame, &[expected, expected]);
    }

    let stream_info = stream_decoder.info().ok_or("no stream info")?;
    assert_eq!(stream_info.input_sample_rate_hz, 44_100);
    assert_eq!(stream_info.input_channels, Channels::Mono);
    assert_eq!(stream_info.output, AudioFormat::STEREO_48K);

    assert_eq!(stream_decoder.next_chunk(&mut half)?, Refill::Exhausted);
    assert!(half.iter().all(|sample| *sample == 0));
    Ok(())
}

#[test]
fn stereo_stream_is_averaged_into_mono_output() -> TestResult {
    let data = pcm_bytes(&[100, 300, -5, -7]);
    let mut stream_decoder = StreamDecoder::new(PcmCodec::new(48_000, Channels::Stereo, 8)?, MONO_48K, 2)?;
    stream_decoder.load(&data)?;

    let mut half = [0_i16; 2];
    stream_decoder.start(&mut half)?;
    assert_eq!(half, [200, -6]);
    Ok(())
}

#[test]
fn decode_all_writes_the_stream_once() -> TestResult {
    let samples: Vec<i16> = (1..=100).collect();
    let data = pcm_bytes(&samples);
    let mut stream_decoder = StreamDecoder::new(PcmCodec::new(48_000, Channels::Mono, 32)?, MONO_48K, 64)?;
    stream_decoder.load(&data)?;
    stream_decoder.set_at_end(AtEnd::Loop);

    let mut out = vec![0_i16; 256];
    assert_eq!(stream_decoder.decode_all(&mut out)?, 100);
    assert_eq!(&out[..100], &samples[..]);
    assert_eq!(stream_decoder.state(), DecoderState::Finished);

    let mut short_out = [0_i16; 50];
    assert_eq!(stream_decoder.decode_all(&mut short_out)?, 50);
    assert_eq!(&short_out[..], &samples[..50]);
    Ok(())
}

#[test]
fn invalid_calls_are_rejected() -> TestResult {
    assert_eq!(
        StreamDecoder::new(PcmCodec::new(48_000, Channels::Mono, 8)?, MONO_48K, 0).err(),
        Some(Error::InvalidParam)
    );

    let data = pcm_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]);
    let mut stream_decoder = StreamDecoder::new(PcmCodec::new(48_000, Channels::Mono, 8)?, MONO_48K, 4)?;
    let mut half = [0_i16; 4];
    assert_eq!(stream_decoder.start(&mut half), Err(Error::InvalidState));
    assert_eq!(stream_decoder.load(&[]), Err(Error::InvalidParam));
    assert_eq!(stream_decoder.rewind(), Err(Error::InvalidState));

    stream_decoder.load(&data)?;
    assert_eq!(stream_decoder.next_chunk(&mut half), Err(Error::InvalidState));
    let mut wrong_half = [0_i16; 5];
    assert_eq!(stream_decoder.start(&mut wrong_half), Err(Error::InvalidParam));

    // Through the source trait, the first refill starts the stream.
    assert_eq!(stream_decoder.chunk_frames(), Some(4));
    assert_eq!(stream_decoder.refill(&mut half)?, Refill::Filled);
    assert_eq!(half, [1, 2, 3, 4]);
    assert_eq!(stream_decoder.refill(&mut half)?, Refill::Filled);
    assert_eq!(half, [5, 6, 7, 8]);
    Ok(())
}
