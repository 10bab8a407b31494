//! Archival voice codec.
//!
//! The live call path carries unmodified 16-bit PCM; only the archival copy
//! is compressed, after the call, off the live path. The archival coder is
//! a 2-bit adaptive-delta (ADPCM family) scheme at 8 kHz mono: 16 kbit/s on
//! the wire, an 8:1 reduction against the 128 kbit/s capture. Voice stays
//! intelligible at that rate; fidelity is the live stream's job.

use crate::error::{ArchiveError, Result};

/// Capture/encode sample rate, Hz.
pub const SAMPLE_RATE: u32 = 8_000;

/// Encoded bitrate, bits per second (2 bits per 8 kHz sample).
pub const BITRATE: u32 = 16_000;

/// Samples packed into one encoded byte.
pub const SAMPLES_PER_BYTE: usize = 4;

const STEP_MIN: i32 = 4;
const STEP_MAX: i32 = 8_192;
const STEP_INITIAL: i32 = 16;

/// Static codec description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub name: &'static str,
    pub sample_rate: u32,
    pub channels: u8,
    pub bitrate: u32,
}

/// Trait for archival voice coders.
pub trait VoiceCodec: Send {
    /// Encode 16-bit PCM samples to compressed bytes.
    fn encode(&mut self, samples: &[i16]) -> Result<Vec<u8>>;

    /// Decode compressed bytes back to 16-bit PCM.
    ///
    /// `sample_count` bounds the output: the final byte of a stream may
    /// carry padding codes that are not real samples.
    fn decode(&mut self, data: &[u8], sample_count: usize) -> Result<Vec<i16>>;

    /// Get codec information.
    fn info(&self) -> CodecInfo;

    /// Reset codec state for a fresh stream.
    fn reset(&mut self);
}

/// 2-bit adaptive-delta coder.
///
/// Per sample, one sign bit and one magnitude bit against an adaptive step.
/// Encoder and decoder run the identical predictor/step update, so the
/// decoder needs no side information beyond the sample count.
#[derive(Debug, Clone)]
pub struct AdpcmCodec {
    predictor: i32,
    step: i32,
}

impl AdpcmCodec {
    pub fn new() -> Self {
        Self {
            predictor: 0,
            step: STEP_INITIAL,
        }
    }

    /// Quantize one sample against the predictor; returns the 2-bit code
    /// (bit 1 = sign, bit 0 = magnitude) and updates state.
    fn quantize(&mut self, sample: i16) -> u8 {
        let diff = i32::from(sample) - self.predictor;
        let sign = diff < 0;
        let large = diff.abs() >= self.step;

        self.apply(sign, large);

        (u8::from(sign) << 1) | u8::from(large)
    }

    /// Reconstruct one sample from a 2-bit code; the decode mirror of
    /// [`Self::quantize`].
    fn reconstruct(&mut self, code: u8) -> i16 {
        let sign = code & 0b10 != 0;
        let large = code & 0b01 != 0;

        self.apply(sign, large);

        // apply() already clamped the predictor to i16 range.
        self.predictor as i16
    }

    /// Shared predictor and step update.
    fn apply(&mut self, sign: bool, large: bool) {
        let delta = self.step / 2 + if large { self.step } else { 0 };
        self.predictor += if sign { -delta } else { delta };
        self.predictor = self.predictor.clamp(i32::from(i16::MIN), i32::from(i16::MAX));

        self.step = if large {
            (self.step * 3 / 2).min(STEP_MAX)
        } else {
            (self.step * 2 / 3).max(STEP_MIN)
        };
    }
}

impl VoiceCodec for AdpcmCodec {
    fn encode(&mut self, samples: &[i16]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(samples.len().div_ceil(SAMPLES_PER_BYTE));

        for chunk in samples.chunks(SAMPLES_PER_BYTE) {
            let mut byte = 0u8;
            for (slot, &sample) in chunk.iter().enumerate() {
                let code = self.quantize(sample);
                byte |= code << (6 - 2 * slot as u8);
            }
            // Trailing slots of a short final chunk stay zero (silence
            // codes); the decoder trims them via the sample count.
            out.push(byte);
        }

        Ok(out)
    }

    fn decode(&mut self, data: &[u8], sample_count: usize) -> Result<Vec<i16>> {
        let capacity = data.len() * SAMPLES_PER_BYTE;
        if sample_count > capacity {
            return Err(ArchiveError::encode(format!(
                "stream of {} bytes cannot hold {} samples",
                data.len(),
                sample_count
            )));
        }

        let mut out = Vec::with_capacity(sample_count);
        'bytes: for &byte in data {
            for slot in 0..SAMPLES_PER_BYTE {
                if out.len() == sample_count {
                    break 'bytes;
                }
                let code = (byte >> (6 - 2 * slot as u8)) & 0b11;
                out.push(self.reconstruct(code));
            }
        }

        Ok(out)
    }

    fn info(&self) -> CodecInfo {
        CodecInfo {
            name: "ADP2",
            sample_rate: SAMPLE_RATE,
            channels: 1,
            bitrate: BITRATE,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for AdpcmCodec {
    fn default() -> Self {
        Self::new()
    }
}
