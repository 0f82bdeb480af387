//! WAV encoding for transcription uploads and WAV-file audio sources.
//!
//! The dispatcher ships utterances as 16-bit PCM little-endian WAV; the
//! file/stdin sources let the service run against recorded audio in pipe
//! mode. Decoded input is normalized to the session format (16kHz mono
//! 16-bit): multichannel audio is averaged down and off-rate audio is
//! resampled with linear interpolation.

use crate::audio::source::AudioSource;
use crate::defaults::{CHUNK_SIZE, SAMPLE_RATE};
use crate::error::{ColloquyError, Result};
use std::io::{Cursor, Read};

fn decode_error(message: String) -> ColloquyError {
    ColloquyError::AudioDecode { message }
}

/// Wraps raw PCM samples in a mono 16-bit WAV container.
pub fn pcm_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| decode_error(format!("Failed to create WAV writer: {e}")))?;
        let mut writer16 = writer.get_i16_writer(samples.len() as u32);
        for &sample in samples {
            writer16.write_sample(sample);
        }
        writer16
            .flush()
            .map_err(|e| decode_error(format!("Failed to write WAV samples: {e}")))?;
        writer
            .finalize()
            .map_err(|e| decode_error(format!("Failed to finalize WAV: {e}")))?;
    }

    Ok(cursor.into_inner())
}

/// Audio source that reads WAV data and normalizes it to the session
/// format. Only 16-bit integer PCM input is accepted; any channel count
/// and sample rate are handled.
#[derive(Debug)]
pub struct WavAudioSource {
    samples: Vec<i16>,
    position: usize,
    chunk_size: usize,
}

impl WavAudioSource {
    /// Create from any reader.
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Result<Self> {
        let mut decoder = hound::WavReader::new(reader)
            .map_err(|e| decode_error(format!("Failed to parse WAV header: {e}")))?;

        let spec = decoder.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            return Err(decode_error(format!(
                "unsupported WAV sample format: {}-bit {:?} (need 16-bit integer PCM)",
                spec.bits_per_sample, spec.sample_format
            )));
        }
        if spec.channels == 0 {
            return Err(decode_error("WAV reports zero channels".to_string()));
        }

        let mut raw = Vec::with_capacity(decoder.len() as usize);
        for sample in decoder.samples::<i16>() {
            raw.push(sample.map_err(|e| decode_error(format!("Failed to read WAV data: {e}")))?);
        }

        let mono = downmix(raw, spec.channels);
        let samples = if spec.sample_rate == SAMPLE_RATE {
            mono
        } else {
            resample_linear(&mono, spec.sample_rate, SAMPLE_RATE)
        };

        Ok(Self {
            samples,
            position: 0,
            chunk_size: CHUNK_SIZE,
        })
    }

    /// Create from an in-memory WAV file.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_reader(Box::new(Cursor::new(data)))
    }

    /// Create from stdin.
    pub fn from_stdin() -> Result<Self> {
        // Buffer everything up front; StdinLock is not Send.
        let mut data = Vec::new();
        std::io::stdin()
            .lock()
            .read_to_end(&mut data)
            .map_err(|e| ColloquyError::AudioSource {
                message: format!("Failed to read from stdin: {e}"),
            })?;

        Self::from_bytes(data)
    }

    /// Create from a file path.
    pub fn from_path(path: &std::path::Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(Box::new(file))
    }
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<Vec<i16>> {
        if self.position >= self.samples.len() {
            return Ok(Vec::new());
        }

        let end = std::cmp::min(self.position + self.chunk_size, self.samples.len());
        let chunk = self.samples[self.position..end].to_vec();
        self.position = end;

        Ok(chunk)
    }
}

/// Averages interleaved frames down to mono, for any channel count.
fn downmix(samples: Vec<i16>, channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples;
    }

    let width = channels as usize;
    samples
        .chunks(width)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

/// Linear-interpolation resampling on an integer phase accumulator.
///
/// Output sample `i` sits at input position `i * from / to`; the
/// remainder of that division is the interpolation weight, so no
/// floating point is involved and the mapping is exact.
fn resample_linear(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let (from, to) = (from_rate as u64, to_rate as u64);
    let mut out = Vec::with_capacity((samples.len() as u64 * to / from) as usize + 1);

    let mut i = 0u64;
    loop {
        let phase = i * from;
        let index = (phase / to) as usize;
        if index >= samples.len() {
            break;
        }

        let weight = (phase % to) as i64;
        let here = samples[index] as i64;
        let next = *samples.get(index + 1).unwrap_or(&samples[index]) as i64;
        out.push((here + (next - here) * weight / to as i64) as i16);
        i += 1;
    }

    out
}
