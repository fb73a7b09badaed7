//! Encoding cleaned audio for download

use std::io::Cursor;

use hound::{WavSpec, WavWriter};
use serde::{Deserialize, Serialize};

use crate::audio_clean::AudioBuffer;
use crate::error::{CleanError, Result};

/// Container the cleaned audio is delivered in
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Wav => "audio/wav",
            OutputFormat::Mp3 => "audio/mpeg",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = CleanError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(OutputFormat::Wav),
            "mp3" => Ok(OutputFormat::Mp3),
            other => Err(CleanError::InvalidConfig(format!(
                "unknown output format '{}' (expected wav or mp3)",
                other
            ))),
        }
    }
}

/// Encoded bytes ready to hand to the user
#[derive(Debug, Clone)]
pub struct EncodedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// Encode `buffer` in the requested format.
pub fn encode(buffer: &AudioBuffer, format: OutputFormat, mp3_bitrate_kbps: u32) -> Result<EncodedAudio> {
    let bytes = match format {
        OutputFormat::Wav => encode_wav(buffer)?,
        OutputFormat::Mp3 => encode_mp3(buffer, mp3_bitrate_kbps)?,
    };
    log::debug!("Encoded {} frames as {:?}: {} bytes", buffer.frames(), format, bytes.len());
    Ok(EncodedAudio {
        bytes,
        mime_type: format.mime_type(),
    })
}

/// 16-bit integer PCM WAV in memory
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>> {
    let spec = WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| CleanError::Encode(format!("Failed to create WAV writer: {}", e)))?;

        for sample in buffer.samples() {
            writer
                .write_sample(to_i16(*sample))
                .map_err(|e| CleanError::Encode(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| CleanError::Encode(format!("Failed to finalize WAV: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(feature = "mp3")]
pub fn encode_mp3(buffer: &AudioBuffer, bitrate_kbps: u32) -> Result<Vec<u8>> {
    use mp3lame_encoder::{Builder, FlushNoGap, InterleavedPcm};

    let pcm: Vec<i16> = buffer.samples().iter().map(|s| to_i16(*s)).collect();

    // InterleavedPcm always expects stereo interleaved data, so mono input is
    // duplicated to avoid double-speed encoding.
    let (encode_samples, encode_channels) = match buffer.channels() {
        1 => (pcm.iter().flat_map(|&s| [s, s]).collect::<Vec<i16>>(), 2u8),
        2 => (pcm, 2u8),
        n => {
            return Err(CleanError::Encode(format!(
                "MP3 output supports mono or stereo, got {} channels",
                n
            )))
        }
    };

    let mut mp3_encoder = Builder::new()
        .ok_or_else(|| CleanError::Encode("Failed to create MP3 encoder".to_string()))?;
    mp3_encoder
        .set_num_channels(encode_channels)
        .map_err(|e| CleanError::Encode(format!("Failed to set channels: {:?}", e)))?;
    mp3_encoder
        .set_sample_rate(buffer.sample_rate())
        .map_err(|e| CleanError::Encode(format!("Failed to set sample rate: {:?}", e)))?;
    mp3_encoder
        .set_brate(map_bitrate(bitrate_kbps))
        .map_err(|e| CleanError::Encode(format!("Failed to set bitrate: {:?}", e)))?;
    mp3_encoder
        .set_quality(mp3lame_encoder::Quality::Best)
        .map_err(|e| CleanError::Encode(format!("Failed to set quality: {:?}", e)))?;

    let mut mp3_encoder = mp3_encoder
        .build()
        .map_err(|e| CleanError::Encode(format!("Failed to build encoder: {:?}", e)))?;

    // LAME needs roughly 1.25x input + 7200 bytes
    let input = InterleavedPcm(&encode_samples);
    let estimated_size = (encode_samples.len() * 5 / 4) + 7200;
    let mut mp3_out: Vec<u8> = Vec::with_capacity(estimated_size);

    let encoded_size = mp3_encoder
        .encode(input, mp3_out.spare_capacity_mut())
        .map_err(|e| CleanError::Encode(format!("Failed to encode MP3: {:?}", e)))?;
    // SAFETY: the encoder initialized exactly `encoded_size` bytes of spare capacity
    unsafe {
        mp3_out.set_len(encoded_size);
    }

    mp3_out.reserve(7200);
    let flush_size = mp3_encoder
        .flush::<FlushNoGap>(mp3_out.spare_capacity_mut())
        .map_err(|e| CleanError::Encode(format!("Failed to flush encoder: {:?}", e)))?;
    // SAFETY: as above, for the flushed tail
    unsafe {
        mp3_out.set_len(mp3_out.len() + flush_size);
    }

    Ok(mp3_out)
}

#[cfg(not(feature = "mp3"))]
pub fn encode_mp3(_buffer: &AudioBuffer, _bitrate_kbps: u32) -> Result<Vec<u8>> {
    Err(CleanError::Encode(
        "MP3 encoder unavailable: built without the `mp3` feature".to_string(),
    ))
}

#[cfg(feature = "mp3")]
fn map_bitrate(bitrate: u32) -> mp3lame_encoder::Bitrate {
    match bitrate {
        0..=32 => mp3lame_encoder::Bitrate::Kbps32,
        33..=40 => mp3lame_encoder::Bitrate::Kbps40,
        41..=48 => mp3lame_encoder::Bitrate::Kbps48,
        49..=64 => mp3lame_encoder::Bitrate::Kbps64,
        65..=80 => mp3lame_encoder::Bitrate::Kbps80,
        81..=96 => mp3lame_encoder::Bitrate::Kbps96,
        97..=112 => mp3lame_encoder::Bitrate::Kbps112,
        113..=128 => mp3lame_encoder::Bitrate::Kbps128,
        129..=160 => mp3lame_encoder::Bitrate::Kbps160,
        161..=192 => mp3lame_encoder::Bitrate::Kbps192,
        193..=224 => mp3lame_encoder::Bitrate::Kbps224,
        225..=256 => mp3lame_encoder::Bitrate::Kbps256,
        _ => mp3lame_encoder::Bitrate::Kbps320,
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Replace anything outside `[A-Za-z0-9_.-]` with `_`.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Download name: sanitized stem + `_cleaned` + the output extension.
pub fn cleaned_filename(original: &str, format: OutputFormat) -> String {
    let sanitized = sanitize_filename(original);
    let stem = match sanitized.rfind('.') {
        Some(dot) if dot > 0 => &sanitized[..dot],
        _ => sanitized.as_str(),
    };
    format!("{}_cleaned.{}", stem, format.extension())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaned_filename_sanitizes() {
        assert_eq!(
            cleaned_filename("lecture #1 (raw).mp3", OutputFormat::Mp3),
            "lecture__1__raw__cleaned.mp3"
        );
    }

    #[test]
    fn test_cleaned_filename_follows_output_format() {
        assert_eq!(cleaned_filename("voice memo.mp3", OutputFormat::Wav), "voice_memo_cleaned.wav");
        assert_eq!(cleaned_filename("take.2.wav", OutputFormat::Wav), "take.2_cleaned.wav");
        assert_eq!(cleaned_filename("noext", OutputFormat::Mp3), "noext_cleaned.mp3");
        assert_eq!(cleaned_filename("ünïcode.wav", OutputFormat::Wav), "_n_code_cleaned.wav");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("MP3".parse::<OutputFormat>().unwrap(), OutputFormat::Mp3);
        assert_eq!("wav".parse::<OutputFormat>().unwrap(), OutputFormat::Wav);
        assert!("flac".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Mp3.mime_type(), "audio/mpeg");
        assert_eq!(OutputFormat::Wav.mime_type(), "audio/wav");
    }

    #[test]
    fn test_wav_round_trip_preserves_duration() {
        let frames = 44100 + 17;
        let samples: Vec<f32> = (0..frames).map(|i| 0.4 * (i as f32 * 0.01).sin()).collect();
        let buffer = AudioBuffer::mono(samples, 44100);

        let bytes = encode_wav(&buffer).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.duration() as usize, frames);
    }

    #[test]
    fn test_wav_empty_buffer() {
        let buffer = AudioBuffer::mono(Vec::new(), 16000);
        let encoded = encode(&buffer, OutputFormat::Wav, 192).unwrap();
        assert_eq!(encoded.mime_type, "audio/wav");
        assert_eq!(hound::WavReader::new(Cursor::new(encoded.bytes)).unwrap().duration(), 0);
    }

    #[cfg(feature = "mp3")]
    #[test]
    fn test_mp3_encode_produces_frames() {
        let samples: Vec<f32> = (0..44100).map(|i| 0.3 * (i as f32 * 0.05).sin()).collect();
        let buffer = AudioBuffer::mono(samples, 44100);
        let encoded = encode(&buffer, OutputFormat::Mp3, 128).unwrap();
        assert_eq!(encoded.mime_type, "audio/mpeg");
        assert!(!encoded.bytes.is_empty());
    }

    #[cfg(not(feature = "mp3"))]
    #[test]
    fn test_mp3_unavailable_without_feature() {
        let buffer = AudioBuffer::mono(vec![0.0; 100], 44100);
        assert!(matches!(
            encode(&buffer, OutputFormat::Mp3, 128),
            Err(CleanError::Encode(_))
        ));
    }
}
