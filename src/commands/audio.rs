//! Decoding uploaded files into sample buffers

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::audio_clean::AudioBuffer;
use crate::error::{CleanError, Result};

/// Extensions accepted for upload
pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["wav", "mp3"];

/// Lower-cased extension of `filename` if it is one we accept.
pub fn supported_extension(filename: &str) -> Result<String> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(CleanError::UnsupportedFormat(format!(
            "'{}' (expected .wav or .mp3)",
            filename
        )))
    }
}

/// Decode a whole file at its native sample rate and channel count.
pub fn decode_file(path: &Path) -> Result<AudioBuffer> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let decoder_opts = DecoderOptions::default();

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &format_opts, &metadata_opts)
        .map_err(|e| CleanError::Decode(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| CleanError::Decode("No audio tracks found".to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &decoder_opts)
        .map_err(|e| CleanError::Decode(format!("Failed to create decoder: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(CleanError::Decode(format!("Error reading packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(CleanError::Decode(format!("Decode error: {}", e))),
        };

        let spec = *decoded.spec();
        // Some containers only report the layout once decoding starts
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count() as u16);

        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    let (Some(sample_rate), Some(channels)) = (sample_rate, channels) else {
        return Err(CleanError::Decode("Stream has no sample rate or channel layout".to_string()));
    };
    if samples.is_empty() {
        return Err(CleanError::Decode("No audio samples decoded".to_string()));
    }

    log::debug!(
        "Decoded {:?}: {} Hz, {} ch, {} samples",
        path.file_name(),
        sample_rate,
        channels,
        samples.len()
    );

    Ok(AudioBuffer::new(samples, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn write_wav(path: &Path, samples: &[i16], sample_rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        std::fs::write(path, cursor.into_inner()).unwrap();
    }

    #[test]
    fn test_supported_extension() {
        assert_eq!(supported_extension("take1.WAV").unwrap(), "wav");
        assert_eq!(supported_extension("podcast.final.mp3").unwrap(), "mp3");
        assert!(matches!(
            supported_extension("notes.txt"),
            Err(CleanError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            supported_extension("no_extension"),
            Err(CleanError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_decode_wav_keeps_rate_and_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let samples: Vec<i16> = (0..2000).map(|i| ((i % 100) * 300 - 15000) as i16).collect();
        write_wav(&path, &samples, 22050, 2);

        let buffer = decode_file(&path).unwrap();
        assert_eq!(buffer.sample_rate(), 22050);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.frames(), 1000);
        assert!((buffer.samples()[0] - (-15000.0 / 32768.0)).abs() < 1e-4);
    }

    #[test]
    fn test_decode_corrupt_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.wav");
        std::fs::write(&path, b"definitely not a riff header").unwrap();

        assert!(matches!(decode_file(&path), Err(CleanError::Decode(_))));
    }

    #[test]
    fn test_decode_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = decode_file(&dir.path().join("missing.wav"));
        assert!(matches!(result, Err(CleanError::Io(_))));
    }
}
