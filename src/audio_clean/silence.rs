//! Silence trimming
//!
//! Finds stretches that stay below a loudness threshold for at least
//! `min_silence_ms`, keeps `keep_silence_ms` of padding around the audible
//! parts, and joins what is left.

use serde::{Deserialize, Serialize};

use super::buffer::{db_to_linear, AudioBuffer};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SilenceTrimOptions {
    /// Shortest quiet stretch that counts as silence
    pub min_silence_ms: u32,
    /// Threshold relative to the buffer's average level (dBFS)
    pub silence_thresh_offset_db: f32,
    /// Padding retained on each side of audible audio
    pub keep_silence_ms: u32,
    /// Step between analysis windows
    pub seek_step_ms: u32,
}

impl Default for SilenceTrimOptions {
    fn default() -> Self {
        Self {
            min_silence_ms: 1000,
            silence_thresh_offset_db: -14.0,
            keep_silence_ms: 500,
            seek_step_ms: 1,
        }
    }
}

/// Frame range `[start, end)`
pub type FrameRange = (usize, usize);

/// Remove silence longer than the minimum, keeping padding around audio.
///
/// A buffer that is silent throughout comes back empty.
pub fn trim_silence(buffer: &AudioBuffer, options: &SilenceTrimOptions) -> AudioBuffer {
    let threshold = db_to_linear(buffer.dbfs() + options.silence_thresh_offset_db);
    let keep = ms_to_frames(options.keep_silence_ms, buffer.sample_rate());

    let ranges = detect_nonsilent(buffer, options, threshold);
    let padded = pad_ranges(&ranges, keep, buffer.frames());

    let mut samples = Vec::new();
    for (start, end) in padded {
        samples.extend_from_slice(buffer.slice_frames(start, end).samples());
    }

    log::debug!(
        "Silence trim: {} -> {} frames (threshold {:.1} dBFS)",
        buffer.frames(),
        samples.len() / buffer.channels() as usize,
        buffer.dbfs() + options.silence_thresh_offset_db
    );

    AudioBuffer::new(samples, buffer.sample_rate(), buffer.channels())
}

/// Ranges of frames that are silent for at least the minimum length.
///
/// `threshold` is a linear RMS level; a window at or below it is silent.
pub fn detect_silence(
    buffer: &AudioBuffer,
    options: &SilenceTrimOptions,
    threshold: f32,
) -> Vec<FrameRange> {
    let total = buffer.frames();
    let window = ms_to_frames(options.min_silence_ms, buffer.sample_rate()).max(1);
    let step = ms_to_frames(options.seek_step_ms, buffer.sample_rate()).max(1);

    if total == 0 {
        return Vec::new();
    }
    if total < window {
        // Too short for a full window: judge the whole buffer at once
        if buffer.rms() <= threshold {
            return vec![(0, total)];
        }
        return Vec::new();
    }

    let energy = prefix_energy(buffer);
    let channels = buffer.channels() as usize;
    let window_rms = |start: usize| -> f32 {
        let sum = energy[start + window] - energy[start];
        ((sum / (window * channels) as f64).max(0.0)).sqrt() as f32
    };

    let last_start = total - window;
    let mut starts: Vec<usize> = (0..=last_start).step_by(step).collect();
    if last_start % step != 0 {
        starts.push(last_start);
    }

    let silent_starts: Vec<usize> = starts
        .into_iter()
        .filter(|&start| window_rms(start) <= threshold)
        .collect();

    let Some((&first, rest)) = silent_starts.split_first() else {
        return Vec::new();
    };

    let mut ranges = Vec::new();
    let mut range_start = first;
    let mut prev = first;
    for &start in rest {
        let continuous = start == prev + step;
        let has_gap = start > prev + window;
        if !continuous && has_gap {
            ranges.push((range_start, prev + window));
            range_start = start;
        }
        prev = start;
    }
    ranges.push((range_start, prev + window));

    ranges
}

/// Complement of [`detect_silence`]: the audible ranges, in order.
pub fn detect_nonsilent(
    buffer: &AudioBuffer,
    options: &SilenceTrimOptions,
    threshold: f32,
) -> Vec<FrameRange> {
    let total = buffer.frames();
    let silent = detect_silence(buffer, options, threshold);

    if silent.is_empty() {
        if total == 0 {
            return Vec::new();
        }
        return vec![(0, total)];
    }
    if silent[0] == (0, total) {
        return Vec::new();
    }

    let mut ranges = Vec::new();
    let mut prev_end = 0;
    for &(start, end) in &silent {
        ranges.push((prev_end, start));
        prev_end = end;
    }
    if prev_end != total {
        ranges.push((prev_end, total));
    }

    ranges.retain(|&(start, end)| end > start);
    ranges
}

/// Widen ranges by `keep` frames, splitting overlaps at the midpoint.
fn pad_ranges(ranges: &[FrameRange], keep: usize, total: usize) -> Vec<FrameRange> {
    let mut padded: Vec<(isize, isize)> = ranges
        .iter()
        .map(|&(start, end)| (start as isize - keep as isize, (end + keep) as isize))
        .collect();

    for i in 1..padded.len() {
        let last_end = padded[i - 1].1;
        let next_start = padded[i].0;
        if next_start < last_end {
            let mid = (last_end + next_start).div_euclid(2);
            padded[i - 1].1 = mid;
            padded[i].0 = mid;
        }
    }

    padded
        .into_iter()
        .map(|(start, end)| (start.max(0) as usize, (end.max(0) as usize).min(total)))
        .filter(|&(start, end)| end > start)
        .collect()
}

/// Cumulative sum of squared samples per frame boundary
fn prefix_energy(buffer: &AudioBuffer) -> Vec<f64> {
    let channels = buffer.channels() as usize;
    let mut energy = Vec::with_capacity(buffer.frames() + 1);
    let mut acc = 0.0f64;
    energy.push(acc);
    for frame in buffer.samples().chunks_exact(channels) {
        acc += frame.iter().map(|s| (*s as f64) * (*s as f64)).sum::<f64>();
        energy.push(acc);
    }
    energy
}

fn ms_to_frames(ms: u32, sample_rate: u32) -> usize {
    (ms as u64 * sample_rate as u64 / 1000) as usize
}
