//! Decoded audio held in memory between pipeline stages

/// Interleaved `f32` samples with a fixed sample rate and channel count.
///
/// Full scale is ±1.0, so a peak of 1.0 is 0 dBFS.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl AudioBuffer {
    /// Wrap interleaved samples. A trailing partial frame is dropped.
    pub fn new(mut samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(samples, sample_rate, 1)
    }

    /// Rebuild a buffer from one `Vec` per channel (all the same length).
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let count = channels.len().max(1);
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * count);
        for frame in 0..frames {
            for channel in &channels {
                samples.push(channel[frame]);
            }
        }
        Self::new(samples, sample_rate, count as u16)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (one sample per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Deinterleave into one `Vec` per channel.
    pub fn split_channels(&self) -> Vec<Vec<f32>> {
        let ch = self.channels as usize;
        let mut out: Vec<Vec<f32>> = (0..ch)
            .map(|_| Vec::with_capacity(self.frames()))
            .collect();
        for frame in self.samples.chunks_exact(ch) {
            for (c, sample) in frame.iter().enumerate() {
                out[c].push(*sample);
            }
        }
        out
    }

    /// Run a fallible transform over each channel independently.
    pub fn try_map_channels<E, F>(&self, mut f: F) -> Result<Self, E>
    where
        F: FnMut(Vec<f32>) -> Result<Vec<f32>, E>,
    {
        let processed = self
            .split_channels()
            .into_iter()
            .map(&mut f)
            .collect::<Result<Vec<_>, E>>()?;
        Ok(Self::from_channels(processed, self.sample_rate))
    }

    /// Copy frames `start..end` into a new buffer, clamped to the buffer length.
    pub fn slice_frames(&self, start: usize, end: usize) -> Self {
        let ch = self.channels as usize;
        let end = end.min(self.frames());
        let start = start.min(end);
        Self {
            samples: self.samples[start * ch..end * ch].to_vec(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Absolute peak sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }

    /// Root-mean-square over all samples.
    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }

    /// Peak level in dBFS (`-inf` when silent).
    pub fn peak_dbfs(&self) -> f32 {
        linear_to_db(self.peak())
    }

    /// Average (RMS) level in dBFS (`-inf` when silent).
    pub fn dbfs(&self) -> f32 {
        linear_to_db(self.rms())
    }
}

/// Root-mean-square of a slice; 0.0 for an empty slice.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

pub fn db_to_linear(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

pub fn linear_to_db(linear: f32) -> f32 {
    if linear <= 0.0 {
        return f32::NEG_INFINITY;
    }
    20.0 * linear.log10()
}
