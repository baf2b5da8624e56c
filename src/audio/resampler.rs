//! Conversion from a decoded stream's format to the device's format.
//!
//! `FormatAdapter` remaps channels and then runs a streaming linear
//! resampler, keeping one frame of history so consecutive buffers join
//! without clicks.

use crate::models::{AudioBuffer, StreamFormat};

/// Streaming linear-interpolation resampler for interleaved f32 audio
#[derive(Debug, Clone)]
pub struct LinearResampler {
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
    /// Source frames advanced per output frame
    step: f64,
    /// Read position, relative to `history`
    phase: f64,
    history: Option<Vec<f32>>,
}

impl LinearResampler {
    pub fn new(src_rate: u32, dst_rate: u32, channels: usize) -> Self {
        let step = if dst_rate == 0 {
            0.0
        } else {
            src_rate as f64 / dst_rate as f64
        };
        Self {
            src_rate,
            dst_rate,
            channels,
            step,
            phase: 0.0,
            history: None,
        }
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.history = None;
    }

    pub fn is_passthrough(&self) -> bool {
        self.src_rate == self.dst_rate
    }

    /// Source frames represented by one output frame
    pub fn ratio(&self) -> f64 {
        self.step
    }

    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        let ch = self.channels;
        if ch == 0 || self.src_rate == 0 || self.dst_rate == 0 {
            return Vec::new();
        }
        if self.is_passthrough() {
            return input.to_vec();
        }

        let in_frames = input.len() / ch;
        if in_frames == 0 {
            return Vec::new();
        }

        // Frame 0 is the last frame of the previous call (silence at stream start)
        let history = self.history.take().unwrap_or_else(|| vec![0.0; ch]);
        let frame = |index: usize, channel: usize| -> f32 {
            if index == 0 {
                history[channel]
            } else {
                input[(index - 1) * ch + channel]
            }
        };

        let last_index = in_frames as f64;
        let estimate = (in_frames as f64 / self.step).ceil() as usize + 2;
        let mut out = Vec::with_capacity(estimate * ch);

        // `base + 1` must stay within the input, so `floor(phase) <= in_frames - 1`
        while self.phase < last_index {
            let base = self.phase.floor() as usize;
            let frac = (self.phase - base as f64) as f32;
            for c in 0..ch {
                let a = frame(base, c);
                let b = frame(base + 1, c);
                out.push(a + (b - a) * frac);
            }
            self.phase += self.step;
        }

        // The last input frame becomes index 0 of the next call
        self.phase -= last_index;
        self.history = Some(input[(in_frames - 1) * ch..in_frames * ch].to_vec());

        out
    }
}

/// Remap interleaved samples from `from` channels to `to` channels.
/// Mono is duplicated, stereo folds down to mono by averaging, other
/// layouts are truncated or padded with silence.
pub fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    if from == to || from == 0 || to == 0 {
        return samples.to_vec();
    }

    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        match (from, to) {
            (1, _) => out.extend(std::iter::repeat(frame[0]).take(to)),
            (_, 1) => out.push(frame.iter().sum::<f32>() / from as f32),
            _ if to < from => out.extend_from_slice(&frame[..to]),
            _ => {
                out.extend_from_slice(frame);
                out.extend(std::iter::repeat(0.0).take(to - from));
            }
        }
    }
    out
}

/// Converts buffers of one stream format into the device format
#[derive(Debug, Clone)]
pub struct FormatAdapter {
    source: StreamFormat,
    device: StreamFormat,
    resampler: LinearResampler,
}

impl FormatAdapter {
    pub fn new(source: StreamFormat, device: StreamFormat) -> Self {
        Self {
            source,
            device,
            resampler: LinearResampler::new(source.sample_rate, device.sample_rate, device.channels as usize),
        }
    }

    pub fn source(&self) -> StreamFormat {
        self.source
    }

    pub fn device(&self) -> StreamFormat {
        self.device
    }

    /// Source frames consumed per device frame
    pub fn source_frames_per_device_frame(&self) -> f64 {
        if self.device.sample_rate == 0 {
            0.0
        } else {
            self.source.sample_rate as f64 / self.device.sample_rate as f64
        }
    }

    pub fn reset(&mut self) {
        self.resampler.reset();
    }

    pub fn convert(&mut self, buffer: &AudioBuffer) -> Vec<f32> {
        let remapped;
        let samples = if buffer.channels == self.device.channels {
            &buffer.samples[..]
        } else {
            remapped = remap_channels(&buffer.samples, buffer.channels as usize, self.device.channels as usize);
            &remapped[..]
        };
        self.resampler.process(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, frames: usize, channels: usize) -> Vec<f32> {
        (0..frames)
            .flat_map(|n| {
                let s = (2.0 * std::f32::consts::PI * freq * n as f32 / rate as f32).sin();
                std::iter::repeat(s).take(channels)
            })
            .collect()
    }

    #[test]
    fn test_output_length_follows_rate_ratio() {
        let input = sine(1000.0, 44_100, 4410, 1);
        let mut rs = LinearResampler::new(44_100, 48_000, 1);
        let out = rs.process(&input);

        let expected = (4410.0 * 48_000.0 / 44_100.0) as isize;
        assert!((out.len() as isize - expected).abs() <= 2, "expected ~{}, got {}", expected, out.len());
    }

    #[test]
    fn test_chunked_processing_matches_one_shot() {
        let input = sine(440.0, 44_100, 10_000, 2);

        let mut whole = LinearResampler::new(44_100, 48_000, 2);
        let one_shot = whole.process(&input);

        let mut chunked = LinearResampler::new(44_100, 48_000, 2);
        let streamed: Vec<f32> = input.chunks(777 * 2).flat_map(|chunk| chunked.process(chunk)).collect();

        assert!((one_shot.len() as isize - streamed.len() as isize).abs() <= 4);
        let common = one_shot.len().min(streamed.len());
        for k in (0..common).step_by(common / 10) {
            assert!((one_shot[k] - streamed[k]).abs() < 1e-3, "mismatch at {}", k);
        }
    }

    #[test]
    fn test_packet_sized_chunks_lose_no_frames() {
        let rate = 44_100;
        let ramp: Vec<f32> = (0..rate).map(|n| n as f32 / rate as f32).collect();

        let mut whole = LinearResampler::new(44_100, 48_000, 1);
        let one_shot = whole.process(&ramp);

        let mut chunked = LinearResampler::new(44_100, 48_000, 1);
        let streamed: Vec<f32> = ramp.chunks(1152).flat_map(|packet| chunked.process(packet)).collect();

        assert!((one_shot.len() as isize - streamed.len() as isize).abs() <= 1);
        assert!((streamed.len() as isize - 48_000).abs() <= 1, "got {} frames", streamed.len());
        let common = one_shot.len().min(streamed.len());
        for k in 0..common {
            assert!((one_shot[k] - streamed[k]).abs() < 1e-4, "mismatch at {}", k);
        }
    }

    #[test]
    fn test_phase_carries_across_calls() {
        // 2:1 downsampling of single-frame calls keeps every other frame
        let mut rs = LinearResampler::new(2, 1, 1);
        let out: Vec<f32> = (1..=6).flat_map(|n| rs.process(&[n as f32])).collect();
        assert_eq!(out, vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_equal_rates_pass_through() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let mut rs = LinearResampler::new(48_000, 48_000, 2);
        assert!(rs.is_passthrough());
        assert_eq!(rs.process(&input), input);
    }

    #[test]
    fn test_remap_channels() {
        assert_eq!(remap_channels(&[0.5, -0.5], 1, 2), vec![0.5, 0.5, -0.5, -0.5]);
        assert_eq!(remap_channels(&[1.0, 0.0, 0.5, 0.5], 2, 1), vec![0.5, 0.5]);
        assert_eq!(remap_channels(&[1.0, 2.0, 3.0], 3, 2), vec![1.0, 2.0]);
        assert_eq!(remap_channels(&[1.0, 2.0], 2, 4), vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_format_adapter_mono_to_stereo_downsample() {
        let mut adapter = FormatAdapter::new(StreamFormat::new(96_000, 1), StreamFormat::new(48_000, 2));
        assert_eq!(adapter.source_frames_per_device_frame(), 2.0);

        let buffer = AudioBuffer::from_interleaved(sine(100.0, 96_000, 960, 1), 1, 96_000);
        let out = adapter.convert(&buffer);

        assert_eq!(out.len() % 2, 0);
        let frames = out.len() / 2;
        assert!((frames as isize - 480).abs() <= 2);
        assert_eq!(adapter.device().channels, 2);
    }
}
