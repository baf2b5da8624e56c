use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};
use log::{debug, error, info, warn};

use crate::audio::buffer::{PushOutcome, SampleFifo};
use crate::audio::position::PositionCounter;
use crate::audio::resampler::FormatAdapter;
use crate::error::OutputError;
use crate::models::{AudioBuffer, StreamFormat};

/// How long a device may go without consuming samples before the sink gives up
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Output gain shared between the engine and the render callback
#[derive(Debug, Clone)]
pub struct Volume {
    bits: Arc<AtomicU32>,
}

impl Volume {
    pub fn new(initial: f32) -> Self {
        Self {
            bits: Arc::new(AtomicU32::new(initial.clamp(0.0, 1.0).to_bits())),
        }
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Relaxed))
    }

    /// Store a gain clamped to 0.0..=1.0 and return it
    pub fn set(&self, volume: f32) -> f32 {
        let clamped = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.bits.store(clamped.to_bits(), Ordering::Relaxed);
        clamped
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputSettings {
    pub preferred_device: Option<String>,
    /// Audio queued ahead of the device
    pub buffer: Duration,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            preferred_device: None,
            buffer: Duration::from_millis(250),
        }
    }
}

/// What a sink needs to report progress back to the engine
#[derive(Debug, Clone)]
pub struct SinkContext {
    pub position: PositionCounter,
    pub generation: u64,
    pub volume: Volume,
}

/// Factory for render sinks. Shared by the engine across workers.
pub trait AudioOutput: Send + Sync {
    /// Open a sink for audio in `format`. Called on the worker thread, which
    /// also drops the sink.
    fn open_sink(&self, format: StreamFormat, context: SinkContext) -> Result<Box<dyn AudioSink>, OutputError>;

    fn name(&self) -> String;
}

/// Render side of one worker. Not `Send`: device streams stay on the thread
/// that opened them.
pub trait AudioSink {
    /// Format of the buffers this sink accepts
    fn source_format(&self) -> StreamFormat;

    /// Queue a buffer, blocking while the device is behind. `Ok(false)` when
    /// `stop` interrupted the write.
    fn render(&mut self, buffer: &AudioBuffer, stop: &AtomicBool) -> Result<bool, OutputError>;

    /// Block until queued audio has been played. `false` when interrupted.
    fn drain(&mut self, stop: &AtomicBool) -> bool;
}

/// Plays through a cpal device, preferring a device by name and falling
/// back to the host default
#[derive(Debug, Clone, Default)]
pub struct CpalOutput {
    settings: OutputSettings,
}

impl CpalOutput {
    pub fn new(settings: OutputSettings) -> Self {
        Self { settings }
    }

    /// Names of the host's output devices
    pub fn list_devices() -> Result<Vec<String>, OutputError> {
        let host = cpal::default_host();
        let devices = host
            .output_devices()
            .map_err(|e| OutputError::StreamError(format!("Failed to enumerate devices: {}", e)))?;
        Ok(devices.filter_map(|device| device.name().ok()).collect())
    }

    fn select_device(&self) -> Result<cpal::Device, OutputError> {
        let host = cpal::default_host();

        if let Some(wanted) = &self.settings.preferred_device {
            let found = host
                .output_devices()
                .ok()
                .and_then(|mut devices| devices.find(|d| d.name().map(|n| &n == wanted).unwrap_or(false)));
            match found {
                Some(device) => return Ok(device),
                None => warn!("Audio device '{}' not found, falling back to default", wanted),
            }
        }

        host.default_output_device().ok_or(OutputError::NoDefaultDevice)
    }

    /// Use the source format natively when the device supports it, else the
    /// device default
    fn choose_config(device: &cpal::Device, format: StreamFormat) -> Result<(StreamConfig, SampleFormat), OutputError> {
        if let Ok(configs) = device.supported_output_configs() {
            for range in configs {
                if range.channels() == format.channels
                    && range.min_sample_rate().0 <= format.sample_rate
                    && range.max_sample_rate().0 >= format.sample_rate
                {
                    let supported = range.with_sample_rate(SampleRate(format.sample_rate));
                    return Ok((supported.config(), supported.sample_format()));
                }
            }
        }

        let default = device
            .default_output_config()
            .map_err(|e| OutputError::UnsupportedConfig(format!("Failed to get default config: {}", e)))?;
        Ok((default.config(), default.sample_format()))
    }
}

impl AudioOutput for CpalOutput {
    fn open_sink(&self, format: StreamFormat, context: SinkContext) -> Result<Box<dyn AudioSink>, OutputError> {
        let device = self.select_device()?;
        let (config, sample_format) = Self::choose_config(&device, format)?;
        let device_format = StreamFormat::new(config.sample_rate.0, config.channels);

        let adapter = FormatAdapter::new(format, device_format);
        let fifo = Arc::new(SampleFifo::for_duration(
            device_format.sample_rate,
            device_format.channels as usize,
            self.settings.buffer,
        ));
        let ratio = adapter.source_frames_per_device_frame();

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, fifo.clone(), context, ratio)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, fifo.clone(), context, ratio)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, fifo.clone(), context, ratio)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &config, fifo.clone(), context, ratio)?,
            other => {
                return Err(OutputError::UnsupportedConfig(format!("Unsupported sample format: {:?}", other)));
            }
        };
        stream
            .play()
            .map_err(|e| OutputError::StreamError(format!("Failed to start stream: {}", e)))?;

        info!(
            "Output '{}' opened: {} -> {}",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            format.format_description(),
            device_format.format_description()
        );

        Ok(Box::new(CpalSink {
            stream,
            fifo,
            adapter,
        }))
    }

    fn name(&self) -> String {
        self.settings
            .preferred_device
            .clone()
            .unwrap_or_else(|| "default".to_string())
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    fifo: Arc<SampleFifo>,
    context: SinkContext,
    source_frames_per_device_frame: f64,
) -> Result<Stream, OutputError>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let channels = config.channels.max(1) as usize;
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                let read = fifo.pop_into(&mut scratch);
                let gain = context.volume.get();

                for (i, out) in data.iter_mut().enumerate() {
                    let sample = if i < read { scratch[i] * gain } else { 0.0 };
                    *out = cpal::Sample::from_sample(sample);
                }

                let frames = read / channels;
                if frames > 0 {
                    context
                        .position
                        .advance(context.generation, frames as f64 * source_frames_per_device_frame);
                }
            },
            |err| error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| OutputError::StreamError(format!("Failed to build output stream: {}", e)))
}

struct CpalSink {
    stream: Stream,
    fifo: Arc<SampleFifo>,
    adapter: FormatAdapter,
}

impl AudioSink for CpalSink {
    fn source_format(&self) -> StreamFormat {
        self.adapter.source()
    }

    fn render(&mut self, buffer: &AudioBuffer, stop: &AtomicBool) -> Result<bool, OutputError> {
        let samples = self.adapter.convert(buffer);
        match self.fifo.push_blocking(&samples, stop, STALL_TIMEOUT) {
            PushOutcome::Complete => Ok(true),
            PushOutcome::Interrupted | PushOutcome::Closed => Ok(false),
            PushOutcome::Stalled => Err(OutputError::Stalled { waited: STALL_TIMEOUT }),
        }
    }

    fn drain(&mut self, stop: &AtomicBool) -> bool {
        self.fifo.wait_drained(stop, STALL_TIMEOUT)
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.fifo.close();
        if let Err(e) = self.stream.pause() {
            debug!("Failed to pause output stream on close: {}", e);
        }
    }
}

/// Output without a device. With `realtime` the sink paces itself to the
/// stream's sample rate, otherwise buffers are consumed immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullOutput {
    realtime: bool,
}

impl NullOutput {
    pub fn new(realtime: bool) -> Self {
        Self { realtime }
    }
}

impl AudioOutput for NullOutput {
    fn open_sink(&self, format: StreamFormat, context: SinkContext) -> Result<Box<dyn AudioSink>, OutputError> {
        debug!("Null output opened for {}", format.format_description());
        Ok(Box::new(NullSink {
            format,
            context,
            realtime: self.realtime,
        }))
    }

    fn name(&self) -> String {
        "null".to_string()
    }
}

struct NullSink {
    format: StreamFormat,
    context: SinkContext,
    realtime: bool,
}

impl AudioSink for NullSink {
    fn source_format(&self) -> StreamFormat {
        self.format
    }

    fn render(&mut self, buffer: &AudioBuffer, stop: &AtomicBool) -> Result<bool, OutputError> {
        let total = buffer.frames as u64;
        if !self.realtime {
            self.context.position.advance(self.context.generation, total as f64);
            return Ok(true);
        }

        let started = Instant::now();
        let mut credited = 0u64;
        while credited < total {
            if stop.load(Ordering::Acquire) {
                return Ok(false);
            }
            thread::sleep(Duration::from_millis(5));
            let due = self.format.duration_to_frames(started.elapsed()).min(total);
            if due > credited {
                self.context
                    .position
                    .advance(self.context.generation, (due - credited) as f64);
                credited = due;
            }
        }
        Ok(true)
    }

    fn drain(&mut self, _stop: &AtomicBool) -> bool {
        true
    }
}
