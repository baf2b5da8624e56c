use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use log::{debug, trace, warn};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{DecodeError, ResourceError};
use crate::models::{AudioBuffer, StreamFormat};

/// File extensions the default probe is expected to handle
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "flac", "wav", "wave", "mp3", "ogg", "oga", "m4a", "aac", "alac", "aif", "aiff",
];

/// Corrupt packets tolerated in a row before the stream is declared broken
const MAX_CONSECUTIVE_BAD_PACKETS: usize = 8;

pub fn is_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// A forward-only decodable stream produced by an `AudioSource`
pub trait AudioStream: Send {
    fn format(&self) -> StreamFormat;

    /// Decode the next buffer; `Ok(None)` at end of stream
    fn next_buffer(&mut self) -> Result<Option<AudioBuffer>, DecodeError>;

    /// Total length in frames when the container reports it
    fn total_frames(&self) -> Option<u64> {
        None
    }

    /// Release the underlying handle. Idempotent.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Resolves item paths to streams and owns their lifetime
pub trait AudioSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioStream>, ResourceError>;

    /// Fresh stream positioned at frame 0, used for resume
    fn reopen(&self, path: &Path) -> Result<Box<dyn AudioStream>, ResourceError> {
        self.open(path)
    }

    /// Close and drop a stream. `None` is a no-op.
    fn close(&self, stream: Option<Box<dyn AudioStream>>) {
        if let Some(mut stream) = stream {
            stream.close();
        }
    }

    /// Number of handles opened and not yet closed, when tracked
    fn open_handles(&self) -> Option<usize> {
        None
    }
}

/// Counts handle acquisitions and releases
#[derive(Debug, Clone, Default)]
pub struct HandleLedger {
    counts: Arc<LedgerCounts>,
}

#[derive(Debug, Default)]
struct LedgerCounts {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl HandleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an open; the returned lease records the matching close
    pub fn acquire(&self) -> HandleLease {
        self.counts.opened.fetch_add(1, Ordering::SeqCst);
        HandleLease {
            ledger: self.clone(),
            released: false,
        }
    }

    pub fn opened(&self) -> usize {
        self.counts.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counts.closed.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.opened().saturating_sub(self.closed())
    }
}

/// Released exactly once, explicitly or on drop
#[derive(Debug)]
pub struct HandleLease {
    ledger: HandleLedger,
    released: bool,
}

impl HandleLease {
    pub fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.ledger.counts.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for HandleLease {
    fn drop(&mut self) {
        self.release();
    }
}

/// Opens files through symphonia's default probe and codec registry
#[derive(Debug, Clone, Default)]
pub struct FileAudioSource {
    ledger: HandleLedger,
}

impl FileAudioSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> &HandleLedger {
        &self.ledger
    }
}

impl AudioSource for FileAudioSource {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioStream>, ResourceError> {
        let stream = SymphoniaStream::open(path, self.ledger.acquire())?;
        debug!(
            "Opened '{}' ({}, {} live handle(s))",
            path.display(),
            stream.format.format_description(),
            self.ledger.live()
        );
        Ok(Box::new(stream))
    }

    fn open_handles(&self) -> Option<usize> {
        Some(self.ledger.live())
    }
}

struct Decoding {
    reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
}

struct SymphoniaStream {
    path: PathBuf,
    decoding: Option<Decoding>,
    track_id: u32,
    format: StreamFormat,
    total_frames: Option<u64>,
    /// First buffer, decoded at open time to validate the resource
    primed: Option<AudioBuffer>,
    lease: HandleLease,
}

impl SymphoniaStream {
    fn open(path: &Path, lease: HandleLease) -> Result<Self, ResourceError> {
        let display = path.display().to_string();

        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ResourceError::NotFound { path: display.clone() },
            _ => ResourceError::Unreadable {
                path: display.clone(),
                source: e,
            },
        })?;
        if file.metadata().map(|m| m.is_dir()).unwrap_or(false) {
            return Err(ResourceError::Undecodable {
                path: display,
                reason: "path is a directory".to_string(),
            });
        }

        let media_source = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let undecodable = |reason: String| ResourceError::Undecodable {
            path: display.clone(),
            reason,
        };

        let probed = symphonia::default::get_probe()
            .format(&hint, media_source, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| undecodable(format!("probe failed: {}", e)))?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| undecodable("no audio track".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| undecodable(format!("no decoder: {}", e)))?;

        let mut stream = Self {
            path: path.to_path_buf(),
            decoding: Some(Decoding { reader, decoder }),
            track_id,
            format: StreamFormat::new(
                params.sample_rate.unwrap_or(0),
                params.channels.map(|c| c.count() as u16).unwrap_or(0),
            ),
            total_frames: params.n_frames,
            primed: None,
            lease,
        };

        match stream.decode_packet() {
            Ok(Some(first)) => {
                stream.format = first.format();
                stream.primed = Some(first);
            }
            Ok(None) => {}
            Err(e) => return Err(undecodable(e.to_string())),
        }

        if stream.format.sample_rate == 0 || stream.format.channels == 0 {
            return Err(undecodable("unknown sample rate or channel layout".to_string()));
        }

        Ok(stream)
    }

    fn decode_packet(&mut self) -> Result<Option<AudioBuffer>, DecodeError> {
        let decoding = self.decoding.as_mut().ok_or(DecodeError::StreamClosed)?;
        let mut bad_packets = 0;

        loop {
            let packet = match decoding.reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref err)) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoding.decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(err)) => return Err(DecodeError::Io(err)),
                Err(err) => return Err(DecodeError::CorruptedStream(err.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match decoding.decoder.decode(&packet) {
                Ok(decoded) => {
                    if decoded.frames() == 0 {
                        continue;
                    }
                    let spec = *decoded.spec();
                    let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    samples.copy_interleaved_ref(decoded);
                    return Ok(Some(AudioBuffer::from_interleaved(
                        samples.samples().to_vec(),
                        spec.channels.count() as u16,
                        spec.rate,
                    )));
                }
                Err(SymphoniaError::DecodeError(msg)) => {
                    bad_packets += 1;
                    warn!("Skipping corrupt packet in '{}': {}", self.path.display(), msg);
                    if bad_packets >= MAX_CONSECUTIVE_BAD_PACKETS {
                        return Err(DecodeError::CorruptedStream(msg.to_string()));
                    }
                }
                Err(err) => return Err(DecodeError::DecodeFailed(err.to_string())),
            }
        }
    }
}

impl AudioStream for SymphoniaStream {
    fn format(&self) -> StreamFormat {
        self.format
    }

    fn next_buffer(&mut self) -> Result<Option<AudioBuffer>, DecodeError> {
        if let Some(first) = self.primed.take() {
            return Ok(Some(first));
        }
        self.decode_packet()
    }

    fn total_frames(&self) -> Option<u64> {
        self.total_frames
    }

    fn close(&mut self) {
        if self.decoding.take().is_some() {
            trace!("Closed '{}'", self.path.display());
        }
        self.primed = None;
        self.lease.release();
    }

    fn is_closed(&self) -> bool {
        self.decoding.is_none()
    }
}

/// WAV fixtures for tests
#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::Path;

    /// Write a 16-bit PCM WAV whose left channel ramps so frames are identifiable
    pub(crate) fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: u32) {
        let data_len = frames * channels as u32 * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * channels as u32 * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for frame in 0..frames {
            for _ in 0..channels {
                let value = (frame % 1000) as i16 * 16;
                bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }
}
