pub mod buffer;
pub mod engine;
pub mod output;
pub mod position;
pub mod resampler;
pub mod source;
pub(crate) mod worker;

// Re-export the engine surface
pub use engine::{AutoAdvance, EngineSettings, NoopListener, PlaybackEngine, PlaybackListener};

// Re-export stream and output types
pub use output::{AudioOutput, AudioSink, CpalOutput, NullOutput, OutputSettings, SinkContext, Volume};
pub use source::{is_supported_extension, AudioSource, AudioStream, FileAudioSource, HandleLease, HandleLedger};

pub use buffer::{PushOutcome, SampleFifo};
pub use position::PositionCounter;
pub use resampler::{FormatAdapter, LinearResampler};
