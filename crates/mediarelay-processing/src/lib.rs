//! Mediarelay Processing Library
//!
//! Media tooling behind the relay: the faststart remux, per-request staging
//! files, MP4 atom inspection and the preview converter.

pub mod atoms;
pub mod preview;
pub mod staging;
pub mod transcode;

pub use atoms::{is_faststart, top_level_atoms, Atom};
pub use preview::{EngineLoader, FfmpegEngineLoader, PreviewConverter, PreviewEngine};
pub use staging::StagingFiles;
pub use transcode::{FfmpegTranscoder, TranscodeError, Transcoder};
