//! Video-to-audio conversion library
//!
//! Takes an uploaded video file and produces an audio-only file in a
//! caller-chosen codec, bitrate, sample rate, and channel count. The heart of
//! the crate is [`transcode::TranscodePipeline`], which stages the upload
//! into scratch storage, demuxes and decodes the source down to raw audio
//! frames, re-encodes them with FFmpeg, and guarantees that no temporary file
//! survives the conversion on any exit path.

pub mod error;
pub mod ffmpeg_utils;
pub mod formats;
pub mod request;
pub mod tempfiles;
pub mod transcode;

#[cfg(test)]
mod tests;

pub use error::{ConvertError, Result};
pub use ffmpeg_utils::{init, version_info};
pub use formats::{AudioFormatSpec, FORMAT_CATALOG};
pub use request::{ConversionOutput, ConversionRequest, ResolvedAudioParams};
pub use transcode::TranscodePipeline;
