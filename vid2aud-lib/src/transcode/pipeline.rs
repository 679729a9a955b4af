//! Transcode pipeline
//!
//! Orchestrates the full conversion: validate the request, stage the upload
//! into scratch storage, drive the decoder → encoder frame loop, read the
//! output back, and release every resource on success and failure alike.
//!
//! Cleanup is the safety-critical property here. The two scratch files are
//! owned by `TempFileHandle`s whose `Drop` removes them on every exit path,
//! and decoder/encoder handles are closed best-effort when the frame loop
//! fails, so a conversion can never leak filesystem artifacts.

use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};
use crate::formats::{self, AudioFormatSpec};
use crate::request::{ConversionOutput, ConversionRequest, ResolvedAudioParams};
use crate::tempfiles::TempFileArena;

use super::decoder::MediaDecoder;
use super::encoder::MediaEncoder;

/// Progress is logged every this many frames
const PROGRESS_FRAME_INTERVAL: u64 = 100;

/// Drives one conversion from validated request to encoded bytes.
///
/// Each conversion gets its own pipeline instance with its own decoder,
/// encoder, and scratch files; independent conversions share no mutable
/// state and may run concurrently.
pub struct TranscodePipeline {
    arena: TempFileArena,
}

impl Default for TranscodePipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscodePipeline {
    pub fn new() -> Self {
        Self {
            arena: TempFileArena::new(),
        }
    }

    /// Pipeline with scratch storage under a specific directory. Used by
    /// tests to assert the no-residue post-condition.
    pub fn with_temp_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            arena: TempFileArena::in_dir(dir),
        }
    }

    /// Run one conversion to completion.
    ///
    /// Validation failures propagate before any file is staged. Any later
    /// failure still removes both scratch files and closes both media
    /// handles before propagating.
    pub fn run(&self, request: &ConversionRequest) -> Result<ConversionOutput> {
        // Validating: format token and numeric ranges, before any resource
        let spec = formats::resolve(&request.target_format)?;
        request.validate()?;

        tracing::info!(
            file = %request.original_file_name,
            format = spec.token,
            bitrate = request.bitrate_bps,
            sample_rate = ?request.sample_rate_hz,
            channels = ?request.channel_count,
            "starting conversion"
        );

        // Staged: input copy written, output path reserved. Both handles
        // remove their files on drop, whichever way this function exits.
        let input = self.arena.stage_input(&request.source, request.source_extension())?;
        let output = self.arena.reserve_output(spec.extension);

        let params = self
            .transcode(input.path(), output.path(), spec, request)
            .map_err(wrap_unclassified)?;

        // Finalized: read the artifact back before the handles drop
        let data = std::fs::read(output.path())
            .map_err(|e| ConvertError::Conversion(format!("failed to read output: {}", e)))?;

        tracing::info!(
            file = %request.original_file_name,
            output_bytes = data.len(),
            sample_rate = params.sample_rate_hz,
            channels = params.channel_count,
            "conversion finished"
        );

        Ok(ConversionOutput {
            data,
            format: spec,
            params,
        })
    }

    /// Decoding+Encoding: the strictly sequential pull-then-push frame loop.
    /// Bounds memory to one frame in flight.
    fn transcode(
        &self,
        input_path: &Path,
        output_path: &Path,
        spec: &AudioFormatSpec,
        request: &ConversionRequest,
    ) -> Result<ResolvedAudioParams> {
        let mut decoder = MediaDecoder::open(input_path)?;

        // Resolution is sequenced after decoder open: the inherit-if-absent
        // defaults come from the source stream, not from constants.
        let params = ResolvedAudioParams::resolve(request, decoder.sample_rate(), decoder.channels());

        let mut encoder = MediaEncoder::open(output_path, spec, &params, request.bitrate_bps)?;

        let total_frames = decoder.estimated_frame_count();
        let mut processed: u64 = 0;

        let result = (|| -> Result<()> {
            while let Some(frame) = decoder.next_frame()? {
                encoder.write(&frame)?;
                processed += 1;

                if total_frames > 0 && processed % PROGRESS_FRAME_INTERVAL == 0 {
                    let progress = processed as f64 / total_frames as f64 * 100.0;
                    tracing::debug!(processed, total_frames, "progress: {:.1}%", progress);
                }
            }
            // Encoder first so buffered state flushes before decoder
            // resources are released
            encoder.close()?;
            decoder.close();
            Ok(())
        })();

        if let Err(e) = result {
            encoder.abort();
            decoder.close();
            return Err(e);
        }

        Ok(params)
    }
}

/// Wrap errors the taxonomy does not already classify as a conversion
/// failure; classified kinds and validation errors pass through untouched.
fn wrap_unclassified(err: ConvertError) -> ConvertError {
    if err.is_validation() {
        return err;
    }
    match err {
        ConvertError::Io(e) => ConvertError::Conversion(format!("I/O error: {}", e)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn request(format: &str, bitrate: u32) -> ConversionRequest {
        ConversionRequest {
            source: Bytes::from_static(b"definitely not a media file"),
            original_file_name: "clip.mp4".to_string(),
            target_format: format.to_string(),
            bitrate_bps: bitrate,
            sample_rate_hz: None,
            channel_count: None,
        }
    }

    #[test]
    fn test_unknown_format_fails_before_staging() {
        crate::ffmpeg_utils::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let pipeline = TranscodePipeline::with_temp_dir(dir.path());

        let err = pipeline.run(&request("ogv", 128_000)).unwrap_err();
        assert!(matches!(err, ConvertError::UnsupportedFormat(_)));
        // Nothing was staged
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_out_of_range_bitrate_fails_before_staging() {
        crate::ffmpeg_utils::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let pipeline = TranscodePipeline::with_temp_dir(dir.path());

        for bitrate in [31_999, 320_001] {
            let err = pipeline.run(&request("mp3", bitrate)).unwrap_err();
            assert!(matches!(err, ConvertError::InvalidInput(_)));
        }
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_wrap_unclassified() {
        let err = wrap_unclassified(ConvertError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )));
        assert!(matches!(err, ConvertError::Conversion(_)));

        // Validation-class errors are never re-wrapped
        let err = wrap_unclassified(ConvertError::InvalidInput("bitrate out of range".into()));
        assert!(err.is_validation());
        let err = wrap_unclassified(ConvertError::UnsupportedFormat("ogv".into()));
        assert!(err.is_validation());

        // Already-classified media errors pass through unchanged
        let err = wrap_unclassified(ConvertError::UnreadableSource("no audio".into()));
        assert!(matches!(err, ConvertError::UnreadableSource(_)));
    }

    #[test]
    fn test_unreadable_source_leaves_no_residue() {
        crate::ffmpeg_utils::init().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let pipeline = TranscodePipeline::with_temp_dir(dir.path());

        let err = pipeline.run(&request("mp3", 128_000)).unwrap_err();
        assert!(matches!(err, ConvertError::UnreadableSource(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
