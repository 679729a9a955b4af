//! Conversion request and resolved-parameter types

use bytes::Bytes;

use crate::error::{ConvertError, Result};
use crate::formats::AudioFormatSpec;

/// Minimum accepted target bitrate, bits per second
pub const MIN_BITRATE_BPS: u32 = 32_000;
/// Maximum accepted target bitrate, bits per second
pub const MAX_BITRATE_BPS: u32 = 320_000;
/// Minimum accepted sample rate, Hz
pub const MIN_SAMPLE_RATE_HZ: u32 = 8_000;
/// Maximum accepted sample rate, Hz
pub const MAX_SAMPLE_RATE_HZ: u32 = 192_000;
/// Minimum accepted channel count
pub const MIN_CHANNELS: u16 = 1;
/// Maximum accepted channel count
pub const MAX_CHANNELS: u16 = 8;
/// Maximum accepted source payload size (500 MiB)
pub const MAX_SOURCE_BYTES: usize = 500 * 1024 * 1024;

/// An immutable conversion request, built from caller input.
///
/// Bounds are re-checked by the pipeline before any file is staged, so a
/// request that fails validation never touches the filesystem.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    /// The uploaded source content
    pub source: Bytes,
    /// Original upload file name, used for staging and output naming
    pub original_file_name: String,
    /// Target format token, resolved against the format catalog
    pub target_format: String,
    /// Target bitrate in bits per second
    pub bitrate_bps: u32,
    /// Target sample rate; inherited from the source stream when absent
    pub sample_rate_hz: Option<u32>,
    /// Target channel count; inherited from the source stream when absent
    pub channel_count: Option<u16>,
}

impl ConversionRequest {
    /// Check every numeric bound and the payload itself.
    ///
    /// The format token is validated separately against the catalog.
    pub fn validate(&self) -> Result<()> {
        if self.source.is_empty() {
            return Err(ConvertError::InvalidInput(
                "source file must not be empty".to_string(),
            ));
        }
        if self.source.len() > MAX_SOURCE_BYTES {
            return Err(ConvertError::InvalidInput(format!(
                "source file exceeds the {} MiB limit",
                MAX_SOURCE_BYTES / (1024 * 1024)
            )));
        }
        if !(MIN_BITRATE_BPS..=MAX_BITRATE_BPS).contains(&self.bitrate_bps) {
            return Err(ConvertError::InvalidInput(format!(
                "bitrate {} out of range ({}-{})",
                self.bitrate_bps, MIN_BITRATE_BPS, MAX_BITRATE_BPS
            )));
        }
        if let Some(rate) = self.sample_rate_hz {
            if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&rate) {
                return Err(ConvertError::InvalidInput(format!(
                    "sample rate {} out of range ({}-{})",
                    rate, MIN_SAMPLE_RATE_HZ, MAX_SAMPLE_RATE_HZ
                )));
            }
        }
        if let Some(channels) = self.channel_count {
            if !(MIN_CHANNELS..=MAX_CHANNELS).contains(&channels) {
                return Err(ConvertError::InvalidInput(format!(
                    "channel count {} out of range ({}-{})",
                    channels, MIN_CHANNELS, MAX_CHANNELS
                )));
            }
        }
        Ok(())
    }

    /// Extension of the uploaded file, used to name the staged input copy so
    /// FFmpeg can use it as a demuxer hint. Falls back to "tmp".
    pub fn source_extension(&self) -> &str {
        match self.original_file_name.rsplit_once('.') {
            Some((_, ext))
                if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                ext
            }
            _ => "tmp",
        }
    }
}

/// Check that a declared media type classifies the upload as video.
///
/// This check belongs to the request boundary; the pipeline itself never
/// looks at the declared type.
pub fn validate_content_type(content_type: Option<&str>) -> Result<()> {
    match content_type {
        Some(ct) if ct.starts_with("video/") => Ok(()),
        _ => Err(ConvertError::InvalidInput(
            "only video uploads are supported".to_string(),
        )),
    }
}

/// Effective output parameters, computed once per conversion after the
/// decoder has reported the source stream metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAudioParams {
    pub sample_rate_hz: u32,
    pub channel_count: u16,
}

impl ResolvedAudioParams {
    /// Caller-supplied values win; anything absent inherits from the opened
    /// source stream. The source values are unknown before decoder open, so
    /// this must not be called earlier.
    pub fn resolve(
        request: &ConversionRequest,
        source_sample_rate: u32,
        source_channels: u16,
    ) -> Self {
        Self {
            sample_rate_hz: request.sample_rate_hz.unwrap_or(source_sample_rate),
            channel_count: request.channel_count.unwrap_or(source_channels),
        }
    }
}

/// The result of a successful conversion.
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// The complete encoded output
    pub data: Vec<u8>,
    /// The resolved format, carrying the MIME type for the response
    pub format: &'static AudioFormatSpec,
    /// The effective sample rate and channel count of the output
    pub params: ResolvedAudioParams,
}
