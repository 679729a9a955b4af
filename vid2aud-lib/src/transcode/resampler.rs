//! Audio resampler for the transcoding pipeline
//!
//! Converts decoded PCM frames to the sample format, channel layout, and rate
//! the output encoder was opened with.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::resampling;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

use crate::error::{ConvertError, Result};

/// Audio resampler wrapping FFmpeg's `SwrContext`
pub struct AudioResampler {
    context: resampling::Context,
}

impl AudioResampler {
    /// Create a resampler that converts the format described by `src_frame`
    /// to the encoder's target format.
    pub fn new(
        src_frame: &ffmpeg::util::frame::Audio,
        dst_format: Sample,
        dst_layout: ChannelLayout,
        dst_rate: u32,
    ) -> Result<Self> {
        let src_layout = if src_frame.channel_layout().bits() == 0 {
            // No channel layout set; fall back based on channel count
            match src_frame.channels() {
                1 => ChannelLayout::MONO,
                _ => ChannelLayout::STEREO,
            }
        } else {
            src_frame.channel_layout()
        };

        let context = resampling::Context::get(
            src_frame.format(),
            src_layout,
            src_frame.rate(),
            dst_format,
            dst_layout,
            dst_rate,
        )
        .map_err(|e| {
            ConvertError::Conversion(format!("failed to create resampling context: {}", e))
        })?;

        Ok(Self { context })
    }

    /// Convert one input PCM frame into one or more resampled output frames.
    ///
    /// Returns an empty `Vec` when the resampler needs more input to produce
    /// output (can happen at stream start/end with certain sample rates).
    pub fn convert(
        &mut self,
        frame: &ffmpeg::util::frame::Audio,
    ) -> Result<Vec<ffmpeg::util::frame::Audio>> {
        // Output frame must be empty: swr_convert_frame allocates the correct
        // buffer (format/rate/channels) from the SwrContext config.
        let mut out = ffmpeg::util::frame::Audio::empty();

        self.context
            .run(frame, &mut out)
            .map_err(|e| ConvertError::Conversion(format!("resampling error: {}", e)))?;

        if out.samples() == 0 {
            return Ok(vec![]);
        }

        Ok(vec![out])
    }

    /// Flush any remaining samples from the internal resampler buffer.
    ///
    /// When source and output rates match (no actual resampling needed), the
    /// SwrContext has nothing buffered and `flush()` returns an error; this
    /// is fine, we just return an empty vec.
    pub fn flush(&mut self) -> Result<Vec<ffmpeg::util::frame::Audio>> {
        let mut out = ffmpeg::util::frame::Audio::empty();
        match self.context.flush(&mut out) {
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("resampler flush returned non-fatal error: {}", e);
                return Ok(vec![]);
            }
        }

        if out.samples() == 0 {
            return Ok(vec![]);
        }

        Ok(vec![out])
    }
}
