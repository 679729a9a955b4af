//! Media encoder for the transcoding pipeline
//!
//! Opens the output container on the reserved scratch path (FFmpeg selects
//! the muxer from the extension, as the catalog guarantees one), configures
//! the target audio codec with the resolved parameters, and writes decoded
//! frames incrementally: resample to the codec's native format, re-cut to the
//! codec's frame size, encode, mux.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg_next::codec;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

use crate::error::{ConvertError, Result};
use crate::ffmpeg_utils::helpers;
use crate::formats::AudioFormatSpec;
use crate::request::ResolvedAudioParams;

use super::chunker::FrameChunker;
use super::resampler::AudioResampler;

/// Fallback sample format when a codec does not advertise its supported list
const FALLBACK_SAMPLE_FMT: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);

struct EncoderInner {
    output: ffmpeg::format::context::Output,
    encoder: ffmpeg::encoder::Audio,
    /// Created lazily from the first decoded frame, whose format is unknown
    /// until decoding starts
    resampler: Option<AudioResampler>,
    /// Present only for codecs with a fixed frame size
    chunker: Option<FrameChunker>,
    enc_time_base: ffmpeg::Rational,
    sample_format: Sample,
    layout: ChannelLayout,
    rate: u32,
    next_pts: i64,
}

/// Real media encoder backed by FFmpeg codec and muxer contexts.
pub struct MediaEncoder {
    inner: Option<EncoderInner>,
}

impl MediaEncoder {
    /// Open the destination container and audio codec with the resolved
    /// parameters. Requests the best achievable quality for the codec; a
    /// best-effort hint that lossless codecs ignore along with the bitrate.
    pub fn open<P: AsRef<Path>>(
        path: P,
        spec: &AudioFormatSpec,
        params: &ResolvedAudioParams,
        bitrate_bps: u32,
    ) -> Result<Self> {
        let path = path.as_ref();

        let codec = codec::encoder::find(spec.codec_id).ok_or_else(|| {
            ConvertError::EncodeFailure(format!(
                "no encoder for {:?} in this FFmpeg build",
                spec.codec_id
            ))
        })?;

        let sample_format = codec
            .audio()
            .ok()
            .and_then(|caps| caps.formats().and_then(|mut formats| formats.next()))
            .unwrap_or(FALLBACK_SAMPLE_FMT);
        let layout = layout_for_channels(params.channel_count);
        let rate = params.sample_rate_hz;

        let mut output = ffmpeg::format::output(&path).map_err(|e| {
            ConvertError::EncodeFailure(format!("failed to open output {:?}: {}", path, e))
        })?;

        // Build context and configure the audio encoder BEFORE opening
        let mut context = codec::Context::new_with_codec(codec);
        context.set_time_base(ffmpeg::Rational::new(1, rate as i32));

        let mut audio_enc = context.encoder().audio().map_err(|e| {
            ConvertError::EncodeFailure(format!("cannot get audio encoder handle: {}", e))
        })?;

        audio_enc.set_rate(rate as i32);
        audio_enc.set_format(sample_format);
        audio_enc.set_channel_layout(layout);
        audio_enc.set_bit_rate(bitrate_bps as usize);
        // Best quality the codec can deliver at the requested bitrate
        audio_enc.set_quality(0);

        if output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER)
        {
            audio_enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        // strict=experimental admits FFmpeg's built-in Vorbis encoder
        let mut open_opts = ffmpeg::Dictionary::new();
        open_opts.set("strict", "experimental");

        let encoder = audio_enc.open_as_with(codec, open_opts).map_err(|e| {
            ConvertError::EncodeFailure(format!(
                "failed to open {:?} encoder: {}",
                spec.codec_id, e
            ))
        })?;

        let mut out_stream = output
            .add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))
            .map_err(|e| {
                ConvertError::EncodeFailure(format!("failed to add output stream: {}", e))
            })?;
        out_stream.set_parameters(helpers::encoder_codec_parameters(&encoder));
        // Let the muxer decide the correct tag for the container
        helpers::stream_reset_codec_tag(&mut out_stream);
        out_stream.set_time_base(ffmpeg::Rational::new(1, rate as i32));
        drop(out_stream);

        output.write_header().map_err(|e| {
            ConvertError::EncodeFailure(format!("failed to write output header: {}", e))
        })?;

        let frame_size = encoder.frame_size() as usize;
        let chunker = if frame_size > 0 {
            Some(FrameChunker::new(sample_format, layout, rate, frame_size))
        } else {
            // Variable frame size (PCM): frames pass through unchanged
            None
        };

        tracing::debug!(
            path = %path.display(),
            codec = ?spec.codec_id,
            rate,
            channels = params.channel_count,
            bitrate = bitrate_bps,
            frame_size,
            format = ?sample_format,
            "encoder opened"
        );

        Ok(Self {
            inner: Some(EncoderInner {
                output,
                encoder,
                resampler: None,
                chunker,
                enc_time_base: ffmpeg::Rational::new(1, rate as i32),
                sample_format,
                layout,
                rate,
                next_pts: 0,
            }),
        })
    }

    /// Encode one decoded frame and append its encoded representation to the
    /// output container.
    pub fn write(&mut self, frame: &ffmpeg::util::frame::Audio) -> Result<()> {
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| ConvertError::Internal("write on a closed encoder".to_string()))?;

        if inner.resampler.is_none() {
            tracing::debug!(
                sample_rate = frame.rate(),
                channels = frame.channels(),
                format = ?frame.format(),
                "creating resampler from first decoded frame"
            );
            inner.resampler = Some(AudioResampler::new(
                frame,
                inner.sample_format,
                inner.layout,
                inner.rate,
            )?);
        }

        let converted = inner
            .resampler
            .as_mut()
            .map(|r| r.convert(frame))
            .transpose()?
            .unwrap_or_default();
        for pcm in converted {
            consume(inner, pcm)?;
        }
        Ok(())
    }

    /// Finalize the container: flush the resampler and the buffered tail,
    /// drain the codec, write the trailer, release resources. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        let mut inner = match self.inner.take() {
            Some(inner) => inner,
            None => return Ok(()),
        };

        if let Some(mut resampler) = inner.resampler.take() {
            loop {
                let frames = resampler.flush()?;
                if frames.is_empty() {
                    break;
                }
                for pcm in frames {
                    consume(&mut inner, pcm)?;
                }
            }
        }

        // A final frame shorter than the codec's frame size is permitted
        if let Some(tail) = inner.chunker.as_mut().and_then(|c| c.drain_tail()) {
            encode_frame(&mut inner, tail)?;
        }

        match inner.encoder.send_eof() {
            Ok(()) | Err(ffmpeg::Error::Eof) => {}
            Err(e) => {
                return Err(ConvertError::EncodeFailure(format!(
                    "encoder send_eof error: {}",
                    e
                )));
            }
        }
        drain_packets(&mut inner)?;

        inner
            .output
            .write_trailer()
            .map_err(|e| ConvertError::EncodeFailure(format!("failed to write trailer: {}", e)))?;

        tracing::debug!("encoder closed");
        Ok(())
    }

    /// Best-effort close for the failure path: a close failure is logged and
    /// never re-raised over the original error.
    pub fn abort(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(error = %e, "encoder close failed during cleanup");
        }
    }
}

/// Route one resampled PCM frame through the chunker (if the codec needs
/// fixed-size frames) and into the codec.
fn consume(inner: &mut EncoderInner, frame: ffmpeg::util::frame::Audio) -> Result<()> {
    if let Some(chunker) = inner.chunker.as_mut() {
        chunker.push(&frame);
    } else {
        return encode_frame(inner, frame);
    }
    while let Some(full) = inner.chunker.as_mut().and_then(|c| c.pop_full()) {
        encode_frame(inner, full)?;
    }
    Ok(())
}

fn encode_frame(inner: &mut EncoderInner, mut frame: ffmpeg::util::frame::Audio) -> Result<()> {
    frame.set_pts(Some(inner.next_pts));
    inner.next_pts += frame.samples() as i64;

    inner
        .encoder
        .send_frame(&frame)
        .map_err(|e| ConvertError::EncodeFailure(format!("encoder rejected frame: {}", e)))?;

    drain_packets(inner)
}

fn drain_packets(inner: &mut EncoderInner) -> Result<()> {
    // The muxer may have rewritten the stream timebase in write_header
    let ost_time_base = inner
        .output
        .streams()
        .next()
        .map(|s| s.time_base())
        .unwrap_or(inner.enc_time_base);

    loop {
        let mut packet = ffmpeg::codec::packet::Packet::empty();
        match inner.encoder.receive_packet(&mut packet) {
            Ok(()) => {
                packet.set_stream(0);
                packet.rescale_ts(inner.enc_time_base, ost_time_base);
                packet.write_interleaved(&mut inner.output).map_err(|e| {
                    ConvertError::EncodeFailure(format!("failed to write packet: {}", e))
                })?;
            }
            Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => break,
            Err(ffmpeg::Error::Eof) => break,
            Err(e) => {
                return Err(ConvertError::EncodeFailure(format!(
                    "encoder receive_packet error: {}",
                    e
                )));
            }
        }
    }
    Ok(())
}

/// Default channel layout for a caller-requested channel count (1-8).
pub(crate) fn layout_for_channels(channels: u16) -> ChannelLayout {
    match channels {
        1 => ChannelLayout::MONO,
        2 => ChannelLayout::STEREO,
        3 => ChannelLayout::SURROUND,
        4 => ChannelLayout::QUAD,
        5 => ChannelLayout::_5POINT0,
        6 => ChannelLayout::_5POINT1,
        7 => ChannelLayout::_6POINT1,
        8 => ChannelLayout::_7POINT1,
        _ => ChannelLayout::STEREO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats;

    fn init() {
        crate::ffmpeg_utils::init().unwrap();
    }

    #[test]
    fn test_encoders_available() {
        init();
        // Native encoders present in every FFmpeg build; mp3 needs
        // libmp3lame and is probed per-test instead.
        for token in ["aac", "wav", "flac"] {
            let spec = formats::resolve(token).unwrap();
            assert!(
                codec::encoder::find(spec.codec_id).is_some(),
                "encoder for {:?} missing",
                spec.codec_id
            );
        }
    }

    #[test]
    fn test_layout_for_channels() {
        assert_eq!(layout_for_channels(1), ChannelLayout::MONO);
        assert_eq!(layout_for_channels(2), ChannelLayout::STEREO);
        assert_eq!(layout_for_channels(6), ChannelLayout::_5POINT1);
        assert_eq!(layout_for_channels(8), ChannelLayout::_7POINT1);
    }

    #[test]
    fn test_open_and_close_idempotent() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mp3");
        let spec = formats::resolve("mp3").unwrap();
        if codec::encoder::find(spec.codec_id).is_none() {
            return;
        }
        let params = ResolvedAudioParams {
            sample_rate_hz: 44_100,
            channel_count: 2,
        };

        let mut encoder = MediaEncoder::open(&path, spec, &params, 128_000).unwrap();
        encoder.close().unwrap();
        // Second close is a no-op
        encoder.close().unwrap();
        encoder.abort();
        assert!(path.exists());
    }

    #[test]
    fn test_write_after_close_fails() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let spec = formats::resolve("wav").unwrap();
        let params = ResolvedAudioParams {
            sample_rate_hz: 8_000,
            channel_count: 1,
        };

        let mut encoder = MediaEncoder::open(&path, spec, &params, 32_000).unwrap();
        encoder.close().unwrap();

        let frame = ffmpeg::util::frame::Audio::new(
            FALLBACK_SAMPLE_FMT,
            1024,
            ChannelLayout::MONO,
        );
        assert!(matches!(
            encoder.write(&frame),
            Err(ConvertError::Internal(_))
        ));
    }
}
