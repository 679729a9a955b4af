//! Media decoder for the transcoding pipeline
//!
//! Opens a source container, selects its best audio stream, and exposes the
//! decoded PCM frames as a lazy, finite, non-restartable sequence. Packets
//! belonging to other streams (video, subtitles) are filtered out and never
//! reach the caller.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use crate::error::{ConvertError, Result};

/// Cap on container probing so the decoder never blocks indefinitely on an
/// ambiguous stream. Value is in microseconds with an SI suffix, as FFmpeg's
/// option parser expects.
const ANALYZE_DURATION: &str = "10M";

enum DrainState {
    /// Reading packets from the container
    Reading,
    /// Input exhausted, draining the decoder's buffered frames
    Flushing,
    /// Fully drained; `next_frame` yields `None` forever
    Finished,
}

struct DecoderInner {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Audio,
    stream_index: usize,
    state: DrainState,
}

/// Real media decoder backed by FFmpeg demuxer and codec contexts.
// Manual Debug impl below: the FFmpeg context types in `DecoderInner` do not
// implement `Debug`.
pub struct MediaDecoder {
    inner: Option<DecoderInner>,
    sample_rate: u32,
    channels: u16,
    estimated_frames: u64,
}

impl std::fmt::Debug for MediaDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDecoder")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("estimated_frames", &self.estimated_frames)
            .field("open", &self.inner.is_some())
            .finish()
    }
}

impl MediaDecoder {
    /// Open a source container and its best audio stream.
    ///
    /// Fails with `UnreadableSource` if the container cannot be parsed or
    /// contains no audio stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("threads", "auto");
        opts.set("analyzeduration", ANALYZE_DURATION);

        let input = ffmpeg::format::input_with_dictionary(&path, opts).map_err(|e| {
            ConvertError::UnreadableSource(format!("failed to open {:?}: {}", path, e))
        })?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Audio)
            .ok_or_else(|| {
                ConvertError::UnreadableSource("source contains no audio stream".to_string())
            })?;
        let stream_index = stream.index();
        let estimated_frames = stream.frames().max(0) as u64;

        let context =
            ffmpeg::codec::Context::from_parameters(stream.parameters()).map_err(|e| {
                ConvertError::UnreadableSource(format!(
                    "failed to create codec context for stream {}: {}",
                    stream_index, e
                ))
            })?;

        let decoder = context.decoder().audio().map_err(|e| {
            ConvertError::UnreadableSource(format!(
                "failed to open audio decoder for stream {}: {}",
                stream_index, e
            ))
        })?;

        let sample_rate = decoder.rate();
        let channels = decoder.channels();

        tracing::debug!(
            path = %path.display(),
            stream_index,
            sample_rate,
            channels,
            estimated_frames,
            "decoder opened"
        );

        Ok(Self {
            inner: Some(DecoderInner {
                input,
                decoder,
                stream_index,
                state: DrainState::Reading,
            }),
            sample_rate,
            channels,
            estimated_frames,
        })
    }

    /// Sample rate of the source audio stream.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Channel count of the source audio stream.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Estimated total audio frame count, 0 when the container does not
    /// declare it. Observability only, never a correctness signal.
    pub fn estimated_frame_count(&self) -> u64 {
        self.estimated_frames
    }

    /// Pull the next decoded audio frame, or `None` once the stream is
    /// exhausted. After the first `None` every further call returns `None`.
    pub fn next_frame(&mut self) -> Result<Option<ffmpeg::util::frame::Audio>> {
        let inner = match self.inner.as_mut() {
            Some(inner) => inner,
            None => return Ok(None),
        };

        loop {
            if let Some(frame) = receive_frame(&mut inner.decoder, inner.stream_index)? {
                return Ok(Some(frame));
            }

            match inner.state {
                DrainState::Reading => {
                    let mut packet = ffmpeg::codec::packet::Packet::empty();
                    match packet.read(&mut inner.input) {
                        Ok(()) => {
                            // Non-audio packets are skipped here, so they are
                            // never emitted into the frame sequence.
                            if packet.stream() == inner.stream_index {
                                send_packet(&mut inner.decoder, &packet, inner.stream_index)?;
                            }
                        }
                        Err(ffmpeg::Error::Eof) => {
                            send_eof(&mut inner.decoder, inner.stream_index)?;
                            inner.state = DrainState::Flushing;
                        }
                        Err(ffmpeg::Error::Other { errno })
                            if errno == ffmpeg::error::EAGAIN => {}
                        Err(e) => {
                            return Err(ConvertError::Conversion(format!(
                                "error reading packet from source: {}",
                                e
                            )));
                        }
                    }
                }
                DrainState::Flushing => {
                    inner.state = DrainState::Finished;
                }
                DrainState::Finished => return Ok(None),
            }
        }
    }

    /// Release all native decoding resources. Idempotent; safe to call after
    /// a partial failure.
    pub fn close(&mut self) {
        if self.inner.take().is_some() {
            tracing::debug!("decoder closed");
        }
    }
}

/// Send a compressed packet to the decoder.
///
/// `AVERROR_INVALIDDATA` is treated as non-fatal: some decoders emit it for
/// damaged or pre-roll packets that are safe to skip.
fn send_packet(
    decoder: &mut ffmpeg::decoder::Audio,
    packet: &ffmpeg::codec::packet::Packet,
    stream_index: usize,
) -> Result<()> {
    match decoder.send_packet(packet) {
        Ok(()) => Ok(()),
        Err(ffmpeg::Error::InvalidData) => {
            tracing::debug!(stream_index, "send_packet: skipping invalid packet");
            Ok(())
        }
        Err(e) => Err(ConvertError::Conversion(format!(
            "send_packet error on stream {}: {}",
            stream_index, e
        ))),
    }
}

/// Send EOF to flush the decoder's internal buffers.
///
/// EAGAIN and EOF responses mean the decoder has nothing buffered or is
/// already finished, which is not an error.
fn send_eof(decoder: &mut ffmpeg::decoder::Audio, stream_index: usize) -> Result<()> {
    match decoder.send_eof() {
        Ok(()) => Ok(()),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(()),
        Err(ffmpeg::Error::Eof) => Ok(()),
        Err(e) => Err(ConvertError::Conversion(format!(
            "send_eof error on stream {}: {}",
            stream_index, e
        ))),
    }
}

/// Receive one decoded PCM frame, or `None` if the decoder needs more input
/// or is drained.
fn receive_frame(
    decoder: &mut ffmpeg::decoder::Audio,
    stream_index: usize,
) -> Result<Option<ffmpeg::util::frame::Audio>> {
    let mut frame = ffmpeg::util::frame::Audio::empty();
    match decoder.receive_frame(&mut frame) {
        Ok(()) => Ok(Some(frame)),
        Err(ffmpeg::Error::Other { errno }) if errno == ffmpeg::error::EAGAIN => Ok(None),
        Err(ffmpeg::Error::Eof) => Ok(None),
        Err(e) => Err(ConvertError::Conversion(format!(
            "receive_frame error on stream {}: {}",
            stream_index, e
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        crate::ffmpeg_utils::init().unwrap();
    }

    #[test]
    fn test_decoders_available() {
        init();
        for id in [
            ffmpeg::codec::Id::AAC,
            ffmpeg::codec::Id::MP3,
            ffmpeg::codec::Id::FLAC,
        ] {
            assert!(
                ffmpeg::codec::decoder::find(id).is_some(),
                "decoder for {:?} missing",
                id
            );
        }
    }

    #[test]
    fn test_open_missing_file() {
        init();
        let err = MediaDecoder::open("/nonexistent/clip.mp4").unwrap_err();
        assert!(matches!(err, ConvertError::UnreadableSource(_)));
    }

    #[test]
    fn test_open_garbage_file() {
        init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp4");
        std::fs::write(&path, [0u8; 4096]).unwrap();

        let err = MediaDecoder::open(&path).unwrap_err();
        assert!(matches!(err, ConvertError::UnreadableSource(_)));
    }

    #[test]
    fn test_open_container_without_audio() {
        init();
        let dir = tempfile::tempdir().unwrap();
        // SubRip parses as a container with a single subtitle stream
        let path = dir.path().join("subs.srt");
        std::fs::write(&path, "1\n00:00:00,000 --> 00:00:01,000\nhello\n").unwrap();

        let err = MediaDecoder::open(&path).unwrap_err();
        assert!(matches!(err, ConvertError::UnreadableSource(_)));
    }

    #[test]
    fn test_close_idempotent() {
        init();
        // Exercise the idempotence contract on a handle that is already
        // closed: close is a no-op and next_frame stays at None.
        let mut decoder = MediaDecoder {
            inner: None,
            sample_rate: 0,
            channels: 0,
            estimated_frames: 0,
        };
        decoder.close();
        decoder.close();
        assert!(decoder.next_frame().unwrap().is_none());
    }
}
