//! Sample FIFO for fixed-frame-size encoders
//!
//! Most audio encoders demand an exact number of samples per frame (AAC 1024,
//! MP3 1152, ...) while decoders and the resampler produce frames of whatever
//! size the source dictated. The chunker buffers raw plane bytes and re-cuts
//! them into frames of the encoder's size. Works for any planar or packed
//! sample format because it never interprets the sample values.

use ffmpeg_next as ffmpeg;
use ffmpeg_next::util::channel_layout::ChannelLayout;
use ffmpeg_next::util::format::sample::Sample;

use crate::ffmpeg_utils::helpers;

pub struct FrameChunker {
    format: Sample,
    layout: ChannelLayout,
    rate: u32,
    /// Bytes per sample within one plane: `bytes(format)` for planar
    /// formats, `bytes(format) * channels` for packed ones.
    stride: usize,
    /// One buffer per plane (a single one for packed formats)
    planes: Vec<Vec<u8>>,
    /// Samples per channel the encoder expects in every full frame
    frame_size: usize,
}

impl FrameChunker {
    pub fn new(format: Sample, layout: ChannelLayout, rate: u32, frame_size: usize) -> Self {
        let channels = layout.channels().max(1) as usize;
        let (plane_count, stride) = if format.is_planar() {
            (channels, format.bytes())
        } else {
            (1, format.bytes() * channels)
        };
        Self {
            format,
            layout,
            rate,
            stride,
            planes: vec![Vec::new(); plane_count],
            frame_size,
        }
    }

    /// Samples per channel currently buffered.
    pub fn buffered_samples(&self) -> usize {
        self.planes[0].len() / self.stride
    }

    /// Append one frame's samples to the buffer. The frame must match the
    /// format/layout/rate the chunker was built with (the resampler
    /// guarantees this).
    pub fn push(&mut self, frame: &ffmpeg::util::frame::Audio) {
        let samples = frame.samples();
        let take = samples * self.stride;
        for (idx, plane) in self.planes.iter_mut().enumerate() {
            let data = helpers::audio_plane_data(frame, idx);
            // linesize may include alignment padding past the payload
            plane.extend_from_slice(&data[..take.min(data.len())]);
        }
    }

    /// Cut one full frame of exactly `frame_size` samples, or `None` if not
    /// enough samples are buffered yet.
    pub fn pop_full(&mut self) -> Option<ffmpeg::util::frame::Audio> {
        if self.buffered_samples() < self.frame_size {
            return None;
        }
        Some(self.cut(self.frame_size))
    }

    /// Drain whatever remains as one final short frame. Encoders accept a
    /// smaller frame only as the very last one before EOF.
    pub fn drain_tail(&mut self) -> Option<ffmpeg::util::frame::Audio> {
        let remaining = self.buffered_samples();
        if remaining == 0 {
            return None;
        }
        Some(self.cut(remaining))
    }

    fn cut(&mut self, samples: usize) -> ffmpeg::util::frame::Audio {
        let take = samples * self.stride;
        let mut out = ffmpeg::util::frame::Audio::new(self.format, samples, self.layout);
        out.set_rate(self.rate);
        for (idx, plane) in self.planes.iter_mut().enumerate() {
            let dst = helpers::audio_plane_data_mut(&mut out, idx);
            dst[..take].copy_from_slice(&plane[..take]);
            plane.drain(..take);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLTP: Sample = Sample::F32(ffmpeg::util::format::sample::Type::Planar);
    const S16: Sample = Sample::I16(ffmpeg::util::format::sample::Type::Packed);

    fn frame(format: Sample, samples: usize, layout: ChannelLayout, fill: u8) -> ffmpeg::util::frame::Audio {
        crate::ffmpeg_utils::init().unwrap();
        let mut f = ffmpeg::util::frame::Audio::new(format, samples, layout);
        f.set_rate(44_100);
        let planes = if format.is_planar() {
            layout.channels() as usize
        } else {
            1
        };
        for idx in 0..planes {
            for b in helpers::audio_plane_data_mut(&mut f, idx).iter_mut() {
                *b = fill;
            }
        }
        f
    }

    #[test]
    fn test_planar_rechunk() {
        let mut chunker = FrameChunker::new(FLTP, ChannelLayout::STEREO, 44_100, 1024);
        // Opus-style 960-sample frames into 1024-sample chunks
        for _ in 0..4 {
            chunker.push(&frame(FLTP, 960, ChannelLayout::STEREO, 1));
        }
        let mut full = 0;
        while let Some(f) = chunker.pop_full() {
            assert_eq!(f.samples(), 1024);
            assert_eq!(f.rate(), 44_100);
            full += 1;
        }
        assert_eq!(full, 3);
        let tail = chunker.drain_tail().unwrap();
        assert_eq!(tail.samples(), 4 * 960 - 3 * 1024);
        assert!(chunker.drain_tail().is_none());
    }

    #[test]
    fn test_packed_rechunk() {
        let mut chunker = FrameChunker::new(S16, ChannelLayout::MONO, 44_100, 1152);
        chunker.push(&frame(S16, 2000, ChannelLayout::MONO, 7));
        let f = chunker.pop_full().unwrap();
        assert_eq!(f.samples(), 1152);
        assert!(chunker.pop_full().is_none());
        assert_eq!(chunker.drain_tail().unwrap().samples(), 2000 - 1152);
    }

    #[test]
    fn test_payload_preserved() {
        let mut chunker = FrameChunker::new(FLTP, ChannelLayout::MONO, 44_100, 100);
        chunker.push(&frame(FLTP, 100, ChannelLayout::MONO, 0x3f));
        let out = chunker.pop_full().unwrap();
        let data = helpers::audio_plane_data(&out, 0);
        assert!(data[..100 * 4].iter().all(|&b| b == 0x3f));
    }

    #[test]
    fn test_empty_drain() {
        let mut chunker = FrameChunker::new(FLTP, ChannelLayout::STEREO, 48_000, 1024);
        assert!(chunker.pop_full().is_none());
        assert!(chunker.drain_tail().is_none());
    }
}
