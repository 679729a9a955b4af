//! Static catalog of supported target audio formats
//!
//! Maps a caller-supplied format token onto the FFmpeg codec, MIME type, and
//! container extension used for the output file. The catalog is a fixed,
//! closed lookup table defined at compile time.

use crate::error::{ConvertError, Result};
use ffmpeg_next as ffmpeg;

/// One entry of the format catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormatSpec {
    /// The caller-facing format token, lowercase
    pub token: &'static str,
    /// The FFmpeg codec used to encode the output
    pub codec_id: ffmpeg::codec::Id,
    /// MIME type reported back to the caller
    pub mime_type: &'static str,
    /// Output container extension; FFmpeg selects the muxer from it
    pub extension: &'static str,
}

/// The fixed set of supported target formats.
pub const FORMAT_CATALOG: &[AudioFormatSpec] = &[
    AudioFormatSpec {
        token: "mp3",
        codec_id: ffmpeg::codec::Id::MP3,
        mime_type: "audio/mpeg",
        extension: "mp3",
    },
    AudioFormatSpec {
        token: "aac",
        codec_id: ffmpeg::codec::Id::AAC,
        mime_type: "audio/aac",
        extension: "aac",
    },
    AudioFormatSpec {
        token: "wav",
        codec_id: ffmpeg::codec::Id::PCM_S16LE,
        mime_type: "audio/wav",
        extension: "wav",
    },
    AudioFormatSpec {
        token: "flac",
        codec_id: ffmpeg::codec::Id::FLAC,
        mime_type: "audio/flac",
        extension: "flac",
    },
    AudioFormatSpec {
        token: "ogg",
        codec_id: ffmpeg::codec::Id::VORBIS,
        mime_type: "audio/ogg",
        extension: "ogg",
    },
];

/// Resolve a format token against the catalog, case-insensitively.
///
/// Pure lookup with no side effects; fails with `UnsupportedFormat` when no
/// entry matches.
pub fn resolve(token: &str) -> Result<&'static AudioFormatSpec> {
    FORMAT_CATALOG
        .iter()
        .find(|spec| spec.token.eq_ignore_ascii_case(token))
        .ok_or_else(|| ConvertError::UnsupportedFormat(token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_all_tokens() {
        for token in ["mp3", "aac", "wav", "flac", "ogg"] {
            let spec = resolve(token).expect("token should resolve");
            assert_eq!(spec.token, token);
        }
    }

    #[test]
    fn test_resolve_case_insensitive() {
        assert_eq!(resolve("MP3").unwrap().token, "mp3");
        assert_eq!(resolve("Flac").unwrap().token, "flac");
        assert_eq!(resolve("WAV").unwrap().token, "wav");
    }

    #[test]
    fn test_resolve_unknown_token() {
        for token in ["ogv", "mp4", "opus", "", "mp3 "] {
            let err = resolve(token).unwrap_err();
            assert!(
                matches!(err, ConvertError::UnsupportedFormat(_)),
                "token {:?} should be rejected",
                token
            );
        }
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(resolve("mp3").unwrap().mime_type, "audio/mpeg");
        assert_eq!(resolve("aac").unwrap().mime_type, "audio/aac");
        assert_eq!(resolve("wav").unwrap().mime_type, "audio/wav");
        assert_eq!(resolve("flac").unwrap().mime_type, "audio/flac");
        assert_eq!(resolve("ogg").unwrap().mime_type, "audio/ogg");
    }

    #[test]
    fn test_codec_ids() {
        use ffmpeg::codec::Id;
        assert_eq!(resolve("mp3").unwrap().codec_id, Id::MP3);
        assert_eq!(resolve("wav").unwrap().codec_id, Id::PCM_S16LE);
        assert_eq!(resolve("ogg").unwrap().codec_id, Id::VORBIS);
    }
}
