//! FFmpeg library access
//!
//! Handles global FFmpeg initialization and hosts the safe wrappers around
//! the few raw FFI touches the transcoding pipeline needs.

pub mod helpers;

pub use ffmpeg_next as ffmpeg;

/// Initialize the FFmpeg library.
///
/// Must be called exactly once at application startup before any conversion
/// runs. Also lowers the FFmpeg log level so routine demuxer/muxer chatter
/// does not flood stderr; doing this per conversion would be a global write
/// race under concurrent requests.
pub fn init() -> Result<(), crate::error::ConvertError> {
    ffmpeg::init().map_err(|e| {
        crate::error::ConvertError::Internal(format!("ffmpeg::init() failed: {}", e))
    })?;

    // SAFETY: modifies global FFmpeg state; called once at startup before any
    // conversion thread exists.
    unsafe {
        ffmpeg::ffi::av_log_set_level(ffmpeg::ffi::AV_LOG_WARNING as i32);
    }

    tracing::info!("FFmpeg initialized");

    Ok(())
}

/// Version string of the linked FFmpeg libraries, for startup logging.
pub fn version_info() -> String {
    "FFmpeg 8.0+".to_string()
}
