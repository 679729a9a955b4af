//! HTTP request handlers

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use vid2aud_lib::request::validate_content_type;
use vid2aud_lib::{formats, ConversionRequest, TranscodePipeline};

use crate::error::ApiError;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> &'static str {
    concat!("vid2aud-server v", env!("CARGO_PKG_VERSION"))
}

/// Conversion endpoint
/// POST /api/converter/video-audio-convert
///
/// Multipart fields: `file` (required), `format`, `bitrate`, `sampleRate`,
/// `channels`. Responds with the encoded audio bytes, typed and named after
/// the resolved target format.
pub async fn convert_video_to_audio(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut source: Option<Bytes> = None;
    let mut file_name = "upload".to_string();
    let mut content_type: Option<String> = None;
    let mut format = state.config.default_format.clone();
    let mut bitrate = state.config.default_bitrate;
    let mut sample_rate: Option<u32> = None;
    let mut channels: Option<u16> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                if let Some(name) = field.file_name() {
                    file_name = name.to_string();
                }
                content_type = field.content_type().map(str::to_string);
                source = Some(field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("failed to read uploaded file: {}", e))
                })?);
            }
            "format" => format = text_field(field, "format").await?,
            "bitrate" => bitrate = parse_field(field, "bitrate").await?,
            "sampleRate" => sample_rate = Some(parse_field(field, "sampleRate").await?),
            "channels" => channels = Some(parse_field(field, "channels").await?),
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    let source =
        source.ok_or_else(|| ApiError::bad_request("missing required field \"file\""))?;

    // Everything the pipeline trusts is checked here, before it runs
    validate_content_type(content_type.as_deref())?;
    formats::resolve(&format)?;

    let request = ConversionRequest {
        source,
        original_file_name: file_name.clone(),
        target_format: format,
        bitrate_bps: bitrate,
        sample_rate_hz: sample_rate,
        channel_count: channels,
    };
    request.validate()?;

    tracing::info!(
        file = %file_name,
        format = %request.target_format,
        bitrate = request.bitrate_bps,
        sample_rate = ?request.sample_rate_hz,
        channels = ?request.channel_count,
        size = request.source.len(),
        "conversion request received"
    );

    // The frame loop is CPU-bound synchronous work; keep it off the runtime
    let output = tokio::task::spawn_blocking(move || TranscodePipeline::new().run(&request))
        .await
        .map_err(|e| ApiError::internal(format!("conversion task failed: {}", e)))??;

    let attachment_name = output_file_name(&file_name, output.format.token);
    tracing::info!(
        file = %file_name,
        output = %attachment_name,
        bytes = output.data.len(),
        "conversion succeeded"
    );

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(output.format.mime_type),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", attachment_name))
            .map_err(|e| ApiError::internal(format!("bad attachment name: {}", e)))?,
    );

    Ok((headers, output.data).into_response())
}

async fn text_field(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("unreadable field \"{}\": {}", name, e)))
}

async fn parse_field<T: std::str::FromStr>(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<T, ApiError> {
    let raw = text_field(field, name).await?;
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("field \"{}\" is not a valid number: {}", name, raw)))
}

/// Derive the download file name: original name with its extension replaced
/// by the target format token.
fn output_file_name(original: &str, token: &str) -> String {
    let stem = match original.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ if !original.is_empty() => original,
        _ => "converted",
    };
    format!("{}.{}", stem, token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("holiday.mp4", "mp3"), "holiday.mp3");
        assert_eq!(output_file_name("archive.tar.mkv", "flac"), "archive.tar.flac");
        assert_eq!(output_file_name("noext", "wav"), "noext.wav");
        assert_eq!(output_file_name("", "mp3"), "converted.mp3");
        assert_eq!(output_file_name(".hidden", "ogg"), ".hidden.ogg");
    }
}
