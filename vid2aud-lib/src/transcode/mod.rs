//! Media transcoding: decode a video container down to raw audio frames and
//! re-encode them into the requested target format.

pub mod chunker;
pub mod decoder;
pub mod encoder;
pub mod pipeline;
pub mod resampler;

pub use decoder::MediaDecoder;
pub use encoder::MediaEncoder;
pub use pipeline::TranscodePipeline;
