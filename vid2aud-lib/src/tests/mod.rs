//! End-to-end tests that exercise the real FFmpeg libraries.
