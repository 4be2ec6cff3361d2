//! # Subtitle Scanner Module
//!
//! Discovers subtitle files already present next to media files and infers
//! their language from filename patterns.
//!
//! ## Overview
//!
//! The scanner is a pure function of the filesystem snapshot: it holds no
//! state between calls. Given `movie.mkv` it looks for sibling files sharing
//! the media file's base name with a subtitle extension (`movie.srt`,
//! `movie.en.srt`, `movie.spanish.srt`) and normalizes the language segment
//! through a static alias table covering ISO 639-1, ISO 639-2 and full
//! English names.
//!
//! An exact-stem match whose name yields no language code is reported as
//! "und" (undetermined); a suffixed match whose tag is not a known language
//! is discarded.

pub mod language;
mod scanner;

pub use language::normalize;
pub use scanner::{
    detect_language, scan_directory, scan_for_media, DiscoveredSubtitle, MEDIA_EXTENSIONS,
    SUBTITLE_EXTENSIONS, UNDETERMINED_LANGUAGE,
};
