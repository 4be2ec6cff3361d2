//! Filesystem scanning for sibling subtitle files.

use crate::language;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Recognized subtitle file extensions (lowercase).
pub const SUBTITLE_EXTENSIONS: &[&str] = &["srt", "ass", "ssa", "sub", "vtt"];

/// Recognized video file extensions (lowercase), used by directory scans.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpg", "mpeg", "ts", "m2ts",
];

/// Language code for a subtitle whose language could not be inferred.
pub const UNDETERMINED_LANGUAGE: &str = "und";

/// A subtitle file found next to a media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredSubtitle {
    /// Full path of the subtitle file.
    pub path: PathBuf,
    /// Normalized ISO 639-1 code, or `"und"`.
    pub language: String,
}

/// Infer a language code from a subtitle filename.
///
/// The stem is split on `.` and the segments after the base name are scanned
/// right to left (the language tag usually sits just before the extension).
///
/// # Examples
///
/// ```
/// use core_scanner::detect_language;
///
/// assert_eq!(detect_language("movie.en.srt"), Some("en"));
/// assert_eq!(detect_language("movie.spanish.srt"), Some("es"));
/// assert_eq!(detect_language("movie.srt"), None);
/// ```
pub fn detect_language(filename: &str) -> Option<&'static str> {
    let stem = Path::new(filename).file_stem()?.to_str()?;

    let parts: Vec<&str> = stem.split('.').collect();
    if parts.len() < 2 {
        return None;
    }

    // Skip the first part: it is the media base name, not a tag.
    parts[1..]
        .iter()
        .rev()
        .find_map(|part| language::normalize(part))
}

/// Find subtitle files next to a media file.
///
/// Pure function of the filesystem snapshot. A missing media path yields an
/// empty result, not an error. Files that share the media file's base name
/// followed by a `.` and end in a subtitle extension are considered:
///
/// - `movie.srt` (exact stem) → language from the name, else `"und"`
/// - `movie.en.srt` → `"en"`
/// - `movie.unknowntag.srt` → discarded
/// - anything not prefixed by the base name → never matches
pub fn scan_for_media(media_path: &Path) -> Vec<DiscoveredSubtitle> {
    if !media_path.exists() {
        warn!(path = %media_path.display(), "Media file does not exist");
        return Vec::new();
    }

    let Some(parent) = media_path.parent() else {
        return Vec::new();
    };
    let Some(media_stem) = media_path.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };

    let entries = match fs::read_dir(parent) {
        Ok(entries) => entries,
        Err(error) => {
            warn!(path = %parent.display(), %error, "Failed to read media directory");
            return Vec::new();
        }
    };

    let prefix = format!("{media_stem}.");
    let mut subtitles = Vec::new();

    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };

        let Some(rest) = name.strip_prefix(&prefix) else {
            continue;
        };

        let Some(extension) = Path::new(name).extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let extension = extension.to_ascii_lowercase();
        if !SUBTITLE_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }

        let exact_stem = rest.eq_ignore_ascii_case(&extension);
        let language = match detect_language(name) {
            Some(code) => code.to_string(),
            None if exact_stem => UNDETERMINED_LANGUAGE.to_string(),
            None => continue,
        };

        subtitles.push(DiscoveredSubtitle {
            path: entry.path(),
            language,
        });
    }

    // read_dir order is platform-dependent.
    subtitles.sort_by(|a, b| a.path.cmp(&b.path));

    debug!(
        path = %media_path.display(),
        count = subtitles.len(),
        "Scanned media file for subtitles"
    );
    subtitles
}

/// Scan a directory tree for media files and their subtitles.
///
/// Returns results keyed by media path, containing only media files with at
/// least one discovered subtitle. Intended for bulk import.
pub fn scan_directory(directory: &Path) -> BTreeMap<PathBuf, Vec<DiscoveredSubtitle>> {
    if !directory.is_dir() {
        warn!(path = %directory.display(), "Not a directory");
        return BTreeMap::new();
    }

    let mut result = BTreeMap::new();
    let mut pending = vec![directory.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(path = %dir.display(), %error, "Failed to read directory");
                continue;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
                continue;
            }

            let is_media = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| MEDIA_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if !is_media {
                continue;
            }

            let subtitles = scan_for_media(&path);
            if !subtitles.is_empty() {
                result.insert(path, subtitles);
            }
        }
    }

    debug!(
        path = %directory.display(),
        count = result.len(),
        "Scanned directory for media with subtitles"
    );
    result
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap();
        path
    }

    #[test]
    fn test_detect_language_patterns() {
        assert_eq!(detect_language("movie.en.srt"), Some("en"));
        assert_eq!(detect_language("movie.eng.srt"), Some("en"));
        assert_eq!(detect_language("movie.english.srt"), Some("en"));
        assert_eq!(detect_language("movie.spanish.srt"), Some("es"));
        assert_eq!(detect_language("movie.srt"), None);
        assert_eq!(detect_language("movie.whatever.srt"), None);
    }

    #[test]
    fn test_detect_language_rightmost_tag_wins() {
        assert_eq!(detect_language("show.s01e01.en.srt"), Some("en"));
        assert_eq!(detect_language("movie.en.forced.srt"), Some("en"));
    }

    #[test]
    fn test_scan_missing_media_returns_empty() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("ghost.mkv");
        assert!(scan_for_media(&missing).is_empty());
    }

    #[test]
    fn test_scan_for_media_fixture() {
        let dir = TempDir::new().unwrap();
        let media = touch(&dir, "movie.mkv");
        touch(&dir, "movie.en.srt");
        touch(&dir, "movie.spanish.srt");
        touch(&dir, "movie.srt");

        // Files that must never match.
        touch(&dir, "other.en.srt");
        touch(&dir, "moviex.en.srt");
        touch(&dir, "movie.en.txt");

        let mut languages: Vec<String> = scan_for_media(&media)
            .into_iter()
            .map(|s| s.language)
            .collect();
        languages.sort();

        assert_eq!(languages, vec!["en", "es", "und"]);
    }

    #[test]
    fn test_suffixed_unknown_tag_discarded() {
        let dir = TempDir::new().unwrap();
        let media = touch(&dir, "movie.mkv");
        touch(&dir, "movie.director-commentary.srt");

        assert!(scan_for_media(&media).is_empty());
    }

    #[test]
    fn test_multiple_extensions() {
        let dir = TempDir::new().unwrap();
        let media = touch(&dir, "movie.mkv");
        touch(&dir, "movie.en.srt");
        touch(&dir, "movie.fr.ass");
        touch(&dir, "movie.de.vtt");

        let found = scan_for_media(&media);
        assert_eq!(found.len(), 3);
    }

    #[test]
    fn test_dotted_media_stem() {
        let dir = TempDir::new().unwrap();
        let media = touch(&dir, "show.s01e01.mkv");
        touch(&dir, "show.s01e01.en.srt");
        touch(&dir, "show.s01e01.srt");
        touch(&dir, "show.s01e02.en.srt");

        let found = scan_for_media(&media);
        let mut languages: Vec<String> = found.into_iter().map(|s| s.language).collect();
        languages.sort();
        assert_eq!(languages, vec!["en", "und"]);
    }

    #[test]
    fn test_scan_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let movie = touch(&dir, "movie.mkv");
        touch(&dir, "movie.en.srt");

        let nested = dir.path().join("nested").join("episode.mp4");
        File::create(&nested).unwrap();
        File::create(dir.path().join("nested").join("episode.es.srt")).unwrap();

        // Media without subtitles is omitted from the result.
        touch(&dir, "bare.mkv");

        let result = scan_directory(dir.path());
        assert_eq!(result.len(), 2);
        assert_eq!(result[&movie][0].language, "en");
        assert_eq!(result[&nested][0].language, "es");
    }

    #[test]
    fn test_scan_directory_on_file_path() {
        let dir = TempDir::new().unwrap();
        let media = touch(&dir, "movie.mkv");
        assert!(scan_directory(&media).is_empty());
    }
}
