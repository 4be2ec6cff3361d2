//! Static language alias table.
//!
//! Maps ISO 639-1, ISO 639-2/T, ISO 639-2/B codes and full English names to
//! the canonical ISO 639-1 code used throughout the catalog. Lookup is
//! case-insensitive.

/// Normalize a filename language tag to its ISO 639-1 code.
///
/// Returns `None` for tags that are not a known language identifier.
///
/// # Examples
///
/// ```
/// use core_scanner::language::normalize;
///
/// assert_eq!(normalize("en"), Some("en"));
/// assert_eq!(normalize("eng"), Some("en"));
/// assert_eq!(normalize("Spanish"), Some("es"));
/// assert_eq!(normalize("klingon"), None);
/// ```
pub fn normalize(tag: &str) -> Option<&'static str> {
    let tag = tag.to_ascii_lowercase();
    let code = match tag.as_str() {
        "en" | "eng" | "english" => "en",
        "es" | "spa" | "spanish" => "es",
        "fr" | "fra" | "fre" | "french" => "fr",
        "de" | "deu" | "ger" | "german" => "de",
        "it" | "ita" | "italian" => "it",
        "pt" | "por" | "portuguese" => "pt",
        "nl" | "nld" | "dut" | "dutch" => "nl",
        "ru" | "rus" | "russian" => "ru",
        "ja" | "jpn" | "japanese" => "ja",
        "zh" | "zho" | "chi" | "chinese" => "zh",
        "ko" | "kor" | "korean" => "ko",
        "ar" | "ara" | "arabic" => "ar",
        "hi" | "hin" | "hindi" => "hi",
        "tr" | "tur" | "turkish" => "tr",
        "pl" | "pol" | "polish" => "pl",
        "sv" | "swe" | "swedish" => "sv",
        "no" | "nor" | "norwegian" => "no",
        "da" | "dan" | "danish" => "da",
        "fi" | "fin" | "finnish" => "fi",
        "cs" | "ces" | "cze" | "czech" => "cs",
        "el" | "ell" | "gre" | "greek" => "el",
        "he" | "heb" | "hebrew" => "he",
        "hu" | "hun" | "hungarian" => "hu",
        "id" | "ind" | "indonesian" => "id",
        "ro" | "ron" | "rum" | "romanian" => "ro",
        "th" | "tha" | "thai" => "th",
        "uk" | "ukr" | "ukrainian" => "uk",
        "vi" | "vie" | "vietnamese" => "vi",
        "bg" | "bul" | "bulgarian" => "bg",
        "hr" | "hrv" | "croatian" => "hr",
        "sk" | "slk" | "slo" | "slovak" => "sk",
        "sl" | "slv" | "slovenian" => "sl",
        _ => return None,
    };
    Some(code)
}
