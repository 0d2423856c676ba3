//! Audience Count Normalization
//!
//! Platforms report audience as free text ("12.4K followers",
//! "2,500 members", "1.2M views"). Normalize to an integer; anything
//! unparsable is 0.

use once_cell::sync::Lazy;
use regex::Regex;

static COUNT_RE: Lazy<Regex> = Lazy::new(|| {
    // The boundary keeps "2,500 members" from reading the leading 'm'
    // of the next word as a millions suffix.
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*([km]\b)?").expect("audience regex is valid")
});

/// Normalize a free-text audience count to an integer
///
/// `None`, empty, or unparsable input yields 0.
pub fn parse_audience_count(raw: Option<&str>) -> u64 {
    let Some(raw) = raw else { return 0 };

    let Some(caps) = COUNT_RE.captures(raw) else { return 0 };

    let number = caps[1].replace(',', "");
    let Ok(value) = number.parse::<f64>() else { return 0 };

    let multiplier = match caps.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };

    (value * multiplier).round() as u64
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_number() {
        assert_eq!(parse_audience_count(Some("830")), 830);
    }

    #[test]
    fn thousands_separator() {
        assert_eq!(parse_audience_count(Some("2,500 members")), 2_500);
    }

    #[test]
    fn k_suffix_with_decimal() {
        assert_eq!(parse_audience_count(Some("12.4K followers")), 12_400);
    }

    #[test]
    fn m_suffix() {
        assert_eq!(parse_audience_count(Some("1.2M views")), 1_200_000);
        assert_eq!(parse_audience_count(Some("3m subscribers")), 3_000_000);
    }

    #[test]
    fn lowercase_suffix() {
        assert_eq!(parse_audience_count(Some("7k")), 7_000);
    }

    #[test]
    fn unparsable_and_none_are_zero() {
        assert_eq!(parse_audience_count(None), 0);
        assert_eq!(parse_audience_count(Some("")), 0);
        assert_eq!(parse_audience_count(Some("lots of people")), 0);
    }

    #[test]
    fn number_embedded_in_text() {
        assert_eq!(parse_audience_count(Some("about 48,211 subscribers total")), 48_211);
    }
}
