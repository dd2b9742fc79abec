use chrono::{NaiveDate, NaiveDateTime};
use url::Url;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse dates in the layouts the sources and exported files use:
/// ISO "2020-01-02", ISO datetimes "2020-01-02T00:00:00.000",
/// GDELT "20200102T120000Z", "Jan 02, 2020", and slash dates.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    // Datetime forms: only the calendar day matters
    if matches!(s.as_bytes().get(10), Some(b'T' | b' ')) {
        if let Some(d) = s.get(..10).and_then(|p| NaiveDate::parse_from_str(p, "%Y-%m-%d").ok()) {
            return Some(d);
        }
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%SZ") {
        return Some(dt.date());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y%m%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%b %d, %Y") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%m/%d/%Y") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d %b %Y") {
        return Some(d);
    }

    None
}

/// Numeric cell: FRED's "." and the usual blanks are missing. Non-finite
/// values are missing too.
pub fn parse_value(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "." || s == "N/A" || s == "-" || s.eq_ignore_ascii_case("nan") {
        return None;
    }
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | 'e' | 'E' | '+'))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Host of a URL without a leading "www.", lowercased.
pub fn normalise_domain(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let host = url.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// True when the URL's host is one of `domains` or a subdomain of one.
pub fn is_credible(raw_url: &str, domains: &[String]) -> bool {
    let Some(host) = normalise_domain(raw_url) else {
        return false;
    };
    domains.iter().any(|d| {
        let d = d.trim().trim_start_matches("www.").to_lowercase();
        host == d || host.ends_with(&format!(".{d}"))
    })
}

/// First `max` characters, never splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Collapse runs of whitespace into single spaces.
pub fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// English name of the text's language ("English", "German", ...), the
/// same form GDELT reports. `None` when the text is too short to tell.
pub fn detect_language(text: &str) -> Option<String> {
    whatlang::detect(text).map(|info| info.lang().eng_name().to_string())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2020-01-02"), Some(d(2020, 1, 2)));
        assert_eq!(parse_date("2020-01-02T00:00:00.000"), Some(d(2020, 1, 2)));
        assert_eq!(parse_date("2020-01-02 16:00:00"), Some(d(2020, 1, 2)));
        assert_eq!(parse_date("20200315T104500Z"), Some(d(2020, 3, 15)));
        assert_eq!(parse_date("Feb 20, 2024"), Some(d(2024, 2, 20)));
        assert_eq!(parse_date("12/31/2021"), Some(d(2021, 12, 31)));
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("yesterday"), None);
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("."), None);
        assert_eq!(parse_value(" 98.5 "), Some(98.5));
        assert_eq!(parse_value("1,234.5"), Some(1234.5));
        assert_eq!(parse_value("-0.25"), Some(-0.25));
        assert_eq!(parse_value("NaN"), None);
    }

    #[test]
    fn test_credible_domains() {
        let allow = vec!["reuters.com".to_string(), "www.cnbc.com".to_string()];
        assert!(is_credible("https://www.reuters.com/markets/x", &allow));
        assert!(is_credible("https://cnbc.com/2020/01/01/a.html", &allow));
        assert!(is_credible("https://uk.reuters.com/a", &allow));
        assert!(!is_credible("https://notreuters.com/a", &allow));
        assert!(!is_credible("not a url", &allow));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(squash_whitespace("a \n\t b  c"), "a b c");
    }

    #[test]
    fn test_detect_language() {
        assert_eq!(
            detect_language("Apple shares rose sharply after the company reported record quarterly earnings and strong iPhone sales").as_deref(),
            Some("English")
        );
        assert_eq!(
            detect_language("Die Aktie von Apple ist nach den starken Quartalszahlen deutlich gestiegen und die Anleger sind zufrieden").as_deref(),
            Some("German")
        );
        assert_eq!(detect_language(""), None);
    }
}
