//! RFC 5322 header parsing: folding, charset fallback, and date parsing.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use tracing::trace;

use crate::error::DateError;
use crate::model::key::DestinationKey;
use crate::model::record::MessageRecord;

/// Work out where a record should go.
///
/// Any [`DateError`] maps to [`DestinationKey::Broken`].
pub fn destination_for(record: &MessageRecord<'_>) -> (DestinationKey, Option<DateError>) {
    match extract_date(record.header_block()) {
        Ok(date) => (DestinationKey::from_date(&date), None),
        Err(e) => (DestinationKey::Broken, Some(e)),
    }
}

/// Extract and parse the `Date:` header from a raw header block.
pub fn extract_date(raw_headers: &[u8]) -> Result<DateTime<FixedOffset>, DateError> {
    let text = decode_header_bytes(raw_headers);
    let headers = unfold_headers(&text);

    let value = get_header(&headers, "date").ok_or(DateError::Missing)?;
    if value.trim().is_empty() {
        return Err(DateError::Missing);
    }
    parse_date(&value).ok_or(DateError::Unparseable(value))
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        &bytes[3..]
    } else {
        bytes
    };

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

/// Get the first value for a header name (case-insensitive).
fn get_header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.clone())
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants.
/// The offset written in the header is preserved; dates without one are
/// taken as UTC.
pub fn parse_date(date_str: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt);
    }

    // Trailing comments such as "(PDT)" or "(GMT+02:00)"
    let no_comment = strip_trailing_comment(trimmed);
    if no_comment != trimmed {
        if let Ok(dt) = DateTime::parse_from_rfc2822(no_comment) {
            return Some(dt);
        }
    }

    // Remove leading day-of-week: "Thu, " or "Thu "
    let no_dow = strip_day_of_week(no_comment);

    // IMAP-style: "16-JUL-2025 03:01:03" → normalize to "16 Jul 2025 03:01:03"
    let no_dow_normalized = normalize_imap_date(&no_dow);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M %z",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    // Try both the original (stripped DOW) and the IMAP-normalized variant
    for candidate in [&no_dow, &no_dow_normalized] {
        for fmt in &formats {
            if let Some(dt) = parse_with_format(candidate, fmt) {
                return Some(dt);
            }
        }
    }

    // Replace named timezones with offsets and try again
    for candidate in [&no_dow, &no_dow_normalized] {
        let replaced = replace_named_tz(candidate);
        if replaced == *candidate {
            continue;
        }
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
                return Some(dt);
            }
        }
    }

    // Try using mail-parser's date parsing as last resort
    if let Some(dt) = mail_parser_date(trimmed) {
        return Some(dt);
    }

    trace!(date = trimmed, "Could not parse date");
    None
}

/// Parse with a single format, zoned first, then naive as UTC.
fn parse_with_format(candidate: &str, fmt: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(candidate, fmt)
        .ok()
        .map(|ndt| Utc.from_utc_datetime(&ndt).into())
}

/// Attempt to parse a date using `mail-parser`'s built-in parser.
fn mail_parser_date(input: &str) -> Option<DateTime<FixedOffset>> {
    use mail_parser::MessageParser;

    // Wrap input in a minimal RFC 5322 message so mail-parser can parse it
    let fake_msg = format!("Date: {input}\n\n");
    let parser = MessageParser::default();
    let parsed = parser.parse(fake_msg.as_bytes())?;
    let dt = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&dt).ok()
}

/// Drop a trailing parenthesized comment: `"… -0700 (PDT)"` → `"… -0700"`.
fn strip_trailing_comment(s: &str) -> &str {
    if s.ends_with(')') {
        if let Some(open) = s.rfind('(') {
            return s[..open].trim_end();
        }
    }
    s
}

/// Normalize IMAP-style dates: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
///
/// IMAP INTERNALDATE and some mail servers use `DD-MMM-YYYY` with uppercase months
/// and hyphens instead of spaces. chrono's `%b` expects title-case months with spaces.
fn normalize_imap_date(s: &str) -> String {
    if !s.contains('-') {
        return s.to_string();
    }

    let months = [
        "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
    ];
    let title_months = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    for (i, month) in months.iter().enumerate() {
        for pattern in [format!("-{month}-"), format!("-{}-", title_months[i])] {
            if s.contains(&pattern) {
                return s.replacen(&pattern, &format!(" {} ", title_months[i]), 1);
            }
        }
        let lc_pattern = format!("-{}-", month.to_lowercase());
        if s.contains(&lc_pattern) {
            return s.replacen(&lc_pattern, &format!(" {} ", title_months[i]), 1);
        }
    }

    s.to_string()
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = [
        "Mon,", "Tue,", "Wed,", "Thu,", "Fri,", "Sat,", "Sun,", "Mon ", "Tue ", "Wed ", "Thu ",
        "Fri ", "Sat ", "Sun ",
    ];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("CEST", "+0200"),
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CET", "+0100"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(&format!(" {name}")) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
