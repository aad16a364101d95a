//! Integration tests for the MBOX parser and `Date:` header handling.

use std::path::Path;

use chrono::Datelike;
use mboxsplit::error::DateError;
use mboxsplit::parser::header::{destination_for, extract_date, parse_date};
use mboxsplit::parser::mbox::MboxParser;

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn records(name: &str) -> Vec<(u64, Vec<u8>)> {
    let parser = MboxParser::new(fixture(name)).unwrap();
    let mut out = Vec::new();
    parser
        .parse(
            &mut |record| {
                out.push((record.offset, record.raw.to_vec()));
                Ok(())
            },
            None,
        )
        .unwrap();
    out
}

// ─── Test 1: Parse simple.mbox → exactly 6 messages ─────────────────

#[test]
fn test_parse_simple_mbox_count() {
    let parser = MboxParser::new(fixture("simple.mbox")).unwrap();
    let mut count: u64 = 0;
    let returned = parser
        .parse(
            &mut |_record| {
                count += 1;
                Ok(())
            },
            None,
        )
        .unwrap();
    assert_eq!(count, 6, "simple.mbox should contain exactly 6 messages");
    assert_eq!(returned, count);
}

// ─── Test 2: >From in body is not a separator ───────────────────────

#[test]
fn test_from_escaping_in_body() {
    let records = records("simple.mbox");
    let fourth = String::from_utf8(records[3].1.clone()).unwrap();
    assert!(fourth.contains("Subject: Message with From in body"));
    assert!(
        fourth.contains(">From the perspective"),
        "Record should keep the >From line verbatim, got: '{fourth}'"
    );
}

// ─── Test 3: Offsets point at the separator lines ───────────────────

#[test]
fn test_offsets_point_at_separators() {
    let data = std::fs::read(fixture("simple.mbox")).unwrap();
    for (offset, raw) in records("simple.mbox") {
        let start = offset as usize;
        assert!(data[start..].starts_with(b"From "));
        assert_eq!(&data[start..start + raw.len()], raw.as_slice());
    }
}

// ─── Test 4: Empty MBOX → 0 messages, no error ──────────────────────

#[test]
fn test_parse_empty_mbox() {
    let parser = MboxParser::new(fixture("empty.mbox")).unwrap();
    let mut count: u64 = 0;
    let result = parser.parse(
        &mut |_record| {
            count += 1;
            Ok(())
        },
        None,
    );
    assert_eq!(result.unwrap(), 0);
    assert_eq!(count, 0);
}

// ─── Test 5: Destinations for every fixture record ──────────────────

#[test]
fn test_destinations_for_fixture() {
    let parser = MboxParser::new(fixture("simple.mbox")).unwrap();
    let mut names = Vec::new();
    let mut reasons = Vec::new();
    parser
        .parse(
            &mut |record| {
                let (key, reason) = destination_for(record);
                names.push(key.file_name());
                reasons.push(reason);
                Ok(())
            },
            None,
        )
        .unwrap();

    assert_eq!(
        names,
        [
            "mail-2304",
            "mail-2305",
            "mail-broken",
            "mail-2304",
            "mail-broken",
            "mail-2307"
        ]
    );
    assert_eq!(reasons[2], Some(DateError::Missing));
    assert_eq!(
        reasons[4],
        Some(DateError::Unparseable("sometime last week".to_string()))
    );
}

// ─── Test 6: Date parsing in multiple formats ───────────────────────

#[test]
fn test_date_parsing_formats() {
    // RFC 2822 with day-of-week
    let d1 = parse_date("Tue, 04 Apr 2023 10:00:00 +0000");
    assert_eq!(d1.map(|d| (d.year(), d.month())), Some((2023, 4)));

    // Without day-of-week
    let d2 = parse_date("04 Apr 2023 10:00:00 +0000");
    assert!(d2.is_some(), "Failed to parse date without day-of-week");

    // Named timezone
    let d3 = parse_date("Tue, 04 Apr 2023 10:00:00 PDT");
    assert!(d3.is_some(), "Failed to parse date with named timezone");

    // ISO 8601
    let d4 = parse_date("2023-04-04T10:00:00Z");
    assert!(d4.is_some(), "Failed to parse ISO 8601 date");

    // Two-digit year
    let d5 = parse_date("Tue, 04 Apr 23 10:00:00 +0000");
    assert_eq!(d5.map(|d| d.year()), Some(2023));
}

// ─── Test 7: Header block from a CRLF message ───────────────────────

#[test]
fn test_extract_date_crlf_headers() {
    let dt = extract_date(b"Subject: x\r\nDate: Wed, 10 May 2023 08:30:00 -0700\r\n").unwrap();
    assert_eq!((dt.year(), dt.month()), (2023, 5));
}
