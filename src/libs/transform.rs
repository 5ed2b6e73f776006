use std::borrow::Cow;

use super::config::ReplacementConfig;

/// Applies the replacement to a single line.
///
/// Lines are raw bytes, so files in any encoding pass through. `index` is the
/// 0-based position of the line in its file. Returns the new bytes and whether
/// they differ from `line`.
pub fn transform_line(line: &[u8], index: usize, config: &ReplacementConfig) -> (Vec<u8>, bool) {
    if !config.is_eligible(index) {
        return (line.to_vec(), false);
    }

    let transformed = match &config.pattern {
        Some(pattern) => match pattern.replace_all(line, config.replace.as_bytes()) {
            Cow::Borrowed(_) => return (line.to_vec(), false),
            Cow::Owned(replaced) => replaced,
        },
        None => replace_literal(
            line,
            config.search.as_bytes(),
            config.replace.as_bytes(),
            config.occurrence_limit,
        ),
    };

    let changed = transformed != line;
    (transformed, changed)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Byte length of the character starting `bytes`. Invalid sequences count as one byte.
fn char_width(bytes: &[u8]) -> usize {
    let width = match bytes[0] {
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf7 => 4,
        _ => 1,
    };
    match bytes.get(..width) {
        Some(sequence) if std::str::from_utf8(sequence).is_ok() => width,
        _ => 1,
    }
}

/// Replaces up to `limit` occurrences of `search`, left to right, without
/// overlaps. An empty `search` matches before every character and at the end,
/// the way `str::replacen` treats an empty pattern.
fn replace_literal(line: &[u8], search: &[u8], replace: &[u8], limit: Option<usize>) -> Vec<u8> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut out = Vec::with_capacity(line.len());
    let mut rest = line;
    let mut replaced = 0;

    while replaced < limit {
        let Some(at) = find(rest, search) else {
            break;
        };
        out.extend_from_slice(&rest[..at]);
        out.extend_from_slice(replace);
        replaced += 1;

        if search.is_empty() {
            if rest.is_empty() {
                return out;
            }
            let width = char_width(rest);
            out.extend_from_slice(&rest[..width]);
            rest = &rest[width..];
        } else {
            rest = &rest[at + search.len()..];
        }
    }
    out.extend_from_slice(rest);
    out
}

#[cfg(test)]
fn literal(search: &str, replace: &str) -> ReplacementConfig {
    ReplacementConfig::literal(search, replace)
}

#[cfg(test)]
fn apply(line: &str, index: usize, config: &ReplacementConfig) -> (String, bool) {
    let (after, changed) = transform_line(line.as_bytes(), index, config);
    (String::from_utf8(after).unwrap(), changed)
}

#[test]
fn replace_every_literal_occurrence() {
    let (line, changed) = apply("a-a-a", 0, &literal("a", "b"));
    assert_eq!(line, "b-b-b");
    assert!(changed);
}

#[test]
fn limit_occurrences_left_to_right() {
    let config = literal("a", "b").with_occurrence_limit(2);
    assert_eq!(apply("a-a-a", 0, &config).0, "b-b-a");
}

#[test]
fn occurrences_do_not_overlap() {
    assert_eq!(apply("aaaa", 0, &literal("aa", "b")).0, "bb");
    assert_eq!(apply("aaa", 0, &literal("aa", "b")).0, "ba");
}

#[test]
fn zero_occurrences_changes_nothing() {
    let config = literal("a", "b").with_occurrence_limit(0);
    assert_eq!(apply("a-a-a", 0, &config), ("a-a-a".to_string(), false));
}

#[test]
fn empty_search_and_replace_is_identity() {
    let config = literal("", "");
    for line in ["", "hello there", "  spaced  ", "ünïcode"] {
        assert_eq!(apply(line, 0, &config), (line.to_string(), false));
    }
}

#[test]
fn empty_search_inserts_between_characters() {
    for limit in [-1, 0, 2, 10] {
        let config = literal("", "|").with_occurrence_limit(limit);
        let expected = match usize::try_from(limit) {
            Ok(limit) => "ün".replacen("", "|", limit),
            Err(_) => "ün".replace("", "|"),
        };
        assert_eq!(apply("ün", 0, &config).0, expected);
    }
}

#[test]
fn replacement_equal_to_search_is_unchanged() {
    let (line, changed) = apply("same same", 0, &literal("same", "same"));
    assert_eq!(line, "same same");
    assert!(!changed);
}

#[test]
fn non_utf8_bytes_pass_through() {
    let (line, changed) = transform_line(b"caf\xe9 this", 0, &literal("this", "that"));
    assert_eq!(line, b"caf\xe9 that");
    assert!(changed);

    let config = literal("", "-").with_occurrence_limit(3);
    assert_eq!(transform_line(b"\xe9\xe9", 0, &config).0, b"-\xe9-\xe9-");

    let config = ReplacementConfig::pattern("th(is)", "${1}s").unwrap();
    assert_eq!(transform_line(b"\xff this", 0, &config).0, b"\xff iss");
}

#[test]
fn pattern_expands_groups() {
    let config = ReplacementConfig::pattern(r"(\w+)@(\w+)", "$2 at ${1}").unwrap();
    assert_eq!(
        apply("mail bob@home now", 0, &config),
        ("mail home at bob now".to_string(), true)
    );
}

#[test]
fn pattern_ignores_occurrence_limit() {
    let config = ReplacementConfig::pattern("o", "0")
        .unwrap()
        .with_occurrence_limit(1);
    assert_eq!(apply("foo boo", 0, &config).0, "f00 b00");
}

#[test]
fn pattern_without_match_is_unchanged() {
    let config = ReplacementConfig::pattern("[0-9]+", "#").unwrap();
    assert_eq!(
        apply("no digits", 0, &config),
        ("no digits".to_string(), false)
    );
}

#[test]
fn target_line_is_one_based() {
    let config = literal("x", "y").with_target_line(2).unwrap();
    assert_eq!(apply("x", 0, &config).0, "x");
    assert_eq!(apply("x", 1, &config).0, "y");
    assert_eq!(apply("x", 2, &config).0, "x");
}

#[test]
fn range_limits_eligible_indices() {
    let config = literal("x", "y").with_line_range("2:4".parse().unwrap());
    let lines: Vec<String> = (0..6).map(|i| apply("x", i, &config).0).collect();
    assert_eq!(lines, ["x", "x", "y", "y", "x", "x"]);
}
