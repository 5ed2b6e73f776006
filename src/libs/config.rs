use std::str::FromStr;

use regex::bytes::Regex;

use super::error::Error;

/// Half-open range `[start, end)` of 0-based line indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineRange {
    pub start: usize,
    pub end: Option<usize>,
}

impl LineRange {
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && self.end.map_or(true, |end| index < end)
    }
}

fn parse_bound(value: &str) -> Result<Option<usize>, Error> {
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse::<usize>()
        .map(Some)
        .map_err(|source| Error::InvalidRangeBound {
            value: value.to_string(),
            source,
        })
}

impl FromStr for LineRange {
    type Err = Error;

    /// Parses `start:end`, where either side may be left out.
    fn from_str(range: &str) -> Result<Self, Self::Err> {
        let (start, end) = match range.split_once(':') {
            Some((start, end)) if !end.contains(':') => (start, end),
            _ => return Err(Error::MalformedRange(range.to_string())),
        };
        Ok(LineRange {
            start: parse_bound(start)?.unwrap_or(0),
            end: parse_bound(end)?,
        })
    }
}

/// Everything a worker needs to rewrite a file. Built once, then shared read-only.
#[derive(Debug, Clone)]
pub struct ReplacementConfig {
    pub search: String,
    pub replace: String,
    pub pattern: Option<Regex>,
    pub occurrence_limit: Option<usize>,
    pub target_line: Option<usize>,
    pub line_range: LineRange,
    pub record_changes: bool,
    pub dry_run: bool,
}

impl ReplacementConfig {
    pub fn literal(search: impl Into<String>, replace: impl Into<String>) -> Self {
        ReplacementConfig {
            search: search.into(),
            replace: replace.into(),
            pattern: None,
            occurrence_limit: None,
            target_line: None,
            line_range: LineRange::default(),
            record_changes: false,
            dry_run: false,
        }
    }

    pub fn pattern(search: impl Into<String>, replace: impl Into<String>) -> Result<Self, Error> {
        let mut config = Self::literal(search, replace);
        config.pattern = Some(Regex::new(&config.search)?);
        Ok(config)
    }

    pub fn is_pattern(&self) -> bool {
        self.pattern.is_some()
    }

    /// Negative limits mean "replace every occurrence".
    pub fn with_occurrence_limit(mut self, limit: i64) -> Self {
        self.occurrence_limit = usize::try_from(limit).ok();
        self
    }

    /// `-1` lifts the restriction, any other value is a 1-based line number.
    pub fn with_target_line(mut self, line: i64) -> Result<Self, Error> {
        self.target_line = match line {
            -1 => None,
            line if line >= 1 => Some(line as usize),
            line => return Err(Error::InvalidLine(line)),
        };
        Ok(self)
    }

    pub fn with_line_range(mut self, range: LineRange) -> Self {
        self.line_range = range;
        self
    }

    pub fn with_change_records(mut self, record_changes: bool) -> Self {
        self.record_changes = record_changes;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether the line at 0-based `index` may be touched at all.
    pub fn is_eligible(&self, index: usize) -> bool {
        self.target_line.map_or(true, |line| line == index + 1) && self.line_range.contains(index)
    }
}

#[test]
fn parse_unrestricted_range() {
    assert_eq!(":".parse::<LineRange>().unwrap(), LineRange::default());
}

#[test]
fn parse_full_range() {
    assert_eq!(
        "2:4".parse::<LineRange>().unwrap(),
        LineRange {
            start: 2,
            end: Some(4)
        }
    );
}

#[test]
fn parse_open_ended_ranges() {
    assert_eq!(
        "3:".parse::<LineRange>().unwrap(),
        LineRange {
            start: 3,
            end: None
        }
    );
    assert_eq!(
        ":7".parse::<LineRange>().unwrap(),
        LineRange {
            start: 0,
            end: Some(7)
        }
    );
}

#[test]
fn reject_range_without_single_colon() {
    for range in ["", "5", "1:2:3", "::"] {
        assert!(
            matches!(range.parse::<LineRange>(), Err(Error::MalformedRange(_))),
            "`{}` should be rejected",
            range
        );
    }
}

#[test]
fn reject_range_with_bad_bounds() {
    for range in ["a:3", "1:b", "-1:"] {
        assert!(matches!(
            range.parse::<LineRange>(),
            Err(Error::InvalidRangeBound { .. })
        ));
    }
}

#[test]
fn range_is_half_open() {
    let range: LineRange = "2:4".parse().unwrap();
    assert!(!range.contains(1));
    assert!(range.contains(2));
    assert!(range.contains(3));
    assert!(!range.contains(4));
}

#[test]
fn negative_limit_is_unlimited() {
    let config = ReplacementConfig::literal("a", "b").with_occurrence_limit(-1);
    assert_eq!(config.occurrence_limit, None);
    let config = config.with_occurrence_limit(0);
    assert_eq!(config.occurrence_limit, Some(0));
}

#[test]
fn target_line_validation() {
    let config = ReplacementConfig::literal("a", "b");
    assert_eq!(config.clone().with_target_line(-1).unwrap().target_line, None);
    assert_eq!(config.clone().with_target_line(3).unwrap().target_line, Some(3));
    assert!(matches!(
        config.clone().with_target_line(0),
        Err(Error::InvalidLine(0))
    ));
    assert!(matches!(
        config.with_target_line(-4),
        Err(Error::InvalidLine(-4))
    ));
}

#[test]
fn invalid_pattern_is_rejected() {
    assert!(matches!(
        ReplacementConfig::pattern("(unclosed", "x"),
        Err(Error::InvalidPattern(_))
    ));
}

#[test]
fn eligibility_needs_both_restrictions() {
    let config = ReplacementConfig::literal("a", "b")
        .with_target_line(3)
        .unwrap()
        .with_line_range("1:5".parse().unwrap());
    assert!(config.is_eligible(2));
    assert!(!config.is_eligible(1));

    let config = config.with_line_range("3:".parse().unwrap());
    assert!(!config.is_eligible(2));
}
