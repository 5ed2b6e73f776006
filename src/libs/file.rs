use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tracing::debug;

use super::config::ReplacementConfig;
use super::error::Error;
use super::report::{ChangeRecord, ChangeReport};
use super::transform::transform_line;

#[derive(Debug, Default)]
pub struct Transformed {
    pub lines: Vec<Vec<u8>>,
    pub changes: Vec<ChangeRecord>,
    pub changed_lines: usize,
}

/// Splits a file on `\n`. A terminator at the very end does not start a new
/// line, and a trailing `\r` is dropped. No encoding is assumed.
pub async fn read_lines(path: &Path) -> Result<Vec<Vec<u8>>, Error> {
    let file = File::open(path).await.map_err(|source| Error::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let mut segments = BufReader::new(file).split(b'\n');
    let mut contents = vec![];
    while let Some(mut line) = segments.next_segment().await.map_err(|source| Error::FileRead {
        path: path.to_path_buf(),
        source,
    })? {
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        contents.push(line);
    }
    Ok(contents)
}

pub fn transform_lines(lines: Vec<Vec<u8>>, config: &ReplacementConfig) -> Transformed {
    let mut transformed = Transformed {
        lines: Vec::with_capacity(lines.len()),
        ..Transformed::default()
    };

    for (index, line) in lines.into_iter().enumerate() {
        let (after, changed) = transform_line(&line, index, config);
        if changed {
            transformed.changed_lines += 1;
            if config.record_changes {
                transformed.changes.push(ChangeRecord {
                    line: index,
                    before: String::from_utf8_lossy(&line).into_owned(),
                    after: String::from_utf8_lossy(&after).into_owned(),
                });
            }
        }
        transformed.lines.push(after);
    }
    transformed
}

/// Truncates `path` and writes every line followed by `\n`, the last one included.
pub async fn write_lines(path: &Path, lines: &[Vec<u8>]) -> Result<(), Error> {
    let write_error = |source: std::io::Error| Error::FileWrite {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).await.map_err(write_error)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line).await.map_err(write_error)?;
        writer.write_all(b"\n").await.map_err(write_error)?;
    }
    writer.flush().await.map_err(write_error)?;
    Ok(())
}

/// Rewrites one file in place and records its changed lines in `report`.
/// Returns how many lines changed.
pub async fn replace_in_file(
    path: &Path,
    config: &ReplacementConfig,
    report: &ChangeReport,
) -> Result<usize, Error> {
    let lines = read_lines(path).await?;
    let Transformed {
        lines,
        changes,
        changed_lines,
    } = transform_lines(lines, config);

    if !config.dry_run {
        write_lines(path, &lines).await?;
    }
    debug!(path = %path.display(), changed_lines, dry_run = config.dry_run, "processed file");

    report.store_changes(path, changes).await;
    Ok(changed_lines)
}

#[cfg(test)]
async fn replace_in_temp_file(
    before: &str,
    config: &ReplacementConfig,
) -> (Vec<String>, String, ChangeReport) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tmp.txt");
    std::fs::write(&path, before).unwrap();

    let lines = transform_lines(read_lines(&path).await.unwrap(), config)
        .lines
        .into_iter()
        .map(|line| String::from_utf8(line).unwrap())
        .collect();

    let report = ChangeReport::new();
    replace_in_file(&path, config, &report).await.unwrap();
    let on_disk = std::fs::read_to_string(&path).unwrap();
    (lines, on_disk, report)
}

#[tokio::test]
async fn replace_cases() {
    // (before, joined lines after, search, replace)
    let cases = [
        ("", "", "something", "somethingelse"),
        ("", "", "", ""),
        ("hello there", "hello there", "something", "no change"),
        ("hello there\nand there", "hello there\nand there", "something", "no change"),
        ("hello there\nand there", "hello there\nand there", "", ""),
        ("\nhello there\nand there\n\n", "\nhello there\nand there\n", "this", "that"),
        ("\nhello there\nand there\n", "\nhello there\nand there", "this", "that"),
        ("\nhello there\nand there\n\n", "\nhello there\nand there\n", "", ""),
        (
            "\nhello there\nand there\n\nand\n\n\nthat",
            "\nhello there\nand there\n\nand\n\n\nthat",
            "",
            "",
        ),
        (
            "\n   hello there\nand there  \n\n\n   \n  \n\none",
            "\n   hello there\nand there  \n\n\n   \n  \n\none",
            "this",
            "that",
        ),
        ("this is a test", "that is a test", "this", "that"),
        ("test this is", "test that is", "this", "that"),
        ("test is this", "test is that", "this", "that"),
        (
            "test is this\nthis is test\ntest this is",
            "test is that\nthat is test\ntest that is",
            "this",
            "that",
        ),
        (
            "test is this\nelse is test\ntest this is",
            "test is that\nelse is test\ntest that is",
            "this",
            "that",
        ),
        (
            "test is this\nelse is test\ntest this is",
            "test is this\nelse is test\ntestthatis",
            " this ",
            "that",
        ),
        (
            "test is this\nelse is test\ntest this is",
            "test isthat\nelse is test\ntestthat is",
            " this",
            "that",
        ),
        ("hello and goodbye from out", "hello and goodbye tuo morf", "from out", "tuo morf"),
        (
            "hello \nworld\nword hello\nhello world",
            "hello \nworld\nword hello\nthere",
            "hello world",
            "there",
        ),
    ];

    for (before, after, search, replace) in cases {
        let config = ReplacementConfig::literal(search, replace);
        let (lines, _, _) = replace_in_temp_file(before, &config).await;
        assert_eq!(
            lines.join("\n"),
            after,
            "{:?} with {:?} -> {:?}",
            before,
            search,
            replace
        );
    }
}

#[tokio::test]
async fn every_written_line_is_terminated() {
    let config = ReplacementConfig::literal("this", "that");
    let (_, on_disk, _) = replace_in_temp_file("this is a test", &config).await;
    assert_eq!(on_disk, "that is a test\n");
}

#[tokio::test]
async fn single_trailing_newline_keeps_line_count() {
    let config = ReplacementConfig::literal("missing", "x");
    let before = "one\ntwo\nthree\n";
    let (lines, on_disk, _) = replace_in_temp_file(before, &config).await;
    assert_eq!(lines.len(), 3);
    assert_eq!(on_disk, before);
}

#[tokio::test]
async fn two_trailing_newlines_drop_one_line_from_the_split() {
    let config = ReplacementConfig::literal("this", "that");
    let before = "\nhello there\nand there\n\n";
    let (lines, on_disk, _) = replace_in_temp_file(before, &config).await;
    // The split yields four lines and the joined text ends in one `\n`, but
    // each line is written with its own terminator, so the bytes survive.
    assert_eq!(lines, ["", "hello there", "and there", ""]);
    assert_eq!(on_disk, before);
}

#[tokio::test]
async fn crlf_is_rewritten_as_lf() {
    let config = ReplacementConfig::literal("a", "b");
    let (_, on_disk, _) = replace_in_temp_file("a\r\nc\r\n", &config).await;
    assert_eq!(on_disk, "b\nc\n");
}

#[tokio::test]
async fn crlf_without_final_newline_drops_the_cr() {
    let config = ReplacementConfig::literal("a", "b");
    let (lines, on_disk, _) = replace_in_temp_file("a\r\nc\r", &config).await;
    assert_eq!(lines, ["b", "c"]);
    assert_eq!(on_disk, "b\nc\n");
}

#[tokio::test]
async fn latin1_file_is_rewritten_byte_for_byte() {
    let config = ReplacementConfig::literal("this", "that").with_change_records(true);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latin1.txt");
    std::fs::write(&path, b"caf\xe9 this\nna\xefve\n").unwrap();

    let report = ChangeReport::new();
    let changed = replace_in_file(&path, &config, &report).await.unwrap();

    assert_eq!(changed, 1);
    assert_eq!(std::fs::read(&path).unwrap(), b"caf\xe9 that\nna\xefve\n");
    assert_eq!(
        report.get_files().await[&path],
        vec![ChangeRecord {
            line: 0,
            before: "caf\u{FFFD} this".to_string(),
            after: "caf\u{FFFD} that".to_string(),
        }]
    );
}

#[tokio::test]
async fn latin1_file_matches_patterns() {
    let config = ReplacementConfig::pattern(r"t(h)is", "${1}at").unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("latin1.txt");
    std::fs::write(&path, b"\xe0 this\n").unwrap();

    replace_in_file(&path, &config, &ChangeReport::new()).await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"\xe0 hat\n");
}

#[tokio::test]
async fn empty_file_stays_empty() {
    let config = ReplacementConfig::literal("something", "somethingelse");
    let (lines, on_disk, report) = replace_in_temp_file("", &config).await;
    assert!(lines.is_empty());
    assert_eq!(on_disk, "");
    assert!(report.get_files().await.is_empty());
}

#[tokio::test]
async fn records_changed_lines_when_asked() {
    let config = ReplacementConfig::literal("this", "that").with_change_records(true);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "keep\nthis one\nkeep\nthis too\n").unwrap();

    let report = ChangeReport::new();
    let changed = replace_in_file(&path, &config, &report).await.unwrap();

    assert_eq!(changed, 2);
    assert_eq!(
        report.get_files().await[&path],
        vec![
            ChangeRecord {
                line: 1,
                before: "this one".to_string(),
                after: "that one".to_string(),
            },
            ChangeRecord {
                line: 3,
                before: "this too".to_string(),
                after: "that too".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn no_records_without_verbose() {
    let config = ReplacementConfig::literal("this", "that");
    let (_, on_disk, report) = replace_in_temp_file("this\n", &config).await;
    assert_eq!(on_disk, "that\n");
    assert!(report.get_files().await.is_empty());
}

#[tokio::test]
async fn dry_run_leaves_file_untouched() {
    let config = ReplacementConfig::literal("this", "that")
        .with_change_records(true)
        .with_dry_run(true);
    let (_, on_disk, report) = replace_in_temp_file("this\n\n", &config).await;
    assert_eq!(on_disk, "this\n\n");
    assert!(!report.get_files().await.is_empty());
}

#[tokio::test]
async fn range_restricts_rewritten_lines() {
    let config = ReplacementConfig::literal("x", "y").with_line_range("2:4".parse().unwrap());
    let (_, on_disk, _) = replace_in_temp_file("x\nx\nx\nx\nx\n", &config).await;
    assert_eq!(on_disk, "x\nx\ny\ny\nx\n");
}

#[tokio::test]
async fn missing_file_is_an_open_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.txt");
    let config = ReplacementConfig::literal("a", "b");

    let result = replace_in_file(&path, &config, &ChangeReport::new()).await;
    assert!(matches!(result, Err(Error::FileOpen { .. })));
    assert!(!path.exists());
}

#[tokio::test]
async fn directory_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = ReplacementConfig::literal("a", "b");

    let result = replace_in_file(dir.path(), &config, &ChangeReport::new()).await;
    assert!(matches!(
        result,
        Err(Error::FileRead { .. }) | Err(Error::FileOpen { .. })
    ));
}
