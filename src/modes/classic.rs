use std::sync::Arc;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use crate::libs::config::{LineRange, ReplacementConfig};
use crate::libs::decorate::print_changes;
use crate::libs::error::Error;
use crate::libs::report::ChangeReport;
use crate::libs::scheduler::run;
use crate::Opts;

/// Appends every line of `reader` to `args`.
async fn append_lines<R>(mut args: Vec<String>, reader: R) -> Result<Vec<String>, Error>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await.map_err(Error::Stdin)? {
        args.push(line);
    }
    Ok(args)
}

/// Positional arguments, followed by stdin lines when stdin is piped.
async fn load_args(args: Vec<String>) -> Result<Vec<String>, Error> {
    if std::io::stdin().is_tty() {
        return Ok(args);
    }
    append_lines(args, BufReader::new(tokio::io::stdin())).await
}

fn build_config(opts: &Opts, search: &str, replace: &str) -> Result<ReplacementConfig, Error> {
    let line_range: LineRange = opts.line_range.parse()?;
    let config = if opts.regex {
        ReplacementConfig::pattern(search, replace)?
    } else {
        ReplacementConfig::literal(search, replace)
    };

    Ok(config
        .with_occurrence_limit(opts.occurrences)
        .with_target_line(opts.line)?
        .with_line_range(line_range)
        .with_change_records(opts.verbose || opts.dry_run)
        .with_dry_run(opts.dry_run))
}

pub(crate) async fn classic_mode(opts: Opts) -> Result<(), Error> {
    let args = load_args(opts.args.clone()).await?;
    let (search, replace, paths) = match args.as_slice() {
        [search, replace, paths @ ..] if !paths.is_empty() => (search, replace, paths.to_vec()),
        _ => return Err(Error::MissingArguments),
    };
    let config = build_config(&opts, search, replace)?;

    info!(
        search = %config.search,
        replace = %config.replace,
        regex = config.is_pattern(),
        paths = paths.len(),
        "starting run"
    );

    let report = ChangeReport::new();
    let summary = run(paths, Arc::new(config), report.clone()).await;

    if opts.verbose || opts.dry_run {
        print_changes(&report.get_files().await);
    }
    if opts.dry_run {
        println!(
            "\n{} lines would change in {} files. No changes were made.",
            summary.changed_lines.to_string().green(),
            summary.changed_files.to_string().yellow()
        );
    }
    Ok(())
}

#[tokio::test]
async fn stdin_lines_become_arguments() {
    let args = vec!["this".to_string(), "that".to_string()];
    let args = append_lines(args, &b"a.txt\nsome dir/b.txt\n"[..])
        .await
        .unwrap();
    assert_eq!(args, ["this", "that", "a.txt", "some dir/b.txt"]);
}

#[test]
fn config_from_flags() {
    use clap::Parser;

    let opts = Opts::parse_from(["srpl", "-v", "-o", "2", "-l", "3", "--lr", "1:9", "a", "b", "f"]);
    let config = build_config(&opts, "a", "b").unwrap();

    assert_eq!(config.occurrence_limit, Some(2));
    assert_eq!(config.target_line, Some(3));
    assert_eq!(
        config.line_range,
        LineRange {
            start: 1,
            end: Some(9)
        }
    );
    assert!(config.record_changes);
    assert!(!config.is_pattern());
}

#[test]
fn malformed_range_is_an_argument_error() {
    use clap::Parser;

    let opts = Opts::parse_from(["srpl", "--lr", "1-9", "a", "b", "f"]);
    let error = build_config(&opts, "a", "b").unwrap_err();
    assert!(error.is_argument_error());
}

#[test]
fn regex_flag_compiles_pattern() {
    use clap::Parser;

    let opts = Opts::parse_from(["srpl", "-r", "a+", "b", "f"]);
    assert!(build_config(&opts, "a+", "b").unwrap().is_pattern());

    let opts = Opts::parse_from(["srpl", "-r", "(", "b", "f"]);
    assert!(matches!(
        build_config(&opts, "(", "b"),
        Err(Error::InvalidPattern(_))
    ));
}
