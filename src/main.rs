pub(crate) mod libs;
mod modes;

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};

use self::libs::logging::init_logging;
use self::modes::classic::classic_mode;

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = None,
    override_usage = "srpl [OPTIONS] <SEARCH> <REPLACE> <PATH>...",
    after_help = "Paths may also be piped in, one per line."
)]
struct Opts {
    #[arg(
        value_name = "ARGS",
        help = "Search term, replacement, then files, directories or glob patterns"
    )]
    args: Vec<String>,

    #[arg(short, long, help = "Print every changed line")]
    verbose: bool,

    #[arg(
        short,
        long,
        help = "Treat SEARCH as a regular expression, REPLACE may refer to groups as $1 or ${name}"
    )]
    regex: bool,

    #[arg(
        short = 'o',
        long = "occurrences",
        visible_short_alias = 'm',
        default_value_t = -1,
        allow_negative_numbers = true,
        help = "Occurrences replaced per line, -1 replaces all (ignored with --regex)"
    )]
    occurrences: i64,

    #[arg(
        short = 'l',
        long = "line",
        default_value_t = -1,
        allow_negative_numbers = true,
        help = "Only change the given line, counted from 1"
    )]
    line: i64,

    #[arg(
        long = "lr",
        visible_alias = "line-range",
        value_name = "START:END",
        default_value = ":",
        help = "Only change lines with 0-based index in [START, END), either side optional"
    )]
    line_range: String,

    #[arg(short = 'n', long, help = "Print what would change without writing files")]
    dry_run: bool,

    #[arg(long, value_name = "PATH", help = "Append logs to this file instead of stderr")]
    log_file: Option<PathBuf>,
}

/// Accepts the single-dash `-lr` spelling for `--lr`.
fn normalize_args(args: impl IntoIterator<Item = OsString>) -> Vec<OsString> {
    let mut positional = false;
    args.into_iter()
        .map(|arg| {
            if positional {
                return arg;
            }
            match arg.to_str() {
                Some("--") => {
                    positional = true;
                    arg
                }
                Some("-lr") => OsString::from("--lr"),
                Some(flag) if flag.starts_with("-lr=") => OsString::from(format!("-{}", flag)),
                _ => arg,
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> ExitCode {
    let opts = Opts::parse_from(normalize_args(std::env::args_os()));

    if let Err(e) = init_logging(opts.log_file.as_deref()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match classic_mode(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if e.is_argument_error() {
                eprintln!("{}", Opts::command().render_help());
            }
            eprintln!("\n{}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
fn parse(args: &[&str]) -> Opts {
    Opts::parse_from(normalize_args(args.iter().map(OsString::from)))
}

#[test]
fn single_dash_line_range() {
    assert_eq!(parse(&["srpl", "-lr", "2:4", "a", "b", "f"]).line_range, "2:4");
    assert_eq!(parse(&["srpl", "-lr=:4", "a", "b", "f"]).line_range, ":4");
}

#[test]
fn line_range_after_separator_is_positional() {
    let opts = parse(&["srpl", "--", "-lr", "b", "f"]);
    assert_eq!(opts.args, ["-lr", "b", "f"]);
    assert_eq!(opts.line_range, ":");
}

#[test]
fn defaults_are_unrestricted() {
    let opts = parse(&["srpl", "a", "b", "f"]);
    assert_eq!(opts.occurrences, -1);
    assert_eq!(opts.line, -1);
    assert_eq!(opts.line_range, ":");
    assert!(!opts.verbose && !opts.regex && !opts.dry_run);
}

#[test]
fn occurrence_alias_and_negative_values() {
    assert_eq!(parse(&["srpl", "-m", "3", "a", "b", "f"]).occurrences, 3);
    assert_eq!(parse(&["srpl", "-o", "-1", "a", "b", "f"]).occurrences, -1);
}

#[test]
fn verify_cli() {
    Opts::command().debug_assert();
}
