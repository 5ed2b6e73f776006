use std::fs;
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

use super::error::Error;

pub const LOG_ENV: &str = "SRPL_LOG";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock stamps, second precision.
struct LocalTime;

impl FormatTime for LocalTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "[{}]", Local::now().format(TIMESTAMP_FORMAT))
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default))
}

/// Installs the global subscriber. Logs are appended to `log_file` when one is
/// given, otherwise they go to stderr and stay off unless `SRPL_LOG` asks.
pub fn init_logging(log_file: Option<&Path>) -> Result<(), Error> {
    let builder = tracing_subscriber::fmt()
        .with_timer(LocalTime)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| Error::Logging(format!("{}: {}", path.display(), e)))?;
            builder
                .with_env_filter(env_filter("info"))
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder
            .with_env_filter(env_filter("off"))
            .with_writer(std::io::stderr)
            .try_init(),
    };
    installed.map_err(|e| Error::Logging(e.to_string()))
}

#[test]
fn log_file_receives_events() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("srpl.log");

    init_logging(Some(&path)).unwrap();
    tracing::warn!("written to the log file");

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("written to the log file"));

    let stamp = content
        .strip_prefix('[')
        .and_then(|rest| rest.split_once(']'))
        .map(|(stamp, _)| stamp)
        .unwrap();
    assert!(chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok());
}

#[test]
fn unwritable_log_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("srpl.log");
    assert!(matches!(
        init_logging(Some(&path)),
        Err(Error::Logging(_))
    ));
}
