use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("you need to run this with a search term, a replacement and at least one path")]
    MissingArguments,

    #[error("give range like this: n:m (got `{0}`)")]
    MalformedRange(String),

    #[error("invalid line range bound `{value}`: {source}")]
    InvalidRangeBound {
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("invalid line number {0}: lines are counted from 1, -1 disables the restriction")]
    InvalidLine(i64),

    #[error("invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("could not read arguments from stdin: {0}")]
    Stdin(std::io::Error),

    #[error("{}: {source}", path.display())]
    Path {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no files match `{0}`")]
    NoMatches(String),

    #[error("invalid glob: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("could not open {}: {source}", path.display())]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not write {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not set up logging: {0}")]
    Logging(String),
}

impl Error {
    /// Errors that abort the whole run before any file is touched.
    pub fn is_argument_error(&self) -> bool {
        matches!(
            self,
            Error::MissingArguments
                | Error::MalformedRange(_)
                | Error::InvalidRangeBound { .. }
                | Error::InvalidLine(_)
                | Error::InvalidPattern(_)
                | Error::Stdin(_)
        )
    }
}

#[test]
fn argument_errors_are_fatal() {
    assert!(Error::MissingArguments.is_argument_error());
    assert!(Error::MalformedRange("1".to_string()).is_argument_error());
    assert!(Error::InvalidLine(-3).is_argument_error());
}

#[test]
fn file_errors_are_isolated() {
    let error = Error::FileOpen {
        path: PathBuf::from("missing.txt"),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
    };
    assert!(!error.is_argument_error());
    assert_eq!(error.to_string(), "could not open missing.txt: not found");
}
