use std::path::{Path, PathBuf};

use glob::glob;
use ignore::WalkBuilder;
use tracing::{debug, warn};

use super::error::Error;

fn is_glob(path: &str) -> bool {
    path.contains(['*', '?', '['])
}

/// Every regular file below `root`, nothing filtered by ignore files.
pub fn walk_directory(root: &Path) -> Vec<PathBuf> {
    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut entries: Vec<PathBuf> = vec![];
    for result in walker {
        match result {
            Ok(entry) => {
                if entry.path().is_file() {
                    entries.push(entry.into_path());
                }
            }
            Err(e) => warn!("skipping entry under {}: {}", root.display(), e),
        }
    }
    entries
}

fn expand_existing(path: &Path, metadata: &std::fs::Metadata) -> Vec<PathBuf> {
    if metadata.is_file() {
        vec![path.to_path_buf()]
    } else if metadata.is_dir() {
        walk_directory(path)
    } else {
        warn!("skipping {}: not a regular file", path.display());
        vec![]
    }
}

pub fn list_glob_files(pattern: &str) -> Result<Vec<PathBuf>, Error> {
    let mut files = vec![];
    for entry in glob(pattern)? {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("skipping glob match: {}", e);
                continue;
            }
        };
        match std::fs::metadata(&path) {
            Ok(metadata) => files.extend(expand_existing(&path, &metadata)),
            Err(e) => warn!("skipping {}: {}", path.display(), e),
        }
    }
    if files.is_empty() {
        return Err(Error::NoMatches(pattern.to_string()));
    }
    Ok(files)
}

/// Resolves one command line path into the files to rewrite.
///
/// A file stands for itself, a directory for every file below it. A path that
/// does not exist is tried as a glob pattern when it looks like one.
pub fn expand_path(path: &str) -> Result<Vec<PathBuf>, Error> {
    let root = Path::new(path);
    let files = match std::fs::metadata(root) {
        Ok(metadata) => expand_existing(root, &metadata),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && is_glob(path) => {
            list_glob_files(path)?
        }
        Err(source) => {
            return Err(Error::Path {
                path: root.to_path_buf(),
                source,
            })
        }
    };
    debug!("{} expands to {} files", path, files.len());
    Ok(files)
}

#[cfg(test)]
fn tree(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    for file in files {
        let path = dir.path().join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, "content\n").unwrap();
    }
    dir
}

#[test]
fn file_expands_to_itself() {
    let dir = tree(&["a.txt"]);
    let path = dir.path().join("a.txt");
    let files = expand_path(path.to_str().unwrap()).unwrap();
    assert_eq!(files, vec![path]);
}

#[test]
fn directory_expands_to_nested_files_only() {
    let dir = tree(&["a.txt", "sub/b.txt", "sub/deeper/c.txt", ".hidden/d.txt"]);
    std::fs::create_dir(dir.path().join("empty")).unwrap();
    std::fs::write(dir.path().join(".gitignore"), "sub/\n").unwrap();

    let mut files = expand_path(dir.path().to_str().unwrap()).unwrap();
    files.sort();

    let mut expected = vec![
        dir.path().join(".gitignore"),
        dir.path().join(".hidden/d.txt"),
        dir.path().join("a.txt"),
        dir.path().join("sub/b.txt"),
        dir.path().join("sub/deeper/c.txt"),
    ];
    expected.sort();
    assert_eq!(files, expected);
}

#[test]
fn missing_path_is_a_path_error() {
    let dir = tree(&[]);
    let path = dir.path().join("nope.txt");
    assert!(matches!(
        expand_path(path.to_str().unwrap()),
        Err(Error::Path { .. })
    ));
}

#[test]
fn glob_expands_matching_files() {
    let dir = tree(&["a.rs", "b.rs", "c.txt", "src/d.rs"]);
    let pattern = format!("{}/*.rs", dir.path().display());

    let files = expand_path(&pattern).unwrap();
    assert_eq!(files, vec![dir.path().join("a.rs"), dir.path().join("b.rs")]);
}

#[test]
fn glob_without_matches_is_an_error() {
    let dir = tree(&["a.txt"]);
    let pattern = format!("{}/*.rs", dir.path().display());
    assert!(matches!(expand_path(&pattern), Err(Error::NoMatches(_))));
}

#[test]
fn is_glob_detects_metacharacters() {
    assert!(is_glob("src/**/*.rs"));
    assert!(is_glob("file?.txt"));
    assert!(is_glob("[ab].txt"));
    assert!(!is_glob("plain/path.txt"));
}
