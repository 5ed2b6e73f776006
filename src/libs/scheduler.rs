use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossterm::style::Stylize;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::config::ReplacementConfig;
use super::file::replace_in_file;
use super::files::expand_path;
use super::report::ChangeReport;

#[derive(Debug, Default)]
struct Counters {
    files: AtomicUsize,
    changed_files: AtomicUsize,
    changed_lines: AtomicUsize,
    failed: AtomicUsize,
}

/// Totals of one run. Failures are counted, never propagated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub files: usize,
    pub changed_files: usize,
    pub changed_lines: usize,
    pub failed: usize,
}

impl Counters {
    fn summary(&self) -> RunSummary {
        RunSummary {
            files: self.files.load(Ordering::SeqCst),
            changed_files: self.changed_files.load(Ordering::SeqCst),
            changed_lines: self.changed_lines.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    fn fail(&self, message: &dyn std::fmt::Display) {
        self.failed.fetch_add(1, Ordering::SeqCst);
        error!("{}", message);
        eprintln!("{} {}", "failed:".red(), message);
    }
}

#[derive(Clone)]
struct Job {
    config: Arc<ReplacementConfig>,
    report: ChangeReport,
    counters: Arc<Counters>,
    seen: Arc<Mutex<HashSet<PathBuf>>>,
}

impl Job {
    /// Claims a file for this run. Paths that resolve to the same file, such as
    /// a symlink and its target or one file named twice, are only claimed once.
    async fn claim(&self, path: &Path) -> bool {
        let resolved = tokio::fs::canonicalize(path)
            .await
            .unwrap_or_else(|_| path.to_path_buf());
        let mut seen = self.seen.lock().await;
        seen.insert(resolved)
    }
}

async fn process_file(job: Job, path: PathBuf) {
    if !job.claim(&path).await {
        debug!(path = %path.display(), "already processed in this run");
        return;
    }
    job.counters.files.fetch_add(1, Ordering::SeqCst);
    match replace_in_file(&path, &job.config, &job.report).await {
        Ok(0) => (),
        Ok(changed_lines) => {
            job.counters.changed_files.fetch_add(1, Ordering::SeqCst);
            job.counters
                .changed_lines
                .fetch_add(changed_lines, Ordering::SeqCst);
        }
        Err(e) => job.counters.fail(&e),
    }
}

async fn process_argument(job: Job, argument: String) {
    // Walking a tree and globbing are blocking filesystem calls.
    let expansion = {
        let argument = argument.clone();
        tokio::task::spawn_blocking(move || expand_path(&argument)).await
    };
    let files = match expansion {
        Ok(Ok(files)) => files,
        Ok(Err(e)) => return job.counters.fail(&e),
        Err(e) => return job.counters.fail(&format!("{}: {}", argument, e)),
    };
    process_files(job, &argument, files).await;
}

/// Spawns one task per file. A failing file is counted and its siblings go on.
async fn process_files(job: Job, argument: &str, files: Vec<PathBuf>) {
    let mut tasks = JoinSet::new();
    for file in files {
        tasks.spawn(process_file(job.clone(), file));
    }
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            job.counters.fail(&format!("{}: {}", argument, e));
        }
    }
}

/// Rewrites every file named by `paths` concurrently.
///
/// Each argument gets its own task, which expands it and spawns one task per
/// file. Returns once every nested task has finished.
pub async fn run(
    paths: Vec<String>,
    config: Arc<ReplacementConfig>,
    report: ChangeReport,
) -> RunSummary {
    let job = Job {
        config,
        report,
        counters: Arc::new(Counters::default()),
        seen: Arc::default(),
    };

    let mut arguments = JoinSet::new();
    for path in paths {
        arguments.spawn(process_argument(job.clone(), path));
    }
    while let Some(joined) = arguments.join_next().await {
        if let Err(e) = joined {
            job.counters.fail(&e);
        }
    }

    let summary = job.counters.summary();
    info!(
        files = summary.files,
        changed_files = summary.changed_files,
        changed_lines = summary.changed_lines,
        failed = summary.failed,
        "run finished"
    );
    summary
}

#[cfg(test)]
fn test_job(config: ReplacementConfig) -> Job {
    Job {
        config: Arc::new(config),
        report: ChangeReport::new(),
        counters: Arc::new(Counters::default()),
        seen: Arc::default(),
    }
}

#[cfg(test)]
fn write_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
}

#[tokio::test]
async fn rewrites_files_and_directories() {
    let dir = tempfile::tempdir().unwrap();
    write_files(
        dir.path(),
        &[
            ("single.txt", "this\n"),
            ("tree/a.txt", "this and this\n"),
            ("tree/nested/b.txt", "nothing here\n"),
        ],
    );
    let config = Arc::new(ReplacementConfig::literal("this", "that").with_change_records(true));
    let report = ChangeReport::new();

    let summary = run(
        vec![
            dir.path().join("single.txt").display().to_string(),
            dir.path().join("tree").display().to_string(),
        ],
        config,
        report.clone(),
    )
    .await;

    assert_eq!(
        summary,
        RunSummary {
            files: 3,
            changed_files: 2,
            changed_lines: 2,
            failed: 0,
        }
    );
    let read = |name: &str| std::fs::read_to_string(dir.path().join(name)).unwrap();
    assert_eq!(read("single.txt"), "that\n");
    assert_eq!(read("tree/a.txt"), "that and that\n");
    assert_eq!(read("tree/nested/b.txt"), "nothing here\n");
    assert_eq!(report.get_files().await.len(), 2);
}

#[tokio::test]
async fn failures_do_not_stop_siblings() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &[("ok.txt", "this\n")]);
    let config = Arc::new(ReplacementConfig::literal("this", "that"));

    let summary = run(
        vec![
            dir.path().join("missing.txt").display().to_string(),
            dir.path().join("ok.txt").display().to_string(),
        ],
        config,
        ChangeReport::new(),
    )
    .await;

    assert_eq!(summary.failed, 1);
    assert_eq!(summary.changed_files, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("ok.txt")).unwrap(),
        "that\n"
    );
    assert!(!dir.path().join("missing.txt").exists());
}

#[tokio::test]
async fn many_files_report_under_their_own_paths() {
    let dir = tempfile::tempdir().unwrap();
    let names: Vec<String> = (0..50).map(|i| format!("file{}.txt", i)).collect();
    for name in &names {
        std::fs::write(dir.path().join(name), "old\n").unwrap();
    }
    let config = Arc::new(ReplacementConfig::literal("old", "new").with_change_records(true));
    let report = ChangeReport::new();

    run(
        vec![dir.path().display().to_string()],
        config,
        report.clone(),
    )
    .await;

    let files = report.get_files().await;
    assert_eq!(files.len(), names.len());
    for name in &names {
        assert_eq!(files[&dir.path().join(name)][0].after, "new");
    }
}

#[tokio::test]
async fn failing_file_does_not_stop_its_siblings() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &[("ok.txt", "this\n"), ("sub/inner.txt", "this\n")]);
    std::fs::write(dir.path().join("latin1.txt"), b"caf\xe9 this\n").unwrap();
    let job = test_job(ReplacementConfig::literal("this", "that"));

    // A directory opens fine but fails on read, even with root privileges.
    let files = vec![
        dir.path().join("sub"),
        dir.path().join("ok.txt"),
        dir.path().join("latin1.txt"),
    ];
    process_files(job.clone(), "tree", files).await;

    assert_eq!(
        job.counters.summary(),
        RunSummary {
            files: 3,
            changed_files: 2,
            changed_lines: 2,
            failed: 1,
        }
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("ok.txt")).unwrap(),
        "that\n"
    );
    assert_eq!(
        std::fs::read(dir.path().join("latin1.txt")).unwrap(),
        b"caf\xe9 that\n"
    );
}

#[tokio::test]
async fn directory_with_non_utf8_file_is_fully_rewritten() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &[("ok.txt", "this\n")]);
    std::fs::write(dir.path().join("latin1.txt"), b"caf\xe9 this\n").unwrap();
    let config = Arc::new(ReplacementConfig::literal("this", "that"));

    let summary = run(
        vec![dir.path().display().to_string()],
        config,
        ChangeReport::new(),
    )
    .await;

    assert_eq!(summary.failed, 0);
    assert_eq!(summary.changed_files, 2);
    assert_eq!(
        std::fs::read(dir.path().join("latin1.txt")).unwrap(),
        b"caf\xe9 that\n"
    );
}

#[tokio::test]
async fn same_file_named_twice_is_processed_once() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &[("x.txt", "this\n")]);
    let path = dir.path().join("x.txt").display().to_string();
    let config = Arc::new(ReplacementConfig::literal("this", "this this"));

    let summary = run(vec![path.clone(), path], config, ChangeReport::new()).await;

    assert_eq!(summary.files, 1);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("x.txt")).unwrap(),
        "this this\n"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_and_target_are_processed_once() {
    let dir = tempfile::tempdir().unwrap();
    write_files(dir.path(), &[("x.txt", "this\n")]);
    std::os::unix::fs::symlink(dir.path().join("x.txt"), dir.path().join("link")).unwrap();
    let config = Arc::new(ReplacementConfig::literal("this", "this this"));

    let summary = run(
        vec![dir.path().display().to_string()],
        config,
        ChangeReport::new(),
    )
    .await;

    assert_eq!(summary.files, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("x.txt")).unwrap(),
        "this this\n"
    );
    assert!(std::fs::symlink_metadata(dir.path().join("link"))
        .unwrap()
        .file_type()
        .is_symlink());
}
