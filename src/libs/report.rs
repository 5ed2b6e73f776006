use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

/// One line that a replacement actually changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    pub line: usize,
    pub before: String,
    pub after: String,
}

pub type ChangeMap = BTreeMap<PathBuf, Vec<ChangeRecord>>;

/// Changed lines of every processed file, shared by all file tasks.
#[derive(Debug, Clone, Default)]
pub struct ChangeReport {
    files: Arc<Mutex<ChangeMap>>,
}

impl ChangeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn store_changes(&self, path: &Path, changes: Vec<ChangeRecord>) {
        if changes.is_empty() {
            return;
        }
        let mut files = self.files.lock().await;
        files.insert(path.to_path_buf(), changes);
    }

    pub async fn get_files(&self) -> ChangeMap {
        let files = self.files.lock().await;
        files.clone()
    }
}

#[tokio::test]
async fn skip_files_without_changes() {
    let report = ChangeReport::new();
    report.store_changes(Path::new("a.txt"), vec![]).await;
    assert!(report.get_files().await.is_empty());
}

#[tokio::test]
async fn clones_share_the_same_map() {
    let report = ChangeReport::new();
    let writer = report.clone();
    let record = ChangeRecord {
        line: 0,
        before: "this".to_string(),
        after: "that".to_string(),
    };
    tokio::spawn(async move {
        writer
            .store_changes(Path::new("a.txt"), vec![record])
            .await;
    })
    .await
    .unwrap();

    let files = report.get_files().await;
    assert_eq!(files.len(), 1);
    assert_eq!(files[Path::new("a.txt")][0].after, "that");
}
