use crossterm::style::Stylize;

use super::report::{ChangeMap, ChangeRecord};

fn decorate_change(change: &ChangeRecord) -> String {
    format!(
        "{}:\t{}\t\t{}",
        change.line,
        change.before.as_str().red(),
        change.after.as_str().green()
    )
}

/// One blue header per file, then `line:  before  after` for each change.
/// Line numbers are the stored 0-based indices.
pub fn decorate_changes(files: &ChangeMap) -> Vec<String> {
    let mut decorated = vec![];
    for (path, changes) in files {
        decorated.push(String::new());
        decorated.push(path.display().to_string().blue().to_string());
        decorated.extend(changes.iter().map(decorate_change));
    }
    decorated
}

pub fn print_changes(files: &ChangeMap) {
    for line in decorate_changes(files) {
        println!("{}", line);
    }
}

#[test]
fn decorate_groups_changes_by_file() {
    use std::path::PathBuf;

    let mut files = ChangeMap::new();
    files.insert(
        PathBuf::from("b.txt"),
        vec![ChangeRecord {
            line: 4,
            before: "old".to_string(),
            after: "new".to_string(),
        }],
    );
    files.insert(
        PathBuf::from("a.txt"),
        vec![
            ChangeRecord {
                line: 0,
                before: "this".to_string(),
                after: "that".to_string(),
            },
            ChangeRecord {
                line: 2,
                before: "this too".to_string(),
                after: "that too".to_string(),
            },
        ],
    );

    assert_eq!(
        decorate_changes(&files),
        vec![
            String::new(),
            "a.txt".blue().to_string(),
            format!("0:\t{}\t\t{}", "this".red(), "that".green()),
            format!("2:\t{}\t\t{}", "this too".red(), "that too".green()),
            String::new(),
            "b.txt".blue().to_string(),
            format!("4:\t{}\t\t{}", "old".red(), "new".green()),
        ]
    );
}

#[test]
fn nothing_to_decorate() {
    assert!(decorate_changes(&ChangeMap::new()).is_empty());
}
