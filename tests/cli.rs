use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn srpl() -> Command {
    let mut cmd = Command::cargo_bin("srpl").unwrap();
    cmd.env_remove("SRPL_LOG").write_stdin("");
    cmd
}

fn create_test_files(dir: &Path, files: &[(&str, &str)]) {
    for (name, content) in files {
        let path = dir.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

#[test]
fn too_few_arguments_prints_usage() {
    srpl()
        .args(["this", "that"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Usage:"))
        .stderr(predicate::str::contains("at least one path"));
}

#[test]
fn malformed_range_touches_nothing() {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), &[("a.txt", "this\n")]);

    srpl()
        .args(["-lr", "1-3", "this", "that"])
        .arg(dir.path().join("a.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("give range like this"));

    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "this\n");
}

#[test]
fn replaces_in_files_and_directories() {
    let dir = tempdir().unwrap();
    create_test_files(
        dir.path(),
        &[
            ("a.txt", "this is a test\n"),
            ("tree/b.txt", "keep\nthis and this\n"),
        ],
    );

    srpl()
        .args(["this", "that"])
        .arg(dir.path().join("a.txt"))
        .arg(dir.path().join("tree"))
        .assert()
        .success()
        .stdout("");

    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "that is a test\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("tree/b.txt")).unwrap(),
        "keep\nthat and that\n"
    );
}

#[test]
fn verbose_prints_changed_lines() {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), &[("a.txt", "keep\nthis one\n")]);

    srpl()
        .args(["-v", "this", "that"])
        .arg(dir.path().join("a.txt"))
        .assert()
        .success()
        .stdout(predicate::str::contains("a.txt"))
        .stdout(predicate::str::contains("1:\t"))
        .stdout(predicate::str::contains("this one"))
        .stdout(predicate::str::contains("that one"));
}

#[test]
fn missing_path_does_not_change_exit_code() {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), &[("a.txt", "this\n")]);

    srpl()
        .args(["this", "that"])
        .arg(dir.path().join("missing.txt"))
        .arg(dir.path().join("a.txt"))
        .assert()
        .success()
        .stderr(predicate::str::contains("failed:"))
        .stderr(predicate::str::contains("missing.txt"));

    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "that\n");
}

#[test]
fn paths_from_stdin() {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), &[("a.txt", "this\n"), ("b.txt", "this\n")]);
    let stdin = format!(
        "{}\n{}\n",
        dir.path().join("a.txt").display(),
        dir.path().join("b.txt").display()
    );

    srpl()
        .args(["this", "that"])
        .write_stdin(stdin)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "that\n");
    assert_eq!(fs::read_to_string(dir.path().join("b.txt")).unwrap(), "that\n");
}

#[test]
fn line_and_occurrence_restrictions() {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), &[("a.txt", "x x x\nx x x\nx x x\n")]);

    srpl()
        .args(["-l", "2", "-o", "2", "x", "y"])
        .arg(dir.path().join("a.txt"))
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "x x x\ny y x\nx x x\n"
    );
}

#[test]
fn regex_with_groups() {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), &[("a.txt", "let a = 1;\nlet b = 2;\n")]);

    srpl()
        .args(["-r", r"let (\w+) = (\d+);", "const ${1}: i32 = $2;"])
        .arg(dir.path().join("a.txt"))
        .assert()
        .success();

    assert_eq!(
        fs::read_to_string(dir.path().join("a.txt")).unwrap(),
        "const a: i32 = 1;\nconst b: i32 = 2;\n"
    );
}

#[test]
fn dry_run_writes_nothing() {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), &[("a.txt", "this")]);

    srpl()
        .args(["--dry-run", "this", "that"])
        .arg(dir.path().join("a.txt"))
        .assert()
        .success()
        .stdout(predicate::str::contains("0:\t"))
        .stdout(predicate::str::contains("No changes were made."));

    assert_eq!(fs::read_to_string(dir.path().join("a.txt")).unwrap(), "this");
}

#[test]
fn non_utf8_file_in_directory_is_rewritten() {
    let dir = tempdir().unwrap();
    create_test_files(dir.path(), &[("ok.txt", "this\n")]);
    fs::write(dir.path().join("latin1.txt"), b"caf\xe9 this\n").unwrap();

    srpl()
        .args(["this", "that"])
        .arg(dir.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("failed:").not());

    assert_eq!(fs::read(dir.path().join("latin1.txt")).unwrap(), b"caf\xe9 that\n");
    assert_eq!(fs::read_to_string(dir.path().join("ok.txt")).unwrap(), "that\n");
}
