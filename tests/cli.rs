//! End-to-end tests against the compiled binary: argument validation and
//! exit-code behavior that unit tests inside `src/` can't exercise.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_help_and_lists_key_flags() {
    Command::cargo_bin("novel-translate")
        .unwrap_or_else(|e| unreachable!("{e}"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--resume"))
        .stdout(predicate::str::contains("--extract-glossary-only"));
}

#[test]
fn requires_at_least_one_input_file() {
    Command::cargo_bin("novel-translate")
        .unwrap_or_else(|e| unreachable!("{e}"))
        .assert()
        .failure();
}

#[test]
fn rejects_resume_and_force_new_together() {
    Command::cargo_bin("novel-translate")
        .unwrap_or_else(|e| unreachable!("{e}"))
        .args(["book.txt", "--resume", "--force-new"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn errors_cleanly_on_missing_input_file() {
    let dir = tempfile::tempdir().unwrap_or_else(|e| unreachable!("{e}"));
    let missing = dir.path().join("does-not-exist.txt");

    Command::cargo_bin("novel-translate")
        .unwrap_or_else(|e| unreachable!("{e}"))
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}
