use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn runs_program_from_file() {
    let dir = tempdir().expect("create temp dir");
    let path = dir.path().join("square.lisp");
    fs::write(&path, "(define sq (lambda (n) (* n n)))\n(sq 5)\n").expect("write program");

    let mut cmd = Command::cargo_bin("tinylisp").expect("binary exists");
    cmd.arg(&path);
    cmd.assert().success().stdout("25\n");
}

#[test]
fn runs_program_from_stdin() {
    let mut cmd = Command::cargo_bin("tinylisp").expect("binary exists");
    cmd.write_stdin("(+ 1 2 3) (/ 10 2)");
    cmd.assert().success().stdout("6\n5.0\n");
}

#[test]
fn program_error_exits_with_one() {
    let mut cmd = Command::cargo_bin("tinylisp").expect("binary exists");
    cmd.write_stdin("(+ 1 1)\n(foo)\n(+ 2 2)");
    cmd.assert()
        .code(1)
        .stdout("2\n")
        .stderr(predicate::str::contains("Unbound variable: 'foo'"));
}

#[test]
fn parse_error_runs_nothing() {
    let mut cmd = Command::cargo_bin("tinylisp").expect("binary exists");
    cmd.write_stdin("(+ 1 1)\n(+ 2");
    cmd.assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains("Unexpected end of input"));
}

#[test]
fn missing_file_exits_with_two() {
    let dir = tempdir().expect("create temp dir");
    let mut cmd = Command::cargo_bin("tinylisp").expect("binary exists");
    cmd.arg(dir.path().join("missing.lisp"));
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn help_describes_usage() {
    let mut cmd = Command::cargo_bin("tinylisp").expect("binary exists");
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Usage").and(predicate::str::contains("[FILE]")));
}

#[test]
fn version_is_reported() {
    let mut cmd = Command::cargo_bin("tinylisp").expect("binary exists");
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn extra_arguments_are_rejected() {
    let mut cmd = Command::cargo_bin("tinylisp").expect("binary exists");
    cmd.args(["a.lisp", "b.lisp"]);
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("unexpected argument"));
}
