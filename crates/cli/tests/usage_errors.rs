use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn missing_required_flags_print_usage() {
    cargo_bin_cmd!("argscan")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn mismatched_func_and_arg_counts_are_rejected() {
    let temp = tempdir().unwrap();
    cargo_bin_cmd!("argscan")
        .args(["--arch", "amd64", "--func", "open", "--func", "system", "--arg", "0"])
        .arg("--path")
        .arg(temp.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("must match"))
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn argument_index_beyond_register_table_is_rejected() {
    let temp = tempdir().unwrap();
    cargo_bin_cmd!("argscan")
        .args(["--arch", "amd64", "--func", "open", "--arg", "6"])
        .arg("--path")
        .arg(temp.path())
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("out of range"));
}

#[test]
fn unknown_architecture_is_rejected() {
    let temp = tempdir().unwrap();
    cargo_bin_cmd!("argscan")
        .args(["--arch", "mips", "--func", "open", "--arg", "0"])
        .arg("--path")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("mips"));
}

#[test]
fn zero_workers_fail_the_run() {
    let temp = tempdir().unwrap();
    cargo_bin_cmd!("argscan")
        .args(["--arch", "arm64", "--func", "open", "--arg", "0", "--worker", "0"])
        .arg("--path")
        .arg(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("worker count"));
}

#[test]
fn missing_scan_path_fails() {
    let temp = tempdir().unwrap();
    cargo_bin_cmd!("argscan")
        .args(["--arch", "amd64", "--func", "open", "--arg", "0"])
        .arg("--path")
        .arg(temp.path().join("absent"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
