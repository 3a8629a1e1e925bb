//! End-to-end tests of the paribridge binary

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Command isolated from any paribridge.toml above the temp dir's cwd and
/// from the caller's environment
fn paribridge(workdir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("paribridge").unwrap();
    cmd.current_dir(workdir.path())
        .env("HOME", workdir.path())
        .env_remove("PARIBRIDGE_ARENA_SIZE")
        .env_remove("PARIBRIDGE_ARENA_MAX_SIZE")
        .env_remove("PARIBRIDGE_LIMB_ORDER")
        .env_remove("PARIBRIDGE_LOG")
        .env_remove("PARIBRIDGE_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("call"))
        .stdout(predicate::str::contains("describe"))
        .stdout(predicate::str::contains("poly"))
        .stdout(predicate::str::contains("exports"))
        .stdout(predicate::str::contains("PARIBRIDGE_ARENA_SIZE"));
}

#[test]
fn test_call_multiplies() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .args(["call", "gmul", "12", "34"])
        .assert()
        .success()
        .stdout("408\n");
}

#[test]
fn test_call_with_negative_and_list_arguments() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .args(["call", "gdiv", "-3", "2"])
        .assert()
        .success()
        .stdout("-3/2\n");
    paribridge(&dir)
        .args(["call", "gneg", "[1, -2]"])
        .assert()
        .success()
        .stdout("[-1, 2]\n");
}

#[test]
fn test_call_json_output() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .args(["call", "--json", "mkvec2", "1", "[2, 3]"])
        .assert()
        .success()
        .stdout("[1,[2,3]]\n");
}

#[test]
fn test_call_unknown_function_fails() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .args(["call", "no_such_function_anywhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("function not found"));
}

#[test]
fn test_call_foreign_error_is_reported() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .args(["call", "gdiv", "1", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("impossible inverse"));
}

#[test]
fn test_poly_normalizes() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .args(["poly", "0", "-1", "2", "0"])
        .assert()
        .success()
        .stdout("2*x^2 - x\ncoefficients [0, -1, 2]\n");
    paribridge(&dir)
        .args(["poly", "--json"])
        .assert()
        .success()
        .stdout("[]\n");
}

#[test]
fn test_describe_vector() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .args(["describe", "[1, [2, 3]]"])
        .assert()
        .success()
        .stdout("[1, [2, 3]]\ntype 17\n");
}

#[test]
fn test_exports() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .arg("exports")
        .assert()
        .success()
        .stdout(predicate::str::contains("gmul"))
        .stdout(predicate::str::contains("mkvec5"));
    paribridge(&dir)
        .args(["exports", "--host"])
        .assert()
        .success()
        .stdout(predicate::str::contains("handle_describe"));
}

#[test]
fn test_version_reports_foreign_library() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("paribridge arena"));
}

#[test]
fn test_project_config_is_applied() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("paribridge.toml"),
        "[arena]\ninitial_size = \"4k\"\nmax_size = \"16k\"\n",
    )
    .unwrap();
    // 3000 small integers do not fit in 16 KiB
    let big_list = format!(
        "[{}]",
        (0..3000).map(|n| n.to_string()).collect::<Vec<_>>().join(",")
    );
    paribridge(&dir)
        .args(["call", "gcopy", &big_list])
        .assert()
        .failure()
        .stderr(predicate::str::contains("stack overflow"));
    paribridge(&dir)
        .args(["--max-size", "1m", "call", "glength", &big_list])
        .assert()
        .success()
        .stdout("3000\n");
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("paribridge.toml"), "[arena]\nbogus = 1\n").unwrap();
    paribridge(&dir)
        .arg("version")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_bad_argument_syntax() {
    let dir = TempDir::new().unwrap();
    paribridge(&dir)
        .args(["call", "gneg", "[1, 2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unterminated list"));
}
