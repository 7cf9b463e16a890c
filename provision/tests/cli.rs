//! CLI tests for the `provision` binary.
//!
//! Spawns the binary and verifies exit codes for validation, the no-op apply
//! path, and a failing remote command.

use std::fs;
use std::process::Command;

use provision::exit_codes;

fn provision(dir: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_provision"))
        .current_dir(dir)
        .args(args)
        .output()
        .expect("run provision")
}

#[test]
fn validate_rejects_conflicting_reservation() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("provision.toml"),
        "[hardware]\nRAM = 4096\nRAM_reservation = 512\nRAM_reserve_all = true\n",
    )
    .expect("write config");

    let output = provision(temp.path(), &["validate"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("'RAM_reservation' and 'RAM_reserve_all' cannot be used together"));
}

#[test]
fn init_then_validate_succeeds() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = provision(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(temp.path().join("provision.toml").exists());

    let output = provision(temp.path(), &["validate"]);
    assert_eq!(output.status.code(), Some(exit_codes::OK));

    let output = provision(temp.path(), &["init"]);
    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
}

#[test]
fn apply_without_vm_is_invalid() {
    let temp = tempfile::tempdir().expect("tempdir");

    let output = provision(temp.path(), &["apply"]);

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    assert!(String::from_utf8_lossy(&output.stderr).contains("no target VM"));
}

#[test]
fn apply_with_default_hardware_never_calls_remote() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("provision.toml"),
        "vm = \"build-01\"\n\n[remote]\ncommand = [\"definitely-not-govc-xyz\"]\n",
    )
    .expect("write config");

    let output = provision(temp.path(), &["apply"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Customizing hardware"));
}

#[cfg(unix)]
#[test]
fn apply_accepts_maximum_timeout() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("provision.toml"),
        "vm = \"build-01\"\n\n[hardware]\nCPUs = 2\n\n[remote]\ncommand = [\"true\"]\npoll_interval_ms = 10\n",
    )
    .expect("write config");

    let max = u64::MAX.to_string();
    let output = provision(temp.path(), &["apply", "--timeout", &max]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    assert!(!String::from_utf8_lossy(&output.stderr).contains("panicked"));
}

#[test]
fn config_timeout_at_maximum_is_accepted() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("provision.toml"),
        format!("vm = \"build-01\"\ntimeout_secs = {}\n", i64::MAX),
    )
    .expect("write config");

    let output = provision(temp.path(), &["apply"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
}

#[cfg(unix)]
#[test]
fn apply_reports_remote_failure_as_halt() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("provision.toml"),
        "[hardware]\nCPUs = 4\nRAM = 8192\n\n[remote]\ncommand = [\"sh\", \"-c\", \"echo 'insufficient host memory' >&2; exit 1\"]\npoll_interval_ms = 10\n",
    )
    .expect("write config");

    let output = provision(temp.path(), &["apply", "--vm", "build-01"]);

    assert_eq!(output.status.code(), Some(exit_codes::HALTED));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Customizing hardware parameters..."));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configure-hardware"));
    assert!(stderr.contains("insufficient host memory"));
}

#[cfg(unix)]
#[test]
fn apply_succeeds_when_remote_succeeds() {
    let temp = tempfile::tempdir().expect("tempdir");
    fs::write(
        temp.path().join("provision.toml"),
        "vm = \"build-01\"\n\n[hardware]\nCPUs = 2\n\n[remote]\ncommand = [\"true\"]\npoll_interval_ms = 10\n",
    )
    .expect("write config");

    let output = provision(temp.path(), &["apply"]);

    assert_eq!(output.status.code(), Some(exit_codes::OK));
}
