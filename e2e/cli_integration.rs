//! Black-box coverage of the `flowcore` binary via `std::process::Command`:
//! build/lookup/dump round trips and the rollup subcommand's stdin protocol.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tempfile::TempDir;

fn flowcore_bin() -> PathBuf {
    if let Ok(p) = std::env::var("CARGO_BIN_EXE_flowcore") {
        return PathBuf::from(p);
    }
    let mut p = std::env::current_exe().unwrap();
    p.pop();
    if p.ends_with("deps") {
        p.pop();
    }
    p.push("flowcore");
    p
}

#[test]
fn build_lookup_and_dump_round_trip_through_the_binary() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("map.bin");

    let status = Command::new(flowcore_bin())
        .args([
            "pmap",
            "build",
            "--kind",
            "v4",
            "--out",
            out.to_str().unwrap(),
            "--compression",
            "zlib",
            "10.0.0.0-10.0.0.255=1",
            "10.1.0.0-10.1.255.255=2",
        ])
        .status()
        .expect("failed to run flowcore pmap build");
    assert!(status.success());
    assert!(out.exists());

    let output = Command::new(flowcore_bin())
        .args(["pmap", "lookup", out.to_str().unwrap(), "10.0.0.5"])
        .output()
        .expect("failed to run flowcore pmap lookup");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("code=1"), "lookup output was: {stdout}");

    let output = Command::new(flowcore_bin())
        .args(["pmap", "dump", out.to_str().unwrap()])
        .output()
        .expect("failed to run flowcore pmap dump");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|l| l.contains("code=1")), "dump output was: {stdout}");
    assert!(stdout.lines().any(|l| l.contains("code=2")), "dump output was: {stdout}");
}

#[test]
fn rollup_reads_stdin_and_prints_totals() {
    let mut child = Command::new(flowcore_bin())
        .args(["rollup", "--spec", "TS/ABCXH"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to run flowcore rollup");

    {
        let stdin = child.stdin.as_mut().unwrap();
        stdin.write_all(b"10.0.0.1,3\n").unwrap();
        stdin.write_all(b"10.0.0.9,7\n").unwrap();
        stdin.write_all(b"10.1.0.1,5\n").unwrap();
    }
    let output = child.wait_with_output().expect("rollup did not run to completion");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("total=15"), "rollup output was: {stdout}");
}

#[test]
fn lookup_against_a_missing_file_exits_non_zero() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.bin");
    let status = Command::new(flowcore_bin())
        .args(["pmap", "lookup", missing.to_str().unwrap(), "10.0.0.1"])
        .status()
        .expect("failed to run flowcore pmap lookup");
    assert!(!status.success());
}

#[test]
fn malformed_range_spec_is_rejected_with_a_nonzero_exit() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("map.bin");
    let status = Command::new(flowcore_bin())
        .args(["pmap", "build", "--kind", "v4", "--out", out.to_str().unwrap(), "not-a-range"])
        .status()
        .expect("failed to run flowcore pmap build");
    assert!(!status.success());
}
