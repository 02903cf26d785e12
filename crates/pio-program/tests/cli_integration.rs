//! Integration tests for the pio-prog CLI.

use pio_core as _;
use pio_program as _;
use rstest::rstest;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing as _;
use tracing_subscriber as _;

const BLINK: &str = "\
#.program blink
#.wrap_target 0
e081
a042
#.wrap 2
0001
";

const FIXED: &str = "\
#.program fixed
#.origin 30
e001
e000
";

fn binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pio-prog"))
}

fn create_temp_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(binary_path())
        .args(args)
        .output()
        .expect("failed to run pio-prog")
}

#[test]
fn build_writes_little_endian_image() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "blink.pio", BLINK);
    let output = temp_dir.path().join("out.bin");

    let result = run(&[
        "build",
        source.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]);

    assert!(result.status.success());
    assert_eq!(
        fs::read(&output).unwrap(),
        vec![0x81, 0xe0, 0x42, 0xa0, 0x01, 0x00]
    );
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("3 instructions, 6 bytes"));
}

#[test]
fn build_with_default_output() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "blink.pio", BLINK);

    let status = Command::new(binary_path())
        .args(["build", source.to_str().unwrap()])
        .current_dir(temp_dir.path())
        .status()
        .expect("failed to run pio-prog");

    assert!(status.success());
    assert!(temp_dir.path().join("blink.bin").exists());
}

#[test]
fn verbose_build_lists_slots() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "blink.pio", BLINK);
    let output = temp_dir.path().join("blink.bin");

    let result = run(&[
        "build",
        source.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
        "-v",
    ]);

    assert!(result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("00: e081"));
    assert!(stderr.contains("02: 0001"));
}

#[test]
fn check_summarises_each_program() {
    let temp_dir = tempfile::tempdir().unwrap();
    let blink = create_temp_file(temp_dir.path(), "blink.pio", BLINK);
    let fixed = create_temp_file(temp_dir.path(), "fixed.pio", FIXED);

    let result = run(&["check", blink.to_str().unwrap(), fixed.to_str().unwrap()]);

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("blink (3 instructions, relocatable, wrap 0..2)"));
    assert!(stdout.contains("fixed (2 instructions, origin 30, wrap 30..31)"));
}

#[test]
fn check_reports_caret_diagnostics() {
    let temp_dir = tempfile::tempdir().unwrap();
    let source = create_temp_file(temp_dir.path(), "bad.pio", "#.program my blink\ne081\n");

    let result = run(&["check", source.to_str().unwrap()]);

    assert_eq!(result.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("bad.pio:1: error: invalid program name"));
    assert!(stderr.contains("#.program my blink\n            ^"));
}

#[test]
fn place_reports_offsets_and_occupancy() {
    let temp_dir = tempfile::tempdir().unwrap();
    let fixed = create_temp_file(temp_dir.path(), "fixed.pio", FIXED);
    let blink = create_temp_file(temp_dir.path(), "blink.pio", BLINK);

    let result = run(&["place", fixed.to_str().unwrap(), blink.to_str().unwrap()]);

    assert!(result.status.success());
    let stdout = String::from_utf8_lossy(&result.stdout);
    assert!(stdout.contains("fixed.pio: offset 30"));
    assert!(stdout.contains("blink.pio: offset 0"));
    assert!(stdout.contains("occupancy 0xc0000007"));
}

#[test]
fn place_fails_when_memory_is_full() {
    let temp_dir = tempfile::tempdir().unwrap();
    let fixed = create_temp_file(temp_dir.path(), "fixed.pio", FIXED);

    let result = run(&["place", fixed.to_str().unwrap(), fixed.to_str().unwrap()]);

    assert_eq!(result.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("fixed.pio: error:"));
}

#[rstest]
#[case(&["frobnicate"], "unknown command")]
#[case(&["build"], "missing input path")]
#[case(&["check", "--bogus"], "unknown option")]
fn usage_errors_exit_with_failure(#[case] args: &[&str], #[case] message: &str) {
    let result = run(args);
    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains(message));
}

#[test]
fn missing_file_is_reported() {
    let temp_dir = tempfile::tempdir().unwrap();
    let missing = temp_dir.path().join("absent.pio");

    let result = run(&["check", missing.to_str().unwrap()]);

    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("I/O error"));
}

#[test]
fn help_exits_successfully() {
    let result = run(&["--help"]);
    assert!(result.status.success());
    assert!(String::from_utf8_lossy(&result.stdout).contains("Usage: pio-prog"));
}
