//! Whole-binary smoke tests, driven with `assert_cmd` the way `a2ltool`'s
//! own CLI is smoke-tested: write a small fixture with `tempfile`, run the
//! compiled binary against it, and assert on the generated output and the
//! process exit code (spec §6: "exit code 0 on success, non-zero on any
//! error").

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn translates_a_small_module_to_a_c_header() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("sample.sdl");
    fs::write(&input, "AGGREGATE POINT STRUCTURE; X LONGWORD; Y LONGWORD; END POINT;").unwrap();
    let output = dir.path().join("sample.h");

    Command::cargo_bin("opensdl")
        .unwrap()
        .arg(&input)
        .arg("--lang")
        .arg(format!("c={}", output.display()))
        .assert()
        .success();

    let generated = fs::read_to_string(&output).unwrap();
    assert!(generated.contains("POINT"));
    assert!(generated.contains("struct"));
}

#[test]
fn missing_lang_flag_fails_with_no_output_error() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("sample.sdl");
    fs::write(&input, "CONSTANT A EQUALS 1;").unwrap();

    Command::cargo_bin("opensdl")
        .unwrap()
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("opensdl"));
}

#[test]
fn missing_input_file_fails_with_nonzero_exit() {
    Command::cargo_bin("opensdl")
        .unwrap()
        .arg("does-not-exist.sdl")
        .arg("--lang")
        .arg("c")
        .assert()
        .failure();
}

#[test]
fn header_flag_emits_a_banner_before_declarations() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("sample.sdl");
    fs::write(&input, "CONSTANT A EQUALS 1;").unwrap();
    let output = dir.path().join("sample.h");

    Command::cargo_bin("opensdl")
        .unwrap()
        .arg(&input)
        .arg("--lang")
        .arg(format!("c={}", output.display()))
        .arg("--header")
        .assert()
        .success();

    let generated = fs::read_to_string(&output).unwrap();
    assert!(generated.contains("A"));
    assert!(!generated.trim().is_empty());
}
