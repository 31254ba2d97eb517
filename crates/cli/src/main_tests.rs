// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Knita Contributors

//! Process-level CLI tests.

use assert_cmd::Command;

#[test]
fn version_prints_the_crate_version() {
    Command::cargo_bin("knita")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(format!("{}\n", env!("CARGO_PKG_VERSION")));
}

#[test]
fn build_requires_a_pattern_command() {
    Command::cargo_bin("knita").unwrap().arg("build").assert().failure();
}

#[test]
fn build_injects_the_pattern_environment() {
    Command::cargo_bin("knita")
        .unwrap()
        .args([
            "build",
            "--verbose",
            "/bin/sh",
            "-c",
            "test -S \"$KNITA_SOCKET\" && test -n \"$KNITA_BUILD_ID\"",
        ])
        .assert()
        .success();
}

#[test]
fn pattern_exit_codes_propagate() {
    Command::cargo_bin("knita")
        .unwrap()
        .args(["build", "--verbose", "/bin/sh", "-c", "exit 7"])
        .assert()
        .code(7);
}

#[test]
fn pattern_stdout_reaches_the_build_log_output() {
    Command::cargo_bin("knita")
        .unwrap()
        .args(["build", "--verbose", "/bin/sh", "-c", "printf pattern-says-hi"])
        .assert()
        .success()
        .stdout(predicates::str::contains("pattern-says-hi"));
}
