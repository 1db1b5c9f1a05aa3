//! Integration test: the `simulate` subcommand runs end to end and prints a
//! counter snapshot with a non-zero flushed payload.
//!
//! Run: cargo test -p streamtrace-harness --test simulate_cli_test

use std::process::Command;

#[test]
fn simulate_reports_one_flushed_payload() {
    let output = Command::new(env!("CARGO_BIN_EXE_streamtrace-harness"))
        .args(["simulate", "--hops", "2", "--hop-latency-ms", "10"])
        .output()
        .expect("failed to run streamtrace-harness binary");

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"flushed_payloads\": 1"), "{stdout}");
}

#[test]
fn encode_context_prints_binary_and_base64_forms() {
    let output = Command::new(env!("CARGO_BIN_EXE_streamtrace-harness"))
        .args([
            "encode-context",
            "--hash",
            "17210443572488294574",
            "--pathway-start-ns",
            "1677632342000000000",
            "--edge-start-ns",
            "1677632342000000000",
        ])
        .output()
        .expect("failed to run streamtrace-harness binary");

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rtARjT7H1+7gn/Cq02Hgn/Cq02E="), "{stdout}");
}
