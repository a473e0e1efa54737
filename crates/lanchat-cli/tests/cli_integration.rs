//! CLI Integration Tests
//!
//! These tests verify the wiring between the CLI and the core library.
//! Commands that need a real LAN address are run with an explicit identity.

use assert_cmd::Command;
use predicates::prelude::*;

// ============================================================================
// Test Utilities
// ============================================================================

fn cli_cmd() -> Command {
    Command::cargo_bin("lanchat").expect("Failed to find lanchat binary")
}

/// Reserve a free loopback UDP port
fn free_udp_port() -> u16 {
    let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

// ============================================================================
// Help / Version
// ============================================================================

#[test]
fn test_help_lists_commands() {
    cli_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("info"))
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn test_version() {
    cli_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

// ============================================================================
// Info Command Tests
// ============================================================================

#[test]
fn test_info_with_explicit_identity() {
    cli_cmd()
        .args(["info", "--identity", "tester"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LAN Chat"))
        .stdout(predicate::str::contains("Identity: tester"))
        .stdout(predicate::str::contains("255.255.255.255:9876"));
}

#[test]
fn test_info_rejects_invalid_identity() {
    cli_cmd()
        .args(["info", "--identity", "bad:id"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid identity"));
}

// ============================================================================
// Serve Command Tests
// ============================================================================

#[test]
fn test_serve_sends_and_quits() {
    let port = free_udp_port();
    let target = format!("127.0.0.1:{}", free_udp_port());

    cli_cmd()
        .args([
            "serve",
            "--identity",
            "cli-node",
            "--port",
            "0",
            "--discovery-port",
            &port.to_string(),
            "--broadcast-addr",
            &target,
        ])
        .write_stdin("   \nhello cli\n/peers\n/quit\n")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("Identity: cli-node"))
        .stdout(predicate::str::contains("Peers (0):"))
        .stdout(predicate::str::contains("Goodbye."));
}

#[test]
fn test_serve_exits_on_eof() {
    let port = free_udp_port();
    let target = format!("127.0.0.1:{}", free_udp_port());

    cli_cmd()
        .args([
            "serve",
            "--identity",
            "eof-node",
            "--port",
            "0",
            "--discovery-port",
            &port.to_string(),
            "--broadcast-addr",
            &target,
        ])
        .write_stdin("")
        .timeout(std::time::Duration::from_secs(20))
        .assert()
        .success()
        .stdout(predicate::str::contains("Input closed"));
}

#[test]
fn test_serve_rejects_invalid_identity() {
    cli_cmd()
        .args(["serve", "--identity", "a:b", "--discovery-port", &free_udp_port().to_string()])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to start node"));
}
