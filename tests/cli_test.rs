use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::net::TcpListener;
use std::process::Command;

#[test]
fn test_help_lists_configuration() {
    let mut cmd = Command::new(cargo_bin!("paytrail"));
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("--bind"))
        .stdout(predicate::str::contains("--three-d-secure-threshold"))
        .stdout(predicate::str::contains("--expiry-sweep-secs"));
}

#[test]
fn test_missing_seed_file_fails() {
    let mut cmd = Command::new(cargo_bin!("paytrail"));
    cmd.arg("--seed").arg("does/not/exist.csv");

    cmd.assert().failure();
}

#[test]
fn test_malformed_seed_fails() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "type, id, owner, total").unwrap();
    writeln!(csv, "refund, 1, 1, 10").unwrap();

    let mut cmd = Command::new(cargo_bin!("paytrail"));
    cmd.arg("--seed").arg(csv.path());

    cmd.assert().failure().stderr(predicate::str::contains("CSV error"));
}

#[test]
fn test_invalid_default_currency_fails() {
    let mut cmd = Command::new(cargo_bin!("paytrail"));
    cmd.arg("--default-currency").arg("EURO");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid currency code"));
}

#[test]
fn test_occupied_port_fails_after_seeding() {
    let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = occupied.local_addr().unwrap();

    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "type, id, owner, total").unwrap();
    writeln!(csv, "order, 1, 42, 100.00").unwrap();

    let mut cmd = Command::new(cargo_bin!("paytrail"));
    cmd.arg("--seed")
        .arg(csv.path())
        .arg("--bind")
        .arg(addr.to_string())
        .env("RUST_LOG", "info");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("loaded seed data"));
}
