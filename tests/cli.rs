use assert_cmd::Command;
use predicates::prelude::*;

fn fargo() -> Command {
    let mut cmd = Command::cargo_bin("fargo").expect("fargo binary");
    // Point everything at an unroutable hub so nothing here can reach the network.
    cmd.env("FARGO_HUB__URL", "http://127.0.0.1:9");
    cmd
}

#[test]
fn prints_version() {
    fargo()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    fargo()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("@fname/casts"))
        .stdout(predicate::str::contains("--count"));
}

#[test]
fn rejects_malformed_target() {
    fargo()
        .args(["explore", "dwr/casts"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("target must look like"));
}

#[test]
fn rejects_bad_hash() {
    fargo()
        .arg("@dwr/0x1234")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("bad cast hash"));
}

#[test]
fn requires_a_target() {
    fargo()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing target"));
}
