#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn signaler() -> Command {
    let mut cmd = Command::cargo_bin("cfn-signaler").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("StackName")
        .env_remove("LogicalResourceId");
    cmd
}

fn write_event(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

// ---------------------------------------------------------------------------
// cfn-signaler token
// ---------------------------------------------------------------------------

#[test]
fn token_prints_fields_and_next_states() {
    signaler()
        .args(["token", "enabled_increment_2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("attempts:"))
        .stdout(predicate::str::contains("enabled_increment_3"))
        .stdout(predicate::str::contains("enabled_increment_2_success"));
}

#[test]
fn token_json_round_trips_the_string() {
    let out = signaler()
        .args(["token", "disabled_increment_0_success", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["token"], "disabled_increment_0_success");
    assert_eq!(v["flag"], "disabled");
    assert_eq!(v["attempts"], 0);
    assert_eq!(v["success"], true);
}

#[test]
fn token_rejects_malformed_input() {
    for bad in [
        "enabled_increment_",
        "Enabled_increment_1",
        "enabled_increment_01",
        "paused_increment_1",
    ] {
        signaler()
            .args(["token", bad])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid counter token"));
    }
}

// ---------------------------------------------------------------------------
// cfn-signaler classify
// ---------------------------------------------------------------------------

#[test]
fn classify_scheduled_tick() {
    let dir = TempDir::new().unwrap();
    let event = write_event(
        &dir,
        "tick.json",
        r#"{"RequestId": "__Event__",
            "ResourceProperties": {"StackName": "MyStack", "Event": "Rule"}}"#,
    );
    signaler()
        .args(["classify", "--stack-name", "MyStack", "--logical-id", "EC2Instance", "--event"])
        .arg(&event)
        .assert()
        .success()
        .stdout(predicate::str::contains("scheduled_tick"))
        .stdout(predicate::str::contains("Rule"));
}

#[test]
fn classify_provisioning_request_as_json() {
    let dir = TempDir::new().unwrap();
    let event = write_event(
        &dir,
        "update.json",
        r#"{
            "RequestType": "Update",
            "StackId": "arn:aws:cloudformation:eu-west-1:123456789012:stack/MyStack/guid",
            "RequestId": "req-1",
            "LogicalResourceId": "SignalerHook",
            "ResponseURL": "https://example.invalid/cb"
        }"#,
    );
    let out = signaler()
        .args(["classify", "--json", "--stack-name", "MyStack"])
        .args(["--logical-id", "EC2Instance", "--event"])
        .arg(&event)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["kind"], "provisioning");
    assert_eq!(v["RequestType"], "Update");
}

#[test]
fn classify_lifecycle_event_for_other_stack_is_unrecognized() {
    let dir = TempDir::new().unwrap();
    let event = write_event(
        &dir,
        "run.json",
        r#"{"detail": {"managementEvent": true,
            "requestParameters": {"tagSpecificationSet": {"items": [
            {"resourceType": "instance", "tags": [
                {"key": "aws:cloudformation:stack-name", "value": "OtherStack"},
                {"key": "aws:cloudformation:logical-id", "value": "EC2Instance"}
            ]}
        ]}}}}"#,
    );
    signaler()
        .args(["classify", "--stack-name", "MyStack", "--logical-id", "EC2Instance", "--event"])
        .arg(&event)
        .assert()
        .success()
        .stdout(predicate::str::contains("unrecognized"));
}

#[test]
fn classify_reads_identity_from_environment() {
    let dir = TempDir::new().unwrap();
    let event = write_event(&dir, "manual.json", r#"{"source": "manual"}"#);
    signaler()
        .env("StackName", "MyStack")
        .env("LogicalResourceId", "EC2Instance")
        .args(["classify", "--event"])
        .arg(&event)
        .assert()
        .success()
        .stdout(predicate::str::contains("unrecognized"));
}

#[test]
fn classify_malformed_tick_fails() {
    let dir = TempDir::new().unwrap();
    let event = write_event(
        &dir,
        "bad.json",
        r#"{"RequestId": "__Event__", "ResourceProperties": "not-an-object"}"#,
    );
    signaler()
        .args(["classify", "--stack-name", "MyStack", "--logical-id", "EC2Instance", "--event"])
        .arg(&event)
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed event"));
}

#[test]
fn classify_missing_file_fails() {
    signaler()
        .args(["classify", "--stack-name", "s", "--logical-id", "l"])
        .args(["--event", "/nonexistent/event.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

// ---------------------------------------------------------------------------
// cfn-signaler simulate
// ---------------------------------------------------------------------------

#[test]
fn simulate_unhealthy_run_raises_incident() {
    signaler()
        .args(["simulate", "--threshold", "2", "--health", "unhealthy,unhealthy,unhealthy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Counter_incrementer:enabled_increment_1"))
        .stdout(predicate::str::contains("Counter_incrementer:enabled_increment_2"))
        .stdout(predicate::str::contains("INCIDENT_RAISED"))
        .stdout(predicate::str::contains("ConvergenceStatus=compromised"));
}

#[test]
fn simulate_healthy_run_converges_as_json() {
    let out = signaler()
        .args(["simulate", "--json", "--threshold", "2", "--health", "healthy,healthy,healthy"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let ticks = v["ticks"].as_array().unwrap();
    assert_eq!(ticks.len(), 2);
    assert_eq!(ticks[0]["after"], "enabled_increment_0_success");
    assert_eq!(ticks[1]["response"]["body"], "SUCCEEDED");
    assert_eq!(ticks[1]["response"]["statusCode"], "200");
    assert_eq!(ticks[1]["schedule"], "DISABLED");
    assert_eq!(v["signals"][0]["status"], "SUCCESS");
}

#[test]
fn simulate_stopped_instance_is_restarted_and_stopped_again() {
    let out = signaler()
        .args(["simulate", "--json", "--threshold", "3", "--health", "stopped,healthy"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(v["started"].as_array().unwrap().len(), 1);
    assert_eq!(v["stopped"].as_array().unwrap().len(), 1);
    assert_eq!(v["ticks"][0]["after"], "enabled_increment_0_success");
}

#[test]
fn simulate_rejects_unknown_health_value() {
    signaler()
        .args(["simulate", "--health", "sideways"])
        .assert()
        .failure();
}
