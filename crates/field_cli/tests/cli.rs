use std::fs::{read_to_string, File};
use std::io::Write;
use std::path::PathBuf;

use assert_cmd::Command;
use indoc::indoc;
use predicates::prelude::*;
use tempfile::{tempdir, TempDir};

/// A context, which will be dropped when the tests are completed.
struct Context {
    temp_dir: TempDir,
    trace_log_path: PathBuf,
}

impl Context {
    fn new() -> Self {
        let temp_dir = tempdir().unwrap();

        let mut trace_log_path = PathBuf::from(temp_dir.path());
        trace_log_path.push("trace.log");

        Self {
            temp_dir,
            trace_log_path,
        }
    }

    fn write_script(&self, content: &str) -> PathBuf {
        let mut path = PathBuf::from(self.temp_dir.path());
        path.push("script.json");

        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes())
            .unwrap();

        path
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_field_cli"));
        cmd.env_remove("FIELD_API_URL")
            .env_remove("FIELD_TECHNICIAN_ID")
            .env_remove("RUST_LOG")
            // nothing listens here, scripts below must not need the network
            .args(["--api-url", "http://127.0.0.1:9/api", "--timeout-secs", "1"])
            .arg("--trace")
            .arg(&self.trace_log_path);
        cmd
    }
}

#[test]
fn help_lists_subcommands() {
    // given
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_field_cli"));

    // when
    cmd.arg("--help")
        // then
        .assert()
        .success()
        .stdout(
            predicate::str::contains("run-script")
                .and(predicate::str::contains("report"))
                .and(predicate::str::contains("references")),
        );
}

#[test]
fn missing_script_fails() {
    // given
    let ctx = Context::new();
    let mut cmd = ctx.command();

    // when
    cmd.args(["run-script", "--script"])
        .arg(ctx.temp_dir.path().join("missing.json"))
        // then
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unable to read script"));
}

#[test]
fn technician_name_requires_technician_id() {
    // given
    let ctx = Context::new();
    let mut cmd = ctx.command();

    // when
    cmd.args(["--technician-name", "Tech One", "references", "--kind", "chemicals"])
        // then
        .assert()
        .failure()
        .stderr(predicate::str::contains("--technician-id"));
}

#[test]
fn manual_session_cannot_start_work() {
    // given
    let ctx = Context::new();
    let script = ctx.write_script(indoc! {r#"
        [
            { "SignIn": { "technician": { "id": "T1", "name": "Tech One" }, "role": "Technician" } },
            { "OpenSession": { "origin": { "customerId": "C1", "serviceType": "Myocide", "status": "Scheduled" } } },
            "StartWork"
        ]
    "#});
    let mut cmd = ctx.command();

    // when
    cmd.args(["-vv", "run-script", "--script"])
        .arg(&script)
        // then
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""kind": "Blocked""#)
                .and(predicate::str::contains("work can only be started from an appointment"))
                .and(predicate::str::contains(r#""phase": "Idle""#)),
        );

    // and
    let trace_content = read_to_string(&ctx.trace_log_path).unwrap();
    assert!(trace_content.contains("Running script"));
}

#[test]
fn station_is_logged_during_work() {
    // given
    let ctx = Context::new();
    let script = ctx.write_script(indoc! {r#"
        [
            { "SignIn": { "technician": { "id": "T1", "name": "Tech One" }, "role": "Technician" } },
            { "OpenSession": { "origin": {
                "customerId": "C1",
                "appointmentId": "A1",
                "serviceType": "Myocide",
                "status": "Scheduled",
                "stations": [ { "stationId": 1, "stationType": "BaitStation" } ]
            } } },
            "StartWork",
            { "OpenStation": { "key": { "stationId": 1, "stationType": "BaitStation" } } },
            { "EditStation": { "command": { "SetAccess": "Yes" } } },
            { "EditStation": { "command": { "SetConsumption": "50%" } } },
            { "EditStation": { "command": { "SetBaitType": "Brodifacoum" } } },
            { "EditStation": { "command": { "SetDosage": 20 } } },
            { "EditStation": { "command": { "SetCondition": "Functional" } } },
            "SubmitStation"
        ]
    "#});
    let mut cmd = ctx.command();

    // when
    cmd.args(["run-script", "--script"])
        .arg(&script)
        // then
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""phase": "WorkInProgress""#)
                .and(predicate::str::contains(r#""complete": true"#))
                .and(predicate::str::contains(r#""observation_count": 1"#)),
        );
}

#[test]
fn unreachable_service_is_reported() {
    // given
    let ctx = Context::new();
    let mut cmd = ctx.command();

    // when
    cmd.args(["references", "--kind", "bait-types"])
        // then
        .assert()
        .failure()
        .stderr(predicate::str::contains("Request failed"));
}
