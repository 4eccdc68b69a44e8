//! Binary-level tests. The engine is `sh`, so these run on unix only.
#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

/// Writes the artifact unless the unit equals `fail_unit`.
fn write_config(dir: &Path, fail_unit: &str) -> PathBuf {
    let yaml = format!(
        r#"template: report.qmd
dimensions:
  unit: [A, B]
  period: [2023, 2024]
formats: [html]
concurrency: 2
timeout_secs: 30
engine:
  program: sh
  args:
    - "-c"
    - 'test "$1" != "{fail_unit}" && echo "$1 $2" > "$3"'
    - quire
    - "{{{{ params.unit }}}}"
    - "{{{{ params.period }}}}"
    - "{{{{ output }}}}"
  param_args: []
"#
    );
    let path = dir.join("quire.yaml");
    fs::write(&path, yaml).expect("write config");
    path
}

fn quire_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("quire"));
    cmd.current_dir(dir).env("RUST_LOG", "warn");
    cmd
}

#[test]
fn run_renders_every_job_and_writes_summary() {
    let dir = TempDir::new().expect("dir");
    let config = write_config(dir.path(), "none");

    quire_cmd(dir.path())
        .arg("run")
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("SUCCESS"));

    for rel in [
        "a/2023/a_2023.html",
        "a/2024/a_2024.html",
        "b/2023/b_2023.html",
        "b/2024/b_2024.html",
    ] {
        let path = dir.path().join("output").join(rel);
        assert!(path.is_file(), "{rel} missing");
    }
    assert_eq!(
        fs::read_to_string(dir.path().join("output/b/2024/b_2024.html"))
            .unwrap()
            .trim(),
        "B 2024"
    );
    assert!(dir.path().join("output/quire-summary.json").is_file());
}

#[test]
fn partial_failure_exits_2_and_retry_renders_only_failures() {
    let dir = TempDir::new().expect("dir");
    let config = write_config(dir.path(), "B");

    quire_cmd(dir.path())
        .args(["run", "--json"])
        .arg(&config)
        .assert()
        .code(2)
        .stdout(contains("\"overall\": \"partial_success\""));
    assert!(!dir.path().join("output/b/2023/b_2023.html").exists());

    let config = write_config(dir.path(), "none");
    let output = quire_cmd(dir.path())
        .arg("run")
        .arg(&config)
        .args(["--json", "--retry-failed"])
        .output()
        .expect("retry");
    assert_eq!(output.status.code(), Some(0));
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(summary["overall"], "success");
    assert_eq!(summary["counts"]["total"], 4);
    assert!(dir.path().join("output/b/2023/b_2023.html").is_file());
}

#[test]
fn plan_lists_jobs_and_writes_nothing() {
    let dir = TempDir::new().expect("dir");
    let config = write_config(dir.path(), "none");

    quire_cmd(dir.path())
        .args(["plan", "--format", "pdf", "--format", "html"])
        .arg(&config)
        .assert()
        .success()
        .stdout(contains("8 job(s)"))
        .stdout(contains("a/2023/a_2023.pdf"));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn config_error_exits_1_without_output() {
    let dir = TempDir::new().expect("dir");
    let path = dir.path().join("quire.yaml");
    fs::write(
        &path,
        "template: r.qmd\ndimensions:\n  unit: []\n",
    )
    .unwrap();

    quire_cmd(dir.path())
        .arg("run")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(contains("unit"));
    assert!(!dir.path().join("output").exists());
}

#[test]
fn report_prints_failed_jobs_only() {
    let dir = TempDir::new().expect("dir");
    let config = write_config(dir.path(), "A");
    quire_cmd(dir.path()).arg("run").arg(&config).assert().code(2);

    quire_cmd(dir.path())
        .args(["report", "output/quire-summary.json", "--failed"])
        .assert()
        .success()
        .stdout(contains("unit=A, period=2023"))
        .stdout(contains("unit=B").not());
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().expect("dir");

    quire_cmd(dir.path()).arg("init").assert().success();
    assert!(dir.path().join("quire.yaml").is_file());

    quire_cmd(dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("--force"));
    quire_cmd(dir.path()).args(["init", "--force"]).assert().success();
}
