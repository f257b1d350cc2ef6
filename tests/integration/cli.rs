//! Command-line behavior of the `chansel` binary.

use std::fs;

mod common;
use common::chansel;

const GOOD: &str = r#"
func main(a chan int, b chan int) {
    select {
    case v := <-a:
        f(v)
    case b <- 1:
        g()
    }
}
"#;

const BAD: &str = r#"
func main(c chan int) {
    select {
    default:
    default:
    }
}
"#;

fn write_source(dir: &tempfile::TempDir, name: &str, source: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, source).unwrap();
    path
}

#[test]
fn check_accepts_valid_program() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "main.sel", GOOD);
    let out = chansel().arg("check").arg(&file).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
}

#[test]
fn check_reports_diagnostics_and_fails() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "main.sel", BAD);
    let out = chansel().arg("check").arg(&file).output().unwrap();
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("multiple defaults in select"), "{stderr}");
}

#[test]
fn check_json_lists_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "main.sel", BAD);
    let out = chansel().args(["check", "--json"]).arg(&file).output().unwrap();
    assert_eq!(out.status.code(), Some(1));
    let value: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let list = value.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["code"], "multiple-defaults");

    let ok = write_source(&dir, "ok.sel", GOOD);
    let out = chansel().args(["check", "--json"]).arg(&ok).output().unwrap();
    assert!(out.status.success());
    assert_eq!(String::from_utf8_lossy(&out.stdout).trim(), "[]");
}

#[test]
fn lower_prints_the_lowered_program() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "main.sel", GOOD);
    let out = chansel().arg("lower").arg(&file).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("selectgo("), "{stdout}");
    assert!(!stdout.contains("select {"), "{stdout}");

    let out = chansel().args(["lower", "--normalized"]).arg(&file).output().unwrap();
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("case var v int; v = <-a:"), "{stdout}");
}

#[test]
fn build_writes_an_object() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "main.sel", GOOD);
    let output = dir.path().join("main.o");
    let out = chansel().arg("build").arg(&file).arg("-o").arg(&output).output().unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(!fs::read(&output).unwrap().is_empty());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "main.sel", GOOD);
    let out = chansel()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("check")
        .arg(&file)
        .output()
        .unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("configuration file not found"));
}

#[test]
fn config_next_to_source_enables_race_mode() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "main.sel", GOOD);
    let plain = chansel().arg("lower").arg(&file).output().unwrap();
    assert!(!String::from_utf8_lossy(&plain.stdout).contains("selectsetpc"));

    fs::write(dir.path().join("chansel.toml"), "[build]\nrace = true\n").unwrap();
    let raced = chansel().arg("lower").arg(&file).output().unwrap();
    assert!(raced.status.success());
    assert!(String::from_utf8_lossy(&raced.stdout).contains("selectsetpc(&%pcs[1])"));
}

#[test]
fn race_flag_overrides_config() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "main.sel", GOOD);
    fs::write(dir.path().join("chansel.toml"), "[build]\nrace = false\n").unwrap();
    let out = chansel().args(["lower", "--race"]).arg(&file).output().unwrap();
    assert!(String::from_utf8_lossy(&out.stdout).contains("var %pcs [2]uintptr"));
}

#[test]
fn malformed_config_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_source(&dir, "main.sel", GOOD);
    fs::write(dir.path().join("chansel.toml"), "[build]\nspeed = 3\n").unwrap();
    let out = chansel().arg("check").arg(&file).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("invalid chansel.toml"));
}
