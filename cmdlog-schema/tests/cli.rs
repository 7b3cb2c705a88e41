// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

const VALID: &str = r#"
meta: {protocol: demo}
types: {uint8: {base: uint, bytes: 1}, uint16: {base: uint, bytes: 2}}
cmds:
  1:
    - {name: a, type: uint8, id: cnt}
    - {repeat_by: cnt, fields: [{name: v, type: uint16, len: 2}]}
"#;

const INVALID: &str = r#"
meta: {protocol: demo}
types: {uint8: {base: uint, bytes: 1}, uint16: {base: uint, bytes: 2}}
cmds:
  1:
    - {name: a, type: uint8, id: cnt}
    - {repeat_by: missing, fields: [{name: v, type: uint16, len: 2}]}
"#;

fn validate(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cmdlog-validate"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn write(directory: &Path, name: &str, source: &str) -> String {
    let path = directory.join(name);
    fs::write(&path, source).unwrap();
    path.display().to_string()
}

#[test]
fn test_valid_document() {
    let directory = tempfile::tempdir().unwrap();
    let path = write(directory.path(), "valid.yaml", VALID);
    let output = validate(&[&path]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("0 errors, 0 warnings"), "{}", stdout);
}

#[test]
fn test_invalid_document() {
    let directory = tempfile::tempdir().unwrap();
    let path = write(directory.path(), "invalid.yaml", INVALID);
    let output = validate(&[&path]);
    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("error[E51]"), "{}", stdout);
    assert!(stdout.contains("'missing'"), "{}", stdout);
}

#[test]
fn test_missing_document() {
    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("absent.yaml").display().to_string();
    let output = validate(&[&path]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stdout).contains("error[E1]"));
}

#[test]
fn test_json_report() {
    let directory = tempfile::tempdir().unwrap();
    let path = write(directory.path(), "invalid.yaml", INVALID);
    let output = validate(&["--output-format", "json", &path]);
    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let issues = report["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["level"], "ERROR");
    assert_eq!(issues[0]["code"], "E51");
    assert_eq!(issues[0]["location"], "cmds.1.fields[1].repeat_by");
}

#[test]
fn test_scale_severity() {
    let directory = tempfile::tempdir().unwrap();
    let path = write(
        directory.path(),
        "scale.yaml",
        "meta: {protocol: demo}\ntypes: {s: {base: str, bytes: 4}}\ncmds: {1: [{name: a, type: s, scale: 2}]}\n",
    );
    assert!(validate(&[&path]).status.success());
    assert_eq!(validate(&["--scale-severity", "error", &path]).status.code(), Some(1));
}

#[test]
fn test_dump() {
    let directory = tempfile::tempdir().unwrap();
    let path = write(directory.path(), "valid.yaml", VALID);
    let output = validate(&["--output-format", "json", "--dump", &path]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut values = serde_json::Deserializer::from_str(&stdout).into_iter::<serde_json::Value>();
    let report = values.next().unwrap().unwrap();
    assert_eq!(report["issues"].as_array().unwrap().len(), 0);
    let config = values.next().unwrap().unwrap();
    assert_eq!(config["meta"]["protocol"], "demo");
    assert_eq!(config["compatibility"]["head_len"], 11);
    assert_eq!(config["types"]["uint16"]["base"], "uint");
}

#[test]
fn test_batch_root() {
    let root = tempfile::tempdir().unwrap();
    for (name, source) in [("alpha", VALID), ("bravo", VALID)] {
        fs::create_dir_all(root.path().join(name)).unwrap();
        write(&root.path().join(name), "protocol.yaml", source);
    }
    let root_path = root.path().display().to_string();
    let output = validate(&["--root", &root_path]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("validated 2 documents: 2 passed, 0 failed"), "{}", stdout);

    write(&root.path().join("bravo"), "protocol.yaml", INVALID);
    assert_eq!(validate(&[&root_path]).status.code(), Some(1));
}

#[test]
fn test_empty_batch_root() {
    let root = tempfile::tempdir().unwrap();
    let root_path = root.path().display().to_string();
    assert_eq!(validate(&["--root", &root_path]).status.code(), Some(1));
}

#[test]
fn test_version() {
    let output = validate(&["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("cmdlog-validate "));
}
