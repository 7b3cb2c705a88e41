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

use cmdlog_schema::analyzer::{ErrorCode, Validator};
use cmdlog_schema::ast::SourceDatabase;
use cmdlog_schema::batch::{self, BatchError, SCHEMA_FILE_NAME};
use googletest::prelude::{assert_that, eq};

fn schema(protocol: &str, endian: &str) -> String {
    format!(
        r#"
meta:
  protocol: {protocol}
  default_endian: {endian}
types:
  uint8: {{base: uint, bytes: 1}}
  uint16: {{base: uint, bytes: 2}}
cmds:
  1:
    - {{name: count, type: uint8, id: cnt}}
    - repeat_by: cnt
      fields:
        - {{name: value, type: uint16}}
"#
    )
}

fn write_protocol(root: &Path, name: &str, source: &str) {
    let directory = root.join(name);
    fs::create_dir_all(&directory).unwrap();
    fs::write(directory.join(SCHEMA_FILE_NAME), source).unwrap();
}

#[test]
fn test_batch_with_one_invalid_document() {
    let root = tempfile::tempdir().unwrap();
    write_protocol(root.path(), "alpha", &schema("alpha", "LE"));
    write_protocol(root.path(), "bravo", &schema("bravo", "BE"));
    write_protocol(root.path(), "charlie", &schema("charlie", "middle"));
    write_protocol(root.path(), "delta", &schema("delta", "little"));
    // Not a protocol directory.
    fs::write(root.path().join("README.txt"), "notes").unwrap();
    fs::create_dir_all(root.path().join("empty")).unwrap();

    let mut sources = SourceDatabase::new();
    let report = batch::run(&Validator::default(), &mut sources, root.path()).unwrap();

    assert_that!(report.results.len(), eq(4));
    assert!(!report.passed());
    let failing: Vec<_> = report.results.iter().filter(|result| result.has_errors()).collect();
    assert_that!(failing.len(), eq(1));
    assert!(failing[0].name.contains("charlie"), "{}", failing[0].name);
    assert_that!(failing[0].error_count(), eq(1));
    assert_that!(failing[0].issues[0].code, eq(ErrorCode::InvalidEndianness));
    assert_that!(failing[0].issues[0].location.as_str(), eq("meta.default_endian"));

    // Discovery order is sorted by path.
    let names: Vec<_> = report.results.iter().map(|result| result.name.clone()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_that!(names, eq(sorted));
}

#[test]
fn test_batch_with_warnings_passes() {
    let root = tempfile::tempdir().unwrap();
    write_protocol(root.path(), "alpha", &schema("alpha", "LE"));
    write_protocol(
        root.path(),
        "bravo",
        "meta: {protocol: bravo}\ntypes: {uint8: {base: uint, bytes: 1}}\ncmds: {}\n",
    );

    let mut sources = SourceDatabase::new();
    let report = batch::run(&Validator::default(), &mut sources, root.path()).unwrap();
    assert!(report.passed());
    assert_that!(report.warning_count(), eq(2));
    assert_that!(report.error_count(), eq(0));
}

#[test]
fn test_batch_reports_unreadable_documents() {
    let root = tempfile::tempdir().unwrap();
    write_protocol(root.path(), "alpha", &schema("alpha", "LE"));
    let directory = root.path().join("latin1");
    fs::create_dir_all(&directory).unwrap();
    fs::write(directory.join(SCHEMA_FILE_NAME), b"meta: {protocol: caf\xe9}\n").unwrap();

    let mut sources = SourceDatabase::new();
    let report = batch::run(&Validator::default(), &mut sources, root.path()).unwrap();
    assert!(!report.passed());
    assert_that!(report.failed(), eq(1));
    assert_that!(report.results[1].issues[0].code, eq(ErrorCode::InvalidEncoding));
}

#[test]
fn test_empty_root() {
    let root = tempfile::tempdir().unwrap();
    let mut sources = SourceDatabase::new();
    let result = batch::run(&Validator::default(), &mut sources, root.path());
    assert!(matches!(result, Err(BatchError::NoDocuments(_))));
}
