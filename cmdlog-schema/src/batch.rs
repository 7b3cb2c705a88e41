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

//! Validation of every protocol schema found under a root directory.
//!
//! Each protocol lives in its own sub-directory of the root, with its
//! schema at `<root>/<protocol>/protocol.yaml`.

use codespan_reporting::files;
use codespan_reporting::term::termcolor::{Color, ColorSpec, WriteColor};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::analyzer::{ValidationResult, Validator};
use crate::ast::SourceDatabase;

/// Name of the schema document inside a protocol directory.
pub const SCHEMA_FILE_NAME: &str = "protocol.yaml";

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("failed to read '{}': {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("no schema documents found under '{}'", .0.display())]
    NoDocuments(PathBuf),
}

/// Results of a batch run, in discovery order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub results: Vec<ValidationResult>,
}

impl BatchReport {
    /// A batch passes when at least one document was validated and no
    /// document reported an error. Warnings do not fail a batch.
    pub fn passed(&self) -> bool {
        !self.results.is_empty() && self.failed() == 0
    }

    /// Number of documents with at least one error.
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|result| result.has_errors()).count()
    }

    pub fn error_count(&self) -> usize {
        self.results.iter().map(ValidationResult::error_count).sum()
    }

    pub fn warning_count(&self) -> usize {
        self.results.iter().map(ValidationResult::warning_count).sum()
    }

    pub fn summary(&self) -> String {
        format!(
            "validated {} documents: {} passed, {} failed ({} errors, {} warnings)",
            self.results.len(),
            self.results.len() - self.failed(),
            self.failed(),
            self.error_count(),
            self.warning_count()
        )
    }

    /// Write the per-document reports followed by the summary line.
    pub fn emit(
        &self,
        sources: &SourceDatabase,
        writer: &mut dyn WriteColor,
    ) -> Result<(), files::Error> {
        for result in self.results.iter() {
            writeln!(writer, "==> {}", result.name)?;
            result.emit(sources, writer)?;
            let (status, color) =
                if result.has_errors() { ("FAILED", Color::Red) } else { ("PASSED", Color::Green) };
            writer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
            write!(writer, "{}", status)?;
            writer.reset()?;
            writeln!(
                writer,
                " {} ({} errors, {} warnings)",
                result.name,
                result.error_count(),
                result.warning_count()
            )?;
            writeln!(writer)?;
        }
        writeln!(writer, "{}", self.summary())?;
        Ok(())
    }
}

/// List the schema documents under `root`, sorted by path.
pub fn discover(root: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let io = |source: std::io::Error| BatchError::Io { path: root.to_owned(), source };
    let mut paths = vec![];
    for entry in std::fs::read_dir(root).map_err(io)? {
        let directory = entry.map_err(io)?.path();
        let path = directory.join(SCHEMA_FILE_NAME);
        if directory.is_dir() && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Validate every schema document under `root`.
///
/// Finding no document is an error, distinct from a batch where every
/// document failed.
pub fn run(
    validator: &Validator,
    sources: &mut SourceDatabase,
    root: &Path,
) -> Result<BatchReport, BatchError> {
    let paths = discover(root)?;
    if paths.is_empty() {
        return Err(BatchError::NoDocuments(root.to_owned()));
    }
    tracing::info!("validating {} documents under '{}'", paths.len(), root.display());
    let results = paths
        .iter()
        .map(|path| {
            tracing::debug!("validating '{}'", path.display());
            validator.validate_file(sources, path)
        })
        .collect();
    Ok(BatchReport { results })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::analyzer::{ErrorCode, Issue};
    use codespan_reporting::term::termcolor;

    fn report() -> BatchReport {
        let mut failing = ValidationResult::new("b/protocol.yaml");
        failing.issues.push(Issue::error(ErrorCode::MissingSection, "cmds", "missing", "add it"));
        let mut warned = ValidationResult::new("c/protocol.yaml");
        warned.issues.push(Issue::warning(ErrorCode::NoCommands, "cmds", "empty", "fill it"));
        BatchReport { results: vec![ValidationResult::new("a/protocol.yaml"), failing, warned] }
    }

    #[test]
    fn test_summary() {
        let report = report();
        assert!(!report.passed());
        assert_eq!(report.failed(), 1);
        assert_eq!(
            report.summary(),
            "validated 3 documents: 2 passed, 1 failed (1 errors, 1 warnings)"
        );
        assert!(!BatchReport { results: vec![] }.passed());
    }

    #[test]
    fn test_emit() {
        let sources = SourceDatabase::new();
        let mut buffer = termcolor::Buffer::no_color();
        report().emit(&sources, &mut buffer).unwrap();
        let text = String::from_utf8(buffer.into_inner()).unwrap();
        assert!(text.contains("PASSED a/protocol.yaml (0 errors, 0 warnings)"), "{}", text);
        assert!(text.contains("FAILED b/protocol.yaml (1 errors, 0 warnings)"), "{}", text);
        assert!(text.contains("error[E6]: missing"), "{}", text);
        assert!(text.ends_with("1 failed (1 errors, 1 warnings)\n"), "{}", text);
    }

    #[test]
    fn test_discover_missing_root() {
        let root = Path::new("/nonexistent/cmdlog/configs");
        assert!(matches!(discover(root), Err(BatchError::Io { .. })));
    }
}
