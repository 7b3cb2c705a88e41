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

//! Protocol schema validator.

use argh::FromArgs;
use codespan_reporting::term::termcolor;
use std::path::Path;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cmdlog_schema::analyzer::{Level, ValidationResult, Validator, ValidatorOptions};
use cmdlog_schema::{ast, batch, parser};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("could not parse {input:?}, valid options are 'text', 'json'.")),
        }
    }
}

#[derive(FromArgs, Debug)]
/// Protocol schema validator.
struct Opt {
    #[argh(switch)]
    /// print tool version and exit.
    version: bool,

    #[argh(option, default = "OutputFormat::Text")]
    /// report format ("text", "json"). The report is printed on stdout.
    output_format: OutputFormat,

    #[argh(option, default = "String::from(\"configs\")")]
    /// directory holding one sub-directory per protocol, each with a
    /// protocol.yaml schema. Used when no input path is given.
    root: String,

    #[argh(option)]
    /// severity of a scale attached to a non-numeric type
    /// ("error", "warning", "info").
    scale_severity: Option<Level>,

    #[argh(switch)]
    /// print the loaded protocol configuration as JSON when the input
    /// document has no errors.
    dump: bool,

    #[argh(positional)]
    /// schema document to validate. A directory is validated as a batch root.
    path: Option<String>,
}

fn validator(opt: &Opt) -> Validator {
    let mut options = ValidatorOptions::default();
    if let Some(level) = opt.scale_severity {
        options.scale_on_non_numeric = level;
    }
    Validator::new(options)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| format!("failed to serialize report: {}", err))
}

/// Validate a single document. Returns whether it is free of errors.
fn validate_document(opt: &Opt, path: &Path) -> Result<bool, String> {
    let mut sources = ast::SourceDatabase::new();
    let validator = validator(opt);
    let (document, result) = match parser::parse_file(&mut sources, path) {
        Ok(document) => {
            let result = validator.validate(&document);
            (Some(document), result)
        }
        Err(issue) => (None, ValidationResult::from_issue(&path.display().to_string(), issue)),
    };

    match opt.output_format {
        OutputFormat::Text => {
            let writer = termcolor::StandardStream::stdout(termcolor::ColorChoice::Auto);
            result
                .emit(&sources, &mut writer.lock())
                .map_err(|err| format!("failed to print the report: {}", err))?;
            println!(
                "{}: {} errors, {} warnings",
                result.name,
                result.error_count(),
                result.warning_count()
            );
        }
        OutputFormat::Json => println!("{}", to_json(&result)?),
    }

    if opt.dump && !result.has_errors() {
        if let Some(document) = &document {
            let config = parser::load(document).map_err(|err| err.to_string())?;
            println!("{}", to_json(&config)?);
        }
    }

    Ok(!result.has_errors())
}

/// Validate every document under a batch root. Returns whether the
/// batch passed.
fn validate_batch(opt: &Opt, root: &Path) -> Result<bool, String> {
    let mut sources = ast::SourceDatabase::new();
    let report = batch::run(&validator(opt), &mut sources, root).map_err(|err| err.to_string())?;

    match opt.output_format {
        OutputFormat::Text => {
            let writer = termcolor::StandardStream::stdout(termcolor::ColorChoice::Auto);
            report
                .emit(&sources, &mut writer.lock())
                .map_err(|err| format!("failed to print the report: {}", err))?;
        }
        OutputFormat::Json => println!("{}", to_json(&report)?),
    }

    Ok(report.passed())
}

fn run(opt: &Opt) -> Result<bool, String> {
    let target = opt.path.as_deref().unwrap_or(&opt.root);
    let path = Path::new(target);
    if path.is_dir() {
        validate_batch(opt, path)
    } else if opt.path.is_some() {
        validate_document(opt, path)
    } else {
        Err(format!("batch root '{}' is not a directory", target))
    }
}

fn main() -> ExitCode {
    let opt: Opt = argh::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if opt.version {
        println!("cmdlog-validate {}\nCopyright (C) 2026 Google LLC", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    match run(&opt) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            tracing::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
