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

use codespan_reporting::diagnostic::{Diagnostic, Label, Severity};
use codespan_reporting::files;
use codespan_reporting::term;
use codespan_reporting::term::termcolor;
use serde::{Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;
use std::path::Path;
use std::str::FromStr;

use crate::ast::{self, BaseKind, CommandId, FileId, SourceDatabase};
use crate::bits::{self, BitLayoutError, BitRange};
use crate::parser::{self, Document};
use crate::scope::Scope;

/// Sections a document must declare.
pub const REQUIRED_SECTIONS: [&str; 3] = ["meta", "types", "cmds"];

/// Sections a document may declare.
pub const KNOWN_SECTIONS: [&str; 6] = ["meta", "types", "cmds", "compatibility", "enums", "filters"];

/// Largest conventional command identifier.
pub const MAX_COMMAND_ID: CommandId = 65535;

#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    UnreadableFile = 1,
    InvalidEncoding = 2,
    InvalidSyntax = 3,
    EmptyDocument = 4,
    InvalidDocumentRoot = 5,
    MissingSection = 6,
    UnknownSection = 7,
    InvalidSectionShape = 8,
    MissingRequiredKey = 9,
    InvalidProtocolName = 10,
    InvalidEndianness = 11,
    InvalidVersion = 12,
    InvalidHeaderLength = 13,
    InvalidFrameHead = 14,
    InvalidHeadField = 15,
    InvalidTypeDefinition = 16,
    UnknownBaseType = 17,
    MissingTypeAttribute = 18,
    InvalidByteWidth = 19,
    InvalidBitOrder = 20,
    InvalidBitDescriptor = 21,
    BitRangeOutOfBounds = 22,
    OverlappingBits = 23,
    InvalidEnumDefinition = 24,
    EmptyEnum = 25,
    NonCanonicalEnumKey = 26,
    NonCanonicalEnumLabel = 27,
    NoCommands = 28,
    InvalidCommandId = 29,
    InvalidCommandBody = 30,
    EmptyCommand = 31,
    InvalidNode = 32,
    NestingTooDeep = 33,
    InvalidFieldName = 34,
    InvalidReference = 35,
    UndeclaredTypeIdentifier = 36,
    InvalidLength = 37,
    MissingLength = 38,
    MissingLengthSource = 39,
    ConflictingLengthSources = 40,
    IgnoredLengthSource = 41,
    UndeclaredLengthIdentifier = 42,
    LengthMismatch = 43,
    InvalidFieldIdentifier = 44,
    DuplicateFieldIdentifier = 45,
    UndeclaredEnumIdentifier = 46,
    InvalidScale = 47,
    ScaleOnNonNumericType = 48,
    InvalidCondition = 49,
    InvalidRepeatControl = 50,
    UndeclaredRepeatIdentifier = 51,
    InvalidRepeatCount = 52,
    InvalidGroupFields = 53,
    UnusedTypes = 54,
    UnusedEnums = 55,
    CommandIdOutOfRange = 56,
    DuplicateCommandId = 57,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "E{}", *self as u16)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        format!("{}", code)
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Issue severity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "ERROR",
            Level::Warning => "WARNING",
            Level::Info => "INFO",
        })
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(Level::Error),
            "warning" => Ok(Level::Warning),
            "info" => Ok(Level::Info),
            _ => Err(format!("invalid severity '{}', expected error, warning or info", s)),
        }
    }
}

impl From<Level> for Severity {
    fn from(level: Level) -> Self {
        match level {
            Level::Error => Severity::Error,
            Level::Warning => Severity::Warning,
            Level::Info => Severity::Note,
        }
    }
}

/// A problem found in a schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub level: Level,
    pub code: ErrorCode,
    /// Dotted path of the offending node, e.g. `cmds.104.fields[2].name`.
    pub location: String,
    pub message: String,
    pub suggestion: String,
    /// Byte range in the source, known for syntax errors only.
    #[serde(skip)]
    pub span: Option<(FileId, Range<usize>)>,
}

impl Issue {
    pub fn new(
        level: Level,
        code: ErrorCode,
        location: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Issue {
        Issue {
            level,
            code,
            location: location.into(),
            message: message.into(),
            suggestion: suggestion.into(),
            span: None,
        }
    }

    pub fn error(
        code: ErrorCode,
        location: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Issue {
        Issue::new(Level::Error, code, location, message, suggestion)
    }

    pub fn warning(
        code: ErrorCode,
        location: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Issue {
        Issue::new(Level::Warning, code, location, message, suggestion)
    }

    pub fn with_span(mut self, file: FileId, range: Range<usize>) -> Issue {
        self.span = Some((file, range));
        self
    }

    pub fn to_diagnostic(&self) -> Diagnostic<FileId> {
        let mut diagnostic = Diagnostic::new(self.level.into())
            .with_code(self.code)
            .with_message(&self.message)
            .with_notes(vec![
                format!("location: {}", self.location),
                format!("hint: {}", self.suggestion),
            ]);
        if let Some((file, range)) = &self.span {
            diagnostic = diagnostic.with_labels(vec![Label::primary(*file, range.clone())]);
        }
        diagnostic
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {} {}: {}", self.level, self.code, self.location, self.message)
    }
}

/// Issues found in one document, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub name: String,
    pub issues: Vec<Issue>,
}

impl ValidationResult {
    pub fn new(name: &str) -> Self {
        ValidationResult { name: name.to_owned(), issues: vec![] }
    }

    /// Result of a document rejected by the syntax gate.
    pub fn from_issue(name: &str, issue: Issue) -> Self {
        ValidationResult { name: name.to_owned(), issues: vec![issue] }
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|issue| issue.level == Level::Error)
    }

    pub fn count(&self, level: Level) -> usize {
        self.issues.iter().filter(|issue| issue.level == level).count()
    }

    pub fn error_count(&self) -> usize {
        self.count(Level::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(Level::Warning)
    }

    pub fn info_count(&self) -> usize {
        self.count(Level::Info)
    }

    pub fn emit(
        &self,
        sources: &SourceDatabase,
        writer: &mut dyn termcolor::WriteColor,
    ) -> Result<(), files::Error> {
        let config = term::Config::default();
        for issue in self.issues.iter() {
            term::emit(writer, &config, sources, &issue.to_diagnostic())?;
        }
        Ok(())
    }
}

/// Validator settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorOptions {
    /// Severity of a `scale` attached to a field of non-numeric type.
    pub scale_on_non_numeric: Level,
    /// Maximum nesting of groups.
    pub max_depth: usize,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        ValidatorOptions { scale_on_non_numeric: Level::Warning, max_depth: 10 }
    }
}

/// Multi-phase schema validator.
///
/// The validator holds no state between documents: every call to
/// [`Validator::validate`] starts from empty working sets.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    options: ValidatorOptions,
}

impl Validator {
    pub fn new(options: ValidatorOptions) -> Self {
        Validator { options }
    }

    pub fn options(&self) -> &ValidatorOptions {
        &self.options
    }

    /// Validate a document that passed the syntax gate.
    pub fn validate(&self, document: &Document) -> ValidationResult {
        let mut context = Context::new(&self.options);
        context.run(&document.root);
        let result = ValidationResult { name: document.name.clone(), issues: context.issues };
        tracing::debug!(
            "validated '{}': {} errors, {} warnings",
            result.name,
            result.error_count(),
            result.warning_count()
        );
        result
    }

    /// Parse and validate a document held in memory.
    pub fn validate_source(
        &self,
        sources: &mut SourceDatabase,
        name: &str,
        source: String,
    ) -> ValidationResult {
        match parser::parse_inline(sources, name, source) {
            Ok(document) => self.validate(&document),
            Err(issue) => ValidationResult::from_issue(name, issue),
        }
    }

    /// Read, parse and validate a document.
    pub fn validate_file(&self, sources: &mut SourceDatabase, path: &Path) -> ValidationResult {
        match parser::parse_file(sources, path) {
            Ok(document) => self.validate(&document),
            Err(issue) => ValidationResult::from_issue(&path.display().to_string(), issue),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TypeInfo {
    base: Option<BaseKind>,
    bytes: Option<usize>,
    /// False when the definition itself was reported.
    valid: bool,
}

/// Working state of one validation.
struct Context<'o> {
    options: &'o ValidatorOptions,
    issues: Vec<Issue>,
    types: BTreeMap<String, TypeInfo>,
    used_types: BTreeSet<String>,
    enums: BTreeSet<String>,
    used_enums: BTreeSet<String>,
    /// Field identifiers declared so far, with the location of the
    /// declaring field.
    ids: HashMap<String, String>,
    /// Header field type references, resolved once types are known.
    head_types: Vec<(String, String)>,
    /// Command identifiers declared so far, with the location of the
    /// declaring command.
    command_ids: BTreeMap<CommandId, String>,
    out_of_range: Vec<(String, CommandId)>,
}

/// Value of `key`, an explicit null being treated as absent.
fn get<'v>(map: &'v Mapping, key: &str) -> Option<&'v Value> {
    map.get(key).filter(|value| !value.is_null())
}

fn at(location: &str, key: &str) -> String {
    format!("{}.{}", location, key)
}

fn positive(value: &Value) -> Option<u64> {
    value.as_u64().filter(|value| *value > 0)
}

impl<'o> Context<'o> {
    fn new(options: &'o ValidatorOptions) -> Self {
        Context {
            options,
            issues: vec![],
            types: Default::default(),
            used_types: Default::default(),
            enums: Default::default(),
            used_enums: Default::default(),
            ids: Default::default(),
            head_types: vec![],
            command_ids: Default::default(),
            out_of_range: vec![],
        }
    }

    fn push(&mut self, issue: Issue) {
        self.issues.push(issue)
    }

    fn error(
        &mut self,
        code: ErrorCode,
        location: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.push(Issue::error(code, location, message, suggestion))
    }

    fn warning(
        &mut self,
        code: ErrorCode,
        location: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.push(Issue::warning(code, location, message, suggestion))
    }

    fn error_count(&self) -> usize {
        self.issues.iter().filter(|issue| issue.level == Level::Error).count()
    }

    fn run(&mut self, root: &Mapping) {
        tracing::trace!("checking top level structure");
        self.check_top_level(root);
        tracing::trace!("checking meta");
        self.check_meta(root);
        tracing::trace!("checking compatibility");
        self.check_compatibility(root);
        tracing::trace!("checking types");
        self.check_types(root);
        tracing::trace!("checking enums");
        self.check_enums(root);
        tracing::trace!("checking commands");
        self.check_cmds(root);
        tracing::trace!("checking completeness");
        self.check_completeness();
    }

    /// Value of a section that must be a mapping. Reports sections of
    /// any other shape.
    fn section<'v>(&mut self, root: &'v Mapping, name: &str, nullable: bool) -> Option<&'v Mapping> {
        match root.get(name) {
            None => None,
            Some(Value::Null) if nullable => None,
            Some(Value::Mapping(map)) => Some(map),
            Some(other) => {
                self.error(
                    ErrorCode::InvalidSectionShape,
                    name,
                    format!("section '{}' is a {}, expected a mapping", name, parser::kind(other)),
                    format!("write '{}' as a mapping", name),
                );
                None
            }
        }
    }

    fn check_top_level(&mut self, root: &Mapping) {
        for section in REQUIRED_SECTIONS {
            if !root.contains_key(section) {
                self.error(
                    ErrorCode::MissingSection,
                    section,
                    format!("missing required section '{}'", section),
                    format!("add a '{}' section", section),
                );
            }
        }
        for key in root.keys() {
            let name = parser::key_text(key);
            if !KNOWN_SECTIONS.contains(&name.as_str()) {
                self.warning(
                    ErrorCode::UnknownSection,
                    name.clone(),
                    format!("unknown top-level section '{}'", name),
                    format!("remove it or use one of: {}", KNOWN_SECTIONS.join(", ")),
                );
            }
        }
    }

    fn check_endianness(&mut self, map: &Mapping, location: &str, key: &str) {
        let Some(value) = get(map, key) else {
            return;
        };
        if value.as_str().and_then(|text| text.parse::<ast::Endianness>().ok()).is_none() {
            self.error(
                ErrorCode::InvalidEndianness,
                at(location, key),
                format!("invalid {} {}", key, describe(value)),
                format!("use one of: {}", ast::Endianness::TOKENS.join(", ")),
            );
        }
    }

    fn check_meta(&mut self, root: &Mapping) {
        let Some(meta) = self.section(root, "meta", false) else {
            return;
        };
        match get(meta, "protocol") {
            None => self.error(
                ErrorCode::MissingRequiredKey,
                "meta.protocol",
                "meta is missing 'protocol'",
                "name the protocol described by the document",
            ),
            Some(Value::String(name)) if !name.trim().is_empty() => (),
            Some(other) => self.error(
                ErrorCode::InvalidProtocolName,
                "meta.protocol",
                format!("protocol name must be a non-empty string, got {}", describe(other)),
                "name the protocol described by the document",
            ),
        }
        self.check_endianness(meta, "meta", "default_endian");
        if let Some(version) = get(meta, "version") {
            if !matches!(version, Value::Number(_) | Value::String(_)) {
                self.warning(
                    ErrorCode::InvalidVersion,
                    "meta.version",
                    format!("version should be a number or a string, got {}", parser::kind(version)),
                    "write the version as a scalar, e.g. \"1.2\"",
                );
            }
        }
    }

    fn check_compatibility(&mut self, root: &Mapping) {
        let location = "compatibility";
        let Some(compatibility) = self.section(root, location, true) else {
            return;
        };
        for key in ["head_len", "tail_len"] {
            if let Some(value) = get(compatibility, key) {
                if value.as_u64().is_none() {
                    self.error(
                        ErrorCode::InvalidHeaderLength,
                        at(location, key),
                        format!("{} must be a non-negative integer, got {}", key, describe(value)),
                        format!("set {} to the frame {} byte count", key, &key[..4]),
                    );
                }
            }
        }
        match get(compatibility, "frame_head") {
            None => (),
            Some(Value::String(text)) => {
                if let Err(token) = ast::parse_hex_bytes(text) {
                    self.error(
                        ErrorCode::InvalidFrameHead,
                        "compatibility.frame_head",
                        format!("frame_head contains invalid hex byte '{}'", token),
                        "write hex bytes separated by spaces or commas, e.g. \"AA F5\"",
                    );
                }
            }
            Some(other) => self.error(
                ErrorCode::InvalidFrameHead,
                "compatibility.frame_head",
                format!("frame_head must be a string, got {}", describe(other)),
                "write hex bytes separated by spaces or commas, e.g. \"AA F5\"",
            ),
        }
        match get(compatibility, "head_fields") {
            None => (),
            Some(Value::Sequence(entries)) => {
                for (index, entry) in entries.iter().enumerate() {
                    self.check_head_field(entry, &format!("compatibility.head_fields[{}]", index));
                }
            }
            Some(other) => self.error(
                ErrorCode::InvalidHeadField,
                "compatibility.head_fields",
                format!("head_fields must be a sequence, got {}", parser::kind(other)),
                "list header fields as {name, offset, length} mappings",
            ),
        }
    }

    fn check_head_field(&mut self, entry: &Value, location: &str) {
        let Value::Mapping(entry) = entry else {
            self.error(
                ErrorCode::InvalidHeadField,
                location,
                format!("header field must be a mapping, got {}", parser::kind(entry)),
                "write the header field as {name, offset, length}",
            );
            return;
        };
        match get(entry, "name") {
            None => self.error(
                ErrorCode::MissingRequiredKey,
                at(location, "name"),
                "header field is missing 'name'",
                "name the header field",
            ),
            Some(Value::String(_)) => (),
            Some(other) => self.error(
                ErrorCode::InvalidHeadField,
                at(location, "name"),
                format!("header field name must be a string, got {}", describe(other)),
                "name the header field",
            ),
        }
        for key in ["offset", "length"] {
            match get(entry, key) {
                None => self.error(
                    ErrorCode::MissingRequiredKey,
                    at(location, key),
                    format!("header field is missing '{}'", key),
                    format!("give the header field {} in bytes", key),
                ),
                Some(value) if value.as_u64().is_some() => (),
                Some(other) => self.error(
                    ErrorCode::InvalidHeadField,
                    at(location, key),
                    format!("header field {} must be a non-negative integer, got {}", key, describe(other)),
                    format!("give the header field {} in bytes", key),
                ),
            }
        }
        match get(entry, "type") {
            None => (),
            Some(Value::String(type_id)) => {
                self.head_types.push((at(location, "type"), type_id.clone()))
            }
            Some(other) => self.error(
                ErrorCode::InvalidReference,
                at(location, "type"),
                format!("header field type must be a type name, got {}", describe(other)),
                "reference a type declared under types",
            ),
        }
    }

    fn check_types(&mut self, root: &Mapping) {
        let Some(types) = self.section(root, "types", false) else {
            return;
        };
        for (key, def) in types {
            let name = parser::key_text(key);
            let errors = self.error_count();
            let (base, bytes) = self.check_type(&name, def);
            let valid = self.error_count() == errors;
            self.types.insert(name, TypeInfo { base, bytes, valid });
        }

        for (location, type_id) in std::mem::take(&mut self.head_types) {
            if self.types.contains_key(&type_id) {
                self.used_types.insert(type_id);
            } else {
                self.error(
                    ErrorCode::UndeclaredTypeIdentifier,
                    location,
                    format!("header field references undeclared type '{}'", type_id),
                    format!("declare '{}' under types or fix the reference", type_id),
                );
            }
        }
    }

    fn check_type(&mut self, name: &str, def: &Value) -> (Option<BaseKind>, Option<usize>) {
        let location = format!("types.{}", name);
        let Value::Mapping(def) = def else {
            self.error(
                ErrorCode::InvalidTypeDefinition,
                location,
                format!("type '{}' must be a mapping, got {}", name, parser::kind(def)),
                "write the type as a mapping with at least a 'base' key",
            );
            return (None, None);
        };

        let base = match get(def, "base") {
            None => {
                self.error(
                    ErrorCode::MissingRequiredKey,
                    at(&location, "base"),
                    format!("type '{}' is missing 'base'", name),
                    format!("set base to one of: {}", base_tokens()),
                );
                None
            }
            Some(value) => {
                let base = value.as_str().and_then(|text| text.parse::<BaseKind>().ok());
                if base.is_none() {
                    self.error(
                        ErrorCode::UnknownBaseType,
                        at(&location, "base"),
                        format!("type '{}' has unknown base {}", name, describe(value)),
                        format!("set base to one of: {}", base_tokens()),
                    );
                }
                base
            }
        };

        let bytes = match get(def, "bytes") {
            None => None,
            Some(value) => {
                let bytes = positive(value).and_then(|bytes| usize::try_from(bytes).ok());
                if bytes.is_none() {
                    self.error(
                        ErrorCode::InvalidByteWidth,
                        at(&location, "bytes"),
                        format!("type '{}' bytes must be a positive integer, got {}", name, describe(value)),
                        "set bytes to the width of the type in bytes",
                    );
                }
                bytes
            }
        };

        if let Some(base) = base {
            for attribute in base.required_attributes() {
                if get(def, attribute).is_none() {
                    self.error(
                        ErrorCode::MissingTypeAttribute,
                        at(&location, attribute),
                        format!("type '{}' with base '{}' requires '{}'", name, base, attribute),
                        format!("add '{}' to the definition of '{}'", attribute, name),
                    );
                }
            }
        }

        if let Some(order) = get(def, "order") {
            if order.as_str().and_then(|text| text.parse::<ast::BitOrder>().ok()).is_none() {
                self.error(
                    ErrorCode::InvalidBitOrder,
                    at(&location, "order"),
                    format!("type '{}' has invalid bit order {}", name, describe(order)),
                    format!("use one of: {}", ast::BitOrder::TOKENS.join(", ")),
                );
            }
        }
        self.check_endianness(def, &location, "endian");

        let total_bits = bytes.and_then(|bytes| (bytes as u64).checked_mul(8));
        match base {
            Some(BaseKind::Bitset) => {
                if let Some(bits) = get(def, "bits") {
                    self.check_bit_layout(bits, &at(&location, "bits"), LayoutKind::Bits, total_bits);
                }
            }
            Some(BaseKind::Bitfield) => {
                if let Some(groups) = get(def, "groups") {
                    let location = at(&location, "groups");
                    self.check_bit_layout(groups, &location, LayoutKind::Groups, total_bits);
                }
            }
            _ => (),
        }

        (base, bytes)
    }

    /// Check the entries of a bit layout, then the layout itself.
    fn check_bit_layout(
        &mut self,
        layout: &Value,
        location: &str,
        kind: LayoutKind,
        total_bits: Option<u64>,
    ) {
        let Value::Sequence(entries) = layout else {
            self.error(
                ErrorCode::InvalidBitDescriptor,
                location,
                format!("bit layout must be a sequence, got {}", parser::kind(layout)),
                kind.suggestion(),
            );
            return;
        };

        // Well-formed entries, with their position in the layout.
        let mut ranges = vec![];
        let mut positions = vec![];
        for (index, entry) in entries.iter().enumerate() {
            let location = format!("{}[{}]", location, index);
            if let Some(range) = self.check_bit_descriptor(entry, &location, index, kind) {
                ranges.push(range);
                positions.push(index);
            }
        }

        for error in bits::check(&ranges, total_bits) {
            let location = format!("{}[{}]", location, positions[error.index()]);
            let code = match error {
                BitLayoutError::NegativeStart { .. } | BitLayoutError::NonPositiveWidth { .. } => {
                    ErrorCode::InvalidBitDescriptor
                }
                BitLayoutError::OutOfRange { .. } => ErrorCode::BitRangeOutOfBounds,
                BitLayoutError::Overlap { .. } => ErrorCode::OverlappingBits,
            };
            let suggestion = match &error {
                BitLayoutError::OutOfRange { total_bits, .. } => {
                    format!("keep the range within bits 0 to {}", total_bits.saturating_sub(1))
                }
                BitLayoutError::Overlap { .. } => {
                    "move the range so it does not share bits with earlier ranges".to_owned()
                }
                _ => kind.suggestion().to_owned(),
            };
            self.error(code, location, error.to_string(), suggestion);
        }
    }

    fn check_bit_descriptor(
        &mut self,
        entry: &Value,
        location: &str,
        index: usize,
        kind: LayoutKind,
    ) -> Option<BitRange> {
        let Value::Mapping(entry) = entry else {
            self.error(
                ErrorCode::InvalidBitDescriptor,
                location,
                format!("bit descriptor must be a mapping, got {}", parser::kind(entry)),
                kind.suggestion(),
            );
            return None;
        };
        let name = match get(entry, "name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            Some(other) => {
                self.error(
                    ErrorCode::InvalidBitDescriptor,
                    at(location, "name"),
                    format!("bit descriptor name must be a non-empty string, got {}", describe(other)),
                    kind.suggestion(),
                );
                return None;
            }
            None => {
                self.error(
                    ErrorCode::InvalidBitDescriptor,
                    at(location, "name"),
                    "bit descriptor is missing 'name'",
                    kind.suggestion(),
                );
                return None;
            }
        };

        let mut integer = |key: &str, required: bool| -> Result<Option<i64>, ()> {
            match get(entry, key) {
                None if !required => Ok(None),
                None => {
                    self.error(
                        ErrorCode::InvalidBitDescriptor,
                        at(location, key),
                        format!("bit descriptor '{}' is missing '{}'", name, key),
                        kind.suggestion(),
                    );
                    Err(())
                }
                Some(value) => match value.as_i64() {
                    Some(value) => Ok(Some(value)),
                    None => {
                        self.error(
                            ErrorCode::InvalidBitDescriptor,
                            at(location, key),
                            format!("bit descriptor '{}' {} must be an integer, got {}", name, key, describe(value)),
                            kind.suggestion(),
                        );
                        Err(())
                    }
                },
            }
        };

        match kind {
            LayoutKind::Bits => {
                let bit = integer("bit", false).ok()?;
                Some(BitRange::new(&name, bit.unwrap_or(index as i64), 1))
            }
            LayoutKind::Groups => {
                let start_bit = integer("start_bit", true);
                let width = integer("width", true);
                match (start_bit, width) {
                    (Ok(Some(start_bit)), Ok(Some(width))) => {
                        Some(BitRange::new(&name, start_bit, width))
                    }
                    _ => None,
                }
            }
        }
    }

    fn check_enums(&mut self, root: &Mapping) {
        let Some(enums) = self.section(root, "enums", true) else {
            return;
        };
        for (key, def) in enums {
            let name = parser::key_text(key);
            let location = format!("enums.{}", name);
            self.enums.insert(name.clone());
            let Value::Mapping(entries) = def else {
                self.error(
                    ErrorCode::InvalidEnumDefinition,
                    location,
                    format!("enum '{}' must be a mapping of values to labels, got {}", name, parser::kind(def)),
                    "write the enum as {value: label} entries",
                );
                continue;
            };
            if entries.is_empty() {
                self.warning(
                    ErrorCode::EmptyEnum,
                    location.clone(),
                    format!("enum '{}' has no entries", name),
                    "add value to label entries or remove the enum",
                );
            }
            for (key, label) in entries {
                let entry_location = at(&location, &parser::key_text(key));
                let canonical_key = match key {
                    Value::Number(number) => number.is_i64() || number.is_u64(),
                    Value::String(_) => true,
                    _ => false,
                };
                if !canonical_key {
                    self.warning(
                        ErrorCode::NonCanonicalEnumKey,
                        entry_location.clone(),
                        format!("enum '{}' key {} should be an integer or a string", name, describe(key)),
                        "write enum keys as integers",
                    );
                }
                if !label.is_string() {
                    self.warning(
                        ErrorCode::NonCanonicalEnumLabel,
                        entry_location,
                        format!("enum '{}' label {} should be a string", name, describe(label)),
                        "quote the label",
                    );
                }
            }
        }
    }

    fn check_cmds(&mut self, root: &Mapping) {
        let Some(cmds) = self.section(root, "cmds", false) else {
            return;
        };
        if cmds.is_empty() {
            self.warning(
                ErrorCode::NoCommands,
                "cmds",
                "no commands are defined",
                "describe at least one command under cmds",
            );
        }
        for (key, body) in cmds {
            let location = format!("cmds.{}", parser::key_text(key));
            match parser::command_id(key) {
                Some(id) => {
                    if let Some(first) = self.command_ids.get(&id) {
                        let first = first.clone();
                        self.error(
                            ErrorCode::DuplicateCommandId,
                            location.clone(),
                            format!("{} and {} both declare command id {}", first, location, id),
                            "give every command a distinct identifier",
                        );
                    } else {
                        self.command_ids.insert(id, location.clone());
                    }
                    if !(0..=MAX_COMMAND_ID).contains(&id) {
                        self.out_of_range.push((location.clone(), id));
                    }
                }
                None => self.error(
                    ErrorCode::InvalidCommandId,
                    location.clone(),
                    format!("command identifier {} is not an integer", describe(key)),
                    "key commands by their integer identifier",
                ),
            }
            match body {
                Value::Null => self.warning(
                    ErrorCode::EmptyCommand,
                    location,
                    "command has no fields",
                    "list the fields of the command or remove it",
                ),
                Value::Sequence(nodes) if nodes.is_empty() => self.warning(
                    ErrorCode::EmptyCommand,
                    location,
                    "command has no fields",
                    "list the fields of the command or remove it",
                ),
                Value::Sequence(nodes) => {
                    let mut scope = Scope::new();
                    self.check_nodes(nodes, &location, &mut scope);
                }
                other => self.error(
                    ErrorCode::InvalidCommandBody,
                    location,
                    format!("command body must be a sequence of fields, got {}", parser::kind(other)),
                    "list the fields of the command as a sequence",
                ),
            }
        }
    }

    fn check_nodes(&mut self, nodes: &[Value], location: &str, scope: &mut Scope) {
        for (index, node) in nodes.iter().enumerate() {
            let location = format!("{}.fields[{}]", location, index);
            match node {
                Value::Mapping(map) if parser::is_group(map) => self.check_group(map, &location, scope),
                Value::Mapping(map) => self.check_field(map, &location, scope),
                other => self.error(
                    ErrorCode::InvalidNode,
                    location,
                    format!("field must be a mapping, got {}", parser::kind(other)),
                    "write the field as a mapping with at least 'name' and 'type'",
                ),
            }
        }
    }

    fn check_group(&mut self, group: &Mapping, location: &str, scope: &mut Scope) {
        let repeat_by = get(group, "repeat_by");
        let repeat_const = get(group, "repeat_const");
        if let Err(err) = ast::Repeat::check_presence(repeat_by.is_some(), repeat_const.is_some()) {
            self.error(
                ErrorCode::InvalidRepeatControl,
                location,
                err.to_string(),
                "give the group exactly one of repeat_by or repeat_const",
            );
        }

        match repeat_by {
            None => (),
            Some(Value::String(id)) => {
                if !scope.resolve(id) {
                    self.error(
                        ErrorCode::UndeclaredRepeatIdentifier,
                        at(location, "repeat_by"),
                        format!("group repeat_by references '{}', which is not declared by an earlier field", id),
                        format!("declare a field with id '{}' before the group", id),
                    );
                }
            }
            Some(other) => self.error(
                ErrorCode::InvalidReference,
                at(location, "repeat_by"),
                format!("repeat_by must be a field identifier, got {}", describe(other)),
                "reference the id of an earlier field",
            ),
        }

        if let Some(count) = repeat_const {
            if positive(count).is_none() {
                self.error(
                    ErrorCode::InvalidRepeatCount,
                    at(location, "repeat_const"),
                    format!("repeat_const must be a positive integer, got {}", describe(count)),
                    "set repeat_const to the number of repetitions",
                );
            }
        }

        match parser::group_fields(group) {
            Some(Value::Sequence(nodes)) if !nodes.is_empty() => {
                if scope.depth() >= self.options.max_depth {
                    self.error(
                        ErrorCode::NestingTooDeep,
                        location,
                        format!("groups are nested deeper than {} levels", self.options.max_depth),
                        "flatten the group structure",
                    );
                    return;
                }
                scope.enter();
                self.check_nodes(nodes, location, scope);
                scope.exit();
            }
            Some(Value::Sequence(_)) => self.error(
                ErrorCode::InvalidGroupFields,
                at(location, "fields"),
                "group has no fields",
                "list the repeated fields under fields",
            ),
            Some(other) => self.error(
                ErrorCode::InvalidGroupFields,
                at(location, "fields"),
                format!("group fields must be a sequence, got {}", parser::kind(other)),
                "list the repeated fields under fields",
            ),
            None => self.error(
                ErrorCode::InvalidGroupFields,
                at(location, "fields"),
                "group is missing 'fields'",
                "list the repeated fields under fields",
            ),
        }
    }

    fn check_field(&mut self, field: &Mapping, location: &str, scope: &mut Scope) {
        let name = match get(field, "name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
            Some(other) => {
                self.error(
                    ErrorCode::InvalidFieldName,
                    at(location, "name"),
                    format!("field name must be a non-empty string, got {}", describe(other)),
                    "give the field a descriptive name",
                );
                location.to_owned()
            }
            None => {
                self.error(
                    ErrorCode::MissingRequiredKey,
                    at(location, "name"),
                    "field is missing 'name'",
                    "give the field a descriptive name",
                );
                location.to_owned()
            }
        };

        let type_ref = match get(field, "type") {
            None => {
                self.error(
                    ErrorCode::MissingRequiredKey,
                    at(location, "type"),
                    format!("field '{}' is missing 'type'", name),
                    "reference a type declared under types",
                );
                None
            }
            Some(Value::String(type_id)) => {
                self.used_types.insert(type_id.clone());
                match self.types.get(type_id) {
                    Some(info) => Some((type_id.as_str(), *info)),
                    None => {
                        self.error(
                            ErrorCode::UndeclaredTypeIdentifier,
                            at(location, "type"),
                            format!("field '{}' references undeclared type '{}'", name, type_id),
                            format!("declare '{}' under types or fix the reference", type_id),
                        );
                        None
                    }
                }
            }
            Some(other) => {
                self.error(
                    ErrorCode::InvalidReference,
                    at(location, "type"),
                    format!("field '{}' type must be a type name, got {}", name, describe(other)),
                    "reference a type declared under types",
                );
                None
            }
        };

        let static_len = self.check_length(field, location, &name, type_ref, scope);

        match get(field, "id") {
            None => (),
            Some(Value::String(id)) => {
                if let Some(previous) = self.ids.get(id) {
                    let previous = previous.clone();
                    self.error(
                        ErrorCode::DuplicateFieldIdentifier,
                        at(location, "id"),
                        format!("field '{}' redeclares id '{}', first declared at {}", name, id, previous),
                        "give every field id a unique name",
                    );
                } else {
                    self.ids.insert(id.clone(), location.to_owned());
                }
                scope.declare(id);
            }
            Some(other) => self.error(
                ErrorCode::InvalidFieldIdentifier,
                at(location, "id"),
                format!("field '{}' id must be a string, got {}", name, describe(other)),
                "use a short identifier such as 'count'",
            ),
        }

        match get(field, "enum") {
            None => (),
            Some(Value::String(enum_id)) => {
                self.used_enums.insert(enum_id.clone());
                if !self.enums.contains(enum_id) {
                    self.error(
                        ErrorCode::UndeclaredEnumIdentifier,
                        at(location, "enum"),
                        format!("field '{}' references undeclared enum '{}'", name, enum_id),
                        format!("declare '{}' under enums or fix the reference", enum_id),
                    );
                }
            }
            Some(other) => self.error(
                ErrorCode::InvalidReference,
                at(location, "enum"),
                format!("field '{}' enum must be an enum name, got {}", name, describe(other)),
                "reference an enum declared under enums",
            ),
        }

        if let Some(scale) = get(field, "scale") {
            match scale.as_f64() {
                None => self.error(
                    ErrorCode::InvalidScale,
                    at(location, "scale"),
                    format!("field '{}' scale must be a number, got {}", name, describe(scale)),
                    "set scale to a non-zero multiplier such as 0.1",
                ),
                Some(value) if value == 0.0 => self.error(
                    ErrorCode::InvalidScale,
                    at(location, "scale"),
                    format!("field '{}' scale must be non-zero", name),
                    "set scale to a non-zero multiplier such as 0.1",
                ),
                Some(value) if !value.is_finite() => self.error(
                    ErrorCode::InvalidScale,
                    at(location, "scale"),
                    format!("field '{}' scale must be finite, got {}", name, value),
                    "set scale to a non-zero multiplier such as 0.1",
                ),
                Some(_) => {
                    if let Some((type_id, TypeInfo { base: Some(base), .. })) = type_ref {
                        if !base.is_numeric() {
                            self.push(Issue::new(
                                self.options.scale_on_non_numeric,
                                ErrorCode::ScaleOnNonNumericType,
                                at(location, "scale"),
                                format!(
                                    "field '{}' has a scale but type '{}' has non-numeric base '{}'",
                                    name, type_id, base
                                ),
                                "remove scale or use a uint, int or float type",
                            ));
                        }
                    }
                }
            }
        }

        self.check_endianness(field, location, "endian");

        if let Some(when) = get(field, "when") {
            if !when.is_string() {
                self.error(
                    ErrorCode::InvalidCondition,
                    at(location, "when"),
                    format!("field '{}' when must be a string expression, got {}", name, describe(when)),
                    "quote the condition expression",
                );
            }
        }

        if let Some(groups) = get(field, "bit_groups") {
            let total_bits = static_len.and_then(|len| (len as u64).checked_mul(8));
            self.check_bit_layout(groups, &at(location, "bit_groups"), LayoutKind::Groups, total_bits);
        }
    }

    /// Check the length attributes of a field. Returns the static byte
    /// length of the field when it is known.
    fn check_length(
        &mut self,
        field: &Mapping,
        location: &str,
        name: &str,
        type_ref: Option<(&str, TypeInfo)>,
        scope: &Scope,
    ) -> Option<usize> {
        let len_by = get(field, "len_by");
        let size_by = get(field, "size_by");
        let len_to_end = match get(field, "len_to_end") {
            None => false,
            Some(Value::Bool(value)) => *value,
            Some(other) => {
                self.error(
                    ErrorCode::InvalidLength,
                    at(location, "len_to_end"),
                    format!("field '{}' len_to_end must be a boolean, got {}", name, describe(other)),
                    "set len_to_end to true or remove it",
                );
                false
            }
        };

        for (key, reference) in [("len_by", len_by), ("size_by", size_by)] {
            match reference {
                None => (),
                Some(Value::String(id)) => self.check_length_reference(location, key, name, id, scope),
                Some(other) => self.error(
                    ErrorCode::InvalidReference,
                    at(location, key),
                    format!("field '{}' {} must be a field identifier, got {}", name, key, describe(other)),
                    "reference the id of an earlier field",
                ),
            }
        }

        let sources = ast::alternate_length_sources(len_by.is_some(), len_to_end, size_by.is_some());
        let conflicting = |context: &mut Self| {
            context.error(
                ErrorCode::ConflictingLengthSources,
                at(location, "len"),
                format!("field '{}' declares several length sources: {}", name, sources.join(", ")),
                "keep only one of len_by, len_to_end and size_by",
            )
        };
        let ignored = |context: &mut Self| {
            context.warning(
                ErrorCode::IgnoredLengthSource,
                at(location, "len"),
                format!("field '{}' has a len, so {} is ignored", name, sources.join(", ")),
                "set len to 0 to use the alternate length source, or remove it",
            )
        };

        match get(field, "len") {
            Some(Value::String(id)) => {
                self.check_length_reference(location, "len", name, id, scope);
                if !sources.is_empty() {
                    ignored(self);
                }
                None
            }
            Some(value) => match value.as_u64() {
                Some(0) => {
                    if sources.is_empty() {
                        self.error(
                            ErrorCode::MissingLengthSource,
                            at(location, "len"),
                            format!("field '{}' has len 0 but no alternate length source", name),
                            "add one of len_by, len_to_end or size_by",
                        );
                    } else if sources.len() > 1 {
                        conflicting(self);
                    }
                    None
                }
                Some(len) => {
                    if !sources.is_empty() {
                        ignored(self);
                    }
                    if let Some((type_id, TypeInfo { bytes: Some(bytes), valid: true, .. })) = type_ref {
                        if bytes as u64 != len {
                            self.warning(
                                ErrorCode::LengthMismatch,
                                at(location, "len"),
                                format!(
                                    "field '{}' has len {} but type '{}' is {} bytes wide",
                                    name, len, type_id, bytes
                                ),
                                format!("set len to {} or remove it", bytes),
                            );
                        }
                    }
                    usize::try_from(len).ok()
                }
                None => {
                    self.error(
                        ErrorCode::InvalidLength,
                        at(location, "len"),
                        format!(
                            "field '{}' len must be a non-negative integer or a field identifier, got {}",
                            name,
                            describe(value)
                        ),
                        "set len to a byte count",
                    );
                    None
                }
            },
            None if sources.len() > 1 => {
                conflicting(self);
                None
            }
            None if sources.is_empty() => match type_ref {
                Some((type_id, TypeInfo { bytes: None, valid: true, base: Some(_) })) => {
                    self.error(
                        ErrorCode::MissingLength,
                        at(location, "len"),
                        format!("field '{}' has no len and type '{}' has no fixed width", name, type_id),
                        "add len, or one of len_by, len_to_end or size_by",
                    );
                    None
                }
                Some((_, info)) => info.bytes,
                None => None,
            },
            None => None,
        }
    }

    fn check_length_reference(&mut self, location: &str, key: &str, name: &str, id: &str, scope: &Scope) {
        if !scope.resolve(id) {
            self.error(
                ErrorCode::UndeclaredLengthIdentifier,
                at(location, key),
                format!("field '{}' {} references '{}', which is not declared by an earlier field", name, key, id),
                format!("declare a field with id '{}' before '{}'", id, name),
            );
        }
    }

    fn check_completeness(&mut self) {
        let unused_types: Vec<&str> = self
            .types
            .keys()
            .filter(|name| !self.used_types.contains(*name))
            .map(String::as_str)
            .collect();
        if !unused_types.is_empty() {
            let message = format!("unused types: {}", unused_types.join(", "));
            self.warning(
                ErrorCode::UnusedTypes,
                "types",
                message,
                "remove the unused types or reference them from a field",
            );
        }

        let unused_enums: Vec<&str> = self
            .enums
            .iter()
            .filter(|name| !self.used_enums.contains(*name))
            .map(String::as_str)
            .collect();
        if !unused_enums.is_empty() {
            let message = format!("unused enums: {}", unused_enums.join(", "));
            self.warning(
                ErrorCode::UnusedEnums,
                "enums",
                message,
                "remove the unused enums or reference them from a field",
            );
        }

        for (location, id) in std::mem::take(&mut self.out_of_range) {
            self.warning(
                ErrorCode::CommandIdOutOfRange,
                location,
                format!("command id {} is outside the range 0 to {}", id, MAX_COMMAND_ID),
                "check the command identifier",
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutKind {
    /// Single bits of a bit-set.
    Bits,
    /// Multi-bit ranges of a bit-field.
    Groups,
}

impl LayoutKind {
    fn suggestion(self) -> &'static str {
        match self {
            LayoutKind::Bits => "describe each bit as {name: ..., bit: ...}",
            LayoutKind::Groups => "describe each range as {name: ..., start_bit: ..., width: ...}",
        }
    }
}

fn base_tokens() -> String {
    BaseKind::ALL.map(BaseKind::as_str).join(", ")
}

/// Short rendering of a value for messages.
fn describe(value: &Value) -> String {
    match parser::scalar_text(value) {
        Some(text) if value.is_string() => format!("'{}'", text),
        Some(text) => text,
        None => parser::kind(value).to_owned(),
    }
}
