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

//! Syntax gate and typed lowering of schema documents.

use crate::analyzer::{ErrorCode, Issue};
use crate::ast;
use serde_yaml::{Mapping, Value};
use std::path::Path;

/// Location of issues that concern the document as a whole.
pub const DOCUMENT_LOCATION: &str = "document";

/// A schema document that passed the syntax gate: valid UTF-8 text
/// whose top level is a mapping.
#[derive(Debug, Clone)]
pub struct Document {
    pub file: ast::FileId,
    pub name: String,
    pub root: Mapping,
}

/// Error returned when lowering a document into the typed model.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{location}: {source}")]
    Config { location: String, source: ast::ConfigError },
    #[error("{location}: {reason}")]
    Invalid { location: String, reason: String },
}

impl LoadError {
    pub fn location(&self) -> &str {
        match self {
            LoadError::Config { location, .. } | LoadError::Invalid { location, .. } => location,
        }
    }
}

/// Parse a schema document from memory.
/// The source is registered in `sources` even when it fails to parse.
pub fn parse_inline(
    sources: &mut ast::SourceDatabase,
    name: &str,
    source: String,
) -> Result<Document, Issue> {
    let parsed = serde_yaml::from_str::<Value>(&source);
    let file = sources.add(name.to_owned(), source);
    let value = parsed.map_err(|err| {
        let (location, span) = match err.location() {
            Some(location) => (
                format!("line {}, column {}", location.line(), location.column()),
                Some((file, location.index()..location.index())),
            ),
            None => (DOCUMENT_LOCATION.to_owned(), None),
        };
        let issue = Issue::error(
            ErrorCode::InvalidSyntax,
            location,
            format!("failed to parse '{}': {}", name, err),
            "fix the markup syntax (indentation, quoting, duplicate keys)",
        );
        match span {
            Some((file, range)) => issue.with_span(file, range),
            None => issue,
        }
    })?;

    match value {
        Value::Mapping(root) => Ok(Document { file, name: name.to_owned(), root }),
        Value::Null => Err(Issue::error(
            ErrorCode::EmptyDocument,
            DOCUMENT_LOCATION,
            format!("'{}' is empty", name),
            "add the meta, types and cmds sections",
        )),
        other => Err(Issue::error(
            ErrorCode::InvalidDocumentRoot,
            DOCUMENT_LOCATION,
            format!("top level of '{}' is a {}, expected a mapping", name, kind(&other)),
            "write the document as a mapping of section names to sections",
        )),
    }
}

/// Read and parse a schema document from disk.
pub fn parse_file(sources: &mut ast::SourceDatabase, path: &Path) -> Result<Document, Issue> {
    let name = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|err| {
        Issue::error(
            ErrorCode::UnreadableFile,
            DOCUMENT_LOCATION,
            format!("failed to read '{}': {}", name, err),
            "check that the file exists and is readable",
        )
    })?;
    let source = String::from_utf8(bytes).map_err(|err| {
        Issue::error(
            ErrorCode::InvalidEncoding,
            DOCUMENT_LOCATION,
            format!(
                "'{}' is not valid UTF-8 (invalid byte sequence at offset {})",
                name,
                err.utf8_error().valid_up_to()
            ),
            "save the file with UTF-8 encoding",
        )
    })?;
    parse_inline(sources, &name, source)
}

/// Name of the kind of a value, as shown in reports.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(number) if number.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "sequence",
        Value::Mapping(_) => "mapping",
        Value::Tagged(_) => "tagged value",
    }
}

/// Text of a mapping key, as used in locations.
pub fn key_text(key: &Value) -> String {
    match key {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(value) => value.to_string(),
        Value::Null => "null".to_owned(),
        other => serde_yaml::to_string(other)
            .map(|text| text.trim_end().to_owned())
            .unwrap_or_else(|_| kind(other).to_owned()),
    }
}

/// Text of a scalar value. Returns `None` for collections.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        _ => None,
    }
}

/// Integer value of a command key. Keys may be written as integers or
/// as strings holding an integer.
pub fn command_id(key: &Value) -> Option<ast::CommandId> {
    match key {
        Value::Number(number) => number
            .as_i64()
            .map(ast::CommandId::from)
            .or_else(|| number.as_u64().map(ast::CommandId::from)),
        Value::String(text) => ast::parse_int(text),
        _ => None,
    }
}

/// Whether a node of a command body describes a repeating group.
pub fn is_group(node: &Mapping) -> bool {
    ["repeat_by", "repeat_const", "fields", "group"]
        .iter()
        .any(|key| matches!(node.get(*key), Some(value) if !value.is_null()))
}

/// Nested nodes of a group, written either directly under `fields` or
/// under `group.fields`.
pub fn group_fields(node: &Mapping) -> Option<&Value> {
    node.get("fields").or_else(|| {
        node.get("group").and_then(Value::as_mapping).and_then(|group| group.get("fields"))
    })
}

/// Lower a document into the typed model.
///
/// Lowering only fails on shapes the validator reports as errors; a
/// document validated without errors always loads.
pub fn load(document: &Document) -> Result<ast::ProtocolConfig, LoadError> {
    let root = &document.root;
    let meta = lower_meta(required(root, "meta", "")?)?;
    let compatibility = match root.get("compatibility") {
        None | Some(Value::Null) => ast::Compatibility::default(),
        Some(value) => lower_compatibility(value)?,
    };
    let types = lower_types(required(root, "types", "")?)?;
    let enums = match root.get("enums") {
        None | Some(Value::Null) => Default::default(),
        Some(value) => lower_enums(value)?,
    };
    let cmds = lower_cmds(required(root, "cmds", "")?)?;
    tracing::debug!(
        "loaded '{}': {} types, {} enums, {} commands",
        document.name,
        types.len(),
        enums.len(),
        cmds.len()
    );
    Ok(ast::ProtocolConfig { meta, compatibility, types, enums, cmds })
}

fn invalid<T>(location: &str, reason: impl Into<String>) -> Result<T, LoadError> {
    Err(LoadError::Invalid { location: location.to_owned(), reason: reason.into() })
}

fn join(location: &str, key: &str) -> String {
    if location.is_empty() {
        key.to_owned()
    } else {
        format!("{}.{}", location, key)
    }
}

fn required<'v>(map: &'v Mapping, key: &str, location: &str) -> Result<&'v Value, LoadError> {
    match map.get(key) {
        Some(value) => Ok(value),
        None => invalid(&join(location, key), "missing required key"),
    }
}

fn expect_mapping<'v>(value: &'v Value, location: &str) -> Result<&'v Mapping, LoadError> {
    match value {
        Value::Mapping(map) => Ok(map),
        other => invalid(location, format!("expected a mapping, got {}", kind(other))),
    }
}

fn expect_sequence<'v>(value: &'v Value, location: &str) -> Result<&'v [Value], LoadError> {
    match value {
        Value::Sequence(seq) => Ok(seq),
        other => invalid(location, format!("expected a sequence, got {}", kind(other))),
    }
}

fn expect_str<'v>(map: &'v Mapping, key: &str, location: &str) -> Result<&'v str, LoadError> {
    match maybe_str(map, key, location)? {
        Some(text) => Ok(text),
        None => invalid(&join(location, key), "missing required key"),
    }
}

fn maybe_str<'v>(map: &'v Mapping, key: &str, location: &str) -> Result<Option<&'v str>, LoadError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(other) => invalid(&join(location, key), format!("expected a string, got {}", kind(other))),
    }
}

fn maybe_usize(map: &Mapping, key: &str, location: &str) -> Result<Option<usize>, LoadError> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_u64().and_then(|value| usize::try_from(value).ok()) {
            Some(value) => Ok(Some(value)),
            None => invalid(&join(location, key), "expected a non-negative integer"),
        },
    }
}

fn expect_usize(map: &Mapping, key: &str, location: &str) -> Result<usize, LoadError> {
    match maybe_usize(map, key, location)? {
        Some(value) => Ok(value),
        None => invalid(&join(location, key), "missing required key"),
    }
}

fn maybe_parse<T: std::str::FromStr<Err = String>>(
    map: &Mapping,
    key: &str,
    location: &str,
) -> Result<Option<T>, LoadError> {
    match maybe_str(map, key, location)? {
        Some(text) => text.parse().map(Some).or_else(|reason| invalid(&join(location, key), reason)),
        None => Ok(None),
    }
}

fn lower_meta(value: &Value) -> Result<ast::Meta, LoadError> {
    let map = expect_mapping(value, "meta")?;
    Ok(ast::Meta {
        protocol: expect_str(map, "protocol", "meta")?.to_owned(),
        version: map.get("version").and_then(scalar_text),
        default_endian: maybe_parse(map, "default_endian", "meta")?.unwrap_or_default(),
        notes: map.get("notes").and_then(scalar_text),
    })
}

fn lower_compatibility(value: &Value) -> Result<ast::Compatibility, LoadError> {
    let location = "compatibility";
    let map = expect_mapping(value, location)?;
    let defaults = ast::Compatibility::default();
    let frame_head = match maybe_str(map, "frame_head", location)? {
        Some(text) => text.to_owned(),
        None => defaults.frame_head,
    };
    if let Err(token) = ast::parse_hex_bytes(&frame_head) {
        return invalid(&join(location, "frame_head"), format!("invalid hex byte '{}'", token));
    }

    let mut head_fields = vec![];
    if let Some(value) = map.get("head_fields").filter(|value| !value.is_null()) {
        for (index, entry) in expect_sequence(value, "compatibility.head_fields")?.iter().enumerate() {
            let location = format!("compatibility.head_fields[{}]", index);
            let entry = expect_mapping(entry, &location)?;
            head_fields.push(ast::HeadField {
                name: expect_str(entry, "name", &location)?.to_owned(),
                offset: expect_usize(entry, "offset", &location)?,
                length: expect_usize(entry, "length", &location)?,
                type_id: maybe_str(entry, "type", &location)?.map(str::to_owned),
            });
        }
    }

    Ok(ast::Compatibility {
        head_len: maybe_usize(map, "head_len", location)?.unwrap_or(defaults.head_len),
        tail_len: maybe_usize(map, "tail_len", location)?.unwrap_or(defaults.tail_len),
        frame_head,
        head_fields,
    })
}

/// Lower `bits` entries of a bit-set. An entry without `bit` occupies
/// the bit equal to its position in the list.
fn lower_bitset_bits(value: &Value, location: &str) -> Result<Vec<ast::BitDescriptor>, LoadError> {
    let mut bits = vec![];
    for (index, entry) in expect_sequence(value, location)?.iter().enumerate() {
        let location = format!("{}[{}]", location, index);
        let entry = expect_mapping(entry, &location)?;
        bits.push(ast::BitDescriptor {
            name: expect_str(entry, "name", &location)?.to_owned(),
            start_bit: maybe_usize(entry, "bit", &location)?.unwrap_or(index),
            width: 1,
        });
    }
    Ok(bits)
}

/// Lower `groups` of a bit-field, or `bit_groups` of a field.
fn lower_bit_groups(value: &Value, location: &str) -> Result<Vec<ast::BitDescriptor>, LoadError> {
    let mut groups = vec![];
    for (index, entry) in expect_sequence(value, location)?.iter().enumerate() {
        let location = format!("{}[{}]", location, index);
        let entry = expect_mapping(entry, &location)?;
        groups.push(ast::BitDescriptor {
            name: expect_str(entry, "name", &location)?.to_owned(),
            start_bit: expect_usize(entry, "start_bit", &location)?,
            width: expect_usize(entry, "width", &location)?,
        });
    }
    Ok(groups)
}

fn lower_types(value: &Value) -> Result<ast::TypeRegistry, LoadError> {
    let mut types = ast::TypeRegistry::new();
    for (key, def) in expect_mapping(value, "types")? {
        let name = key_text(key);
        let location = format!("types.{}", name);
        let map = expect_mapping(def, &location)?;
        let base: ast::BaseKind = match maybe_parse(map, "base", &location)? {
            Some(base) => base,
            None => return invalid(&join(&location, "base"), "missing required key"),
        };
        let layout = match (base, map.get("bits"), map.get("groups")) {
            (ast::BaseKind::Bitset, Some(bits), _) if !bits.is_null() => {
                Some(lower_bitset_bits(bits, &join(&location, "bits"))?)
            }
            (ast::BaseKind::Bitfield, _, Some(groups)) if !groups.is_null() => {
                Some(lower_bit_groups(groups, &join(&location, "groups"))?)
            }
            _ => None,
        };
        let attrs = ast::TypeAttrs {
            bytes: maybe_usize(map, "bytes", &location)?,
            layout,
            encoding: map.get("encoding").and_then(Value::as_str).map(str::to_owned),
            order: maybe_parse(map, "order", &location)?.unwrap_or_default(),
            endian: maybe_parse(map, "endian", &location)?,
        };
        types
            .register_attrs(&name, base, attrs)
            .map_err(|source| LoadError::Config { location, source })?;
    }
    Ok(types)
}

fn lower_enums(
    value: &Value,
) -> Result<std::collections::BTreeMap<String, ast::EnumDef>, LoadError> {
    let mut enums = std::collections::BTreeMap::new();
    for (key, def) in expect_mapping(value, "enums")? {
        let name = key_text(key);
        let entries = expect_mapping(def, &format!("enums.{}", name))?
            .iter()
            .map(|(key, label)| {
                let key = match key {
                    Value::Number(number) if number.is_i64() || number.is_u64() => {
                        number.as_i64().map(ast::EnumKey::Int)
                    }
                    _ => None,
                }
                .unwrap_or_else(|| ast::EnumKey::Text(key_text(key)));
                let label = scalar_text(label).unwrap_or_else(|| key_text(label));
                (key, label)
            })
            .collect();
        enums.insert(name, ast::EnumDef { entries });
    }
    Ok(enums)
}

fn lower_cmds(
    value: &Value,
) -> Result<std::collections::BTreeMap<ast::CommandId, Vec<ast::Node>>, LoadError> {
    let mut cmds = std::collections::BTreeMap::new();
    for (key, body) in expect_mapping(value, "cmds")? {
        let location = format!("cmds.{}", key_text(key));
        let Some(id) = command_id(key) else {
            return invalid(&location, "command identifier is not an integer");
        };
        let nodes = match body {
            Value::Null => vec![],
            body => lower_nodes(expect_sequence(body, &location)?, &location)?,
        };
        if cmds.insert(id, nodes).is_some() {
            return invalid(&location, format!("command id {} is declared more than once", id));
        }
    }
    Ok(cmds)
}

/// Lower the nodes of a command body or group located at `location`.
fn lower_nodes(nodes: &[Value], location: &str) -> Result<Vec<ast::Node>, LoadError> {
    nodes
        .iter()
        .enumerate()
        .map(|(index, node)| {
            let location = format!("{}.fields[{}]", location, index);
            let map = expect_mapping(node, &location)?;
            if is_group(map) {
                lower_group(map, &location).map(ast::Node::Group)
            } else {
                lower_field(map, &location).map(ast::Node::Field)
            }
        })
        .collect()
}

fn lower_group(map: &Mapping, location: &str) -> Result<ast::Group, LoadError> {
    let repeat = ast::Repeat::new(
        maybe_str(map, "repeat_by", location)?.map(str::to_owned),
        maybe_usize(map, "repeat_const", location)?,
    )
    .map_err(|source| LoadError::Config { location: location.to_owned(), source })?;
    let fields = match group_fields(map) {
        Some(fields) => lower_nodes(expect_sequence(fields, &join(location, "fields"))?, location)?,
        None => return invalid(&join(location, "fields"), "missing required key"),
    };
    Ok(ast::Group { repeat, fields })
}

fn lower_field(map: &Mapping, location: &str) -> Result<ast::Field, LoadError> {
    let len_by = maybe_str(map, "len_by", location)?.map(str::to_owned);
    let len_to_end = match map.get("len_to_end") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(value)) => *value,
        Some(other) => {
            return invalid(
                &join(location, "len_to_end"),
                format!("expected a boolean, got {}", kind(other)),
            )
        }
    };
    let size_by = maybe_str(map, "size_by", location)?.map(str::to_owned);
    let len = match map.get("len") {
        Some(Value::String(id)) => ast::Length::Field { id: id.clone() },
        _ => ast::Length::from_attributes(
            maybe_usize(map, "len", location)?,
            len_by,
            len_to_end,
            size_by,
        )
        .map_err(|source| LoadError::Config { location: join(location, "len"), source })?,
    };
    let bit_groups = match map.get("bit_groups") {
        None | Some(Value::Null) => vec![],
        Some(groups) => lower_bit_groups(groups, &join(location, "bit_groups"))?,
    };
    let scale = match map.get("scale") {
        None | Some(Value::Null) => None,
        Some(value) => match value.as_f64() {
            Some(scale) => Some(scale),
            None => return invalid(&join(location, "scale"), "expected a number"),
        },
    };

    Ok(ast::Field {
        name: expect_str(map, "name", location)?.to_owned(),
        type_id: expect_str(map, "type", location)?.to_owned(),
        len,
        id: maybe_str(map, "id", location)?.map(str::to_owned),
        enum_id: maybe_str(map, "enum", location)?.map(str::to_owned),
        scale,
        endian: maybe_parse(map, "endian", location)?,
        when: maybe_str(map, "when", location)?.map(str::to_owned),
        bit_groups,
        notes: map.get("notes").and_then(scalar_text),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use googletest::prelude::{assert_that, eq};

    fn parse(text: &str) -> Result<Document, Issue> {
        let mut db = ast::SourceDatabase::new();
        parse_inline(&mut db, "stdin", text.to_owned())
    }

    fn load_str(text: &str) -> Result<ast::ProtocolConfig, LoadError> {
        load(&parse(text).expect("syntax failure"))
    }

    #[test]
    fn test_syntax_gate() {
        assert!(parse("meta: {protocol: x}\n").is_ok());
        assert_that!(parse("").unwrap_err().code, eq(ErrorCode::EmptyDocument));
        assert_that!(parse("- a\n- b\n").unwrap_err().code, eq(ErrorCode::InvalidDocumentRoot));
        let issue = parse("meta: {protocol: x\n").unwrap_err();
        assert_eq!(issue.code, ErrorCode::InvalidSyntax);
        assert!(issue.location.starts_with("line "), "{}", issue.location);
        assert!(issue.span.is_some());
    }

    #[test]
    fn test_parse_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = ast::SourceDatabase::new();

        let missing = dir.path().join("missing.yaml");
        let issue = parse_file(&mut db, &missing).unwrap_err();
        assert_eq!(issue.code, ErrorCode::UnreadableFile);

        let latin1 = dir.path().join("latin1.yaml");
        std::fs::write(&latin1, b"meta: {protocol: caf\xe9}\n").unwrap();
        let issue = parse_file(&mut db, &latin1).unwrap_err();
        assert_eq!(issue.code, ErrorCode::InvalidEncoding);
    }

    #[test]
    fn test_helpers() {
        assert_eq!(command_id(&Value::from(104)), Some(104));
        assert_eq!(command_id(&Value::from("0x10")), Some(16));
        assert_eq!(command_id(&Value::from(" 7 ")), Some(7));
        assert_eq!(command_id(&Value::from("abc")), None);
        assert_eq!(command_id(&Value::from(1.5)), None);
        assert_eq!(key_text(&Value::from(3)), "3");

        let Value::Mapping(group) = serde_yaml::from_str("{group: {fields: [{name: a}]}}").unwrap()
        else {
            panic!("expected a mapping");
        };
        assert!(is_group(&group));
        assert!(group_fields(&group).is_some_and(Value::is_sequence));

        let Value::Mapping(field) =
            serde_yaml::from_str("{name: a, type: u8, repeat_by: null, fields: ~}").unwrap()
        else {
            panic!("expected a mapping");
        };
        assert!(!is_group(&field));
    }

    #[test]
    fn test_wide_command_ids() {
        let max = serde_yaml::from_str::<Value>("18446744073709551615").unwrap();
        assert_eq!(command_id(&max), Some(u64::MAX as i128));
        assert_eq!(command_id(&Value::from(-1)), Some(-1));
        assert_eq!(command_id(&Value::from("0xFFFFFFFFFFFFFFFFF")), Some(0xFFFFFFFFFFFFFFFFF));
    }

    #[test]
    fn test_load_rejects_colliding_command_ids() {
        let err = load_str(
            r#"
meta: {protocol: demo}
types: {u8: {base: uint, bytes: 1}}
cmds:
  16: [{name: a, type: u8}]
  "0x10": [{name: b, type: u8}]
"#,
        )
        .unwrap_err();
        assert_eq!(err.location(), "cmds.0x10");
    }

    #[test]
    fn test_load_defaults() {
        let config = load_str(
            r#"
meta: {protocol: demo}
types:
  uint8: {base: uint, bytes: 1}
cmds:
  "3":
    - {name: a, type: uint8}
  4:
"#,
        )
        .unwrap();
        assert_eq!(config.meta.default_endian, ast::Endianness::LittleEndian);
        assert_eq!(config.compatibility, ast::Compatibility::default());
        assert_eq!(config.command(4), Some(&[][..]));
        let Some([ast::Node::Field(field)]) = config.command(3) else {
            panic!("unexpected layout {:?}", config.cmds);
        };
        assert_eq!(field.len, ast::Length::Inherited);
        assert_eq!(field.static_len(&config.types), Some(1));
    }

    #[test]
    fn test_load_nested_groups() {
        let config = load_str(
            r#"
meta: {protocol: demo}
compatibility:
  head_len: 8
  frame_head: "EB 90"
  head_fields:
    - {name: cmd, offset: 6, length: 2, type: uint16}
types:
  uint8: {base: uint, bytes: 1}
  uint16: {base: uint, bytes: 2}
  flags:
    base: bitfield
    bytes: 1
    groups: [{name: lo, start_bit: 0, width: 4}, {name: hi, start_bit: 4, width: 4}]
cmds:
  1:
    - {name: count, type: uint8, id: count}
    - group:
        fields:
          - {name: size, type: uint8, id: size}
          - {name: data, type: uint8, len: 0, len_by: size}
      repeat_by: count
    - {name: tail, type: flags, len: 0, len_to_end: true}
"#,
        )
        .unwrap();
        assert_eq!(config.compatibility.frame_head_bytes(), Ok(vec![0xeb, 0x90]));
        assert_eq!(config.compatibility.tail_len, 2);
        assert_eq!(config.compatibility.head_fields[0].type_id.as_deref(), Some("uint16"));
        assert_eq!(config.types.get("flags").map(|def| def.desc.bit_layout().len()), Some(2));

        let layout = config.command(1).unwrap();
        let ast::Node::Group(group) = &layout[1] else {
            panic!("expected a group, got {:?}", layout[1]);
        };
        assert_eq!(group.repeat, ast::Repeat::By { id: "count".to_owned() });
        let ast::Node::Field(data) = &group.fields[1] else {
            panic!("expected a field, got {:?}", group.fields[1]);
        };
        assert_eq!(data.len, ast::Length::Field { id: "size".to_owned() });
        let ast::Node::Field(tail) = &layout[2] else {
            panic!("expected a field, got {:?}", layout[2]);
        };
        assert_eq!(tail.len, ast::Length::ToEnd);
    }

    #[test]
    fn test_load_errors() {
        let err = load_str(
            r#"
meta: {protocol: demo}
types:
  uint8: {base: uint}
cmds: {}
"#,
        )
        .unwrap_err();
        assert_eq!(err.location(), "types.uint8");
        assert!(matches!(
            err,
            LoadError::Config { source: ast::ConfigError::MissingAttribute { .. }, .. }
        ));

        let err = load_str(
            r#"
meta: {protocol: demo}
types: {}
cmds:
  1:
    - {repeat_by: n, repeat_const: 2, fields: []}
"#,
        )
        .unwrap_err();
        assert_eq!(err.location(), "cmds.1.fields[0]");
        assert!(matches!(
            err,
            LoadError::Config { source: ast::ConfigError::ConflictingRepeatControl, .. }
        ));
    }
}
