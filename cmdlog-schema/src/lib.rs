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

//! Protocol schema model and validator.
//!
//! A schema document describes the binary commands of one vendor
//! protocol: scalar and bit-layout types, enumerations, and per-command
//! sequences of fields and repeating groups. The [`analyzer`] checks a
//! document in one pass and reports every problem it finds; the
//! [`parser`] lowers a document into the typed [`ast`] consumed by
//! decoders; the [`batch`] runner validates a whole directory of
//! documents.

pub mod analyzer;
pub mod ast;
pub mod batch;
pub mod bits;
pub mod parser;
pub mod scope;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validated_document_lowers_to_config() {
        // A document reported free of errors must be representable in
        // the typed model.
        let src = r#"
meta:
  protocol: demo
  default_endian: BE
types:
  uint8: {base: uint, bytes: 1}
  uint16: {base: uint, bytes: 2}
  name8: {base: str, bytes: 8}
  status: {base: bitset, bits: [{name: ready}, {name: fault}]}
enums:
  mode: {0: idle, 1: run}
cmds:
  7:
    - {name: mode, type: uint8, enum: mode, id: mode}
    - {name: status, type: status, len: 1}
    - {name: count, type: uint8, id: count}
    - repeat_by: count
      fields:
        - {name: value, type: uint16, scale: 0.1}
        - {name: label, type: name8}
"#;
        let mut sources = ast::SourceDatabase::new();
        let document = parser::parse_inline(&mut sources, "demo.yaml", src.to_owned())
            .expect("syntax failure");
        let result = analyzer::Validator::default().validate(&document);
        assert!(!result.has_errors(), "{:?}", result.issues);

        let config = parser::load(&document).expect("load failure");
        assert_eq!(config.meta.protocol, "demo");
        assert_eq!(config.meta.default_endian, ast::Endianness::BigEndian);
        let layout = config.command(7).expect("missing command");
        assert_eq!(layout.len(), 4);
        assert_eq!(config.enum_def("mode").and_then(|mode| mode.label(1)), Some("run"));
        assert!(matches!(&layout[3], ast::Node::Group(group)
            if group.repeat == ast::Repeat::By { id: "count".to_owned() }));
    }
}
