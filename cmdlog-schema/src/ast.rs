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

use codespan_reporting::files;
use serde::{Serialize, Serializer};
use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::str::FromStr;

/// File identifier.
/// References a source file in the source database.
pub type FileId = usize;

/// Source database.
/// Stores the source file contents for reference.
pub type SourceDatabase = files::SimpleFiles<String, String>;

/// Command identifier.
pub type CommandId = i128;

/// Error raised when a schema entity is constructed without the
/// attributes its shape requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("type with base '{base}' requires attribute '{attribute}'")]
    MissingAttribute { base: BaseKind, attribute: &'static str },
    #[error("group requires one of 'repeat_by' or 'repeat_const'")]
    MissingRepeatControl,
    #[error("group declares both 'repeat_by' and 'repeat_const'")]
    ConflictingRepeatControl,
    #[error("repeat count must be a positive integer")]
    InvalidRepeatCount,
    #[error("len 0 requires an alternate length source")]
    MissingLengthSource,
    #[error("alternate length sources are mutually exclusive, got {}", .0.join(", "))]
    ConflictingLengthSources(Vec<&'static str>),
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    #[default]
    LittleEndian,
    BigEndian,
}

impl Endianness {
    /// Accepted spellings, in the order they are suggested.
    pub const TOKENS: [&'static str; 4] = ["LE", "BE", "little", "big"];
}

impl FromStr for Endianness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LE" | "little" => Ok(Endianness::LittleEndian),
            "BE" | "big" => Ok(Endianness::BigEndian),
            _ => Err(format!("unknown endianness '{}'", s)),
        }
    }
}

/// Bit numbering convention of a bit-layout type.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    #[default]
    Lsb0,
    Msb0,
}

impl BitOrder {
    pub const TOKENS: [&'static str; 2] = ["lsb0", "msb0"];
}

impl FromStr for BitOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lsb0" => Ok(BitOrder::Lsb0),
            "msb0" => Ok(BitOrder::Msb0),
            _ => Err(format!("unknown bit order '{}'", s)),
        }
    }
}

/// Interpretation of the bytes covered by a type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BaseKind {
    Uint,
    Int,
    Str,
    Hex,
    Bcd,
    Bitset,
    Bitfield,
    BinaryStr,
    Cp56Time2a,
    Float,
}

impl BaseKind {
    pub const ALL: [BaseKind; 10] = [
        BaseKind::Uint,
        BaseKind::Int,
        BaseKind::Str,
        BaseKind::Hex,
        BaseKind::Bcd,
        BaseKind::Bitset,
        BaseKind::Bitfield,
        BaseKind::BinaryStr,
        BaseKind::Cp56Time2a,
        BaseKind::Float,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BaseKind::Uint => "uint",
            BaseKind::Int => "int",
            BaseKind::Str => "str",
            BaseKind::Hex => "hex",
            BaseKind::Bcd => "bcd",
            BaseKind::Bitset => "bitset",
            BaseKind::Bitfield => "bitfield",
            BaseKind::BinaryStr => "binary_str",
            BaseKind::Cp56Time2a => "time.cp56time2a",
            BaseKind::Float => "float",
        }
    }

    /// Attributes a type definition with this base must carry.
    pub fn required_attributes(self) -> &'static [&'static str] {
        match self {
            BaseKind::Uint
            | BaseKind::Int
            | BaseKind::Bcd
            | BaseKind::Bitfield
            | BaseKind::BinaryStr
            | BaseKind::Float => &["bytes"],
            BaseKind::Bitset => &["bits"],
            BaseKind::Str | BaseKind::Hex | BaseKind::Cp56Time2a => &[],
        }
    }

    /// Numeric bases are the only ones a `scale` multiplier applies to.
    pub fn is_numeric(self) -> bool {
        matches!(self, BaseKind::Uint | BaseKind::Int | BaseKind::Float)
    }
}

impl fmt::Display for BaseKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BaseKind::ALL
            .into_iter()
            .find(|base| base.as_str() == s)
            .ok_or_else(|| format!("unknown base '{}'", s))
    }
}

impl Serialize for BaseKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Named bit range inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BitDescriptor {
    pub name: String,
    pub start_bit: usize,
    pub width: usize,
}

/// Shape of a type, one variant per base.
/// Required attributes are not optional in the corresponding variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "base")]
pub enum TypeDesc {
    #[serde(rename = "uint")]
    Uint { bytes: usize },
    #[serde(rename = "int")]
    Int { bytes: usize },
    #[serde(rename = "str")]
    Str { bytes: Option<usize>, encoding: Option<String> },
    #[serde(rename = "hex")]
    Hex { bytes: Option<usize> },
    #[serde(rename = "bcd")]
    Bcd { bytes: usize },
    #[serde(rename = "bitset")]
    Bitset { bytes: Option<usize>, bits: Vec<BitDescriptor> },
    #[serde(rename = "bitfield")]
    Bitfield { bytes: usize, groups: Vec<BitDescriptor> },
    #[serde(rename = "binary_str")]
    BinaryStr { bytes: usize },
    #[serde(rename = "time.cp56time2a")]
    Cp56Time2a { bytes: Option<usize> },
    #[serde(rename = "float")]
    Float { bytes: usize },
}

impl TypeDesc {
    pub fn base(&self) -> BaseKind {
        match self {
            TypeDesc::Uint { .. } => BaseKind::Uint,
            TypeDesc::Int { .. } => BaseKind::Int,
            TypeDesc::Str { .. } => BaseKind::Str,
            TypeDesc::Hex { .. } => BaseKind::Hex,
            TypeDesc::Bcd { .. } => BaseKind::Bcd,
            TypeDesc::Bitset { .. } => BaseKind::Bitset,
            TypeDesc::Bitfield { .. } => BaseKind::Bitfield,
            TypeDesc::BinaryStr { .. } => BaseKind::BinaryStr,
            TypeDesc::Cp56Time2a { .. } => BaseKind::Cp56Time2a,
            TypeDesc::Float { .. } => BaseKind::Float,
        }
    }

    /// Byte width of the type, when it is fixed.
    pub fn bytes(&self) -> Option<usize> {
        match self {
            TypeDesc::Uint { bytes }
            | TypeDesc::Int { bytes }
            | TypeDesc::Bcd { bytes }
            | TypeDesc::Bitfield { bytes, .. }
            | TypeDesc::BinaryStr { bytes }
            | TypeDesc::Float { bytes } => Some(*bytes),
            TypeDesc::Str { bytes, .. }
            | TypeDesc::Hex { bytes }
            | TypeDesc::Bitset { bytes, .. }
            | TypeDesc::Cp56Time2a { bytes } => *bytes,
        }
    }

    /// Named bit ranges of bit-set and bit-field types.
    pub fn bit_layout(&self) -> &[BitDescriptor] {
        match self {
            TypeDesc::Bitset { bits, .. } => bits,
            TypeDesc::Bitfield { groups, .. } => groups,
            _ => &[],
        }
    }
}

/// Raw attributes of a type definition, before the base specific shape
/// is enforced.
#[derive(Debug, Default, Clone)]
pub struct TypeAttrs {
    pub bytes: Option<usize>,
    /// `bits` of a bit-set, or `groups` of a bit-field.
    pub layout: Option<Vec<BitDescriptor>>,
    pub encoding: Option<String>,
    pub order: BitOrder,
    pub endian: Option<Endianness>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeDef {
    #[serde(flatten)]
    pub desc: TypeDesc,
    pub order: BitOrder,
    pub endian: Option<Endianness>,
}

impl TypeDef {
    /// Build a type definition, failing when an attribute required by
    /// `base` is absent. A zero byte width is accepted here.
    pub fn new(base: BaseKind, attrs: TypeAttrs) -> Result<TypeDef, ConfigError> {
        let TypeAttrs { bytes, layout, encoding, order, endian } = attrs;
        let required_bytes =
            || bytes.ok_or(ConfigError::MissingAttribute { base, attribute: "bytes" });
        let desc = match base {
            BaseKind::Uint => TypeDesc::Uint { bytes: required_bytes()? },
            BaseKind::Int => TypeDesc::Int { bytes: required_bytes()? },
            BaseKind::Str => TypeDesc::Str { bytes, encoding },
            BaseKind::Hex => TypeDesc::Hex { bytes },
            BaseKind::Bcd => TypeDesc::Bcd { bytes: required_bytes()? },
            BaseKind::Bitset => TypeDesc::Bitset {
                bytes,
                bits: layout.ok_or(ConfigError::MissingAttribute { base, attribute: "bits" })?,
            },
            BaseKind::Bitfield => TypeDesc::Bitfield {
                bytes: required_bytes()?,
                groups: layout.unwrap_or_default(),
            },
            BaseKind::BinaryStr => TypeDesc::BinaryStr { bytes: required_bytes()? },
            BaseKind::Cp56Time2a => TypeDesc::Cp56Time2a { bytes },
            BaseKind::Float => TypeDesc::Float { bytes: required_bytes()? },
        };
        Ok(TypeDef { desc, order, endian })
    }

    pub fn base(&self) -> BaseKind {
        self.desc.base()
    }

    pub fn bytes(&self) -> Option<usize> {
        self.desc.bytes()
    }
}

/// Type definitions indexed by name.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TypeRegistry {
    types: BTreeMap<String, TypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Register a type, replacing any previous definition with the same
    /// name.
    pub fn register(&mut self, name: &str, def: TypeDef) {
        self.types.insert(name.to_owned(), def);
    }

    /// Build and register a type in one step.
    pub fn register_attrs(
        &mut self,
        name: &str,
        base: BaseKind,
        attrs: TypeAttrs,
    ) -> Result<&TypeDef, ConfigError> {
        let def = TypeDef::new(base, attrs)?;
        Ok(match self.types.entry(name.to_owned()) {
            btree_map::Entry::Occupied(mut entry) => {
                entry.insert(def);
                entry.into_mut()
            }
            btree_map::Entry::Vacant(entry) => entry.insert(def),
        })
    }

    pub fn get(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeDef)> {
        self.types.iter().map(|(name, def)| (name.as_str(), def))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum EnumKey {
    Int(i64),
    Text(String),
}

impl EnumKey {
    /// Integer value of the key. Text keys are accepted in decimal or
    /// `0x` prefixed hexadecimal notation.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            EnumKey::Int(value) => Some(*value),
            EnumKey::Text(text) => parse_int(text).and_then(|value| i64::try_from(value).ok()),
        }
    }
}

impl fmt::Display for EnumKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EnumKey::Int(value) => write!(f, "{}", value),
            EnumKey::Text(text) => f.write_str(text),
        }
    }
}

/// Ordered mapping of raw values to display labels.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct EnumDef {
    pub entries: Vec<(EnumKey, String)>,
}

impl EnumDef {
    /// Label of the first entry whose key matches `value`.
    pub fn label(&self, value: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key.as_int() == Some(value))
            .map(|(_, label)| label.as_str())
    }
}

/// Where the byte length of a field comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Length {
    /// Literal byte count.
    Fixed { bytes: usize },
    /// Byte width of the field type.
    Inherited,
    /// Decoded value of an earlier field (`len_by`, or a `len` string).
    Field { id: String },
    /// Size of the remaining payload as announced by an earlier field.
    SizeBy { id: String },
    /// Everything up to the end of the payload.
    ToEnd,
}

/// Names of the alternate length mechanisms a field declares.
pub fn alternate_length_sources(
    has_len_by: bool,
    len_to_end: bool,
    has_size_by: bool,
) -> Vec<&'static str> {
    [("len_by", has_len_by), ("len_to_end", len_to_end), ("size_by", has_size_by)]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect()
}

impl Length {
    /// Resolve the length of a field from its raw attributes.
    ///
    /// A positive `len` wins over any alternate mechanism. A zero or
    /// absent `len` selects the single alternate mechanism declared, or
    /// the type width when there is none and `len` is absent.
    pub fn from_attributes(
        len: Option<usize>,
        len_by: Option<String>,
        len_to_end: bool,
        size_by: Option<String>,
    ) -> Result<Length, ConfigError> {
        if let Some(bytes @ 1..) = len {
            return Ok(Length::Fixed { bytes });
        }
        let sources = alternate_length_sources(len_by.is_some(), len_to_end, size_by.is_some());
        if sources.len() > 1 {
            return Err(ConfigError::ConflictingLengthSources(sources));
        }
        match (len_by, len_to_end, size_by) {
            (Some(id), _, _) => Ok(Length::Field { id }),
            (_, true, _) => Ok(Length::ToEnd),
            (_, _, Some(id)) => Ok(Length::SizeBy { id }),
            _ if len.is_some() => Err(ConfigError::MissingLengthSource),
            _ => Ok(Length::Inherited),
        }
    }

    /// Identifier of the field this length depends on.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Length::Field { id } | Length::SizeBy { id } => Some(id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub type_id: String,
    pub len: Length,
    pub id: Option<String>,
    #[serde(rename = "enum")]
    pub enum_id: Option<String>,
    pub scale: Option<f64>,
    pub endian: Option<Endianness>,
    pub when: Option<String>,
    pub bit_groups: Vec<BitDescriptor>,
    pub notes: Option<String>,
}

impl Field {
    /// Byte length of the field when it does not depend on decoded data.
    pub fn static_len(&self, types: &TypeRegistry) -> Option<usize> {
        match &self.len {
            Length::Fixed { bytes } => Some(*bytes),
            Length::Inherited => types.get(&self.type_id).and_then(TypeDef::bytes),
            Length::Field { .. } | Length::SizeBy { .. } | Length::ToEnd => None,
        }
    }
}

/// Repeat count of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Repeat {
    /// Decoded value of an earlier field.
    By { id: String },
    Const { count: usize },
}

impl Repeat {
    /// Build the repeat control of a group from its `repeat_by` and
    /// `repeat_const` attributes. Exactly one must be present.
    pub fn new(by: Option<String>, count: Option<usize>) -> Result<Repeat, ConfigError> {
        match (by, count) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingRepeatControl),
            (None, None) => Err(ConfigError::MissingRepeatControl),
            (Some(id), None) => Ok(Repeat::By { id }),
            (None, Some(0)) => Err(ConfigError::InvalidRepeatCount),
            (None, Some(count)) => Ok(Repeat::Const { count }),
        }
    }

    /// Presence check used when only the keys are known.
    pub fn check_presence(has_by: bool, has_const: bool) -> Result<(), ConfigError> {
        match (has_by, has_const) {
            (true, true) => Err(ConfigError::ConflictingRepeatControl),
            (false, false) => Err(ConfigError::MissingRepeatControl),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub repeat: Repeat,
    pub fields: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Field(Field),
    Group(Group),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub protocol: String,
    pub version: Option<String>,
    pub default_endian: Endianness,
    pub notes: Option<String>,
}

/// Header sub-field used to route frames to commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeadField {
    pub name: String,
    pub offset: usize,
    pub length: usize,
    #[serde(rename = "type")]
    pub type_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Compatibility {
    pub head_len: usize,
    pub tail_len: usize,
    pub frame_head: String,
    pub head_fields: Vec<HeadField>,
}

impl Default for Compatibility {
    fn default() -> Self {
        Compatibility {
            head_len: 11,
            tail_len: 2,
            frame_head: "AA F5".to_owned(),
            head_fields: vec![],
        }
    }
}

impl Compatibility {
    /// Magic bytes opening every frame.
    pub fn frame_head_bytes(&self) -> Result<Vec<u8>, String> {
        parse_hex_bytes(&self.frame_head)
    }
}

/// Typed view of a schema document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProtocolConfig {
    pub meta: Meta,
    pub compatibility: Compatibility,
    pub types: TypeRegistry,
    pub enums: BTreeMap<String, EnumDef>,
    pub cmds: BTreeMap<CommandId, Vec<Node>>,
}

impl ProtocolConfig {
    /// Field layout of a command.
    pub fn command(&self, id: CommandId) -> Option<&[Node]> {
        self.cmds.get(&id).map(Vec::as_slice)
    }

    pub fn enum_def(&self, name: &str) -> Option<&EnumDef> {
        self.enums.get(name)
    }
}

/// Parse a hex byte string such as `"AA F5"` or `"0xaa,0xf5"`.
/// Returns the first offending token on failure.
pub fn parse_hex_bytes(text: &str) -> Result<Vec<u8>, String> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            u8::from_str_radix(digits, 16).map_err(|_| token.to_owned())
        })
        .collect()
}

/// Parse a decimal or `0x` prefixed hexadecimal integer.
pub fn parse_int(text: &str) -> Option<i128> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => i128::from_str_radix(digits, 16).ok(),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use googletest::prelude::{assert_that, eq};

    #[test]
    fn test_type_def_required_attributes() {
        assert_eq!(
            TypeDef::new(BaseKind::Uint, TypeAttrs::default()),
            Err(ConfigError::MissingAttribute { base: BaseKind::Uint, attribute: "bytes" })
        );
        assert_eq!(
            TypeDef::new(BaseKind::Bitset, TypeAttrs { bytes: Some(1), ..Default::default() }),
            Err(ConfigError::MissingAttribute { base: BaseKind::Bitset, attribute: "bits" })
        );
        assert!(TypeDef::new(BaseKind::Str, TypeAttrs::default()).is_ok());
        assert!(TypeDef::new(BaseKind::Hex, TypeAttrs::default()).is_ok());

        for base in BaseKind::ALL {
            let def = TypeDef::new(base, TypeAttrs::default());
            match base.required_attributes() {
                [] => assert!(def.is_ok(), "{base} without attributes: {def:?}"),
                [attribute, ..] => assert_eq!(
                    def,
                    Err(ConfigError::MissingAttribute { base, attribute: *attribute }),
                    "{base} without attributes"
                ),
            }
        }
        let bytes_required: Vec<_> = BaseKind::ALL
            .into_iter()
            .filter(|base| base.required_attributes().contains(&"bytes"))
            .collect();
        assert_eq!(
            bytes_required,
            vec![
                BaseKind::Uint,
                BaseKind::Int,
                BaseKind::Bcd,
                BaseKind::Bitfield,
                BaseKind::BinaryStr,
                BaseKind::Float
            ]
        );

        for base in BaseKind::ALL {
            let attrs =
                TypeAttrs { bytes: Some(2), layout: Some(vec![]), ..Default::default() };
            let def = TypeDef::new(base, attrs).unwrap();
            assert_eq!(def.base(), base);
        }
    }

    #[test]
    fn test_type_def_zero_bytes_accepted() {
        let def =
            TypeDef::new(BaseKind::Uint, TypeAttrs { bytes: Some(0), ..Default::default() });
        assert_that!(def.map(|def| def.bytes()), eq(Ok(Some(0))));
    }

    #[test]
    fn test_base_kind_tokens() {
        for base in BaseKind::ALL {
            assert_eq!(base.as_str().parse::<BaseKind>(), Ok(base));
        }
        assert!("uint8".parse::<BaseKind>().is_err());
        assert_eq!("time.cp56time2a".parse::<BaseKind>(), Ok(BaseKind::Cp56Time2a));
    }

    #[test]
    fn test_registry_lookup() {
        let mut types = TypeRegistry::new();
        types
            .register_attrs(
                "uint16",
                BaseKind::Uint,
                TypeAttrs { bytes: Some(2), ..Default::default() },
            )
            .unwrap();
        assert!(types
            .register_attrs("broken", BaseKind::Float, TypeAttrs::default())
            .is_err());
        assert_eq!(types.len(), 1);
        assert_eq!(types.get("uint16").and_then(TypeDef::bytes), Some(2));
        assert!(types.get("broken").is_none());
    }

    #[test]
    fn test_repeat_control() {
        assert_eq!(Repeat::new(None, None), Err(ConfigError::MissingRepeatControl));
        assert_eq!(
            Repeat::new(Some("n".to_owned()), Some(2)),
            Err(ConfigError::ConflictingRepeatControl)
        );
        assert_eq!(Repeat::new(None, Some(0)), Err(ConfigError::InvalidRepeatCount));
        assert_eq!(Repeat::new(None, Some(3)), Ok(Repeat::Const { count: 3 }));
        assert_eq!(
            Repeat::new(Some("n".to_owned()), None),
            Ok(Repeat::By { id: "n".to_owned() })
        );
        assert!(Repeat::check_presence(true, false).is_ok());
        assert!(Repeat::check_presence(true, true).is_err());
    }

    #[test]
    fn test_length_sources() {
        assert_eq!(
            Length::from_attributes(Some(4), None, false, None),
            Ok(Length::Fixed { bytes: 4 })
        );
        assert_eq!(Length::from_attributes(None, None, false, None), Ok(Length::Inherited));
        assert_eq!(
            Length::from_attributes(Some(0), None, false, None),
            Err(ConfigError::MissingLengthSource)
        );
        assert_eq!(Length::from_attributes(Some(0), None, true, None), Ok(Length::ToEnd));
        assert_eq!(
            Length::from_attributes(Some(0), Some("n".to_owned()), true, None),
            Err(ConfigError::ConflictingLengthSources(vec!["len_by", "len_to_end"]))
        );
        // A positive length takes precedence over an alternate source.
        assert_eq!(
            Length::from_attributes(Some(2), Some("n".to_owned()), false, None),
            Ok(Length::Fixed { bytes: 2 })
        );
        assert_eq!(
            Length::from_attributes(None, None, false, Some("size".to_owned())),
            Ok(Length::SizeBy { id: "size".to_owned() })
        );
    }

    #[test]
    fn test_field_static_len() {
        let mut types = TypeRegistry::new();
        types.register(
            "uint32",
            TypeDef::new(BaseKind::Uint, TypeAttrs { bytes: Some(4), ..Default::default() })
                .unwrap(),
        );
        let mut field = Field {
            name: "value".to_owned(),
            type_id: "uint32".to_owned(),
            len: Length::Inherited,
            id: None,
            enum_id: None,
            scale: None,
            endian: None,
            when: None,
            bit_groups: vec![],
            notes: None,
        };
        assert_eq!(field.static_len(&types), Some(4));
        field.len = Length::Fixed { bytes: 3 };
        assert_eq!(field.static_len(&types), Some(3));
        field.len = Length::ToEnd;
        assert_eq!(field.static_len(&types), None);
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(parse_hex_bytes("AA F5"), Ok(vec![0xaa, 0xf5]));
        assert_eq!(parse_hex_bytes("0xaa,0x55 01"), Ok(vec![0xaa, 0x55, 0x01]));
        assert_eq!(parse_hex_bytes(""), Ok(vec![]));
        assert_eq!(parse_hex_bytes("AA G5"), Err("G5".to_owned()));
        assert_eq!(parse_hex_bytes("AAF5"), Err("AAF5".to_owned()));
        assert_eq!(Compatibility::default().frame_head_bytes(), Ok(vec![0xaa, 0xf5]));
    }

    #[test]
    fn test_enum_label() {
        let def = EnumDef {
            entries: vec![
                (EnumKey::Int(0), "idle".to_owned()),
                (EnumKey::Text("0x10".to_owned()), "busy".to_owned()),
            ],
        };
        assert_eq!(def.label(0), Some("idle"));
        assert_eq!(def.label(16), Some("busy"));
        assert_eq!(def.label(1), None);
    }
}
