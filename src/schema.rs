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

//! Parsed schema input model.
//!
//! The XML front-end is an external collaborator; the generator consumes an
//! already-parsed schema serialized as JSON. The types in this module are an
//! immutable view over schema-node properties and carry no generation state.

use serde::Deserialize;

/// Protocol version number.
pub type Version = u32;

/// Sentinel for elements that have not been deprecated.
pub const NOT_YET_DEPRECATED: Version = Version::MAX;

fn not_yet_deprecated() -> Version {
    NOT_YET_DEPRECATED
}

/// The `kind`-discriminated [`FieldDesc`] is flattened into [`ParsedField`],
/// so serde buffers every field property through its internal content tree
/// before dispatching on the tag. That tree holds integers as i64 or u64 and
/// cannot replay them as i128, so i128 properties widen explicitly.
fn de_int128<'de, D>(deserializer: D) -> Result<i128, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct IntVisitor;

    impl<'de> serde::de::Visitor<'de> for IntVisitor {
        type Value = i128;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            f.write_str("an integer")
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<i128, E> {
            Ok(v as i128)
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<i128, E> {
            Ok(v as i128)
        }

        fn visit_i128<E: serde::de::Error>(self, v: i128) -> Result<i128, E> {
            Ok(v)
        }
    }

    deserializer.deserialize_any(IntVisitor)
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Int128(#[serde(deserialize_with = "de_int128")] i128);

fn de_int128_ranges<'de, D>(deserializer: D) -> Result<Vec<ValidRange<i128>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let ranges = Vec::<ValidRange<Int128>>::deserialize(deserializer)?;
    Ok(ranges
        .into_iter()
        .map(|r| ValidRange {
            min: r.min.0,
            max: r.max.0,
            since_version: r.since_version,
            deprecated_since: r.deprecated_since,
        })
        .collect())
}

fn de_int128_specials<'de, D>(
    deserializer: D,
) -> Result<Vec<SpecialValue<i128>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let specials = Vec::<SpecialValue<Int128>>::deserialize(deserializer)?;
    Ok(specials
        .into_iter()
        .map(|s| SpecialValue {
            name: s.name,
            value: s.value.0,
            since_version: s.since_version,
            deprecated_since: s.deprecated_since,
            description: s.description,
            display_name: s.display_name,
        })
        .collect())
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Structural category of a schema field.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    Int,
    Enum,
    Set,
    Float,
    Bitfield,
    Bundle,
    String,
    Data,
    List,
    Ref,
    Optional,
    Variant,
}

impl FieldKind {
    /// Every kind, in schema declaration order. Used by the completeness
    /// check that guards kind-dispatch tables.
    pub const ALL: [FieldKind; 12] = [
        FieldKind::Int,
        FieldKind::Enum,
        FieldKind::Set,
        FieldKind::Float,
        FieldKind::Bitfield,
        FieldKind::Bundle,
        FieldKind::String,
        FieldKind::Data,
        FieldKind::List,
        FieldKind::Ref,
        FieldKind::Optional,
        FieldKind::Variant,
    ];
}

/// Closed numeric interval with a version-applicability window.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ValidRange<T> {
    pub min: T,
    pub max: T,
    #[serde(default)]
    pub since_version: Version,
    #[serde(default = "not_yet_deprecated")]
    pub deprecated_since: Version,
}

impl<T> ValidRange<T> {
    /// True when the range's window is a strict subset of the given window.
    pub fn narrower_than(&self, since: Version, deprecated: Version) -> bool {
        since < self.since_version || self.deprecated_since < deprecated
    }
}

/// Named constant within a field's value domain.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SpecialValue<T> {
    pub name: String,
    pub value: T,
    #[serde(default)]
    pub since_version: Version,
    #[serde(default = "not_yet_deprecated")]
    pub deprecated_since: Version,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Intvar,
    Uintvar,
}

impl IntType {
    pub fn cpp_type(self) -> &'static str {
        match self {
            IntType::Int8 => "std::int8_t",
            IntType::Uint8 => "std::uint8_t",
            IntType::Int16 => "std::int16_t",
            IntType::Uint16 => "std::uint16_t",
            IntType::Int32 => "std::int32_t",
            IntType::Uint32 => "std::uint32_t",
            IntType::Int64 | IntType::Intvar => "std::int64_t",
            IntType::Uint64 | IntType::Uintvar => "std::uint64_t",
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            IntType::Uint8
                | IntType::Uint16
                | IntType::Uint32
                | IntType::Uint64
                | IntType::Uintvar
        )
    }

    pub fn is_var_length(self) -> bool {
        matches!(self, IntType::Intvar | IntType::Uintvar)
    }

    /// Serialization length in bytes; the base length for var-length types.
    pub fn byte_length(self) -> usize {
        match self {
            IntType::Int8 | IntType::Uint8 => 1,
            IntType::Int16 | IntType::Uint16 => 2,
            IntType::Int32 | IntType::Uint32 => 4,
            IntType::Int64 | IntType::Uint64 => 8,
            IntType::Intvar | IntType::Uintvar => 8,
        }
    }

    pub fn min_value(self) -> i128 {
        match self {
            IntType::Int8 => i8::MIN as i128,
            IntType::Int16 => i16::MIN as i128,
            IntType::Int32 => i32::MIN as i128,
            IntType::Int64 | IntType::Intvar => i64::MIN as i128,
            _ => 0,
        }
    }

    pub fn max_value(self) -> i128 {
        match self {
            IntType::Int8 => i8::MAX as i128,
            IntType::Uint8 => u8::MAX as i128,
            IntType::Int16 => i16::MAX as i128,
            IntType::Uint16 => u16::MAX as i128,
            IntType::Int32 => i32::MAX as i128,
            IntType::Uint32 => u32::MAX as i128,
            IntType::Int64 | IntType::Intvar => i64::MAX as i128,
            IntType::Uint64 | IntType::Uintvar => u64::MAX as i128,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FloatType {
    Float,
    Double,
}

impl FloatType {
    pub fn cpp_type(self) -> &'static str {
        match self {
            FloatType::Float => "float",
            FloatType::Double => "double",
        }
    }

    pub fn byte_length(self) -> usize {
        match self {
            FloatType::Float => 4,
            FloatType::Double => 8,
        }
    }
}

/// Physical units attached to a numeric field, mapped to option tokens
/// during option composition.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
    Hours,
    Millimeters,
    Centimeters,
    Meters,
    Kilometers,
    MetersPerSecond,
    KilometersPerHour,
    Hertz,
    Kilohertz,
    Megahertz,
    Degrees,
    Radians,
    Bytes,
    Kilobytes,
    Megabytes,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    #[default]
    None,
    Version,
    MessageId,
    Length,
}

/// Ratio applied when converting between serialized and logical values.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
pub struct Scaling {
    pub num: i64,
    pub denom: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IntDesc {
    #[serde(rename = "type")]
    pub int_type: IntType,
    #[serde(default)]
    pub endian: Option<Endian>,
    #[serde(default, deserialize_with = "de_int128")]
    pub default_value: i128,
    #[serde(default)]
    pub ser_offset: i64,
    #[serde(default)]
    pub bit_length: usize,
    #[serde(default)]
    pub length: Option<usize>,
    #[serde(default, deserialize_with = "de_int128_ranges")]
    pub valid_ranges: Vec<ValidRange<i128>>,
    #[serde(default, deserialize_with = "de_int128_specials")]
    pub special_values: Vec<SpecialValue<i128>>,
    #[serde(default)]
    pub scaling: Option<Scaling>,
    #[serde(default)]
    pub units: Option<Units>,
    #[serde(default)]
    pub valid_check_version: bool,
    #[serde(default)]
    pub non_unique_specials_allowed: bool,
    #[serde(default)]
    pub fail_on_invalid: bool,
    #[serde(default)]
    pub semantic_type: SemanticType,
}

impl IntDesc {
    /// Serialization length in bytes, honoring an explicit override.
    pub fn byte_length(&self) -> usize {
        self.length.unwrap_or_else(|| self.int_type.byte_length())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FloatDesc {
    #[serde(rename = "type")]
    pub float_type: FloatType,
    #[serde(default)]
    pub endian: Option<Endian>,
    #[serde(default)]
    pub default_value: f64,
    #[serde(default)]
    pub valid_ranges: Vec<ValidRange<f64>>,
    #[serde(default)]
    pub special_values: Vec<SpecialValue<f64>>,
    #[serde(default)]
    pub units: Option<Units>,
    #[serde(default)]
    pub valid_check_version: bool,
    #[serde(default)]
    pub non_unique_specials_allowed: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnumValue {
    pub name: String,
    #[serde(deserialize_with = "de_int128")]
    pub value: i128,
    #[serde(default)]
    pub since_version: Version,
    #[serde(default = "not_yet_deprecated")]
    pub deprecated_since: Version,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EnumDesc {
    #[serde(rename = "type")]
    pub int_type: IntType,
    #[serde(default)]
    pub endian: Option<Endian>,
    #[serde(default, deserialize_with = "de_int128")]
    pub default_value: i128,
    #[serde(default)]
    pub bit_length: usize,
    pub values: Vec<EnumValue>,
    #[serde(default)]
    pub non_unique_allowed: bool,
    #[serde(default)]
    pub hex_assign: bool,
    #[serde(default)]
    pub semantic_type: SemanticType,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BitInfo {
    pub name: String,
    pub idx: usize,
    #[serde(default)]
    pub since_version: Version,
    #[serde(default = "not_yet_deprecated")]
    pub deprecated_since: Version,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SetDesc {
    #[serde(default)]
    pub endian: Option<Endian>,
    /// Serialization length in bytes.
    pub length: usize,
    #[serde(default)]
    pub bit_length: usize,
    #[serde(default)]
    pub default_bit_value: bool,
    #[serde(default)]
    pub reserved_bit_value: bool,
    /// Mask of bits reserved by the schema.
    #[serde(default)]
    pub reserved_mask: u64,
    pub bits: Vec<BitInfo>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BitfieldDesc {
    #[serde(default)]
    pub endian: Option<Endian>,
    pub members: Vec<ParsedField>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BundleDesc {
    pub members: Vec<ParsedField>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StringDesc {
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub fixed_length: usize,
    #[serde(default)]
    pub length_prefix: Option<Box<ParsedField>>,
    #[serde(default)]
    pub detached_prefix_name: String,
    #[serde(default)]
    pub zero_term_suffix: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DataDesc {
    /// Default contents, hex encoded.
    #[serde(default)]
    pub default_value: String,
    #[serde(default)]
    pub fixed_length: usize,
    #[serde(default)]
    pub length_prefix: Option<Box<ParsedField>>,
    #[serde(default)]
    pub detached_prefix_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ListDesc {
    pub element: Box<ParsedField>,
    #[serde(default)]
    pub fixed_count: usize,
    #[serde(default)]
    pub count_prefix: Option<Box<ParsedField>>,
    #[serde(default)]
    pub length_prefix: Option<Box<ParsedField>>,
    #[serde(default)]
    pub elem_length_prefix: Option<Box<ParsedField>>,
    #[serde(default)]
    pub elem_fixed_length: bool,
    #[serde(default)]
    pub detached_count_prefix_name: String,
    #[serde(default)]
    pub detached_length_prefix_name: String,
    #[serde(default)]
    pub detached_elem_length_prefix_name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefDesc {
    /// External reference of the aliased field.
    pub target: String,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionalMode {
    #[default]
    Tentative,
    Missing,
    Exists,
}

/// Activation condition of an optional field: either a single DSL
/// expression (`"$flags.enable"`) or a combined list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Cond {
    Expr(String),
    List {
        op: CondListOp,
        conds: Vec<Cond>,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CondListOp {
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OptionalDesc {
    pub field: Box<ParsedField>,
    #[serde(default)]
    pub default_mode: OptionalMode,
    #[serde(default)]
    pub cond: Option<Cond>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VariantDesc {
    pub members: Vec<ParsedField>,
    #[serde(default)]
    pub default_member: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDesc {
    Int(IntDesc),
    Enum(EnumDesc),
    Set(SetDesc),
    Float(FloatDesc),
    Bitfield(BitfieldDesc),
    Bundle(BundleDesc),
    String(StringDesc),
    Data(DataDesc),
    List(ListDesc),
    Ref(RefDesc),
    Optional(OptionalDesc),
    Variant(VariantDesc),
}

impl FieldDesc {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldDesc::Int(_) => FieldKind::Int,
            FieldDesc::Enum(_) => FieldKind::Enum,
            FieldDesc::Set(_) => FieldKind::Set,
            FieldDesc::Float(_) => FieldKind::Float,
            FieldDesc::Bitfield(_) => FieldKind::Bitfield,
            FieldDesc::Bundle(_) => FieldKind::Bundle,
            FieldDesc::String(_) => FieldKind::String,
            FieldDesc::Data(_) => FieldKind::Data,
            FieldDesc::List(_) => FieldKind::List,
            FieldDesc::Ref(_) => FieldKind::Ref,
            FieldDesc::Optional(_) => FieldKind::Optional,
            FieldDesc::Variant(_) => FieldKind::Variant,
        }
    }
}

/// Immutable view over a single parsed schema field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsedField {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// Globally-unique name by which a top-level field can be referenced.
    /// Empty for fields defined inline as members.
    #[serde(default)]
    pub external_ref: String,
    #[serde(default)]
    pub since_version: Version,
    #[serde(default = "not_yet_deprecated")]
    pub deprecated_since: Version,
    #[serde(default)]
    pub deprecated_removed: bool,
    #[serde(flatten)]
    pub desc: FieldDesc,
}

impl ParsedField {
    pub fn kind(&self) -> FieldKind {
        self.desc.kind()
    }
}

/// Top-level parsed schema.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ParsedSchema {
    pub name: String,
    #[serde(default)]
    pub endian: Endian,
    #[serde(default)]
    pub version: Version,
    #[serde(default)]
    pub main_namespace: String,
    #[serde(default)]
    pub version_dependent_code: bool,
    pub fields: Vec<ParsedField>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_field_from_json() {
        let field: ParsedField = serde_json::from_str(
            r#"{
                "name": "sessionId",
                "kind": "int",
                "type": "uint16",
                "external_ref": "field.SessionId",
                "valid_ranges": [{"min": 10, "max": 20}]
            }"#,
        )
        .unwrap();
        assert_eq!(field.kind(), FieldKind::Int);
        assert_eq!(field.external_ref, "field.SessionId");
        let FieldDesc::Int(desc) = &field.desc else {
            panic!("wrong kind");
        };
        assert_eq!(desc.int_type, IntType::Uint16);
        assert_eq!(desc.valid_ranges.len(), 1);
        assert_eq!(desc.valid_ranges[0].deprecated_since, NOT_YET_DEPRECATED);
    }

    #[test]
    fn numeric_properties_from_json() {
        let field: ParsedField = serde_json::from_str(
            r#"{
                "name": "distance",
                "kind": "int",
                "type": "uint64",
                "default_value": 18446744073709551615,
                "valid_ranges": [{"min": 0, "max": 18446744073709551615}],
                "special_values": [
                    {"name": "invalid", "value": 18446744073709551615}
                ]
            }"#,
        )
        .unwrap();
        let FieldDesc::Int(desc) = &field.desc else {
            panic!("wrong kind");
        };
        assert_eq!(desc.default_value, u64::MAX as i128);
        assert_eq!(desc.valid_ranges[0].max, u64::MAX as i128);
        assert_eq!(desc.special_values[0].value, u64::MAX as i128);
        assert_eq!(desc.special_values[0].name, "invalid");

        let field: ParsedField = serde_json::from_str(
            r#"{
                "name": "offset",
                "kind": "int",
                "type": "int64",
                "default_value": -9223372036854775808,
                "valid_ranges": [{"min": -9223372036854775808, "max": -1}]
            }"#,
        )
        .unwrap();
        let FieldDesc::Int(desc) = &field.desc else {
            panic!("wrong kind");
        };
        assert_eq!(desc.default_value, i64::MIN as i128);
        assert_eq!(desc.valid_ranges[0].min, i64::MIN as i128);
    }

    #[test]
    fn enum_values_from_json() {
        let field: ParsedField = serde_json::from_str(
            r#"{
                "name": "code",
                "kind": "enum",
                "type": "int8",
                "default_value": -1,
                "values": [
                    {"name": "Invalid", "value": -1},
                    {"name": "Ok", "value": 0}
                ]
            }"#,
        )
        .unwrap();
        let FieldDesc::Enum(desc) = &field.desc else {
            panic!("wrong kind");
        };
        assert_eq!(desc.default_value, -1);
        assert_eq!(desc.values[0].value, -1);
        assert_eq!(desc.values[1].value, 0);
    }

    #[test]
    fn nested_bundle_from_json() {
        let field: ParsedField = serde_json::from_str(
            r#"{
                "name": "pair",
                "kind": "bundle",
                "members": [
                    {"name": "key", "kind": "int", "type": "uint8"},
                    {"name": "value", "kind": "string"}
                ]
            }"#,
        )
        .unwrap();
        let FieldDesc::Bundle(desc) = &field.desc else {
            panic!("wrong kind");
        };
        assert_eq!(desc.members.len(), 2);
        assert_eq!(desc.members[0].kind(), FieldKind::Int);
        assert_eq!(desc.members[1].kind(), FieldKind::String);
    }

    #[test]
    fn range_window_subset() {
        let range =
            ValidRange { min: 0i128, max: 5, since_version: 2, deprecated_since: 4 };
        assert!(range.narrower_than(0, NOT_YET_DEPRECATED));
        assert!(!range.narrower_than(2, 4));
    }

    #[test]
    fn field_kind_table_is_complete() {
        assert_eq!(FieldKind::ALL.len(), 12);
        for (idx, kind) in FieldKind::ALL.iter().enumerate() {
            assert_eq!(
                FieldKind::ALL.iter().position(|k| k == kind),
                Some(idx),
                "duplicate kind entry"
            );
        }
    }
}
