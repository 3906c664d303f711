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

//! Enumeration fields.

use super::common::{self, ClassDef};
use super::{parse_int_literal, FieldBase, OptionsMode};
use crate::context::Context;
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{EnumDesc, SemanticType, ValidRange, Version, NOT_YET_DEPRECATED};
use crate::template::{self, ReplacementMap};
use crate::valid;
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct EnumField {
    pub base: FieldBase,
    pub desc: EnumDesc,
}

impl EnumField {
    pub fn new(base: FieldBase, desc: EnumDesc) -> EnumField {
        EnumField { base, desc }
    }

    pub fn prepare(
        &mut self,
        _ctx: &Context,
        _since: Version,
        _deprecated: Version,
    ) -> Result<(), Diagnostics> {
        let mut diags = Diagnostics::default();
        let lo = self.desc.int_type.min_value();
        let hi = self.desc.int_type.max_value();
        for (idx, value) in self.desc.values.iter().enumerate() {
            if value.value < lo || hi < value.value {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &self.base.name,
                    format!("value `{}` does not fit the serialization type", value.name),
                );
            }
            if !self.desc.non_unique_allowed {
                let duplicate =
                    self.desc.values[..idx].iter().find(|v| v.value == value.value);
                if let Some(other) = duplicate {
                    diags.push_error(
                        ErrorCode::StructuralConflict,
                        &self.base.name,
                        format!(
                            "values `{}` and `{}` share the same number",
                            other.name, value.name
                        ),
                    );
                }
            }
            let name_clash = self.desc.values[..idx]
                .iter()
                .any(|v| common::class_name(&v.name) == common::class_name(&value.name));
            if name_clash {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &self.base.name,
                    format!("value `{}` collapses onto an earlier identifier", value.name),
                );
            }
        }
        diags.err_or(())
    }

    pub fn min_length(&self, _ctx: &Context) -> usize {
        self.desc.int_type.byte_length()
    }

    pub fn max_length(&self, _ctx: &Context) -> usize {
        self.desc.int_type.byte_length()
    }

    fn value_type_name(&self, ctx: &Context, class_name: &str) -> String {
        if self.desc.semantic_type == SemanticType::MessageId {
            format!("{}::MsgId", ctx.config.main_namespace)
        } else {
            format!("{class_name}Val")
        }
    }

    /// Valid value ranges derived from the declared values, merged where
    /// they touch.
    fn valid_ranges(&self) -> Vec<ValidRange<i128>> {
        let ranges: Vec<ValidRange<i128>> = self
            .desc
            .values
            .iter()
            .map(|v| ValidRange {
                min: v.value,
                max: v.value,
                since_version: v.since_version,
                deprecated_since: v.deprecated_since,
            })
            .collect();
        valid::merge_int_ranges(ranges)
    }

    pub fn compose_options(&self, ctx: &Context, mode: OptionsMode) -> Vec<String> {
        let mut options = Vec::new();
        if self.desc.bit_length != 0 {
            options.push(format!(
                "comms::option::def::FixedBitLength<{}>",
                self.desc.bit_length
            ));
        }
        if mode == OptionsMode::Full {
            let unsigned = self.desc.int_type.is_unsigned();
            if self.desc.default_value != 0 {
                options.push(format!(
                    "comms::option::def::DefaultNumValue<{}>",
                    valid::fmt_int(self.desc.default_value, unsigned)
                ));
            }
            for range in self.valid_ranges() {
                if range.min == range.max {
                    options.push(format!(
                        "comms::option::def::ValidNumValue<{}>",
                        valid::fmt_int(range.min, unsigned)
                    ));
                } else {
                    options.push(format!(
                        "comms::option::def::ValidNumValueRange<{}, {}>",
                        valid::fmt_int(range.min, unsigned),
                        valid::fmt_int(range.max, unsigned)
                    ));
                }
            }
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/EnumValue.h".to_string());
        out.insert("<cstdint>".to_string());
        out.insert("<type_traits>".to_string());
        if !self.values_are_dense() {
            out.insert("<algorithm>".to_string());
            out.insert("<iterator>".to_string());
            out.insert("<utility>".to_string());
        }
        if self.desc.semantic_type == SemanticType::MessageId {
            out.insert(format!("{}/MsgId.h", ctx.config.main_namespace));
        }
    }

    pub fn class_def(&self, ctx: &Context, _scope: &str, class_name: &str) -> ClassDef {
        let value_type = self.value_type_name(ctx, class_name);
        let mut args = vec![
            common::field_base(ctx, self.desc.endian),
            value_type.clone(),
        ];
        args.extend(self.compose_options(ctx, OptionsMode::Full));

        let enum_decl = if self.desc.semantic_type == SemanticType::MessageId {
            String::new()
        } else {
            self.enum_declaration(&value_type)
        };

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::EnumValue", &args),
            members_struct: enum_decl,
            public_body: self.value_name_body(&value_type),
            private_body: String::new(),
        }
    }

    fn enum_declaration(&self, value_type: &str) -> String {
        let entries: Vec<String> = self
            .desc
            .values
            .iter()
            .map(|v| {
                let number = if self.desc.hex_assign {
                    format!("0x{:X}", v.value)
                } else {
                    v.value.to_string()
                };
                format!("{} = {number},", common::class_name(&v.name))
            })
            .collect();

        let mut repl = ReplacementMap::new();
        repl.insert("VALUE_TYPE".to_string(), value_type.to_string());
        repl.insert("UNDERLYING".to_string(), self.desc.int_type.cpp_type().to_string());
        repl.insert("ENTRIES".to_string(), entries.join("\n"));
        template::render(
            "/// @brief Values enumerator for @ref #^#VALUE_TYPE#$# field.\n\
             enum class #^#VALUE_TYPE#$# : #^#UNDERLYING#$#\n\
             {\n\
             \x20   #^#ENTRIES#$#\n\
             };\n",
            &repl,
        )
    }

    fn values_are_dense(&self) -> bool {
        let mut numbers: Vec<i128> = self.desc.values.iter().map(|v| v.value).collect();
        numbers.sort_unstable();
        numbers.dedup();
        match (numbers.first(), numbers.last()) {
            (Some(0), Some(last)) => *last as usize + 1 == numbers.len(),
            _ => false,
        }
    }

    fn value_name_body(&self, value_type: &str) -> String {
        if self.desc.values.is_empty() {
            return String::new();
        }
        if self.values_are_dense() {
            self.direct_value_name_body()
        } else {
            self.searched_value_name_body(value_type)
        }
    }

    fn direct_value_name_body(&self) -> String {
        let mut sorted = self.desc.values.clone();
        sorted.sort_by_key(|v| v.value);
        sorted.dedup_by_key(|v| v.value);
        let entries: Vec<String> = sorted
            .iter()
            .map(|v| format!("\"{}\",", common::display_name_or(&v.display_name, &v.name)))
            .collect();

        let mut repl = ReplacementMap::new();
        repl.insert("ENTRIES".to_string(), entries.join("\n"));
        template::render(
            "/// @brief Retrieve name of the enum value.\n\
             static const char* valueName(typename Base::ValueType val)\n\
             {\n\
             \x20   static const char* Map[] = {\n\
             \x20       #^#ENTRIES#$#\n\
             \x20   };\n\
             \x20   static const std::size_t MapSize = std::extent<decltype(Map)>::value;\n\
             \n\
             \x20   auto idx = static_cast<std::size_t>(val);\n\
             \x20   if (MapSize <= idx) {\n\
             \x20       return nullptr;\n\
             \x20   }\n\
             \x20   return Map[idx];\n\
             }\n",
            &repl,
        )
    }

    fn searched_value_name_body(&self, value_type: &str) -> String {
        let mut sorted = self.desc.values.clone();
        sorted.sort_by_key(|v| v.value);
        sorted.dedup_by_key(|v| v.value);
        let entries: Vec<String> = sorted
            .iter()
            .map(|v| {
                format!(
                    "std::make_pair({}::{}, \"{}\"),",
                    value_type,
                    common::class_name(&v.name),
                    common::display_name_or(&v.display_name, &v.name)
                )
            })
            .collect();

        let mut repl = ReplacementMap::new();
        repl.insert("ENTRIES".to_string(), entries.join("\n"));
        template::render(
            "/// @brief Retrieve name of the enum value.\n\
             static const char* valueName(typename Base::ValueType val)\n\
             {\n\
             \x20   using NameInfo = std::pair<typename Base::ValueType, const char*>;\n\
             \x20   static const NameInfo Map[] = {\n\
             \x20       #^#ENTRIES#$#\n\
             \x20   };\n\
             \n\
             \x20   auto iter = std::lower_bound(\n\
             \x20       std::begin(Map), std::end(Map), val,\n\
             \x20       [](const NameInfo& info, typename Base::ValueType v) -> bool\n\
             \x20       {\n\
             \x20           return info.first < v;\n\
             \x20       });\n\
             \n\
             \x20   if ((iter == std::end(Map)) || (iter->first != val)) {\n\
             \x20       return nullptr;\n\
             \x20   }\n\
             \x20   return iter->second;\n\
             }\n",
            &repl,
        )
    }

    /// Extra body of the template-independent Common struct.
    pub fn common_extra(&self, ctx: &Context) -> String {
        if self.desc.semantic_type == SemanticType::MessageId {
            return String::new();
        }
        self.enum_declaration(&self.value_type_name(ctx, &common::class_name(&self.base.name)))
    }

    pub fn plugin_extra_props(&self) -> Vec<String> {
        self.desc
            .values
            .iter()
            .map(|v| {
                format!(
                    ".add(\"{}\", {})",
                    common::display_name_or(&v.display_name, &v.name),
                    v.value
                )
            })
            .collect()
    }

    /// A condition literal is either a declared value name or a number
    /// within the serialization type's domain.
    pub fn parse_literal(&self, text: &str) -> Result<String, String> {
        let unsigned = self.desc.int_type.is_unsigned();
        if let Some(value) = self.desc.values.iter().find(|v| v.name == text.trim()) {
            return Ok(valid::fmt_int(value.value, unsigned));
        }
        let number = parse_int_literal(text)?;
        if number < self.desc.int_type.min_value() || self.desc.int_type.max_value() < number
        {
            return Err(format!("`{text}` does not fit the field's value range"));
        }
        Ok(valid::fmt_int(number, unsigned))
    }

    pub fn is_version_dependent_values(&self) -> bool {
        self.desc.values.iter().any(|v| {
            v.since_version > self.base.since_version
                || v.deprecated_since < NOT_YET_DEPRECATED
        })
    }
}
