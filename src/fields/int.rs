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

//! Integer fields.

use super::common::{self, ClassDef};
use super::{parse_int_literal, FieldBase, OptionsMode};
use crate::context::Context;
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{IntDesc, Version};
use crate::template::{self, ReplacementMap};
use crate::valid::{self, CondRenderer};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct IntField {
    pub base: FieldBase,
    pub desc: IntDesc,
}

impl IntField {
    pub fn new(base: FieldBase, desc: IntDesc) -> IntField {
        IntField { base, desc }
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

        for range in &self.desc.valid_ranges {
            if range.max < range.min {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &self.base.name,
                    format!("valid range [{}, {}] is inverted", range.min, range.max),
                );
            }
            if range.min < lo || hi < range.max {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &self.base.name,
                    format!(
                        "valid range [{}, {}] does not fit the serialization type",
                        range.min, range.max
                    ),
                );
            }
        }

        for (idx, special) in self.desc.special_values.iter().enumerate() {
            if special.value < lo || hi < special.value {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &self.base.name,
                    format!(
                        "special value `{}` does not fit the serialization type",
                        special.name
                    ),
                );
            }
            if !self.desc.non_unique_specials_allowed {
                let duplicate = self.desc.special_values[..idx]
                    .iter()
                    .find(|other| other.value == special.value);
                if let Some(other) = duplicate {
                    diags.push_error(
                        ErrorCode::StructuralConflict,
                        &self.base.name,
                        format!(
                            "special values `{}` and `{}` share the same value",
                            other.name, special.name
                        ),
                    );
                }
            }
        }
        diags.err_or(())
    }

    pub fn has_version_based_ranges(&self, ctx: &Context) -> bool {
        valid::needs_version_based(
            ctx.config.version_dependent_code,
            self.desc.valid_check_version,
            self.base.since_version,
            self.base.deprecated_since,
            &self.desc.valid_ranges,
        )
    }

    pub fn min_length(&self, _ctx: &Context) -> usize {
        if self.desc.int_type.is_var_length() {
            1
        } else {
            self.desc.byte_length()
        }
    }

    pub fn max_length(&self, _ctx: &Context) -> usize {
        if self.desc.int_type.is_var_length() {
            // Seven payload bits per encoded byte.
            (self.desc.byte_length() * 8 + 6) / 7
        } else {
            self.desc.byte_length()
        }
    }

    pub fn compose_options(&self, ctx: &Context, mode: OptionsMode) -> Vec<String> {
        let mut options = Vec::new();

        if self.desc.int_type.is_var_length() {
            options.push(format!(
                "comms::option::def::VarLength<{}, {}>",
                self.min_length(ctx),
                self.max_length(ctx)
            ));
        } else if self.desc.bit_length != 0 {
            options.push(format!(
                "comms::option::def::FixedBitLength<{}>",
                self.desc.bit_length
            ));
        } else if self.desc.length.is_some()
            && self.desc.byte_length() != self.desc.int_type.byte_length()
        {
            options.push(format!(
                "comms::option::def::FixedLength<{}>",
                self.desc.byte_length()
            ));
        }

        if self.desc.ser_offset != 0 {
            options.push(format!(
                "comms::option::def::NumValueSerOffset<{}>",
                self.desc.ser_offset
            ));
        }

        if let Some(scaling) = self.desc.scaling {
            if scaling.num != scaling.denom {
                options.push(format!(
                    "comms::option::def::ScalingRatio<{}, {}>",
                    scaling.num, scaling.denom
                ));
            }
        }

        if let Some(units) = self.desc.units {
            options.push(common::units_option(units).to_string());
        }

        if mode == OptionsMode::Full {
            self.compose_value_options(ctx, &mut options);
        }

        if self.desc.fail_on_invalid {
            options.push("comms::option::def::FailOnInvalid<>".to_string());
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    fn compose_value_options(&self, ctx: &Context, options: &mut Vec<String>) {
        let unsigned = self.desc.int_type.is_unsigned();
        if self.desc.default_value != 0 {
            let opt = if unsigned && self.desc.default_value > i64::MAX as i128 {
                "DefaultBigUnsignedNumValue"
            } else {
                "DefaultNumValue"
            };
            options.push(format!(
                "comms::option::def::{}<{}>",
                opt,
                valid::fmt_int(self.desc.default_value, unsigned)
            ));
        }

        if self.desc.valid_ranges.is_empty() {
            return;
        }

        if self.has_version_based_ranges(ctx) {
            // Ranges move into a generated valid() with runtime version
            // guards; the field stores the version and starts invalid.
            options.push("comms::option::def::VersionStorage".to_string());
            options.push("comms::option::def::InvalidByDefault".to_string());
            return;
        }

        let ranges = merged_ranges(self);
        for range in &ranges {
            let big = unsigned && i64::MAX as i128 <= range.max;
            let opt = match (range.min == range.max, big) {
                (true, false) => format!(
                    "comms::option::def::ValidNumValue<{}>",
                    valid::fmt_int(range.min, unsigned)
                ),
                (true, true) => format!(
                    "comms::option::def::ValidBigUnsignedNumValue<{}>",
                    valid::fmt_int(range.min, unsigned)
                ),
                (false, false) => format!(
                    "comms::option::def::ValidNumValueRange<{}, {}>",
                    valid::fmt_int(range.min, unsigned),
                    valid::fmt_int(range.max, unsigned)
                ),
                (false, true) => format!(
                    "comms::option::def::ValidBigUnsignedNumValueRange<{}, {}>",
                    valid::fmt_int(range.min, unsigned),
                    valid::fmt_int(range.max, unsigned)
                ),
            };
            options.push(opt);
        }
    }

    pub fn add_includes(&self, _ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/IntValue.h".to_string());
        out.insert("<cstdint>".to_string());
    }

    pub fn class_def(&self, ctx: &Context, _scope: &str, class_name: &str) -> ClassDef {
        let mut args = vec![
            common::field_base(ctx, self.desc.endian),
            self.desc.int_type.cpp_type().to_string(),
        ];
        args.extend(self.compose_options(ctx, OptionsMode::Full));

        let mut public = vec![self.specials_body()];
        let custom_valid =
            ctx.custom.get(crate::context::Hook::Valid, &self.base.external_ref);
        if self.has_version_based_ranges(ctx) && custom_valid.is_none() {
            public.push(self.version_based_valid_body());
        }

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::IntValue", &args),
            members_struct: String::new(),
            public_body: template::join(&public, "\n"),
            private_body: String::new(),
        }
    }

    fn specials_body(&self) -> String {
        let unsigned = self.desc.int_type.is_unsigned();
        let parts: Vec<String> = self
            .desc
            .special_values
            .iter()
            .map(|special| {
                let mut repl = ReplacementMap::new();
                repl.insert("NAME".to_string(), common::class_name(&special.name));
                repl.insert(
                    "VALUE".to_string(),
                    valid::fmt_int(special.value, unsigned),
                );
                template::render(
                    "/// @brief Special value <b>\"#^#NAME#$#\"</b>.\n\
                     static constexpr typename Base::ValueType value#^#NAME#$#()\n\
                     {\n\
                     \x20   return static_cast<typename Base::ValueType>(#^#VALUE#$#);\n\
                     }\n\
                     \n\
                     /// @brief Check the value is equal to special @ref value#^#NAME#$#().\n\
                     bool is#^#NAME#$#() const\n\
                     {\n\
                     \x20   return Base::value() == value#^#NAME#$#();\n\
                     }\n\
                     \n\
                     /// @brief Assign special value @ref value#^#NAME#$#().\n\
                     void set#^#NAME#$#()\n\
                     {\n\
                     \x20   Base::value() = value#^#NAME#$#();\n\
                     }\n",
                    &repl,
                )
            })
            .collect();
        template::join(&parts, "\n")
    }

    fn version_based_valid_body(&self) -> String {
        let conds = valid::version_based_int_conditions(
            self.base.since_version,
            self.base.deprecated_since,
            &self.desc.valid_ranges,
        );
        let renderer = CondRenderer {
            value_expr: "Base::value()",
            version_expr: "Base::getVersion()",
            value_type: "typename Base::ValueType",
            unsigned: self.desc.int_type.is_unsigned(),
        };
        let mut repl = ReplacementMap::new();
        repl.insert("CONDITIONS".to_string(), renderer.render_blocks(&conds));
        template::render(
            "/// @brief Validity check against the version gated ranges.\n\
             bool valid() const\n\
             {\n\
             \x20   if (Base::valid()) {\n\
             \x20       return true;\n\
             \x20   }\n\
             \x20   #^#CONDITIONS#$#\n\
             \x20   return false;\n\
             }\n",
            &repl,
        )
    }

    /// Interpret a condition literal within this field's value domain.
    pub fn parse_literal(&self, text: &str) -> Result<String, String> {
        let value = parse_int_literal(text)?;
        let lo = self.desc.int_type.min_value();
        let hi = self.desc.int_type.max_value();
        if value < lo || hi < value {
            return Err(format!("`{text}` does not fit the field's value range"));
        }
        Ok(valid::fmt_int(value, self.desc.int_type.is_unsigned()))
    }

    /// True when the field can serve as a variant dispatch key: it fails
    /// reads on invalid values and pins exactly one value as both the
    /// only valid one and the default.
    pub fn is_valid_prop_key(&self) -> bool {
        self.desc.fail_on_invalid
            && self.desc.valid_ranges.len() == 1
            && self.desc.valid_ranges[0].min == self.desc.valid_ranges[0].max
            && self.desc.valid_ranges[0].min == self.desc.default_value
    }

    pub fn prop_key_type(&self) -> &'static str {
        self.desc.int_type.cpp_type()
    }

    pub fn prop_key_value(&self) -> i128 {
        self.desc.default_value
    }
}

fn merged_ranges(field: &IntField) -> Vec<crate::schema::ValidRange<i128>> {
    if field.desc.valid_check_version {
        // Merging collapses version windows; keep schema order when the
        // windows matter.
        field.desc.valid_ranges.clone()
    } else {
        valid::merge_int_ranges(field.desc.valid_ranges.clone())
    }
}
