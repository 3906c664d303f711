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

//! Floating point fields.
//!
//! Floats cannot appear as template arguments, so defaults are assigned
//! in a generated constructor and validity checks always live in a
//! generated `valid()` body. NaN and infinities go through recognizer
//! expressions, never numeric comparison.

use super::common::{self, ClassDef};
use super::{FieldBase, OptionsMode};
use crate::context::{Context, Hook};
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{FloatDesc, Version};
use crate::template::{self, ReplacementMap};
use crate::valid::{self, CondRenderer, ValidCond};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct FloatField {
    pub base: FieldBase,
    pub desc: FloatDesc,
}

impl FloatField {
    pub fn new(base: FieldBase, desc: FloatDesc) -> FloatField {
        FloatField { base, desc }
    }

    pub fn prepare(
        &mut self,
        _ctx: &Context,
        _since: Version,
        _deprecated: Version,
    ) -> Result<(), Diagnostics> {
        let mut diags = Diagnostics::default();
        for (idx, special) in self.desc.special_values.iter().enumerate() {
            // NaN compares unequal to everything, including itself.
            if special.value.is_nan() || self.desc.non_unique_specials_allowed {
                continue;
            }
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
        self.desc.float_type.byte_length()
    }

    pub fn max_length(&self, _ctx: &Context) -> usize {
        self.desc.float_type.byte_length()
    }

    pub fn compose_options(&self, ctx: &Context, mode: OptionsMode) -> Vec<String> {
        let mut options = Vec::new();
        if let Some(units) = self.desc.units {
            options.push(common::units_option(units).to_string());
        }
        if mode == OptionsMode::Full && !self.desc.valid_ranges.is_empty() {
            options.push("comms::option::def::InvalidByDefault".to_string());
            if self.has_version_based_ranges(ctx) {
                options.push("comms::option::def::VersionStorage".to_string());
            }
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, _ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/FloatValue.h".to_string());
        if !self.desc.valid_ranges.is_empty() || !self.desc.special_values.is_empty() {
            out.insert("<cmath>".to_string());
            out.insert("<limits>".to_string());
        }
    }

    pub fn class_def(&self, ctx: &Context, _scope: &str, class_name: &str) -> ClassDef {
        let mut args = vec![
            common::field_base(ctx, self.desc.endian),
            self.desc.float_type.cpp_type().to_string(),
        ];
        args.extend(self.compose_options(ctx, OptionsMode::Full));

        let mut public = Vec::new();
        if let Some(ctor) = self.default_ctor_body(class_name) {
            public.push(ctor);
        }
        public.push(self.specials_body());
        let custom_valid = ctx.custom.get(Hook::Valid, &self.base.external_ref);
        if !self.desc.valid_ranges.is_empty() && custom_valid.is_none() {
            public.push(self.valid_body(ctx));
        }

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::FloatValue", &args),
            members_struct: String::new(),
            public_body: template::join(&public, "\n"),
            private_body: String::new(),
        }
    }

    fn default_ctor_body(&self, class_name: &str) -> Option<String> {
        let value = self.desc.default_value;
        if value == 0.0 && !value.is_nan() {
            return None;
        }
        let assigned = float_value_expr(value);
        let mut repl = ReplacementMap::new();
        repl.insert("CLASS_NAME".to_string(), class_name.to_string());
        repl.insert("VALUE".to_string(), assigned);
        Some(template::render(
            "/// @brief Default constructor, assigns the default value.\n\
             #^#CLASS_NAME#$#()\n\
             {\n\
             \x20   Base::value() = #^#VALUE#$#;\n\
             }\n",
            &repl,
        ))
    }

    fn specials_body(&self) -> String {
        let parts: Vec<String> = self
            .desc
            .special_values
            .iter()
            .map(|special| {
                let check = if special.value.is_nan() {
                    "std::isnan(Base::value())".to_string()
                } else if special.value.is_infinite() {
                    let sign = if special.value < 0.0 {
                        "Base::value() < 0"
                    } else {
                        "0 < Base::value()"
                    };
                    format!("std::isinf(Base::value()) && ({sign})")
                } else {
                    format!(
                        "std::abs(Base::value() - value{}()) <= \
                         std::numeric_limits<typename Base::ValueType>::epsilon()",
                        common::class_name(&special.name)
                    )
                };

                let mut repl = ReplacementMap::new();
                repl.insert("NAME".to_string(), common::class_name(&special.name));
                repl.insert("VALUE".to_string(), float_value_expr(special.value));
                repl.insert("CHECK".to_string(), check);
                template::render(
                    "/// @brief Special value <b>\"#^#NAME#$#\"</b>.\n\
                     static typename Base::ValueType value#^#NAME#$#()\n\
                     {\n\
                     \x20   return #^#VALUE#$#;\n\
                     }\n\
                     \n\
                     /// @brief Check the value is equal to special @ref value#^#NAME#$#().\n\
                     bool is#^#NAME#$#() const\n\
                     {\n\
                     \x20   return #^#CHECK#$#;\n\
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

    fn conditions(&self, ctx: &Context) -> Vec<ValidCond> {
        if self.has_version_based_ranges(ctx) {
            valid::version_based_float_conditions(
                self.base.since_version,
                self.base.deprecated_since,
                &self.desc.valid_ranges,
            )
        } else {
            valid::normal_float_conditions(&self.desc.valid_ranges)
        }
    }

    fn valid_body(&self, ctx: &Context) -> String {
        let renderer = CondRenderer {
            value_expr: "Base::value()",
            version_expr: "Base::getVersion()",
            value_type: "typename Base::ValueType",
            unsigned: false,
        };
        let mut repl = ReplacementMap::new();
        repl.insert(
            "CONDITIONS".to_string(),
            renderer.render_blocks(&self.conditions(ctx)),
        );
        template::render(
            "/// @brief Validity check against the configured ranges.\n\
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

    pub fn parse_literal(&self, text: &str) -> Result<String, String> {
        let value: f64 = text
            .trim()
            .parse()
            .map_err(|_| format!("`{text}` is not a valid floating point literal"))?;
        if !value.is_finite() {
            return Err(format!("`{text}` cannot be compared numerically"));
        }
        Ok(valid::fmt_float(value))
    }
}

fn float_value_expr(value: f64) -> String {
    if value.is_nan() {
        "std::numeric_limits<typename Base::ValueType>::quiet_NaN()".to_string()
    } else if value.is_infinite() {
        if value < 0.0 {
            "-std::numeric_limits<typename Base::ValueType>::infinity()".to_string()
        } else {
            "std::numeric_limits<typename Base::ValueType>::infinity()".to_string()
        }
    } else {
        format!(
            "static_cast<typename Base::ValueType>({})",
            valid::fmt_float(value)
        )
    }
}
