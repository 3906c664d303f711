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

//! Bit set fields.

use super::common::{self, ClassDef};
use super::{FieldBase, OptionsMode};
use crate::context::Context;
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{SetDesc, Version};
use crate::template::{self, ReplacementMap};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct SetField {
    pub base: FieldBase,
    pub desc: SetDesc,
}

impl SetField {
    pub fn new(base: FieldBase, desc: SetDesc) -> SetField {
        SetField { base, desc }
    }

    fn width_bits(&self) -> usize {
        if self.desc.bit_length != 0 {
            self.desc.bit_length
        } else {
            self.desc.length * 8
        }
    }

    pub fn prepare(
        &mut self,
        _ctx: &Context,
        _since: Version,
        _deprecated: Version,
    ) -> Result<(), Diagnostics> {
        let mut diags = Diagnostics::default();
        let width = self.width_bits();
        for (idx, bit) in self.desc.bits.iter().enumerate() {
            if width <= bit.idx {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &self.base.name,
                    format!("bit `{}` is outside the {width} bit storage", bit.name),
                );
            }
            let name_clash = self.desc.bits[..idx].iter().any(|other| {
                common::access_name(&other.name) == common::access_name(&bit.name)
            });
            if name_clash {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &self.base.name,
                    format!("bit `{}` collapses onto an earlier identifier", bit.name),
                );
            }
        }
        diags.err_or(())
    }

    pub fn min_length(&self, _ctx: &Context) -> usize {
        self.desc.length
    }

    pub fn max_length(&self, _ctx: &Context) -> usize {
        self.desc.length
    }

    pub fn compose_options(&self, ctx: &Context, mode: OptionsMode) -> Vec<String> {
        let mut options = Vec::new();
        if self.desc.bit_length != 0 {
            options.push(format!(
                "comms::option::def::FixedBitLength<{}>",
                self.desc.bit_length
            ));
        } else {
            options.push(format!(
                "comms::option::def::FixedLength<{}>",
                self.desc.length
            ));
        }

        if mode == OptionsMode::Full {
            if self.desc.default_bit_value {
                let mask = ones_mask(self.width_bits());
                options.push(format!("comms::option::def::DefaultNumValue<0x{mask:X}>"));
            }
            if self.desc.reserved_mask != 0 {
                let value = if self.desc.reserved_bit_value {
                    self.desc.reserved_mask
                } else {
                    0
                };
                options.push(format!(
                    "comms::option::def::BitmaskReservedBits<0x{:X}U, 0x{value:X}U>",
                    self.desc.reserved_mask
                ));
            }
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, _ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/BitmaskValue.h".to_string());
        out.insert("<cstdint>".to_string());
        if !self.desc.bits.is_empty() {
            out.insert("<type_traits>".to_string());
        }
    }

    pub fn class_def(&self, ctx: &Context, _scope: &str, class_name: &str) -> ClassDef {
        let mut args = vec![common::field_base(ctx, self.desc.endian)];
        args.extend(self.compose_options(ctx, OptionsMode::Full));

        let mut public = Vec::new();
        if !self.desc.bits.is_empty() {
            public.push(self.bits_macros());
            public.push(self.bit_name_body());
        }

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::BitmaskValue", &args),
            members_struct: String::new(),
            public_body: template::join(&public, "\n"),
            private_body: String::new(),
        }
    }

    fn bits_macros(&self) -> String {
        let decls: Vec<String> = self
            .desc
            .bits
            .iter()
            .map(|b| format!("{}={},", common::access_name(&b.name), b.idx))
            .collect();
        let names: Vec<String> = self
            .desc
            .bits
            .iter()
            .map(|b| format!("{},", common::access_name(&b.name)))
            .collect();

        let mut decls = decls;
        let mut names = names;
        strip_trailing_comma(&mut decls);
        strip_trailing_comma(&mut names);

        let mut repl = ReplacementMap::new();
        repl.insert("DECLS".to_string(), decls.join("\n"));
        repl.insert("NAMES".to_string(), names.join("\n"));
        template::render(
            "/// @brief Provide names for internal bits.\n\
             COMMS_BITMASK_BITS(\n\
             \x20   #^#DECLS#$#\n\
             );\n\
             \n\
             /// @brief Generate independent access functions for internal bits.\n\
             COMMS_BITMASK_BITS_ACCESS(\n\
             \x20   #^#NAMES#$#\n\
             );\n",
            &repl,
        )
    }

    fn bit_name_entries(&self) -> Vec<String> {
        let top = self.desc.bits.iter().map(|b| b.idx).max().unwrap_or(0);
        (0..=top)
            .map(|idx| match self.desc.bits.iter().find(|b| b.idx == idx) {
                Some(bit) => format!(
                    "\"{}\",",
                    common::display_name_or(&bit.display_name, &bit.name)
                ),
                None => "nullptr,".to_string(),
            })
            .collect()
    }

    fn bit_name_body(&self) -> String {
        let mut repl = ReplacementMap::new();
        repl.insert("ENTRIES".to_string(), self.bit_name_entries().join("\n"));
        template::render(
            "/// @brief Retrieve name of the bit.\n\
             static const char* bitName(std::size_t idx)\n\
             {\n\
             \x20   static const char* Map[] = {\n\
             \x20       #^#ENTRIES#$#\n\
             \x20   };\n\
             \x20   static const std::size_t MapSize = std::extent<decltype(Map)>::value;\n\
             \n\
             \x20   if (MapSize <= idx) {\n\
             \x20       return nullptr;\n\
             \x20   }\n\
             \x20   return Map[idx];\n\
             }\n",
            &repl,
        )
    }

    /// Extra body of the template-independent Common struct.
    pub fn common_extra(&self) -> String {
        if self.desc.bits.is_empty() {
            return String::new();
        }
        self.bit_name_body()
    }

    pub fn plugin_extra_props(&self) -> Vec<String> {
        let top = self.desc.bits.iter().map(|b| b.idx).max().unwrap_or(0);
        if self.desc.bits.is_empty() {
            return Vec::new();
        }
        (0..=top)
            .map(|idx| match self.desc.bits.iter().find(|b| b.idx == idx) {
                Some(bit) => format!(
                    ".add(\"{}\")",
                    common::display_name_or(&bit.display_name, &bit.name)
                ),
                None => ".add(\"\")".to_string(),
            })
            .collect()
    }
}

fn ones_mask(bits: usize) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

fn strip_trailing_comma(entries: &mut [String]) {
    if let Some(last) = entries.last_mut() {
        if last.ends_with(',') {
            last.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, CustomCode};
    use crate::fields::FieldNode;
    use crate::schema::{ParsedField, NOT_YET_DEPRECATED};

    fn set_node(json: &str) -> FieldNode {
        let parsed: ParsedField = serde_json::from_str(json).unwrap();
        FieldNode::from_parsed(&parsed)
    }

    #[test]
    fn bit_names_and_access_macros() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let node = set_node(
            r#"{
                "name": "flags",
                "kind": "set",
                "length": 1,
                "bits": [
                    {"name": "enable", "idx": 0},
                    {"name": "loopback", "idx": 2}
                ]
            }"#,
        );
        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("comms::field::BitmaskValue<"));
        assert!(out.contains("comms::option::def::FixedLength<1>"));
        assert!(out.contains("enable=0,"));
        assert!(out.contains("loopback=2"));
        // The gap at index 1 keeps its slot in the name table.
        assert!(out.contains("nullptr,"));
        assert!(node.has_bit("enable"));
        assert!(!node.has_bit("disable"));
    }

    #[test]
    fn reserved_bits_option() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let node = set_node(
            r#"{
                "name": "flags",
                "kind": "set",
                "length": 2,
                "reserved_mask": 65280,
                "reserved_bit_value": true,
                "bits": [{"name": "b0", "idx": 0}]
            }"#,
        );
        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(options
            .contains(&"comms::option::def::BitmaskReservedBits<0xFF00U, 0xFF00U>".to_string()));
    }

    #[test]
    fn out_of_range_bit_rejected() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = set_node(
            r#"{
                "name": "flags",
                "kind": "set",
                "length": 1,
                "bits": [{"name": "b8", "idx": 8}]
            }"#,
        );
        assert!(node.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }

    #[test]
    fn default_bit_value_sets_all_ones() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let node = set_node(
            r#"{
                "name": "flags",
                "kind": "set",
                "length": 1,
                "default_bit_value": true,
                "bits": [{"name": "b0", "idx": 0}]
            }"#,
        );
        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(options.contains(&"comms::option::def::DefaultNumValue<0xFF>".to_string()));
    }
}
