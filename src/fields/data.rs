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

//! Raw data fields.

use super::common::{self, ClassDef};
use super::{FieldBase, Member, OptionsMode, MAX_POSSIBLE_LENGTH};
use crate::context::Context;
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{DataDesc, Version};
use crate::template::{self, ReplacementMap};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct DataField {
    pub base: FieldBase,
    pub desc: DataDesc,
    prefix: Option<Member>,
}

impl DataField {
    pub fn new(base: FieldBase, desc: DataDesc) -> DataField {
        let prefix = desc.length_prefix.as_deref().map(Member::from_parsed);
        DataField { base, desc, prefix }
    }

    pub fn prepare(
        &mut self,
        ctx: &Context,
        since: Version,
        deprecated: Version,
    ) -> Result<(), Diagnostics> {
        let mut diags = Diagnostics::default();
        if self.desc.fixed_length != 0 && self.prefix.is_some() {
            diags.push_error(
                ErrorCode::StructuralConflict,
                &self.base.name,
                "fixed length and a length prefix cannot be combined",
            );
        }
        if self.prefix.is_some() && !self.desc.detached_prefix_name.is_empty() {
            diags.push_error(
                ErrorCode::StructuralConflict,
                &self.base.name,
                "inline and detached length prefixes cannot be combined",
            );
        }
        if default_bytes(&self.desc.default_value).is_none() {
            diags.push_error(
                ErrorCode::StructuralConflict,
                &self.base.name,
                "default value is not a valid hex byte string",
            );
        }
        if let Some(prefix) = &mut self.prefix {
            if let Err(sub) = prefix.prepare(ctx, since, deprecated) {
                diags.merge(sub);
            }
        }
        diags.err_or(())
    }

    pub fn min_length(&self, ctx: &Context) -> usize {
        if self.desc.fixed_length != 0 {
            return self.desc.fixed_length;
        }
        match &self.prefix {
            Some(prefix) => prefix.with_node(ctx, |node| node.min_length(ctx)),
            None => 0,
        }
    }

    pub fn max_length(&self, _ctx: &Context) -> usize {
        if self.desc.fixed_length != 0 {
            self.desc.fixed_length
        } else {
            MAX_POSSIBLE_LENGTH
        }
    }

    pub fn compose_options(&self, ctx: &Context, mode: OptionsMode) -> Vec<String> {
        self.options_with_name(ctx, mode, &common::class_name(&self.base.name))
    }

    fn options_with_name(
        &self,
        ctx: &Context,
        _mode: OptionsMode,
        class_name: &str,
    ) -> Vec<String> {
        let mut options = Vec::new();
        if self.desc.fixed_length != 0 {
            options.push(format!(
                "comms::option::def::SequenceFixedSize<{}>",
                self.desc.fixed_length
            ));
        }
        if let Some(prefix) = &self.prefix {
            options.push(format!(
                "comms::option::def::SequenceSizeFieldPrefix<\n    typename {class_name}{}::{}\n>",
                common::MEMBERS_SUFFIX,
                prefix.class_name(ctx)
            ));
        }
        if !self.desc.detached_prefix_name.is_empty() {
            options.push("comms::option::def::SequenceLengthForcingEnabled".to_string());
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/ArrayList.h".to_string());
        out.insert("<cstdint>".to_string());
        if let Some(prefix) = &self.prefix {
            prefix.add_includes(ctx, out);
        }
    }

    pub fn class_def(&self, ctx: &Context, scope: &str, class_name: &str) -> ClassDef {
        let members_struct = match &self.prefix {
            Some(prefix) => {
                let member_scope = common::member_scope(scope, class_name);
                let defs = vec![prefix.member_definition(ctx, &member_scope)];
                common::render_members_struct(class_name, "data", &defs)
            }
            None => String::new(),
        };

        let mut args = vec![
            common::field_base(ctx, None),
            "std::uint8_t".to_string(),
        ];
        args.extend(self.options_with_name(ctx, OptionsMode::Full, class_name));

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::ArrayList", &args),
            members_struct,
            public_body: self.default_ctor_body(class_name).unwrap_or_default(),
            private_body: String::new(),
        }
    }

    fn default_ctor_body(&self, class_name: &str) -> Option<String> {
        let bytes = default_bytes(&self.desc.default_value)?;
        if bytes.is_empty() {
            return None;
        }
        let listed: Vec<String> = bytes.iter().map(|b| format!("0x{b:02X}")).collect();
        let mut repl = ReplacementMap::new();
        repl.insert("CLASS_NAME".to_string(), class_name.to_string());
        repl.insert("BYTES".to_string(), listed.join(", "));
        Some(template::render(
            "/// @brief Default constructor, assigns the default value.\n\
             #^#CLASS_NAME#$#()\n\
             {\n\
             \x20   static const std::uint8_t Data[] = {#^#BYTES#$#};\n\
             \x20   comms::util::assign(Base::value(), std::begin(Data), std::end(Data));\n\
             }\n",
            &repl,
        ))
    }
}

/// Decode a hex encoded default value. `None` when malformed.
fn default_bytes(hex: &str) -> Option<Vec<u8>> {
    let cleaned: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        return None;
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|idx| u8::from_str_radix(&cleaned[idx..idx + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, CustomCode};
    use crate::fields::FieldNode;
    use crate::schema::{ParsedField, NOT_YET_DEPRECATED};

    fn data_node(json: &str) -> FieldNode {
        let parsed: ParsedField = serde_json::from_str(json).unwrap();
        FieldNode::from_parsed(&parsed)
    }

    #[test]
    fn hex_default_decodes_into_constructor() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = data_node(
            r#"{"name": "blob", "kind": "data", "default_value": "AB 01 ff"}"#,
        );
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();
        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("0xAB, 0x01, 0xFF"));
        assert!(out.contains("comms::field::ArrayList<"));
    }

    #[test]
    fn malformed_hex_default_rejected() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node =
            data_node(r#"{"name": "blob", "kind": "data", "default_value": "XYZ"}"#);
        assert!(node.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }

    #[test]
    fn fixed_length_reported() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let node = data_node(r#"{"name": "blob", "kind": "data", "fixed_length": 16}"#);
        assert_eq!(node.min_length(&ctx), 16);
        assert_eq!(node.max_length(&ctx), 16);
        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(options.contains(&"comms::option::def::SequenceFixedSize<16>".to_string()));
    }
}
