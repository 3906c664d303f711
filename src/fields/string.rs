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

//! String fields.

use super::common::{self, ClassDef};
use super::{FieldBase, Member, OptionsMode, MAX_POSSIBLE_LENGTH};
use crate::context::Context;
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{StringDesc, Version};
use crate::template::{self, ReplacementMap};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct StringField {
    pub base: FieldBase,
    pub desc: StringDesc,
    prefix: Option<Member>,
}

impl StringField {
    pub fn new(base: FieldBase, desc: StringDesc) -> StringField {
        let prefix = desc.length_prefix.as_deref().map(Member::from_parsed);
        StringField { base, desc, prefix }
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
        let mut len = 0usize;
        if let Some(prefix) = &self.prefix {
            len += prefix.with_node(ctx, |node| node.min_length(ctx));
        }
        if self.desc.zero_term_suffix {
            len += 1;
        }
        len
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
        if self.desc.zero_term_suffix {
            options.push(format!(
                "comms::option::def::SequenceTerminationFieldSuffix<\n\
                 \x20   comms::field::IntValue<\n\
                 \x20       {},\n\
                 \x20       std::uint8_t,\n\
                 \x20       comms::option::def::ValidNumValue<0>,\n\
                 \x20       comms::option::def::FailOnInvalid<>\n\
                 \x20   >\n>",
                common::field_base(ctx, None)
            ));
        }
        if !self.desc.detached_prefix_name.is_empty() {
            options.push("comms::option::def::SequenceLengthForcingEnabled".to_string());
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/String.h".to_string());
        if self.desc.zero_term_suffix {
            out.insert("comms/field/IntValue.h".to_string());
            out.insert("<cstdint>".to_string());
        }
        if let Some(prefix) = &self.prefix {
            prefix.add_includes(ctx, out);
        }
    }

    pub fn class_def(&self, ctx: &Context, scope: &str, class_name: &str) -> ClassDef {
        let members_struct = match &self.prefix {
            Some(prefix) => {
                let member_scope = common::member_scope(scope, class_name);
                let defs = vec![prefix.member_definition(ctx, &member_scope)];
                common::render_members_struct(class_name, "string", &defs)
            }
            None => String::new(),
        };

        let mut args = vec![common::field_base(ctx, None)];
        args.extend(self.options_with_name(ctx, OptionsMode::Full, class_name));

        let public_body = match self.default_ctor_body(class_name) {
            Some(ctor) => ctor,
            None => String::new(),
        };

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::String", &args),
            members_struct,
            public_body,
            private_body: String::new(),
        }
    }

    fn default_ctor_body(&self, class_name: &str) -> Option<String> {
        if self.desc.default_value.is_empty() {
            return None;
        }
        let mut repl = ReplacementMap::new();
        repl.insert("CLASS_NAME".to_string(), class_name.to_string());
        repl.insert("VALUE".to_string(), format!("\"{}\"", self.desc.default_value));
        Some(template::render(
            "/// @brief Default constructor, assigns the default value.\n\
             #^#CLASS_NAME#$#()\n\
             {\n\
             \x20   Base::value() = #^#VALUE#$#;\n\
             }\n",
            &repl,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, CustomCode};
    use crate::fields::FieldNode;
    use crate::schema::{ParsedField, NOT_YET_DEPRECATED};

    fn string_node(json: &str) -> FieldNode {
        let parsed: ParsedField = serde_json::from_str(json).unwrap();
        FieldNode::from_parsed(&parsed)
    }

    #[test]
    fn length_prefix_defined_in_members_struct() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = string_node(
            r#"{
                "name": "label",
                "kind": "string",
                "length_prefix": {"name": "lengthPrefix", "kind": "int", "type": "uint8"}
            }"#,
        );
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();
        assert_eq!(node.min_length(&ctx), 1);
        assert_eq!(node.max_length(&ctx), MAX_POSSIBLE_LENGTH);

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("struct LabelMembers"));
        assert!(out.contains("class LengthPrefix : public"));
        assert!(out
            .contains("comms::option::def::SequenceSizeFieldPrefix<"));
        assert!(out.contains("typename LabelMembers::LengthPrefix"));
    }

    #[test]
    fn zero_termination_suffix() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let node = string_node(
            r#"{"name": "label", "kind": "string", "zero_term_suffix": true}"#,
        );
        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(options
            .iter()
            .any(|o| o.contains("SequenceTerminationFieldSuffix")));
        assert_eq!(node.min_length(&ctx), 1);
    }

    #[test]
    fn fixed_length_excludes_prefix() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = string_node(
            r#"{
                "name": "label",
                "kind": "string",
                "fixed_length": 8,
                "length_prefix": {"name": "lengthPrefix", "kind": "int", "type": "uint8"}
            }"#,
        );
        assert!(node.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }

    #[test]
    fn default_value_constructor() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let node = string_node(
            r#"{"name": "label", "kind": "string", "default_value": "hello"}"#,
        );
        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("Base::value() = \"hello\";"));
    }
}
