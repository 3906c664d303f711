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

//! Bitfield fields: fixed-width members packed into whole bytes.

use super::common::{self, ClassDef};
use super::{FieldBase, FieldNode, Member, OptionsMode};
use crate::context::Context;
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{BitfieldDesc, Endian, Version};
use crate::template::{self, ReplacementMap};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct BitfieldField {
    pub base: FieldBase,
    pub endian: Option<Endian>,
    pub members: Vec<Member>,
}

impl BitfieldField {
    pub fn new(base: FieldBase, desc: &BitfieldDesc) -> BitfieldField {
        BitfieldField {
            base,
            endian: desc.endian,
            members: desc.members.iter().map(Member::from_parsed).collect(),
        }
    }

    pub fn prepare(
        &mut self,
        ctx: &Context,
        since: Version,
        deprecated: Version,
    ) -> Result<(), Diagnostics> {
        let mut diags = Diagnostics::default();
        for member in &mut self.members {
            if let Err(sub) = member.prepare(ctx, since, deprecated) {
                diags.merge(sub);
            }
        }
        if !diags.is_empty() {
            return Err(diags);
        }

        let mut total_bits = 0usize;
        for (idx, member) in self.members.iter().enumerate() {
            match member.with_node(ctx, member_bit_width) {
                Some(bits) => total_bits += bits,
                None => diags.push_error(
                    ErrorCode::UnsupportedConfiguration,
                    &self.base.name,
                    format!(
                        "member `{}` cannot be packed into a bitfield",
                        member.name(ctx)
                    ),
                ),
            }
            let name = member.class_name(ctx);
            let clash = self.members[..idx].iter().any(|m| m.class_name(ctx) == name);
            if clash {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &self.base.name,
                    format!("members collapse onto the same class name `{name}`"),
                );
            }
        }
        if diags.is_empty() && total_bits % 8 != 0 {
            diags.push_error(
                ErrorCode::StructuralConflict,
                &self.base.name,
                format!("member widths sum to {total_bits} bits, not whole bytes"),
            );
        }
        diags.err_or(())
    }

    fn total_length(&self, ctx: &Context) -> usize {
        let bits: usize = self
            .members
            .iter()
            .filter_map(|m| m.with_node(ctx, member_bit_width))
            .sum();
        bits / 8
    }

    pub fn min_length(&self, ctx: &Context) -> usize {
        self.total_length(ctx)
    }

    pub fn max_length(&self, ctx: &Context) -> usize {
        self.total_length(ctx)
    }

    pub fn members_version_dependent(&self, ctx: &Context) -> bool {
        self.members
            .iter()
            .any(|m| m.with_node(ctx, |node| node.is_version_dependent(ctx)))
    }

    pub fn compose_options(&self, ctx: &Context, _mode: OptionsMode) -> Vec<String> {
        let mut options = Vec::new();
        if self.members_version_dependent(ctx) {
            options.push("comms::option::def::HasVersionDependentMembers".to_string());
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/Bitfield.h".to_string());
        out.insert("<tuple>".to_string());
        for member in &self.members {
            member.add_includes(ctx, out);
        }
    }

    pub fn class_def(&self, ctx: &Context, scope: &str, class_name: &str) -> ClassDef {
        let member_scope = common::member_scope(scope, class_name);
        let mut defs: Vec<String> = self
            .members
            .iter()
            .map(|m| m.member_definition(ctx, &member_scope))
            .collect();
        defs.push(self.all_members_alias(ctx));
        let members_struct =
            common::render_members_struct(class_name, "bitfield", &defs);

        let mut args = vec![
            common::field_base(ctx, self.endian),
            format!("typename {class_name}{}::All", common::MEMBERS_SUFFIX),
        ];
        args.extend(self.compose_options(ctx, OptionsMode::Full));

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::Bitfield", &args),
            members_struct,
            public_body: members_names_macro(ctx, &self.members),
            private_body: String::new(),
        }
    }

    fn all_members_alias(&self, ctx: &Context) -> String {
        let entries: Vec<String> =
            self.members.iter().map(|m| m.class_name(ctx)).collect();
        let mut repl = ReplacementMap::new();
        repl.insert("MEMBERS".to_string(), entries.join(",\n"));
        template::render(
            "/// @brief All members bundled in @b std::tuple.\n\
             using All =\n\
             \x20   std::tuple<\n\
             \x20       #^#MEMBERS#$#\n\
             \x20   >;\n",
            &repl,
        )
    }
}

/// Packed width of a bitfield member, when the kind supports packing.
fn member_bit_width(node: &FieldNode) -> Option<usize> {
    match node {
        FieldNode::Int(f) => Some(if f.desc.bit_length != 0 {
            f.desc.bit_length
        } else {
            f.desc.byte_length() * 8
        }),
        FieldNode::Enum(f) => Some(if f.desc.bit_length != 0 {
            f.desc.bit_length
        } else {
            f.desc.int_type.byte_length() * 8
        }),
        FieldNode::Set(f) => Some(if f.desc.bit_length != 0 {
            f.desc.bit_length
        } else {
            f.desc.length * 8
        }),
        _ => None,
    }
}

/// `COMMS_FIELD_MEMBERS_NAMES` macro listing member accessors in
/// declaration order.
pub(super) fn members_names_macro(ctx: &Context, members: &[Member]) -> String {
    if members.is_empty() {
        return String::new();
    }
    let mut names: Vec<String> = members
        .iter()
        .map(|m| format!("{},", common::access_name(&m.name(ctx))))
        .collect();
    if let Some(last) = names.last_mut() {
        last.pop();
    }
    let mut repl = ReplacementMap::new();
    repl.insert("NAMES".to_string(), names.join("\n"));
    template::render(
        "/// @brief Allow access to internal fields.\n\
         COMMS_FIELD_MEMBERS_NAMES(\n\
         \x20   #^#NAMES#$#\n\
         );\n",
        &repl,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, CustomCode};
    use crate::schema::{ParsedField, NOT_YET_DEPRECATED};

    fn bitfield_node(json: &str) -> FieldNode {
        let parsed: ParsedField = serde_json::from_str(json).unwrap();
        FieldNode::from_parsed(&parsed)
    }

    fn three_member_bitfield() -> FieldNode {
        bitfield_node(
            r#"{
                "name": "control",
                "kind": "bitfield",
                "members": [
                    {"name": "tag", "kind": "int", "type": "uint8", "bit_length": 2},
                    {"name": "flags", "kind": "set", "length": 1, "bit_length": 3,
                     "bits": [{"name": "urgent", "idx": 0}]},
                    {"name": "count", "kind": "int", "type": "uint8", "bit_length": 3}
                ]
            }"#,
        )
    }

    #[test]
    fn members_struct_and_tuple() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = three_member_bitfield();
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();
        assert_eq!(node.min_length(&ctx), 1);

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("struct ControlMembers"));
        assert!(out.contains("class Tag : public"));
        assert!(out.contains("class Flags : public"));
        assert!(out.contains("class Count : public"));
        assert!(out.contains("using All =\n        std::tuple<"));
        assert!(out.contains("typename ControlMembers::All"));
        assert!(out.contains("COMMS_FIELD_MEMBERS_NAMES(\n        tag,\n        flags,\n        count\n    );"));
        assert!(out.contains("comms::option::def::FixedBitLength<2>"));
    }

    #[test]
    fn partial_byte_rejected() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bitfield_node(
            r#"{
                "name": "control",
                "kind": "bitfield",
                "members": [
                    {"name": "tag", "kind": "int", "type": "uint8", "bit_length": 3}
                ]
            }"#,
        );
        assert!(node.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }

    #[test]
    fn unpackable_member_rejected() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bitfield_node(
            r#"{
                "name": "control",
                "kind": "bitfield",
                "members": [
                    {"name": "text", "kind": "string"}
                ]
            }"#,
        );
        assert!(node.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }
}
