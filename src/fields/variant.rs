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

//! Variant fields: one-of member selection.
//!
//! The generic read path trial-parses members in order. When every member
//! is a bundle opening with a fixed-value key of one shared type, read
//! dispatch collapses into a single switch over that key. A bundle
//! without a fixed key acts as the catch-all and must be declared last.

use super::bundle::BundleField;
use super::common::{self, ClassDef};
use super::{FieldBase, FieldNode, Member, OptionsMode};
use crate::context::Context;
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{VariantDesc, Version};
use crate::template::{self, ReplacementMap};
use crate::valid;
use std::collections::BTreeSet;

/// Dispatch index limit of the target library's variant tables.
const MAX_MEMBERS: usize = 255;

#[derive(Debug, Clone)]
pub struct VariantField {
    pub base: FieldBase,
    pub members: Vec<Member>,
    default_member: Option<usize>,
}

/// Key-switch read plan. Cases parallel the members carrying a key.
struct OptimizedDispatch {
    key_type: &'static str,
    cases: Vec<String>,
    catch_all: bool,
}

impl VariantField {
    pub fn new(base: FieldBase, desc: &VariantDesc) -> VariantField {
        VariantField {
            base,
            members: desc.members.iter().map(Member::from_parsed).collect(),
            default_member: desc.default_member,
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

        if MAX_MEMBERS < self.members.len() {
            diags.push_error(
                ErrorCode::TooManyVariantMembers,
                &self.base.name,
                format!(
                    "{} members exceed the dispatch limit of {MAX_MEMBERS}",
                    self.members.len()
                ),
            );
        }

        for (idx, member) in self.members.iter().enumerate() {
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

        if ctx.config.version_dependent_code {
            for member in &self.members {
                let member_since =
                    member.with_node(ctx, |node| node.base().since_version);
                if since < member_since {
                    diags.push_error(
                        ErrorCode::UnsupportedConfiguration,
                        &self.base.name,
                        format!(
                            "member `{}` cannot be introduced later than the \
                             variant itself",
                            member.name(ctx)
                        ),
                    );
                }
            }
        }

        if let Some(idx) = self.default_member {
            if self.members.len() <= idx {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &self.base.name,
                    format!("default member index {idx} is out of bounds"),
                );
            }
        }
        diags.err_or(())
    }

    pub fn members_version_dependent(&self, ctx: &Context) -> bool {
        self.members
            .iter()
            .any(|m| m.with_node(ctx, |node| node.is_version_dependent(ctx)))
    }

    pub fn min_length(&self, ctx: &Context) -> usize {
        self.members
            .iter()
            .map(|m| m.with_node(ctx, |node| node.min_length(ctx)))
            .min()
            .unwrap_or(0)
    }

    pub fn max_length(&self, ctx: &Context) -> usize {
        self.members
            .iter()
            .map(|m| m.with_node(ctx, |node| node.max_length(ctx)))
            .max()
            .unwrap_or(0)
    }

    /// Selected only when every member is a bundle opening with a fixed
    /// key of one shared type, a key-less bundle (if any) coming last.
    fn optimized_dispatch(&self, ctx: &Context) -> Option<OptimizedDispatch> {
        if self.members.len() < 2 {
            return None;
        }
        let mut key_type: Option<&'static str> = None;
        let mut cases = Vec::new();
        let mut catch_all = false;
        for (idx, member) in self.members.iter().enumerate() {
            let key = member.with_node(ctx, |node| match node {
                FieldNode::Bundle(bundle) => Some(bundle_key(ctx, bundle)),
                _ => None,
            })?;
            match key {
                Some((cpp_type, literal)) => {
                    if *key_type.get_or_insert(cpp_type) != cpp_type {
                        return None;
                    }
                    cases.push(literal);
                }
                None => {
                    if idx + 1 != self.members.len() {
                        return None;
                    }
                    catch_all = true;
                }
            }
        }
        Some(OptimizedDispatch { key_type: key_type?, cases, catch_all })
    }

    pub fn has_optimized_read(&self, ctx: &Context) -> bool {
        self.optimized_dispatch(ctx).is_some()
    }

    pub fn compose_options(&self, ctx: &Context, _mode: OptionsMode) -> Vec<String> {
        let mut options = Vec::new();
        if let Some(idx) = self.default_member {
            options.push(format!("comms::option::def::DefaultVariantIndex<{idx}>"));
        }
        if self.has_optimized_read(ctx) {
            options.push("comms::option::def::HasCustomRead".to_string());
        }
        if self.members_version_dependent(ctx) {
            options.push("comms::option::def::HasVersionDependentMembers".to_string());
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/Variant.h".to_string());
        out.insert("<tuple>".to_string());
        if self.has_optimized_read(ctx) {
            out.insert("comms/field/IntValue.h".to_string());
            out.insert("<cstdint>".to_string());
        }
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
        let members_struct = common::render_members_struct(class_name, "variant", &defs);

        let mut args = vec![
            common::field_base(ctx, None),
            format!("typename {class_name}{}::All", common::MEMBERS_SUFFIX),
        ];
        args.extend(self.compose_options(ctx, OptionsMode::Full));

        let mut public = vec![self.members_names_macro(ctx)];
        let mut private = String::new();
        if let Some(dispatch) = self.optimized_dispatch(ctx) {
            public.push(optimized_read_body(ctx, &dispatch));
            private = read_member_body();
        }

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::Variant", &args),
            members_struct,
            public_body: template::join(&public, "\n"),
            private_body: private,
        }
    }

    fn all_members_alias(&self, ctx: &Context) -> String {
        let entries: Vec<String> =
            self.members.iter().map(|m| m.class_name(ctx)).collect();
        let mut repl = ReplacementMap::new();
        repl.insert("MEMBERS".to_string(), entries.join(",\n"));
        template::render(
            "/// @brief All members in @b std::tuple.\n\
             using All =\n\
             \x20   std::tuple<\n\
             \x20       #^#MEMBERS#$#\n\
             \x20   >;\n",
            &repl,
        )
    }

    fn members_names_macro(&self, ctx: &Context) -> String {
        if self.members.is_empty() {
            return String::new();
        }
        let mut names: Vec<String> = self
            .members
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
             COMMS_VARIANT_MEMBERS_NAMES(\n\
             \x20   #^#NAMES#$#\n\
             );\n",
            &repl,
        )
    }
}

/// Fixed dispatch key of a bundle member: the C++ type and the formatted
/// value. `None` when the bundle does not open with a valid key field.
fn bundle_key(ctx: &Context, bundle: &BundleField) -> Option<(&'static str, String)> {
    let first = bundle.members.first()?;
    first.with_node(ctx, |node| match node {
        FieldNode::Int(f) if f.is_valid_prop_key() => Some((
            f.prop_key_type(),
            valid::fmt_int(f.prop_key_value(), f.desc.int_type.is_unsigned()),
        )),
        _ => None,
    })
}

fn optimized_read_body(ctx: &Context, dispatch: &OptimizedDispatch) -> String {
    let cases: Vec<String> = dispatch
        .cases
        .iter()
        .enumerate()
        .map(|(idx, literal)| {
            format!("case {literal}:\n    return readMember<{idx}>(origIter, iter, len);")
        })
        .collect();
    let default_body = if dispatch.catch_all {
        format!(
            "default:\n    return readMember<{}>(origIter, iter, len);",
            dispatch.cases.len()
        )
    } else {
        "default:\n    break;".to_string()
    };

    const TEMPL: &str = "\
/// @brief Optimized read functionality.
template <typename TIter>
comms::ErrorStatus read(TIter& iter, std::size_t len)
{
    using CommonKeyField =
        comms::field::IntValue<
            #^#FIELD_BASE#$#,
            #^#KEY_TYPE#$#
        >;
    CommonKeyField commonKeyField;
    auto origIter = iter;
    auto es = commonKeyField.read(iter, len);
    if (es != comms::ErrorStatus::Success) {
        Base::reset();
        return es;
    }

    switch (commonKeyField.value()) {
    #^#CASES#$#
    #^#DEFAULT#$#
    };

    Base::reset();
    return comms::ErrorStatus::InvalidMsgData;
}
";
    let mut repl = ReplacementMap::new();
    repl.insert("FIELD_BASE".to_string(), common::field_base(ctx, None));
    repl.insert("KEY_TYPE".to_string(), dispatch.key_type.to_string());
    repl.insert("CASES".to_string(), cases.join("\n"));
    repl.insert("DEFAULT".to_string(), default_body);
    template::render(TEMPL, &repl)
}

fn read_member_body() -> String {
    "template <std::size_t TIdx, typename TIter>\n\
     comms::ErrorStatus readMember(TIter& origIter, TIter& iter, std::size_t len)\n\
     {\n\
     \x20   iter = origIter;\n\
     \x20   auto& field = Base::template initField<TIdx>();\n\
     \x20   return field.read(iter, len);\n\
     }\n"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, CustomCode};
    use crate::schema::{ParsedField, NOT_YET_DEPRECATED};

    fn variant_node(json: &str) -> FieldNode {
        let parsed: ParsedField = serde_json::from_str(json).unwrap();
        FieldNode::from_parsed(&parsed)
    }

    fn keyed_bundle(name: &str, key: i64) -> String {
        format!(
            r#"{{"name": "{name}", "kind": "bundle", "members": [
                {{"name": "key", "kind": "int", "type": "uint8",
                 "default_value": {key}, "fail_on_invalid": true,
                 "valid_ranges": [{{"min": {key}, "max": {key}}}]}},
                {{"name": "value", "kind": "int", "type": "uint32"}}
            ]}}"#
        )
    }

    #[test]
    fn keyed_bundles_select_optimized_read() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = variant_node(&format!(
            r#"{{"name": "property", "kind": "variant", "members": [
                {}, {}
            ]}}"#,
            keyed_bundle("p1", 1),
            keyed_bundle("p2", 2)
        ));
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();

        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(options.contains(&"comms::option::def::HasCustomRead".to_string()));

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("comms::field::Variant<"));
        assert!(out.contains("switch (commonKeyField.value())"));
        assert!(out.contains("case 1:"));
        assert!(out.contains("return readMember<0>(origIter, iter, len);"));
        assert!(out.contains("case 2:"));
        assert!(out.contains("return readMember<1>(origIter, iter, len);"));
        assert!(out.contains("COMMS_VARIANT_MEMBERS_NAMES(\n        p1,\n        p2\n    );"));
        assert!(out.contains("template <std::size_t TIdx, typename TIter>"));
    }

    #[test]
    fn mismatched_key_types_fall_back_to_generic_read() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = variant_node(&format!(
            r#"{{"name": "property", "kind": "variant", "members": [
                {},
                {{"name": "p2", "kind": "bundle", "members": [
                    {{"name": "key", "kind": "int", "type": "uint16",
                     "default_value": 2, "fail_on_invalid": true,
                     "valid_ranges": [{{"min": 2, "max": 2}}]}},
                    {{"name": "value", "kind": "int", "type": "uint32"}}
                ]}}
            ]}}"#,
            keyed_bundle("p1", 1)
        ));
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();

        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(!options.contains(&"comms::option::def::HasCustomRead".to_string()));
        let out = node.class_definition(&ctx, "protocol::field");
        assert!(!out.contains("switch (commonKeyField.value())"));
    }

    #[test]
    fn catch_all_member_becomes_default_case() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = variant_node(&format!(
            r#"{{"name": "property", "kind": "variant", "members": [
                {}, {},
                {{"name": "any", "kind": "bundle", "members": [
                    {{"name": "key", "kind": "int", "type": "uint8"}},
                    {{"name": "value", "kind": "data"}}
                ]}}
            ]}}"#,
            keyed_bundle("p1", 1),
            keyed_bundle("p2", 2)
        ));
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("default:"));
        assert!(out.contains("return readMember<2>(origIter, iter, len);"));
    }

    #[test]
    fn catch_all_not_last_falls_back_to_generic_read() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = variant_node(&format!(
            r#"{{"name": "property", "kind": "variant", "members": [
                {{"name": "any", "kind": "bundle", "members": [
                    {{"name": "key", "kind": "int", "type": "uint8"}},
                    {{"name": "value", "kind": "data"}}
                ]}},
                {}, {}
            ]}}"#,
            keyed_bundle("p1", 1),
            keyed_bundle("p2", 2)
        ));
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();
        let FieldNode::Variant(variant) = &node else { panic!("wrong kind") };
        assert!(!variant.has_optimized_read(&ctx));
    }

    #[test]
    fn member_newer_than_variant_rejected() {
        let config = Config {
            schema_version: 5,
            version_dependent_code: true,
            ..Config::default()
        };
        let ctx = Context::new(config, CustomCode::default());
        let mut node = variant_node(
            r#"{"name": "property", "kind": "variant", "since_version": 1,
                "members": [
                    {"name": "p1", "kind": "bundle", "since_version": 3,
                     "members": [
                        {"name": "value", "kind": "int", "type": "uint8"}
                    ]}
                ]}"#,
        );
        assert!(node.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }

    #[test]
    fn default_member_index_in_options() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = variant_node(&format!(
            r#"{{"name": "property", "kind": "variant", "default_member": 1,
                "members": [{}, {}]}}"#,
            keyed_bundle("p1", 1),
            keyed_bundle("p2", 2)
        ));
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();
        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(options.contains(&"comms::option::def::DefaultVariantIndex<1>".to_string()));
    }
}
