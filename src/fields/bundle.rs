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

//! Bundle fields: heterogeneous member aggregation.
//!
//! Bundles are where inter-field coupling lives: detached length/count
//! prefixes referencing sibling members, and optional members activated
//! by sibling state. Both produce a generated `refresh()`.

use super::bitfield::members_names_macro;
use super::common::{self, ClassDef};
use super::{FieldBase, FieldNode, Member, OptionsMode};
use crate::cond::{self, SiblingScope};
use crate::context::Context;
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{BundleDesc, Version};
use crate::template::{self, ReplacementMap};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct BundleField {
    pub base: FieldBase,
    pub members: Vec<Member>,
}

/// A sibling-coupled member requiring a generated refresh step.
enum RefreshStep {
    /// Detached prefix member recomputed from the referenced sequence.
    DetachedPrefix {
        member: String,
        prefix: String,
        /// `length()` for serialization-length prefixes, `value().size()`
        /// for element counts.
        real_value: &'static str,
    },
    /// Optional member whose mode follows a sibling condition.
    OptionalMode { member: String, check: String },
}

/// Read preparation of one sequence member: forcing calls executed before
/// the member itself is read, so a detached prefix decoded earlier in the
/// bundle drives the sequence's wire length.
struct ReadPrep {
    /// Member position within the bundle.
    index: usize,
    member: String,
    /// `(prefix access name, forcing entry point)` pairs.
    calls: Vec<(String, &'static str)>,
}

impl BundleField {
    pub fn new(base: FieldBase, desc: &BundleDesc) -> BundleField {
        BundleField {
            base,
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

        self.validate_detached_prefixes(ctx, &mut diags);
        self.validate_optional_conds(ctx, &mut diags);
        diags.err_or(())
    }

    fn validate_detached_prefixes(&self, ctx: &Context, diags: &mut Diagnostics) {
        for member in &self.members {
            let referenced = member.with_node(ctx, detached_prefix_names);
            for prefix in referenced {
                let exists = self.members.iter().any(|m| m.name(ctx) == prefix);
                if !exists {
                    diags.push_error(
                        ErrorCode::UndeclaredFieldReference,
                        &self.base.name,
                        format!(
                            "detached prefix `{prefix}` of member `{}` does not name \
                             a sibling field",
                            member.name(ctx)
                        ),
                    );
                }
            }
        }
    }

    fn validate_optional_conds(&self, ctx: &Context, diags: &mut Diagnostics) {
        let scope = SiblingScope { ctx, members: &self.members };
        for member in &self.members {
            let cond = member.with_node(ctx, |node| match node {
                FieldNode::Optional(f) => f.cond.clone(),
                _ => None,
            });
            if let Some(expr) = cond {
                diags.merge(cond::validate(&expr, &scope, &self.base.name));
            }
        }
    }

    fn refresh_steps(&self, ctx: &Context) -> Vec<RefreshStep> {
        let mut steps = Vec::new();
        let scope = SiblingScope { ctx, members: &self.members };
        for member in &self.members {
            let member_name = common::access_name(&member.name(ctx));
            member.with_node(ctx, |node| match node {
                FieldNode::String(f) if !f.desc.detached_prefix_name.is_empty() => {
                    steps.push(RefreshStep::DetachedPrefix {
                        member: member_name.clone(),
                        prefix: common::access_name(&f.desc.detached_prefix_name),
                        real_value: "value().size()",
                    });
                }
                FieldNode::Data(f) if !f.desc.detached_prefix_name.is_empty() => {
                    steps.push(RefreshStep::DetachedPrefix {
                        member: member_name.clone(),
                        prefix: common::access_name(&f.desc.detached_prefix_name),
                        real_value: "value().size()",
                    });
                }
                FieldNode::List(f) => {
                    if !f.desc.detached_count_prefix_name.is_empty() {
                        steps.push(RefreshStep::DetachedPrefix {
                            member: member_name.clone(),
                            prefix: common::access_name(&f.desc.detached_count_prefix_name),
                            real_value: "value().size()",
                        });
                    }
                    if !f.desc.detached_length_prefix_name.is_empty() {
                        steps.push(RefreshStep::DetachedPrefix {
                            member: member_name.clone(),
                            prefix: common::access_name(
                                &f.desc.detached_length_prefix_name,
                            ),
                            real_value: "length()",
                        });
                    }
                    if !f.desc.detached_elem_length_prefix_name.is_empty() {
                        steps.push(RefreshStep::DetachedPrefix {
                            member: member_name.clone(),
                            prefix: common::access_name(
                                &f.desc.detached_elem_length_prefix_name,
                            ),
                            real_value: "minElementLength()",
                        });
                    }
                }
                FieldNode::Optional(f) => {
                    if let Some(expr) = &f.cond {
                        let check =
                            cond::render_check(expr, &scope).unwrap_or_else(|e| {
                                panic!(
                                    "condition of prepared field failed to resolve: {}",
                                    e.message
                                )
                            });
                        steps.push(RefreshStep::OptionalMode {
                            member: member_name.clone(),
                            check,
                        });
                    }
                }
                _ => {}
            });
        }
        steps
    }

    fn read_preps(&self, ctx: &Context) -> Vec<ReadPrep> {
        let mut preps = Vec::new();
        for (index, member) in self.members.iter().enumerate() {
            let calls = member.with_node(ctx, |node| {
                let mut calls = Vec::new();
                match node {
                    FieldNode::String(f) if !f.desc.detached_prefix_name.is_empty() => {
                        calls.push((
                            common::access_name(&f.desc.detached_prefix_name),
                            "forceReadLength",
                        ));
                    }
                    FieldNode::Data(f) if !f.desc.detached_prefix_name.is_empty() => {
                        calls.push((
                            common::access_name(&f.desc.detached_prefix_name),
                            "forceReadLength",
                        ));
                    }
                    FieldNode::List(f) => {
                        if !f.desc.detached_count_prefix_name.is_empty() {
                            calls.push((
                                common::access_name(&f.desc.detached_count_prefix_name),
                                "forceReadElemCount",
                            ));
                        }
                        if !f.desc.detached_length_prefix_name.is_empty() {
                            calls.push((
                                common::access_name(&f.desc.detached_length_prefix_name),
                                "forceReadLength",
                            ));
                        }
                        if !f.desc.detached_elem_length_prefix_name.is_empty() {
                            calls.push((
                                common::access_name(
                                    &f.desc.detached_elem_length_prefix_name,
                                ),
                                "forceReadElemLength",
                            ));
                        }
                    }
                    _ => {}
                }
                calls
            });
            if !calls.is_empty() {
                preps.push(ReadPrep {
                    index,
                    member: common::access_name(&member.name(ctx)),
                    calls,
                });
            }
        }
        preps
    }

    pub fn has_detached_prefix_members(&self, ctx: &Context) -> bool {
        self.members
            .iter()
            .any(|m| !m.with_node(ctx, detached_prefix_names).is_empty())
    }

    pub fn has_custom_read_refresh(&self, ctx: &Context) -> bool {
        !self.refresh_steps(ctx).is_empty()
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
            .fold(0usize, usize::saturating_add)
    }

    pub fn max_length(&self, ctx: &Context) -> usize {
        self.members
            .iter()
            .map(|m| m.with_node(ctx, |node| node.max_length(ctx)))
            .fold(0usize, usize::saturating_add)
    }

    pub fn compose_options(&self, ctx: &Context, _mode: OptionsMode) -> Vec<String> {
        let mut options = Vec::new();
        if self.has_detached_prefix_members(ctx) {
            options.push("comms::option::def::HasCustomRead".to_string());
        }
        if self.has_custom_read_refresh(ctx) {
            options.push("comms::option::def::HasCustomRefresh".to_string());
        }
        if self.members_version_dependent(ctx) {
            options.push("comms::option::def::HasVersionDependentMembers".to_string());
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/Bundle.h".to_string());
        out.insert("<tuple>".to_string());
        if self.has_detached_prefix_members(ctx) {
            out.insert("<limits>".to_string());
            out.insert("<type_traits>".to_string());
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
        let members_struct = common::render_members_struct(class_name, "bundle", &defs);

        let mut args = vec![
            common::field_base(ctx, None),
            format!("typename {class_name}{}::All", common::MEMBERS_SUFFIX),
        ];
        args.extend(self.compose_options(ctx, OptionsMode::Full));

        let preps = self.read_preps(ctx);
        let steps = self.refresh_steps(ctx);
        let mut public = vec![members_names_macro(ctx, &self.members)];
        let mut private = Vec::new();
        if !preps.is_empty() {
            public.push(read_entry_body(&preps));
            private.push(read_prepare_bodies(&preps));
        }
        if !steps.is_empty() {
            public.push(refresh_entry_body(&steps));
            private.push(refresh_steps_body(&steps));
        }

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::Bundle", &args),
            members_struct,
            public_body: template::join(&public, "\n"),
            private_body: template::join(&private, "\n"),
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

/// Sibling names referenced as detached prefixes by the given node.
fn detached_prefix_names(node: &FieldNode) -> Vec<String> {
    let mut names = Vec::new();
    match node {
        FieldNode::String(f) => {
            if !f.desc.detached_prefix_name.is_empty() {
                names.push(f.desc.detached_prefix_name.clone());
            }
        }
        FieldNode::Data(f) => {
            if !f.desc.detached_prefix_name.is_empty() {
                names.push(f.desc.detached_prefix_name.clone());
            }
        }
        FieldNode::List(f) => {
            for name in [
                &f.desc.detached_count_prefix_name,
                &f.desc.detached_length_prefix_name,
                &f.desc.detached_elem_length_prefix_name,
            ] {
                if !name.is_empty() {
                    names.push(name.clone());
                }
            }
        }
        _ => {}
    }
    names
}

/// Custom `read()` that decodes up to each prepared member, runs its
/// `readPrepare_*()` forcing step and resumes from that member.
fn read_entry_body(preps: &[ReadPrep]) -> String {
    let mut reads: Vec<String> = Vec::new();
    let mut prev: Option<&str> = None;
    for prep in preps {
        let prep_call = format!("readPrepare_{}();", prep.member);
        if prep.index == 0 {
            reads.push(prep_call);
            continue;
        }
        let read_stmt = match prev {
            None => format!(
                "es = Base::template readUntilAndUpdateLen<FieldIdx_{}>(iter, len);",
                prep.member
            ),
            Some(prev) => format!(
                "es = Base::template readFromUntilAndUpdateLen<FieldIdx_{prev}, \
                 FieldIdx_{}>(iter, len);",
                prep.member
            ),
        };
        reads.push(format!(
            "{read_stmt}\nif (es != comms::ErrorStatus::Success) {{\n    \
             break;\n}}\n\n{prep_call}"
        ));
        prev = Some(&prep.member);
    }
    match prev {
        None => reads.push("es = Base::read(iter, len);".to_string()),
        Some(prev) => {
            reads.push(format!("es = Base::template readFrom<FieldIdx_{prev}>(iter, len);"))
        }
    }

    let mut repl = ReplacementMap::new();
    repl.insert("READS".to_string(), reads.join("\n"));
    template::render(
        "/// @brief Custom read functionality.\n\
         template <typename TIter>\n\
         comms::ErrorStatus read(TIter& iter, std::size_t len)\n\
         {\n\
         \x20   auto es = comms::ErrorStatus::Success;\n\
         \x20   do {\n\
         \x20       #^#READS#$#\n\
         \x20   } while (false);\n\
         \x20   return es;\n\
         }\n",
        &repl,
    )
}

fn read_prepare_bodies(preps: &[ReadPrep]) -> String {
    let bodies: Vec<String> = preps
        .iter()
        .map(|prep| {
            let calls: Vec<String> = prep
                .calls
                .iter()
                .map(|(prefix, func)| {
                    format!(
                        "field_{}().{func}(\n    \
                         static_cast<std::size_t>(field_{prefix}().value()));",
                        prep.member
                    )
                })
                .collect();
            let mut repl = ReplacementMap::new();
            repl.insert("MEMBER".to_string(), prep.member.clone());
            repl.insert("CALLS".to_string(), calls.join("\n"));
            template::render(
                "void readPrepare_#^#MEMBER#$#()\n\
                 {\n\
                 \x20   #^#CALLS#$#\n\
                 }\n",
                &repl,
            )
        })
        .collect();
    template::join(&bodies, "\n")
}

fn refresh_entry_body(steps: &[RefreshStep]) -> String {
    let calls: Vec<String> = steps
        .iter()
        .map(|step| {
            let member = match step {
                RefreshStep::DetachedPrefix { member, .. } => member,
                RefreshStep::OptionalMode { member, .. } => member,
            };
            format!("updated = refresh_{member}() || updated;")
        })
        .collect();

    let mut repl = ReplacementMap::new();
    repl.insert("CALLS".to_string(), calls.join("\n"));
    template::render(
        "/// @brief Custom refresh functionality.\n\
         bool refresh()\n\
         {\n\
         \x20   bool updated = Base::refresh();\n\
         \x20   #^#CALLS#$#\n\
         \x20   return updated;\n\
         }\n",
        &repl,
    )
}

fn refresh_steps_body(steps: &[RefreshStep]) -> String {
    let bodies: Vec<String> = steps
        .iter()
        .map(|step| match step {
            RefreshStep::DetachedPrefix { member, prefix, real_value } => {
                let mut repl = ReplacementMap::new();
                repl.insert("MEMBER".to_string(), member.clone());
                repl.insert("PREFIX".to_string(), prefix.clone());
                repl.insert("REAL_VALUE".to_string(), real_value.to_string());
                template::render(
                    "bool refresh_#^#MEMBER#$#()\n\
                     {\n\
                     \x20   auto expectedValue = \
                     static_cast<std::size_t>(field_#^#PREFIX#$#().value());\n\
                     \x20   auto realValue = \
                     static_cast<std::size_t>(field_#^#MEMBER#$#().#^#REAL_VALUE#$#);\n\
                     \x20   if (expectedValue == realValue) {\n\
                     \x20       return false;\n\
                     \x20   }\n\
                     \n\
                     \x20   using PrefixValueType = typename std::decay<\n\
                     \x20       decltype(field_#^#PREFIX#$#().value())>::type;\n\
                     \x20   auto maxValue = static_cast<std::size_t>(\n\
                     \x20       std::numeric_limits<PrefixValueType>::max());\n\
                     \x20   if (maxValue < realValue) {\n\
                     \x20       realValue = maxValue;\n\
                     \x20   }\n\
                     \x20   field_#^#PREFIX#$#().value() = \
                     static_cast<PrefixValueType>(realValue);\n\
                     \x20   return true;\n\
                     }\n",
                    &repl,
                )
            }
            RefreshStep::OptionalMode { member, check } => {
                let mut repl = ReplacementMap::new();
                repl.insert("MEMBER".to_string(), member.clone());
                repl.insert("CHECK".to_string(), check.clone());
                template::render(
                    "bool refresh_#^#MEMBER#$#()\n\
                     {\n\
                     \x20   auto mode = comms::field::OptionalMode::Missing;\n\
                     \x20   if (#^#CHECK#$#) {\n\
                     \x20       mode = comms::field::OptionalMode::Exists;\n\
                     \x20   }\n\
                     \n\
                     \x20   if (field_#^#MEMBER#$#().getMode() == mode) {\n\
                     \x20       return false;\n\
                     \x20   }\n\
                     \n\
                     \x20   field_#^#MEMBER#$#().setMode(mode);\n\
                     \x20   return true;\n\
                     }\n",
                    &repl,
                )
            }
        })
        .collect();
    template::join(&bodies, "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, CustomCode};
    use crate::schema::{ParsedField, NOT_YET_DEPRECATED};

    fn bundle_node(json: &str) -> FieldNode {
        let parsed: ParsedField = serde_json::from_str(json).unwrap();
        FieldNode::from_parsed(&parsed)
    }

    #[test]
    fn detached_count_prefix_generates_refresh() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bundle_node(
            r#"{
                "name": "block",
                "kind": "bundle",
                "members": [
                    {"name": "count", "kind": "int", "type": "uint8"},
                    {"name": "elems", "kind": "list",
                     "element": {"name": "elem", "kind": "int", "type": "uint16"},
                     "detached_count_prefix_name": "count"}
                ]
            }"#,
        );
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();

        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(options.contains(&"comms::option::def::HasCustomRefresh".to_string()));

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("bool refresh()"));
        assert!(out.contains("bool refresh_elems()"));
        assert!(out.contains("field_count().value()"));
        assert!(out.contains("field_elems().value().size()"));
        assert!(out.contains("std::numeric_limits<PrefixValueType>::max()"));

        let FieldNode::Bundle(bundle) = &node else { panic!("wrong kind") };
        assert!(bundle.has_custom_read_refresh(&ctx));
    }

    #[test]
    fn detached_count_prefix_generates_read_preparation() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bundle_node(
            r#"{
                "name": "block",
                "kind": "bundle",
                "members": [
                    {"name": "count", "kind": "int", "type": "uint8"},
                    {"name": "elems", "kind": "list",
                     "element": {"name": "elem", "kind": "int", "type": "uint16"},
                     "detached_count_prefix_name": "count"}
                ]
            }"#,
        );
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();

        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(options.contains(&"comms::option::def::HasCustomRead".to_string()));

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("comms::ErrorStatus read(TIter& iter, std::size_t len)"));
        assert!(out.contains("void readPrepare_elems()"));
        assert!(out.contains("field_elems().forceReadElemCount("));
        assert!(out.contains("static_cast<std::size_t>(field_count().value())"));
        assert!(out
            .contains("es = Base::template readUntilAndUpdateLen<FieldIdx_elems>(iter, len);"));
        assert!(out.contains("es = Base::template readFrom<FieldIdx_elems>(iter, len);"));
    }

    #[test]
    fn detached_length_prefix_forces_read_length() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bundle_node(
            r#"{
                "name": "block",
                "kind": "bundle",
                "members": [
                    {"name": "len", "kind": "int", "type": "uint16"},
                    {"name": "payload", "kind": "data",
                     "detached_prefix_name": "len"}
                ]
            }"#,
        );
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("void readPrepare_payload()"));
        assert!(out.contains("field_payload().forceReadLength("));
        assert!(out.contains("static_cast<std::size_t>(field_len().value())"));
    }

    #[test]
    fn optional_only_refresh_keeps_generic_read() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bundle_node(
            r#"{
                "name": "block",
                "kind": "bundle",
                "members": [
                    {"name": "flags", "kind": "set", "length": 1,
                     "bits": [{"name": "extraPresent", "idx": 0}]},
                    {"name": "extra", "kind": "optional",
                     "field": {"name": "value", "kind": "int", "type": "uint32"},
                     "cond": "$flags.extraPresent"}
                ]
            }"#,
        );
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();

        let options = node.compose_options(&ctx, OptionsMode::Full);
        assert!(options.contains(&"comms::option::def::HasCustomRefresh".to_string()));
        assert!(!options.contains(&"comms::option::def::HasCustomRead".to_string()));

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(!out.contains("readPrepare_"));
    }

    #[test]
    fn detached_prefix_must_name_sibling() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bundle_node(
            r#"{
                "name": "block",
                "kind": "bundle",
                "members": [
                    {"name": "elems", "kind": "list",
                     "element": {"name": "elem", "kind": "int", "type": "uint16"},
                     "detached_count_prefix_name": "missing"}
                ]
            }"#,
        );
        assert!(node.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }

    #[test]
    fn optional_member_condition_rendered_into_refresh() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bundle_node(
            r#"{
                "name": "block",
                "kind": "bundle",
                "members": [
                    {"name": "flags", "kind": "set", "length": 1,
                     "bits": [{"name": "extraPresent", "idx": 0}]},
                    {"name": "extra", "kind": "optional",
                     "field": {"name": "value", "kind": "int", "type": "uint32"},
                     "cond": "$flags.extraPresent"}
                ]
            }"#,
        );
        node.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("bool refresh_extra()"));
        assert!(out.contains("field_flags().getBitValue_extraPresent()"));
        assert!(out.contains("comms::field::OptionalMode::Exists"));
    }

    #[test]
    fn unresolved_condition_reference_is_an_error() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bundle_node(
            r#"{
                "name": "block",
                "kind": "bundle",
                "members": [
                    {"name": "extra", "kind": "optional",
                     "field": {"name": "value", "kind": "int", "type": "uint32"},
                     "cond": "$flags.extraPresent"}
                ]
            }"#,
        );
        assert!(node.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }

    #[test]
    fn duplicate_member_class_names_rejected() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut node = bundle_node(
            r#"{
                "name": "block",
                "kind": "bundle",
                "members": [
                    {"name": "my_field", "kind": "int", "type": "uint8"},
                    {"name": "myField", "kind": "int", "type": "uint8"}
                ]
            }"#,
        );
        assert!(node.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }
}
