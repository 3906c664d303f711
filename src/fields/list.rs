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

//! List fields: homogeneous element sequences with optional count,
//! length and per-element length prefixes.

use super::common::{self, ClassDef};
use super::{FieldBase, Member, OptionsMode, MAX_POSSIBLE_LENGTH};
use crate::context::Context;
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::schema::{ListDesc, Version};
use crate::template::{self, ReplacementMap};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct ListField {
    pub base: FieldBase,
    pub desc: ListDesc,
    element: Member,
    count_prefix: Option<Member>,
    length_prefix: Option<Member>,
    elem_length_prefix: Option<Member>,
}

impl ListField {
    pub fn new(base: FieldBase, desc: &ListDesc) -> ListField {
        ListField {
            base,
            element: Member::from_parsed(desc.element.as_ref()),
            count_prefix: desc.count_prefix.as_deref().map(Member::from_parsed),
            length_prefix: desc.length_prefix.as_deref().map(Member::from_parsed),
            elem_length_prefix: desc.elem_length_prefix.as_deref().map(Member::from_parsed),
            desc: desc.clone(),
        }
    }

    fn owned_members_mut(&mut self) -> Vec<&mut Member> {
        let mut members = vec![&mut self.element];
        members.extend(self.count_prefix.as_mut());
        members.extend(self.length_prefix.as_mut());
        members.extend(self.elem_length_prefix.as_mut());
        members
    }

    fn owned_members(&self) -> Vec<&Member> {
        let mut members = vec![&self.element];
        members.extend(self.count_prefix.as_ref());
        members.extend(self.length_prefix.as_ref());
        members.extend(self.elem_length_prefix.as_ref());
        members
    }

    pub fn prepare(
        &mut self,
        ctx: &Context,
        since: Version,
        deprecated: Version,
    ) -> Result<(), Diagnostics> {
        let mut diags = Diagnostics::default();
        let name = self.base.name.clone();
        for member in self.owned_members_mut() {
            if let Err(sub) = member.prepare(ctx, since, deprecated) {
                diags.merge(sub);
            }
        }
        if !diags.is_empty() {
            return Err(diags);
        }

        if self.count_prefix.is_some() && self.length_prefix.is_some() {
            diags.push_error(
                ErrorCode::StructuralConflict,
                &name,
                "count and serialization length prefixes cannot be combined",
            );
        }
        if self.desc.fixed_count != 0
            && (self.count_prefix.is_some() || self.length_prefix.is_some())
        {
            diags.push_error(
                ErrorCode::StructuralConflict,
                &name,
                "a fixed count list cannot carry a size prefix",
            );
        }

        // Element and prefix classes all land in the same members struct.
        let members = self.owned_members();
        for (idx, member) in members.iter().enumerate() {
            let class = member.class_name(ctx);
            let clash = members[..idx].iter().any(|m| m.class_name(ctx) == class);
            if clash {
                diags.push_error(
                    ErrorCode::StructuralConflict,
                    &name,
                    format!(
                        "element and prefix members collapse onto the same class \
                         name `{class}`"
                    ),
                );
            }
        }
        diags.err_or(())
    }

    pub fn element_version_dependent(&self, ctx: &Context) -> bool {
        self.element
            .with_node(ctx, |node| node.is_version_dependent(ctx))
    }

    pub fn min_length(&self, ctx: &Context) -> usize {
        if self.desc.fixed_count != 0 {
            let elem = self.element.with_node(ctx, |node| node.min_length(ctx));
            return elem.saturating_mul(self.desc.fixed_count);
        }
        let mut len = 0usize;
        for prefix in [&self.count_prefix, &self.length_prefix].into_iter().flatten() {
            len += prefix.with_node(ctx, |node| node.min_length(ctx));
        }
        len
    }

    pub fn max_length(&self, ctx: &Context) -> usize {
        if self.desc.fixed_count != 0 {
            let elem = self.element.with_node(ctx, |node| node.max_length(ctx));
            return elem.saturating_mul(self.desc.fixed_count);
        }
        MAX_POSSIBLE_LENGTH
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
        let members = format!("{class_name}{}", common::MEMBERS_SUFFIX);
        let mut options = Vec::new();
        if self.desc.fixed_count != 0 {
            options.push(format!(
                "comms::option::def::SequenceFixedSize<{}>",
                self.desc.fixed_count
            ));
        }
        if let Some(prefix) = &self.count_prefix {
            options.push(format!(
                "comms::option::def::SequenceSizeFieldPrefix<\n    typename {members}::{}\n>",
                prefix.class_name(ctx)
            ));
        }
        if let Some(prefix) = &self.length_prefix {
            options.push(format!(
                "comms::option::def::SequenceSerLengthFieldPrefix<\n    typename {members}::{}\n>",
                prefix.class_name(ctx)
            ));
        }
        if let Some(prefix) = &self.elem_length_prefix {
            let opt = if self.desc.elem_fixed_length {
                "SequenceElemFixedSerLengthFieldPrefix"
            } else {
                "SequenceElemSerLengthFieldPrefix"
            };
            options.push(format!(
                "comms::option::def::{opt}<\n    typename {members}::{}\n>",
                prefix.class_name(ctx)
            ));
        }
        if !self.desc.detached_count_prefix_name.is_empty() {
            options.push("comms::option::def::SequenceSizeForcingEnabled".to_string());
        }
        if !self.desc.detached_length_prefix_name.is_empty() {
            options.push("comms::option::def::SequenceLengthForcingEnabled".to_string());
        }
        if !self.desc.detached_elem_length_prefix_name.is_empty() {
            options
                .push("comms::option::def::SequenceElemLengthForcingEnabled".to_string());
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/ArrayList.h".to_string());
        for member in self.owned_members() {
            member.add_includes(ctx, out);
        }
    }

    pub fn class_def(&self, ctx: &Context, scope: &str, class_name: &str) -> ClassDef {
        let member_scope = common::member_scope(scope, class_name);
        let defs: Vec<String> = self
            .owned_members()
            .iter()
            .map(|m| m.member_definition(ctx, &member_scope))
            .collect();
        let members_struct = common::render_members_struct(class_name, "list", &defs);

        let mut args = vec![
            common::field_base(ctx, None),
            format!(
                "typename {class_name}{}::{}",
                common::MEMBERS_SUFFIX,
                self.element.class_name(ctx)
            ),
        ];
        args.extend(self.options_with_name(ctx, OptionsMode::Full, class_name));

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::ArrayList", &args),
            members_struct,
            public_body: String::new(),
            private_body: String::new(),
        }
    }
}
