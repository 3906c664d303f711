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

//! Optional fields wrapping a single inner field.
//!
//! The activation condition is parsed here; it resolves against sibling
//! fields, so the owning bundle validates it once all members are
//! prepared.

use super::common::{self, ClassDef};
use super::{FieldBase, Member, OptionsMode};
use crate::cond::{self, CondExpr};
use crate::context::Context;
use crate::diagnostics::{self, Diagnostics, ErrorCode};
use crate::schema::{Cond, OptionalDesc, OptionalMode, Version};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct OptionalField {
    pub base: FieldBase,
    pub default_mode: OptionalMode,
    /// Activation condition, parsed during `prepare`.
    pub cond: Option<CondExpr>,
    raw_cond: Option<Cond>,
    inner: Member,
}

impl OptionalField {
    pub fn new(base: FieldBase, desc: &OptionalDesc) -> OptionalField {
        OptionalField {
            base,
            default_mode: desc.default_mode,
            cond: None,
            raw_cond: desc.cond.clone(),
            inner: Member::from_parsed(desc.field.as_ref()),
        }
    }

    pub fn prepare(
        &mut self,
        ctx: &Context,
        since: Version,
        deprecated: Version,
    ) -> Result<(), Diagnostics> {
        self.inner.prepare(ctx, since, deprecated)?;
        if let Some(raw) = &self.raw_cond {
            match cond::from_schema(raw) {
                Ok(expr) => self.cond = Some(expr),
                Err(message) => {
                    return Err(diagnostics::error(
                        ErrorCode::InvalidConditionSyntax,
                        &self.base.name,
                        message,
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn inner_version_dependent(&self, ctx: &Context) -> bool {
        self.inner
            .with_node(ctx, |node| node.is_version_dependent(ctx))
    }

    pub fn min_length(&self, _ctx: &Context) -> usize {
        0
    }

    pub fn max_length(&self, ctx: &Context) -> usize {
        self.inner.with_node(ctx, |node| node.max_length(ctx))
    }

    pub fn compose_options(&self, ctx: &Context, _mode: OptionsMode) -> Vec<String> {
        let mut options = Vec::new();
        match self.default_mode {
            // Tentative is what the wrapped field defaults to anyway.
            OptionalMode::Tentative => {}
            OptionalMode::Missing => {
                options.push("comms::option::def::MissingByDefault".to_string())
            }
            OptionalMode::Exists => {
                options.push("comms::option::def::ExistsByDefault".to_string())
            }
        }
        options.extend(common::custom_hook_options(ctx, &self.base.external_ref));
        options
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        out.insert("comms/field/Optional.h".to_string());
        self.inner.add_includes(ctx, out);
    }

    pub fn class_def(&self, ctx: &Context, scope: &str, class_name: &str) -> ClassDef {
        let member_scope = common::member_scope(scope, class_name);
        let defs = vec![self.inner.member_definition(ctx, &member_scope)];
        let members_struct = common::render_members_struct(class_name, "optional", &defs);

        let mut args = vec![format!(
            "typename {class_name}{}::{}",
            common::MEMBERS_SUFFIX,
            self.inner.class_name(ctx)
        )];
        args.extend(self.compose_options(ctx, OptionsMode::Full));

        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: common::base_type("comms::field::Optional", &args),
            members_struct,
            public_body: String::new(),
            private_body: String::new(),
        }
    }
}
