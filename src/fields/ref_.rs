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

//! Reference fields: aliases to registered top-level fields.

use super::common::{self, ClassDef};
use super::{FieldBase, OptionsMode};
use crate::context::Context;
use crate::diagnostics::{self, Diagnostics, ErrorCode};
use crate::schema::{RefDesc, Version};
use crate::template::{self, ReplacementMap};
use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct RefField {
    pub base: FieldBase,
    pub desc: RefDesc,
}

impl RefField {
    pub fn new(base: FieldBase, desc: RefDesc) -> RefField {
        RefField { base, desc }
    }

    pub fn prepare(
        &mut self,
        ctx: &Context,
        _since: Version,
        _deprecated: Version,
    ) -> Result<(), Diagnostics> {
        if ctx.lookup(&self.desc.target).is_none() {
            return Err(diagnostics::error(
                ErrorCode::UndeclaredFieldReference,
                &self.base.name,
                format!("references undefined field `{}`", self.desc.target),
            ));
        }
        Ok(())
    }

    pub fn target_version_dependent(&self, ctx: &Context) -> bool {
        ctx.resolve(&self.desc.target).is_version_dependent(ctx)
    }

    pub fn min_length(&self, ctx: &Context) -> usize {
        ctx.resolve(&self.desc.target).min_length(ctx)
    }

    pub fn max_length(&self, ctx: &Context) -> usize {
        ctx.resolve(&self.desc.target).max_length(ctx)
    }

    pub fn compose_options(&self, ctx: &Context, _mode: OptionsMode) -> Vec<String> {
        ctx.mark_used(&self.desc.target);
        common::custom_hook_options(ctx, &self.base.external_ref)
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        ctx.mark_used(&self.desc.target);
        let target = ctx.resolve(&self.desc.target);
        out.insert(format!(
            "{}/field/{}.h",
            ctx.config.main_namespace,
            target.class_name()
        ));
    }

    /// Aliases render as `using` declarations, not classes.
    pub fn alias_definition(&self, ctx: &Context, class_name: &str) -> String {
        ctx.mark_used(&self.desc.target);
        let target = ctx.resolve(&self.desc.target);
        let mut repl = ReplacementMap::new();
        repl.insert("DISPLAY".to_string(), self.base.display_name().to_string());
        repl.insert("CLASS_NAME".to_string(), class_name.to_string());
        repl.insert("NS".to_string(), ctx.config.main_namespace.clone());
        repl.insert("TARGET".to_string(), target.class_name());
        template::render(
            "/// @brief Definition of <b>\"#^#DISPLAY#$#\"</b> field, alias to @ref \
             #^#NS#$#::field::#^#TARGET#$#.\n\
             using #^#CLASS_NAME#$# = #^#NS#$#::field::#^#TARGET#$#;\n",
            &repl,
        )
    }

    // Only reachable when an alias ends up version-optional; the wrapper
    // still needs a class-shaped inner definition.
    pub fn class_def(&self, ctx: &Context, _scope: &str, class_name: &str) -> ClassDef {
        let target = ctx.resolve(&self.desc.target);
        ctx.mark_used(&self.desc.target);
        ClassDef {
            class_name: class_name.to_string(),
            display_name: self.base.display_name().to_string(),
            description: self.base.description.clone(),
            base: format!(
                "{}::field::{}",
                ctx.config.main_namespace,
                target.class_name()
            ),
            members_struct: String::new(),
            public_body: String::new(),
            private_body: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, CustomCode};
    use crate::fields::FieldNode;
    use crate::schema::{ParsedField, NOT_YET_DEPRECATED};
    use std::rc::Rc;

    fn node(json: &str) -> FieldNode {
        let parsed: ParsedField = serde_json::from_str(json).unwrap();
        FieldNode::from_parsed(&parsed)
    }

    fn ctx_with_target() -> Context {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut target = node(
            r#"{"name": "sessionId", "kind": "int", "type": "uint16",
                "external_ref": "field.SessionId"}"#,
        );
        target.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();
        ctx.register(Rc::new(target));
        ctx
    }

    #[test]
    fn alias_to_registered_field() {
        let ctx = ctx_with_target();
        let mut alias = node(
            r#"{"name": "session", "kind": "ref", "target": "field.SessionId"}"#,
        );
        alias.prepare(&ctx, 0, NOT_YET_DEPRECATED).unwrap();
        assert_eq!(alias.min_length(&ctx), 2);

        let out = alias.class_definition(&ctx, "protocol::field");
        assert!(out.contains("using Session = protocol::field::SessionId;"));
        assert!(ctx.is_used("field.SessionId"));
    }

    #[test]
    fn undefined_target_is_hard_error() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        let mut alias =
            node(r#"{"name": "session", "kind": "ref", "target": "field.Missing"}"#);
        assert!(alias.prepare(&ctx, 0, NOT_YET_DEPRECATED).is_err());
    }
}
