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

//! Field semantic model.
//!
//! `FieldNode` is a closed sum over the twelve schema field kinds. Every
//! capability dispatches through an exhaustive `match`, so adding a kind
//! fails to compile until each capability handles it. A node's life
//! cycle is Constructed, then Prepared (exactly once, children before
//! parent finalization), then stateless re-entrant rendering.

pub mod bitfield;
pub mod bundle;
pub mod common;
pub mod data;
pub mod enum_;
pub mod float;
pub mod int;
pub mod list;
pub mod optional;
pub mod ref_;
pub mod set;
pub mod string;
pub mod variant;

pub use common::{access_name, class_name};

use crate::context::{Context, CustomizationLevel};
use crate::diagnostics::{self, Diagnostics, ErrorCode};
use crate::schema::{FieldDesc, FieldKind, ParsedField, Version, NOT_YET_DEPRECATED};
use crate::template::{self, ReplacementMap};
use std::collections::BTreeSet;

use bitfield::BitfieldField;
use bundle::BundleField;
use data::DataField;
use enum_::EnumField;
use float::FloatField;
use int::IntField;
use list::ListField;
use optional::OptionalField;
use ref_::RefField;
use set::SetField;
use string::StringField;
use variant::VariantField;

/// Length reported for sequences without an upper bound.
pub const MAX_POSSIBLE_LENGTH: usize = u32::MAX as usize;

/// Option composition mode. Reduced composition is used when the field
/// serves as a variant dispatch key type and omits default-value and
/// valid-range options.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OptionsMode {
    Full,
    Reduced,
}

/// Identity and version window shared by every field kind.
#[derive(Debug, Clone)]
pub struct FieldBase {
    pub name: String,
    pub display_name: String,
    pub description: String,
    /// Empty for fields defined inline as members.
    pub external_ref: String,
    pub since_version: Version,
    pub deprecated_since: Version,
    pub deprecated_removed: bool,
    /// Set during `prepare`: the field's window is a strict subset of its
    /// parent's and version-dependent code is enabled.
    pub version_optional: bool,
}

impl FieldBase {
    fn from_parsed(parsed: &ParsedField) -> FieldBase {
        FieldBase {
            name: parsed.name.clone(),
            display_name: parsed.display_name.clone(),
            description: parsed.description.clone(),
            external_ref: parsed.external_ref.clone(),
            since_version: parsed.since_version,
            deprecated_since: parsed.deprecated_since,
            deprecated_removed: parsed.deprecated_removed,
            version_optional: false,
        }
    }

    pub fn display_name(&self) -> &str {
        common::display_name_or(&self.display_name, &self.name)
    }
}

/// Member of a composite field: either owned inline or a reference to a
/// registered top-level field.
#[derive(Debug, Clone)]
pub enum Member {
    Owned(Box<FieldNode>),
    External(String),
}

impl Member {
    pub fn from_parsed(parsed: &ParsedField) -> Member {
        match &parsed.desc {
            FieldDesc::Ref(desc) => Member::External(desc.target.clone()),
            _ => Member::Owned(Box::new(FieldNode::from_parsed(parsed))),
        }
    }

    pub fn prepare(
        &mut self,
        ctx: &Context,
        parent_since: Version,
        parent_deprecated: Version,
    ) -> Result<(), Diagnostics> {
        match self {
            Member::Owned(node) => node.prepare(ctx, parent_since, parent_deprecated),
            Member::External(external_ref) => {
                if ctx.lookup(external_ref).is_none() {
                    return Err(diagnostics::error(
                        ErrorCode::UndeclaredFieldReference,
                        external_ref,
                        "references a field that has not been defined",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Run `f` with the member's resolved node. External lookups must
    /// succeed once preparation passed.
    pub fn with_node<R>(&self, ctx: &Context, f: impl FnOnce(&FieldNode) -> R) -> R {
        match self {
            Member::Owned(node) => f(node),
            Member::External(external_ref) => f(&ctx.resolve(external_ref)),
        }
    }

    pub fn clone_node(&self, ctx: &Context) -> FieldNode {
        self.with_node(ctx, |node| node.clone())
    }

    pub fn name(&self, ctx: &Context) -> String {
        self.with_node(ctx, |node| node.name().to_string())
    }

    pub fn class_name(&self, ctx: &Context) -> String {
        self.with_node(ctx, |node| node.class_name())
    }

    /// Definition text inside the owning `<Name>Members` struct.
    pub fn member_definition(&self, ctx: &Context, scope: &str) -> String {
        match self {
            Member::Owned(node) => node.class_definition(ctx, scope),
            Member::External(external_ref) => {
                ctx.mark_used(external_ref);
                let target = ctx.resolve(external_ref);
                let mut repl = ReplacementMap::new();
                repl.insert("CLASS".to_string(), target.class_name());
                repl.insert("NS".to_string(), ctx.config.main_namespace.clone());
                template::render(
                    "/// @brief Alias of externally defined @ref \
                     #^#NS#$#::field::#^#CLASS#$# field.\n\
                     using #^#CLASS#$# = #^#NS#$#::field::#^#CLASS#$#;\n",
                    &repl,
                )
            }
        }
    }

    pub fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        match self {
            Member::Owned(node) => node.add_includes(ctx, out),
            Member::External(external_ref) => {
                ctx.mark_used(external_ref);
                let target = ctx.resolve(external_ref);
                out.insert(format!(
                    "{}/field/{}.h",
                    ctx.config.main_namespace,
                    target.class_name()
                ));
            }
        }
    }
}

/// Closed sum over the field kinds.
#[derive(Debug, Clone)]
pub enum FieldNode {
    Int(IntField),
    Enum(EnumField),
    Set(SetField),
    Float(FloatField),
    Bitfield(BitfieldField),
    Bundle(BundleField),
    String(StringField),
    Data(DataField),
    List(ListField),
    Ref(RefField),
    Optional(OptionalField),
    Variant(VariantField),
}

macro_rules! dispatch {
    ($node:expr, $field:ident => $body:expr) => {
        match $node {
            FieldNode::Int($field) => $body,
            FieldNode::Enum($field) => $body,
            FieldNode::Set($field) => $body,
            FieldNode::Float($field) => $body,
            FieldNode::Bitfield($field) => $body,
            FieldNode::Bundle($field) => $body,
            FieldNode::String($field) => $body,
            FieldNode::Data($field) => $body,
            FieldNode::List($field) => $body,
            FieldNode::Ref($field) => $body,
            FieldNode::Optional($field) => $body,
            FieldNode::Variant($field) => $body,
        }
    };
}

impl FieldNode {
    pub fn from_parsed(parsed: &ParsedField) -> FieldNode {
        let base = FieldBase::from_parsed(parsed);
        match &parsed.desc {
            FieldDesc::Int(desc) => FieldNode::Int(IntField::new(base, desc.clone())),
            FieldDesc::Enum(desc) => FieldNode::Enum(EnumField::new(base, desc.clone())),
            FieldDesc::Set(desc) => FieldNode::Set(SetField::new(base, desc.clone())),
            FieldDesc::Float(desc) => FieldNode::Float(FloatField::new(base, desc.clone())),
            FieldDesc::Bitfield(desc) => {
                FieldNode::Bitfield(BitfieldField::new(base, desc))
            }
            FieldDesc::Bundle(desc) => FieldNode::Bundle(BundleField::new(base, desc)),
            FieldDesc::String(desc) => {
                FieldNode::String(StringField::new(base, desc.clone()))
            }
            FieldDesc::Data(desc) => FieldNode::Data(DataField::new(base, desc.clone())),
            FieldDesc::List(desc) => FieldNode::List(ListField::new(base, desc)),
            FieldDesc::Ref(desc) => FieldNode::Ref(RefField::new(base, desc.clone())),
            FieldDesc::Optional(desc) => {
                FieldNode::Optional(OptionalField::new(base, desc))
            }
            FieldDesc::Variant(desc) => FieldNode::Variant(VariantField::new(base, desc)),
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldNode::Int(_) => FieldKind::Int,
            FieldNode::Enum(_) => FieldKind::Enum,
            FieldNode::Set(_) => FieldKind::Set,
            FieldNode::Float(_) => FieldKind::Float,
            FieldNode::Bitfield(_) => FieldKind::Bitfield,
            FieldNode::Bundle(_) => FieldKind::Bundle,
            FieldNode::String(_) => FieldKind::String,
            FieldNode::Data(_) => FieldKind::Data,
            FieldNode::List(_) => FieldKind::List,
            FieldNode::Ref(_) => FieldKind::Ref,
            FieldNode::Optional(_) => FieldKind::Optional,
            FieldNode::Variant(_) => FieldKind::Variant,
        }
    }

    pub fn base(&self) -> &FieldBase {
        dispatch!(self, f => &f.base)
    }

    fn base_mut(&mut self) -> &mut FieldBase {
        dispatch!(self, f => &mut f.base)
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn class_name(&self) -> String {
        common::class_name(&self.base().name)
    }

    pub fn external_ref(&self) -> &str {
        &self.base().external_ref
    }

    /// Prepare the node within its parent's version window. Called exactly
    /// once, children before parent finalization.
    pub fn prepare(
        &mut self,
        ctx: &Context,
        parent_since: Version,
        parent_deprecated: Version,
    ) -> Result<(), Diagnostics> {
        let version_optional =
            self.compute_version_optional(ctx, parent_since, parent_deprecated);
        self.base_mut().version_optional = version_optional;
        let since = self.base().since_version;
        let deprecated = self.base().deprecated_since;
        dispatch!(self, f => f.prepare(ctx, since, deprecated))
    }

    fn compute_version_optional(
        &self,
        ctx: &Context,
        parent_since: Version,
        parent_deprecated: Version,
    ) -> bool {
        let base = self.base();
        if !ctx.config.version_dependent_code {
            return false;
        }
        if !ctx.element_optional(
            base.since_version,
            base.deprecated_since,
            base.deprecated_removed,
        ) {
            return false;
        }
        // Only a window strictly inside the parent's needs a wrapper of
        // its own; otherwise the parent already gates existence.
        parent_since < base.since_version
            || (base.deprecated_removed
                && base.deprecated_since < NOT_YET_DEPRECATED
                && base.deprecated_since < parent_deprecated)
    }

    pub fn is_version_optional(&self) -> bool {
        self.base().version_optional
    }

    /// True when generated code for this field varies with the runtime
    /// protocol version.
    pub fn is_version_dependent(&self, ctx: &Context) -> bool {
        if !ctx.config.version_dependent_code {
            return false;
        }
        if self.base().version_optional {
            return true;
        }
        match self {
            FieldNode::Int(f) => f.has_version_based_ranges(ctx),
            FieldNode::Float(f) => f.has_version_based_ranges(ctx),
            FieldNode::Enum(f) => f.is_version_dependent_values(),
            FieldNode::Bitfield(f) => f.members_version_dependent(ctx),
            FieldNode::Bundle(f) => f.members_version_dependent(ctx),
            FieldNode::Variant(f) => f.members_version_dependent(ctx),
            FieldNode::List(f) => f.element_version_dependent(ctx),
            FieldNode::Optional(f) => f.inner_version_dependent(ctx),
            FieldNode::Ref(f) => f.target_version_dependent(ctx),
            _ => false,
        }
    }

    /// Minimal serialization length in bytes. Version-optional fields can
    /// be absent entirely.
    pub fn min_length(&self, ctx: &Context) -> usize {
        if self.base().version_optional {
            return 0;
        }
        dispatch!(self, f => f.min_length(ctx))
    }

    pub fn max_length(&self, ctx: &Context) -> usize {
        dispatch!(self, f => f.max_length(ctx))
    }

    pub fn compose_options(&self, ctx: &Context, mode: OptionsMode) -> Vec<String> {
        dispatch!(self, f => f.compose_options(ctx, mode))
    }

    /// Include tokens required by this field's definition. Tokens wrapped
    /// in `<>` are system includes.
    pub fn includes(&self, ctx: &Context) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        out.insert("comms/options.h".to_string());
        out.insert(format!("{}/field/FieldBase.h", ctx.config.main_namespace));
        if self.base().version_optional {
            out.insert("comms/field/Optional.h".to_string());
        }
        self.add_includes(ctx, &mut out);
        out
    }

    fn add_includes(&self, ctx: &Context, out: &mut BTreeSet<String>) {
        dispatch!(self, f => f.add_includes(ctx, out))
    }

    /// Full structural definition of the field class.
    pub fn class_definition(&self, ctx: &Context, scope: &str) -> String {
        let class_name = self.class_name();
        if let FieldNode::Ref(f) = self {
            // Plain aliases need no class of their own. A version-optional
            // alias still goes through the wrapper below.
            if !self.base().version_optional {
                return f.alias_definition(ctx, &class_name);
            }
        }
        if !self.base().version_optional {
            let mut def = dispatch!(self, f => f.class_def(ctx, scope, &class_name));
            self.append_custom_hooks(ctx, &mut def);
            return common::render_class(&def);
        }

        // A version-optional field keeps its definition under an inner
        // name and publishes an Optional wrapper under its own.
        let inner_name = format!("{class_name}Field");
        let mut inner = dispatch!(self, f => f.class_def(ctx, scope, &inner_name));
        self.append_custom_hooks(ctx, &mut inner);
        let inner_text = common::render_class(&inner);
        self.render_version_optional_wrapper(ctx, &class_name, &inner_name, inner_text)
    }

    fn append_custom_hooks(&self, ctx: &Context, def: &mut common::ClassDef) {
        let hooks = common::custom_hooks_body(ctx, self.external_ref());
        if hooks.is_empty() {
            return;
        }
        let parts = [def.public_body.clone(), hooks];
        def.public_body = template::join(&parts, "\n");
    }

    fn render_version_optional_wrapper(
        &self,
        ctx: &Context,
        class_name: &str,
        inner_name: &str,
        inner_text: String,
    ) -> String {
        let base = self.base();
        let exists_now = ctx.element_exists(
            base.since_version,
            base.deprecated_since,
            base.deprecated_removed,
        );
        let mode = if exists_now {
            "comms::option::def::ExistsByDefault"
        } else {
            "comms::option::def::MissingByDefault"
        };
        let versions = if base.deprecated_since == NOT_YET_DEPRECATED {
            format!("comms::option::def::ExistsSinceVersion<{}>", base.since_version)
        } else if base.since_version == 0 {
            format!(
                "comms::option::def::ExistsUntilVersion<{}>",
                base.deprecated_since.saturating_sub(1)
            )
        } else {
            format!(
                "comms::option::def::ExistsBetweenVersions<{}, {}>",
                base.since_version,
                base.deprecated_since.saturating_sub(1)
            )
        };

        const TEMPL: &str = "\
#^#INNER#$#
/// @brief Definition of version dependent <b>\"#^#DISPLAY#$#\"</b> field.
struct #^#CLASS_NAME#$# : public
    comms::field::Optional<
        #^#INNER_NAME#$#,
        #^#MODE#$#,
        #^#VERSIONS#$#
    >
{
    /// @brief Name of the field.
    static const char* name()
    {
        return #^#INNER_NAME#$#::name();
    }
};
";
        let mut repl = ReplacementMap::new();
        repl.insert("INNER".to_string(), inner_text);
        repl.insert("DISPLAY".to_string(), base.display_name().to_string());
        repl.insert("CLASS_NAME".to_string(), class_name.to_string());
        repl.insert("INNER_NAME".to_string(), inner_name.to_string());
        repl.insert("MODE".to_string(), mode.to_string());
        repl.insert("VERSIONS".to_string(), versions);
        template::render(TEMPL, &repl)
    }

    /// Template-parameter-independent definition shared by all instances.
    pub fn common_definition(&self, ctx: &Context) -> String {
        let extra = match self {
            FieldNode::Enum(f) => f.common_extra(ctx),
            FieldNode::Set(f) => f.common_extra(),
            _ => String::new(),
        };

        const TEMPL: &str = "\
/// @brief Common types and functions for @ref #^#CLASS_NAME#$# field.
struct #^#CLASS_NAME#$#Common
{
    #^#EXTRA#$#
    /// @brief Name of the field.
    static const char* name()
    {
        return #^#NAME_STR#$#;
    }
};
";
        let mut repl = ReplacementMap::new();
        repl.insert("CLASS_NAME".to_string(), self.class_name());
        repl.insert("EXTRA".to_string(), extra);
        repl.insert(
            "NAME_STR".to_string(),
            format!("\"{}\"", self.base().display_name()),
        );
        template::render(TEMPL, &repl)
    }

    /// True when the active customization level exposes override hooks
    /// for this field.
    pub fn is_customizable(&self, ctx: &Context) -> bool {
        if self.external_ref().is_empty() {
            return false;
        }
        match ctx.config.customization {
            CustomizationLevel::None => false,
            CustomizationLevel::Full => true,
            CustomizationLevel::Limited => match self {
                FieldNode::String(_) | FieldNode::Data(_) | FieldNode::List(_) => true,
                FieldNode::Bundle(f) => f.has_detached_prefix_members(ctx),
                FieldNode::Variant(_) => true,
                _ => false,
            },
        }
    }

    /// Options-struct fragment allowing per-field type replacement.
    pub fn default_options(&self, ctx: &Context, scope: &str) -> String {
        if !self.is_customizable(ctx) {
            return String::new();
        }
        let mut repl = ReplacementMap::new();
        repl.insert("CLASS_NAME".to_string(), self.class_name());
        repl.insert("SCOPE".to_string(), scope.to_string());
        template::render(
            "/// @brief Extra options for @ref #^#SCOPE#$#::#^#CLASS_NAME#$# field.\n\
             using #^#CLASS_NAME#$# = comms::option::app::EmptyOption;\n",
            &repl,
        )
    }

    /// Options-struct fragment for bare-metal builds, pinning dynamic
    /// storage to fixed sizes.
    pub fn bare_metal_default_options(&self, ctx: &Context, scope: &str) -> String {
        if !self.is_customizable(ctx) {
            return String::new();
        }
        let storage = match self {
            FieldNode::String(_) => {
                Some("comms::option::app::FixedSizeStorage<DEFAULT_SEQ_FIXED_STORAGE_SIZE>")
            }
            FieldNode::Data(_) => {
                Some("comms::option::app::FixedSizeStorage<DEFAULT_SEQ_FIXED_STORAGE_SIZE>")
            }
            FieldNode::List(_) => {
                Some("comms::option::app::FixedSizeStorage<DEFAULT_SEQ_FIXED_STORAGE_SIZE>")
            }
            _ => None,
        };
        let Some(storage) = storage else {
            return self.default_options(ctx, scope);
        };
        let mut repl = ReplacementMap::new();
        repl.insert("CLASS_NAME".to_string(), self.class_name());
        repl.insert("SCOPE".to_string(), scope.to_string());
        repl.insert("STORAGE".to_string(), storage.to_string());
        template::render(
            "/// @brief Extra options for @ref #^#SCOPE#$#::#^#CLASS_NAME#$# field.\n\
             using #^#CLASS_NAME#$# = #^#STORAGE#$#;\n",
            &repl,
        )
    }

    /// Property-descriptor code for the GUI consumer.
    pub fn plugin_properties(&self, _ctx: &Context, scope: &str) -> String {
        let extras = match self {
            FieldNode::Enum(f) => f.plugin_extra_props(),
            FieldNode::Set(f) => f.plugin_extra_props(),
            _ => Vec::new(),
        };
        let mut setters = vec![format!(".name(\"{}\")", self.base().display_name())];
        setters.extend(extras);

        const TEMPL: &str = "\
static QVariantMap createProps_#^#ACCESS_NAME#$#()
{
    using Field = #^#SCOPE#$#::#^#CLASS_NAME#$#;
    return
        cc::property::field::ForField<Field>()
            #^#SETTERS#$#
            .asMap();
}
";
        let mut repl = ReplacementMap::new();
        repl.insert("ACCESS_NAME".to_string(), access_name(self.name()));
        repl.insert("CLASS_NAME".to_string(), self.class_name());
        repl.insert("SCOPE".to_string(), scope.to_string());
        repl.insert("SETTERS".to_string(), setters.join("\n"));
        template::render(TEMPL, &repl)
    }

    /// Look up an immediate member of a composite field by schema name.
    pub fn member_clone(&self, ctx: &Context, name: &str) -> Option<FieldNode> {
        let members: &[Member] = match self {
            FieldNode::Bitfield(f) => &f.members,
            FieldNode::Bundle(f) => &f.members,
            FieldNode::Variant(f) => &f.members,
            _ => return None,
        };
        members
            .iter()
            .find(|m| m.name(ctx) == name)
            .map(|m| m.clone_node(ctx))
    }

    /// True for a set field declaring the named bit.
    pub fn has_bit(&self, name: &str) -> bool {
        match self {
            FieldNode::Set(f) => f.desc.bits.iter().any(|b| b.name == name),
            _ => false,
        }
    }

    /// Interpret a condition literal in this field's value domain and
    /// render it as a C++ literal.
    pub fn parse_literal(&self, text: &str) -> Result<String, String> {
        match self {
            FieldNode::Int(f) => f.parse_literal(text),
            FieldNode::Enum(f) => f.parse_literal(text),
            FieldNode::Float(f) => f.parse_literal(text),
            FieldNode::String(_) => Ok(format!("\"{text}\"")),
            _ => Err(format!(
                "{:?} fields do not support literal comparison",
                self.kind()
            )),
        }
    }
}

/// Parse a numeric literal in a condition expression: decimal or `0x`
/// prefixed hexadecimal, with an optional sign.
pub(crate) fn parse_int_literal(text: &str) -> Result<i128, String> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i128::from_str_radix(hex, 16)
    } else {
        digits.parse::<i128>()
    }
    .map_err(|_| format!("`{trimmed}` is not a valid integer literal"))?;
    Ok(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, CustomCode};
    use crate::schema;

    fn parse_field(json: &str) -> ParsedField {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn kind_dispatch_covers_every_kind() {
        let samples = [
            r#"{"name": "a", "kind": "int", "type": "uint8"}"#,
            r#"{"name": "b", "kind": "enum", "type": "uint8", "values": []}"#,
            r#"{"name": "c", "kind": "set", "length": 1, "bits": []}"#,
            r#"{"name": "d", "kind": "float", "type": "double"}"#,
            r#"{"name": "e", "kind": "bitfield", "members": []}"#,
            r#"{"name": "f", "kind": "bundle", "members": []}"#,
            r#"{"name": "g", "kind": "string"}"#,
            r#"{"name": "h", "kind": "data"}"#,
            r#"{"name": "i", "kind": "list",
                "element": {"name": "elem", "kind": "int", "type": "uint8"}}"#,
            r#"{"name": "j", "kind": "ref", "target": "field.A"}"#,
            r#"{"name": "k", "kind": "optional",
                "field": {"name": "inner", "kind": "int", "type": "uint8"}}"#,
            r#"{"name": "l", "kind": "variant", "members": []}"#,
        ];
        let mut kinds = BTreeSet::new();
        for json in samples {
            let node = FieldNode::from_parsed(&parse_field(json));
            kinds.insert(node.kind());
        }
        for kind in FieldKind::ALL {
            assert!(kinds.contains(&kind), "no dispatch sample for {kind:?}");
        }
    }

    #[test]
    fn version_optional_needs_strictly_narrower_window() {
        let config = Config {
            schema_version: 5,
            version_dependent_code: true,
            ..Config::default()
        };
        let ctx = Context::new(config, CustomCode::default());

        let mut node = FieldNode::from_parsed(&parse_field(
            r#"{"name": "a", "kind": "int", "type": "uint8", "since_version": 2}"#,
        ));
        node.prepare(&ctx, 0, schema::NOT_YET_DEPRECATED).unwrap();
        assert!(node.is_version_optional());
        assert_eq!(node.min_length(&ctx), 0);
        assert_eq!(node.max_length(&ctx), 1);

        // Same window as the parent: the parent already gates existence.
        let mut node = FieldNode::from_parsed(&parse_field(
            r#"{"name": "a", "kind": "int", "type": "uint8", "since_version": 2}"#,
        ));
        node.prepare(&ctx, 2, schema::NOT_YET_DEPRECATED).unwrap();
        assert!(!node.is_version_optional());
        assert_eq!(node.min_length(&ctx), 1);
    }

    #[test]
    fn version_optional_wrapper_definition() {
        let config = Config {
            schema_version: 5,
            version_dependent_code: true,
            ..Config::default()
        };
        let ctx = Context::new(config, CustomCode::default());
        let mut node = FieldNode::from_parsed(&parse_field(
            r#"{"name": "newField", "kind": "int", "type": "uint8", "since_version": 3}"#,
        ));
        node.prepare(&ctx, 0, schema::NOT_YET_DEPRECATED).unwrap();

        let out = node.class_definition(&ctx, "protocol::field");
        assert!(out.contains("class NewFieldField : public"));
        assert!(out.contains("struct NewField : public"));
        assert!(out.contains("comms::field::Optional<"));
        assert!(out.contains("comms::option::def::ExistsSinceVersion<3>"));
        assert!(out.contains("comms::option::def::ExistsByDefault"));
    }

    #[test]
    fn customization_level_gates_options() {
        let node = FieldNode::from_parsed(&parse_field(
            r#"{"name": "blob", "kind": "data", "external_ref": "field.Blob"}"#,
        ));

        let limited = Context::new(Config::default(), CustomCode::default());
        assert!(node.is_customizable(&limited));
        assert!(node.default_options(&limited, "protocol::field").contains(
            "using Blob = comms::option::app::EmptyOption;"
        ));
        assert!(node
            .bare_metal_default_options(&limited, "protocol::field")
            .contains("FixedSizeStorage"));

        let none = Context::new(
            Config { customization: CustomizationLevel::None, ..Config::default() },
            CustomCode::default(),
        );
        assert!(!node.is_customizable(&none));
        assert_eq!(node.default_options(&none, "protocol::field"), "");

        let int_node = FieldNode::from_parsed(&parse_field(
            r#"{"name": "a", "kind": "int", "type": "uint8", "external_ref": "field.A"}"#,
        ));
        assert!(!int_node.is_customizable(&limited));
        let full = Context::new(
            Config { customization: CustomizationLevel::Full, ..Config::default() },
            CustomCode::default(),
        );
        assert!(int_node.is_customizable(&full));
    }

    #[test]
    fn int_literal_parsing() {
        assert_eq!(parse_int_literal("42").unwrap(), 42);
        assert_eq!(parse_int_literal("-7").unwrap(), -7);
        assert_eq!(parse_int_literal("0x10").unwrap(), 16);
        assert!(parse_int_literal("ten").is_err());
    }
}
