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

//! Generation driver.
//!
//! One pass over the schema: prepare every top-level field in declaration
//! order (members depth-first), register the referenceable ones, then
//! render. A field that failed `prepare` never reaches emission; all
//! prepare errors are accumulated before the run aborts.

use crate::context::{Config, Context};
use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::fields::FieldNode;
use crate::schema::{ParsedField, NOT_YET_DEPRECATED};
use crate::template;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Emitted output blobs of a single top-level field.
#[derive(Debug)]
pub struct GeneratedField {
    pub name: String,
    pub class_name: String,
    pub external_ref: String,
    /// Full structural C++ definition, version wrapper included.
    pub definition: String,
    /// Template-parameter-independent companion definition.
    pub common: String,
    /// `#include` block the definition depends on.
    pub includes: String,
    pub default_options: String,
    pub bare_metal_default_options: String,
    pub plugin_properties: String,
}

/// Result of a full generation run.
#[derive(Debug)]
pub struct GeneratedUnit {
    pub fields: Vec<GeneratedField>,
    /// External references used by other fields; feeds dead-field
    /// elimination in consumers of the unit.
    pub referenced: BTreeSet<String>,
}

/// Prepare and render all top-level fields of a schema.
pub fn generate(
    ctx: &Context,
    parsed_fields: &[ParsedField],
) -> Result<GeneratedUnit, Diagnostics> {
    let mut diags = Diagnostics::default();
    let mut nodes: Vec<Rc<FieldNode>> = Vec::with_capacity(parsed_fields.len());
    let mut seen_refs = BTreeSet::new();

    for parsed in parsed_fields {
        if !parsed.external_ref.is_empty() && !seen_refs.insert(parsed.external_ref.clone())
        {
            diags.push_error(
                ErrorCode::StructuralConflict,
                &parsed.name,
                format!("external reference `{}` declared twice", parsed.external_ref),
            );
            continue;
        }

        let mut node = FieldNode::from_parsed(parsed);
        match node.prepare(ctx, 0, NOT_YET_DEPRECATED) {
            Ok(()) => {
                let node = Rc::new(node);
                if !node.external_ref().is_empty() {
                    ctx.register(Rc::clone(&node));
                }
                nodes.push(node);
            }
            Err(sub) => diags.merge(sub),
        }
    }
    if !diags.is_empty() {
        return Err(diags);
    }

    let scope = format!("{}::field", ctx.config.main_namespace);
    let fields = nodes
        .iter()
        .map(|node| GeneratedField {
            name: node.name().to_string(),
            class_name: node.class_name(),
            external_ref: node.external_ref().to_string(),
            definition: node.class_definition(ctx, &scope),
            common: node.common_definition(ctx),
            includes: template::include_statements(&node.includes(ctx)),
            default_options: node.default_options(ctx, &scope),
            bare_metal_default_options: node.bare_metal_default_options(ctx, &scope),
            plugin_properties: node.plugin_properties(ctx, &scope),
        })
        .collect();

    Ok(GeneratedUnit { fields, referenced: ctx.used_fields() })
}

/// Seed the generation configuration from a parsed schema header. CLI
/// flags may override individual entries afterwards.
pub fn config_from_schema(schema: &crate::schema::ParsedSchema) -> Config {
    Config {
        endian: schema.endian,
        schema_version: schema.version,
        min_remote_version: 0,
        version_dependent_code: schema.version_dependent_code,
        main_namespace: if schema.main_namespace.is_empty() {
            schema.name.clone()
        } else {
            schema.main_namespace.clone()
        },
        protocol_name: schema.name.clone(),
        ..Config::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CustomCode;
    use crate::schema::ParsedSchema;

    fn schema(json: &str) -> ParsedSchema {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn prepares_and_renders_in_declaration_order() {
        let parsed = schema(
            r#"{
                "name": "demo",
                "fields": [
                    {"name": "msgId", "kind": "int", "type": "uint16",
                     "external_ref": "field.MsgId"},
                    {"name": "flags", "kind": "set", "length": 1,
                     "external_ref": "field.Flags",
                     "bits": [{"name": "ack", "idx": 0}]},
                    {"name": "id", "kind": "ref", "target": "field.MsgId",
                     "external_ref": "field.Id"}
                ]
            }"#,
        );
        let ctx =
            Context::new(config_from_schema(&parsed), CustomCode::default());
        let unit = generate(&ctx, &parsed.fields).unwrap();

        assert_eq!(unit.fields.len(), 3);
        assert_eq!(unit.fields[0].class_name, "MsgId");
        assert!(unit.fields[0].definition.contains("comms::field::IntValue<"));
        assert!(unit.fields[0].common.contains("struct MsgIdCommon"));
        assert!(unit.fields[0]
            .includes
            .contains("#include \"comms/field/IntValue.h\""));
        assert!(unit.fields[1].definition.contains("COMMS_BITMASK_BITS"));
        assert!(unit.fields[2]
            .definition
            .contains("using Id = demo::field::MsgId;"));
        assert!(unit.referenced.contains("field.MsgId"));
    }

    #[test]
    fn prepare_failure_aborts_before_emission() {
        let parsed = schema(
            r#"{
                "name": "demo",
                "fields": [
                    {"name": "ok", "kind": "int", "type": "uint8",
                     "external_ref": "field.Ok"},
                    {"name": "broken", "kind": "ref", "target": "field.Missing",
                     "external_ref": "field.Broken"}
                ]
            }"#,
        );
        let ctx =
            Context::new(config_from_schema(&parsed), CustomCode::default());
        assert!(generate(&ctx, &parsed.fields).is_err());
    }

    #[test]
    fn all_prepare_errors_accumulate() {
        let parsed = schema(
            r#"{
                "name": "demo",
                "fields": [
                    {"name": "a", "kind": "ref", "target": "field.M1",
                     "external_ref": "field.A"},
                    {"name": "b", "kind": "ref", "target": "field.M2",
                     "external_ref": "field.B"}
                ]
            }"#,
        );
        let ctx =
            Context::new(config_from_schema(&parsed), CustomCode::default());
        let diags = generate(&ctx, &parsed.fields).unwrap_err();
        assert_eq!(diags.diagnostics.len(), 2);
    }

    #[test]
    fn duplicate_external_ref_rejected() {
        let parsed = schema(
            r#"{
                "name": "demo",
                "fields": [
                    {"name": "a", "kind": "int", "type": "uint8",
                     "external_ref": "field.A"},
                    {"name": "b", "kind": "int", "type": "uint8",
                     "external_ref": "field.A"}
                ]
            }"#,
        );
        let ctx =
            Context::new(config_from_schema(&parsed), CustomCode::default());
        assert!(generate(&ctx, &parsed.fields).is_err());
    }
}
