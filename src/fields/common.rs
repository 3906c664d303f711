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

//! Shared emission plumbing: identifier derivation, COMMS option tokens,
//! and the class/members-struct templates every field kind renders
//! through.

use crate::context::{Context, Hook};
use crate::schema::{Endian, Units};
use crate::template::{self, ReplacementMap};
use heck::{ToLowerCamelCase, ToUpperCamelCase};

const ALL_HOOKS: [Hook; 6] =
    [Hook::Read, Hook::Write, Hook::Length, Hook::Valid, Hook::Refresh, Hook::Name];

/// User-provided member function overrides, inserted verbatim into the
/// class body.
pub fn custom_hooks_body(ctx: &Context, external_ref: &str) -> String {
    let parts: Vec<String> = ALL_HOOKS
        .iter()
        .filter_map(|hook| ctx.custom.get(*hook, external_ref))
        .map(str::to_string)
        .collect();
    template::join(&parts, "\n")
}

/// Options announcing custom read/refresh behavior to the base class.
pub fn custom_hook_options(ctx: &Context, external_ref: &str) -> Vec<String> {
    let mut options = Vec::new();
    if ctx.custom.get(Hook::Read, external_ref).is_some() {
        options.push("comms::option::def::HasCustomRead".to_string());
    }
    if ctx.custom.get(Hook::Refresh, external_ref).is_some() {
        options.push("comms::option::def::HasCustomRefresh".to_string());
    }
    options
}

/// Suffix of the struct holding a composite field's member definitions.
pub const MEMBERS_SUFFIX: &str = "Members";

/// Generated C++ class name of a schema field.
pub fn class_name(name: &str) -> String {
    name.to_upper_camel_case()
}

/// Accessor-style name, used in `field_<name>()` chains and bit getters.
pub fn access_name(name: &str) -> String {
    name.to_lower_camel_case()
}

pub fn display_name_or<'a>(display_name: &'a str, name: &'a str) -> &'a str {
    if display_name.is_empty() {
        name
    } else {
        display_name
    }
}

/// Scope of a composite's member definitions: `Outer::OuterMembers`.
pub fn member_scope(scope: &str, class_name: &str) -> String {
    format!("{scope}::{class_name}{MEMBERS_SUFFIX}")
}

/// The common base of every generated field type. An endian differing
/// from the schema default is overridden in place.
pub fn field_base(ctx: &Context, endian: Option<Endian>) -> String {
    let ns = &ctx.config.main_namespace;
    match endian {
        Some(e) if e != ctx.config.endian => {
            format!("{ns}::field::FieldBase<{}>", endian_option(e))
        }
        _ => format!("{ns}::field::FieldBase<>"),
    }
}

pub fn endian_option(endian: Endian) -> &'static str {
    match endian {
        Endian::Little => "comms::option::def::LittleEndian",
        Endian::Big => "comms::option::def::BigEndian",
    }
}

pub fn units_option(units: Units) -> &'static str {
    match units {
        Units::Nanoseconds => "comms::option::def::UnitsNanoseconds",
        Units::Microseconds => "comms::option::def::UnitsMicroseconds",
        Units::Milliseconds => "comms::option::def::UnitsMilliseconds",
        Units::Seconds => "comms::option::def::UnitsSeconds",
        Units::Minutes => "comms::option::def::UnitsMinutes",
        Units::Hours => "comms::option::def::UnitsHours",
        Units::Millimeters => "comms::option::def::UnitsMillimeters",
        Units::Centimeters => "comms::option::def::UnitsCentimeters",
        Units::Meters => "comms::option::def::UnitsMeters",
        Units::Kilometers => "comms::option::def::UnitsKilometers",
        Units::MetersPerSecond => "comms::option::def::UnitsMetersPerSecond",
        Units::KilometersPerHour => "comms::option::def::UnitsKilometersPerHour",
        Units::Hertz => "comms::option::def::UnitsHertz",
        Units::Kilohertz => "comms::option::def::UnitsKilohertz",
        Units::Megahertz => "comms::option::def::UnitsMegahertz",
        Units::Degrees => "comms::option::def::UnitsDegrees",
        Units::Radians => "comms::option::def::UnitsRadians",
        Units::Bytes => "comms::option::def::UnitsBytes",
        Units::Kilobytes => "comms::option::def::UnitsKilobytes",
        Units::Megabytes => "comms::option::def::UnitsMegabytes",
    }
}

/// Join composed options the way they appear inside a base type's
/// template argument list.
pub fn options_text(options: &[String]) -> String {
    template::join(options, ",\n")
}

/// Full base type expression: `comms::field::<Kind>` over the field base,
/// extra kind arguments and the composed options.
pub fn base_type(comms_class: &str, args: &[String]) -> String {
    let mut repl = ReplacementMap::new();
    repl.insert("CLASS".to_string(), comms_class.to_string());
    repl.insert("ARGS".to_string(), template::join(args, ",\n"));
    template::render("#^#CLASS#$#<\n    #^#ARGS#$#\n>", &repl)
}

/// Ingredients of a generated field class.
pub struct ClassDef {
    pub class_name: String,
    pub display_name: String,
    pub description: String,
    /// Base type expression, already carrying composed options.
    pub base: String,
    /// Pre-definition rendered before the class (members struct).
    pub members_struct: String,
    /// Additional public members after `name()`.
    pub public_body: String,
    /// Private members; rendered with a `private:` label when non-empty.
    pub private_body: String,
}

const CLASS_TEMPL: &str = "\
#^#MEMBERS_STRUCT#$#
#^#DOC#$#
class #^#CLASS_NAME#$# : public
    #^#BASE#$#
{
    using Base =
        #^#BASE#$#;
public:
    /// @brief Name of the field.
    static const char* name()
    {
        return #^#NAME_STR#$#;
    }

    #^#PUBLIC#$#
#^#PRIVATE#$#
};
";

/// Render a field class definition.
pub fn render_class(def: &ClassDef) -> String {
    let mut doc = format!(
        "/// @brief Definition of <b>\"{}\"</b> field.",
        def.display_name
    );
    if !def.description.is_empty() {
        doc.push('\n');
        doc.push_str("/// @details\n");
        doc.push_str(&template::doc_comment(&def.description));
    }

    let private = if def.private_body.is_empty() {
        String::new()
    } else {
        let mut repl = ReplacementMap::new();
        repl.insert("BODY".to_string(), def.private_body.clone());
        template::render("\nprivate:\n    #^#BODY#$#", &repl)
    };

    let mut repl = ReplacementMap::new();
    repl.insert("MEMBERS_STRUCT".to_string(), def.members_struct.clone());
    repl.insert("DOC".to_string(), doc);
    repl.insert("CLASS_NAME".to_string(), def.class_name.clone());
    repl.insert("BASE".to_string(), def.base.clone());
    repl.insert("NAME_STR".to_string(), format!("\"{}\"", def.display_name));
    repl.insert("PUBLIC".to_string(), def.public_body.clone());
    repl.insert("PRIVATE".to_string(), private);
    template::render(CLASS_TEMPL, &repl)
}

const MEMBERS_TEMPL: &str = "\
/// @brief Scope for all the member fields of @ref #^#CLASS_NAME#$# #^#KIND#$#.
struct #^#CLASS_NAME#$##^#SUFFIX#$#
{
    #^#MEMBERS#$#
};
";

/// Render the `<Name>Members` struct wrapping member definitions.
pub fn render_members_struct(class_name: &str, kind: &str, members: &[String]) -> String {
    let mut repl = ReplacementMap::new();
    repl.insert("CLASS_NAME".to_string(), class_name.to_string());
    repl.insert("KIND".to_string(), kind.to_string());
    repl.insert("SUFFIX".to_string(), MEMBERS_SUFFIX.to_string());
    repl.insert("MEMBERS".to_string(), template::join(members, "\n"));
    template::render(MEMBERS_TEMPL, &repl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Config, CustomCode};

    #[test]
    fn identifier_derivation() {
        assert_eq!(class_name("session_id"), "SessionId");
        assert_eq!(class_name("flags"), "Flags");
        assert_eq!(access_name("SessionId"), "sessionId");
        assert_eq!(member_scope("TupleField", "Inner"), "TupleField::InnerMembers");
    }

    #[test]
    fn field_base_overrides_differing_endian() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        assert_eq!(field_base(&ctx, None), "protocol::field::FieldBase<>");
        assert_eq!(
            field_base(&ctx, Some(Endian::Little)),
            "protocol::field::FieldBase<>"
        );
        assert_eq!(
            field_base(&ctx, Some(Endian::Big)),
            "protocol::field::FieldBase<comms::option::def::BigEndian>"
        );
    }

    #[test]
    fn class_rendering_elides_empty_sections() {
        let def = ClassDef {
            class_name: "Flags".to_string(),
            display_name: "flags".to_string(),
            description: String::new(),
            base: "comms::field::IntValue<\n    Base,\n    std::uint8_t\n>".to_string(),
            members_struct: String::new(),
            public_body: String::new(),
            private_body: String::new(),
        };
        let out = render_class(&def);
        assert!(out.contains("class Flags : public"));
        assert!(out.contains("return \"flags\";"));
        assert!(!out.contains("private:"));
        // Multi-line base keeps its relative indentation in both positions.
        assert!(out.contains("    comms::field::IntValue<\n        Base,"));
    }
}
