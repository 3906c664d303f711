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

//! Command line driver: parsed schema in, C++ field definitions out.

use argh::FromArgs;
use codespan_reporting::term::termcolor;

use commsgen::context::{Context, CustomCode, CustomizationLevel};
use commsgen::diagnostics::SourceDatabase;
use commsgen::generator::{self, GeneratedUnit};
use commsgen::schema::ParsedSchema;

use std::fs;
use std::io::Write;
use std::path::Path;

#[derive(FromArgs, Debug)]
/// COMMS field definition generator.
struct Opt {
    #[argh(switch)]
    /// print tool version and exit.
    version: bool,

    #[argh(option, default = "CustomizationLevel::Limited")]
    /// exposed customization hooks ("full", "limited", "none").
    customization: CustomizationLevel,

    #[argh(switch)]
    /// force generation of version dependent code even when the schema
    /// does not request it.
    version_dependent: bool,

    #[argh(option)]
    /// lowest protocol version the generated code must interoperate with.
    /// Defaults to 0.
    min_remote_version: Option<u32>,

    #[argh(option)]
    /// directory where generated files should go.
    /// If omitted, the generated code will be printed to stdout.
    output_dir: Option<String>,

    #[argh(positional)]
    /// input file: the parsed schema as JSON.
    input_file: Option<String>,
}

fn generate(opt: &Opt, input_file: &str) -> Result<GeneratedUnit, String> {
    let source = fs::read_to_string(input_file)
        .map_err(|err| format!("failed to read {input_file}: {err}"))?;
    let schema: ParsedSchema = serde_json::from_str(&source)
        .map_err(|err| format!("failed to parse {input_file}: {err}"))?;

    let mut sources = SourceDatabase::new();
    sources.add(input_file.to_string(), source);

    let mut config = generator::config_from_schema(&schema);
    config.customization = opt.customization;
    if opt.version_dependent {
        config.version_dependent_code = true;
    }
    if let Some(version) = opt.min_remote_version {
        config.min_remote_version = version;
    }

    let ctx = Context::new(config, CustomCode::default());
    generator::generate(&ctx, &schema.fields).map_err(|diagnostics| {
        diagnostics
            .emit(
                &sources,
                &mut termcolor::StandardStream::stderr(termcolor::ColorChoice::Always)
                    .lock(),
            )
            .expect("Could not print diagnostics");
        String::from("Generation failed")
    })
}

fn write_unit(opt: &Opt, unit: &GeneratedUnit) -> Result<(), String> {
    let Some(output_dir) = opt.output_dir.as_ref() else {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for field in &unit.fields {
            write!(
                out,
                "{}\n{}\n{}\n{}",
                field.includes, field.definition, field.common, field.plugin_properties
            )
            .map_err(|err| format!("failed to write output: {err}"))?;
        }
        return Ok(());
    };

    let dir = Path::new(output_dir);
    fs::create_dir_all(dir)
        .map_err(|err| format!("failed to create {output_dir}: {err}"))?;
    for field in &unit.fields {
        let contents = format!("{}\n{}", field.includes, field.definition);
        write_file(&dir.join(format!("{}.h", field.class_name)), &contents)?;
        write_file(
            &dir.join(format!("{}Common.h", field.class_name)),
            &field.common,
        )?;
    }

    let default_options: Vec<&str> = unit
        .fields
        .iter()
        .map(|f| f.default_options.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    if !default_options.is_empty() {
        write_file(&dir.join("DefaultOptions.inc"), &default_options.join("\n"))?;
    }
    let bare_metal: Vec<&str> = unit
        .fields
        .iter()
        .map(|f| f.bare_metal_default_options.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    if !bare_metal.is_empty() {
        write_file(&dir.join("BareMetalDefaultOptions.inc"), &bare_metal.join("\n"))?;
    }
    let plugin_props: Vec<&str> =
        unit.fields.iter().map(|f| f.plugin_properties.as_str()).collect();
    write_file(&dir.join("PluginProperties.inc"), &plugin_props.join("\n"))?;
    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<(), String> {
    fs::write(path, contents)
        .map_err(|err| format!("failed to write {}: {err}", path.display()))
}

fn main() -> Result<(), String> {
    let opt: Opt = argh::from_env();

    if opt.version {
        println!("commsgen {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let Some(input_file) = opt.input_file.as_ref() else {
        return Err("No input file is specified".to_owned());
    };

    let unit = generate(&opt, input_file)?;
    write_unit(&opt, &unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opt_with_output(dir: Option<String>) -> Opt {
        Opt {
            version: false,
            customization: CustomizationLevel::Limited,
            version_dependent: false,
            min_remote_version: None,
            output_dir: dir,
            input_file: None,
        }
    }

    #[test]
    fn writes_field_files_into_output_dir() {
        let schema: ParsedSchema = serde_json::from_str(
            r#"{
                "name": "demo",
                "fields": [
                    {"name": "msgId", "kind": "int", "type": "uint16",
                     "external_ref": "field.MsgId"},
                    {"name": "label", "kind": "string",
                     "external_ref": "field.Label"}
                ]
            }"#,
        )
        .unwrap();
        let ctx = Context::new(
            generator::config_from_schema(&schema),
            CustomCode::default(),
        );
        let unit = generator::generate(&ctx, &schema.fields).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let opt = opt_with_output(Some(dir.path().to_string_lossy().into_owned()));
        write_unit(&opt, &unit).unwrap();

        let msg_id = fs::read_to_string(dir.path().join("MsgId.h")).unwrap();
        assert!(msg_id.contains("#include \"comms/field/IntValue.h\""));
        assert!(msg_id.contains("class MsgId : public"));
        assert!(dir.path().join("MsgIdCommon.h").exists());
        // Strings are Limited-customizable, so the options fragment exists.
        let options =
            fs::read_to_string(dir.path().join("DefaultOptions.inc")).unwrap();
        assert!(options.contains("using Label = comms::option::app::EmptyOption;"));
        assert!(dir.path().join("PluginProperties.inc").exists());
    }

    #[test]
    fn missing_input_file_is_an_error() {
        let opt = opt_with_output(None);
        assert!(generate(&opt, "/nonexistent/schema.json").is_err());
    }
}
