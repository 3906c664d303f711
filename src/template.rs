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

//! Template substitution engine.
//!
//! Templates embed placeholders written as `#^#KEY#$#`. Rendering replaces
//! every placeholder with the value bound to `KEY`, re-indenting multi-line
//! values to the placeholder's column and dropping lines that become blank
//! when an empty value lands on an otherwise-whitespace line.
//!
//! Substituted values are inserted verbatim and never re-scanned, so nested
//! templates must be rendered bottom-up: render the inner template first,
//! then bind the result into the outer one.

use std::collections::{BTreeMap, BTreeSet};

/// Placeholder bindings for a single [`render`] call.
/// Rebuilt fresh for every emission; ordered for deterministic iteration.
pub type ReplacementMap = BTreeMap<String, String>;

const PREFIX: &str = "#^#";
const SUFFIX: &str = "#$#";

/// Render `templ` with the given bindings.
///
/// Unknown keys substitute the empty string. The output is a pure function
/// of `(templ, repl)`.
pub fn render(templ: &str, repl: &ReplacementMap) -> String {
    let mut result = String::with_capacity(templ.len() * 2);
    let mut templ_pos = 0;

    while templ_pos < templ.len() {
        let Some(rel) = templ[templ_pos..].find(PREFIX) else {
            break;
        };
        let prefix_pos = templ_pos + rel;
        let key_pos = prefix_pos + PREFIX.len();
        let Some(rel) = templ[key_pos..].find(SUFFIX) else {
            debug_assert!(false, "unterminated placeholder in template");
            templ_pos = templ.len();
            break;
        };
        let suffix_pos = key_pos + rel;
        let after_suffix = suffix_pos + SUFFIX.len();

        let key = &templ[key_pos..suffix_pos];
        let value = repl.get(key).map(String::as_str).unwrap_or("");

        let line_start = templ[..prefix_pos].rfind('\n').map(|p| p + 1).unwrap_or(0);
        let indent = prefix_pos - line_start;

        // An empty value on an otherwise-blank line elides the whole line.
        let mut copy_until = prefix_pos;
        let mut next_pos = after_suffix;
        if value.is_empty() && is_blank(&templ[line_start..prefix_pos]) {
            if let Some(rel) = templ[after_suffix..].find('\n') {
                let newline_pos = after_suffix + rel;
                if is_blank(&templ[after_suffix..newline_pos]) {
                    copy_until = line_start;
                    next_pos = newline_pos + 1;
                }
            }
        }

        result.push_str(&templ[templ_pos..copy_until]);
        templ_pos = next_pos;

        if value.is_empty() {
            continue;
        }

        if indent == 0 {
            result.push_str(value);
            continue;
        }

        let mut sep = String::with_capacity(indent + 1);
        sep.push('\n');
        for _ in 0..indent {
            sep.push(' ');
        }
        result.push_str(&value.replace('\n', &sep));
    }

    if templ_pos < templ.len() {
        result.push_str(&templ[templ_pos..]);
    }
    result
}

fn is_blank(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\r'))
}

/// Join pre-rendered fragments with a separator, skipping empty entries.
pub fn join(list: &[String], sep: &str) -> String {
    let filtered: Vec<&str> =
        list.iter().filter(|s| !s.is_empty()).map(String::as_str).collect();
    filtered.join(sep)
}

/// Format a set of include tokens as preprocessor statements.
///
/// Tokens wrapped in angle brackets become system includes, everything else
/// a local include. The set is already sorted and deduplicated.
pub fn include_statements(includes: &BTreeSet<String>) -> String {
    let mut result = String::new();
    for inc in includes {
        if inc.starts_with('<') {
            result.push_str(&format!("#include {inc}\n"));
        } else {
            result.push_str(&format!("#include \"{inc}\"\n"));
        }
    }
    result
}

/// Wrap free-form description text into `///` doc comment lines.
pub fn doc_comment(text: &str) -> String {
    let mut lines = Vec::new();
    for para in text.lines() {
        let mut line = String::new();
        for word in para.split_whitespace() {
            if !line.is_empty() && line.len() + word.len() + 1 > 72 {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.iter().map(|l| format!("/// {l}")).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repl(pairs: &[(&str, &str)]) -> ReplacementMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn no_placeholders_is_identity() {
        let templ = "struct Foo\n{\n    int x;\n};\n";
        assert_eq!(render(templ, &repl(&[("X", "unused")])), templ);
    }

    #[test]
    fn simple_substitution() {
        let templ = "struct #^#NAME#$# {};\n";
        assert_eq!(render(templ, &repl(&[("NAME", "Foo")])), "struct Foo {};\n");
    }

    #[test]
    fn unknown_key_renders_empty() {
        let templ = "a#^#MISSING#$#b\n";
        assert_eq!(render(templ, &ReplacementMap::new()), "ab\n");
    }

    #[test]
    fn blank_line_elision() {
        let templ = "first\n    #^#GONE#$#\nlast\n";
        assert_eq!(render(templ, &ReplacementMap::new()), "first\nlast\n");
        // A populated value keeps the line.
        assert_eq!(render(templ, &repl(&[("GONE", "kept")])), "first\n    kept\nlast\n");
    }

    #[test]
    fn no_elision_when_line_has_other_content() {
        let templ = "value = #^#V#$#;\n";
        assert_eq!(render(templ, &ReplacementMap::new()), "value = ;\n");
    }

    #[test]
    fn multi_line_value_reindented_to_placeholder_column() {
        let templ = "{\n    #^#BODY#$#\n}\n";
        let out = render(templ, &repl(&[("BODY", "a();\nb();")]));
        assert_eq!(out, "{\n    a();\n    b();\n}\n");
    }

    #[test]
    fn deep_indent_preserved_per_line() {
        let templ = "        #^#B#$#\n";
        let out = render(templ, &repl(&[("B", "x\ny\nz")]));
        for line in out.lines() {
            assert!(line.starts_with("        "), "line {line:?} lost its indent");
        }
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let templ = "#^#A#$#\n";
        let out = render(templ, &repl(&[("A", "#^#B#$#"), ("B", "nope")]));
        assert_eq!(out, "#^#B#$#\n");
    }

    #[test]
    fn deterministic() {
        let templ = "x #^#A#$# y\n    #^#B#$#\n";
        let bindings = repl(&[("A", "1"), ("B", "2")]);
        assert_eq!(render(templ, &bindings), render(templ, &bindings));
    }

    #[test]
    fn include_statement_formatting() {
        let mut includes = BTreeSet::new();
        includes.insert("comms/options.h".to_string());
        includes.insert("<cstdint>".to_string());
        includes.insert("comms/field/IntValue.h".to_string());
        let out = include_statements(&includes);
        assert_eq!(
            out,
            "#include <cstdint>\n#include \"comms/field/IntValue.h\"\n#include \"comms/options.h\"\n"
        );
    }

    #[test]
    fn join_skips_empty_fragments() {
        let list =
            vec!["a".to_string(), String::new(), "b".to_string()];
        assert_eq!(join(&list, ",\n"), "a,\nb");
    }
}
