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

//! Inter-field condition expressions.
//!
//! Optional fields activate based on sibling field state, written in the
//! schema as small DSL expressions (`$flags.enable`, `$count != 0`). This
//! module parses the DSL, resolves `$name` paths against the sibling
//! member list, and renders C++ boolean expressions for generated
//! `refresh()` bodies. Unresolvable references are hard errors, never
//! silently skipped.

use crate::context::Context;
use crate::diagnostics::{self, Diagnostics, ErrorCode};
use crate::fields::{access_name, FieldNode, Member};
use crate::schema;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "cond.pest"]
struct CondParser;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn parse(text: &str) -> CmpOp {
        match text {
            "=" => CmpOp::Eq,
            "!=" => CmpOp::Ne,
            "<" => CmpOp::Lt,
            "<=" => CmpOp::Le,
            ">" => CmpOp::Gt,
            ">=" => CmpOp::Ge,
            _ => unreachable!("operator list is closed by the grammar"),
        }
    }

    pub fn cpp(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    Literal(String),
    Sibling(Vec<String>),
}

/// Parsed condition expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CondExpr {
    Bool { negated: bool, path: Vec<String> },
    Cmp { path: Vec<String>, op: CmpOp, rhs: Rhs },
    All(Vec<CondExpr>),
    Any(Vec<CondExpr>),
}

/// Parse a single DSL expression.
pub fn parse(text: &str) -> Result<CondExpr, String> {
    let mut pairs = CondParser::parse(Rule::cond, text).map_err(|e| e.to_string())?;
    let cond = pairs.next().expect("cond rule always matches once");
    let inner = cond.into_inner().next().expect("cond wraps one alternative");
    match inner.as_rule() {
        Rule::bool_check => {
            let mut negated = false;
            let mut path = Vec::new();
            for part in inner.into_inner() {
                match part.as_rule() {
                    Rule::negation => negated = true,
                    Rule::sibling => path = sibling_path(part),
                    _ => unreachable!(),
                }
            }
            Ok(CondExpr::Bool { negated, path })
        }
        Rule::cmp => {
            let mut parts = inner.into_inner();
            let path = sibling_path(parts.next().expect("lhs"));
            let op = CmpOp::parse(parts.next().expect("op").as_str());
            let rhs_pair =
                parts.next().expect("rhs").into_inner().next().expect("rhs alternative");
            let rhs = match rhs_pair.as_rule() {
                Rule::sibling => Rhs::Sibling(sibling_path(rhs_pair)),
                Rule::literal => Rhs::Literal(rhs_pair.as_str().to_string()),
                _ => unreachable!(),
            };
            Ok(CondExpr::Cmp { path, op, rhs })
        }
        rule => unreachable!("unexpected rule {rule:?}"),
    }
}

fn sibling_path(pair: pest::iterators::Pair<'_, Rule>) -> Vec<String> {
    debug_assert_eq!(pair.as_rule(), Rule::sibling);
    pair.into_inner().map(|ident| ident.as_str().to_string()).collect()
}

/// Convert a schema condition (expression or combined list) into the
/// parsed tree.
pub fn from_schema(cond: &schema::Cond) -> Result<CondExpr, String> {
    match cond {
        schema::Cond::Expr(text) => parse(text),
        schema::Cond::List { op, conds } => {
            let items: Result<Vec<CondExpr>, String> =
                conds.iter().map(from_schema).collect();
            let items = items?;
            match op {
                schema::CondListOp::And => Ok(CondExpr::All(items)),
                schema::CondListOp::Or => Ok(CondExpr::Any(items)),
            }
        }
    }
}

/// Sibling member list a condition resolves against.
pub struct SiblingScope<'a> {
    pub ctx: &'a Context,
    pub members: &'a [Member],
}

impl SiblingScope<'_> {
    fn find(&self, name: &str) -> Option<FieldNode> {
        self.members
            .iter()
            .find(|m| m.name(self.ctx) == name)
            .map(|m| m.clone_node(self.ctx))
    }
}

/// Validate a condition against the sibling scope during preparation.
///
/// `owner` names the optional field carrying the condition, for error
/// reporting.
pub fn validate(expr: &CondExpr, scope: &SiblingScope<'_>, owner: &str) -> Diagnostics {
    match render_check(expr, scope) {
        Ok(_) => Diagnostics::default(),
        Err(ResolveError { code, message }) => diagnostics::error(code, owner, message),
    }
}

pub struct ResolveError {
    pub code: ErrorCode,
    pub message: String,
}

/// Render the condition as a C++ boolean expression.
pub fn render_check(
    expr: &CondExpr,
    scope: &SiblingScope<'_>,
) -> Result<String, ResolveError> {
    match expr {
        CondExpr::Bool { negated, path } => {
            let access = render_bool_access(path, scope)?;
            if *negated {
                Ok(format!("!{access}"))
            } else {
                Ok(access)
            }
        }
        CondExpr::Cmp { path, op, rhs } => {
            let lhs = render_value_access(path, scope)?;
            let target = resolve_leaf(path, scope)?;
            let rhs_str = match rhs {
                Rhs::Sibling(rhs_path) => render_value_access(rhs_path, scope)?,
                Rhs::Literal(text) => {
                    let literal = target.parse_literal(text).map_err(|reason| ResolveError {
                        code: ErrorCode::InvalidConditionValue,
                        message: format!("cannot interpret `{text}`: {reason}"),
                    })?;
                    format!(
                        "static_cast<typename std::decay<decltype({lhs})>::type>({literal})"
                    )
                }
            };
            Ok(format!("{lhs} {} {rhs_str}", op.cpp()))
        }
        CondExpr::All(items) => render_list(items, scope, " &&\n"),
        CondExpr::Any(items) => render_list(items, scope, " ||\n"),
    }
}

fn render_list(
    items: &[CondExpr],
    scope: &SiblingScope<'_>,
    sep: &str,
) -> Result<String, ResolveError> {
    let rendered: Result<Vec<String>, ResolveError> =
        items.iter().map(|item| render_check(item, scope)).collect();
    let rendered: Vec<String> =
        rendered?.into_iter().map(|check| format!("({check})")).collect();
    Ok(rendered.join(sep))
}

fn undeclared(path: &[String]) -> ResolveError {
    ResolveError {
        code: ErrorCode::UndeclaredFieldReference,
        message: format!("`${}` does not name a sibling field", path.join(".")),
    }
}

/// Resolve the field the final path component names, descending through
/// composite members.
fn resolve_leaf(
    path: &[String],
    scope: &SiblingScope<'_>,
) -> Result<FieldNode, ResolveError> {
    let (first, rest) = path.split_first().ok_or_else(|| undeclared(path))?;
    let mut current = scope.find(first).ok_or_else(|| undeclared(path))?;
    for component in rest {
        let next = current
            .member_clone(scope.ctx, component)
            .ok_or_else(|| undeclared(path))?;
        current = next;
    }
    Ok(current)
}

/// Access chain up to (and including) the named member fields:
/// `field_a().field_b()`.
fn render_member_chain(path: &[String]) -> String {
    path.iter()
        .map(|name| format!("field_{}()", access_name(name)))
        .collect::<Vec<_>>()
        .join(".")
}

fn render_value_access(
    path: &[String],
    scope: &SiblingScope<'_>,
) -> Result<String, ResolveError> {
    // Resolution validates the whole path before rendering.
    resolve_leaf(path, scope)?;
    Ok(format!("{}.value()", render_member_chain(path)))
}

fn render_bool_access(
    path: &[String],
    scope: &SiblingScope<'_>,
) -> Result<String, ResolveError> {
    debug_assert!(!path.is_empty());

    // A trailing component may name a bit of a set field rather than a
    // member field.
    if path.len() >= 2 {
        let (bit, parent_path) = path.split_last().expect("checked length");
        if let Ok(parent) = resolve_leaf(parent_path, scope) {
            if parent.has_bit(bit) {
                return Ok(format!(
                    "{}.getBitValue_{}()",
                    render_member_chain(parent_path),
                    access_name(bit)
                ));
            }
        }
    }

    let leaf = resolve_leaf(path, scope)?;
    if leaf.kind() == crate::schema::FieldKind::Optional {
        return Ok(format!("{}.doesExist()", render_member_chain(path)));
    }

    Err(ResolveError {
        code: ErrorCode::InvalidConditionSyntax,
        message: format!(
            "`${}` is neither a set bit nor an optional field",
            path.join(".")
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bool_check() {
        assert_eq!(
            parse("$flags.enable").unwrap(),
            CondExpr::Bool {
                negated: false,
                path: vec!["flags".to_string(), "enable".to_string()],
            }
        );
        assert_eq!(
            parse("!$flags.enable").unwrap(),
            CondExpr::Bool {
                negated: true,
                path: vec!["flags".to_string(), "enable".to_string()],
            }
        );
    }

    #[test]
    fn parses_comparisons() {
        assert_eq!(
            parse("$count != 0").unwrap(),
            CondExpr::Cmp {
                path: vec!["count".to_string()],
                op: CmpOp::Ne,
                rhs: Rhs::Literal("0".to_string()),
            }
        );
        assert_eq!(
            parse("$a.b >= -5").unwrap(),
            CondExpr::Cmp {
                path: vec!["a".to_string(), "b".to_string()],
                op: CmpOp::Ge,
                rhs: Rhs::Literal("-5".to_string()),
            }
        );
        assert_eq!(
            parse("$lhs = $rhs").unwrap(),
            CondExpr::Cmp {
                path: vec!["lhs".to_string()],
                op: CmpOp::Eq,
                rhs: Rhs::Sibling(vec!["rhs".to_string()]),
            }
        );
    }

    #[test]
    fn rejects_malformed_expressions() {
        assert!(parse("flags.enable").is_err());
        assert!(parse("$ = 5").is_err());
        assert!(parse("$a == ").is_err());
    }

    #[test]
    fn schema_lists_combine() {
        let cond = schema::Cond::List {
            op: schema::CondListOp::And,
            conds: vec![
                schema::Cond::Expr("$a != 0".to_string()),
                schema::Cond::Expr("$flags.on".to_string()),
            ],
        };
        let expr = from_schema(&cond).unwrap();
        let CondExpr::All(items) = expr else {
            panic!("expected an And list");
        };
        assert_eq!(items.len(), 2);
    }
}
