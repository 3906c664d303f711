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

//! Validity and version reasoning over valid-range lists.
//!
//! The reasoner turns a field's raw `ValidRange` list into a structured
//! condition tree. The tree carries its own evaluator so the equivalence
//! between the source ranges and the generated checks is testable without
//! compiling emitted code; rendering to C++ happens at the edge.

use crate::schema::{ValidRange, Version, NOT_YET_DEPRECATED};
use crate::template::{self, ReplacementMap};
use std::cmp::Ordering;

/// Floating point values that never participate in numeric range
/// comparisons and render through dedicated recognizer expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatSpecial {
    Nan,
    PlusInf,
    MinusInf,
}

/// One node of the generated validity condition tree.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidCond {
    IntValue(i128),
    IntRange { min: i128, max: i128 },
    FloatValue(f64),
    FloatRange { min: f64, max: f64 },
    Special(FloatSpecial),
    /// Runtime version guard wrapping the inner conditions.
    /// Accepts when `since <= version < until` and any inner accepts.
    VersionGuard { since: Version, until: Version, inner: Vec<ValidCond> },
}

impl ValidCond {
    pub fn accepts_int(&self, value: i128, version: Version) -> bool {
        match self {
            ValidCond::IntValue(v) => value == *v,
            ValidCond::IntRange { min, max } => *min <= value && value <= *max,
            ValidCond::VersionGuard { since, until, inner } => {
                *since <= version
                    && version < *until
                    && inner.iter().any(|c| c.accepts_int(value, version))
            }
            _ => false,
        }
    }

    pub fn accepts_float(&self, value: f64, version: Version) -> bool {
        match self {
            ValidCond::FloatValue(v) => value == *v,
            ValidCond::FloatRange { min, max } => *min <= value && value <= *max,
            ValidCond::Special(FloatSpecial::Nan) => value.is_nan(),
            ValidCond::Special(FloatSpecial::PlusInf) => value == f64::INFINITY,
            ValidCond::Special(FloatSpecial::MinusInf) => value == f64::NEG_INFINITY,
            ValidCond::VersionGuard { since, until, inner } => {
                *since <= version
                    && version < *until
                    && inner.iter().any(|c| c.accepts_float(value, version))
            }
            _ => false,
        }
    }
}

/// True when any of the listed conditions accepts the integer value.
pub fn any_accepts_int(conds: &[ValidCond], value: i128, version: Version) -> bool {
    conds.iter().any(|c| c.accepts_int(value, version))
}

/// True when any of the listed conditions accepts the float value.
pub fn any_accepts_float(conds: &[ValidCond], value: f64, version: Version) -> bool {
    conds.iter().any(|c| c.accepts_float(value, version))
}

/// Decision rule for version-based generation: enabled globally, enabled
/// for the field, and at least one range window is a strict subset of the
/// field's own window. Anything else would emit dead runtime checks.
pub fn needs_version_based<T>(
    version_dependent_code: bool,
    valid_check_version: bool,
    field_since: Version,
    field_deprecated: Version,
    ranges: &[ValidRange<T>],
) -> bool {
    version_dependent_code
        && valid_check_version
        && ranges.iter().any(|r| r.narrower_than(field_since, field_deprecated))
}

/// Merge sorted integer ranges that touch or overlap. The represented
/// value set never changes, only its representation.
pub fn merge_int_ranges(mut ranges: Vec<ValidRange<i128>>) -> Vec<ValidRange<i128>> {
    ranges.sort_by(|a, b| (a.min, a.max).cmp(&(b.min, b.max)));
    let mut merged: Vec<ValidRange<i128>> = Vec::with_capacity(ranges.len());
    for range in ranges {
        if let Some(last) = merged.last_mut() {
            if range.min <= last.max.saturating_add(1) {
                last.max = last.max.max(range.max);
                continue;
            }
        }
        merged.push(range);
    }
    merged
}

fn int_cond(range: &ValidRange<i128>) -> ValidCond {
    if range.min == range.max {
        ValidCond::IntValue(range.min)
    } else {
        ValidCond::IntRange { min: range.min, max: range.max }
    }
}

fn float_cond(range: &ValidRange<f64>) -> ValidCond {
    if range.min.is_nan() {
        return ValidCond::Special(FloatSpecial::Nan);
    }
    if range.min.is_infinite() {
        return ValidCond::Special(if range.min < 0.0 {
            FloatSpecial::MinusInf
        } else {
            FloatSpecial::PlusInf
        });
    }
    if range.min == range.max {
        ValidCond::FloatValue(range.min)
    } else {
        ValidCond::FloatRange { min: range.min, max: range.max }
    }
}

/// Version-independent conditions: one per range, in schema order.
pub fn normal_int_conditions(ranges: &[ValidRange<i128>]) -> Vec<ValidCond> {
    ranges.iter().map(int_cond).collect()
}

pub fn normal_float_conditions(ranges: &[ValidRange<f64>]) -> Vec<ValidCond> {
    ranges.iter().map(float_cond).collect()
}

fn int_less(a: &ValidRange<i128>, b: &ValidRange<i128>) -> bool {
    if a.since_version != b.since_version {
        return a.since_version < b.since_version;
    }
    if a.deprecated_since != b.deprecated_since {
        return a.deprecated_since > b.deprecated_since;
    }
    if a.min != b.min {
        return a.min < b.min;
    }
    a.max < b.max
}

fn float_less(a: &ValidRange<f64>, b: &ValidRange<f64>) -> bool {
    if a.since_version != b.since_version {
        return a.since_version < b.since_version;
    }
    if a.deprecated_since != b.deprecated_since {
        return a.deprecated_since > b.deprecated_since;
    }
    // NaN bounds sort last within their version group.
    if b.min.is_nan() {
        return !a.min.is_nan();
    }
    if a.min.is_nan() {
        return false;
    }
    if a.min != b.min {
        return a.min < b.min;
    }
    a.max < b.max
}

fn version_based_conditions<T: Copy>(
    field_since: Version,
    field_deprecated: Version,
    ranges: &[ValidRange<T>],
    less: impl Fn(&ValidRange<T>, &ValidRange<T>) -> bool,
    to_cond: impl Fn(&ValidRange<T>) -> ValidCond,
) -> Vec<ValidCond> {
    let mut sorted: Vec<ValidRange<T>> = ranges.to_vec();
    sorted.sort_by(|a, b| {
        if less(a, b) {
            Ordering::Less
        } else if less(b, a) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    });

    // Ranges whose window is not strictly inside the field's own window
    // never need a runtime version check.
    let split = sorted
        .iter()
        .position(|r| r.narrower_than(field_since, field_deprecated))
        .unwrap_or(sorted.len());

    let mut conditions: Vec<ValidCond> =
        sorted[..split].iter().map(&to_cond).collect();

    let mut idx = split;
    while idx < sorted.len() {
        let since = sorted[idx].since_version;
        let until = sorted[idx].deprecated_since;
        debug_assert!(field_since <= since);

        let group_end = sorted[idx..]
            .iter()
            .position(|r| r.since_version != since || r.deprecated_since != until)
            .map(|p| idx + p)
            .unwrap_or(sorted.len());

        let inner: Vec<ValidCond> =
            sorted[idx..group_end].iter().map(&to_cond).collect();
        conditions.push(ValidCond::VersionGuard { since, until, inner });
        idx = group_end;
    }

    conditions
}

/// Version-based conditions for an integer field.
pub fn version_based_int_conditions(
    field_since: Version,
    field_deprecated: Version,
    ranges: &[ValidRange<i128>],
) -> Vec<ValidCond> {
    version_based_conditions(field_since, field_deprecated, ranges, int_less, int_cond)
}

/// Version-based conditions for a floating point field.
pub fn version_based_float_conditions(
    field_since: Version,
    field_deprecated: Version,
    ranges: &[ValidRange<f64>],
) -> Vec<ValidCond> {
    version_based_conditions(field_since, field_deprecated, ranges, float_less, float_cond)
}

/// Renders a condition tree into `if (...) { return true; }` blocks.
pub struct CondRenderer<'a> {
    /// Expression yielding the field's value, e.g. `Base::value()`.
    pub value_expr: &'a str,
    /// Expression yielding the runtime protocol version.
    pub version_expr: &'a str,
    /// Cast target for numeric literals, e.g. `typename Base::ValueType`.
    pub value_type: &'a str,
    /// Unsigned literal formatting for integer comparisons.
    pub unsigned: bool,
}

impl CondRenderer<'_> {
    /// Render the whole list, one block per condition, joined by newlines.
    pub fn render_blocks(&self, conds: &[ValidCond]) -> String {
        let blocks: Vec<String> = conds.iter().map(|c| self.render_block(c)).collect();
        template::join(&blocks, "\n")
    }

    fn render_block(&self, cond: &ValidCond) -> String {
        if let ValidCond::VersionGuard { since, until, inner } = cond {
            return self.render_guard(*since, *until, inner);
        }

        const TEMPL: &str = "if (#^#COND#$#) {\n    return true;\n}\n";
        let mut repl = ReplacementMap::new();
        repl.insert("COND".to_string(), self.render_comparison(cond));
        template::render(TEMPL, &repl)
    }

    fn render_guard(&self, since: Version, until: Version, inner: &[ValidCond]) -> String {
        let templ = if since == 0 {
            debug_assert!(until < NOT_YET_DEPRECATED);
            "if (#^#VERSION#$# < #^#MAX_VERSION#$#) {\n\
             \x20   #^#CONDITIONS#$#\n\
             }\n"
        } else if until == NOT_YET_DEPRECATED {
            "if (#^#MIN_VERSION#$# <= #^#VERSION#$#) {\n\
             \x20   #^#CONDITIONS#$#\n\
             }\n"
        } else {
            "if ((#^#MIN_VERSION#$# <= #^#VERSION#$#) &&\n\
             \x20   (#^#VERSION#$# < #^#MAX_VERSION#$#)) {\n\
             \x20   #^#CONDITIONS#$#\n\
             }\n"
        };

        let mut repl = ReplacementMap::new();
        repl.insert("VERSION".to_string(), self.version_expr.to_string());
        repl.insert("MIN_VERSION".to_string(), since.to_string());
        repl.insert("MAX_VERSION".to_string(), until.to_string());
        repl.insert("CONDITIONS".to_string(), self.render_blocks(inner));
        template::render(templ, &repl)
    }

    fn render_comparison(&self, cond: &ValidCond) -> String {
        let value = self.value_expr;
        match cond {
            ValidCond::IntValue(v) => {
                format!("{} == {}", self.cast_int(*v), value)
            }
            ValidCond::IntRange { min, max } => {
                format!(
                    "({} <= {}) &&\n({} <= {})",
                    self.cast_int(*min),
                    value,
                    value,
                    self.cast_int(*max)
                )
            }
            ValidCond::FloatValue(v) => {
                format!(
                    "std::abs({} - {}) <= std::numeric_limits<{}>::epsilon()",
                    value,
                    self.cast_float(*v),
                    self.value_type
                )
            }
            ValidCond::FloatRange { min, max } => {
                format!(
                    "({} <= {}) &&\n({} <= {})",
                    self.cast_float(*min),
                    value,
                    value,
                    self.cast_float(*max)
                )
            }
            ValidCond::Special(FloatSpecial::Nan) => {
                format!("std::isnan({value})")
            }
            ValidCond::Special(FloatSpecial::PlusInf) => {
                format!("(std::isinf({value})) && (0 < {value})")
            }
            ValidCond::Special(FloatSpecial::MinusInf) => {
                format!("(std::isinf({value})) && ({value} < 0)")
            }
            ValidCond::VersionGuard { .. } => {
                unreachable!("version guards render as blocks")
            }
        }
    }

    fn cast_int(&self, v: i128) -> String {
        format!("static_cast<{}>({})", self.value_type, fmt_int(v, self.unsigned))
    }

    fn cast_float(&self, v: f64) -> String {
        format!("static_cast<{}>({})", self.value_type, fmt_float(v))
    }
}

/// Format an integer literal for emitted C++.
pub fn fmt_int(v: i128, unsigned: bool) -> String {
    if unsigned && v > u32::MAX as i128 {
        format!("0x{v:X}ULL")
    } else if !(i32::MIN as i128..=i32::MAX as i128).contains(&v) {
        format!("{v}LL")
    } else {
        format!("{v}")
    }
}

/// Format a finite float literal for emitted C++.
pub fn fmt_float(v: f64) -> String {
    debug_assert!(v.is_finite());
    if v == v.trunc() {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(min: i128, max: i128) -> ValidRange<i128> {
        ValidRange { min, max, since_version: 0, deprecated_since: NOT_YET_DEPRECATED }
    }

    fn vrange(min: i128, max: i128, since: Version, until: Version) -> ValidRange<i128> {
        ValidRange { min, max, since_version: since, deprecated_since: until }
    }

    #[test]
    fn merging_preserves_value_set() {
        let raw = vec![range(10, 20), range(21, 30), range(40, 45), range(15, 25)];
        let merged = merge_int_ranges(raw.clone());
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].min, merged[0].max), (10, 30));
        assert_eq!((merged[1].min, merged[1].max), (40, 45));

        for value in [9, 10, 15, 20, 21, 25, 30, 31, 39, 40, 45, 46] {
            let in_raw = raw.iter().any(|r| r.min <= value && value <= r.max);
            let in_merged = merged.iter().any(|r| r.min <= value && value <= r.max);
            assert_eq!(in_raw, in_merged, "value {value} changed membership");
        }
    }

    #[test]
    fn single_point_range_renders_as_equality() {
        let conds = normal_int_conditions(&[range(5, 5), range(10, 20)]);
        assert_eq!(conds[0], ValidCond::IntValue(5));
        assert_eq!(conds[1], ValidCond::IntRange { min: 10, max: 20 });
    }

    #[test]
    fn normal_conditions_match_source_ranges() {
        let ranges = vec![range(10, 20), range(30, 30)];
        let conds = normal_int_conditions(&ranges);
        for value in [9, 10, 11, 15, 19, 20, 21, 29, 30, 31, i128::MIN, i128::MAX] {
            let expected = ranges.iter().any(|r| r.min <= value && value <= r.max);
            assert_eq!(any_accepts_int(&conds, value, 0), expected, "value {value}");
        }
    }

    #[test]
    fn float_specials_never_become_range_checks() {
        let ranges = vec![
            ValidRange {
                min: f64::NAN,
                max: f64::NAN,
                since_version: 0,
                deprecated_since: NOT_YET_DEPRECATED,
            },
            ValidRange {
                min: f64::NEG_INFINITY,
                max: f64::NEG_INFINITY,
                since_version: 0,
                deprecated_since: NOT_YET_DEPRECATED,
            },
            ValidRange {
                min: 0.5,
                max: 1.5,
                since_version: 0,
                deprecated_since: NOT_YET_DEPRECATED,
            },
        ];
        let conds = normal_float_conditions(&ranges);
        assert_eq!(conds[0], ValidCond::Special(FloatSpecial::Nan));
        assert_eq!(conds[1], ValidCond::Special(FloatSpecial::MinusInf));
        assert!(any_accepts_float(&conds, f64::NAN, 0));
        assert!(any_accepts_float(&conds, f64::NEG_INFINITY, 0));
        assert!(any_accepts_float(&conds, 1.0, 0));
        assert!(!any_accepts_float(&conds, f64::INFINITY, 0));
        assert!(!any_accepts_float(&conds, 2.0, 0));
    }

    #[test]
    fn version_based_decision_rule() {
        let plain = vec![range(0, 10)];
        let gated = vec![range(0, 10), vrange(20, 30, 2, 4)];

        assert!(!needs_version_based(false, true, 0, NOT_YET_DEPRECATED, &gated));
        assert!(!needs_version_based(true, false, 0, NOT_YET_DEPRECATED, &gated));
        assert!(!needs_version_based(true, true, 0, NOT_YET_DEPRECATED, &plain));
        assert!(needs_version_based(true, true, 0, NOT_YET_DEPRECATED, &gated));
        // Window equal to the field's own window is not a strict subset.
        assert!(!needs_version_based(true, true, 2, 4, &[vrange(1, 2, 2, 4)]));
    }

    #[test]
    fn version_based_partition_and_grouping() {
        let ranges = vec![
            vrange(100, 110, 3, 5),
            range(0, 10),
            vrange(50, 60, 3, 5),
            vrange(200, 210, 4, NOT_YET_DEPRECATED),
        ];
        let conds = version_based_int_conditions(0, NOT_YET_DEPRECATED, &ranges);

        // One unguarded prefix condition, then one guard per distinct
        // (since, deprecated) pair.
        assert_eq!(conds.len(), 3);
        assert_eq!(conds[0], ValidCond::IntRange { min: 0, max: 10 });
        let ValidCond::VersionGuard { since, until, inner } = &conds[1] else {
            panic!("expected guard, got {:?}", conds[1]);
        };
        assert_eq!((*since, *until), (3, 5));
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[0], ValidCond::IntRange { min: 50, max: 60 });
        let ValidCond::VersionGuard { since, until, inner } = &conds[2] else {
            panic!("expected guard, got {:?}", conds[2]);
        };
        assert_eq!((*since, *until), (4, NOT_YET_DEPRECATED));
        assert_eq!(inner.len(), 1);
    }

    #[test]
    fn version_based_equivalence_over_all_versions() {
        let ranges = vec![
            range(0, 10),
            vrange(50, 60, 2, 4),
            vrange(70, 80, 2, 4),
            vrange(90, 95, 3, NOT_YET_DEPRECATED),
        ];
        let conds = version_based_int_conditions(0, NOT_YET_DEPRECATED, &ranges);

        let samples: Vec<i128> =
            vec![-1, 0, 5, 10, 11, 49, 50, 55, 60, 61, 69, 70, 80, 81, 89, 90, 95, 96];
        for version in 0..6 {
            for &value in &samples {
                let expected = ranges.iter().any(|r| {
                    r.since_version <= version
                        && version < r.deprecated_since
                        && r.min <= value
                        && value <= r.max
                });
                assert_eq!(
                    any_accepts_int(&conds, value, version),
                    expected,
                    "value {value} at version {version}"
                );
            }
        }
    }

    #[test]
    fn rendered_range_comparison() {
        let renderer = CondRenderer {
            value_expr: "Base::value()",
            version_expr: "Base::getVersion()",
            value_type: "typename Base::ValueType",
            unsigned: true,
        };
        let out = renderer.render_blocks(&[ValidCond::IntRange { min: 10, max: 20 }]);
        assert!(out.contains("static_cast<typename Base::ValueType>(10) <= Base::value()"));
        assert!(out.contains("Base::value() <= static_cast<typename Base::ValueType>(20)"));
        assert!(out.starts_with("if ("));
        assert!(out.contains("return true;"));
    }

    #[test]
    fn rendered_version_guard_one_sided_forms() {
        let renderer = CondRenderer {
            value_expr: "Base::value()",
            version_expr: "Base::getVersion()",
            value_type: "typename Base::ValueType",
            unsigned: false,
        };
        let from = renderer.render_blocks(&[ValidCond::VersionGuard {
            since: 2,
            until: NOT_YET_DEPRECATED,
            inner: vec![ValidCond::IntValue(1)],
        }]);
        assert!(from.starts_with("if (2 <= Base::getVersion()) {"));

        let until = renderer.render_blocks(&[ValidCond::VersionGuard {
            since: 0,
            until: 4,
            inner: vec![ValidCond::IntValue(1)],
        }]);
        assert!(until.starts_with("if (Base::getVersion() < 4) {"));

        let both = renderer.render_blocks(&[ValidCond::VersionGuard {
            since: 2,
            until: 4,
            inner: vec![ValidCond::IntValue(1)],
        }]);
        assert!(both.starts_with("if ((2 <= Base::getVersion()) &&"));
        assert!(both.contains("(Base::getVersion() < 4))"));
    }

    #[test]
    fn literal_formatting() {
        assert_eq!(fmt_int(42, false), "42");
        assert_eq!(fmt_int(-7, true), "-7");
        assert_eq!(fmt_int(5_000_000_000, false), "5000000000LL");
        assert_eq!(fmt_int(0xFFFF_FFFF_FFFF_FFFF_u64 as i128, true), "0xFFFFFFFFFFFFFFFFULL");
        assert_eq!(fmt_float(1.0), "1.0");
        assert_eq!(fmt_float(1.5), "1.5");
    }
}
