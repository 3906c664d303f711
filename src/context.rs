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

//! Generation context threaded through preparation and emission.
//!
//! The context is the only shared state of a generation run: global
//! configuration, the registry of externally-referenceable fields, the
//! usage tracker, and per-field custom code overrides. It is passed
//! explicitly to every function that can read or update it.

use crate::fields::FieldNode;
use crate::schema::{Endian, Version, NOT_YET_DEPRECATED};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

/// Global policy controlling how many per-field override hooks are exposed
/// in generated option structs.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum CustomizationLevel {
    Full,
    #[default]
    Limited,
    None,
}

impl std::str::FromStr for CustomizationLevel {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "limited" => Ok(Self::Limited),
            "none" => Ok(Self::None),
            _ => Err(format!(
                "could not parse {input:?}, valid options are 'full', 'limited', 'none'."
            )),
        }
    }
}

/// Global generator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub endian: Endian,
    pub schema_version: Version,
    /// Lowest protocol version the generated code must interoperate with.
    pub min_remote_version: Version,
    pub version_dependent_code: bool,
    pub customization: CustomizationLevel,
    pub main_namespace: String,
    pub protocol_name: String,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            endian: Endian::Little,
            schema_version: 0,
            min_remote_version: 0,
            version_dependent_code: false,
            customization: CustomizationLevel::default(),
            main_namespace: "protocol".to_string(),
            protocol_name: "protocol".to_string(),
        }
    }
}

/// Per-field override hooks that replace generated member functions.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Hook {
    Read,
    Write,
    Length,
    Valid,
    Refresh,
    Name,
}

/// Custom code lookup, keyed by hook and the field's external reference.
/// An absent entry means "no override, use generated code".
#[derive(Debug, Default)]
pub struct CustomCode {
    overrides: HashMap<(Hook, String), String>,
}

impl CustomCode {
    pub fn set(&mut self, hook: Hook, external_ref: &str, code: String) {
        self.overrides.insert((hook, external_ref.to_string()), code);
    }

    pub fn get(&self, hook: Hook, external_ref: &str) -> Option<&str> {
        if external_ref.is_empty() {
            return None;
        }
        self.overrides
            .get(&(hook, external_ref.to_string()))
            .map(String::as_str)
            .filter(|code| !code.is_empty())
    }
}

/// Shared generation context.
pub struct Context {
    pub config: Config,
    pub custom: CustomCode,
    registry: RefCell<BTreeMap<String, Rc<FieldNode>>>,
    used: RefCell<BTreeSet<String>>,
}

impl Context {
    pub fn new(config: Config, custom: CustomCode) -> Context {
        Context {
            config,
            custom,
            registry: RefCell::new(BTreeMap::new()),
            used: RefCell::new(BTreeSet::new()),
        }
    }

    /// Register a prepared top-level field under its external reference.
    pub fn register(&self, node: Rc<FieldNode>) {
        let external_ref = node.external_ref().to_string();
        debug_assert!(!external_ref.is_empty(), "only referenceable fields are registered");
        let prev = self.registry.borrow_mut().insert(external_ref, node);
        debug_assert!(prev.is_none(), "field registered twice");
    }

    pub fn lookup(&self, external_ref: &str) -> Option<Rc<FieldNode>> {
        self.registry.borrow().get(external_ref).cloned()
    }

    /// Resolve an external reference that passed preparation.
    ///
    /// A failed lookup here means the schema graph was inconsistent and
    /// should have been rejected during `prepare`; it is a programming
    /// defect, not a recoverable error.
    pub fn resolve(&self, external_ref: &str) -> Rc<FieldNode> {
        self.lookup(external_ref)
            .unwrap_or_else(|| panic!("unresolved external reference `{external_ref}`"))
    }

    /// Mark an externally-referenced field as used.
    ///
    /// This is the documented side effect of option/include composition:
    /// the set feeds dead-field elimination in the driver.
    pub fn mark_used(&self, external_ref: &str) {
        if !external_ref.is_empty() {
            self.used.borrow_mut().insert(external_ref.to_string());
        }
    }

    pub fn is_used(&self, external_ref: &str) -> bool {
        self.used.borrow().contains(external_ref)
    }

    pub fn used_fields(&self) -> BTreeSet<String> {
        self.used.borrow().clone()
    }

    /// True when an element with the given version window exists in the
    /// generated protocol at all.
    pub fn element_exists(
        &self,
        since_version: Version,
        deprecated_since: Version,
        deprecated_removed: bool,
    ) -> bool {
        if self.config.schema_version < since_version {
            return false;
        }
        if deprecated_removed && deprecated_since <= self.config.min_remote_version {
            return false;
        }
        true
    }

    /// True when an element's presence varies across supported protocol
    /// versions.
    pub fn element_optional(
        &self,
        since_version: Version,
        deprecated_since: Version,
        deprecated_removed: bool,
    ) -> bool {
        if self.config.min_remote_version < since_version {
            return true;
        }
        deprecated_removed && deprecated_since < NOT_YET_DEPRECATED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_code_lookup() {
        let mut custom = CustomCode::default();
        custom.set(Hook::Read, "field.F1", "custom read".to_string());
        assert_eq!(custom.get(Hook::Read, "field.F1"), Some("custom read"));
        assert_eq!(custom.get(Hook::Write, "field.F1"), None);
        // An inline member has no external reference and never has overrides.
        assert_eq!(custom.get(Hook::Read, ""), None);
    }

    #[test]
    fn element_existence_and_optionality() {
        let config = Config {
            schema_version: 5,
            version_dependent_code: true,
            ..Config::default()
        };
        let ctx = Context::new(config, CustomCode::default());

        assert!(ctx.element_exists(0, NOT_YET_DEPRECATED, false));
        assert!(ctx.element_exists(5, NOT_YET_DEPRECATED, false));
        assert!(!ctx.element_exists(6, NOT_YET_DEPRECATED, false));
        assert!(!ctx.element_exists(0, 0, true));

        assert!(!ctx.element_optional(0, NOT_YET_DEPRECATED, false));
        assert!(ctx.element_optional(2, NOT_YET_DEPRECATED, false));
        assert!(ctx.element_optional(0, 3, true));
        assert!(!ctx.element_optional(0, 3, false));
    }

    #[test]
    fn usage_tracker() {
        let ctx = Context::new(Config::default(), CustomCode::default());
        assert!(!ctx.is_used("field.F1"));
        ctx.mark_used("field.F1");
        ctx.mark_used("");
        assert!(ctx.is_used("field.F1"));
        assert_eq!(ctx.used_fields().len(), 1);
    }
}
