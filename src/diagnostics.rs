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

//! Preparation-phase diagnostics.

use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files;
use codespan_reporting::term;
use codespan_reporting::term::termcolor;
use std::fmt;

/// File identifier.
/// References a source file in the source database.
pub type FileId = usize;

/// Source database.
/// Stores the source file contents for reference.
pub type SourceDatabase = files::SimpleFiles<String, String>;

/// List of unique errors reported as preparation diagnostics.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    /// Two schema constructs collapse onto the same generated identifier,
    /// or otherwise cannot coexist (duplicate member names, duplicate
    /// special values without the non-unique override).
    StructuralConflict = 1,
    /// Requested configuration the generator cannot express, e.g.
    /// version-dependent variant members.
    UnsupportedConfiguration = 2,
    /// A `$field` or external reference names a field that does not exist.
    UndeclaredFieldReference = 3,
    /// A literal in a condition expression is not parseable as the
    /// referenced field's declared type.
    InvalidConditionValue = 4,
    /// A condition expression does not match the condition grammar.
    InvalidConditionSyntax = 5,
    /// Too many variant members for the dispatch tables of the target
    /// library.
    TooManyVariantMembers = 6,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "E{}", *self as u16)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        format!("{}", code)
    }
}

/// Aggregate preparation diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic<FileId>>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn push(&mut self, diagnostic: Diagnostic<FileId>) {
        self.diagnostics.push(diagnostic)
    }

    /// Report an error against the named schema field.
    pub fn push_error(&mut self, code: ErrorCode, field: &str, message: impl Into<String>) {
        self.push(
            Diagnostic::error()
                .with_code(code)
                .with_message(format!("field `{}`: {}", field, message.into())),
        );
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.diagnostics.extend(other.diagnostics);
    }

    pub fn err_or<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn emit(
        &self,
        sources: &SourceDatabase,
        writer: &mut dyn termcolor::WriteColor,
    ) -> Result<(), files::Error> {
        let config = term::Config::default();
        for d in self.diagnostics.iter() {
            term::emit(writer, &config, sources, d)?;
        }
        Ok(())
    }
}

/// Build a single-error diagnostics value.
pub fn error(code: ErrorCode, field: &str, message: impl Into<String>) -> Diagnostics {
    let mut diagnostics = Diagnostics::default();
    diagnostics.push_error(code, field, message);
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_render_with_prefix() {
        assert_eq!(format!("{}", ErrorCode::StructuralConflict), "E1");
        assert_eq!(format!("{}", ErrorCode::UnsupportedConfiguration), "E2");
    }

    #[test]
    fn err_or_reports_accumulated_errors() {
        let empty = Diagnostics::default();
        assert_eq!(empty.err_or(5).unwrap(), 5);

        let failed = error(ErrorCode::StructuralConflict, "f1", "duplicate member");
        assert!(failed.err_or(5).is_err());
    }

    #[test]
    fn merge_accumulates() {
        let mut all = Diagnostics::default();
        all.merge(error(ErrorCode::StructuralConflict, "a", "x"));
        all.merge(error(ErrorCode::InvalidConditionValue, "b", "y"));
        assert_eq!(all.diagnostics.len(), 2);
    }
}
