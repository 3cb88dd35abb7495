//! Builder output validation.
//!
//! Checks are static: the code is lexed, never imported or executed.

use crate::validators::extract::strip_code_fences;
use crate::validators::python;
use crate::validators::secrets::find_secret;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Language the Builder is asked to produce.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetLanguage {
    #[default]
    Python,
}

impl TargetLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetLanguage::Python => "python",
        }
    }

    /// File extension used when storing generated code.
    pub fn extension(&self) -> &'static str {
        match self {
            TargetLanguage::Python => "py",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            TargetLanguage::Python => "Python",
        }
    }
}

impl fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What generated code must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeCheck {
    pub language: TargetLanguage,
    /// Name that must be bound at module top level.
    pub entry_point: String,
}

impl CodeCheck {
    pub fn new(language: TargetLanguage, entry_point: impl Into<String>) -> Self {
        Self {
            language,
            entry_point: entry_point.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodeViolation {
    #[error("generated code is empty")]
    Empty,

    #[error("syntax error on line {line}: {detail}")]
    Syntax { line: usize, detail: String },

    #[error("entry point `{name}` is not defined at module top level (expected an assignment, def or class named `{name}`)")]
    MissingEntryPoint { name: String },

    #[error("line {line} embeds a literal secret ({description}); read credentials from environment variables instead")]
    EmbeddedSecret {
        pattern_id: &'static str,
        description: &'static str,
        line: usize,
    },
}

/// Validates Builder output and returns the code with fences removed.
pub fn validate_code(raw: &str, check: &CodeCheck) -> Result<String, CodeViolation> {
    let code = strip_code_fences(raw);
    if code.trim().is_empty() {
        return Err(CodeViolation::Empty);
    }

    match check.language {
        TargetLanguage::Python => check_python(&code, &check.entry_point)?,
    }

    if let Some(found) = find_secret(&code) {
        return Err(CodeViolation::EmbeddedSecret {
            pattern_id: found.pattern_id,
            description: found.description,
            line: found.line,
        });
    }

    Ok(code)
}

fn check_python(code: &str, entry_point: &str) -> Result<(), CodeViolation> {
    let outline = python::check(code).map_err(|e| CodeViolation::Syntax {
        line: e.line,
        detail: e.detail,
    })?;

    let name = regex::escape(entry_point);
    let binding = Regex::new(&format!(
        r"^(?:{name}\s*(?::[^=]*)?=[^=]|(?:async\s+)?def\s+{name}\s*\(|class\s+{name}\b|from\s+\S+\s+import\s+.*\b{name}\b|import\s+.*\bas\s+{name}\b)",
        name = name
    ))
    .map_err(|_| CodeViolation::MissingEntryPoint {
        name: entry_point.to_string(),
    })?;

    let lines: Vec<&str> = code.lines().collect();
    let bound = outline
        .top_level_lines
        .iter()
        .filter_map(|n| lines.get(n - 1))
        .any(|line| binding.is_match(line));

    if bound {
        Ok(())
    } else {
        Err(CodeViolation::MissingEntryPoint {
            name: entry_point.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "tests/code_tests.rs"]
mod tests;
