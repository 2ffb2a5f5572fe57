//! Template variable resolution.
//!
//! Templates embed placeholders of the form `{{ name }}`:
//! - `{{ global.<key> }}` reads a global variable;
//! - `{{ <ref>.<field> }}` reads a field of an earlier result in the branch
//!   (`stdout`, `stderr`, `exit_code`, `path`, `error`, `status`).
//!
//! Anything that cannot be resolved is left in place verbatim, so a partially
//! configured workflow still shows what it would have run.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::context::{ExecutionContext, GlobalVariables};

const GLOBAL_PREFIX: &str = "global";

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").unwrap())
}

/// A reference found in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    /// `global.<key>`
    Global(String),
    /// `<ref>.<field>`
    Result { ref_name: String, field: String },
    /// Anything without a dot, or with an empty part.
    Unrecognized(String),
}

impl Placeholder {
    fn parse(name: &str) -> Self {
        match name.split_once('.') {
            Some((GLOBAL_PREFIX, key)) if !key.is_empty() => Self::Global(key.to_string()),
            Some((ref_name, field)) if !ref_name.is_empty() && !field.is_empty() => Self::Result {
                ref_name: ref_name.to_string(),
                field: field.to_string(),
            },
            _ => Self::Unrecognized(name.to_string()),
        }
    }
}

/// Substitute every resolvable placeholder in `template`.
///
/// Single pass: substituted values are never scanned again. Never fails.
pub fn resolve(template: &str, context: &ExecutionContext, globals: &GlobalVariables) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            let whole = &caps[0];
            match Placeholder::parse(&caps[1]) {
                Placeholder::Global(key) => globals
                    .get(&key)
                    .map(str::to_string)
                    .unwrap_or_else(|| whole.to_string()),
                Placeholder::Result { ref_name, field } => context
                    .get(&ref_name)
                    .and_then(|r| r.field(&field))
                    .unwrap_or_else(|| whole.to_string()),
                Placeholder::Unrecognized(_) => whole.to_string(),
            }
        })
        .into_owned()
}

/// List the references a template makes, in order of appearance.
pub fn placeholders(template: &str) -> Vec<Placeholder> {
    placeholder_re()
        .captures_iter(template)
        .map(|caps| Placeholder::parse(&caps[1]))
        .collect()
}
