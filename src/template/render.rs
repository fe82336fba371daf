//! `{{placeholder}}` substitution.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").unwrap());

/// Variables available to a template.
pub type TemplateVars = HashMap<String, String>;

/// Replace every `{{name}}` with its value; unknown names render empty.
pub fn render_template(content: &str, vars: &TemplateVars) -> String {
    PLACEHOLDER
        .replace_all(content, |caps: &Captures<'_>| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}
