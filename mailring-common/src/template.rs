//! `{{variable}}` placeholders in subjects and bodies.
//!
//! Multi-receiver providers substitute variables themselves and only need the
//! placeholder syntax rewritten into theirs ([`rewrite`]). Providers that send
//! one receiver per call get the content rendered locally ([`render`]).

use std::collections::BTreeMap;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Substitute every `{{ key }}` with its value; unknown keys render empty.
#[must_use]
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> String {
    replace(template, |out, key| {
        if let Some(value) = variables.get(key) {
            out.push_str(value);
        }
    })
}

/// Rewrite `{{ key }}` into a provider's own placeholder delimiters
#[must_use]
pub fn rewrite(template: &str, open: &str, close: &str) -> String {
    replace(template, |out, key| {
        out.push_str(open);
        out.push_str(key);
        out.push_str(close);
    })
}

fn replace(template: &str, mut placeholder: impl FnMut(&mut String, &str)) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find(OPEN) {
        let after = &rest[start + OPEN.len()..];
        let Some(end) = after.find(CLOSE) else {
            break;
        };

        out.push_str(&rest[..start]);
        placeholder(&mut out, after[..end].trim());
        rest = &after[end + CLOSE.len()..];
    }

    out.push_str(rest);
    out
}
