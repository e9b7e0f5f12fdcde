//! `{@name}` string substitution
//!
//! Tokens resolve against the hijack map first, then the variable stack.
//! Unresolved tokens stay in the output unchanged. After substitution the
//! two-character sequence `\n` becomes a newline. Nothing is cached: callers
//! substitute each time they use a value so they always see current
//! variable contents.

use std::collections::BTreeMap;

use crate::vars::Vars;

/// Externally supplied values that override script variables
pub type HijackMap = BTreeMap<String, String>;

const TOKEN_OPEN: &str = "{@";

/// Resolve every `{@name}` token in `raw`
pub fn substitute(raw: &str, hijacks: &HijackMap, vars: &Vars) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find(TOKEN_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + TOKEN_OPEN.len()..];

        let Some(close) = after_open.find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };

        let name = &after_open[..close];
        let token = &rest[start..start + TOKEN_OPEN.len() + close + 1];

        match resolve(name, hijacks, vars) {
            Some(value) if !name.is_empty() => out.push_str(value),
            _ => out.push_str(token),
        }
        rest = &after_open[close + 1..];
    }
    out.push_str(rest);

    out.replace("\\n", "\n")
}

fn resolve<'a>(name: &str, hijacks: &'a HijackMap, vars: &'a Vars) -> Option<&'a str> {
    hijacks
        .get(name)
        .map(String::as_str)
        .or_else(|| vars.get(name))
}
