//! Expansion of the `--output-box` template.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, TimeZone};
use std::fmt::{self, Write};

/// Length in bytes of the conversion specifier at the start of `s`, which
/// starts with `%`. It covers one optional padding flag (`-`, `_`, `0`) or
/// colon (as in `%:z`) followed by a single character.
fn specifier_len(s: &str) -> usize {
    let mut chars = s.char_indices().skip(1);
    match chars.next() {
        Some((_, '-')) | Some((_, '_')) | Some((_, '0')) | Some((_, ':')) => chars
            .next()
            .map_or(s.len(), |(i, c)| i + c.len_utf8()),
        Some((i, c)) => i + c.len_utf8(),
        None => s.len(),
    }
}

fn expand<Tz: TimeZone>(specifier: &str, ts: &DateTime<Tz>) -> Option<String>
where
    Tz::Offset: fmt::Display,
{
    let items: Vec<Item> = StrftimeItems::new(specifier).collect();
    if items.is_empty() || items.iter().any(|item| matches!(item, Item::Error)) {
        return None;
    }
    let mut result = String::new();
    write!(result, "{}", ts.format_with_items(items.iter())).ok()?;
    Some(result)
}

/// Expands every conversion specifier in `template` against `ts`, the way
/// strftime(3) does. Specifiers which are not recognized are copied to the
/// output as they are.
pub fn resolve<Tz: TimeZone>(template: &str, ts: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    let mut result = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find('%') {
        result.push_str(&rest[..pos]);
        rest = &rest[pos..];
        let len = specifier_len(rest);
        let specifier = &rest[..len];
        match expand(specifier, ts) {
            Some(expanded) => result.push_str(&expanded),
            None => result.push_str(specifier),
        }
        rest = &rest[len..];
    }
    result.push_str(rest);
    result
}
