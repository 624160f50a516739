//! Schema-driven field extraction from extracted document text.
//!
//! A schema maps each output field to the label that introduces it in the
//! text, e.g. `{"name": "Applicant Name"}` picks the value out of a line
//! `Applicant Name: Priya Sharma`. The value runs from after the colon to the
//! end of that line. When the label is absent the field name itself is tried
//! as a label. Fields found under neither are left out of the result.

use std::collections::BTreeMap;

/// Pull `label: value` pairs out of `text` for every field in `schema`.
///
/// Matching is case-sensitive and uses the first occurrence of the label.
pub fn extract_fields(text: &str, schema: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    schema
        .iter()
        .filter_map(|(field, label)| {
            let value = (!label.is_empty())
                .then(|| value_after(text, label))
                .flatten()
                .or_else(|| value_after(text, field))?;
            Some((field.clone(), value.to_string()))
        })
        .collect()
}

fn value_after<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    let needle = format!("{label}:");
    let start = text.find(&needle)? + needle.len();
    let rest = &text[start..];
    let end = rest.find('\n').unwrap_or(rest.len());
    Some(rest[..end].trim())
}

/// Parse `field` or `field=Label` CLI specs into a schema. A bare field is
/// its own label.
pub fn parse_schema<S: AsRef<str>>(specs: &[S]) -> BTreeMap<String, String> {
    specs
        .iter()
        .filter_map(|spec| {
            let spec = spec.as_ref();
            let (field, label) = spec.split_once('=').unwrap_or((spec, spec));
            let field = field.trim();
            (!field.is_empty()).then(|| (field.to_string(), label.trim().to_string()))
        })
        .collect()
}
