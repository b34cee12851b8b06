use crate::document::{Document, FieldValue};

/// Expand every value `"a/b/c"` of a hierarchical facet into the rung
/// sequence `["0/a", "1/a/b", "2/a/b/c"]` (spec §4.2 step 9, invariant 7).
pub fn expand_hierarchical_value(value: &str) -> Vec<String> {
    let parts: Vec<&str> = value.split('/').collect();
    let mut out = Vec::with_capacity(parts.len());
    for (level, _) in parts.iter().enumerate() {
        let prefix = parts[..=level].join("/");
        out.push(format!("{level}/{prefix}"));
    }
    out
}

/// Apply hierarchical expansion in place to every value of `field_name`,
/// preserving per-value rung ordering (prefix-by-prefix) before any dedup.
pub fn expand_hierarchical_facet(doc: &mut Document, field_name: &str) {
    let Some(existing) = doc.get(field_name) else {
        return;
    };
    let values = existing.as_list();
    let mut expanded = Vec::new();
    for value in &values {
        expanded.extend(expand_hierarchical_value(value));
    }
    doc.insert(field_name.to_string(), FieldValue::List(expanded));
}

/// Prefix every existing `building` value with `"<code>/"`, or set
/// `building = [<code>]` when absent (spec §4.2 step 8). `code` may be
/// empty, in which case no prefix is applied and an absent field stays
/// absent.
pub fn apply_building_prefix(doc: &mut Document, code: &str, field_name: &str) {
    if code.is_empty() {
        return;
    }
    match doc.get(field_name) {
        Some(existing) => {
            let prefixed: Vec<String> =
                existing.as_list().iter().map(|v| format!("{code}/{v}")).collect();
            doc.insert(field_name.to_string(), FieldValue::List(prefixed));
        }
        None => {
            doc.insert(field_name.to_string(), FieldValue::List(vec![code.to_string()]));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_single_value() {
        assert_eq!(
            expand_hierarchical_value("a/b/c"),
            vec!["0/a", "1/a/b", "2/a/b/c"]
        );
    }

    #[test]
    fn s4_building_prefix_then_expand() {
        let mut doc = Document::new();
        doc.insert(
            "building".to_string(),
            FieldValue::List(vec!["Main/Floor1".into(), "Main/Floor2".into()]),
        );
        apply_building_prefix(&mut doc, "INST", "building");
        expand_hierarchical_facet(&mut doc, "building");
        assert_eq!(
            doc.get("building").unwrap().as_list(),
            vec![
                "0/INST", "1/INST/Main", "2/INST/Main/Floor1", "0/INST", "1/INST/Main",
                "2/INST/Main/Floor2"
            ]
        );
    }
}
