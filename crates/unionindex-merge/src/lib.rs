//! Merge Engine (spec §4.3): combines per-record projections for a dedup
//! group into a single merged document under a per-field policy.

use unionindex_core::document::{FIELD_ALLFIELDS, FIELD_FULLRECORD, FIELD_ID};
use unionindex_core::settings::checked_fields;
use unionindex_core::{Document, FieldValue};

/// Accumulates a dedup group's children into one merged document.
pub struct MergeEngine<'a> {
    merged_fields: &'a [String],
}

impl<'a> MergeEngine<'a> {
    pub fn new(merged_fields: &'a [String]) -> Self {
        MergeEngine { merged_fields }
    }

    fn is_multiplicity(&self, field: &str) -> bool {
        field.ends_with("_mv") || self.merged_fields.iter().any(|f| f == field)
    }

    /// Fold one child's projection into `acc`. `local_ids` accumulates the
    /// group's `local_ids_str_mv`; `is_first` must be true exactly for the
    /// first child folded into an otherwise-empty accumulator.
    pub fn merge(
        &self,
        acc: &mut Document,
        local_ids: &mut Vec<String>,
        is_first: bool,
        child_id: &str,
        child: &Document,
    ) {
        local_ids.push(child_id.to_string());

        for (name, value) in child {
            if name == FIELD_ALLFIELDS || self.is_multiplicity(name) {
                append_multiplicity(acc, name, value);
            } else if checked_fields().contains(&name.as_str()) {
                acc.entry(name.clone()).or_insert_with(|| value.clone());
            } else if is_first {
                acc.entry(name.clone()).or_insert_with(|| value.clone());
            }
            // Non-checked, non-multiplicity fields from later children are ignored.
        }

        if is_first {
            acc.remove(FIELD_ID);
            acc.remove(FIELD_FULLRECORD);
        }
    }

    /// Case-insensitively deduplicate every multiplicity field and
    /// `allfields` once, at group end (spec §4.3, §4.7 step 4).
    pub fn finalize(&self, acc: &mut Document) {
        let names: Vec<String> = acc
            .keys()
            .filter(|name| name.as_str() == FIELD_ALLFIELDS || self.is_multiplicity(name))
            .cloned()
            .collect();
        for name in names {
            if let Some(value) = acc.get_mut(&name) {
                value.dedup_case_insensitive();
            }
        }
    }
}

fn append_multiplicity(acc: &mut Document, name: &str, child_value: &FieldValue) {
    let child_items = child_value.as_list();
    match acc.get_mut(name) {
        Some(existing) => {
            for item in child_items {
                existing.push(item);
            }
        }
        None => {
            acc.insert(name.to_string(), FieldValue::List(child_items));
        }
    }
}
