use std::collections::BTreeMap;

/// A single field's value in a projected index document: either a scalar
/// string or a list of strings. Mirrors the value-or-list-of-values shape
/// the search backend accepts for every field.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn as_list(&self) -> Vec<String> {
        match self {
            FieldValue::Text(s) => vec![s.clone()],
            FieldValue::List(v) => v.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::List(v) => v.is_empty(),
        }
    }

    /// Literal `0`, `0.0` and `"0"` are retained even though they look
    /// empty under a naive truthiness check (spec §4.2 step 14).
    pub fn is_droppable(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::List(v) => v.is_empty(),
        }
    }

    /// The first (or only) scalar text, used where a field is logically a
    /// single string even though it's represented as value-or-list.
    pub fn first_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            FieldValue::List(v) => v.first().map(|s| s.as_str()),
        }
    }

    pub fn push(&mut self, value: String) {
        match self {
            FieldValue::Text(existing) => {
                *self = FieldValue::List(vec![existing.clone(), value]);
            }
            FieldValue::List(v) => v.push(value),
        }
    }

    pub fn dedup(&mut self) {
        if let FieldValue::List(v) = self {
            let mut seen = std::collections::HashSet::new();
            v.retain(|item| seen.insert(item.clone()));
        }
    }

    pub fn dedup_case_insensitive(&mut self) {
        if let FieldValue::List(v) = self {
            let mut seen = std::collections::HashSet::new();
            v.retain(|item| seen.insert(item.to_lowercase()));
        }
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(v: Vec<String>) -> Self {
        FieldValue::List(v)
    }
}

/// An index document: an open map from field name to value. Reserved field
/// names are listed in `crate::RESERVED_FIELDS` but are not otherwise
/// special-cased in the representation.
pub type Document = BTreeMap<String, FieldValue>;

pub const FIELD_ID: &str = "id";
pub const FIELD_RECORDTYPE: &str = "recordtype";
pub const FIELD_FULLRECORD: &str = "fullrecord";
pub const FIELD_ALLFIELDS: &str = "allfields";
pub const FIELD_INSTITUTION: &str = "institution";
pub const FIELD_BUILDING: &str = "building";
pub const FIELD_FIRST_INDEXED: &str = "first_indexed";
pub const FIELD_LAST_INDEXED: &str = "last_indexed";
pub const FIELD_MERGED_BOOLEAN: &str = "merged_boolean";
pub const FIELD_MERGED_CHILD_BOOLEAN: &str = "merged_child_boolean";
pub const FIELD_HIDDEN_COMPONENT_BOOLEAN: &str = "hidden_component_boolean";
pub const FIELD_LOCAL_IDS_STR_MV: &str = "local_ids_str_mv";
pub const FIELD_HIERARCHY_TOP_ID: &str = "hierarchy_top_id";
pub const FIELD_HIERARCHY_PARENT_ID: &str = "hierarchy_parent_id";
pub const FIELD_IS_HIERARCHY_ID: &str = "is_hierarchy_id";
pub const FIELD_HIERARCHY_PARENT_TITLE: &str = "hierarchy_parent_title";
pub const FIELD_IS_HIERARCHY_TITLE: &str = "is_hierarchy_title";
pub const FIELD_CONTAINER_TITLE: &str = "container_title";
pub const FIELD_CONTAINER_VOLUME: &str = "container_volume";
pub const FIELD_CONTAINER_ISSUE: &str = "container_issue";
pub const FIELD_CONTAINER_START_PAGE: &str = "container_start_page";
pub const FIELD_CONTAINER_REFERENCE: &str = "container_reference";
pub const FIELD_FORMAT: &str = "format";
pub const FIELD_THUMBNAIL: &str = "thumbnail";
pub const FIELD_CTRLNUM: &str = "ctrlnum";
pub const FIELD_GEOGRAPHIC_FACET: &str = "geographic_facet";

/// Fields excluded from the `allfields` backfill (spec §4.2 step 10).
pub const ALLFIELDS_EXCLUDED: &[&str] = &[
    FIELD_FULLRECORD,
    FIELD_THUMBNAIL,
    FIELD_ID,
    FIELD_RECORDTYPE,
    FIELD_CTRLNUM,
];

/// Drop fields whose value is empty, retaining literal `0`/`0.0`/`"0"`.
pub fn strip_empty_fields(doc: &mut Document) {
    doc.retain(|_, v| !v.is_droppable());
}

/// Deduplicate every list-valued field by identity (spec §4.2 step 14).
pub fn dedup_all_fields(doc: &mut Document) {
    for value in doc.values_mut() {
        value.dedup();
    }
}

/// Fill `allfields` if absent: concatenate stringified values of every
/// field except the excluded set, joining list fields by space, then
/// case-insensitively dedup the resulting token list.
pub fn backfill_allfields(doc: &mut Document) {
    if doc.contains_key(FIELD_ALLFIELDS) {
        return;
    }
    let mut tokens = Vec::new();
    for (name, value) in doc.iter() {
        if ALLFIELDS_EXCLUDED.contains(&name.as_str()) {
            continue;
        }
        match value {
            FieldValue::Text(s) => tokens.push(s.clone()),
            FieldValue::List(items) => tokens.push(items.join(" ")),
        }
    }
    let mut field = FieldValue::List(tokens);
    field.dedup_case_insensitive();
    doc.insert(FIELD_ALLFIELDS.to_string(), field);
}
