use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-`source_id` behavior for records that are themselves component parts,
/// and for merging a host's components into its own document (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentParts {
    AsIs,
    MergeAll,
    MergeNonArticles,
    MergeNonEarticles,
}

impl Default for ComponentParts {
    fn default() -> Self {
        ComponentParts::AsIs
    }
}

/// Where the institution code used to prefix hierarchical `building` values
/// comes from (spec §3, §4.2 step 8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionInBuilding {
    Driver,
    None,
    Source,
    /// Use the data source's configured institution (the "else" branch).
    Unset,
}

impl Default for InstitutionInBuilding {
    fn default() -> Self {
        InstitutionInBuilding::Unset
    }
}

/// Settings for one `source_id` (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceSettings {
    pub institution: String,
    pub format: String,
    #[serde(default)]
    pub id_prefix: Option<String>,
    #[serde(default)]
    pub component_parts: ComponentParts,
    #[serde(default = "default_true")]
    pub index_merged_parts: bool,
    #[serde(default)]
    pub solr_transformation: Option<String>,
    /// `<field>_mapping` tables: field name -> path to mapping file.
    #[serde(default)]
    pub field_mappings: HashMap<String, String>,
    #[serde(default)]
    pub institution_in_building: InstitutionInBuilding,
}

fn default_true() -> bool {
    true
}

impl DataSourceSettings {
    pub fn id_prefix_or_source(&self, source_id: &str) -> String {
        self.id_prefix.clone().unwrap_or_else(|| source_id.to_string())
    }

    pub fn validate(&self, source_id: &str) -> Result<(), ConfigError> {
        if self.institution.is_empty() {
            return Err(ConfigError::MissingRequiredField {
                source_id: source_id.to_string(),
                field: "institution",
            });
        }
        if self.format.is_empty() {
            return Err(ConfigError::MissingRequiredField {
                source_id: source_id.to_string(),
                field: "format",
            });
        }
        Ok(())
    }
}

/// Format classification sets controlling merge/hide decisions (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatSets {
    #[serde(default)]
    pub journal_formats: Vec<String>,
    #[serde(default)]
    pub ejournal_formats: Vec<String>,
    #[serde(default)]
    pub article_formats: Vec<String>,
    #[serde(default)]
    pub earticle_formats: Vec<String>,
}

impl FormatSets {
    pub fn all_journal_formats(&self) -> Vec<String> {
        union(&self.journal_formats, &self.ejournal_formats)
    }

    pub fn all_article_formats(&self) -> Vec<String> {
        union(&self.article_formats, &self.earticle_formats)
    }
}

fn union(a: &[String], b: &[String]) -> Vec<String> {
    let mut out = a.to_vec();
    for item in b {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

/// Default merged-field list (spec §3); overridable by config.
pub fn default_merged_fields() -> Vec<String> {
    [
        "institution",
        "collection",
        "building",
        "language",
        "physical",
        "publisher",
        "publishDate",
        "contents",
        "url",
        "ctrlnum",
        "author2",
        "author_additional",
        "title_alt",
        "title_old",
        "title_new",
        "dateSpan",
        "series",
        "series2",
        "topic",
        "genre",
        "geographic",
        "era",
        "long_lat",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Fields taken from only the first child on merge (spec §4.3).
pub fn checked_fields() -> &'static [&'static str] {
    &["title_auth", "title", "title_short", "title_full", "title_sort", "author"]
}
