use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// A raw bibliographic record as read from the record store (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(rename = "_id")]
    pub id: String,
    pub source_id: String,
    pub format: String,
    pub oai_id: Option<String>,
    /// Stable local key used by component parts to reference their host.
    pub linking_id: Option<String>,
    /// Set only on a record that is itself a component part.
    pub host_record_id: Option<String>,
    /// Absent for singleton (non-deduplicated) records.
    pub dedup_key: Option<String>,
    /// A record's own dedup anchor when it is the representative of a group.
    pub key: String,
    pub updated: OffsetDateTime,
    pub created: OffsetDateTime,
    pub date: OffsetDateTime,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub update_needed: bool,
    /// The raw metadata payload handed to the format-specific parser.
    pub raw_metadata: String,
}

impl Record {
    pub fn is_component_part(&self) -> bool {
        self.host_record_id.is_some()
    }
}
