//! The pipeline-facing slice of the configuration surface (spec §6): the
//! parts the driver needs directly, independent of which `RecordStore` or
//! `SearchBackend` the caller wired up. The YAML `[Solr]`/`[Mongo]`
//! sections that select those concrete backends are the CLI's concern.

use std::collections::BTreeMap;
use unionindex_core::settings::{default_merged_fields, DataSourceSettings, FormatSets};
use unionindex_buffer::BufferConfig;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// A `BTreeMap` so `updateIndividualRecords`/`updateMergedRecords` visit
    /// sources in a deterministic order (spec §4.7).
    pub data_sources: BTreeMap<String, DataSourceSettings>,
    pub format_sets: FormatSets,
    /// Facet names expanded to indexed prefixes; includes `"building"` to
    /// enable the institution prefix (spec §6).
    pub hierarchical_facets: Vec<String>,
    pub merged_fields: Vec<String>,
    pub geocoding_field: Option<String>,
    pub buffer: BufferConfig,
    /// Spec §9 open question, pinned behind this flag: an empty dedup-group
    /// filter (e.g. no `fromInstant`, no `sourceId`, no `singleId`) means
    /// "no records" unless explicitly allowed.
    pub allow_unbounded_dedup_pass: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_sources: BTreeMap::new(),
            format_sets: FormatSets::default(),
            hierarchical_facets: Vec::new(),
            merged_fields: default_merged_fields(),
            geocoding_field: None,
            buffer: BufferConfig { max_update_records: 5_000, max_update_size_bytes: 1024 * 1024, commit_interval: 50_000 },
            allow_unbounded_dedup_pass: false,
        }
    }
}
