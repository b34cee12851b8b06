//! The on-disk YAML configuration surface (spec §6): `[mongo]`/`[solr]`
//! connection settings plus the per-source settings the driver needs.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use unionindex_core::settings::{DataSourceSettings, FormatSets};
use unionindex_transport::SolrConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub mongo: MongoConfig,
    pub solr: SolrConfig,
    #[serde(default)]
    pub data_sources: BTreeMap<String, DataSourceSettings>,
    #[serde(default)]
    pub format_sets: FormatSets,
    #[serde(default)]
    pub hierarchical_facets: Vec<String>,
    #[serde(default)]
    pub merged_fields: Option<Vec<String>>,
    #[serde(default)]
    pub geocoding_field: Option<String>,
    #[serde(default)]
    pub allow_unbounded_dedup_pass: bool,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?;
        Ok(config)
    }
}
