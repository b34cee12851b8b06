use crate::error::StoreError;
use crate::geo::GeoEntry;
use futures::stream::BoxStream;
use time::OffsetDateTime;
use unionindex_core::Record;

pub type RecordStream = BoxStream<'static, Result<Record, StoreError>>;

/// A query window for the individual-records pass (spec §4.7).
#[derive(Debug, Clone)]
pub struct IndividualQuery {
    pub source_id: String,
    pub from_instant: Option<OffsetDateTime>,
    pub single_id: Option<String>,
}

/// A query window for a dedup-group or residual-individuals pass (spec §4.7).
#[derive(Debug, Clone)]
pub struct DedupQuery {
    pub source_id: String,
    pub from_instant: Option<OffsetDateTime>,
    pub from_date: Option<String>,
    pub single_id: Option<String>,
    pub ignore_update_needed: bool,
}

/// The record store (spec §6): collection `record` plus the `location`
/// collection and the server-side map/reduce primitive that materializes
/// dedup-group auxiliary collections.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn find_individual(&self, query: IndividualQuery) -> Result<RecordStream, StoreError>;

    /// Records with `dedup_key absent` under the residual-individuals query.
    async fn find_residual(&self, query: DedupQuery) -> Result<RecordStream, StoreError>;

    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Vec<Record>, StoreError>;

    async fn find_components_of(
        &self,
        source_id: &str,
        linking_id: &str,
    ) -> Result<Vec<Record>, StoreError>;

    async fn find_host(&self, source_id: &str, linking_id: &str) -> Result<Option<Record>, StoreError>;

    /// `true` iff some other live record has `key == dedup_key` (used by
    /// Phase B's orphaned-merged-doc cleanup, spec §4.7 Phase B).
    async fn other_live_record_claims_key(
        &self,
        key: &str,
        exclude_id: &str,
    ) -> Result<bool, StoreError>;

    /// Build (or reuse) the auxiliary `(dedup_key -> count)` collection for
    /// `query` via a server-side map/reduce, returning its name. Stale
    /// `mr_record_*` collections with a different suffix are dropped.
    async fn build_dedup_group_aux(&self, query: &DedupQuery) -> Result<String, StoreError>;

    /// Stream the dedup keys recorded in the named auxiliary collection.
    async fn dedup_group_keys(&self, aux_collection: &str) -> Result<BoxStream<'static, Result<String, StoreError>>, StoreError>;

    async fn list_collections(&self) -> Result<Vec<String>, StoreError>;

    async fn geo_lookup(&self, place: &str) -> Result<Vec<GeoEntry>, StoreError>;
}

/// Persisted "last successful indexing instant" watermarks (spec §4.6).
#[async_trait::async_trait]
pub trait WatermarkStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<OffsetDateTime>, StoreError>;
    async fn write(&self, key: &str, instant: OffsetDateTime) -> Result<(), StoreError>;
}

pub fn individual_watermark_key(source_id: &str) -> String {
    format!("Last Index Update {source_id}")
}

pub const MERGED_WATERMARK_KEY: &str = "Last Index Update";
