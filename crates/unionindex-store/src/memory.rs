//! An in-memory [`RecordStore`]/[`WatermarkStore`] double, so the pipeline
//! driver and its scenario tests don't need a live Mongo deployment.

use crate::error::StoreError;
use crate::geo::GeoEntry;
use crate::record_store::{
    individual_watermark_key, DedupQuery, IndividualQuery, RecordStore, RecordStream,
    WatermarkStore, MERGED_WATERMARK_KEY,
};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use unionindex_core::Record;

#[derive(Default)]
struct Inner {
    records: HashMap<String, Record>,
    geo: Vec<GeoEntry>,
    aux_groups: HashMap<String, Vec<String>>,
}

/// Records are kept in insertion order inside `records` so iteration order
/// is deterministic across test runs.
pub struct InMemoryRecordStore {
    inner: Mutex<Inner>,
    order: Mutex<Vec<String>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        InMemoryRecordStore { inner: Mutex::new(Inner::default()), order: Mutex::new(Vec::new()) }
    }

    pub async fn put(&self, record: Record) {
        let mut inner = self.inner.lock().await;
        let mut order = self.order.lock().await;
        if !inner.records.contains_key(&record.id) {
            order.push(record.id.clone());
        }
        inner.records.insert(record.id.clone(), record);
    }

    pub async fn put_geo(&self, entry: GeoEntry) {
        self.inner.lock().await.geo.push(entry);
    }

    pub async fn get(&self, id: &str) -> Option<Record> {
        self.inner.lock().await.records.get(id).cloned()
    }

    pub async fn all(&self) -> Vec<Record> {
        let inner = self.inner.lock().await;
        let order = self.order.lock().await;
        order.iter().filter_map(|id| inner.records.get(id).cloned()).collect()
    }

    /// Registers an aux collection's membership directly, bypassing the
    /// map/reduce a real store would run; tests build the grouping they
    /// want to exercise up front.
    pub async fn seed_dedup_group(&self, aux_name: &str, dedup_keys: Vec<String>) {
        self.inner.lock().await.aux_groups.insert(aux_name.to_string(), dedup_keys);
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_individual(record: &Record, query: &IndividualQuery) -> bool {
    if let Some(id) = &query.single_id {
        return record.id == *id;
    }
    if record.source_id != query.source_id || record.update_needed {
        return false;
    }
    match query.from_instant {
        Some(from) => record.updated >= from,
        None => true,
    }
}

fn matches_dedup(record: &Record, query: &DedupQuery, dedup_key_exists: bool) -> bool {
    if let Some(id) = &query.single_id {
        return record.id == *id;
    }
    if record.source_id != query.source_id {
        return false;
    }
    if record.dedup_key.is_some() != dedup_key_exists {
        return false;
    }
    if !query.ignore_update_needed && record.update_needed {
        return false;
    }
    match query.from_instant {
        Some(from) => record.updated >= from,
        None => true,
    }
}

#[async_trait::async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn find_individual(&self, query: IndividualQuery) -> Result<RecordStream, StoreError> {
        let mut matched: Vec<Record> =
            self.all().await.into_iter().filter(|r| matches_individual(r, &query)).collect();
        matched.sort_by_key(|r| r.updated);
        let stream: RecordStream = stream::iter(matched.into_iter().map(Ok)).boxed();
        Ok(stream)
    }

    async fn find_residual(&self, query: DedupQuery) -> Result<RecordStream, StoreError> {
        let matched: Vec<Record> =
            self.all().await.into_iter().filter(|r| matches_dedup(r, &query, false)).collect();
        let stream: RecordStream = stream::iter(matched.into_iter().map(Ok)).boxed();
        Ok(stream)
    }

    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .all()
            .await
            .into_iter()
            .filter(|r| r.dedup_key.as_deref() == Some(dedup_key))
            .collect())
    }

    async fn find_components_of(
        &self,
        source_id: &str,
        linking_id: &str,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .all()
            .await
            .into_iter()
            .filter(|r| {
                r.source_id == source_id
                    && r.host_record_id.as_deref() == Some(linking_id)
                    && !r.deleted
            })
            .collect())
    }

    async fn find_host(&self, source_id: &str, linking_id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self
            .all()
            .await
            .into_iter()
            .find(|r| r.source_id == source_id && r.linking_id.as_deref() == Some(linking_id)))
    }

    async fn other_live_record_claims_key(
        &self,
        key: &str,
        exclude_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(self
            .all()
            .await
            .into_iter()
            .any(|r| r.dedup_key.as_deref() == Some(key) && !r.deleted && r.id != exclude_id))
    }

    async fn build_dedup_group_aux(&self, query: &DedupQuery) -> Result<String, StoreError> {
        let name = format!("mr_record_memory_{}", query.source_id);
        let keys: Vec<String> = self
            .all()
            .await
            .into_iter()
            .filter(|r| matches_dedup(r, query, true))
            .filter_map(|r| r.dedup_key)
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        self.seed_dedup_group(&name, keys).await;
        Ok(name)
    }

    async fn dedup_group_keys(
        &self,
        aux_collection: &str,
    ) -> Result<futures::stream::BoxStream<'static, Result<String, StoreError>>, StoreError> {
        let keys = self.inner.lock().await.aux_groups.get(aux_collection).cloned().unwrap_or_default();
        Ok(stream::iter(keys.into_iter().map(Ok)).boxed())
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.lock().await.aux_groups.keys().cloned().collect())
    }

    async fn geo_lookup(&self, place: &str) -> Result<Vec<GeoEntry>, StoreError> {
        let needle = place.to_uppercase();
        let needle = needle.trim();
        let mut matches: Vec<GeoEntry> = self
            .inner
            .lock()
            .await
            .geo
            .iter()
            .filter(|g| g.place == needle)
            .cloned()
            .collect();
        matches.sort_by(|a, b| a.importance.cmp(&b.importance));
        Ok(matches)
    }
}

/// An in-memory [`WatermarkStore`], keyed the same way
/// [`individual_watermark_key`] and [`MERGED_WATERMARK_KEY`] do.
pub struct InMemoryWatermarkStore {
    values: Mutex<HashMap<String, OffsetDateTime>>,
}

impl InMemoryWatermarkStore {
    pub fn new() -> Self {
        InMemoryWatermarkStore { values: Mutex::new(HashMap::new()) }
    }

    /// Shorthand for the per-source watermark, used by tests that don't
    /// want to spell out [`individual_watermark_key`] themselves.
    pub async fn read_individual(&self, source_id: &str) -> Option<OffsetDateTime> {
        self.values.lock().await.get(&individual_watermark_key(source_id)).copied()
    }

    pub async fn read_merged(&self) -> Option<OffsetDateTime> {
        self.values.lock().await.get(MERGED_WATERMARK_KEY).copied()
    }
}

impl Default for InMemoryWatermarkStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl WatermarkStore for InMemoryWatermarkStore {
    async fn read(&self, key: &str) -> Result<Option<OffsetDateTime>, StoreError> {
        Ok(self.values.lock().await.get(key).copied())
    }

    async fn write(&self, key: &str, instant: OffsetDateTime) -> Result<(), StoreError> {
        self.values.lock().await.insert(key.to_string(), instant);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn record(id: &str, source_id: &str, updated: OffsetDateTime) -> Record {
        Record {
            id: id.to_string(),
            source_id: source_id.to_string(),
            format: "MarcXML".to_string(),
            oai_id: None,
            linking_id: None,
            host_record_id: None,
            dedup_key: None,
            key: id.to_string(),
            updated,
            created: updated,
            date: updated,
            deleted: false,
            update_needed: false,
            raw_metadata: String::new(),
        }
    }

    #[tokio::test]
    async fn find_individual_filters_by_source_and_watermark() {
        let store = InMemoryRecordStore::new();
        let t0 = OffsetDateTime::UNIX_EPOCH;
        let t1 = t0 + time::Duration::seconds(100);
        store.put(record("a", "alpha", t0)).await;
        store.put(record("b", "alpha", t1)).await;
        store.put(record("c", "beta", t1)).await;

        let query = IndividualQuery {
            source_id: "alpha".to_string(),
            from_instant: Some(t1),
            single_id: None,
        };
        let found: Vec<Record> = store.find_individual(query).await.unwrap().try_collect().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b");
    }

    #[tokio::test]
    async fn watermark_roundtrips() {
        let store = InMemoryWatermarkStore::new();
        let when = OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(10);
        store.write(MERGED_WATERMARK_KEY, when).await.unwrap();
        assert_eq!(store.read_merged().await, Some(when));
    }

    #[tokio::test]
    async fn dedup_group_round_trips_through_aux_naming() {
        let store = InMemoryRecordStore::new();
        let t0 = OffsetDateTime::UNIX_EPOCH;
        let mut a = record("a", "alpha", t0);
        a.dedup_key = Some("dk1".to_string());
        let mut b = record("b", "alpha", t0);
        b.dedup_key = Some("dk1".to_string());
        store.put(a).await;
        store.put(b).await;

        let query = DedupQuery {
            source_id: "alpha".to_string(),
            from_instant: None,
            from_date: None,
            single_id: None,
            ignore_update_needed: false,
        };
        let name = store.build_dedup_group_aux(&query).await.unwrap();
        let keys: Vec<String> = store.dedup_group_keys(&name).await.unwrap().try_collect().await.unwrap();
        assert_eq!(keys, vec!["dk1".to_string()]);
    }
}
