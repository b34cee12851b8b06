//! The Pipeline Driver (spec §4.7) and its supporting Performance Meter
//! (§4.8) and Counters (§2 C9), wired over the Record Projector, Merge
//! Engine, Update Buffer, and Record/Watermark stores.

pub mod config;
pub mod counters;
pub mod driver;
pub mod error;
pub mod meter;

pub use config::PipelineConfig;
pub use counters::Counters;
pub use driver::Pipeline;
pub use error::PipelineError;
pub use meter::PerformanceMeter;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use time::OffsetDateTime;
    use unionindex_core::settings::{ComponentParts, DataSourceSettings};
    use unionindex_core::Record;
    use unionindex_project::LineMetadataParserFactory;
    use unionindex_store::{InMemoryRecordStore, InMemoryWatermarkStore};
    use unionindex_transport::{SearchBackend, TransportError};

    #[derive(Default)]
    struct RecordingBackend {
        adds: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
        delete_queries: Mutex<Vec<String>>,
        commits: AtomicUsize,
        commit_longs: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SearchBackend for RecordingBackend {
        async fn post_add_batch(&self, body: String) -> Result<(), TransportError> {
            self.adds.lock().unwrap().push(body);
            Ok(())
        }
        async fn post_delete_batch(&self, body: String) -> Result<(), TransportError> {
            self.deletes.lock().unwrap().push(body);
            Ok(())
        }
        async fn delete_by_query(&self, query: String) -> Result<(), TransportError> {
            self.delete_queries.lock().unwrap().push(query);
            Ok(())
        }
        async fn commit(&self) -> Result<(), TransportError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn commit_long(&self) -> Result<(), TransportError> {
            self.commit_longs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn optimize(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn settings(format: &str) -> DataSourceSettings {
        DataSourceSettings {
            institution: "INST".to_string(),
            format: format.to_string(),
            id_prefix: None,
            component_parts: ComponentParts::AsIs,
            index_merged_parts: true,
            solr_transformation: None,
            field_mappings: HashMap::new(),
            institution_in_building: Default::default(),
        }
    }

    fn record(id: &str, source_id: &str, raw: &str, updated: OffsetDateTime) -> Record {
        Record {
            id: id.to_string(),
            source_id: source_id.to_string(),
            format: "Book".to_string(),
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
            raw_metadata: raw.to_string(),
        }
    }

    fn pipeline(
        store: Arc<InMemoryRecordStore>,
        watermarks: Arc<InMemoryWatermarkStore>,
        backend: Arc<RecordingBackend>,
        data_sources: BTreeMap<String, DataSourceSettings>,
    ) -> Pipeline {
        let config = PipelineConfig { data_sources, ..PipelineConfig::default() };
        Pipeline::new(
            store,
            watermarks,
            backend,
            Arc::new(LineMetadataParserFactory),
            std::collections::HashMap::new(),
            config,
        )
        .unwrap()
    }

    /// S1: a single plain individual record is indexed and committed.
    #[tokio::test]
    async fn s1_update_individual_records_indexes_and_commits() {
        let store = Arc::new(InMemoryRecordStore::new());
        let t0 = OffsetDateTime::UNIX_EPOCH;
        store.put(record("s1.1", "s1", "title=T", t0)).await;

        let watermarks = Arc::new(InMemoryWatermarkStore::new());
        let backend = Arc::new(RecordingBackend::default());
        let mut data_sources = BTreeMap::new();
        data_sources.insert("s1".to_string(), settings("Book"));
        let pipeline =
            pipeline(store.clone(), watermarks.clone(), backend.clone(), data_sources);

        pipeline.update_individual_records(None, Some("s1"), None, false).await.unwrap();

        assert_eq!(backend.adds.lock().unwrap().len(), 1);
        assert!(backend.adds.lock().unwrap()[0].contains("\"s1.1\""));
        assert_eq!(backend.commits.load(Ordering::SeqCst), 1);
        assert!(watermarks.read_individual("s1").await.is_some());
    }

    /// A deleted record is sent as a delete, not an add, and no watermark
    /// advance happens for a single-id pass (spec §4.7).
    #[tokio::test]
    async fn deleted_individual_record_is_deleted_not_indexed() {
        let store = Arc::new(InMemoryRecordStore::new());
        let t0 = OffsetDateTime::UNIX_EPOCH;
        let mut deleted = record("s1.2", "s1", "title=Gone", t0);
        deleted.deleted = true;
        store.put(deleted).await;

        let watermarks = Arc::new(InMemoryWatermarkStore::new());
        let backend = Arc::new(RecordingBackend::default());
        let mut data_sources = BTreeMap::new();
        data_sources.insert("s1".to_string(), settings("Book"));
        let pipeline = pipeline(store, watermarks, backend.clone(), data_sources);

        pipeline.update_individual_records(None, Some("s1"), Some("s1.2"), false).await.unwrap();

        assert!(backend.adds.lock().unwrap().is_empty());
        assert_eq!(backend.deletes.lock().unwrap().len(), 1);
    }

    /// updateIndividualRecords only fails when every matched source fails;
    /// an unconfigured source here is simply absent from `selected_sources`.
    #[tokio::test]
    async fn update_individual_records_with_no_matching_sources_is_a_no_op() {
        let store = Arc::new(InMemoryRecordStore::new());
        let watermarks = Arc::new(InMemoryWatermarkStore::new());
        let backend = Arc::new(RecordingBackend::default());
        let pipeline = pipeline(store, watermarks, backend.clone(), BTreeMap::new());

        pipeline.update_individual_records(None, Some("missing"), None, false).await.unwrap();
        assert_eq!(backend.commits.load(Ordering::SeqCst), 0);
    }

    /// S3: two members of a dedup group fold into one merged document
    /// (spec §4.3, §4.7 Phase A).
    #[tokio::test]
    async fn s3_dedup_group_with_two_members_produces_a_merged_document() {
        let store = Arc::new(InMemoryRecordStore::new());
        let t0 = OffsetDateTime::UNIX_EPOCH;
        let mut a = record("s1.a", "s1", "title=T", t0);
        a.dedup_key = Some("dk1".to_string());
        let mut b = record("s1.b", "s1", "title=T2", t0);
        b.dedup_key = Some("dk1".to_string());
        store.put(a).await;
        store.put(b).await;

        let watermarks = Arc::new(InMemoryWatermarkStore::new());
        let backend = Arc::new(RecordingBackend::default());
        let mut data_sources = BTreeMap::new();
        data_sources.insert("s1".to_string(), settings("Book"));
        let pipeline =
            pipeline(store.clone(), watermarks.clone(), backend.clone(), data_sources);

        pipeline.update_merged_records(None, Some("s1"), None, false, false).await.unwrap();

        let adds = backend.adds.lock().unwrap();
        // Buffered into one batched add call: both live members plus the
        // merged parent document.
        assert_eq!(adds.len(), 1);
        let body = &adds[0];
        assert!(body.contains("\"s1.a\"") && body.contains("\"s1.b\""));
        assert!(body.contains("\"dk1\"") && body.contains("merged_boolean"));
        assert!(watermarks.read_merged().await.is_some());

        // Property 3: each member's `dedup_key != key`, so each member's own
        // id is also enqueued for deletion (the merged document replaces it).
        let deletes = backend.deletes.lock().unwrap();
        assert_eq!(deletes.len(), 1);
        assert!(deletes[0].contains("\"s1.a\"") && deletes[0].contains("\"s1.b\""));
    }

    /// `deleteDataSource` issues a delete-by-query then a long-timeout
    /// commit (spec §4.7).
    #[tokio::test]
    async fn delete_data_source_commits_with_long_timeout() {
        let store = Arc::new(InMemoryRecordStore::new());
        let watermarks = Arc::new(InMemoryWatermarkStore::new());
        let backend = Arc::new(RecordingBackend::default());
        let pipeline = pipeline(store, watermarks, backend.clone(), BTreeMap::new());

        pipeline.delete_data_source("s1").await.unwrap();

        assert_eq!(backend.delete_queries.lock().unwrap().len(), 1);
        assert_eq!(backend.commit_longs.load(Ordering::SeqCst), 1);
        assert_eq!(backend.commits.load(Ordering::SeqCst), 0);
    }

    /// `countValues` tallies a field across a source's live records without
    /// touching the search backend (spec §4.7).
    #[tokio::test]
    async fn count_values_tallies_without_calling_the_backend() {
        let store = Arc::new(InMemoryRecordStore::new());
        let t0 = OffsetDateTime::UNIX_EPOCH;
        store.put(record("s1.1", "s1", "topic=a", t0)).await;
        store.put(record("s1.2", "s1", "topic=a", t0)).await;
        store.put(record("s1.3", "s1", "topic=b", t0)).await;

        let watermarks = Arc::new(InMemoryWatermarkStore::new());
        let backend = Arc::new(RecordingBackend::default());
        let mut data_sources = BTreeMap::new();
        data_sources.insert("s1".to_string(), settings("Book"));
        let pipeline = pipeline(store, watermarks, backend.clone(), data_sources);

        let counts = pipeline.count_values("s1", "topic").await.unwrap();

        assert_eq!(counts, vec![("a".to_string(), 2), ("b".to_string(), 1)]);
        assert!(backend.adds.lock().unwrap().is_empty());
    }
}
