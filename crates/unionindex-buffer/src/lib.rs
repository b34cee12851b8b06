//! Update Buffer (spec §4.4): accumulates additions and deletions, flushing
//! by record count, byte size, or explicit flush, and issuing intermediate
//! commits on a configurable cadence.

use unionindex_core::document::FIELD_ALLFIELDS;
use unionindex_core::{Document, FieldValue};
use unionindex_transport::{SearchBackend, TransportError};

const DELETE_FLUSH_THRESHOLD: usize = 1_000;

#[derive(Debug, Clone)]
pub struct BufferConfig {
    pub max_update_records: usize,
    pub max_update_size_bytes: usize,
    pub commit_interval: u64,
}

pub struct UpdateBuffer<'a> {
    backend: &'a dyn SearchBackend,
    config: BufferConfig,
    add_batch: Vec<String>,
    add_bytes: usize,
    delete_batch: Vec<String>,
}

impl<'a> UpdateBuffer<'a> {
    pub fn new(backend: &'a dyn SearchBackend, config: BufferConfig) -> Self {
        UpdateBuffer { backend, config, add_batch: Vec::new(), add_bytes: 0, delete_batch: Vec::new() }
    }

    /// Append `doc` to the add-batch, flushing it if a ceiling is crossed,
    /// then issuing an intermediate commit if `seq` lands on the commit
    /// cadence and `no_commit` is false (spec §4.4).
    pub async fn add(
        &mut self,
        doc: &Document,
        seq: u64,
        no_commit: bool,
    ) -> Result<(), TransportError> {
        let mut out = doc.clone();
        // The backend expects a scalar `allfields`; join list values with a space.
        if let Some(FieldValue::List(items)) = out.get(FIELD_ALLFIELDS) {
            let joined = items.join(" ");
            out.insert(FIELD_ALLFIELDS.to_string(), FieldValue::Text(joined));
        }

        let encoded = serde_json::to_string(&out).expect("document serializes to JSON");
        self.add_bytes += encoded.len();
        self.add_batch.push(encoded);

        if self.add_batch.len() >= self.config.max_update_records
            || self.add_bytes >= self.config.max_update_size_bytes
        {
            self.flush_adds().await?;
        }

        if !no_commit && self.config.commit_interval > 0 && seq % self.config.commit_interval == 0
        {
            self.backend.commit().await?;
        }

        Ok(())
    }

    /// Enqueue a delete by id, flushing the delete batch at 1000 queued
    /// deletions (spec §4.4).
    pub async fn delete(&mut self, id: &str) -> Result<(), TransportError> {
        self.delete_batch.push(format!("\"delete\":{{\"id\":\"{id}\"}}"));
        if self.delete_batch.len() >= DELETE_FLUSH_THRESHOLD {
            self.flush_deletes().await?;
        }
        Ok(())
    }

    /// Send any pending add-batch and delete-batch.
    pub async fn flush(&mut self) -> Result<(), TransportError> {
        self.flush_adds().await?;
        self.flush_deletes().await?;
        Ok(())
    }

    async fn flush_adds(&mut self) -> Result<(), TransportError> {
        if self.add_batch.is_empty() {
            return Ok(());
        }
        let body = format!("[{}]", self.add_batch.join(","));
        self.backend.post_add_batch(body).await?;
        self.add_batch.clear();
        self.add_bytes = 0;
        Ok(())
    }

    async fn flush_deletes(&mut self) -> Result<(), TransportError> {
        if self.delete_batch.is_empty() {
            return Ok(());
        }
        let body = format!("{{{}}}", self.delete_batch.join(","));
        self.backend.post_delete_batch(body).await?;
        self.delete_batch.clear();
        Ok(())
    }

    pub fn pending_add_count(&self) -> usize {
        self.add_batch.len()
    }

    pub fn pending_delete_count(&self) -> usize {
        self.delete_batch.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingBackend {
        add_bodies: Mutex<Vec<String>>,
        delete_bodies: Mutex<Vec<String>>,
        commits: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl SearchBackend for RecordingBackend {
        async fn post_add_batch(&self, body: String) -> Result<(), TransportError> {
            self.add_bodies.lock().unwrap().push(body);
            Ok(())
        }
        async fn post_delete_batch(&self, body: String) -> Result<(), TransportError> {
            self.delete_bodies.lock().unwrap().push(body);
            Ok(())
        }
        async fn delete_by_query(&self, _query: String) -> Result<(), TransportError> {
            Ok(())
        }
        async fn commit(&self) -> Result<(), TransportError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn commit_long(&self) -> Result<(), TransportError> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn optimize(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn config() -> BufferConfig {
        BufferConfig { max_update_records: 2, max_update_size_bytes: 1_000_000, commit_interval: 0 }
    }

    #[tokio::test]
    async fn flushes_at_max_update_records() {
        let backend = RecordingBackend::default();
        let mut buffer = UpdateBuffer::new(&backend, config());
        let doc: Document = [("id".to_string(), FieldValue::Text("a".into()))].into();

        buffer.add(&doc, 1, true).await.unwrap();
        assert_eq!(buffer.pending_add_count(), 1);
        buffer.add(&doc, 2, true).await.unwrap();
        // Second add crosses max_update_records=2, triggering a flush.
        assert_eq!(buffer.pending_add_count(), 0);
        assert_eq!(backend.add_bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn never_exceeds_byte_ceiling_per_batch() {
        let backend = RecordingBackend::default();
        let cfg = BufferConfig { max_update_records: 1000, max_update_size_bytes: 40, commit_interval: 0 };
        let mut buffer = UpdateBuffer::new(&backend, cfg);
        let doc: Document = [("id".to_string(), FieldValue::Text("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".into()))].into();

        buffer.add(&doc, 1, true).await.unwrap();
        assert_eq!(backend.add_bodies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn commits_on_cadence() {
        let backend = RecordingBackend::default();
        let cfg = BufferConfig { max_update_records: 1000, max_update_size_bytes: 1_000_000, commit_interval: 2 };
        let mut buffer = UpdateBuffer::new(&backend, cfg);
        let doc: Document = [("id".to_string(), FieldValue::Text("a".into()))].into();

        buffer.add(&doc, 1, false).await.unwrap();
        assert_eq!(backend.commits.load(Ordering::SeqCst), 0);
        buffer.add(&doc, 2, false).await.unwrap();
        assert_eq!(backend.commits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn allfields_list_is_joined_to_scalar() {
        let backend = RecordingBackend::default();
        let mut buffer = UpdateBuffer::new(&backend, config());
        let doc: Document = [
            ("id".to_string(), FieldValue::Text("a".into())),
            (FIELD_ALLFIELDS.to_string(), FieldValue::List(vec!["x".into(), "y".into()])),
        ]
        .into();
        buffer.add(&doc, 1, true).await.unwrap();
        buffer.flush().await.unwrap();
        let body = &backend.add_bodies.lock().unwrap()[0];
        assert!(body.contains("\"x y\""));
    }

    #[tokio::test]
    async fn delete_batch_format() {
        let backend = RecordingBackend::default();
        let mut buffer = UpdateBuffer::new(&backend, config());
        buffer.delete("a").await.unwrap();
        buffer.delete("b").await.unwrap();
        buffer.flush().await.unwrap();
        let body = &backend.delete_bodies.lock().unwrap()[0];
        assert_eq!(body, "{\"delete\":{\"id\":\"a\"},\"delete\":{\"id\":\"b\"}}");
    }
}
