//! A `mongodb`-driver-backed [`RecordStore`]/[`WatermarkStore`], matching
//! the record store described in spec §6: a `record` collection queried by
//! equality/range, a `state` collection for watermarks, a `location`
//! collection for geocoding, and a server-side map/reduce primitive used to
//! materialize dedup-group auxiliary collections.

use crate::aux::{aux_collection_name, stale_aux_collections};
use crate::error::StoreError;
use crate::geo::GeoEntry;
use crate::record_store::{DedupQuery, IndividualQuery, RecordStore, RecordStream, WatermarkStore};
use bson::{doc, Bson, Document as BsonDocument};
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use mongodb::options::{FindOneOptions, FindOptions};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use unionindex_core::Record;

/// Mirrors [`Record`] but with BSON-aware datetime (de)serialization;
/// `unionindex-core` stays free of any store-specific dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRecord {
    #[serde(rename = "_id")]
    id: String,
    source_id: String,
    format: String,
    #[serde(default)]
    oai_id: Option<String>,
    #[serde(default)]
    linking_id: Option<String>,
    #[serde(default)]
    host_record_id: Option<String>,
    #[serde(default)]
    dedup_key: Option<String>,
    key: String,
    #[serde(with = "bson::serde_helpers::time_0_3_offsetdatetime_as_bson_datetime")]
    updated: OffsetDateTime,
    #[serde(with = "bson::serde_helpers::time_0_3_offsetdatetime_as_bson_datetime")]
    created: OffsetDateTime,
    #[serde(with = "bson::serde_helpers::time_0_3_offsetdatetime_as_bson_datetime")]
    date: OffsetDateTime,
    #[serde(default)]
    deleted: bool,
    #[serde(default)]
    update_needed: bool,
    raw_metadata: String,
}

impl From<StoredRecord> for Record {
    fn from(r: StoredRecord) -> Self {
        Record {
            id: r.id,
            source_id: r.source_id,
            format: r.format,
            oai_id: r.oai_id,
            linking_id: r.linking_id,
            host_record_id: r.host_record_id,
            dedup_key: r.dedup_key,
            key: r.key,
            updated: r.updated,
            created: r.created,
            date: r.date,
            deleted: r.deleted,
            update_needed: r.update_needed,
            raw_metadata: r.raw_metadata,
        }
    }
}

#[derive(Clone)]
pub struct MongoRecordStore {
    db: Database,
}

impl MongoRecordStore {
    pub fn new(db: Database) -> Self {
        MongoRecordStore { db }
    }

    fn records(&self) -> mongodb::Collection<StoredRecord> {
        self.db.collection("record")
    }

    fn location(&self) -> mongodb::Collection<GeoEntry> {
        self.db.collection("location")
    }

    fn build_individual_filter(query: &IndividualQuery) -> BsonDocument {
        if let Some(id) = &query.single_id {
            return doc! { "_id": id };
        }
        let mut filter = doc! {
            "source_id": &query.source_id,
            "update_needed": false,
        };
        if let Some(from) = query.from_instant {
            filter.insert("updated", doc! { "$gte": Bson::DateTime(from.into()) });
        }
        filter
    }

    fn build_dedup_filter(query: &DedupQuery, dedup_key_exists: bool) -> BsonDocument {
        if let Some(id) = &query.single_id {
            return doc! { "_id": id };
        }
        let mut filter = doc! {
            "source_id": &query.source_id,
            "dedup_key": { "$exists": dedup_key_exists },
        };
        if !query.ignore_update_needed {
            filter.insert("update_needed", false);
        }
        if let Some(from) = query.from_instant {
            filter.insert("updated", doc! { "$gte": Bson::DateTime(from.into()) });
        }
        filter
    }
}

#[async_trait::async_trait]
impl RecordStore for MongoRecordStore {
    async fn find_individual(&self, query: IndividualQuery) -> Result<RecordStream, StoreError> {
        let filter = Self::build_individual_filter(&query);
        let cursor = self
            .records()
            .find(
                filter,
                FindOptions::builder().no_cursor_timeout(true).sort(doc! { "updated": 1 }).build(),
            )
            .await?;
        let stream: RecordStream =
            cursor.map_err(StoreError::from).map(|r| r.map(Record::from)).boxed();
        Ok(stream)
    }

    async fn find_residual(&self, query: DedupQuery) -> Result<RecordStream, StoreError> {
        let filter = Self::build_dedup_filter(&query, false);
        let cursor = self
            .records()
            .find(filter, FindOptions::builder().no_cursor_timeout(true).build())
            .await?;
        let stream: RecordStream =
            cursor.map_err(StoreError::from).map(|r| r.map(Record::from)).boxed();
        Ok(stream)
    }

    async fn find_by_dedup_key(&self, dedup_key: &str) -> Result<Vec<Record>, StoreError> {
        let cursor = self.records().find(doc! { "dedup_key": dedup_key }, None).await?;
        let stored: Vec<StoredRecord> = cursor.try_collect().await?;
        Ok(stored.into_iter().map(Record::from).collect())
    }

    async fn find_components_of(
        &self,
        source_id: &str,
        linking_id: &str,
    ) -> Result<Vec<Record>, StoreError> {
        let cursor = self
            .records()
            .find(
                doc! {
                    "source_id": source_id,
                    "host_record_id": linking_id,
                    "deleted": false,
                },
                None,
            )
            .await?;
        let stored: Vec<StoredRecord> = cursor.try_collect().await?;
        Ok(stored.into_iter().map(Record::from).collect())
    }

    async fn find_host(&self, source_id: &str, linking_id: &str) -> Result<Option<Record>, StoreError> {
        Ok(self
            .records()
            .find_one(doc! { "source_id": source_id, "linking_id": linking_id }, None)
            .await?
            .map(Record::from))
    }

    async fn other_live_record_claims_key(
        &self,
        key: &str,
        exclude_id: &str,
    ) -> Result<bool, StoreError> {
        let count = self
            .records()
            .count_documents(
                doc! { "dedup_key": key, "deleted": false, "_id": { "$ne": exclude_id } },
                None,
            )
            .await?;
        Ok(count > 0)
    }

    async fn build_dedup_group_aux(&self, query: &DedupQuery) -> Result<String, StoreError> {
        let filter = Self::build_dedup_filter(query, true);
        let filter_json = filter.to_string();

        let newest = self
            .records()
            .find_one(None, FindOneOptions::builder().sort(doc! { "updated": -1 }).build())
            .await?;
        let last_record_epoch = newest.map(|r| r.updated.unix_timestamp()).unwrap_or(0);

        let name = aux_collection_name(&filter_json, query.from_date.as_deref(), last_record_epoch);

        let existing = self.list_collections().await?;
        if !existing.iter().any(|c| c == &name) {
            let command = doc! {
                "mapReduce": "record",
                "map": "function() { emit(this.dedup_key, 1); }",
                "reduce": "function(key, values) { return Array.sum(values); }",
                "query": filter,
                "out": &name,
            };
            self.db.run_command(command, None).await.map_err(|source| StoreError::MapReduce {
                name: name.clone(),
                source,
            })?;
        }

        for stale in stale_aux_collections(existing.iter().map(|s| s.as_str()), &name) {
            self.db.collection::<BsonDocument>(&stale).drop(None).await?;
        }

        Ok(name)
    }

    async fn dedup_group_keys(
        &self,
        aux_collection: &str,
    ) -> Result<BoxStream<'static, Result<String, StoreError>>, StoreError> {
        let collection = self.db.collection::<BsonDocument>(aux_collection);
        let cursor = collection.find(None, None).await?;
        let stream = cursor
            .map_err(StoreError::from)
            .map(|doc| doc.map(|d| d.get_str("_id").unwrap_or_default().to_string()))
            .boxed();
        Ok(stream)
    }

    async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.db.list_collection_names(None).await?)
    }

    async fn geo_lookup(&self, place: &str) -> Result<Vec<GeoEntry>, StoreError> {
        let cursor = self
            .location()
            .find(
                doc! { "place": place.to_uppercase().trim() },
                FindOptions::builder().sort(doc! { "importance": 1 }).build(),
            )
            .await?;
        Ok(cursor.try_collect().await?)
    }
}

pub struct MongoWatermarkStore {
    db: Database,
}

impl MongoWatermarkStore {
    pub fn new(db: Database) -> Self {
        MongoWatermarkStore { db }
    }

    fn state(&self) -> mongodb::Collection<BsonDocument> {
        self.db.collection("state")
    }
}

#[async_trait::async_trait]
impl WatermarkStore for MongoWatermarkStore {
    async fn read(&self, key: &str) -> Result<Option<OffsetDateTime>, StoreError> {
        let doc = self.state().find_one(doc! { "_id": key }, None).await?;
        Ok(doc.and_then(|d| d.get_datetime("value").ok().map(|dt| (*dt).into())))
    }

    async fn write(&self, key: &str, instant: OffsetDateTime) -> Result<(), StoreError> {
        self.state()
            .update_one(
                doc! { "_id": key },
                doc! { "$set": { "value": Bson::DateTime(instant.into()) } },
                mongodb::options::UpdateOptions::builder().upsert(true).build(),
            )
            .await?;
        Ok(())
    }
}
