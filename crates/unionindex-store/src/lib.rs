//! The record store and watermark store (spec §6): trait definitions, a
//! `mongodb`-backed implementation, and (behind `test-support`) an
//! in-memory double for driver tests.

pub mod aux;
pub mod error;
pub mod geo;
pub mod mongo;
pub mod record_store;

#[cfg(feature = "test-support")]
pub mod memory;

pub use error::StoreError;
pub use geo::GeoEntry;
pub use mongo::{MongoRecordStore, MongoWatermarkStore};
pub use record_store::{
    individual_watermark_key, DedupQuery, IndividualQuery, RecordStore, RecordStream,
    WatermarkStore, MERGED_WATERMARK_KEY,
};

#[cfg(feature = "test-support")]
pub use memory::{InMemoryRecordStore, InMemoryWatermarkStore};
