/// Store failures (spec §7 item 2): map/reduce or query failures are fatal
/// to the current pass and must not advance its watermark.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("record store query failed: {0}")]
    Query(#[from] mongodb::error::Error),
    #[error("map/reduce build of auxiliary collection {name:?} failed: {source}")]
    MapReduce {
        name: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to decode stored document: {0}")]
    Decode(#[from] bson::de::Error),
}
