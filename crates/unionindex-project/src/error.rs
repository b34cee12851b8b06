/// Failures raised while projecting one record (spec §4.2). Anything a
/// caller should treat as per-pass fatal (store lookups, unresolvable
/// format) lands here; recoverable conditions (missing host record,
/// geocoding miss) are logged with `tracing::warn!` instead.
#[derive(thiserror::Error, Debug)]
pub enum ProjectionError {
    #[error("record store query failed: {0}")]
    Store(#[from] unionindex_store::StoreError),
    #[error("no metadata parser registered for format {0:?}")]
    UnknownFormat(String),
    #[error("xslt transform {name:?} failed: {message}")]
    Xslt { name: String, message: String },
}
