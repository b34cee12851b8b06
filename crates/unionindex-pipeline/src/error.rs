/// Errors raised by the pipeline driver (spec §7). Store and transport
/// failures are per-pass fatal; `AllSourcesFailed` is the pinned
/// implementation choice for `updateIndividualRecords`'s per-source catch
/// (spec §7 item 5 / §9): the command fails only when every source failed.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] unionindex_core::ConfigError),
    #[error(transparent)]
    Store(#[from] unionindex_store::StoreError),
    #[error(transparent)]
    Transport(#[from] unionindex_transport::TransportError),
    #[error(transparent)]
    Projection(#[from] unionindex_project::ProjectionError),
    #[error("invalid fromDate {value:?}: {source}")]
    InvalidFromDate {
        value: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("data source {0:?} is not configured")]
    UnknownSource(String),
    #[error("every configured data source failed during updateIndividualRecords")]
    AllSourcesFailed,
}
