/// Transport failures (spec §7 item 4): a non-2xx response is always
/// fatal; the caller decides whether that means "abort the pass" or
/// "abort the whole pipeline".
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("search backend returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("request to search backend failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("background transport worker aborted: {0}")]
    WorkerAborted(String),
}
