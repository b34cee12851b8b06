pub mod background;
pub mod client;
pub mod config;
pub mod error;

pub use background::BackgroundTransport;
pub use client::{HttpSearchBackend, SearchBackend};
pub use config::SolrConfig;
pub use error::TransportError;
