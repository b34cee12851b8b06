/// Errors raised while parsing mapping tables or configuration that
/// describe a data source. These are fatal to the whole pipeline per
/// spec: a malformed mapping file or missing required setting aborts
/// before any record is touched.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("mapping file {path}: line {line} has no '=' delimiter: {text:?}")]
    MappingMissingDelimiter {
        path: String,
        line: usize,
        text: String,
    },
    #[error("data source {source_id:?} is missing required field {field}")]
    MissingRequiredField { source_id: String, field: &'static str },
    #[error("failed to read mapping file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
