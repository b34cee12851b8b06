pub mod document;
pub mod error;
pub mod facets;
pub mod mapping;
pub mod record;
pub mod settings;

pub use document::{Document, FieldValue};
pub use error::ConfigError;
pub use mapping::MappingTable;
pub use record::Record;
pub use settings::{ComponentParts, DataSourceSettings, FormatSets, InstitutionInBuilding};

/// ISO-8601 UTC formatting used for `first_indexed`/`last_indexed` (spec §4.2 step 11).
pub fn format_instant(instant: time::OffsetDateTime) -> String {
    instant
        .to_offset(time::UtcOffset::UTC)
        .format(&time::format_description::well_known::Rfc3339)
        .expect("RFC3339 formatting never fails for a valid OffsetDateTime")
}
