//! The Record Projector (spec §4.2): builds one index document from one
//! raw record, with host/component linkage, mapping tables, hierarchical
//! facets, and geocoding.

pub mod error;
pub mod parser;
pub mod projector;
pub mod xslt;

pub use error::ProjectionError;
pub use parser::{LineMetadataParser, LineMetadataParserFactory, MetadataParser, MetadataParserFactory};
pub use projector::{MappingTables, Projection, Projector, ProjectorConfig};
pub use xslt::{XsltParams, XsltTransformer};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use time::OffsetDateTime;
    use unionindex_core::settings::{ComponentParts, DataSourceSettings, FormatSets};
    use unionindex_core::{MappingTable, Record};
    use unionindex_store::{InMemoryRecordStore, RecordStore};

    fn settings() -> DataSourceSettings {
        DataSourceSettings {
            institution: "INST".to_string(),
            format: "Book".to_string(),
            id_prefix: None,
            component_parts: ComponentParts::AsIs,
            index_merged_parts: true,
            solr_transformation: None,
            field_mappings: HashMap::new(),
            institution_in_building: Default::default(),
        }
    }

    fn record(id: &str, source_id: &str, raw: &str) -> Record {
        let now = OffsetDateTime::UNIX_EPOCH;
        Record {
            id: id.to_string(),
            source_id: source_id.to_string(),
            format: "Book".to_string(),
            oai_id: None,
            linking_id: None,
            host_record_id: None,
            dedup_key: None,
            key: id.to_string(),
            updated: now,
            created: now,
            date: now,
            deleted: false,
            update_needed: false,
            raw_metadata: raw.to_string(),
        }
    }

    #[tokio::test]
    async fn s1_plain_individual() {
        let store = InMemoryRecordStore::new();
        let factory = LineMetadataParserFactory;
        let format_sets = FormatSets::default();
        let config =
            ProjectorConfig { format_sets: &format_sets, hierarchical_facets: &[], geocoding_field: None };
        let projector = Projector { config, parser_factory: &factory, store: &store };

        let rec = record("s1.1", "s1", "title=T");
        let settings = settings();
        let mapping_tables = HashMap::new();
        let doc = projector.project(&rec, &settings, &mapping_tables, None).await.unwrap().unwrap().document;

        assert_eq!(doc.get("id").unwrap().first_text(), Some("s1.1"));
        assert_eq!(doc.get("title").unwrap().first_text(), Some("T"));
        assert_eq!(doc.get("institution").unwrap().first_text(), Some("INST"));
        assert_eq!(doc.get("recordtype").unwrap().first_text(), Some("Book"));
        assert_eq!(doc.get("format").unwrap().as_list(), vec!["Book".to_string()]);
        assert_eq!(doc.get("allfields").unwrap().as_list(), vec!["T".to_string()]);
    }

    #[tokio::test]
    async fn s5_mapping_with_default() {
        let store = InMemoryRecordStore::new();
        let factory = LineMetadataParserFactory;
        let format_sets = FormatSets::default();
        let config =
            ProjectorConfig { format_sets: &format_sets, hierarchical_facets: &[], geocoding_field: None };
        let projector = Projector { config, parser_factory: &factory, store: &store };

        let rec = record("s5.1", "s5", "category=a\ncategory=b");
        let settings = settings();
        let mut mapping_tables = HashMap::new();
        mapping_tables.insert(
            "category".to_string(),
            MappingTable::parse(
                std::path::Path::new("category.properties"),
                "a = Apple\n##default = Other\n",
            )
            .unwrap(),
        );
        let doc = projector.project(&rec, &settings, &mapping_tables, None).await.unwrap().unwrap().document;

        assert_eq!(
            doc.get("category").unwrap().as_list(),
            vec!["Apple".to_string(), "Other".to_string()]
        );
    }

    #[tokio::test]
    async fn hidden_component_with_index_merged_parts_false_is_skipped() {
        let store = InMemoryRecordStore::new();
        let factory = LineMetadataParserFactory;
        let format_sets = FormatSets::default();
        let config =
            ProjectorConfig { format_sets: &format_sets, hierarchical_facets: &[], geocoding_field: None };
        let projector = Projector { config, parser_factory: &factory, store: &store };

        let mut rec = record("s1.2", "s1", "title=T");
        rec.host_record_id = Some("host.1".to_string());
        let mut settings = settings();
        settings.component_parts = ComponentParts::MergeAll;
        settings.index_merged_parts = false;
        let mapping_tables = HashMap::new();

        let result = projector.project(&rec, &settings, &mapping_tables, None).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn component_part_links_to_resolved_host() {
        let store = InMemoryRecordStore::new();
        let mut host = record("host.1", "s1", "title=Host Title");
        host.linking_id = Some("host.1".to_string());
        store.put(host).await;

        let factory = LineMetadataParserFactory;
        let format_sets = FormatSets::default();
        let config =
            ProjectorConfig { format_sets: &format_sets, hierarchical_facets: &[], geocoding_field: None };
        let projector = Projector { config, parser_factory: &factory, store: &store };

        let mut rec = record("s1.2", "s1", "title=Article");
        rec.host_record_id = Some("host.1".to_string());
        let settings = settings();
        let mapping_tables = HashMap::new();

        let doc = projector.project(&rec, &settings, &mapping_tables, None).await.unwrap().unwrap().document;
        assert_eq!(doc.get("hierarchy_parent_id").unwrap().first_text(), Some("host.1"));
        assert_eq!(doc.get("container_title").unwrap().first_text(), Some("Host Title"));
    }
}
