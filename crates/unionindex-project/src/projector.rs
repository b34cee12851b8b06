//! The Record Projector (spec §4.2): turns one raw record into a single
//! index document, or signals `SKIP` for a hidden component part that isn't
//! separately indexed.

use crate::error::ProjectionError;
use crate::parser::MetadataParserFactory;
use crate::xslt::{XsltParams, XsltTransformer};
use std::collections::HashMap;
use unionindex_core::document::{
    backfill_allfields, dedup_all_fields, strip_empty_fields, FIELD_BUILDING,
    FIELD_CONTAINER_ISSUE, FIELD_CONTAINER_REFERENCE, FIELD_CONTAINER_START_PAGE,
    FIELD_CONTAINER_TITLE, FIELD_CONTAINER_VOLUME, FIELD_FORMAT, FIELD_FULLRECORD,
    FIELD_GEOGRAPHIC_FACET, FIELD_HIDDEN_COMPONENT_BOOLEAN, FIELD_HIERARCHY_PARENT_ID,
    FIELD_HIERARCHY_PARENT_TITLE, FIELD_HIERARCHY_TOP_ID, FIELD_ID, FIELD_INSTITUTION,
    FIELD_IS_HIERARCHY_ID, FIELD_IS_HIERARCHY_TITLE, FIELD_FIRST_INDEXED, FIELD_LAST_INDEXED,
    FIELD_RECORDTYPE,
};
use unionindex_core::facets::{apply_building_prefix, expand_hierarchical_facet};
use unionindex_core::format_instant;
use unionindex_core::settings::{ComponentParts, DataSourceSettings, FormatSets, InstitutionInBuilding};
use unionindex_core::{Document, FieldValue, MappingTable, Record};
use unionindex_store::RecordStore;

/// Mapping tables configured for one data source, keyed by the document
/// field they apply to (spec §3, loaded via C1).
pub type MappingTables = HashMap<String, MappingTable>;

/// Cross-record configuration the projector needs but that doesn't vary
/// per call (spec §3's format sets, hierarchical facet list, geocoding
/// target field).
pub struct ProjectorConfig<'a> {
    pub format_sets: &'a FormatSets,
    pub hierarchical_facets: &'a [String],
    pub geocoding_field: Option<&'a str>,
}

pub struct Projector<'a> {
    pub config: ProjectorConfig<'a>,
    pub parser_factory: &'a dyn MetadataParserFactory,
    pub store: &'a dyn RecordStore,
}

/// The result of projecting one live record: the document plus the count of
/// component-part records folded into it (spec §4.2 step 3), which the
/// caller accumulates into its own `mergedComponents` total (spec C9).
pub struct Projection {
    pub document: Document,
    pub merged_components: usize,
}

fn is_article_format(format: &str, sets: &FormatSets) -> bool {
    sets.all_article_formats().iter().any(|f| f == format)
}

impl<'a> Projector<'a> {
    /// Project `record`, returning `Ok(None)` for a hidden component part
    /// that `indexMergedParts=false` excludes from the index entirely.
    pub async fn project(
        &self,
        record: &Record,
        settings: &DataSourceSettings,
        mapping_tables: &MappingTables,
        xslt: Option<&dyn XsltTransformer>,
    ) -> Result<Option<Projection>, ProjectionError> {
        let mut parser = self.parser_factory.create(
            &record.format,
            &record.raw_metadata,
            record.oai_id.as_deref(),
            &record.source_id,
        )?;

        // Step 2: component-part policy.
        let hidden_component = record.is_component_part() && self.is_hidden_component(record, settings);
        if hidden_component && !settings.index_merged_parts {
            return Ok(None);
        }

        // Step 3: host-side component gathering.
        let mut found_components = false;
        let mut merged_components = 0;
        if !record.is_component_part() {
            if let Some(linking_id) = &record.linking_id {
                let components = self.store.find_components_of(&record.source_id, linking_id).await?;
                if !components.is_empty() {
                    found_components = true;
                    if self.should_merge_components(&record.format, settings) {
                        merged_components = parser.merge_component_parts(&components);
                    }
                }
            }
        }

        // Step 4: base projection.
        let mut document = match (settings.solr_transformation.as_deref(), xslt) {
            (Some(name), Some(transformer)) => {
                let id_prefix = settings.id_prefix_or_source(&record.source_id);
                let params = XsltParams {
                    source_id: &record.source_id,
                    institution: &settings.institution,
                    format: &record.format,
                    id_prefix: &id_prefix,
                };
                transformer.transform(&parser.as_xml(), &params).map_err(|err| match err {
                    ProjectionError::Xslt { message, .. } => {
                        ProjectionError::Xslt { name: name.to_string(), message }
                    }
                    other => other,
                })?
            }
            _ => parser.project(),
        };
        document.insert(FIELD_ID.to_string(), FieldValue::Text(record.id.clone()));

        // Step 5: host/component linkage.
        if let Some(host_record_id) = &record.host_record_id {
            let host = self.store.find_host(&record.source_id, host_record_id).await?;
            match host {
                Some(host_record) => {
                    let host_parser = self.parser_factory.create(
                        &host_record.format,
                        &host_record.raw_metadata,
                        host_record.oai_id.as_deref(),
                        &host_record.source_id,
                    )?;
                    document.insert(
                        FIELD_HIERARCHY_PARENT_ID.to_string(),
                        FieldValue::Text(host_record.id.clone()),
                    );
                    if let Some(title) = host_parser.title() {
                        document.insert(FIELD_CONTAINER_TITLE.to_string(), FieldValue::Text(title.clone()));
                        document.insert(FIELD_HIERARCHY_PARENT_TITLE.to_string(), FieldValue::Text(title));
                    }
                }
                None => {
                    tracing::warn!(
                        record_id = %record.id,
                        host_record_id = %host_record_id,
                        "component part's host record was not found"
                    );
                    if let Some(title) = parser.container_title() {
                        document.insert(FIELD_CONTAINER_TITLE.to_string(), FieldValue::Text(title));
                    }
                }
            }
            if let Some(v) = parser.container_volume() {
                document.insert(FIELD_CONTAINER_VOLUME.to_string(), FieldValue::Text(v));
            }
            if let Some(v) = parser.container_issue() {
                document.insert(FIELD_CONTAINER_ISSUE.to_string(), FieldValue::Text(v));
            }
            if let Some(v) = parser.container_start_page() {
                document.insert(FIELD_CONTAINER_START_PAGE.to_string(), FieldValue::Text(v));
            }
            if let Some(v) = parser.container_reference() {
                document.insert(FIELD_CONTAINER_REFERENCE.to_string(), FieldValue::Text(v));
            }
        } else {
            let prefix = format!("{}.", record.source_id);
            for field in [FIELD_HIERARCHY_TOP_ID, FIELD_HIERARCHY_PARENT_ID, FIELD_IS_HIERARCHY_ID] {
                if let Some(existing) = document.get(field) {
                    let prefixed: Vec<String> =
                        existing.as_list().into_iter().map(|v| format!("{prefix}{v}")).collect();
                    document.insert(field.to_string(), FieldValue::List(prefixed));
                }
            }
            if found_components {
                document.insert(FIELD_IS_HIERARCHY_ID.to_string(), FieldValue::Text(record.id.clone()));
                if let Some(title) = parser.title() {
                    document.insert(FIELD_IS_HIERARCHY_TITLE.to_string(), FieldValue::Text(title));
                }
            }
        }

        // Step 6: defaults.
        document
            .entry(FIELD_INSTITUTION.to_string())
            .or_insert_with(|| FieldValue::Text(settings.institution.clone()));

        // Step 7: mapping application.
        for (field, table) in mapping_tables {
            match table.apply(document.get(field)) {
                Some(mapped) => {
                    document.insert(field.clone(), mapped);
                }
                None => {
                    document.remove(field);
                }
            }
        }

        // Step 8: hierarchical building.
        if self.config.hierarchical_facets.iter().any(|f| f == FIELD_BUILDING) {
            let code = match settings.institution_in_building {
                InstitutionInBuilding::Driver => document
                    .get(FIELD_INSTITUTION)
                    .and_then(|v| v.first_text())
                    .unwrap_or_default()
                    .to_string(),
                InstitutionInBuilding::None => String::new(),
                InstitutionInBuilding::Source => record.source_id.clone(),
                InstitutionInBuilding::Unset => settings.institution.clone(),
            };
            apply_building_prefix(&mut document, &code, FIELD_BUILDING);
        }

        // Step 9: hierarchical facet expansion.
        for facet in self.config.hierarchical_facets {
            expand_hierarchical_facet(&mut document, facet);
        }

        // Step 10: allfields backfill.
        backfill_allfields(&mut document);

        // Step 11: timestamps and type.
        document.insert(FIELD_FIRST_INDEXED.to_string(), FieldValue::Text(format_instant(record.created)));
        document.insert(FIELD_LAST_INDEXED.to_string(), FieldValue::Text(format_instant(record.date)));
        document.insert(FIELD_RECORDTYPE.to_string(), FieldValue::Text(record.format.clone()));
        document.entry(FIELD_FULLRECORD.to_string()).or_insert_with(|| FieldValue::Text(parser.as_xml()));
        let format_list = match document.remove(FIELD_FORMAT) {
            Some(FieldValue::List(items)) => items,
            Some(FieldValue::Text(s)) => vec![s],
            None => vec![record.format.clone()],
        };
        document.insert(FIELD_FORMAT.to_string(), FieldValue::List(format_list));

        // Step 12: hidden flag.
        if hidden_component {
            document.insert(
                FIELD_HIDDEN_COMPONENT_BOOLEAN.to_string(),
                FieldValue::Text("true".to_string()),
            );
        }

        // Step 13: geocoding.
        if let Some(field_name) = self.config.geocoding_field {
            self.apply_geocoding(&mut document, field_name).await;
        }

        // Step 14: final normalization.
        dedup_all_fields(&mut document);
        strip_empty_fields(&mut document);

        Ok(Some(Projection { document, merged_components }))
    }

    fn is_hidden_component(&self, record: &Record, settings: &DataSourceSettings) -> bool {
        let all_article = is_article_format(&record.format, self.config.format_sets);
        match settings.component_parts {
            ComponentParts::MergeAll => true,
            ComponentParts::MergeNonArticles => !all_article,
            ComponentParts::MergeNonEarticles => {
                !all_article
                    || (self.config.format_sets.article_formats.iter().any(|f| f == &record.format)
                        && !self.config.format_sets.earticle_formats.iter().any(|f| f == &record.format))
            }
            ComponentParts::AsIs => false,
        }
    }

    fn should_merge_components(&self, host_format: &str, settings: &DataSourceSettings) -> bool {
        let all_journal = self.config.format_sets.all_journal_formats();
        matches!(settings.component_parts, ComponentParts::MergeAll)
            || !all_journal.iter().any(|f| f == host_format)
            || (self.config.format_sets.journal_formats.iter().any(|f| f == host_format)
                && matches!(settings.component_parts, ComponentParts::MergeNonEarticles))
    }

    /// Geocode `geographic_facet` into `field_name` (spec §4.2 step 13).
    /// Lookup failures are tolerated: logged and skipped, never fatal to
    /// the record (spec §7 item 3).
    async fn apply_geocoding(&self, document: &mut Document, field_name: &str) {
        let already_set = document.get(field_name).map(|v| !v.is_empty()).unwrap_or(false);
        if already_set {
            return;
        }
        let Some(places) = document.get(FIELD_GEOGRAPHIC_FACET).map(|v| v.as_list()) else {
            return;
        };

        let mut entries = Vec::new();
        'places: for place in &places {
            for part in place.split(',') {
                let needle = part.trim().to_uppercase();
                if needle.is_empty() {
                    continue;
                }
                let hits = match self.store.geo_lookup(&needle).await {
                    Ok(hits) => hits,
                    Err(err) => {
                        tracing::warn!(place = %needle, error = %err, "geocoding lookup failed; skipping");
                        continue;
                    }
                };
                let mut consumed_definite = false;
                for hit in &hits {
                    if hit.importance == 0 {
                        entries.push(hit.as_lon_lat());
                        consumed_definite = true;
                    } else if consumed_definite {
                        break;
                    } else {
                        entries.push(hit.as_lon_lat());
                    }
                }
                if consumed_definite {
                    break 'places;
                }
            }
        }
        if !entries.is_empty() {
            document.insert(field_name.to_string(), FieldValue::List(entries));
        }
    }
}
