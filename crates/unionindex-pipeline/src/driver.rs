//! Pipeline Driver (spec §4.7): orchestrates `updateIndividualRecords`,
//! `updateMergedRecords`'s three phases, `deleteDataSource`,
//! `optimizeIndex`, and `countValues`.

use crate::config::PipelineConfig;
use crate::counters::Counters;
use crate::error::PipelineError;
use crate::meter::PerformanceMeter;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use unionindex_buffer::UpdateBuffer;
use unionindex_core::document::{
    FIELD_ID, FIELD_LOCAL_IDS_STR_MV, FIELD_MERGED_BOOLEAN, FIELD_MERGED_CHILD_BOOLEAN,
    FIELD_RECORDTYPE,
};
use unionindex_core::{DataSourceSettings, Document, FieldValue, MappingTable, Record};
use unionindex_merge::MergeEngine;
use unionindex_project::{
    MappingTables, MetadataParserFactory, Projector, ProjectorConfig, XsltTransformer,
};
use unionindex_store::{
    individual_watermark_key, DedupQuery, IndividualQuery, RecordStore, WatermarkStore,
    MERGED_WATERMARK_KEY,
};
use unionindex_transport::SearchBackend;

/// Wires together the store, transport, and projection machinery behind
/// `PipelineConfig`'s immutable settings (spec §9: no hidden globals).
pub struct Pipeline {
    store: Arc<dyn RecordStore>,
    watermarks: Arc<dyn WatermarkStore>,
    backend: Arc<dyn SearchBackend>,
    parser_factory: Arc<dyn MetadataParserFactory>,
    xslt: HashMap<String, Arc<dyn XsltTransformer>>,
    config: PipelineConfig,
    mapping_tables: HashMap<String, MappingTables>,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn RecordStore>,
        watermarks: Arc<dyn WatermarkStore>,
        backend: Arc<dyn SearchBackend>,
        parser_factory: Arc<dyn MetadataParserFactory>,
        xslt: HashMap<String, Arc<dyn XsltTransformer>>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let mut mapping_tables = HashMap::new();
        for (source_id, settings) in &config.data_sources {
            settings.validate(source_id)?;
            let mut tables: MappingTables = HashMap::new();
            for (field, path) in &settings.field_mappings {
                tables.insert(field.clone(), MappingTable::load(std::path::Path::new(path))?);
            }
            mapping_tables.insert(source_id.clone(), tables);
        }
        Ok(Pipeline { store, watermarks, backend, parser_factory, xslt, config, mapping_tables })
    }

    fn selected_sources(&self, source_id: Option<&str>) -> Vec<(String, DataSourceSettings)> {
        self.config
            .data_sources
            .iter()
            .filter(|(id, _)| match source_id {
                None => true,
                Some(s) if s.is_empty() || s == "*" => true,
                Some(s) => s == id.as_str(),
            })
            .map(|(id, settings)| (id.clone(), settings.clone()))
            .collect()
    }

    fn resolve_from_instant(
        &self,
        from_date: Option<&str>,
        watermark: Option<OffsetDateTime>,
    ) -> Result<Option<OffsetDateTime>, PipelineError> {
        match from_date {
            Some(s) if !s.is_empty() => {
                let parsed = OffsetDateTime::parse(s, &Rfc3339)
                    .map_err(|source| PipelineError::InvalidFromDate { value: s.to_string(), source })?;
                Ok(Some(parsed))
            }
            _ => Ok(watermark),
        }
    }

    fn projector(&self) -> Projector<'_> {
        Projector {
            config: ProjectorConfig {
                format_sets: &self.config.format_sets,
                hierarchical_facets: &self.config.hierarchical_facets,
                geocoding_field: self.config.geocoding_field.as_deref(),
            },
            parser_factory: self.parser_factory.as_ref(),
            store: self.store.as_ref(),
        }
    }

    /// Projects `record`, returning the document alongside the count of
    /// component-part records the projector folded into it (spec §4.2 step
    /// 3), which the caller accumulates into its own merged-component total
    /// (spec C9).
    async fn project_record(
        &self,
        record: &Record,
        settings: &DataSourceSettings,
    ) -> Result<Option<(Document, usize)>, PipelineError> {
        let empty = MappingTables::new();
        let tables = self.mapping_tables.get(&record.source_id).unwrap_or(&empty);
        let xslt = settings
            .solr_transformation
            .as_deref()
            .and_then(|name| self.xslt.get(name))
            .map(|t| t.as_ref());
        let projection = self.projector().project(record, settings, tables, xslt).await?;
        Ok(projection.map(|p| (p.document, p.merged_components)))
    }

    /// `updateIndividualRecords` (spec §4.7): per-source catch-and-continue;
    /// fails only when every matched source failed (spec §7 item 5, §9).
    pub async fn update_individual_records(
        &self,
        from_date: Option<&str>,
        source_id: Option<&str>,
        single_id: Option<&str>,
        no_commit: bool,
    ) -> Result<(), PipelineError> {
        let sources = self.selected_sources(source_id);
        let mut attempted = 0usize;
        let mut succeeded = 0usize;
        let mut any_written = false;

        for (source, settings) in &sources {
            attempted += 1;
            match self.update_one_source(source, settings, from_date, single_id, no_commit).await {
                Ok(wrote) => {
                    succeeded += 1;
                    any_written |= wrote;
                }
                Err(err) => {
                    tracing::error!(
                        source = %source,
                        error = %err,
                        "individual-records pass failed for source; continuing with remaining sources"
                    );
                }
            }
        }

        if attempted > 0 && succeeded == 0 {
            return Err(PipelineError::AllSourcesFailed);
        }

        if any_written && !no_commit {
            self.backend.commit().await?;
        }
        Ok(())
    }

    async fn update_one_source(
        &self,
        source: &str,
        settings: &DataSourceSettings,
        from_date: Option<&str>,
        single_id: Option<&str>,
        no_commit: bool,
    ) -> Result<bool, PipelineError> {
        let pass_started_at = OffsetDateTime::now_utc();
        let watermark = if single_id.is_none() {
            self.watermarks.read(&individual_watermark_key(source)).await?
        } else {
            None
        };
        let from_instant = self.resolve_from_instant(from_date, watermark)?;

        let query = IndividualQuery {
            source_id: source.to_string(),
            from_instant: if single_id.is_none() { from_instant } else { None },
            single_id: single_id.map(str::to_string),
        };
        let mut stream = self.store.find_individual(query).await?;

        let mut buffer = UpdateBuffer::new(self.backend.as_ref(), self.config.buffer.clone());
        let counters = Counters::new();
        let mut meter = PerformanceMeter::new();
        let mut seq: u64 = 0;
        let mut wrote = false;

        while let Some(record) = stream.next().await {
            let record = record?;
            if record.deleted {
                buffer.delete(&record.key).await?;
                counters.inc_deleted();
                wrote = true;
            } else if let Some((doc, merged_components)) = self.project_record(&record, settings).await? {
                seq += 1;
                buffer.add(&doc, seq, no_commit).await?;
                counters.inc_processed();
                counters.add_merged_components(merged_components as u64);
                wrote = true;
            }
            meter.add(1);
        }
        buffer.flush().await?;
        counters.log_summary(&format!("updateIndividualRecords:{source}"));
        tracing::debug!(source, records_per_second = meter.speed(), "individual-records pass finished");

        if single_id.is_none() {
            self.watermarks.write(&individual_watermark_key(source), pass_started_at).await?;
        }
        Ok(wrote)
    }

    /// `updateMergedRecords` (spec §4.7): dedup-group pass, residual
    /// individuals pass (skipped when `delete`), then the global finalize.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_merged_records(
        &self,
        from_date: Option<&str>,
        source_id: Option<&str>,
        single_id: Option<&str>,
        no_commit: bool,
        delete: bool,
    ) -> Result<(), PipelineError> {
        let pass_started_at = OffsetDateTime::now_utc();
        let watermark =
            if single_id.is_none() { self.watermarks.read(MERGED_WATERMARK_KEY).await? } else { None };
        let from_instant = self.resolve_from_instant(from_date, watermark)?;

        let sources = self.selected_sources(source_id);
        if sources.is_empty() && !self.config.allow_unbounded_dedup_pass {
            tracing::warn!("updateMergedRecords matched no configured data source; nothing to do");
            return Ok(());
        }

        let mut buffer = UpdateBuffer::new(self.backend.as_ref(), self.config.buffer.clone());
        let counters = Counters::new();
        let mut seq: u64 = 0;
        let mut any_written = false;

        for (source, _settings) in &sources {
            let wrote = self
                .merged_phase_a(source, from_instant, single_id, delete, no_commit, &mut buffer, &counters, &mut seq)
                .await?;
            any_written |= wrote;
        }
        buffer.flush().await?;

        if !delete {
            for (source, _settings) in &sources {
                let wrote = self
                    .merged_phase_b(source, from_instant, single_id, no_commit, &mut buffer, &counters, &mut seq)
                    .await?;
                any_written |= wrote;
            }
        }

        buffer.flush().await?;
        if single_id.is_none() {
            self.watermarks.write(MERGED_WATERMARK_KEY, pass_started_at).await?;
        }
        if any_written && !no_commit {
            self.backend.commit().await?;
        }
        counters.log_summary("updateMergedRecords");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn merged_phase_a(
        &self,
        source: &str,
        from_instant: Option<OffsetDateTime>,
        single_id: Option<&str>,
        delete: bool,
        no_commit: bool,
        buffer: &mut UpdateBuffer<'_>,
        counters: &Counters,
        seq: &mut u64,
    ) -> Result<bool, PipelineError> {
        let query = DedupQuery {
            source_id: source.to_string(),
            from_instant,
            from_date: None,
            single_id: single_id.map(str::to_string),
            ignore_update_needed: delete,
        };
        let aux_name = self.store.build_dedup_group_aux(&query).await?;
        let mut keys = self.store.dedup_group_keys(&aux_name).await?;
        let mut wrote = false;
        let merge_engine = MergeEngine::new(&self.config.merged_fields);

        while let Some(dedup_key) = keys.next().await {
            let dedup_key = dedup_key?;
            let members = self.store.find_by_dedup_key(&dedup_key).await?;
            let mut live: Vec<(Record, Document)> = Vec::new();
            let mut acc = Document::new();
            let mut local_ids: Vec<String> = Vec::new();

            for member in members {
                if member.deleted || (delete && member.source_id == source) {
                    buffer.delete(&member.id).await?;
                    counters.inc_deleted();
                    wrote = true;
                    continue;
                }
                let Some(settings) = self.config.data_sources.get(&member.source_id) else {
                    tracing::warn!(
                        source_id = %member.source_id,
                        "dedup group member belongs to an unconfigured data source; skipping"
                    );
                    continue;
                };
                let Some((doc, merged_components)) = self.project_record(&member, settings).await? else {
                    continue;
                };
                counters.add_merged_components(merged_components as u64);
                let is_first = live.is_empty();
                merge_engine.merge(&mut acc, &mut local_ids, is_first, &member.id, &doc);
                live.push((member, doc));
            }

            match live.len() {
                0 => {
                    tracing::warn!(dedup_key = %dedup_key, "dedup group has no live members");
                }
                1 => {
                    let (_, doc) = live.into_iter().next().expect("len checked above");
                    buffer.delete(&dedup_key).await?;
                    *seq += 1;
                    buffer.add(&doc, *seq, no_commit).await?;
                    counters.inc_processed();
                    wrote = true;
                    if !delete {
                        tracing::warn!(dedup_key = %dedup_key, "single live record retained a dedup key");
                    }
                }
                _ => {
                    for (member, mut doc) in live {
                        doc.insert(
                            FIELD_MERGED_CHILD_BOOLEAN.to_string(),
                            FieldValue::Text("true".to_string()),
                        );
                        *seq += 1;
                        buffer.add(&doc, *seq, no_commit).await?;
                        counters.inc_processed();
                        wrote = true;
                        if member.dedup_key.as_deref() != Some(member.key.as_str()) {
                            buffer.delete(&member.key).await?;
                            counters.inc_deleted();
                            wrote = true;
                        }
                    }
                    merge_engine.finalize(&mut acc);
                    if acc.is_empty() {
                        buffer.delete(&dedup_key).await?;
                        wrote = true;
                    } else {
                        acc.insert(FIELD_LOCAL_IDS_STR_MV.to_string(), FieldValue::List(local_ids));
                        acc.insert(FIELD_ID.to_string(), FieldValue::Text(dedup_key.clone()));
                        acc.insert(FIELD_RECORDTYPE.to_string(), FieldValue::Text("merged".to_string()));
                        acc.insert(FIELD_MERGED_BOOLEAN.to_string(), FieldValue::Text("true".to_string()));
                        *seq += 1;
                        buffer.add(&acc, *seq, no_commit).await?;
                        counters.inc_merged();
                        wrote = true;
                    }
                }
            }
        }

        Ok(wrote)
    }

    async fn merged_phase_b(
        &self,
        source: &str,
        from_instant: Option<OffsetDateTime>,
        single_id: Option<&str>,
        no_commit: bool,
        buffer: &mut UpdateBuffer<'_>,
        counters: &Counters,
        seq: &mut u64,
    ) -> Result<bool, PipelineError> {
        let query = DedupQuery {
            source_id: source.to_string(),
            from_instant,
            from_date: None,
            single_id: single_id.map(str::to_string),
            ignore_update_needed: false,
        };
        let mut stream = self.store.find_residual(query).await?;
        let mut wrote = false;

        while let Some(record) = stream.next().await {
            let record = record?;
            if record.deleted {
                buffer.delete(&record.id).await?;
                counters.inc_deleted();
                wrote = true;
                if !self.store.other_live_record_claims_key(&record.key, &record.id).await? {
                    buffer.delete(&record.key).await?;
                }
                continue;
            }
            if !self.store.other_live_record_claims_key(&record.key, &record.id).await? {
                buffer.delete(&record.key).await?;
                wrote = true;
            }
            let Some(settings) = self.config.data_sources.get(&record.source_id) else {
                tracing::warn!(
                    source_id = %record.source_id,
                    "residual record belongs to an unconfigured data source; skipping"
                );
                continue;
            };
            if let Some((doc, merged_components)) = self.project_record(&record, settings).await? {
                *seq += 1;
                buffer.add(&doc, *seq, no_commit).await?;
                counters.inc_processed();
                counters.add_merged_components(merged_components as u64);
                wrote = true;
            }
        }
        Ok(wrote)
    }

    /// `deleteDataSource` (spec §4.7): delete-by-query, then a long-timeout
    /// commit.
    pub async fn delete_data_source(&self, source_id: &str) -> Result<(), PipelineError> {
        self.backend.delete_by_query(format!("id:{source_id}.*")).await?;
        self.backend.commit_long().await?;
        Ok(())
    }

    /// `optimizeIndex` (spec §4.7).
    pub async fn optimize_index(&self) -> Result<(), PipelineError> {
        self.backend.optimize().await?;
        Ok(())
    }

    /// `countValues` (spec §4.7): tallies one field's values across a
    /// source's live records, descending by count. No search-backend calls.
    pub async fn count_values(
        &self,
        source_id: &str,
        field: &str,
    ) -> Result<Vec<(String, u64)>, PipelineError> {
        let settings = self
            .config
            .data_sources
            .get(source_id)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownSource(source_id.to_string()))?;
        let query =
            IndividualQuery { source_id: source_id.to_string(), from_instant: None, single_id: None };
        let mut stream = self.store.find_individual(query).await?;
        let mut tally: HashMap<String, u64> = HashMap::new();

        while let Some(record) = stream.next().await {
            let record = record?;
            if record.deleted {
                continue;
            }
            if let Some((doc, _merged_components)) = self.project_record(&record, &settings).await? {
                if let Some(value) = doc.get(field) {
                    for item in value.as_list() {
                        *tally.entry(item).or_insert(0) += 1;
                    }
                }
            }
        }

        let mut counts: Vec<(String, u64)> = tally.into_iter().collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }
}
