//! The format-specific metadata parser (spec §1, §4.2 step 1): out of
//! scope as a harvesting concern, modeled here as a trait plus a factory so
//! the projector never hardcodes a format. `LineMetadataParser` is a
//! minimal reference implementation, not a real MARC/XML parser.

use crate::error::ProjectionError;
use unionindex_core::{Document, FieldValue, Record};

/// Produces the per-record base projection and the handful of
/// container/title lookups the projector needs for host/component linkage.
pub trait MetadataParser: Send + Sync {
    /// The native field-map projection (spec §4.2 step 4, non-XSLT path).
    fn project(&self) -> Document;

    /// The parser's XML rendering, used as `fullrecord` and as XSLT input.
    fn as_xml(&self) -> String;

    fn title(&self) -> Option<String>;
    fn container_title(&self) -> Option<String>;
    fn container_volume(&self) -> Option<String>;
    fn container_issue(&self) -> Option<String>;
    fn container_start_page(&self) -> Option<String>;
    fn container_reference(&self) -> Option<String>;

    /// Fold a host's component records into this (host) parser's state,
    /// returning the number merged (spec §4.2 step 3).
    fn merge_component_parts(&mut self, components: &[Record]) -> usize;
}

/// Constructs a [`MetadataParser`] for one record.
pub trait MetadataParserFactory: Send + Sync {
    fn create(
        &self,
        format: &str,
        raw_metadata: &str,
        oai_id: Option<&str>,
        source_id: &str,
    ) -> Result<Box<dyn MetadataParser>, ProjectionError>;
}

/// A reference parser that treats `raw_metadata` as `field=value` lines,
/// repeated field names accumulating into a list. Sufficient to exercise
/// the projector's own logic in tests; real deployments supply their own
/// `MetadataParser` per format.
#[derive(Debug, Clone, Default)]
pub struct LineMetadataParser {
    fields: Document,
    merged_titles: Vec<String>,
}

impl LineMetadataParser {
    pub fn parse(raw_metadata: &str) -> Self {
        let mut fields: Document = Document::new();
        for line in raw_metadata.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Some((key, value)) = trimmed.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim().to_string(), value.trim().to_string());
            fields
                .entry(key)
                .and_modify(|existing| existing.push(value.clone()))
                .or_insert_with(|| FieldValue::Text(value));
        }
        LineMetadataParser { fields, merged_titles: Vec::new() }
    }

    fn field(&self, name: &str) -> Option<String> {
        self.fields.get(name).and_then(|v| v.first_text()).map(|s| s.to_string())
    }
}

impl MetadataParser for LineMetadataParser {
    fn project(&self) -> Document {
        let mut doc = self.fields.clone();
        if !self.merged_titles.is_empty() {
            let mut contents = doc
                .get("contents")
                .map(|v| v.as_list())
                .unwrap_or_default();
            contents.extend(self.merged_titles.iter().cloned());
            doc.insert("contents".to_string(), FieldValue::List(contents));
        }
        doc
    }

    fn as_xml(&self) -> String {
        let mut xml = String::from("<record>");
        for (name, value) in &self.fields {
            for item in value.as_list() {
                xml.push_str(&format!("<field name={name:?}>{item}</field>"));
            }
        }
        xml.push_str("</record>");
        xml
    }

    fn title(&self) -> Option<String> {
        self.field("title")
    }

    fn container_title(&self) -> Option<String> {
        self.field("container_title")
    }

    fn container_volume(&self) -> Option<String> {
        self.field("container_volume")
    }

    fn container_issue(&self) -> Option<String> {
        self.field("container_issue")
    }

    fn container_start_page(&self) -> Option<String> {
        self.field("container_start_page")
    }

    fn container_reference(&self) -> Option<String> {
        self.field("container_reference")
    }

    fn merge_component_parts(&mut self, components: &[Record]) -> usize {
        for component in components {
            let parsed = LineMetadataParser::parse(&component.raw_metadata);
            if let Some(title) = parsed.title() {
                self.merged_titles.push(title);
            }
        }
        components.len()
    }
}

/// Factory for [`LineMetadataParser`]; ignores `format` (format dispatch is
/// an out-of-scope harvesting concern per spec §1).
#[derive(Debug, Clone, Copy, Default)]
pub struct LineMetadataParserFactory;

impl MetadataParserFactory for LineMetadataParserFactory {
    fn create(
        &self,
        _format: &str,
        raw_metadata: &str,
        _oai_id: Option<&str>,
        _source_id: &str,
    ) -> Result<Box<dyn MetadataParser>, ProjectionError> {
        Ok(Box::new(LineMetadataParser::parse(raw_metadata)))
    }
}
