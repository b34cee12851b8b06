//! The optional XSLT post-projection hook (spec §4.2 step 4): an external
//! collaborator, modeled as a trait so the projector never embeds an XSLT
//! engine.

use crate::error::ProjectionError;
use unionindex_core::Document;

/// Context params an XSLT stylesheet may reference (spec §4.2 step 4).
pub struct XsltParams<'a> {
    pub source_id: &'a str,
    pub institution: &'a str,
    pub format: &'a str,
    pub id_prefix: &'a str,
}

pub trait XsltTransformer: Send + Sync {
    fn transform(&self, xml: &str, params: &XsltParams<'_>) -> Result<Document, ProjectionError>;
}
