use crate::document::FieldValue;
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

pub const SENTINEL_DEFAULT: &str = "##default";
pub const SENTINEL_EMPTY: &str = "##empty";
pub const SENTINEL_EMPTY_ARRAY: &str = "##emptyarray";

/// A `KEY = VALUE` mapping table, as loaded by the Mapping Table Loader
/// (spec §4.1). Reserved sentinel keys (`##default`, `##empty`,
/// `##emptyarray`) are stored alongside ordinary entries and consulted
/// explicitly by `apply`.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    entries: HashMap<String, String>,
}

impl MappingTable {
    /// Parse `KEY = VALUE` lines. Lines starting with `;` or blank are
    /// skipped. `KEY =` with no right-hand side yields `KEY -> ""`. A line
    /// lacking the delimiter is a parse error.
    pub fn parse(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let mut entries = HashMap::new();
        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(';') {
                continue;
            }
            let Some(eq) = trimmed.find('=') else {
                return Err(ConfigError::MappingMissingDelimiter {
                    path: path.display().to_string(),
                    line: idx + 1,
                    text: trimmed.to_string(),
                });
            };
            let key = trimmed[..eq].trim().to_string();
            let value = trimmed[eq + 1..].trim().to_string();
            entries.insert(key, value);
        }
        Ok(MappingTable { entries })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(path, &text)
    }

    fn lookup(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    /// Map a field value through the table per spec §4.2 step 7. Returns
    /// `None` when the source field was absent/empty and neither `##empty`
    /// nor `##emptyarray` is configured (the field stays absent).
    pub fn apply(&self, value: Option<&FieldValue>) -> Option<FieldValue> {
        match value {
            None => {
                if let Some(empty_array) = self.lookup(SENTINEL_EMPTY_ARRAY) {
                    return Some(FieldValue::List(vec![empty_array.to_string()]));
                }
                self.lookup(SENTINEL_EMPTY).map(|s| FieldValue::Text(s.to_string()))
            }
            Some(FieldValue::Text(s)) if s.is_empty() => {
                if let Some(empty_array) = self.lookup(SENTINEL_EMPTY_ARRAY) {
                    return Some(FieldValue::List(vec![empty_array.to_string()]));
                }
                self.lookup(SENTINEL_EMPTY).map(|s| FieldValue::Text(s.to_string()))
            }
            Some(FieldValue::Text(s)) => Some(FieldValue::Text(self.map_scalar(s))),
            Some(FieldValue::List(items)) if items.is_empty() => {
                if let Some(empty_array) = self.lookup(SENTINEL_EMPTY_ARRAY) {
                    return Some(FieldValue::List(vec![empty_array.to_string()]));
                }
                self.lookup(SENTINEL_EMPTY).map(|s| FieldValue::Text(s.to_string()))
            }
            Some(FieldValue::List(items)) => {
                let mut mapped: Vec<String> = items.iter().map(|v| self.map_scalar(v)).collect();
                let mut seen = std::collections::HashSet::new();
                mapped.retain(|item| seen.insert(item.clone()));
                Some(FieldValue::List(mapped))
            }
        }
    }

    fn map_scalar(&self, raw: &str) -> String {
        match self.lookup(raw) {
            Some(mapped) => mapped.to_string(),
            None => self.lookup(SENTINEL_DEFAULT).unwrap_or(raw).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_entries_and_blank_lines() {
        let text = "; comment\na = Apple\n\nb =\n##default = Other\n";
        let table = MappingTable::parse(Path::new("t"), text).unwrap();
        assert_eq!(table.lookup("a"), Some("Apple"));
        assert_eq!(table.lookup("b"), Some(""));
        assert_eq!(table.lookup(SENTINEL_DEFAULT), Some("Other"));
    }

    #[test]
    fn rejects_line_without_delimiter() {
        let err = MappingTable::parse(Path::new("t"), "oops\n").unwrap_err();
        assert!(matches!(err, ConfigError::MappingMissingDelimiter { line: 1, .. }));
    }

    #[test]
    fn maps_list_with_default_fallback() {
        let table = MappingTable::parse(Path::new("t"), "a = Apple\n##default = Other\n").unwrap();
        let input = FieldValue::List(vec!["a".into(), "b".into()]);
        let mapped = table.apply(Some(&input)).unwrap();
        assert_eq!(mapped, FieldValue::List(vec!["Apple".into(), "Other".into()]));
    }

    #[test]
    fn empty_array_sentinel_on_absent_list() {
        let table = MappingTable::parse(Path::new("t"), "##emptyarray = none\n").unwrap();
        assert_eq!(
            table.apply(None).unwrap(),
            FieldValue::List(vec!["none".to_string()])
        );
    }
}
