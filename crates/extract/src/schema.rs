use serde::{Serialize, Serializer};

use crate::normalizer::normalize_field;
use crate::parser::PLACEHOLDER;

/// One chemical-name / CAS-number pair attributed to a regulation.
///
/// At least one of the two identifying fields is always present; the
/// regulation tag cannot change after construction. An absent field is
/// written as `N/A`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChemicalRecord {
    #[serde(serialize_with = "or_placeholder")]
    chemical_name: Option<String>,
    #[serde(rename = "CAS", serialize_with = "or_placeholder")]
    cas_number: Option<String>,
    #[serde(rename = "regulation")]
    source_tag: String,
}

impl ChemicalRecord {
    /// Build a record from raw fields, or `None` when both are placeholders.
    pub fn new(chemical_name: &str, cas_number: &str, source_tag: &str) -> Option<Self> {
        let chemical_name = normalize_field(chemical_name);
        let cas_number = normalize_field(cas_number);

        if chemical_name.is_none() && cas_number.is_none() {
            return None;
        }

        Some(Self {
            chemical_name,
            cas_number,
            source_tag: source_tag.to_string(),
        })
    }

    pub fn chemical_name(&self) -> Option<&str> {
        self.chemical_name.as_deref()
    }

    pub fn cas_number(&self) -> Option<&str> {
        self.cas_number.as_deref()
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }
}

fn or_placeholder<S>(field: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(field.as_deref().unwrap_or(PLACEHOLDER))
}

/// Every record extracted from one input document, in arrival order.
#[derive(Debug, Clone, Default)]
pub struct DocumentRecordSet {
    source_tag: String,
    records: Vec<ChemicalRecord>,
}

impl DocumentRecordSet {
    pub fn new(source_tag: impl Into<String>) -> Self {
        Self {
            source_tag: source_tag.into(),
            records: Vec::new(),
        }
    }

    /// Append a chunk's records. No deduplication: the graph loader upserts.
    pub fn append(&mut self, chunk_records: impl IntoIterator<Item = ChemicalRecord>) {
        self.records.extend(chunk_records);
    }

    pub fn source_tag(&self) -> &str {
        &self.source_tag
    }

    pub fn records(&self) -> &[ChemicalRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_document(self) -> ChemicalsDocument {
        ChemicalsDocument {
            chemicals: self.records,
        }
    }
}

/// JSON shape written per input document: `{"chemicals": [...]}`.
#[derive(Debug, Clone, Serialize)]
pub struct ChemicalsDocument {
    pub chemicals: Vec<ChemicalRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_invariant() {
        assert!(ChemicalRecord::new("N/A", "NA", "annex").is_none());
        assert!(ChemicalRecord::new("", " ", "annex").is_none());

        let name_only = ChemicalRecord::new("Asbestos: Tremolite", "N/A", "annex").unwrap();
        assert_eq!(name_only.chemical_name(), Some("Asbestos: Tremolite"));
        assert_eq!(name_only.cas_number(), None);

        let cas_only = ChemicalRecord::new("NA", "77536-68-6", "annex").unwrap();
        assert_eq!(cas_only.chemical_name(), None);
        assert_eq!(cas_only.source_tag(), "annex");
    }

    #[test]
    fn test_append_keeps_order_and_duplicates() {
        let mut set = DocumentRecordSet::new("annex");
        let ethanol = ChemicalRecord::new("Ethanol", "64-17-5", "annex").unwrap();
        let benzene = ChemicalRecord::new("Benzene", "71-43-2", "annex").unwrap();

        set.append(vec![ethanol.clone(), benzene.clone()]);
        set.append(vec![ethanol.clone()]);

        assert_eq!(set.records(), &[ethanol.clone(), benzene, ethanol]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_json_shape() {
        let mut set = DocumentRecordSet::new("Annex_III");
        set.append(ChemicalRecord::new("Ethanol", "64-17-5", "Annex_III"));
        set.append(ChemicalRecord::new("Tremolite", "N/A", "Annex_III"));

        let json = serde_json::to_value(set.into_document()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "chemicals": [
                    {"chemical_name": "Ethanol", "CAS": "64-17-5", "regulation": "Annex_III"},
                    {"chemical_name": "Tremolite", "CAS": "N/A", "regulation": "Annex_III"}
                ]
            })
        );
    }
}
