use crate::schema::ChemicalRecord;

/// Rendering of an absent field in the line grammar.
pub const PLACEHOLDER: &str = "N/A";

/// Parse a completion reply into records.
///
/// Each non-empty line is split on `delimiter` and the first two fields are
/// taken as name and CAS number. Lines with fewer than two fields, and pairs
/// where both fields are placeholders, are dropped. Never fails.
pub fn parse_response(text: &str, delimiter: char, source_tag: &str) -> Vec<ChemicalRecord> {
    let mut records = Vec::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let mut fields = line.split(delimiter);
        let (Some(name), Some(cas)) = (fields.next(), fields.next()) else {
            tracing::trace!(line, "Dropping line without a delimiter");
            continue;
        };

        match ChemicalRecord::new(name, cas, source_tag) {
            Some(record) => records.push(record),
            None => tracing::trace!(line, "Dropping placeholder-only pair"),
        }
    }

    records
}

/// Render records back into the line grammar `parse_response` reads.
pub fn serialize_records(records: &[ChemicalRecord], delimiter: char) -> String {
    let separator = if delimiter == ',' {
        ", ".to_string()
    } else {
        format!(" {} ", delimiter)
    };

    records
        .iter()
        .map(|record| {
            format!(
                "{}{}{}",
                record.chemical_name().unwrap_or(PLACEHOLDER),
                separator,
                record.cas_number().unwrap_or(PLACEHOLDER)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
