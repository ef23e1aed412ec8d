use ingest::DocumentKind;

/// Line that separates the instructions from the text being analysed.
/// Everything after it is the payload.
pub const PAYLOAD_MARKER: &str = "TEXT TO ANALYZE:";

pub fn system_prompt(kind: DocumentKind) -> String {
    format!(
        "You are a useful, correct AI assistant helping to organize data from a {} file and validate it.",
        kind.label()
    )
}

pub fn build_extraction_prompt(kind: DocumentKind, chunk_text: &str) -> String {
    let d = kind.delimiter();
    let source = match kind {
        DocumentKind::Csv => "CSV table",
        DocumentKind::Pdf => "text from a PDF report",
    };

    format!(
        r#"Analyze the following {source} and extract pairs of "Chemical Trade Names" and "CAS Numbers".

Chemical names are natural words, such as "Fluoroacetamide", "1,1,1,2-Tetrachloroethane", "2,4,5-T and its salts and esters" or "1,2-dibromoethane (EDB)".
CAS numbers are unique identifiers for chemicals, such as "640-19-7", "13071-79-9" or "630-20-6". CAS numbers never contain words.

OUTPUT FORMAT:
One pair per line, fields separated by "{d}":
Chemical Trade Name {d} CAS Number

EXAMPLES:
Mercury compounds {d} 71-43-2
Ethanol {d} 64-17-5

RULES:
1. If several names map to several CAS numbers, list every combination as its own pair.
2. If a chemical name has no CAS number, write NA in its place. If a CAS number has no chemical name, write NA in its place.
3. NEVER fabricate data. Only report pairs that appear in the text.
4. Every line has exactly two fields. Never add a third column.
5. Find all pairs in the text. Do not skip any.
6. If the text contains no chemical names and no CAS numbers, answer exactly: N/A{d}N/A
7. Respond ONLY with the pairs. No explanations, no headings, no markdown.

{PAYLOAD_MARKER}
{chunk_text}"#
    )
}

pub fn build_validation_prompt(kind: DocumentKind, serialized_records: &str) -> String {
    let d = kind.delimiter();

    format!(
        r#"Review the following list of chemical names and CAS numbers in the format:

chemical_name {d} CAS

Keep every valid pair unchanged. Only change a pair in these cases:

1. Grouped chemicals: the name refers to several chemicals. Replace the pair with one "chemical_name {d} CAS" line per individual chemical.
2. Missing field: if only the chemical name is N/A, fill it in from the CAS number. If only the CAS number is N/A, fill it in from the chemical name. Leave the field as N/A when it cannot be inferred.
3. Both fields N/A: remove the line.

EXAMPLES:
"2,4,5-T and its salts and esters {d} 93-76-5" groups several chemicals. Replace it with:
2,4,5-T {d} 93-76-5
Sodium trichlorophenoxyacetate {d} 88-85-7
"Asbestos: Tremolite {d} N/A" is missing its CAS number. Replace it with:
Asbestos: Tremolite {d} 77536-68-6
"N/A {d} N/A" carries no data. Remove it.

RULES:
1. If you are unsure about a pair, keep it as it is.
2. One pair per line, formatted as: Chemical Name {d} CAS Number.
3. NEVER fabricate data.
4. Respond ONLY with the pairs. No explanations, no headings, no markdown.

{PAYLOAD_MARKER}
{serialized_records}"#
    )
}

/// Text after the payload marker, or the whole prompt if there is none.
pub fn payload(user_prompt: &str) -> &str {
    match user_prompt.rsplit_once(PAYLOAD_MARKER) {
        Some((_, payload)) => payload.trim_start_matches(['\r', '\n']),
        None => user_prompt,
    }
}
