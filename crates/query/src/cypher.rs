use anyhow::{Result, bail};
use regex::Regex;
use std::sync::LazyLock;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[A-Za-z]+[ \t]*\n)?\s*(.*?)\s*```").expect("static regex is valid")
});

static STRING_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"'(?:[^'\\]|\\.)*'|"(?:[^"\\]|\\.)*""#).expect("static regex is valid")
});

static WRITE_CLAUSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(CREATE|MERGE|DELETE|DETACH|SET|REMOVE|DROP|LOAD\s+CSV|FOREACH|CALL)\b")
        .expect("static regex is valid")
});

/// Take the statement out of a completion reply, with or without a
/// markdown fence around it.
pub fn strip_code_fences(reply: &str) -> String {
    let body = match FENCE.captures(reply) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => reply,
    };
    body.trim().trim_end_matches(';').trim().to_string()
}

/// Refuse statements that could change the graph. Quoted literals are
/// ignored so a chemical called "Merge" can still be looked up.
pub fn ensure_read_only(cypher: &str) -> Result<()> {
    if cypher.trim().is_empty() {
        bail!("No Cypher statement was generated");
    }

    let unquoted = STRING_LITERAL.replace_all(cypher, "''");
    if let Some(clause) = WRITE_CLAUSE.find(&unquoted) {
        bail!(
            "Refusing to run generated Cypher containing {}: {}",
            clause.as_str().to_uppercase(),
            cypher
        );
    }
    Ok(())
}
