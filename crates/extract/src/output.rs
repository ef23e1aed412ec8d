use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::PipelineError;
use crate::schema::DocumentRecordSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `<tag>.json` shaped as `{"chemicals": [...]}`
    #[default]
    Json,
    /// `<tag>.csv` with columns `trade_name, cas, filename`
    Table,
    Both,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "table" | "csv" => Ok(Self::Table),
            "both" => Ok(Self::Both),
            other => Err(format!("expected json, table or both, got {:?}", other)),
        }
    }
}

impl OutputFormat {
    fn writes_json(self) -> bool {
        matches!(self, Self::Json | Self::Both)
    }

    fn writes_table(self) -> bool {
        matches!(self, Self::Table | Self::Both)
    }
}

/// Write `set` into `dir` as `<file_stem>.json` and/or `<file_stem>.csv`.
pub async fn persist(
    set: DocumentRecordSet,
    dir: &Path,
    file_stem: &str,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut written = Vec::new();

    if format.writes_table() {
        let path = dir.join(format!("{}.csv", file_stem));
        write_file(&path, render_table(&set)?).await?;
        written.push(path);
    }

    if format.writes_json() {
        let path = dir.join(format!("{}.json", file_stem));
        let json = serde_json::to_vec_pretty(&set.into_document())
            .map_err(|e| PipelineError::Encode(e.to_string()))?;
        write_file(&path, json).await?;
        written.push(path);
    }

    Ok(written)
}

fn render_table(set: &DocumentRecordSet) -> Result<Vec<u8>, PipelineError> {
    let encode = |e: csv::Error| PipelineError::Encode(e.to_string());

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["trade_name", "cas", "filename"])
        .map_err(encode)?;
    for record in set.records() {
        writer
            .write_record([
                record.chemical_name().unwrap_or_default(),
                record.cas_number().unwrap_or_default(),
                record.source_tag(),
            ])
            .map_err(encode)?;
    }

    writer
        .into_inner()
        .map_err(|e| PipelineError::Encode(e.to_string()))
}

async fn write_file(path: &Path, contents: Vec<u8>) -> Result<(), PipelineError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| PipelineError::Persist {
            path: path.to_path_buf(),
            source,
        })
}
