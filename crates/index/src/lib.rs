pub mod neo4j_index;

pub use neo4j_index::{
    ChemicalGraph, ChemicalSink, CypherExecutor, GraphStats, LoadStats, StoredChemical,
    StoredChemicals, UpsertPlan, GRAPH_SCHEMA,
};

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Summary of one `load` run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub files_loaded: usize,
    pub files_failed: Vec<PathBuf>,
    pub stats: LoadStats,
}

/// Loads every extraction output file of a folder into the graph.
pub struct GraphLoader<S = ChemicalGraph> {
    sink: S,
}

impl<S: ChemicalSink> GraphLoader<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn graph(&self) -> &S {
        &self.sink
    }

    /// Import each `.json` file in name order. A file that cannot be read,
    /// parsed or written is logged and the run moves on.
    pub async fn load_directory(&self, dir: &Path) -> Result<LoadReport> {
        self.sink.prepare().await?;

        let files = json_files(dir).await?;
        tracing::info!(dir = %dir.display(), files = files.len(), "Loading chemical files");

        let mut report = LoadReport::default();
        for path in files {
            match self.load_file(&path).await {
                Ok(stats) => {
                    tracing::info!(
                        file = %path.display(),
                        upserted = stats.upserted,
                        skipped = stats.skipped_no_regulation + stats.skipped_no_identifier,
                        "Loaded file"
                    );
                    report.files_loaded += 1;
                    report.stats.merge(&stats);
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), "Failed to load file: {:#}", e);
                    report.files_failed.push(path);
                }
            }
        }

        Ok(report)
    }

    /// Upsert every entry of one file. Entries without a regulation or
    /// without any identifier are skipped with a warning.
    pub async fn import(&self, document: &StoredChemicals) -> Result<LoadStats> {
        let mut stats = LoadStats::default();

        for record in &document.chemicals {
            match UpsertPlan::for_record(record) {
                UpsertPlan::SkipNoRegulation => {
                    tracing::warn!(?record, "Skipping chemical due to missing regulation");
                    stats.skipped_no_regulation += 1;
                }
                UpsertPlan::SkipNoIdentifier => {
                    tracing::warn!(?record, "Skipping chemical due to missing chemical name and CAS");
                    stats.skipped_no_identifier += 1;
                }
                plan => {
                    self.sink.upsert(plan).await?;
                    stats.upserted += 1;
                }
            }
        }

        Ok(stats)
    }

    async fn load_file(&self, path: &Path) -> Result<LoadStats> {
        let document = read_stored(path).await?;
        self.import(&document).await
    }
}

/// Parse one `{"chemicals": [...]}` file.
pub async fn read_stored(path: &Path) -> Result<StoredChemicals> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("Failed to parse {}", path.display()))
}

/// `.json` files directly under `dir`, sorted by file name.
pub async fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to open JSON folder {}", dir.display()))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        if is_json && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records plans in memory; fails any upsert naming `poison`.
    #[derive(Default)]
    struct MemorySink {
        prepared: Mutex<usize>,
        plans: Mutex<Vec<UpsertPlan>>,
        poison: Option<String>,
    }

    impl ChemicalSink for MemorySink {
        async fn prepare(&self) -> Result<()> {
            *self.prepared.lock().unwrap() += 1;
            Ok(())
        }

        async fn upsert(&self, plan: UpsertPlan) -> Result<()> {
            let poisoned = match (&plan, &self.poison) {
                (UpsertPlan::Full { name, .. } | UpsertPlan::NameOnly { name, .. }, Some(p)) => name == p,
                _ => false,
            };
            if poisoned {
                anyhow::bail!("constraint violation");
            }
            self.plans.lock().unwrap().push(plan);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_load_directory_isolates_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.json"),
            r#"{"chemicals": [
                {"chemical_name": "Ethanol", "CAS": "64-17-5", "regulation": "Annex_III"},
                {"chemical_name": "Tremolite", "CAS": "N/A", "regulation": "Annex_III"},
                {"chemical_name": "Benzene", "CAS": "71-43-2"},
                {"chemical_name": "NA", "CAS": "", "regulation": "Annex_III"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("b.json"), "{\"chemicals\": [").unwrap();
        std::fs::write(
            dir.path().join("c.json"),
            r#"{"chemicals": [
                {"chemical_name": "Toluene", "CAS": "108-88-3", "regulation": "SVHC"},
                {"chemical_name": "Poison", "CAS": "1-1-1", "regulation": "SVHC"}
            ]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("d.json"),
            r#"{"chemicals": [{"chemical_name": null, "CAS": "7439-97-6", "regulation": "SVHC"}]}"#,
        )
        .unwrap();

        let loader = GraphLoader::new(MemorySink {
            poison: Some("Poison".to_string()),
            ..Default::default()
        });
        let report = loader.load_directory(dir.path()).await.unwrap();

        assert_eq!(report.files_loaded, 2);
        assert_eq!(
            report.files_failed,
            vec![dir.path().join("b.json"), dir.path().join("c.json")]
        );
        assert_eq!(
            report.stats,
            LoadStats {
                upserted: 3,
                skipped_no_regulation: 1,
                skipped_no_identifier: 1,
            }
        );

        let sink = loader.graph();
        assert_eq!(*sink.prepared.lock().unwrap(), 1);
        let plans = sink.plans.lock().unwrap();
        assert_eq!(plans.len(), 4);
        assert!(matches!(plans[1], UpsertPlan::NameOnly { .. }));
        assert!(matches!(&plans[2], UpsertPlan::Full { name, .. } if name == "Toluene"));
        assert!(matches!(plans[3], UpsertPlan::CasOnly { .. }));
    }

    #[tokio::test]
    async fn test_json_files_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("a.JSON"), "{}").unwrap();
        std::fs::write(dir.path().join("a.csv"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.json")).unwrap();

        let files = json_files(dir.path()).await.unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.JSON", "b.json"]);
    }

    #[tokio::test]
    async fn test_read_stored() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("Annex_III.json");
        std::fs::write(
            &good,
            r#"{"chemicals": [{"chemical_name": "Ethanol", "CAS": "64-17-5", "regulation": "Annex_III"}]}"#,
        )
        .unwrap();
        let bad = dir.path().join("broken.json");
        std::fs::write(&bad, "{\"chemicals\": [").unwrap();

        let document = read_stored(&good).await.unwrap();
        assert_eq!(document.chemicals.len(), 1);
        assert_eq!(document.chemicals[0].cas.as_deref(), Some("64-17-5"));

        let err = read_stored(&bad).await.unwrap_err();
        assert!(format!("{:#}", err).contains("broken.json"));
    }

    #[tokio::test]
    async fn test_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        assert!(json_files(&dir.path().join("absent")).await.is_err());
    }
}
