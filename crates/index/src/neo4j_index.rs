use anyhow::{Context, Result};
use neo4rs::{Graph, Query};
use serde::{Deserialize, Serialize};
use std::future::Future;

use extract::PipelineError;
use extract::normalizer::normalize_field;

/// Labels, keys and relationship types written by the loader.
pub const GRAPH_SCHEMA: &str = "\
Node labels and properties:
  (:Chemical {cas: STRING})
  (:ChemicalName {name: STRING})
  (:Regulation {name: STRING})
Relationships:
  (:ChemicalName)-[:IS_NAME_OF]->(:Chemical)
  (:ChemicalName)-[:IS_REGULATED]->(:Regulation)
  (:Chemical)-[:IS_REGULATED]->(:Regulation)";

/// One entry of a `{"chemicals": [...]}` file, read leniently.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoredChemical {
    #[serde(default)]
    pub chemical_name: Option<String>,
    #[serde(default, rename = "CAS")]
    pub cas: Option<String>,
    #[serde(default)]
    pub regulation: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoredChemicals {
    pub chemicals: Vec<StoredChemical>,
}

/// What an entry turns into in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertPlan {
    Full {
        name: String,
        cas: String,
        regulation: String,
    },
    NameOnly {
        name: String,
        regulation: String,
    },
    CasOnly {
        cas: String,
        regulation: String,
    },
    SkipNoRegulation,
    SkipNoIdentifier,
}

impl UpsertPlan {
    /// Placeholders such as `NA` count as missing.
    pub fn for_record(record: &StoredChemical) -> Self {
        let field = |value: &Option<String>| value.as_deref().and_then(normalize_field);

        let Some(regulation) = field(&record.regulation) else {
            return Self::SkipNoRegulation;
        };

        match (field(&record.chemical_name), field(&record.cas)) {
            (Some(name), Some(cas)) => Self::Full {
                name,
                cas,
                regulation,
            },
            (Some(name), None) => Self::NameOnly { name, regulation },
            (None, Some(cas)) => Self::CasOnly { cas, regulation },
            (None, None) => Self::SkipNoIdentifier,
        }
    }

    pub fn into_query(self) -> Option<Query> {
        let query = match self {
            Self::Full {
                name,
                cas,
                regulation,
            } => Query::new(
                r#"
                MERGE (c:Chemical {cas: $cas})
                MERGE (cn:ChemicalName {name: $name})
                MERGE (r:Regulation {name: $regulation})
                MERGE (cn)-[:IS_NAME_OF]->(c)
                MERGE (cn)-[:IS_REGULATED]->(r)
                MERGE (c)-[:IS_REGULATED]->(r)
                "#
                .to_string(),
            )
            .param("name", name)
            .param("cas", cas)
            .param("regulation", regulation),
            Self::NameOnly { name, regulation } => Query::new(
                r#"
                MERGE (cn:ChemicalName {name: $name})
                MERGE (r:Regulation {name: $regulation})
                MERGE (cn)-[:IS_REGULATED]->(r)
                "#
                .to_string(),
            )
            .param("name", name)
            .param("regulation", regulation),
            Self::CasOnly { cas, regulation } => Query::new(
                r#"
                MERGE (c:Chemical {cas: $cas})
                MERGE (r:Regulation {name: $regulation})
                MERGE (c)-[:IS_REGULATED]->(r)
                "#
                .to_string(),
            )
            .param("cas", cas)
            .param("regulation", regulation),
            Self::SkipNoRegulation | Self::SkipNoIdentifier => return None,
        };
        Some(query)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub upserted: usize,
    pub skipped_no_regulation: usize,
    pub skipped_no_identifier: usize,
}

impl LoadStats {
    pub fn merge(&mut self, other: &LoadStats) {
        self.upserted += other.upserted;
        self.skipped_no_regulation += other.skipped_no_regulation;
        self.skipped_no_identifier += other.skipped_no_identifier;
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GraphStats {
    pub chemicals: usize,
    pub chemical_names: usize,
    pub regulations: usize,
    pub relationships: usize,
}

/// Receives the upserts of a load run.
pub trait ChemicalSink: Send + Sync {
    /// Called once before the first upsert.
    fn prepare(&self) -> impl Future<Output = Result<()>> + Send;

    /// Write one planned entry. Skip plans never reach the sink.
    fn upsert(&self, plan: UpsertPlan) -> impl Future<Output = Result<()>> + Send;
}

/// Runs a read-only Cypher statement and returns rows as JSON objects.
pub trait CypherExecutor: Send + Sync {
    fn read_rows(
        &self,
        cypher: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<serde_json::Value>>> + Send;
}

pub struct ChemicalGraph {
    graph: Graph,
}

impl ChemicalGraph {
    pub fn new(graph: Graph) -> Self {
        Self { graph }
    }

    /// Open a connection and prove it works. Failure here is fatal.
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, PipelineError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| PipelineError::Connectivity(format!("{}: {}", uri, e)))?;

        graph
            .run(neo4rs::query("RETURN 1"))
            .await
            .map_err(|e| PipelineError::Connectivity(format!("{}: {}", uri, e)))?;

        tracing::info!(uri, "Successfully connected to Neo4j");
        Ok(Self { graph })
    }

    /// Initialize schema: uniqueness constraints double as lookup indexes
    pub async fn init_schema(&self) -> Result<()> {
        let constraints = [
            (
                "chemical_cas_unique",
                "CREATE CONSTRAINT chemical_cas_unique IF NOT EXISTS FOR (c:Chemical) REQUIRE c.cas IS UNIQUE",
            ),
            (
                "chemical_name_unique",
                "CREATE CONSTRAINT chemical_name_unique IF NOT EXISTS FOR (n:ChemicalName) REQUIRE n.name IS UNIQUE",
            ),
            (
                "regulation_name_unique",
                "CREATE CONSTRAINT regulation_name_unique IF NOT EXISTS FOR (r:Regulation) REQUIRE r.name IS UNIQUE",
            ),
        ];

        for (name, statement) in constraints {
            self.graph
                .run(Query::new(statement.to_string()))
                .await
                .with_context(|| format!("Failed to create constraint {}", name))?;
        }

        tracing::debug!("Neo4j constraints in place");
        Ok(())
    }

    /// Get graph statistics
    pub async fn stats(&self) -> Result<GraphStats> {
        Ok(GraphStats {
            chemicals: self.count("MATCH (n:Chemical) RETURN count(n) AS count").await?,
            chemical_names: self
                .count("MATCH (n:ChemicalName) RETURN count(n) AS count")
                .await?,
            regulations: self.count("MATCH (n:Regulation) RETURN count(n) AS count").await?,
            relationships: self
                .count("MATCH ()-[r:IS_NAME_OF|IS_REGULATED]->() RETURN count(r) AS count")
                .await?,
        })
    }

    async fn count(&self, cypher: &str) -> Result<usize> {
        let mut result = self.graph.execute(Query::new(cypher.to_string())).await?;
        let count = if let Some(row) = result.next().await? {
            row.get::<i64>("count").unwrap_or(0) as usize
        } else {
            0
        };
        Ok(count)
    }

    pub async fn ping(&self) -> Result<()> {
        self.graph
            .run(neo4rs::query("RETURN 1"))
            .await
            .context("Neo4j ping failed")
    }
}

impl ChemicalSink for ChemicalGraph {
    async fn prepare(&self) -> Result<()> {
        self.init_schema().await
    }

    async fn upsert(&self, plan: UpsertPlan) -> Result<()> {
        let description = format!("{:?}", plan);
        let Some(query) = plan.into_query() else {
            return Ok(());
        };
        self.graph
            .run(query)
            .await
            .with_context(|| format!("Failed to upsert {}", description))
    }
}

impl CypherExecutor for ChemicalGraph {
    async fn read_rows(&self, cypher: &str, limit: usize) -> Result<Vec<serde_json::Value>> {
        let mut result = self
            .graph
            .execute(Query::new(cypher.to_string()))
            .await
            .context("Failed to run Cypher query")?;

        let mut rows = Vec::new();
        while rows.len() < limit {
            let Some(row) = result.next().await? else {
                break;
            };
            let value: serde_json::Value = row
                .to()
                .context("Failed to decode Cypher row")?;
            rows.push(value);
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(name: Option<&str>, cas: Option<&str>, regulation: Option<&str>) -> StoredChemical {
        StoredChemical {
            chemical_name: name.map(str::to_string),
            cas: cas.map(str::to_string),
            regulation: regulation.map(str::to_string),
        }
    }

    #[test]
    fn test_full_plan() {
        let plan = UpsertPlan::for_record(&stored(Some("Ethanol"), Some("64-17-5"), Some("Annex_III")));
        assert_eq!(
            plan,
            UpsertPlan::Full {
                name: "Ethanol".to_string(),
                cas: "64-17-5".to_string(),
                regulation: "Annex_III".to_string(),
            }
        );
        assert!(plan.into_query().is_some());
    }

    #[test]
    fn test_partial_plans() {
        assert!(matches!(
            UpsertPlan::for_record(&stored(Some("Tremolite"), Some("N/A"), Some("Annex_III"))),
            UpsertPlan::NameOnly { .. }
        ));
        assert!(matches!(
            UpsertPlan::for_record(&stored(None, Some("77536-68-6"), Some("Annex_III"))),
            UpsertPlan::CasOnly { .. }
        ));
    }

    #[test]
    fn test_skips() {
        assert_eq!(
            UpsertPlan::for_record(&stored(Some("Ethanol"), Some("64-17-5"), None)),
            UpsertPlan::SkipNoRegulation
        );
        assert_eq!(
            UpsertPlan::for_record(&stored(Some("Ethanol"), Some("64-17-5"), Some(" "))),
            UpsertPlan::SkipNoRegulation
        );
        assert_eq!(
            UpsertPlan::for_record(&stored(Some("NA"), Some("N/A"), Some("Annex_III"))),
            UpsertPlan::SkipNoIdentifier
        );
        assert!(UpsertPlan::SkipNoIdentifier.into_query().is_none());
    }

    #[test]
    fn test_reads_extraction_output() {
        let raw = r#"{"chemicals": [
            {"chemical_name": "Ethanol", "CAS": "64-17-5", "regulation": "Annex_III"},
            {"chemical_name": "Tremolite", "CAS": null, "regulation": "Annex_III"},
            {"chemical_name": "Benzene", "CAS": "71-43-2"}
        ]}"#;
        let document: StoredChemicals = serde_json::from_str(raw).unwrap();

        let plans: Vec<_> = document.chemicals.iter().map(UpsertPlan::for_record).collect();
        assert!(matches!(plans[0], UpsertPlan::Full { .. }));
        assert!(matches!(plans[1], UpsertPlan::NameOnly { .. }));
        assert_eq!(plans[2], UpsertPlan::SkipNoRegulation);
    }

    #[test]
    fn test_schema_mentions_every_label() {
        for label in ["Chemical", "ChemicalName", "Regulation", "IS_NAME_OF", "IS_REGULATED"] {
            assert!(GRAPH_SCHEMA.contains(label));
        }
    }
}
