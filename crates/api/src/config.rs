use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use extract::{
    BatchOptions, CompletionBackend, OllamaClient, OpenAiClient, OutputFormat, PipelineError,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

impl From<ConfigError> for PipelineError {
    fn from(e: ConfigError) -> Self {
        PipelineError::Configuration(e.to_string())
    }
}

/// Reads settings through a lookup function; blank values count as unset.
struct Settings<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Settings<F> {
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
        }
    }

    fn flag(&self, name: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.optional(name).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
            Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
            Some(value) => Err(ConfigError::Invalid {
                name,
                value,
                reason: "expected true or false".to_string(),
            }),
        }
    }
}

fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    OpenAi,
    Ollama,
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("expected openai or ollama, got {:?}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionConfig {
    pub backend: BackendKind,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    #[serde(skip)]
    api_key: Option<String>,
}

impl CompletionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let settings = Settings { lookup };
        let backend = settings.parsed("COMPLETION_BACKEND", BackendKind::OpenAi)?;

        let (default_model, default_url, api_key) = match backend {
            BackendKind::OpenAi => (
                OpenAiClient::DEFAULT_MODEL,
                OpenAiClient::DEFAULT_BASE_URL,
                Some(settings.required("OPENAI_API_KEY")?),
            ),
            BackendKind::Ollama => (
                OllamaClient::DEFAULT_MODEL,
                OllamaClient::DEFAULT_BASE_URL,
                None,
            ),
        };

        let max_tokens = settings.parsed("MAX_TOKENS", 4000u32)?;
        if max_tokens == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_TOKENS",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            backend,
            model: settings
                .optional("COMPLETION_MODEL")
                .unwrap_or_else(|| default_model.to_string()),
            base_url: settings
                .optional("COMPLETION_BASE_URL")
                .unwrap_or_else(|| default_url.to_string()),
            max_tokens,
            api_key,
        })
    }

    pub fn client(&self) -> CompletionBackend {
        match self.backend {
            BackendKind::OpenAi => CompletionBackend::OpenAi(OpenAiClient::new(
                self.base_url.clone(),
                self.model.clone(),
                self.api_key.clone().unwrap_or_default(),
            )),
            BackendKind::Ollama => CompletionBackend::Ollama(OllamaClient::new(
                self.base_url.clone(),
                self.model.clone(),
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionConfig {
    pub input_folder: PathBuf,
    pub output_folder: PathBuf,
    pub csv_chunk_size: usize,
    pub output_format: OutputFormat,
    pub validation_pass: bool,
}

impl ExtractionConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let settings = Settings { lookup };

        let csv_chunk_size = settings.parsed("CSV_CHUNK_SIZE", 15usize)?;
        if csv_chunk_size == 0 {
            return Err(ConfigError::Invalid {
                name: "CSV_CHUNK_SIZE",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(Self {
            input_folder: settings.required("INPUT_FOLDER")?.into(),
            output_folder: settings.required("JSON_OUTPUT_FOLDER")?.into(),
            csv_chunk_size,
            output_format: settings.parsed("OUTPUT_FORMAT", OutputFormat::Json)?,
            validation_pass: settings.flag("VALIDATION_PASS", true)?,
        })
    }

    pub fn batch_options(&self) -> BatchOptions {
        BatchOptions {
            input_dir: self.input_folder.clone(),
            output_dir: self.output_folder.clone(),
            csv_chunk_rows: self.csv_chunk_size,
            output_format: self.output_format,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphConfig {
    pub uri: String,
    pub username: String,
    #[serde(skip)]
    password: String,
    pub qa_top_k: usize,
}

impl GraphConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let settings = Settings { lookup };
        Ok(Self {
            uri: settings.required("NEO4J_URI")?,
            username: settings.required("NEO4J_USERNAME")?,
            password: settings.required("NEO4J_PASSWORD")?,
            qa_top_k: settings.parsed("QA_TOP_K", query::DEFAULT_TOP_K)?,
        })
    }

    pub async fn connect(&self) -> Result<index::ChemicalGraph, PipelineError> {
        index::ChemicalGraph::connect(&self.uri, &self.username, &self.password).await
    }
}

/// Folder the loader reads `.json` files from.
pub fn json_folder_from_env() -> Result<PathBuf, ConfigError> {
    json_folder_from_lookup(process_env)
}

pub fn json_folder_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PathBuf, ConfigError> {
    Settings { lookup }.required("JSON_OUTPUT_FOLDER").map(PathBuf::from)
}

pub fn bind_addr_from_env() -> String {
    Settings { lookup: process_env }
        .optional("BIND_ADDR")
        .unwrap_or_else(|| "0.0.0.0:3000".to_string())
}

pub fn log_file_from_env() -> Option<PathBuf> {
    Settings { lookup: process_env }
        .optional("LOG_FILE")
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_completion_defaults() {
        let config = CompletionConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-test")])).unwrap();

        assert_eq!(config.backend, BackendKind::OpenAi);
        assert_eq!(config.model, "gpt-4.5-preview");
        assert_eq!(config.max_tokens, 4000);
        assert!(config.client().describe().contains("gpt-4.5-preview"));
    }

    #[test]
    fn test_openai_needs_key() {
        let err = CompletionConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("OPENAI_API_KEY"));
    }

    #[test]
    fn test_ollama_backend() {
        let config = CompletionConfig::from_lookup(lookup(&[
            ("COMPLETION_BACKEND", "Ollama"),
            ("COMPLETION_MODEL", "mistral"),
        ]))
        .unwrap();

        assert_eq!(config.backend, BackendKind::Ollama);
        assert_eq!(config.model, "mistral");
        assert_eq!(config.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_secret_not_serialized() {
        let config = CompletionConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-secret")])).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-secret"));

        let graph = GraphConfig::from_lookup(lookup(&[
            ("NEO4J_URI", "bolt://localhost:7687"),
            ("NEO4J_USERNAME", "neo4j"),
            ("NEO4J_PASSWORD", "hunter2"),
        ]))
        .unwrap();
        assert_eq!(graph.qa_top_k, 200);
        assert!(!serde_json::to_string(&graph).unwrap().contains("hunter2"));
    }

    #[test]
    fn test_extraction_config() {
        let config = ExtractionConfig::from_lookup(lookup(&[
            ("INPUT_FOLDER", "/data/in"),
            ("JSON_OUTPUT_FOLDER", "/data/out"),
            ("OUTPUT_FORMAT", "both"),
            ("VALIDATION_PASS", "false"),
        ]))
        .unwrap();

        assert_eq!(config.csv_chunk_size, 15);
        assert_eq!(config.output_format, OutputFormat::Both);
        assert!(!config.validation_pass);
        assert_eq!(config.batch_options().output_dir, PathBuf::from("/data/out"));
    }

    #[test]
    fn test_invalid_values() {
        let base = [("INPUT_FOLDER", "in"), ("JSON_OUTPUT_FOLDER", "out")];

        let zero = ExtractionConfig::from_lookup(lookup(&[base[0], base[1], ("CSV_CHUNK_SIZE", "0")]));
        assert!(matches!(zero, Err(ConfigError::Invalid { name: "CSV_CHUNK_SIZE", .. })));

        let word = ExtractionConfig::from_lookup(lookup(&[base[0], base[1], ("CSV_CHUNK_SIZE", "many")]));
        assert!(matches!(word, Err(ConfigError::Invalid { name: "CSV_CHUNK_SIZE", .. })));

        let flag = ExtractionConfig::from_lookup(lookup(&[base[0], base[1], ("VALIDATION_PASS", "maybe")]));
        assert!(matches!(flag, Err(ConfigError::Invalid { name: "VALIDATION_PASS", .. })));

        let missing = ExtractionConfig::from_lookup(lookup(&[base[1]]));
        assert_eq!(missing.unwrap_err(), ConfigError::Missing("INPUT_FOLDER"));
    }

    #[test]
    fn test_into_pipeline_error() {
        let err: PipelineError = ConfigError::Missing("NEO4J_URI").into();
        assert!(err.is_fatal());
        assert_eq!(err.to_string(), "configuration error: NEO4J_URI is not set");
    }

    #[test]
    fn test_json_folder() {
        assert_eq!(
            json_folder_from_lookup(lookup(&[("JSON_OUTPUT_FOLDER", "out")])).unwrap(),
            PathBuf::from("out")
        );
        assert!(json_folder_from_lookup(lookup(&[])).is_err());
    }
}
