//! JSON configuration documents, model lookup and presets.
//!
//! A [`ConfigDocument`] is the serializable subset of [`Config`]: models are
//! referenced by id and schemas are plain JSON Schema documents. Function
//! fields (`execute`, filters, function prompts) only exist in code.
//!
//! # Loading from JSON
//!
//! ```rust
//! use std::sync::Arc;
//! use weave_config::{ConfigDocument, ModelRegistry};
//! use weave_llm::ScriptedModel;
//!
//! let models = ModelRegistry::new().with(Arc::new(ScriptedModel::new("gpt-4o-mini")));
//! let doc = ConfigDocument::from_json(r#"{
//!     "model": "gpt-4o-mini",
//!     "prompt": "Summarize {{ topic }}",
//!     "context": { "topic": "tides" },
//!     "temperature": 0.2
//! }"#).unwrap();
//!
//! let config = doc.into_config(&models).unwrap();
//! assert_eq!(config.temperature, Some(0.2));
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use weave_core::{Context, Message};
use weave_llm::LanguageModel;

use crate::config::{Config, PromptSource, TemplateOptions};
use crate::kind::{ObjectMode, OutputKind};
use crate::loader::{FileSystemLoader, HttpLoader, Loader, MemoryLoader};
use crate::schema::{JsonSchema, Schema};
use crate::ConfigError;

/// A loader described in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LoaderSpec {
    /// Files below `root`.
    Fs { root: PathBuf },
    /// `GET {base_url}/{name}`.
    Http { base_url: String },
    /// Inline sources keyed by name.
    Memory { sources: HashMap<String, String> },
}

impl LoaderSpec {
    pub fn build(&self) -> Arc<dyn Loader> {
        match self {
            LoaderSpec::Fs { root } => Arc::new(FileSystemLoader::new(root.clone())),
            LoaderSpec::Http { base_url } => Arc::new(HttpLoader::new(base_url.clone())),
            LoaderSpec::Memory { sources } => {
                let mut loader = MemoryLoader::new();
                for (name, source) in sources {
                    loader.insert(name.clone(), source.clone());
                }
                Arc::new(loader)
            }
        }
    }
}

/// A literal prompt in a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentPrompt {
    Text(String),
    Messages(Vec<Message>),
}

/// Serializable form of a [`Config`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigDocument {
    /// Model id, resolved through a [`ModelRegistry`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<DocumentPrompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// One of `object`, `array`, `enum`, `no-schema`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ObjectMode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<TemplateOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loader: Option<Vec<LoaderSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_steps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
}

impl ConfigDocument {
    /// Loads a document from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::io(path.display().to_string(), e))?;
        Self::from_json(&content)
    }

    /// Parses a document from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        if !value.is_object() {
            return Err(ConfigError::Invalid("A config document must be a JSON object.".into()));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Serializes this document to pretty JSON.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Converts the document into a [`Config`].
    ///
    /// Fails on an unknown model id, an unknown `output` value or a schema
    /// that does not compile.
    pub fn into_config(self, models: &ModelRegistry) -> Result<Config, ConfigError> {
        let model = self.model.as_deref().map(|id| models.resolve(id)).transpose()?;
        let output = self.output.as_deref().map(str::parse::<OutputKind>).transpose()?;
        let schema = self.schema.map(JsonSchema::new).transpose()?;
        let input_schema = self.input_schema.map(JsonSchema::new).transpose()?;
        let prompt = self.prompt.map(|prompt| match prompt {
            DocumentPrompt::Text(text) => PromptSource::Text(text),
            DocumentPrompt::Messages(messages) => PromptSource::Messages(messages),
        });
        let loader = self
            .loader
            .map(|specs| specs.iter().map(LoaderSpec::build).collect());

        Ok(Config {
            model,
            template: self.template,
            script: self.script,
            prompt,
            messages: self.messages,
            system: self.system,
            output,
            schema: schema.map(|s| Arc::new(s) as Arc<dyn Schema>),
            enum_values: self.enum_values,
            schema_name: self.schema_name,
            schema_description: self.schema_description,
            mode: self.mode,
            context: self.context,
            options: self.options,
            loader,
            input_schema: input_schema.map(|s| Arc::new(s) as Arc<dyn Schema>),
            description: self.description,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: self.top_p,
            seed: self.seed,
            stop_sequences: self.stop_sequences,
            presence_penalty: self.presence_penalty,
            frequency_penalty: self.frequency_penalty,
            max_steps: self.max_steps,
            debug: self.debug,
            ..Config::default()
        })
    }
}

/// Resolves model ids used in documents to providers.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<dyn LanguageModel>>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.models.keys()).finish()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a model under its own id.
    pub fn register(&mut self, model: Arc<dyn LanguageModel>) {
        self.models.insert(model.model_id().to_string(), model);
    }

    /// Registers a model under an alias.
    pub fn insert(&mut self, id: impl Into<String>, model: Arc<dyn LanguageModel>) {
        self.models.insert(id.into(), model);
    }

    pub fn with(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.register(model);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn LanguageModel>> {
        self.models.get(id).cloned()
    }

    /// Looks up `id`, failing with [`ConfigError::UnknownModel`].
    pub fn resolve(&self, id: &str) -> Result<Arc<dyn LanguageModel>, ConfigError> {
        self.get(id).ok_or_else(|| ConfigError::UnknownModel(id.to_string()))
    }
}

/// Registry of reusable configuration documents loaded from disk.
///
/// Each `*.json` file in the directory becomes a preset keyed by its file
/// stem, so `presets/summarizer.json` is the preset `summarizer`.
///
/// ```rust,ignore
/// use weave_config::PresetRegistry;
///
/// let registry = PresetRegistry::load_from_dir(Path::new("presets"))?;
/// let parent = registry.config("house-style", &models)?;
/// ```
#[derive(Debug, Default)]
pub struct PresetRegistry {
    presets: HashMap<String, ConfigDocument>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads all JSON documents from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let mut registry = Self::new();

        let entries = fs::read_dir(dir).map_err(|e| ConfigError::io(dir.display().to_string(), e))?;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                let document = ConfigDocument::from_file(&path)?;
                debug!(preset = id, "Loaded preset");
                registry.presets.insert(id.to_string(), document);
            }
        }

        Ok(registry)
    }

    pub fn insert(&mut self, id: impl Into<String>, document: ConfigDocument) {
        self.presets.insert(id.into(), document);
    }

    pub fn get(&self, id: &str) -> Option<&ConfigDocument> {
        self.presets.get(id)
    }

    /// Builds the [`Config`] of a preset.
    pub fn config(&self, id: &str, models: &ModelRegistry) -> Result<Config, ConfigError> {
        self.get(id)
            .cloned()
            .ok_or_else(|| ConfigError::PresetNotFound(id.to_string()))?
            .into_config(models)
    }

    /// Returns all preset ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.presets.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_source;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;
    use weave_llm::ScriptedModel;

    fn models() -> ModelRegistry {
        ModelRegistry::new().with(Arc::new(ScriptedModel::new("local")))
    }

    #[test]
    fn converts_every_serializable_field() {
        let doc = ConfigDocument::from_json(
            r#"{
                "model": "local",
                "prompt": [{ "role": "user", "content": "hi" }],
                "messages": [{ "role": "system", "content": "be brief" }],
                "output": "array",
                "schema": { "type": "object" },
                "enum": ["a"],
                "mode": "json",
                "context": { "n": 1 },
                "options": { "autoescape": true },
                "max_steps": 3,
                "debug": true
            }"#,
        )
        .unwrap();

        let config = doc.into_config(&models()).unwrap();
        assert_eq!(config.model.clone().unwrap().model_id(), "local");
        assert!(matches!(config.prompt, Some(PromptSource::Messages(ref m)) if m.len() == 1));
        assert_eq!(config.messages.clone().unwrap(), vec![Message::system("be brief")]);
        assert_eq!(config.output, Some(OutputKind::Array));
        assert_eq!(config.schema.clone().unwrap().json_schema(), json!({ "type": "object" }));
        assert_eq!(config.enum_values.clone().unwrap(), vec!["a"]);
        assert_eq!(config.mode, Some(ObjectMode::Json));
        assert_eq!(config.context.clone().unwrap()["n"], json!(1));
        assert!(config.options.clone().unwrap().autoescape);
        assert_eq!(config.max_steps, Some(3));
        assert!(config.is_debug());
    }

    #[test]
    fn rejects_unknown_output_values() {
        let doc = ConfigDocument::from_json(r#"{ "output": "table" }"#).unwrap();
        assert!(matches!(doc.into_config(&models()), Err(ConfigError::InvalidOutput(v)) if v == "table"));
    }

    #[test]
    fn rejects_unknown_models() {
        let doc = ConfigDocument::from_json(r#"{ "model": "gpt-9" }"#).unwrap();
        assert!(matches!(doc.into_config(&models()), Err(ConfigError::UnknownModel(_))));
    }

    #[test]
    fn rejects_non_object_documents() {
        assert!(matches!(ConfigDocument::from_json("[1, 2]"), Err(ConfigError::Invalid(_))));
        assert!(matches!(ConfigDocument::from_json("{"), Err(ConfigError::Parse(_))));
        assert!(matches!(
            ConfigDocument::from_json(r#"{ "modle": "x" }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn memory_loader_specs_resolve() {
        let doc = ConfigDocument::from_json(
            r#"{ "loader": [{ "type": "memory", "sources": { "greet": "Hi {{ name }}" } }] }"#,
        )
        .unwrap();
        let loaders = doc.into_config(&models()).unwrap().loader.unwrap();
        assert_eq!(load_source(&loaders, "greet").await.unwrap(), "Hi {{ name }}");
    }

    #[test]
    fn presets_are_keyed_by_file_stem() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("house-style.json"), r#"{ "system": "Be terse." }"#).unwrap();
        std::fs::write(dir.path().join("tagger.json"), r#"{ "model": "local", "output": "no-schema" }"#)
            .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = PresetRegistry::load_from_dir(dir.path()).unwrap();
        assert_eq!(registry.ids(), vec!["house-style", "tagger"]);

        let style = registry.config("house-style", &models()).unwrap();
        assert_eq!(style.system.as_deref(), Some("Be terse."));
        assert!(matches!(
            registry.config("missing", &models()),
            Err(ConfigError::PresetNotFound(_))
        ));
    }

    #[test]
    fn documents_round_trip_through_json() {
        let doc = ConfigDocument {
            template: Some("Hello {{ name }}".into()),
            loader: Some(vec![LoaderSpec::Http { base_url: "https://example.com".into() }]),
            ..ConfigDocument::default()
        };
        let json = doc.to_json().unwrap();
        assert_eq!(ConfigDocument::from_json(&json).unwrap(), doc);
    }
}
