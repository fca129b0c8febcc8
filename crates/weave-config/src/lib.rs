//! Renderer configuration: composition, validation and documents.
//!
//! This crate defines everything that happens before a renderer is called:
//!
//! - [`Config`] — Partial renderer configuration, built with [`Config::builder()`]
//! - [`merge`] — Combines a parent and a child configuration
//! - [`validate`] — Checks a merged configuration against a [`ConfigKind`] and [`Mode`]
//! - [`PromptType`] — Call-time dispatch discriminator
//! - [`Schema`] / [`JsonSchema`] — Context and output validators
//! - [`Loader`] — Resolves templates and scripts by name
//! - [`ConfigDocument`] / [`PresetRegistry`] — JSON documents and presets
//!
//! # Builder API
//!
//! ```rust
//! use weave_config::{merge, validate, Config, ConfigKind, Mode};
//!
//! let house = Config::builder().var("tone", "dry").build();
//! let greeting = Config::builder()
//!     .template("Hello {{ name }}, said {{ tone }}ly")
//!     .var("name", "World")
//!     .build();
//!
//! let merged = merge(&house, &greeting);
//! assert_eq!(merged.context.as_ref().unwrap().len(), 2);
//! assert!(validate(&merged, ConfigKind::Template, Mode::generator()).is_ok());
//! ```

mod config;
mod document;
mod kind;
mod loader;
mod merge;
mod schema;
mod validate;

pub use config::{
    BoxError, Config, ConfigBuilder, ExecuteFn, FilterFn, Filters, PromptFn, PromptSource,
    PromptValue, TemplateOptions,
};
pub use document::{ConfigDocument, DocumentPrompt, LoaderSpec, ModelRegistry, PresetRegistry};
pub use kind::{ConfigKind, ObjectMode, OutputKind, PromptKind, PromptType};
pub use loader::{load_source, FileSystemLoader, HttpLoader, Loader, MemoryLoader, RaceLoader};
pub use merge::merge;
pub use schema::{JsonSchema, Schema, SchemaError};
pub use validate::{apply_defaults, forbidden_fields, validate, Mode};

/// Errors raised while loading, merging or validating a configuration.
///
/// Every variant is a construction-time failure: a renderer is never built
/// from a configuration that produced one.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// Failed to read a configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse JSON configuration.
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// Requested preset was not found in the registry.
    #[error("Preset not found: '{0}'")]
    PresetNotFound(String),

    /// A field the renderer needs is absent.
    #[error("Missing required field '{field}' (required {reason})")]
    MissingField { field: &'static str, reason: String },

    /// A field the renderer kind does not accept is present.
    #[error("Field '{field}' is not allowed in a {kind} renderer")]
    ForbiddenField { field: &'static str, kind: ConfigKind },

    #[error("Fields '{first}' and '{second}' cannot both be set")]
    MutuallyExclusive { first: &'static str, second: &'static str },

    /// `output` is not one of `object`, `array`, `enum`, `no-schema`.
    #[error("Invalid 'output' value '{0}'")]
    InvalidOutput(String),

    #[error("Invalid message at index {index}: {reason}")]
    InvalidMessage { index: usize, reason: &'static str },

    #[error("Invalid prompt type: {0}")]
    InvalidPromptType(String),

    /// A schema document failed to compile.
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    /// A document referenced a model id missing from the registry.
    #[error("Unknown model: '{0}'")]
    UnknownModel(String),

    /// Any other rule violation, described in full.
    #[error("{0}")]
    Invalid(String),
}

impl ConfigError {
    /// Creates an IO error with path context.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
