//! Construction-time checks of a merged configuration.
//!
//! Validation runs once, when a renderer is built, and never repairs a
//! configuration: the first violated rule is returned as a [`ConfigError`].

use tracing::debug;

use crate::config::{Config, PromptSource};
use crate::kind::{ConfigKind, ObjectMode, OutputKind, PromptKind};
use crate::ConfigError;

/// How a renderer is being built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
    /// Exposed as a tool; requires `input_schema`.
    pub is_tool: bool,
    /// Sources are names resolved through `loader`.
    pub loaded_by_name: bool,
    /// Produces a stream rather than a single result.
    pub streamer: bool,
}

impl Mode {
    pub fn generator() -> Self {
        Self::default()
    }

    pub fn streamer() -> Self {
        Self { streamer: true, ..Self::default() }
    }

    pub fn as_tool(self) -> Self {
        Self { is_tool: true, ..self }
    }

    pub fn by_name(self) -> Self {
        Self { loaded_by_name: true, ..self }
    }
}

/// Fields a kind must not carry.
pub fn forbidden_fields(kind: ConfigKind) -> &'static [&'static str] {
    match kind {
        ConfigKind::Text => &["execute", "schema", "enum", "output"],
        ConfigKind::Object => &["execute"],
        ConfigKind::Template => &["model", "script", "execute", "output", "enum", "mode"],
        ConfigKind::Script => &["model", "template", "execute", "output", "enum", "mode"],
        ConfigKind::Function => {
            &["model", "template", "script", "prompt", "output", "enum", "mode", "loader"]
        }
    }
}

fn has(config: &Config, field: &str) -> bool {
    match field {
        "model" => config.model.is_some(),
        "execute" => config.execute.is_some(),
        "template" => config.template.is_some(),
        "script" => config.script.is_some(),
        "prompt" => config.prompt.is_some(),
        "schema" => config.schema.is_some(),
        "enum" => config.enum_values.is_some(),
        "output" => config.output.is_some(),
        "mode" => config.mode.is_some(),
        "loader" => config.loader.as_ref().is_some_and(|l| !l.is_empty()),
        "input_schema" => config.input_schema.is_some(),
        _ => false,
    }
}

fn has_text_prompt(config: &Config) -> bool {
    matches!(config.prompt, Some(PromptSource::Text(_)))
}

/// Fills in defaults that validation and dispatch rely on.
///
/// An Object renderer without `output` produces a single object.
pub fn apply_defaults(config: &mut Config, kind: ConfigKind) {
    if kind == ConfigKind::Object && config.output.is_none() {
        config.output = Some(OutputKind::Object);
    }
}

/// Checks `config` against the rules of `kind` built in `mode`.
pub fn validate(config: &Config, kind: ConfigKind, mode: Mode) -> Result<(), ConfigError> {
    debug!(%kind, ?mode, "Validating config");

    check_universal(config)?;

    for &field in forbidden_fields(kind) {
        if has(config, field) {
            return Err(ConfigError::ForbiddenField { field, kind });
        }
    }

    check_required(config, kind, mode)?;

    if kind == ConfigKind::Object {
        check_object_output(config, mode)?;
    }

    // A rendered prompt binds a template or script over the same context.
    let renders_context = match kind {
        ConfigKind::Template | ConfigKind::Script => true,
        ConfigKind::Text | ConfigKind::Object => config.prompt_type.is_some_and(|t| t.is_rendered()),
        ConfigKind::Function => false,
    };
    if renders_context {
        check_object_input_schema(config)?;
    }

    check_prompt_type(config, kind)
}

fn check_object_input_schema(config: &Config) -> Result<(), ConfigError> {
    match &config.input_schema {
        Some(schema) if !schema.is_object() => Err(ConfigError::Invalid(
            "An 'input_schema' must describe an object.".into(),
        )),
        _ => Ok(()),
    }
}

fn check_universal(config: &Config) -> Result<(), ConfigError> {
    if config.template.is_some() && config.script.is_some() {
        return Err(ConfigError::MutuallyExclusive { first: "template", second: "script" });
    }

    if let Some(messages) = &config.messages {
        for (index, message) in messages.iter().enumerate() {
            message.check().map_err(|reason| ConfigError::InvalidMessage { index, reason })?;
        }
    }

    if let Some(PromptSource::Messages(messages)) = &config.prompt {
        for (index, message) in messages.iter().enumerate() {
            message.check().map_err(|reason| ConfigError::InvalidMessage { index, reason })?;
        }
    }

    Ok(())
}

fn check_required(config: &Config, kind: ConfigKind, mode: Mode) -> Result<(), ConfigError> {
    let missing = |field: &'static str, reason: String| ConfigError::MissingField { field, reason };

    match kind {
        ConfigKind::Text | ConfigKind::Object if !has(config, "model") => {
            return Err(missing("model", format!("by a {} renderer", kind)));
        }
        ConfigKind::Template if !mode.loaded_by_name => {
            if !has(config, "template") && !has_text_prompt(config) {
                return Err(missing("template", "by a Template renderer".into()));
            }
        }
        ConfigKind::Script if !mode.loaded_by_name => {
            if !has(config, "script") && !has_text_prompt(config) {
                return Err(missing("script", "by a Script renderer".into()));
            }
        }
        ConfigKind::Function if !has(config, "execute") => {
            return Err(missing("execute", "by a Function renderer".into()));
        }
        _ => {}
    }

    if kind.requires_llm() && !mode.loaded_by_name {
        let rendered = config.prompt_type.is_some_and(|t| t.is_rendered());
        if rendered && !has(config, "prompt") {
            return Err(missing("prompt", "to render a prompt source".into()));
        }
    }

    if mode.loaded_by_name && !has(config, "loader") {
        return Err(missing("loader", "when loading by name".into()));
    }

    if mode.is_tool && !has(config, "input_schema") {
        return Err(missing("input_schema", "when used as a tool".into()));
    }

    Ok(())
}

fn check_object_output(config: &Config, mode: Mode) -> Result<(), ConfigError> {
    let output = config.output.unwrap_or_default();
    match output {
        OutputKind::Object | OutputKind::Array if config.schema.is_none() => Err(ConfigError::Invalid(
            format!("An 'output' of '{}' requires a 'schema' property.", output),
        )),
        OutputKind::Enum if mode.streamer => Err(ConfigError::Invalid(
            "An 'output' of 'enum' cannot be used when streaming.".into(),
        )),
        _ if mode.streamer && config.mode == Some(ObjectMode::Tool) => Err(ConfigError::Invalid(
            "A 'mode' of 'tool' cannot be used when streaming.".into(),
        )),
        OutputKind::Enum if config.enum_values.as_ref().map_or(true, |v| v.is_empty()) => Err(
            ConfigError::Invalid("An 'output' of 'enum' requires a non-empty 'enum' array.".into()),
        ),
        _ => Ok(()),
    }
}

fn check_prompt_type(config: &Config, kind: ConfigKind) -> Result<(), ConfigError> {
    let prompt_type = match config.prompt_type {
        Some(prompt_type) => prompt_type,
        None => {
            if matches!(config.prompt, Some(PromptSource::Function(_))) {
                return Err(ConfigError::Invalid(
                    "A function 'prompt' requires the 'function' prompt type.".into(),
                ));
            }
            return Ok(());
        }
    };

    let fits_kind = match kind {
        ConfigKind::Text | ConfigKind::Object => true,
        ConfigKind::Template => prompt_type.kind.is_template(),
        ConfigKind::Script => prompt_type.kind.is_script(),
        ConfigKind::Function => prompt_type.kind == PromptKind::Function,
    };
    if !fits_kind {
        return Err(ConfigError::InvalidPromptType(format!(
            "'{}' cannot be used by a {} renderer",
            prompt_type, kind
        )));
    }

    match (&config.prompt, prompt_type.kind) {
        (Some(PromptSource::Function(_)), PromptKind::Function) => Ok(()),
        (Some(PromptSource::Function(_)), _) => Err(ConfigError::Invalid(
            "A function 'prompt' requires the 'function' prompt type.".into(),
        )),
        (_, PromptKind::Function) if kind.requires_llm() => Err(ConfigError::MissingField {
            field: "prompt",
            reason: "as a function for the 'function' prompt type".into(),
        }),
        (Some(PromptSource::Messages(_)), other) if other != PromptKind::Text => {
            Err(ConfigError::Invalid(format!(
                "A message-list 'prompt' cannot be used with the '{}' prompt type.",
                prompt_type
            )))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
