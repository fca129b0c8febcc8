//! Renderer kinds, prompt types and object output shapes.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::ConfigError;

/// The mutually exclusive categories of renderer.
///
/// | Kind | Discriminator |
/// |------|---------------|
/// | `Text` | `model` without object fields |
/// | `Object` | `model` with `output`, `schema` or `enum` |
/// | `Template` | `template` |
/// | `Script` | `script` |
/// | `Function` | `execute` |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    Text,
    Object,
    Template,
    Script,
    Function,
}

impl ConfigKind {
    /// Classifies a configuration by the fields it carries.
    ///
    /// Checks run in a fixed priority order (script, object fields, model,
    /// template/prompt, execute) because a later check would otherwise claim
    /// configurations that belong to an earlier kind: every Object config
    /// also has a `model`, and LLM configs carry a `prompt` too.
    pub fn infer(config: &Config) -> Option<ConfigKind> {
        if config.script.is_some() {
            return Some(ConfigKind::Script);
        }
        if config.output.is_some() || config.schema.is_some() || config.enum_values.is_some() {
            return Some(ConfigKind::Object);
        }
        if config.model.is_some() {
            return Some(ConfigKind::Text);
        }
        if config.template.is_some() || config.prompt.is_some() || config.prompt_type.is_some() {
            return Some(ConfigKind::Template);
        }
        if config.execute.is_some() {
            return Some(ConfigKind::Function);
        }
        None
    }

    /// Returns `true` if this kind calls a language model.
    pub fn requires_llm(&self) -> bool {
        matches!(self, ConfigKind::Text | ConfigKind::Object)
    }
}

impl std::fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Text => "Text",
            Self::Object => "Object",
            Self::Template => "Template",
            Self::Script => "Script",
            Self::Function => "Function",
        };
        write!(f, "{}", s)
    }
}

/// How the `prompt` (or `template`/`script`) source is turned into content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// Literal prompt content, no rendering step.
    Text,
    Template,
    AsyncTemplate,
    Script,
    AsyncScript,
    /// A function evaluated with the call context.
    Function,
}

impl PromptKind {
    pub fn is_template(&self) -> bool {
        matches!(self, PromptKind::Template | PromptKind::AsyncTemplate)
    }

    pub fn is_script(&self) -> bool {
        matches!(self, PromptKind::Script | PromptKind::AsyncScript)
    }
}

/// The dispatch discriminator fixed when a renderer is built.
///
/// `by_name` marks sources resolved through the `loader` at call time rather
/// than supplied inline. Renders as the wire names `text`, `template-name`,
/// `async-script`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PromptType {
    pub kind: PromptKind,
    pub by_name: bool,
}

impl PromptType {
    pub const TEXT: PromptType = PromptType::inline(PromptKind::Text);
    pub const TEMPLATE: PromptType = PromptType::inline(PromptKind::AsyncTemplate);
    pub const SCRIPT: PromptType = PromptType::inline(PromptKind::AsyncScript);
    pub const FUNCTION: PromptType = PromptType::inline(PromptKind::Function);

    pub const fn inline(kind: PromptKind) -> Self {
        Self { kind, by_name: false }
    }

    /// The same prompt type, resolved through the loader.
    pub const fn named(self) -> Self {
        Self { kind: self.kind, by_name: true }
    }

    /// Returns `true` if the prompt source must be rendered before use.
    pub fn is_rendered(&self) -> bool {
        self.kind != PromptKind::Text
    }
}

impl FromStr for PromptType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (base, by_name) = match s.strip_suffix("-name") {
            Some(base) => (base, true),
            None => (s, false),
        };
        let kind = match base {
            "text" => PromptKind::Text,
            "template" => PromptKind::Template,
            "async-template" => PromptKind::AsyncTemplate,
            "script" => PromptKind::Script,
            "async-script" => PromptKind::AsyncScript,
            "function" if !by_name => PromptKind::Function,
            _ => return Err(ConfigError::InvalidPromptType(s.to_string())),
        };
        Ok(PromptType { kind, by_name })
    }
}

impl std::fmt::Display for PromptType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self.kind {
            PromptKind::Text => "text",
            PromptKind::Template => "template",
            PromptKind::AsyncTemplate => "async-template",
            PromptKind::Script => "script",
            PromptKind::AsyncScript => "async-script",
            PromptKind::Function => "function",
        };
        match self.by_name {
            true => write!(f, "{}-name", s),
            false => write!(f, "{}", s),
        }
    }
}

/// Shape of the value produced by an Object renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    /// A single object matching `schema` (default).
    #[default]
    Object,
    /// An array whose elements match `schema`.
    Array,
    /// One of the `enum` values.
    Enum,
    /// Any JSON value.
    NoSchema,
}

impl FromStr for OutputKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "object" => Ok(Self::Object),
            "array" => Ok(Self::Array),
            "enum" => Ok(Self::Enum),
            "no-schema" => Ok(Self::NoSchema),
            other => Err(ConfigError::InvalidOutput(other.to_string())),
        }
    }
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::Enum => "enum",
            Self::NoSchema => "no-schema",
        };
        write!(f, "{}", s)
    }
}

/// How an Object renderer asks the model for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectMode {
    #[default]
    Auto,
    /// JSON response format.
    Json,
    /// A single forced tool call whose arguments are the object.
    Tool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::JsonSchema;
    use std::sync::Arc;
    use weave_llm::ScriptedModel;

    #[test]
    fn prompt_types_round_trip_through_wire_names() {
        for name in [
            "text",
            "text-name",
            "template",
            "async-template",
            "template-name",
            "async-template-name",
            "script",
            "async-script",
            "script-name",
            "async-script-name",
            "function",
        ] {
            let parsed: PromptType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
    }

    #[test]
    fn unknown_prompt_types_are_rejected() {
        assert!(matches!("function-name".parse::<PromptType>(), Err(ConfigError::InvalidPromptType(_))));
        assert!(matches!("markdown".parse::<PromptType>(), Err(ConfigError::InvalidPromptType(_))));
    }

    #[test]
    fn output_parses_only_known_values() {
        assert_eq!("no-schema".parse::<OutputKind>().unwrap(), OutputKind::NoSchema);
        let err = "table".parse::<OutputKind>().unwrap_err();
        assert!(err.to_string().contains("table"));
    }

    #[test]
    fn infer_follows_priority_order() {
        let model = Arc::new(ScriptedModel::new("m"));
        let schema = Arc::new(JsonSchema::new(serde_json::json!({ "type": "object" })).unwrap());

        let text = Config::builder().model(model.clone()).prompt("hi").build();
        assert_eq!(ConfigKind::infer(&text), Some(ConfigKind::Text));

        let object = Config::builder().model(model).schema(schema).prompt("hi").build();
        assert_eq!(ConfigKind::infer(&object), Some(ConfigKind::Object));

        let script = Config::builder().script("return 1").prompt("x").build();
        assert_eq!(ConfigKind::infer(&script), Some(ConfigKind::Script));

        let template = Config::builder().template("Hi").build();
        assert_eq!(ConfigKind::infer(&template), Some(ConfigKind::Template));

        let function = Config::builder()
            .execute(|_ctx| async { Ok(serde_json::Value::Null) })
            .build();
        assert_eq!(ConfigKind::infer(&function), Some(ConfigKind::Function));

        assert_eq!(ConfigKind::infer(&Config::default()), None);
    }
}
