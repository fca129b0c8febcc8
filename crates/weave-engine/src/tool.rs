//! Exposing a renderer to a model as a tool.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use weave_config::{ConfigError, ConfigKind};
use weave_tools::{Tool, ToolError};

use crate::renderer::Renderer;

/// A [`Renderer`] built with [`as_tool`](crate::RendererSpec::as_tool),
/// callable by a model.
///
/// The tool's parameters are the renderer's `input_schema` and its arguments
/// become the call context. A renderer whose prompt is plain text takes its
/// prompt from a `"prompt"` argument instead. Whatever the renderer returns
/// is handed back to the model as text.
#[derive(Debug, Clone)]
pub struct RendererTool {
    name: String,
    description: String,
    renderer: Renderer,
}

impl RendererTool {
    pub fn new(name: impl Into<String>, renderer: Renderer) -> Result<Self, ConfigError> {
        if !renderer.mode().is_tool {
            return Err(ConfigError::Invalid(
                "Only a renderer built as a tool can be exposed to a model.".into(),
            ));
        }
        let description = renderer
            .config()
            .description
            .clone()
            .unwrap_or_else(|| format!("{} renderer", renderer.renderer_type()));
        Ok(Self {
            name: name.into(),
            description,
            renderer,
        })
    }

    fn takes_prompt(&self) -> bool {
        matches!(self.renderer.kind(), ConfigKind::Text | ConfigKind::Object)
            && !self.renderer.prompt_type().is_some_and(|t| t.is_rendered())
    }
}

#[async_trait]
impl Tool for RendererTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> Value {
        self.renderer
            .config()
            .input_schema
            .as_ref()
            .map(|schema| schema.json_schema())
            .unwrap_or_else(|| serde_json::json!({ "type": "object" }))
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let Value::Object(context) = args else {
            return Err(ToolError::InvalidArguments("expected a JSON object".into()));
        };
        if let Some(schema) = &self.renderer.config().input_schema {
            schema
                .safe_parse(&Value::Object(context.clone()))
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        }

        debug!(tool = %self.name, renderer = %self.renderer.renderer_type(), "Running renderer tool");

        let output = if self.takes_prompt() {
            let prompt = context
                .get("prompt")
                .and_then(Value::as_str)
                .ok_or_else(|| ToolError::InvalidArguments("missing string argument 'prompt'".into()))?;
            self.renderer.call(prompt).await
        } else {
            self.renderer.call(context).await
        };

        let output = output.map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;
        output
            .into_string()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RendererSpec;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use weave_config::{Config, JsonSchema};
    use weave_core::ToolCall;
    use weave_llm::ScriptedModel;
    use weave_tools::ToolRegistry;

    fn schema(value: Value) -> Arc<JsonSchema> {
        Arc::new(JsonSchema::new(value).unwrap())
    }

    fn greeter() -> Renderer {
        let config = Config::builder()
            .template("Hello {{ name }}")
            .description("Greets someone by name")
            .input_schema(schema(json!({
                "type": "object",
                "properties": { "name": { "type": "string" } },
                "required": ["name"]
            })))
            .build();
        RendererSpec::template().as_tool().build(config, None).unwrap()
    }

    #[test]
    fn renderers_must_be_built_as_tools() {
        let plain = RendererSpec::template()
            .build(Config::builder().template("x").build(), None)
            .unwrap();
        assert!(RendererTool::new("x", plain).is_err());
    }

    #[tokio::test]
    async fn arguments_become_the_context() {
        let tool = RendererTool::new("greet", greeter()).unwrap();
        assert_eq!(tool.description(), "Greets someone by name");
        assert_eq!(tool.parameters()["required"], json!(["name"]));

        let out = tool.execute(json!({ "name": "Ada" })).await.unwrap();
        assert_eq!(out, "Hello Ada");

        let err = tool.execute(json!({ "nom": "Ada" })).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn text_renderers_take_a_prompt_argument() {
        let model = Arc::new(ScriptedModel::new("m").reply_text("42"));
        let config = Config::builder()
            .model(model.clone())
            .input_schema(schema(json!({
                "type": "object",
                "properties": { "prompt": { "type": "string" } },
                "required": ["prompt"]
            })))
            .build();
        let renderer = RendererSpec::text_generator().as_tool().build(config, None).unwrap();
        let tool = RendererTool::new("oracle", renderer).unwrap();

        let out = tool.execute(json!({ "prompt": "meaning of life?" })).await.unwrap();
        assert_eq!(out, "42");
        assert_eq!(model.last_request().unwrap().messages[0].content, "meaning of life?");
    }

    #[tokio::test]
    async fn renderer_tools_serve_a_tool_loop() {
        let model = Arc::new(
            ScriptedModel::new("m")
                .reply_tool_calls(vec![ToolCall {
                    id: "call_1".into(),
                    name: "greet".into(),
                    arguments: json!({ "name": "Grace" }),
                }])
                .reply_text("The greeting is 'Hello Grace'."),
        );
        let tools = ToolRegistry::new().with(RendererTool::new("greet", greeter()).unwrap());
        let config = Config::builder().model(model.clone()).tools(tools).max_steps(2).build();
        let agent = RendererSpec::text_generator().build(config, None).unwrap();

        let result = agent.call("Greet Grace").await.unwrap().into_text().unwrap();
        assert!(result.tool_results.is_empty());
        assert_eq!(result.text, "The greeting is 'Hello Grace'.");
        assert_eq!(model.requests()[1].messages.last().unwrap().content, "Hello Grace");
    }
}
