//! End-to-end behaviour of renderers built through the facade.

use std::fs;
use std::sync::Arc;

use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use weave::prelude::*;
use weave::{merge, JsonSchema, MemoryLoader, ModelRegistry, RendererType, Schema, StreamChunk};

fn ctx(value: Value) -> Context {
    value.as_object().cloned().unwrap_or_default()
}

fn name_schema() -> Arc<dyn Schema> {
    Arc::new(
        JsonSchema::new(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        }))
        .unwrap(),
    )
}

#[tokio::test]
async fn hello_world_round_trip() {
    let greeting = create::template(
        Config::builder()
            .template("Hello {{ name }}")
            .input_schema(name_schema())
            .build(),
        None,
    )
    .unwrap();

    let out = greeting.call(ctx(json!({ "name": "World" }))).await.unwrap();
    assert_eq!(out.into_rendered().as_deref(), Some("Hello World"));

    let err = greeting.call(ctx(json!({ "nom": "World" }))).await.unwrap_err();
    assert!(matches!(err, RenderError::InputValidation(_)));
}

#[tokio::test]
async fn conversation_order_is_config_call_prompt() {
    let model = Arc::new(ScriptedModel::new("m").reply_text("one").reply_text("two"));
    let parent = create::config(
        Config::builder().model(model.clone()).message(Message::system("S")).build(),
        None,
    );

    let plain = create::text_generator(Config::default(), Some(&parent)).unwrap();
    plain.call(("P", vec![Message::user("U1")])).await.unwrap();
    assert_eq!(
        model.last_request().unwrap().messages,
        vec![Message::system("S"), Message::user("U1"), Message::user("P")]
    );

    let rendered = RendererSpec::text_generator()
        .with_template()
        .build(Config::builder().prompt("{{ word }}").build(), Some(&parent))
        .unwrap();
    rendered
        .call((vec![Message::user("U1")], ctx(json!({ "word": "rendered" }))))
        .await
        .unwrap();
    assert_eq!(
        model.last_request().unwrap().messages,
        vec![Message::system("S"), Message::user("U1"), Message::user("rendered")]
    );
}

#[tokio::test]
async fn history_carries_caller_messages() {
    let model = Arc::new(ScriptedModel::new("m").reply_text("Paris"));
    let ask = create::text_generator(Config::builder().model(model).build(), None).unwrap();

    let earlier = vec![Message::user("Let's talk geography."), Message::assistant("Sure.")];
    let result = ask
        .call(("Capital of France?", earlier.clone()))
        .await
        .unwrap()
        .into_text()
        .unwrap();

    let mut expected = earlier;
    expected.push(Message::user("Capital of France?"));
    expected.push(Message::assistant("Paris"));
    assert_eq!(result.response.message_history(), &expected[..]);
    assert_eq!(result.response.messages(), &expected[2..]);
}

#[tokio::test]
async fn streamers_hand_back_history_once_drained() {
    let model = Arc::new(ScriptedModel::new("m").reply_stream(vec![
        StreamChunk::Content("Par".into()),
        StreamChunk::Content("is".into()),
    ]));
    let ask = create::text_streamer(Config::builder().model(model).build(), None).unwrap();

    let result = ask
        .call(("Capital of France?", vec![Message::user("Quiz time.")]))
        .await
        .unwrap()
        .into_text_stream()
        .unwrap();
    let text: Vec<_> = result.text_stream.map(|d| d.unwrap()).collect().await;
    assert_eq!(text.concat(), "Paris");

    let response = result.response.wait().await.unwrap();
    assert_eq!(
        response.message_history(),
        &[
            Message::user("Quiz time."),
            Message::user("Capital of France?"),
            Message::assistant("Paris"),
        ]
    );
}

#[test]
fn merging_a_config_with_itself_doubles_messages() {
    let config = Config::builder()
        .message(Message::system("a"))
        .message(Message::user("b"))
        .var("k", 1)
        .build();

    let merged = merge(&config, &config);
    assert_eq!(merged.messages.unwrap().len(), 4);
    assert_eq!(merged.context, config.context);
}

#[test]
fn shape_errors_surface_at_build_time() {
    let model = Arc::new(ScriptedModel::new("m"));

    let err = create::object_generator(
        Config::builder().model(model.clone()).output(OutputKind::Array).build(),
        None,
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "An 'output' of 'array' requires a 'schema' property.");

    let err = create::function(
        Config::builder()
            .model(model)
            .execute(|_| async { Ok(Value::Null) })
            .build(),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::ForbiddenField { field: "model", .. }));
}

#[tokio::test]
async fn presets_build_the_renderer_they_describe() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("greeting.json"),
        r#"{
            "template": "greet",
            "loader": [{ "type": "memory", "sources": { "greet": "Hi {{ name }}!" } }]
        }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("classifier.json"),
        r#"{ "model": "m", "output": "enum", "enum": ["spam", "ham"] }"#,
    )
    .unwrap();

    let presets = PresetRegistry::load_from_dir(dir.path()).unwrap();
    assert_eq!(presets.ids(), vec!["classifier", "greeting"]);

    let model = Arc::new(ScriptedModel::new("m").reply_text(r#"{"result": "ham"}"#));
    let models = ModelRegistry::new().with(model);

    let classifier = create::from_config(presets.config("classifier", &models).unwrap()).unwrap();
    assert_eq!(classifier.kind(), ConfigKind::Object);
    let out = classifier.call("Lunch at noon?").await.unwrap().into_object().unwrap();
    assert_eq!(out.object, json!("ham"));

    let greeting = create::loads_template(presets.config("greeting", &models).unwrap(), None).unwrap();
    let out = greeting.call(ctx(json!({ "name": "Ada" }))).await.unwrap();
    assert_eq!(out.into_rendered().as_deref(), Some("Hi Ada!"));
}

#[tokio::test]
async fn rebuilt_configs_keep_their_dispatch() {
    let loader = Arc::new(MemoryLoader::new().with("greet", "Hello {{ name }}"));
    let named = create::loads_template(
        Config::builder().loader(loader).template("greet").build(),
        None,
    )
    .unwrap();

    let rebuilt = create::from_config(named.config().clone()).unwrap();
    assert_eq!(rebuilt.prompt_type(), named.prompt_type());
    assert_eq!(rebuilt.renderer_type(), RendererType::Template);

    let out = rebuilt.call(ctx(json!({ "name": "again" }))).await.unwrap();
    assert_eq!(out.into_rendered().as_deref(), Some("Hello again"));
}

#[tokio::test]
async fn tools_built_from_renderers_join_a_registry() {
    let shout = create::tool(
        "shout",
        RendererSpec::template(),
        Config::builder()
            .template("{{ name | upper }}!")
            .input_schema(name_schema())
            .description("Shouts a name")
            .build(),
        None,
    )
    .unwrap();

    let tools = ToolRegistry::new().with(shout);
    let out = tools
        .get("shout")
        .unwrap()
        .execute(json!({ "name": "ada" }))
        .await
        .unwrap();
    assert_eq!(out, "ADA!");
}
