use std::sync::Arc;

use rstest::rstest;
use serde_json::json;
use weave_core::{Message, ToolResult};
use weave_llm::ScriptedModel;

use super::*;
use crate::kind::{ObjectMode, PromptType};
use crate::loader::MemoryLoader;
use crate::schema::JsonSchema;

fn object_schema() -> Arc<JsonSchema> {
    Arc::new(
        JsonSchema::new(json!({
            "type": "object",
            "properties": { "name": { "type": "string" } },
            "required": ["name"]
        }))
        .unwrap(),
    )
}

/// The smallest configuration of `kind` that passes validation in `mode`.
fn minimal(kind: ConfigKind, mode: Mode) -> Config {
    let mut config = match kind {
        ConfigKind::Text => Config::builder().model(Arc::new(ScriptedModel::new("m"))).build(),
        ConfigKind::Object => Config::builder()
            .model(Arc::new(ScriptedModel::new("m")))
            .schema(object_schema())
            .build(),
        ConfigKind::Template => Config::builder().template("Hello {{ name }}").build(),
        ConfigKind::Script => Config::builder().script("name").build(),
        ConfigKind::Function => Config::builder()
            .execute(|_ctx| async { Ok(serde_json::Value::Null) })
            .build(),
    };
    if mode.loaded_by_name {
        config.loader = Some(vec![Arc::new(MemoryLoader::new())]);
    }
    if mode.is_tool {
        config.input_schema = Some(object_schema());
    }
    config
}

fn required(kind: ConfigKind, mode: Mode) -> Vec<&'static str> {
    let mut fields = match kind {
        ConfigKind::Text => vec!["model"],
        ConfigKind::Object => vec!["model", "schema"],
        ConfigKind::Template if !mode.loaded_by_name => vec!["template"],
        ConfigKind::Script if !mode.loaded_by_name => vec!["script"],
        ConfigKind::Function => vec!["execute"],
        ConfigKind::Template | ConfigKind::Script => vec![],
    };
    if mode.loaded_by_name {
        fields.push("loader");
    }
    if mode.is_tool {
        fields.push("input_schema");
    }
    fields
}

fn without(mut config: Config, field: &str) -> Config {
    match field {
        "model" => config.model = None,
        "schema" => config.schema = None,
        "template" => config.template = None,
        "script" => config.script = None,
        "execute" => config.execute = None,
        "loader" => config.loader = None,
        "input_schema" => config.input_schema = None,
        other => panic!("no removal for {other}"),
    }
    config
}

fn with(mut config: Config, field: &str) -> Config {
    match field {
        "model" => config.model = Some(Arc::new(ScriptedModel::new("extra"))),
        "execute" => {
            config = crate::merge(
                &config,
                &Config::builder().execute(|_ctx| async { Ok(serde_json::Value::Null) }).build(),
            )
        }
        "template" => config.template = Some("extra".into()),
        "script" => config.script = Some("extra".into()),
        "prompt" => config.prompt = Some("extra".into()),
        "schema" => config.schema = Some(object_schema()),
        "enum" => config.enum_values = Some(vec!["a".into()]),
        "output" => config.output = Some(OutputKind::NoSchema),
        "mode" => config.mode = Some(ObjectMode::Json),
        "loader" => config.loader = Some(vec![Arc::new(MemoryLoader::new())]),
        other => panic!("no addition for {other}"),
    }
    config
}

const KINDS: [ConfigKind; 5] = [
    ConfigKind::Text,
    ConfigKind::Object,
    ConfigKind::Template,
    ConfigKind::Script,
    ConfigKind::Function,
];

fn modes(kind: ConfigKind) -> Vec<Mode> {
    let mut modes = vec![
        Mode::generator(),
        Mode::streamer(),
        Mode::generator().as_tool(),
        Mode::streamer().as_tool(),
    ];
    if kind != ConfigKind::Function {
        modes.extend([Mode::generator().by_name(), Mode::generator().by_name().as_tool()]);
    }
    modes
}

#[rstest]
fn minimal_configs_are_valid(
    #[values(
        ConfigKind::Text,
        ConfigKind::Object,
        ConfigKind::Template,
        ConfigKind::Script,
        ConfigKind::Function
    )]
    kind: ConfigKind,
) {
    for mode in modes(kind) {
        let result = validate(&minimal(kind, mode), kind, mode);
        assert!(result.is_ok(), "{kind} {mode:?}: {result:?}");
    }
}

#[test]
fn removing_any_required_field_fails() {
    for kind in KINDS {
        for mode in modes(kind) {
            for field in required(kind, mode) {
                let config = without(minimal(kind, mode), field);
                let result = validate(&config, kind, mode);
                assert!(result.is_err(), "{kind} {mode:?} without '{field}' passed");
            }
        }
    }
}

#[test]
fn adding_any_forbidden_field_fails() {
    for kind in KINDS {
        for mode in modes(kind) {
            for &field in forbidden_fields(kind) {
                let config = with(minimal(kind, mode), field);
                let result = validate(&config, kind, mode);
                assert!(result.is_err(), "{kind} {mode:?} with '{field}' passed");
            }
        }
    }
}

#[rstest]
#[case(OutputKind::Object)]
#[case(OutputKind::Array)]
fn object_and_array_output_need_a_schema(#[case] output: OutputKind) {
    let config = Config::builder()
        .model(Arc::new(ScriptedModel::new("m")))
        .output(output)
        .build();
    let err = validate(&config, ConfigKind::Object, Mode::generator()).unwrap_err();
    assert_eq!(
        err.to_string(),
        format!("An 'output' of '{}' requires a 'schema' property.", output)
    );
}

#[test]
fn object_output_defaults_to_object() {
    let mut implicit = Config::builder().model(Arc::new(ScriptedModel::new("m"))).build();
    apply_defaults(&mut implicit, ConfigKind::Object);
    assert_eq!(implicit.output, Some(OutputKind::Object));

    let explicit = Config::builder()
        .model(Arc::new(ScriptedModel::new("m")))
        .output(OutputKind::Object)
        .build();
    let implicit_err = validate(&implicit, ConfigKind::Object, Mode::generator()).unwrap_err();
    let explicit_err = validate(&explicit, ConfigKind::Object, Mode::generator()).unwrap_err();
    assert_eq!(implicit_err.to_string(), explicit_err.to_string());
}

#[test]
fn enum_output_needs_values_and_cannot_stream() {
    let base = Config::builder()
        .model(Arc::new(ScriptedModel::new("m")))
        .output(OutputKind::Enum);

    let empty = base.enum_values(Vec::<String>::new()).build();
    assert!(validate(&empty, ConfigKind::Object, Mode::generator()).is_err());

    let mut valid = empty.clone();
    valid.enum_values = Some(vec!["yes".into(), "no".into()]);
    assert!(validate(&valid, ConfigKind::Object, Mode::generator()).is_ok());
    assert!(validate(&valid, ConfigKind::Object, Mode::streamer()).is_err());
}

#[test]
fn no_schema_output_needs_nothing() {
    let config = Config::builder()
        .model(Arc::new(ScriptedModel::new("m")))
        .output(OutputKind::NoSchema)
        .build();
    assert!(validate(&config, ConfigKind::Object, Mode::generator()).is_ok());
}

#[test]
fn template_and_script_are_mutually_exclusive() {
    let config = Config::builder().template("a").script("b").build();
    for kind in [ConfigKind::Template, ConfigKind::Script] {
        assert!(matches!(
            validate(&config, kind, Mode::generator()),
            Err(ConfigError::MutuallyExclusive { .. })
        ));
    }
}

#[test]
fn malformed_messages_are_reported_by_index() {
    let mut orphan = Message::tool_result(ToolResult {
        tool_call_id: "call_1".into(),
        content: "42".into(),
    });
    orphan.tool_call_id = None;
    let config = Config::builder()
        .model(Arc::new(ScriptedModel::new("m")))
        .messages(vec![Message::system("ok"), Message::user(""), orphan])
        .build();
    let err = validate(&config, ConfigKind::Text, Mode::generator()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidMessage { index: 2, .. }));
}

#[test]
fn template_input_schema_must_describe_an_object() {
    let config = Config::builder()
        .template("Hi")
        .input_schema(Arc::new(JsonSchema::new(json!({ "type": "string" })).unwrap()))
        .build();
    assert!(validate(&config, ConfigKind::Template, Mode::generator()).is_err());
}

#[rstest]
#[case(ConfigKind::Text, PromptType::TEMPLATE)]
#[case(ConfigKind::Text, PromptType::SCRIPT)]
#[case(ConfigKind::Object, PromptType::TEMPLATE)]
fn rendered_prompt_input_schema_must_describe_an_object(#[case] kind: ConfigKind, #[case] prompt_type: PromptType) {
    let mut config = minimal(kind, Mode::generator());
    config.prompt = Some("Hello {{ name }}".into());
    config.prompt_type = Some(prompt_type);
    config.input_schema = Some(Arc::new(JsonSchema::new(json!({ "type": "string" })).unwrap()));
    let err = validate(&config, kind, Mode::generator()).unwrap_err();
    assert_eq!(err.to_string(), "An 'input_schema' must describe an object.");

    config.input_schema = Some(object_schema());
    assert!(validate(&config, kind, Mode::generator()).is_ok());
}

#[test]
fn text_prompts_leave_input_schema_unchecked() {
    let mut config = minimal(ConfigKind::Text, Mode::generator());
    config.input_schema = Some(Arc::new(JsonSchema::new(json!({ "type": "string" })).unwrap()));
    assert!(validate(&config, ConfigKind::Text, Mode::generator()).is_ok());
}

#[test]
fn object_streamers_reject_tool_mode() {
    let mut config = minimal(ConfigKind::Object, Mode::streamer());
    config.mode = Some(ObjectMode::Tool);
    let err = validate(&config, ConfigKind::Object, Mode::streamer()).unwrap_err();
    assert_eq!(err.to_string(), "A 'mode' of 'tool' cannot be used when streaming.");

    assert!(validate(&config, ConfigKind::Object, Mode::generator()).is_ok());
    config.mode = Some(ObjectMode::Json);
    assert!(validate(&config, ConfigKind::Object, Mode::streamer()).is_ok());
}

#[test]
fn rendered_llm_prompts_need_a_source() {
    let mut config = Config::builder().model(Arc::new(ScriptedModel::new("m"))).build();
    config.prompt_type = Some(PromptType::TEMPLATE);
    let err = validate(&config, ConfigKind::Text, Mode::generator()).unwrap_err();
    assert!(matches!(err, ConfigError::MissingField { field: "prompt", .. }));

    config.prompt = Some("Hello {{ name }}".into());
    assert!(validate(&config, ConfigKind::Text, Mode::generator()).is_ok());
}

#[test]
fn prompt_type_must_match_the_prompt() {
    let mut config = Config::builder()
        .model(Arc::new(ScriptedModel::new("m")))
        .prompt(vec![Message::user("hi")])
        .build();
    config.prompt_type = Some(PromptType::TEMPLATE);
    assert!(validate(&config, ConfigKind::Text, Mode::generator()).is_err());

    let mut function = Config::builder()
        .model(Arc::new(ScriptedModel::new("m")))
        .prompt_fn(|_ctx| async { Ok(crate::PromptValue::Text("hi".into())) })
        .build();
    assert!(validate(&function, ConfigKind::Text, Mode::generator()).is_err());
    function.prompt_type = Some(PromptType::FUNCTION);
    assert!(validate(&function, ConfigKind::Text, Mode::generator()).is_ok());
}

#[test]
fn template_kind_rejects_script_prompt_types() {
    let mut config = Config::builder().template("Hi").build();
    config.prompt_type = Some(PromptType::SCRIPT);
    assert!(matches!(
        validate(&config, ConfigKind::Template, Mode::generator()),
        Err(ConfigError::InvalidPromptType(_))
    ));
}
