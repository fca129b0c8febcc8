//! Command-line demo of weave renderers.
//!
//! Loads the presets next to this crate, builds a templated explainer, a
//! follow-up streamer and a sentiment classifier over them, and prints what
//! each returns. Set `OPENAI_API_KEY` (or `WEAVE_API_BASE` for an
//! OpenAI-compatible server such as Ollama) to call a real model; otherwise
//! a scripted model answers.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use futures::StreamExt;
use serde_json::json;
use tracing::info;
use weave::prelude::*;
use weave::{ModelRegistry, StreamChunk};

fn scripted_model() -> Arc<dyn LanguageModel> {
    Arc::new(
        ScriptedModel::new("scripted")
            .reply_text("Tides are the ocean being tugged by the Moon's gravity, twice a day.")
            .reply_stream(vec![
                StreamChunk::Content("Because harbours, ".into()),
                StreamChunk::Content("fishing and coastlines all run on them.".into()),
            ])
            .reply_text(r#"{"result": "positive"}"#),
    )
}

fn select_model() -> Arc<dyn LanguageModel> {
    let model_name = std::env::var("WEAVE_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    match std::env::var("WEAVE_API_BASE") {
        Ok(base) => Arc::new(OpenAiModel::new(&model_name, Some(base.as_str()))),
        Err(_) if std::env::var("OPENAI_API_KEY").is_ok() => Arc::new(OpenAiModel::new(&model_name, None)),
        Err(_) => scripted_model(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .compact()
        .init();

    let model = select_model();
    info!(model = model.model_id(), "Using model");

    let mut models = ModelRegistry::new();
    models.insert("default", model.clone());

    let presets_dir = std::env::var("WEAVE_PRESETS")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("presets"));
    let presets = PresetRegistry::load_from_dir(&presets_dir)?;
    info!(presets = ?presets.ids(), "Loaded presets");

    let house = presets.config("house-style", &models)?;
    let base = create::config(Config::builder().model(model).build(), Some(&house));

    let explain = RendererSpec::text_generator().with_template().build(
        Config::builder()
            .prompt("Explain {{ topic }} to {{ audience }}.")
            .build(),
        Some(&base),
    )?;
    let mut topic = Context::new();
    topic.insert("topic".into(), json!("tides"));

    let answer = explain
        .call(topic)
        .await?
        .into_text()
        .context("an explainer returns text")?;
    println!("{}\n", answer.text);

    let follow_up = create::text_streamer(Config::default(), Some(&base))?;
    let history = answer.response.message_history().to_vec();
    let mut stream = follow_up
        .call(("And why does it matter?", history))
        .await?
        .into_text_stream()
        .context("a streamer returns a stream")?;

    let mut stdout = std::io::stdout();
    while let Some(delta) = stream.text_stream.next().await {
        print!("{}", delta?);
        stdout.flush()?;
    }
    println!("\n");

    let conversation = stream.response.wait().await?;
    info!(messages = conversation.message_history().len(), usage = ?conversation.usage(), "Conversation so far");

    let sentiment = create::from_config(presets.config("sentiment", &models)?)?;
    let verdict = sentiment
        .call("I finally understand tides!")
        .await?
        .into_object()
        .context("a classifier returns an object")?;
    println!("sentiment: {}", verdict.object);

    Ok(())
}
