//! Combining a parent configuration with a child configuration.

use weave_tools::ToolRegistry;

use crate::config::Config;

/// Merges `child` over `parent`.
///
/// Every field takes the child's value when set and the parent's otherwise,
/// except:
///
/// - `context` and `filters`: key-wise union when both are set, child wins
/// - `loader`: parent's loaders followed by the child's
/// - `messages`: parent's messages followed by the child's, duplicates kept
/// - `tools`: union when both are set, child wins
///
/// Merging never fails; the result is checked by [`validate`](crate::validate).
pub fn merge(parent: &Config, child: &Config) -> Config {
    let child = child.clone();
    let parent = parent.clone();

    let context = match (parent.context, child.context) {
        (Some(mut base), Some(over)) => {
            base.extend(over);
            Some(base)
        }
        (base, over) => over.or(base),
    };

    let filters = match (parent.filters, child.filters) {
        (Some(mut base), Some(over)) => {
            base.extend(over);
            Some(base)
        }
        (base, over) => over.or(base),
    };

    let loader = match (parent.loader, child.loader) {
        (None, None) => None,
        (base, over) => Some(base.into_iter().chain(over).flatten().collect()),
    };

    let messages = match (parent.messages, child.messages) {
        (Some(mut base), Some(over)) => {
            base.extend(over);
            Some(base)
        }
        (base, over) => over.or(base),
    };

    let tools = match (parent.tools, child.tools) {
        (Some(base), Some(over)) => Some(ToolRegistry::merged(&base, &over)),
        (base, over) => over.or(base),
    };

    Config {
        model: child.model.or(parent.model),
        execute: child.execute.or(parent.execute),
        template: child.template.or(parent.template),
        script: child.script.or(parent.script),
        prompt: child.prompt.or(parent.prompt),
        prompt_type: child.prompt_type.or(parent.prompt_type),
        messages,
        system: child.system.or(parent.system),
        output: child.output.or(parent.output),
        schema: child.schema.or(parent.schema),
        enum_values: child.enum_values.or(parent.enum_values),
        schema_name: child.schema_name.or(parent.schema_name),
        schema_description: child.schema_description.or(parent.schema_description),
        mode: child.mode.or(parent.mode),
        context,
        filters,
        options: child.options.or(parent.options),
        loader,
        input_schema: child.input_schema.or(parent.input_schema),
        tools,
        description: child.description.or(parent.description),
        temperature: child.temperature.or(parent.temperature),
        max_tokens: child.max_tokens.or(parent.max_tokens),
        top_p: child.top_p.or(parent.top_p),
        seed: child.seed.or(parent.seed),
        stop_sequences: child.stop_sequences.or(parent.stop_sequences),
        presence_penalty: child.presence_penalty.or(parent.presence_penalty),
        frequency_penalty: child.frequency_penalty.or(parent.frequency_penalty),
        max_steps: child.max_steps.or(parent.max_steps),
        debug: child.debug.or(parent.debug),
    }
}

impl Config {
    /// Returns this configuration merged over `parent`.
    pub fn merged_with(&self, parent: &Config) -> Config {
        merge(parent, self)
    }
}
