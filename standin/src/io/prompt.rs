//! Prompt construction for text-generation backends.

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use tracing::debug;

use crate::core::hints::{format_field_instructions, walk};
use crate::core::types::{RequestContext, ResponseSchema};

const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");

/// Renders the generation prompt for one intercepted request.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("generate", GENERATE_TEMPLATE)
            .expect("generate template should be valid");
        Self { env }
    }

    /// Build the prompt describing `request` and the response `schema`.
    pub fn build(&self, request: &RequestContext, schema: &ResponseSchema) -> Result<String> {
        let request_context =
            serde_json::to_string_pretty(request).context("serialize request context")?;
        let expected_output =
            serde_json::to_string_pretty(&schema.sample).context("serialize schema")?;
        let fields = walk(&schema.sample, &schema.hints);
        debug!(fields = fields.len(), "collected field hints");

        let template = self.env.get_template("generate")?;
        let rendered = template.render(context! {
            request_context => request_context,
            expected_output => expected_output,
            field_instructions => format_field_instructions(&fields).trim_end(),
        })?;
        Ok(rendered)
    }
}
