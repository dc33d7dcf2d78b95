//! Prompt builder for rendering templates into system/user messages.

use crate::types::{BuiltPrompt, PromptDefinition};
use askflow_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Build a prompt from a definition and input variables.
///
/// Both the optional system template and the user template are rendered
/// with the same variables.
///
/// # Example
/// ```no_run
/// use askflow_prompt::{build_prompt, builtin_prompt};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt("workflow.evaluate")?;
/// let mut vars = HashMap::new();
/// vars.insert("question".to_string(), "What is Rust?".to_string());
/// vars.insert("answer".to_string(), "A language.".to_string());
///
/// let built = build_prompt(&def, &vars)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: &HashMap<String, String>,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let mut handlebars = Handlebars::new();

    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    handlebars
        .register_template_string("user", &definition.template)
        .map_err(|e| AppError::Prompt(format!("Failed to register template: {}", e)))?;

    let system = match &definition.system {
        Some(system_template) => {
            handlebars
                .register_template_string("system", system_template)
                .map_err(|e| {
                    AppError::Prompt(format!("Failed to register system template: {}", e))
                })?;
            Some(render(&handlebars, "system", variables)?.trim_end().to_string())
        }
        None => None,
    };

    let user = render(&handlebars, "user", variables)?.trim_end().to_string();

    Ok(BuiltPrompt::new(system, user, definition, variables))
}

fn render(
    handlebars: &Handlebars<'_>,
    name: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    handlebars
        .render(name, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render template: {}", e)))
}
