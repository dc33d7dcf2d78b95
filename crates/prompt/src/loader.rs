//! Prompt loader for built-in and workspace YAML prompt definitions.
//!
//! Built-in prompts ship inside the binary. A workspace can override any of
//! them by placing `<id>.yml` in `.askflow/prompts/`.

use crate::types::PromptDefinition;
use crate::{ANALYZE_PROMPT_ID, EVALUATE_PROMPT_ID, GENERATE_PROMPT_ID};
use askflow_core::{AppError, AppResult};
use std::path::Path;

const PROMPTS_DIR: &str = ".askflow/prompts";

const BUILTIN_PROMPTS: &[(&str, &str)] = &[
    (
        ANALYZE_PROMPT_ID,
        include_str!("../prompts/workflow.analyze.yml"),
    ),
    (
        GENERATE_PROMPT_ID,
        include_str!("../prompts/workflow.generate.yml"),
    ),
    (
        EVALUATE_PROMPT_ID,
        include_str!("../prompts/workflow.evaluate.yml"),
    ),
];

/// Load a prompt definition by ID from the workspace.
///
/// This function searches for a prompt file named `<id>.yml` in the
/// `.askflow/prompts/` directory.
///
/// # Arguments
/// * `workspace_path` - Root workspace directory containing `.askflow/`
/// * `prompt_id` - Prompt identifier (e.g., "workflow.generate")
///
/// # Example
/// ```no_run
/// use askflow_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("."), "workflow.generate")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(workspace_path: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = workspace_path
        .join(PROMPTS_DIR)
        .join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition = parse_prompt(&contents, &prompt_file.display().to_string())?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Parse one of the prompts compiled into the crate.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<PromptDefinition> {
    let (_, contents) = BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .ok_or_else(|| AppError::Prompt(format!("Unknown built-in prompt: {}", prompt_id)))?;

    parse_prompt(contents, prompt_id)
}

/// Resolve a prompt: the workspace override when present, else the built-in.
///
/// A present but invalid override is an error rather than a silent fallback.
pub fn resolve_prompt(workspace_path: Option<&Path>, prompt_id: &str) -> AppResult<PromptDefinition> {
    if let Some(workspace) = workspace_path {
        let override_file = workspace
            .join(PROMPTS_DIR)
            .join(format!("{}.yml", prompt_id));
        if override_file.exists() {
            return load_prompt(workspace, prompt_id);
        }
    }

    builtin_prompt(prompt_id)
}

/// List all available prompt IDs: built-ins plus workspace prompts, sorted
/// and deduplicated.
pub fn list_prompts(workspace_path: &Path) -> AppResult<Vec<String>> {
    let mut prompt_ids: Vec<String> = BUILTIN_PROMPTS
        .iter()
        .map(|(id, _)| id.to_string())
        .collect();

    let prompts_dir = workspace_path.join(PROMPTS_DIR);
    if prompts_dir.exists() {
        for entry in walkdir::WalkDir::new(&prompts_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    prompt_ids.push(stem.to_string());
                }
            }
        }
    }

    prompt_ids.sort();
    prompt_ids.dedup();
    Ok(prompt_ids)
}

fn parse_prompt(contents: &str, origin: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents).map_err(|e| {
        AppError::Prompt(format!("Failed to parse prompt YAML {}: {}", origin, e))
    })?;

    validate_prompt(&definition)?;
    Ok(definition)
}

/// Validate a prompt definition.
fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Simple "x.y" check
    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
