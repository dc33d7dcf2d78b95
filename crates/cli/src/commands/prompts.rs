//! Prompts command handler.

use askflow_core::{config::AppConfig, AppResult};
use askflow_prompt::{list_prompts, resolve_prompt};
use clap::Args;

/// List available prompt definitions
#[derive(Args, Debug)]
pub struct PromptsCommand {
    /// Show each prompt's title and output format
    #[arg(short, long)]
    pub detailed: bool,
}

impl PromptsCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let overrides_dir = config.askflow_dir().join("prompts");

        for id in list_prompts(&config.workspace)? {
            let overridden = overrides_dir.join(format!("{}.yml", id)).exists();
            let marker = if overridden { " (workspace)" } else { "" };

            if self.detailed {
                let def = resolve_prompt(Some(&config.workspace), &id)?;
                println!("{}{}: {} [{}]", id, marker, def.title, def.output.format);
            } else {
                println!("{}{}", id, marker);
            }
        }

        Ok(())
    }
}
