//! Graph command handler.

use askflow_core::{config::AppConfig, AppResult};
use askflow_workflow::WorkflowGraph;
use clap::Args;

/// Print the workflow graph
#[derive(Args, Debug)]
pub struct GraphCommand {
    /// Show the graph with the confidence loop-back enabled
    #[arg(long)]
    pub loop_back: bool,
}

impl GraphCommand {
    pub fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let mut settings = config.workflow.clone();
        settings.loop_back |= self.loop_back;

        let graph = WorkflowGraph::new(&settings);
        println!("entry: {}", graph.entry());
        for line in graph.describe() {
            println!("  {}", line);
        }

        Ok(())
    }
}
