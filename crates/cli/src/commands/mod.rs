//! Command handlers for the askflow CLI.

pub mod ask;
pub mod graph;
pub mod prompts;

pub use ask::AskCommand;
pub use graph::GraphCommand;
pub use prompts::PromptsCommand;
