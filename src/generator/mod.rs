pub mod analyst;
pub mod context;
pub mod graph;
pub mod interview;
pub mod outlet;
pub mod prompts;
pub mod report;
pub mod research;
pub mod state;
pub mod workflow;
