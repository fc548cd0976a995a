pub mod config;
pub mod continuation;
pub mod errors;
pub mod git;
pub mod hook;
pub mod orchestrator;
pub mod prompt;
pub mod report;
pub mod runner;
pub mod session;
pub mod ui;
