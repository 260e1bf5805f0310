pub mod ai;
pub mod cli;
pub mod config;
pub mod context;
pub mod errors;
pub mod jira;
pub mod logging;
pub mod process;
pub mod scaffold;
