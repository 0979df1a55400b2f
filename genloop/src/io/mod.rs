//! Side-effecting adapters: project stores, chat sessions, operator console,
//! child processes and configuration.

pub mod config;
pub mod console;
pub mod files;
pub mod process;
pub mod prompt;
pub mod review;
pub mod session;
pub mod store;
