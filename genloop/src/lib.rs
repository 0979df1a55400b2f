//! Conversational code generation driven by named workflows.
//!
//! A workflow is an ordered list of steps. Each step talks to a chat session,
//! reads and writes artifacts in the project's stores, and returns the
//! conversation it produced, which is persisted under the step's name so later
//! steps can resume it.
//!
//! - **[`core`]**: Pure, deterministic logic (the chat-to-files codec, menu
//!   classification, clarification rules, conversation types). No I/O.
//! - **[`io`]**: Side-effecting adapters (stores, sessions, console, processes,
//!   config, prompts).
//!
//! Orchestration modules ([`engine`], [`catalog`], [`steps`], [`choice_loop`])
//! combine the two to implement CLI commands.

pub mod catalog;
pub mod choice_loop;
pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod steps;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
