//! Deterministic, pure logic shared by the engine and the steps.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod classifier;
pub mod clarify;
pub mod codec;
pub mod errors;
pub mod types;
