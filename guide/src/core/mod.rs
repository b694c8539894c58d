//! Deterministic, pure logic shared by the agent.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod bucket;
pub mod grounding;
pub mod payload;
pub mod plan;
pub mod snapshot;
pub mod step;
pub mod tools;
pub mod validator;
