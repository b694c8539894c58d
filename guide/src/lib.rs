//! Orchestration engine for an autonomous web-page guide agent.
//!
//! Given a natural-language goal, the agent inspects the page's interactive
//! elements, asks a generative model for the next few actions, executes them
//! on an execution surface, and resumes when the page changes or the user
//! intervenes. The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (plan validation, grounding,
//!   bucket windows, payload normalization, tool catalogue). No I/O.
//! - **[`io`]**: Collaborator contracts and side-effecting adapters
//!   (configuration, clock, persistence, surface, model, search, prompts).
//!   Isolated behind traits to enable scripted fakes in tests.
//!
//! [`scheduler`] mediates every model request across rate-limited buckets, and
//! [`agent`] composes everything into the resumable planner cycle.

pub mod agent;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
