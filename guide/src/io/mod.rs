//! Collaborator contracts and side-effecting adapters.

pub mod clock;
pub mod config;
pub mod memory;
pub mod model;
pub mod prompt;
pub mod search;
pub mod surface;
