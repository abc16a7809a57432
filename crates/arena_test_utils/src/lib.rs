//! # Arena Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Kind tables, maps and worlds ready to play
//! - Scripted agents
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agents;
pub mod determinism;
pub mod fixtures;

/// Re-export proptest for convenience.
pub use proptest;
