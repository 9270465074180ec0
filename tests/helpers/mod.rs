//! Shared test helpers for integration tests.
//!
//! Note: `helpers/mod.rs` rather than `helpers.rs`, since Cargo compiles every
//! top-level `.rs` file in `tests/` as its own test binary.

#![allow(dead_code)]

pub mod providers;
pub mod scenario;
