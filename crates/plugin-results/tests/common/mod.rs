//! Shared test utilities for plugin-results integration tests.
//!
//! `TestHarness` gives each test an isolated in-memory database and a
//! temporary artifact output root.

#![allow(dead_code)]

pub mod harness;

pub use harness::TestHarness;
