//! Common test utilities for modelgraph scenario and property tests.
//!
//! This module provides:
//! - A small element hierarchy (components, binaries and their
//!   subtypes) shared by every scenario
//! - Builders for a root node carrying a name-keyed binary collection

pub mod fixtures;

pub use fixtures::*;
