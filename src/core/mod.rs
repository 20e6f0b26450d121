//! core
//!
//! Domain types, dependency scheduling, and configuration.
//!
//! # Submodules
//!
//! - [`types`] - Strong types for object identity and lifecycle bookkeeping
//! - [`graph`] - Dependency-aware topological scheduler
//! - [`config`] - Backend connection profiles

pub mod config;
pub mod graph;
pub mod types;
