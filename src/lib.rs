//! Stagehand - a CLI and library for staged edits of remote development objects
//!
//! Stagehand drives mutable remote development-object resources (classes,
//! tables, views, service bindings, packages) through a versioned-edit
//! backend that enforces exclusive editing locks and an inactive/active
//! staging model: `update` writes an inactive draft, `activate` promotes it
//! to the live version.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Bulk executor: manifest parsing, dependency-ordered apply
//! - [`lifecycle`] - Per-object state machine, lock manager, session scoping
//! - [`backend`] - Abstraction over the remote versioned-edit backend
//! - [`core`] - Domain types, dependency graph, configuration
//! - [`ui`] - User output utilities
//!
//! # Correctness Invariants
//!
//! Stagehand maintains the following invariants:
//!
//! 1. A lock token exists if and only if its controller is between a
//!    successful `lock()` and the next successful `unlock()`/`force_unlock()`
//! 2. All backend mutations flow through one lifecycle controller per object
//! 3. The stateful session mode is reverted on every exit path
//! 4. Bulk execution applies objects strictly in dependency order; the
//!    applied prefix is always self-consistent

pub mod backend;
pub mod cli;
pub mod core;
pub mod engine;
pub mod lifecycle;
pub mod ui;
