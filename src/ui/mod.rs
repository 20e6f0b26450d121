//! ui
//!
//! Terminal output utilities.
//!
//! All terminal output goes through [`output`] so formatting and
//! quiet-mode handling stay consistent.

pub mod output;
