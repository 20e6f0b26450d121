//! Per-object lifecycle orchestration.
//!
//! [`controller`] drives one object through the edit cycle, [`locks`]
//! wraps lock acquisition and release, [`session`] scopes the stateful
//! backend mode to the lock's lifetime, and [`strategy`] maps lifecycle
//! steps to wire requests per object kind.

pub mod controller;
pub mod locks;
pub mod session;
pub mod strategy;

pub use controller::{LifecycleError, ObjectLifecycleController};
pub use locks::{LockAcquireError, LockManager, LockReleaseError};
pub use session::StatefulScope;
pub use strategy::{strategy_for, ObjectStrategy, StepContext};
