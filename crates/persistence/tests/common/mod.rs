//! Test infrastructure for the persistence layer.
//!
//! Scenarios are written once against [`TestContext`] and run over both
//! transports with [`transport_test!`]: directly against SQLite, and through
//! remote providers talking to an HTTP proxy in front of SQLite.

#![allow(dead_code)]

pub mod assertions;
pub mod fixtures;
pub mod harness;
pub mod proxy;

// Re-export commonly used items
pub use assertions::*;
pub use fixtures::*;
pub use harness::*;
