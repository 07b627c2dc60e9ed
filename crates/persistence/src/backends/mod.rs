//! Provider backends.
//!
//! Each backend is gated behind a feature flag.
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | SQLite | `sqlite` | Embedded store behind [`LocalProvider`](crate::provider::LocalProvider) |
//! | Remote | `remote` | HTTP proxy to a service exposing the same contract |

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "remote")]
pub mod remote;
