//! Query arguments and their in-memory evaluation.

mod args;
mod predication;

pub use args::{QueryArgs, QueryDefaults, QueryOrder};
pub use predication::QueryPredication;
