//! Change results and the error-kind taxonomy.
//!
//! Every mutation returns a [`ChangingResultInfo`] instead of failing: the
//! [`ChangeMethod`] says what happened and, for rejected mutations, the
//! [`ErrorKind`] says why. Callers that prefer `?` can turn a rejected result
//! back into a [`StorageError`](crate::error::StorageError) with
//! [`ChangingResultInfo::check`].

mod change;
mod kind;

pub use change::{ChangingResultInfo, Fidelity};
pub use kind::{ChangeMethod, ErrorKind};
