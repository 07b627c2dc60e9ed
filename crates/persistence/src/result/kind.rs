//! Change methods and error kinds.

use crate::types::wire::wire_enum;

wire_enum! {
    /// What a mutation did to the store.
    pub enum ChangeMethod as name {
        /// The outcome could not be determined.
        Unknown = 0 => "unknown",
        /// A new entity was created.
        Add = 1 => "add",
        /// An existing entity was updated.
        Update = 2 => "update",
        /// The membership of a relationship entity was edited.
        MemberModify = 3 => "member-modify",
        /// The entity was transitioned to the deleted state.
        Remove = 4 => "remove",
        /// Nothing needed to be written.
        Unchanged = 5 => "unchanged",
        /// The mutation was rejected.
        Invalid = 6 => "invalid",
    }
}

impl ChangeMethod {
    /// Returns `true` for every method that reports a completed mutation.
    pub fn is_successful(self) -> bool {
        matches!(
            self,
            ChangeMethod::Add
                | ChangeMethod::Update
                | ChangeMethod::MemberModify
                | ChangeMethod::Remove
                | ChangeMethod::Unchanged
        )
    }
}

impl Default for ChangeMethod {
    fn default() -> Self {
        ChangeMethod::Unknown
    }
}

wire_enum! {
    /// Classification of a failed mutation.
    pub enum ErrorKind as name {
        None = 0 => "none",
        Argument = 1 => "argument",
        Unauthorized = 2 => "unauthorized",
        Forbidden = 3 => "forbidden",
        NotFound = 4 => "not-found",
        Key = 5 => "key",
        Validation = 6 => "validation",
        Unsupported = 7 => "unsupported",
        Provider = 8 => "provider",
        Conflict = 9 => "conflict",
        Busy = 10 => "busy",
        Canceled = 11 => "canceled",
        Timeout = 12 => "timeout",
        Service = 13 => "service",
        Application = 14 => "application",
    }
}

impl ErrorKind {
    /// Kinds a caller may reasonably retry.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            ErrorKind::Busy | ErrorKind::Timeout | ErrorKind::Canceled
        )
    }

    /// Kinds that no retry of the same request will fix.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ErrorKind::NotFound
                | ErrorKind::Argument
                | ErrorKind::Validation
                | ErrorKind::Key
                | ErrorKind::Unsupported
        )
    }
}

impl Default for ErrorKind {
    fn default() -> Self {
        ErrorKind::None
    }
}
