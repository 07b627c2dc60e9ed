use crate::types::wire::wire_enum;

wire_enum! {
    /// Lifecycle state of an entity, persisted as its ordinal.
    pub enum ResourceState as ordinal {
        /// Soft-deleted; hidden from default queries.
        Deleted = 0 => "deleted",
        Draft = 1 => "draft",
        /// Awaiting approval.
        Request = 2 => "request",
        Normal = 3 => "normal",
    }
}

impl Default for ResourceState {
    fn default() -> Self {
        ResourceState::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persisted_as_ordinal() {
        assert_eq!(serde_json::to_string(&ResourceState::Request).unwrap(), "2");
        let state: ResourceState = serde_json::from_str("0").unwrap();
        assert_eq!(state, ResourceState::Deleted);
    }

    #[test]
    fn test_unknown_ordinal_fails() {
        assert!(serde_json::from_str::<ResourceState>("9").is_err());
        assert!(serde_json::from_str::<ResourceState>("\"archived\"").is_err());
    }

    #[test]
    fn test_default_is_normal() {
        assert_eq!(ResourceState::default(), ResourceState::Normal);
    }
}
