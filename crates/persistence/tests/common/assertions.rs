//! Assertion helpers for change results and pages.

use tessera_persistence::entity::Resource;
use tessera_persistence::result::{ChangeMethod, ChangingResultInfo, ErrorKind};
use tessera_persistence::types::Page;

/// Asserts that a result succeeded with the given method.
pub fn assert_method(result: &ChangingResultInfo, expected: ChangeMethod) {
    assert_eq!(
        result.method(),
        expected,
        "Change method mismatch: expected {}, got {:?}",
        expected,
        result
    );
}

/// Asserts that a result failed with the given kind.
pub fn assert_failed(result: &ChangingResultInfo, expected: ErrorKind) {
    assert!(
        !result.is_successful(),
        "Expected a {} failure, got {:?}",
        expected,
        result
    );
    assert_eq!(
        result.error_kind(),
        expected,
        "Error kind mismatch: expected {}, got {:?}",
        expected,
        result
    );
}

/// Ids of a page's items in order.
pub fn page_ids<E: Resource>(page: &Page<E>) -> Vec<String> {
    page.items
        .iter()
        .map(|item| item.entity().id().to_string())
        .collect()
}

/// Assertion macro for checking pages.
#[macro_export]
macro_rules! assert_page {
    ($page:expr, ids: [$($id:expr),* $(,)?]) => {
        assert_eq!(
            $crate::common::assertions::page_ids(&$page),
            vec![$($id.to_string()),*] as Vec<String>,
        );
    };
    ($page:expr, count: $count:expr) => {
        assert_eq!($page.len(), $count, "Page size mismatch");
    };
}
