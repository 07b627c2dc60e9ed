//! In-memory query evaluation.
//!
//! Every provider that evaluates queries itself runs the same pipeline: name
//! filter, kind predicates, state filter, ordering, then paging. Remote
//! providers forward [`QueryArgs`] instead and the server runs this pipeline.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::args::{QueryArgs, QueryOrder};
use crate::entity::Resource;
use crate::types::Page;

type Predicate<E> = Arc<dyn Fn(&E, &str) -> bool + Send + Sync>;

/// Kind-specific query predicates keyed by the query data key they consume.
///
/// # Examples
///
/// ```
/// use tessera_persistence::entities::Content;
/// use tessera_persistence::entity::Resource;
/// use tessera_persistence::query::{QueryArgs, QueryPredication};
///
/// let predication = QueryPredication::<Content>::new()
///     .with("template", |content, value| content.template() == Some(value));
///
/// let mut page = Content::new("landing");
/// page.set_template(Some("wide".to_string()));
/// let other = Content::new("post");
///
/// let args = QueryArgs::new().with_data("template", "wide");
/// let result = predication.apply(&args, vec![page, other]);
/// assert_eq!(result.total, Some(1));
/// assert_eq!(result.items[0].entity().name(), "landing");
/// ```
pub struct QueryPredication<E> {
    predicates: BTreeMap<String, Predicate<E>>,
}

impl<E> QueryPredication<E> {
    pub fn new() -> Self {
        Self {
            predicates: BTreeMap::new(),
        }
    }

    /// Registers the predicate for `key`, replacing any earlier one.
    pub fn with<F>(mut self, key: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&E, &str) -> bool + Send + Sync + 'static,
    {
        self.predicates.insert(key.into(), Arc::new(predicate));
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.predicates.keys().map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.predicates.contains_key(key)
    }
}

impl<E: Resource> QueryPredication<E> {
    /// Returns `true` when the item passes the name filter, every predicate
    /// named in `args.data`, and the state filter.
    ///
    /// Data keys without a registered predicate are ignored.
    pub fn matches(&self, args: &QueryArgs, item: &E) -> bool {
        let entity = item.entity();

        if let Some(query) = args.name_query.as_deref().filter(|q| !q.is_empty()) {
            let matched = if args.name_exactly {
                entity.name() == query
            } else {
                entity
                    .name()
                    .to_lowercase()
                    .contains(&query.to_lowercase())
            };
            if !matched {
                return false;
            }
        }

        for (key, value) in &args.data {
            if let Some(predicate) = self.predicates.get(key) {
                if !predicate(item, value) {
                    return false;
                }
            }
        }

        entity.state() == args.state
    }

    /// Filters, orders and pages `items`.
    ///
    /// `items` is expected in storage order. The returned page carries the
    /// number of matches before paging.
    pub fn apply(&self, args: &QueryArgs, items: Vec<E>) -> Page<E> {
        let mut matched: Vec<E> = items
            .into_iter()
            .filter(|item| self.matches(args, item))
            .collect();

        match args.order {
            QueryOrder::Default => {}
            QueryOrder::Latest => {
                matched.sort_by_key(|item| Reverse(item.entity().last_modification_time()));
            }
            QueryOrder::Time => {
                matched.sort_by_key(|item| Reverse(item.entity().creation_time()));
            }
            QueryOrder::Name => {
                matched.sort_by_cached_key(|item| item.entity().name().to_lowercase());
            }
            QueryOrder::Z2A => {
                matched.sort_by_cached_key(|item| Reverse(item.entity().name().to_lowercase()));
            }
        }

        let total = matched.len() as u64;
        let items = matched
            .into_iter()
            .skip(args.offset as usize)
            .take(args.count as usize)
            .collect();

        Page::new(args.offset, items).with_total(total)
    }
}

impl<E> Default for QueryPredication<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for QueryPredication<E> {
    fn clone(&self) -> Self {
        Self {
            predicates: self.predicates.clone(),
        }
    }
}

impl<E> fmt::Debug for QueryPredication<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryPredication")
            .field("keys", &self.predicates.keys().collect::<Vec<_>>())
            .finish()
    }
}
