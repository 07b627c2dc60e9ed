//! Query arguments.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::entity::ResourceState;
use crate::types::wire::wire_enum;

wire_enum! {
    /// Sort order of a query.
    pub enum QueryOrder as name {
        /// Storage order.
        Default = 0 => "default",
        /// Most recently modified first.
        Latest = 1 => "latest",
        /// Most recently created first.
        Time = 2 => "time",
        /// Name ascending.
        Name = 3 => "name",
        /// Name descending.
        Z2A = 4 => "z2a",
    }
}

impl Default for QueryOrder {
    fn default() -> Self {
        QueryOrder::Default
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    1000
}

/// Page size limits applied when parsing query arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefaults {
    /// Count used when a query names none.
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Largest count a query may ask for.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

/// Filters, paging and ordering for a search.
///
/// # Examples
///
/// ```
/// use tessera_persistence::entity::ResourceState;
/// use tessera_persistence::query::{QueryArgs, QueryOrder};
///
/// let args = QueryArgs::parse("hello");
/// assert_eq!(args.name_query.as_deref(), Some("hello"));
/// assert!(!args.name_exactly);
/// assert_eq!((args.offset, args.count), (0, 20));
/// assert_eq!(args.state, ResourceState::Normal);
/// assert_eq!(args.order, QueryOrder::Default);
///
/// let args = QueryArgs::parse("q=news&pgno=2&count=10&publisher=u1");
/// assert_eq!(args.offset, 20);
/// assert_eq!(args.data.get("publisher").map(String::as_str), Some("u1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryArgs {
    /// Text matched against entity names.
    pub name_query: Option<String>,
    /// Match the name exactly instead of by substring.
    pub name_exactly: bool,
    pub offset: u32,
    pub count: u32,
    /// Only entities in this state match.
    pub state: ResourceState,
    pub order: QueryOrder,
    /// Extra keys consumed by kind-specific predicates.
    pub data: BTreeMap<String, String>,
}

impl Default for QueryArgs {
    fn default() -> Self {
        Self::with_defaults(&QueryDefaults::default())
    }
}

impl QueryArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: &QueryDefaults) -> Self {
        Self {
            name_query: None,
            name_exactly: false,
            offset: 0,
            count: defaults.default_page_size,
            state: ResourceState::Normal,
            order: QueryOrder::Default,
            data: BTreeMap::new(),
        }
    }

    /// Parses free-form query text with the default page sizes.
    pub fn parse(input: &str) -> Self {
        Self::parse_with(input, &QueryDefaults::default())
    }

    /// Parses free-form query text.
    ///
    /// A JSON object is read key by key; text containing `=` or `:` is read
    /// as `key=value` pairs separated by `&`, `;` or newlines; anything else
    /// is a name query. Unreadable values keep their defaults.
    pub fn parse_with(input: &str, defaults: &QueryDefaults) -> Self {
        let input = input.trim();
        if input.is_empty() {
            return Self::with_defaults(defaults);
        }

        if input.starts_with('{') {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(input) {
                let pairs = map.into_iter().filter_map(|(key, value)| {
                    let text = match value {
                        Value::Null => return None,
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    Some((key, text))
                });
                return Self::from_pairs_with(pairs, defaults);
            }
        }

        if input.contains('=') || input.contains(':') {
            let pairs = input
                .split(['&', ';', '\n'])
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .filter_map(|segment| {
                    let (key, value) = segment.split_once(['=', ':'])?;
                    Some((key.trim().to_string(), value.trim().to_string()))
                });
            return Self::from_pairs_with(pairs, defaults);
        }

        let mut args = Self::with_defaults(defaults);
        args.name_query = Some(input.to_string());
        args
    }

    /// Builds arguments from decoded query-string pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::from_pairs_with(pairs, &QueryDefaults::default())
    }

    pub fn from_pairs_with<I>(pairs: I, defaults: &QueryDefaults) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut args = Self::with_defaults(defaults);
        let mut explicit_offset = false;
        let mut page_number = 0u32;

        for (key, value) in pairs {
            match key.to_ascii_lowercase().as_str() {
                "q" => {
                    args.name_query = Some(value).filter(|q| !q.trim().is_empty());
                }
                "eqname" => args.name_exactly = parse_flag(&value),
                "offset" => {
                    if let Ok(offset) = value.trim().parse() {
                        args.offset = offset;
                        explicit_offset = true;
                    }
                }
                "count" => {
                    if let Ok(count) = value.trim().parse::<u32>() {
                        if count > 0 {
                            args.count = count.min(defaults.max_page_size);
                        }
                    }
                }
                "pgno" => page_number = value.trim().parse().unwrap_or(0),
                "state" => {
                    if let Some(state) = ResourceState::parse_name(&value) {
                        args.state = state;
                    }
                }
                "order" => {
                    if let Some(order) = QueryOrder::parse_name(&value) {
                        args.order = order;
                    }
                }
                _ => {
                    args.data.insert(key, value);
                }
            }
        }

        if !explicit_offset && page_number > 0 {
            args.offset = page_number.saturating_mul(args.count);
        }
        args
    }

    /// The query-string form understood by [`from_pairs`](Self::from_pairs).
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        if let Some(q) = &self.name_query {
            pairs.push(("q".to_string(), q.clone()));
        }
        if self.name_exactly {
            pairs.push(("eqname".to_string(), "true".to_string()));
        }
        pairs.push(("offset".to_string(), self.offset.to_string()));
        pairs.push(("count".to_string(), self.count.to_string()));
        pairs.push(("state".to_string(), self.state.as_str().to_string()));
        if self.order != QueryOrder::Default {
            pairs.push(("order".to_string(), self.order.as_str().to_string()));
        }
        for (key, value) in &self.data {
            pairs.push((key.clone(), value.clone()));
        }
        pairs
    }

    pub fn with_name(mut self, query: impl Into<String>, exactly: bool) -> Self {
        self.name_query = Some(query.into());
        self.name_exactly = exactly;
        self
    }

    pub fn with_state(mut self, state: ResourceState) -> Self {
        self.state = state;
        self
    }

    pub fn with_order(mut self, order: QueryOrder) -> Self {
        self.order = order;
        self
    }

    pub fn with_paging(mut self, offset: u32, count: u32) -> Self {
        self.offset = offset;
        self.count = count;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
